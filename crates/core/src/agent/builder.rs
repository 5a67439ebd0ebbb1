use chatloop_model::ModelProvider;

use super::{Agent, AgentStep, OnStep, ParsePolicy, prompt};
use crate::model_client::{ModelClient, RetryPolicy};
use crate::tool::{Tool, Toolset};

/// [`Agent`] builder.
pub struct AgentBuilder {
    model_client: ModelClient,
    toolset: Toolset,
    max_iterations: usize,
    parse_policy: ParsePolicy,
    on_step: Option<OnStep>,
}

impl AgentBuilder {
    /// Creates a new builder with the specified model provider.
    #[inline]
    pub fn with_model_provider<P: ModelProvider + 'static>(
        provider: P,
    ) -> Self {
        Self {
            model_client: ModelClient::new(provider),
            toolset: Toolset::default(),
            max_iterations: Agent::DEFAULT_MAX_ITERATIONS,
            parse_policy: ParsePolicy::default(),
            on_step: None,
        }
    }

    /// Registers a tool.
    #[inline]
    pub fn with_tool<T: Tool>(mut self, tool: T) -> Self {
        self.toolset.add_tool(tool);
        self
    }

    /// Sets the cap on model queries per turn.
    #[inline]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Sets how malformed model outputs are handled.
    #[inline]
    pub fn with_parse_policy(mut self, parse_policy: ParsePolicy) -> Self {
        self.parse_policy = parse_policy;
        self
    }

    /// Sets how rate-limited model requests are retried.
    #[inline]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.model_client.set_retry_policy(retry_policy);
        self
    }

    /// Attaches a callback to be invoked for every reasoning step.
    #[inline]
    pub fn on_step(
        mut self,
        on_step: impl Fn(&AgentStep) + Send + Sync + 'static,
    ) -> Self {
        self.on_step = Some(Box::new(on_step));
        self
    }

    /// Builds the agent.
    pub fn build(self) -> Agent {
        let Self {
            model_client,
            toolset,
            max_iterations,
            parse_policy,
            on_step,
        } = self;
        debug!(
            "building agent with tools {:?}, max iterations {max_iterations}",
            toolset.names()
        );
        Agent {
            preamble: prompt::preamble(&toolset),
            model_client,
            toolset,
            max_iterations,
            parse_policy,
            on_step,
        }
    }
}
