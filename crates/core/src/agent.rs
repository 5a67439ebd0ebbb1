mod builder;
mod prompt;
mod state;
mod step;

use tracing::Instrument;

use crate::conversation::Message;
use crate::error::TurnError;
use crate::model_client::ModelClient;
use crate::tool::Toolset;
pub use builder::AgentBuilder;
use state::Turn;
pub use step::AgentStep;

type OnStep = Box<dyn Fn(&AgentStep) + Send + Sync>;

/// What the agent does when the model output doesn't follow the format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParsePolicy {
    /// Fail the turn on the first malformed output.
    Fail,
    /// Feed a correction notice back to the model and query again, failing
    /// after `max_retries` consecutive malformed outputs.
    Retry {
        /// Consecutive retries allowed.
        max_retries: u32,
    },
}

impl Default for ParsePolicy {
    fn default() -> Self {
        ParsePolicy::Retry { max_retries: 1 }
    }
}

/// The result of a successful agent turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnOutcome {
    /// The final answer.
    pub answer: String,
    /// Every step, in the order it happened.
    pub steps: Vec<AgentStep>,
    /// The working messages of the turn, starting with the user input.
    pub transcript: Vec<Message>,
    /// How many times the model was queried.
    pub iterations: usize,
}

/// A reasoning agent that answers one input at a time.
///
/// The agent holds no conversation state of its own. Each call to
/// [`Agent::run`] gets the earlier conversation as a slice and builds a
/// private transcript for the turn, so the caller decides what to remember.
pub struct Agent {
    model_client: ModelClient,
    toolset: Toolset,
    preamble: String,
    max_iterations: usize,
    parse_policy: ParsePolicy,
    on_step: Option<OnStep>,
}

impl Agent {
    /// Default cap on model queries per turn.
    pub const DEFAULT_MAX_ITERATIONS: usize = 15;

    /// Runs one turn: reasons, calls tools as needed, and returns the final
    /// answer.
    ///
    /// `history` is only read. When it no longer fits into the context
    /// window, the oldest entries are left out of the requests of this turn.
    pub async fn run(
        &self,
        history: &[Message],
        input: &str,
    ) -> Result<TurnOutcome, TurnError> {
        Turn::new(self, history, input)
            .run()
            .instrument(debug_span!("agent turn"))
            .await
    }

    /// Returns the tools available to the model.
    #[inline]
    pub fn toolset(&self) -> &Toolset {
        &self.toolset
    }

    /// Returns the cap on model queries per turn.
    #[inline]
    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }
}
