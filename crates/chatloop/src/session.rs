use chatloop_core::conversation::{Conversation, Message};
use chatloop_core::{
    Agent, AgentBuilder, AgentStep, ParsePolicy, RetryPolicy, TurnError,
    TurnOutcome,
};
use chatloop_model::ModelProvider;

use crate::tools::*;

/// A session builder.
///
/// See [`Session`].
pub struct SessionBuilder {
    agent_builder: AgentBuilder,
    use_history: bool,
}

impl SessionBuilder {
    /// Creates a session builder with a specified model provider.
    pub fn with_model_provider<M: ModelProvider + 'static>(
        provider: M,
    ) -> Self {
        let agent_builder = AgentBuilder::with_model_provider(provider);
        Self {
            agent_builder,
            use_history: true,
        }
    }

    /// Lets the agent search the web.
    #[inline]
    pub fn with_search_tool(mut self, tool: SearchTool) -> Self {
        self.agent_builder = self.agent_builder.with_tool(tool);
        self
    }

    /// Lets the agent do arithmetic.
    #[inline]
    pub fn with_calculator(mut self) -> Self {
        self.agent_builder = self.agent_builder.with_tool(CalculatorTool::new());
        self
    }

    /// Sets whether earlier messages are sent along with each input.
    /// Enabled by default.
    #[inline]
    pub fn with_history(mut self, use_history: bool) -> Self {
        self.use_history = use_history;
        self
    }

    /// Sets the cap on model queries per message.
    #[inline]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.agent_builder =
            self.agent_builder.with_max_iterations(max_iterations);
        self
    }

    /// Sets how malformed model outputs are handled.
    #[inline]
    pub fn with_parse_policy(mut self, parse_policy: ParsePolicy) -> Self {
        self.agent_builder = self.agent_builder.with_parse_policy(parse_policy);
        self
    }

    /// Sets how rate-limited model requests are retried.
    #[inline]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.agent_builder = self.agent_builder.with_retry_policy(retry_policy);
        self
    }

    /// Attaches a callback to be invoked for every reasoning step.
    #[inline]
    pub fn on_step(
        mut self,
        on_step: impl Fn(&AgentStep) + Send + Sync + 'static,
    ) -> Self {
        self.agent_builder = self.agent_builder.on_step(on_step);
        self
    }

    /// Builds a new session.
    pub fn build(self) -> Session {
        Session {
            agent: self.agent_builder.build(),
            conversation: Conversation::default(),
            use_history: self.use_history,
        }
    }
}

/// A chat session, like a window that displays messages and has a input box.
///
/// The session owns the conversation and an agent to answer with. Messages
/// are handled one at a time; every message, answered or not, ends up in
/// the history together with a reply.
pub struct Session {
    agent: Agent,
    conversation: Conversation,
    use_history: bool,
}

impl Session {
    /// Sends a message and waits for the answer.
    ///
    /// When the turn fails, the history still records the message, followed
    /// by an assistant reply describing the error.
    pub async fn send_message(
        &mut self,
        message: &str,
    ) -> Result<TurnOutcome, TurnError> {
        let history: &[Message] = if self.use_history {
            self.conversation.history()
        } else {
            &[]
        };
        let result = self.agent.run(history, message).await;

        self.conversation.append(Message::user(message));
        let reply = match &result {
            Ok(outcome) => outcome.answer.clone(),
            Err(err) => format!("An error occurred: {err}"),
        };
        self.conversation.append(Message::assistant(reply));
        result
    }

    /// Returns the messages exchanged so far.
    #[inline]
    pub fn history(&self) -> &[Message] {
        self.conversation.history()
    }

    /// Returns the names of the tools the agent can use.
    #[inline]
    pub fn tool_names(&self) -> Vec<&str> {
        self.agent.toolset().names()
    }
}

#[cfg(test)]
mod tests {
    use chatloop_core::conversation::Role;
    use chatloop_model::ModelMessage;
    use chatloop_test_model::{PresetFailure, PresetResponse, TestModelProvider};

    use super::*;

    #[tokio::test]
    async fn test_history_interleaves() {
        let mut model_provider = TestModelProvider::default();
        model_provider.add_text_response("Final Answer: Hi!");
        model_provider.add_text_response(
            "Action: calculator\nAction Input: 12 * 7",
        );
        model_provider.add_text_response("Final Answer: 84");
        model_provider.add_text_response("Final Answer: You asked 12 * 7.");

        let mut session = SessionBuilder::with_model_provider(model_provider.clone())
            .with_calculator()
            .build();

        session.send_message("Hello").await.unwrap();
        let first_turn = session.history().to_vec();
        let outcome = session.send_message("What is 12 * 7?").await.unwrap();
        assert_eq!(outcome.answer, "84");
        session.send_message("What did I ask?").await.unwrap();

        let history = session.history();
        assert_eq!(history.len(), 6);
        assert_eq!(history[..2], first_turn[..]);
        for (idx, message) in history.iter().enumerate() {
            let role = if idx % 2 == 0 { Role::User } else { Role::Assistant };
            assert_eq!(message.role(), role);
        }
        assert_eq!(history[3].content(), "84");

        // The third turn sees both earlier exchanges, but not the tool calls.
        let requests = model_provider.requests();
        let messages = &requests[3].messages;
        assert_eq!(
            messages[1..5],
            [
                ModelMessage::User("Hello".to_owned()),
                ModelMessage::Assistant("Hi!".to_owned()),
                ModelMessage::User("What is 12 * 7?".to_owned()),
                ModelMessage::Assistant("84".to_owned()),
            ]
        );
    }

    #[tokio::test]
    async fn test_without_history() {
        let mut model_provider = TestModelProvider::default();
        model_provider.add_text_response("Hello!");
        model_provider.add_text_response("I don't remember.");

        let mut session = SessionBuilder::with_model_provider(model_provider.clone())
            .with_history(false)
            .build();
        session.send_message("Hi, I'm Alice").await.unwrap();
        session.send_message("What's my name?").await.unwrap();

        assert_eq!(session.history().len(), 4);
        let requests = model_provider.requests();
        assert_eq!(requests[1].messages.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_turn_is_recorded() {
        let mut model_provider = TestModelProvider::default();
        model_provider.add_response(
            PresetResponse::with_text("Hello!")
                .with_failures(1)
                .with_failure_kind(PresetFailure::Unauthorized),
        );

        let mut session = SessionBuilder::with_model_provider(model_provider)
            .with_retry_policy(RetryPolicy::NEVER)
            .build();

        let err = session.send_message("Hi").await.unwrap_err();
        assert!(matches!(err, TurnError::RemoteCall { .. }));
        assert_eq!(session.history().len(), 2);
        assert_eq!(
            session.history()[1].content(),
            format!("An error occurred: {err}")
        );

        // The session stays usable.
        let outcome = session.send_message("Hi again").await.unwrap();
        assert_eq!(outcome.answer, "Hello!");
        assert_eq!(session.history().len(), 4);
    }

    #[test]
    fn test_tool_names() {
        let session = SessionBuilder::with_model_provider(
            TestModelProvider::default(),
        )
        .with_search_tool(SearchTool::new("serp-test-key"))
        .with_calculator()
        .build();
        assert_eq!(session.tool_names(), ["search", "calculator"]);
    }
}
