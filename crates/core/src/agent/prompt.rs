use chatloop_model::ModelMessage;

use crate::conversation::{Message, Role};
use crate::tool::Toolset;

/// Stops generation before the model starts making up tool results.
pub(crate) const STOP_SEQUENCE: &str = "\nObservation:";

const CHAT_PREAMBLE: &str =
    "You are a helpful assistant. Answer the user's messages directly.";

/// Tells the model how to fix its output after a parse failure.
pub(crate) const FORMAT_CORRECTION: &str = "Invalid format. Either name a tool \
with `Action:` followed by `Action Input:` on the next line, or reply with \
`Final Answer:` followed by your answer.";

/// Builds the system message for the given tools.
pub(crate) fn preamble(toolset: &Toolset) -> String {
    if toolset.is_empty() {
        return CHAT_PREAMBLE.to_owned();
    }
    format!(
        "Answer the following questions as best you can. \
You have access to the following tools:

{descriptions}

Use the following format:

Question: the input question you must answer
Thought: you should always think about what to do
Action: the action to take, should be one of [{names}]
Action Input: the input to the action
Observation: the result of the action
... (this Thought/Action/Action Input/Observation can repeat N times)
Thought: I now know the final answer
Final Answer: the final answer to the original input question

Earlier messages of the conversation, if any, come before the question. \
Begin!",
        descriptions = toolset.descriptions(),
        names = toolset.names().join(", "),
    )
}

/// Renders the model messages of one query.
///
/// `history` is what the user and the assistant said in earlier turns,
/// `transcript` is the current turn starting with the user input.
pub(crate) fn render(
    preamble: &str,
    history: &[Message],
    transcript: &[Message],
    react: bool,
) -> Vec<ModelMessage> {
    let mut messages = Vec::with_capacity(1 + history.len() + transcript.len());
    messages.push(ModelMessage::System(preamble.to_owned()));
    messages.extend(history.iter().map(render_message));

    let mut turn = transcript.iter();
    if let Some(input) = turn.next() {
        let content = if react {
            format!("Question: {}", input.content())
        } else {
            input.content().to_owned()
        };
        messages.push(ModelMessage::User(content));
    }
    messages.extend(turn.map(render_message));
    messages
}

fn render_message(message: &Message) -> ModelMessage {
    match message.role() {
        Role::User => ModelMessage::User(message.content().to_owned()),
        Role::Assistant => {
            ModelMessage::Assistant(message.content().to_owned())
        }
        Role::Tool => {
            ModelMessage::User(format!("Observation: {}", message.content()))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::future::ready;

    use super::*;
    use crate::tool::{Tool, ToolResult};

    struct Dummy;

    impl Tool for Dummy {
        fn name(&self) -> &str {
            "calculator"
        }

        fn description(&self) -> &str {
            "Useful for arithmetic."
        }

        fn execute(
            &self,
            input: String,
        ) -> impl Future<Output = ToolResult> + Send + 'static {
            ready(Ok(input))
        }
    }

    #[test]
    fn test_preamble() {
        assert_eq!(preamble(&Toolset::default()), CHAT_PREAMBLE);

        let mut toolset = Toolset::default();
        toolset.add_tool(Dummy);
        let text = preamble(&toolset);
        assert!(text.contains("calculator: Useful for arithmetic."));
        assert!(text.contains("should be one of [calculator]"));
        assert!(text.contains("Final Answer:"));
    }

    #[test]
    fn test_render() {
        let history = [Message::user("Hi"), Message::assistant("Hello!")];
        let transcript = [
            Message::user("What is 12 * 7?"),
            Message::assistant("Action: calculator\nAction Input: 12 * 7"),
            Message::tool(
                "84",
                Some("calculator".to_owned()),
                Some("12 * 7".to_owned()),
            ),
        ];

        let messages = render("sys", &history, &transcript, true);
        assert_eq!(
            messages,
            [
                ModelMessage::System("sys".to_owned()),
                ModelMessage::User("Hi".to_owned()),
                ModelMessage::Assistant("Hello!".to_owned()),
                ModelMessage::User("Question: What is 12 * 7?".to_owned()),
                ModelMessage::Assistant(
                    "Action: calculator\nAction Input: 12 * 7".to_owned()
                ),
                ModelMessage::User("Observation: 84".to_owned()),
            ]
        );

        let messages = render("sys", &[], &transcript[..1], false);
        assert_eq!(
            messages[1],
            ModelMessage::User("What is 12 * 7?".to_owned())
        );
    }
}
