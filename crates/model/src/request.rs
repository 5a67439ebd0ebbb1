/// A request to be sent to the model provider.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ModelRequest {
    /// The input messages.
    pub messages: Vec<ModelMessage>,
    /// Sequences where the model should stop generating further tokens.
    pub stop: Vec<String>,
}

impl ModelRequest {
    /// Creates a request with the given messages and no stop sequences.
    #[inline]
    pub fn with_messages(messages: impl Into<Vec<ModelMessage>>) -> Self {
        Self {
            messages: messages.into(),
            stop: vec![],
        }
    }
}

/// A complete message.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ModelMessage {
    /// The system instructions.
    System(String),
    /// A user input text.
    User(String),
    /// An assistant text.
    Assistant(String),
}

impl ModelMessage {
    /// Returns the text content of the message.
    #[inline]
    pub fn content(&self) -> &str {
        match self {
            ModelMessage::System(s)
            | ModelMessage::User(s)
            | ModelMessage::Assistant(s) => s,
        }
    }
}
