//! Conversation-related types.

use std::fmt::{self, Display};

/// The author of a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// Input typed by the user.
    User,
    /// Text produced by the model.
    Assistant,
    /// Output of a tool invocation.
    Tool,
}

impl Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// A message in a conversation or in an agent transcript.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Message {
    role: Role,
    content: String,
    tool_name: Option<String>,
    tool_input: Option<String>,
}

impl Message {
    /// Creates a user message.
    #[inline]
    pub fn user<S: Into<String>>(content: S) -> Self {
        Self::new(Role::User, content.into())
    }

    /// Creates an assistant message.
    #[inline]
    pub fn assistant<S: Into<String>>(content: S) -> Self {
        Self::new(Role::Assistant, content.into())
    }

    /// Creates a tool message holding an observation.
    ///
    /// `tool_name` and `tool_input` are absent for observations that were
    /// not produced by a tool, such as format correction notices.
    #[inline]
    pub fn tool<S: Into<String>>(
        content: S,
        tool_name: Option<String>,
        tool_input: Option<String>,
    ) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_name,
            tool_input,
        }
    }

    #[inline]
    fn new(role: Role, content: String) -> Self {
        Self {
            role,
            content,
            tool_name: None,
            tool_input: None,
        }
    }

    /// Returns the author of this message.
    #[inline]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Returns the text of this message.
    #[inline]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Returns the name of the tool that produced this message.
    #[inline]
    pub fn tool_name(&self) -> Option<&str> {
        self.tool_name.as_deref()
    }

    /// Returns the input the tool was invoked with.
    #[inline]
    pub fn tool_input(&self) -> Option<&str> {
        self.tool_input.as_deref()
    }
}

/// Represents a conversation.
///
/// A conversation only grows: messages can be appended and read back in
/// insertion order, but never edited or removed.
#[derive(Clone, Default, Debug)]
pub struct Conversation {
    items: Vec<Message>,
}

impl Conversation {
    /// Appends a message to the end of the conversation.
    #[inline]
    pub fn append(&mut self, message: Message) {
        self.items.push(message);
    }

    /// Returns all messages in chronological order.
    #[inline]
    pub fn history(&self) -> &[Message] {
        &self.items
    }

    /// Returns the number of messages.
    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if nothing has been said yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns an iterator over the messages.
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.items.iter()
    }
}

impl<'a> IntoIterator for &'a Conversation {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_keeps_order() {
        let mut conversation = Conversation::default();
        assert!(conversation.is_empty());

        conversation.append(Message::user("Hi"));
        conversation.append(Message::assistant("Hello!"));
        let snapshot = conversation.history().to_vec();

        conversation.append(Message::user("What is 12 * 7?"));
        conversation.append(Message::assistant("84"));

        assert_eq!(conversation.len(), 4);
        assert_eq!(&conversation.history()[..2], snapshot.as_slice());
        let roles: Vec<_> = conversation.iter().map(Message::role).collect();
        assert_eq!(
            roles,
            [Role::User, Role::Assistant, Role::User, Role::Assistant]
        );
    }

    #[test]
    fn test_tool_message() {
        let msg = Message::tool(
            "84",
            Some("calculator".to_owned()),
            Some("12 * 7".to_owned()),
        );
        assert_eq!(msg.role(), Role::Tool);
        assert_eq!(msg.tool_name(), Some("calculator"));
        assert_eq!(msg.tool_input(), Some("12 * 7"));
        assert_eq!(msg.content(), "84");
    }
}
