use std::fmt::{self, Display};

/// The kind of error that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The content is moderated.
    Moderated,
    /// The model provider is rate limited.
    RateLimitExceeded,
    /// The request doesn't fit into the model's context window.
    ContextOverflow,
    /// The credentials were rejected by the provider.
    Unauthorized,
    /// Any other errors.
    Other,
}

impl ErrorKind {
    /// Returns `true` if retrying the same request later may succeed.
    #[inline]
    pub fn is_transient(self) -> bool {
        matches!(self, ErrorKind::RateLimitExceeded)
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Moderated => write!(f, "content moderated"),
            ErrorKind::RateLimitExceeded => write!(f, "rate limit exceeded"),
            ErrorKind::ContextOverflow => write!(f, "context window exceeded"),
            ErrorKind::Unauthorized => write!(f, "unauthorized"),
            ErrorKind::Other => write!(f, "remote call failed"),
        }
    }
}
