use std::borrow::Cow;
use std::fmt::{self, Display};

/// The kind of error that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No tool with the requested name is registered.
    NotFound,
    /// The input provided to the tool was invalid.
    InvalidInput,
    /// Error occurred while executing the tool.
    ExecutionError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::NotFound => write!(f, "Tool not found"),
            ErrorKind::InvalidInput => write!(f, "Invalid input"),
            ErrorKind::ExecutionError => write!(f, "Execution error"),
        }
    }
}

/// Describes a tool call error.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Error {
    kind: ErrorKind,
    reason: Option<String>,
}

impl Error {
    /// Creates a new error with the `NotFound` kind.
    #[inline]
    pub fn not_found() -> Self {
        Self {
            kind: ErrorKind::NotFound,
            reason: None,
        }
    }

    /// Creates a new error with the `InvalidInput` kind.
    #[inline]
    pub fn invalid_input() -> Self {
        Self {
            kind: ErrorKind::InvalidInput,
            reason: None,
        }
    }

    /// Creates a new error with the `ExecutionError` kind.
    #[inline]
    pub fn execution_error() -> Self {
        Self {
            kind: ErrorKind::ExecutionError,
            reason: None,
        }
    }

    /// Attaches a reason to the error.
    #[inline]
    pub fn with_reason<S: Into<String>>(self, reason: S) -> Self {
        Self {
            kind: self.kind,
            reason: Some(reason.into()),
        }
    }

    /// Returns the kind of the error.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the reason for the error.
    #[inline]
    pub fn reason(&self) -> Cow<'_, str> {
        match self.reason.as_deref() {
            Some(reason) => Cow::Borrowed(reason),
            None => Cow::Owned(format!("{}", self.kind)),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            Some(reason) => write!(f, "{}: {reason}", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_falls_back_to_kind() {
        let err = Error::execution_error();
        assert_eq!(err.reason(), "Execution error");
        assert_eq!(err.to_string(), "Execution error");

        let err = Error::invalid_input().with_reason("division by zero");
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(err.reason(), "division by zero");
        assert_eq!(err.to_string(), "Invalid input: division by zero");
    }
}
