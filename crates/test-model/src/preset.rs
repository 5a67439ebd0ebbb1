use chatloop_model::ErrorKind;
use serde::{Deserialize, Serialize};

/// The events in a preset response.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PresetEvent {
    #[serde(rename = "message_delta")]
    MessageDelta(String),
}

/// The kind of a preset failure, mirrors [`ErrorKind`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresetFailure {
    Moderated,
    RateLimitExceeded,
    ContextOverflow,
    Unauthorized,
    Other,
}

impl From<PresetFailure> for ErrorKind {
    fn from(value: PresetFailure) -> Self {
        match value {
            PresetFailure::Moderated => ErrorKind::Moderated,
            PresetFailure::RateLimitExceeded => ErrorKind::RateLimitExceeded,
            PresetFailure::ContextOverflow => ErrorKind::ContextOverflow,
            PresetFailure::Unauthorized => ErrorKind::Unauthorized,
            PresetFailure::Other => ErrorKind::Other,
        }
    }
}

/// The preset response for an assistant step.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresetResponse {
    /// Events in this response.
    pub events: Vec<PresetEvent>,
    /// If set, the request will fail in the first `failures` attempts.
    /// `Some(0)` means the request will fail infinitely.
    pub failures: Option<u64>,
    /// The kind of the simulated failures, `Other` if not set.
    #[serde(default)]
    pub failure_kind: Option<PresetFailure>,
}

impl PresetResponse {
    /// Creates a `PresetResponse` with the specified events.
    #[inline]
    pub fn with_events(events: impl Into<Vec<PresetEvent>>) -> Self {
        Self {
            events: events.into(),
            failures: None,
            failure_kind: None,
        }
    }

    /// Creates a `PresetResponse` that streams `text` in a single delta.
    #[inline]
    pub fn with_text<S: Into<String>>(text: S) -> Self {
        Self::with_events([PresetEvent::MessageDelta(text.into())])
    }

    /// Sets failure times before a successful response. `0` means the
    /// response will always be a failure.
    #[inline]
    pub fn with_failures(mut self, failures: u64) -> Self {
        self.failures = Some(failures);
        self
    }

    /// Sets the kind of the simulated failures.
    #[inline]
    pub fn with_failure_kind(mut self, kind: PresetFailure) -> Self {
        self.failure_kind = Some(kind);
        self
    }

    pub(crate) fn text(&self) -> String {
        self.events
            .iter()
            .map(|event| match event {
                PresetEvent::MessageDelta(delta) => delta.as_str(),
            })
            .collect()
    }
}
