use chatloop_model::ErrorKind as ModelErrorKind;
use thiserror::Error;

/// Why a single agent turn failed.
///
/// A turn error never poisons the session: the conversation so far stays
/// intact and the next input can be submitted right away.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TurnError {
    /// The model endpoint could not be reached or rejected the request.
    #[error("model request failed ({kind}): {message}")]
    RemoteCall {
        /// The classified failure reported by the provider.
        kind: ModelErrorKind,
        /// The provider's message.
        message: String,
    },
    /// The transcript exceeds the context window even without history.
    #[error("the question does not fit into the model's context window")]
    ContextOverflow,
    /// The model output didn't follow the expected format.
    #[error("could not understand the model output: {0}")]
    Parse(#[from] ParseError),
    /// The model kept calling tools without reaching an answer.
    #[error("no final answer after {limit} model calls")]
    MaxIterationsExceeded {
        /// The configured iteration cap.
        limit: usize,
    },
}

/// The ways a model output can fail to match the reasoning format.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Nothing but whitespace came back.
    #[error("the model returned an empty response")]
    Empty,
    /// Neither an action nor a final answer is present.
    #[error("missing `Action:` or `Final Answer:`")]
    MissingAction,
    /// An action was named without an input.
    #[error("missing `Action Input:` after `Action:`")]
    MissingActionInput,
    /// Both an action and a final answer are present.
    #[error("found both an action and a final answer")]
    Ambiguous,
}
