use std::error::Error;

use crate::error::ErrorKind;
use crate::request::ModelRequest;
use crate::response::ModelResponse;

/// The error type for a model provider.
///
/// Every failure must be classified, since the caller decides whether to
/// retry, truncate the transcript or give up based on the kind alone.
pub trait ModelProviderError: Error + Send + Sync + 'static {
    /// Returns the kind of this error.
    fn kind(&self) -> ErrorKind;
}

/// A chat-completion backend: given a list of messages, it streams back
/// the generated text.
///
/// Once the provider is created, it should behave like a stateless object.
/// Configuration such as the model identifier, temperature or endpoint is
/// fixed at construction, and the provider may be dropped anytime.
pub trait ModelProvider: Send + Sync {
    /// The error type that may be returned by the provider.
    type Error: ModelProviderError;

    /// The response type for this provider.
    type Response: ModelResponse<Error = Self::Error>;

    /// Sends a request to the model.
    ///
    /// The returned future must not borrow `self`.
    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static;
}
