//! A model provider for OpenAI-compatible APIs, such as OpenRouter.

#[macro_use]
extern crate tracing;

mod config;
mod io;
mod proto;
mod response;

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::sync::Arc;

use chatloop_model::{
    ErrorKind, ModelProvider, ModelProviderError, ModelRequest,
};
use mime::Mime;
use reqwest::{Client, header};

pub use config::{OpenAIConfig, OpenAIConfigBuilder};
use io::{Chunks, Sse};
pub use response::OpenAIResponse;

/// Error type for [`OpenAIProvider`].
#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Error {
    fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// OpenAI-compatible model provider.
#[derive(Clone, Debug)]
pub struct OpenAIProvider {
    client: Client,
    config: Arc<OpenAIConfig>,
}

impl OpenAIProvider {
    /// Creates a new `OpenAIProvider` with the given configuration.
    #[inline]
    pub fn new(config: OpenAIConfig) -> Self {
        Self {
            client: Client::new(),
            config: Arc::new(config),
        }
    }
}

impl ModelProvider for OpenAIProvider {
    type Error = Error;
    type Response = OpenAIResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let openai_req = proto::create_request(req, &self.config);
        let mut builder = self
            .client
            .post(format!("{}{}", self.config.base_url, "/chat/completions"))
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.config.api_key),
            )
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "text/event-stream");
        for (name, value) in &self.config.headers {
            builder = builder.header(name, value);
        }
        let resp_fut = builder.json(&openai_req).send();

        async move {
            let resp = match resp_fut.await {
                Ok(resp) => resp,
                Err(err) => {
                    return Err(Error::new(format!("{err}"), ErrorKind::Other));
                }
            };

            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                let (kind, message) = proto::classify_error(status, &body);
                warn!("request failed with {kind:?}: {message}");
                return Err(Error::new(message, kind));
            }

            let content_type = resp
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok());
            let is_valid_content_type = content_type
                .and_then(|v| v.parse().ok())
                .map(|m: Mime| m.subtype().as_str() == "event-stream")
                .unwrap_or(false);
            if !is_valid_content_type {
                return Err(Error::new(
                    format!("Unexpected content type: {content_type:?}"),
                    ErrorKind::Other,
                ));
            }

            // Here we got a successful response.
            let chunks = Chunks::from_response(resp);
            let sse = Sse::new(chunks);
            Ok(OpenAIResponse::from_sse(sse))
        }
    }
}
