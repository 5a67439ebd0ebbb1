//! A local fake model for testing purpose.

mod preset;

use std::collections::VecDeque;
use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use chatloop_model::{
    ErrorKind, ModelFinishReason, ModelProvider, ModelProviderError,
    ModelRequest, ModelResponse, ModelResponseEvent,
};
use tokio::time::{Sleep, sleep};

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    message: &'static str,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

pub struct TestModelResponse {
    events: VecDeque<ModelResponseEvent>,
    delay: Duration,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl ModelResponse for TestModelResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.get_mut();
        if let Some(sleep) = &mut this.sleep {
            ready!(sleep.as_mut().poll(cx));
            this.sleep = None;
            return Poll::Ready(Ok(this.events.pop_front()));
        }
        if this.events.is_empty() {
            // In case this method is called after completion.
            return Poll::Ready(Ok(None));
        }
        this.sleep = Some(Box::pin(sleep(this.delay)));
        Pin::new(this).poll_next_event(cx)
    }
}

#[derive(Default)]
struct Script {
    steps: VecDeque<ScriptStep>,
    fallback: Option<PresetResponse>,
    requests: Vec<ModelRequest>,
}

struct ScriptStep {
    response: PresetResponse,
    failed_attempts: u64,
}

/// A local fake model for testing purpose.
///
/// Before sending requests, you need to setup the script, which is how the
/// model should respond. Responses are consumed in the order they were
/// added, one per request. When the script runs out, the fallback response
/// is used if there is one, otherwise an error is returned.
///
/// Clones share the same script, so a test can keep a clone around to
/// inspect the requests after handing the provider over to an agent.
///
/// # Note
///
/// This type is not optimized for production use, every request is copied
/// into the log. You should only use it for testing.
#[derive(Clone, Default)]
pub struct TestModelProvider {
    script: Arc<Mutex<Script>>,
    delay: Option<Duration>,
}

impl TestModelProvider {
    /// Appends a response to the script.
    #[inline]
    pub fn add_response(&mut self, preset: PresetResponse) {
        self.script.lock().unwrap().steps.push_back(ScriptStep {
            response: preset,
            failed_attempts: 0,
        });
    }

    /// Appends a response that streams `text` in one delta.
    #[inline]
    pub fn add_text_response<S: Into<String>>(&mut self, text: S) {
        self.add_response(PresetResponse::with_text(text));
    }

    /// Sets the response used after the script runs out.
    #[inline]
    pub fn set_fallback_response(&mut self, preset: PresetResponse) {
        self.script.lock().unwrap().fallback = Some(preset);
    }

    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Returns all requests received so far, including failed ones.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.script.lock().unwrap().requests.clone()
    }

    /// Returns the number of requests received so far.
    pub fn request_count(&self) -> usize {
        self.script.lock().unwrap().requests.len()
    }

    fn next_response(&self, req: &ModelRequest) -> Result<String, Error> {
        let mut guard = self.script.lock().unwrap();
        let script = &mut *guard;
        script.requests.push(req.clone());

        let Some(step) = script.steps.front_mut() else {
            return match &script.fallback {
                Some(fallback) => Ok(fallback.text()),
                None => Err(Error {
                    message: "no enough steps",
                    kind: ErrorKind::Other,
                }),
            };
        };

        if let Some(failures) = step.response.failures {
            if failures == 0 || step.failed_attempts < failures {
                step.failed_attempts += 1;
                let kind = step
                    .response
                    .failure_kind
                    .map(Into::into)
                    .unwrap_or(ErrorKind::Other);
                return Err(Error {
                    message: "preset failure",
                    kind,
                });
            }
        }

        let step = script.steps.pop_front().expect("checked above");
        Ok(step.response.text())
    }
}

impl ModelProvider for TestModelProvider {
    type Error = crate::Error;
    type Response = TestModelResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let result = self.next_response(req).map(|text| {
            let mut events = VecDeque::new();
            if !text.is_empty() {
                events.push_back(ModelResponseEvent::MessageDelta(text));
            }
            events.push_back(ModelResponseEvent::Completed(
                ModelFinishReason::Stop,
            ));
            TestModelResponse {
                events,
                delay: self.delay.unwrap_or(Duration::from_millis(1)),
                sleep: None,
            }
        });
        ready(result)
    }
}
