use std::future::poll_fn;
use std::pin::{Pin, pin};
use std::sync::Arc;
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use chatloop_model::{
    ModelFinishReason, ModelProvider, ModelProviderError, ModelRequest,
    ModelResponse, ModelResponseEvent,
};
use tracing::Instrument;

type SendRequestResult =
    Result<ModelClientResponse, Box<dyn ModelProviderError>>;
type BoxedSendRequestFuture =
    Pin<Box<dyn Future<Output = SendRequestResult> + Send>>;
type OnDelta = Arc<dyn Fn(&str) + Send + Sync>;
type HandlerFn =
    Arc<dyn Fn(ModelRequest, OnDelta) -> BoxedSendRequestFuture + Send + Sync>;

/// How rate-limited requests are retried.
///
/// Only transient failures are retried; everything else is handed back to
/// the caller on the first occurrence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_interval: Duration,
    /// Upper bound of the delay between two attempts.
    pub max_interval: Duration,
}

impl RetryPolicy {
    /// A policy that never retries.
    pub const NEVER: RetryPolicy = RetryPolicy {
        max_retries: 0,
        initial_interval: Duration::ZERO,
        max_interval: Duration::ZERO,
    };
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(8),
        }
    }
}

/// A wrapper around a model provider that maintains an execution
/// environment for the provider and provides a type-erased interface
/// for the other modules.
#[derive(Clone)]
pub struct ModelClient {
    handler_fn: HandlerFn,
    retry_policy: RetryPolicy,
}

impl ModelClient {
    #[inline]
    pub fn new<P: ModelProvider + 'static>(provider: P) -> Self {
        // We have to erase the type `P`, since `ModelClient` doesn't have a
        // generic parameter and we don't want it either.
        let handler_fn: HandlerFn = Arc::new(move |req, on_delta| {
            let fut = provider.send_request(&req);
            Box::pin(
                async move {
                    trace!("got a request: {:?}", req);
                    let resp_or_err = fut.await;
                    handle_response::<P>(resp_or_err, on_delta).await
                }
                .instrument(trace_span!("model client req")),
            )
        });
        Self {
            handler_fn,
            retry_policy: RetryPolicy::default(),
        }
    }

    #[inline]
    pub fn set_retry_policy(&mut self, retry_policy: RetryPolicy) {
        self.retry_policy = retry_policy;
    }

    /// Sends a request and returns the complete response.
    ///
    /// `on_delta` receives text fragments as they stream in. When a request
    /// is retried, fragments of the failed attempt may have been delivered
    /// already.
    pub async fn send_request(
        &self,
        req: ModelRequest,
        on_delta: impl Fn(&str) + Send + Sync + 'static,
    ) -> SendRequestResult {
        let on_delta: OnDelta = Arc::new(on_delta);
        let max_retries = self.retry_policy.max_retries;
        let backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.retry_policy.initial_interval)
            .with_max_interval(self.retry_policy.max_interval)
            .with_max_elapsed_time(None)
            .build();

        let mut attempt = 0u32;
        backoff::future::retry(backoff, || {
            attempt += 1;
            let attempt = attempt;
            let fut = (self.handler_fn)(req.clone(), Arc::clone(&on_delta));
            async move {
                fut.await.map_err(|err| {
                    if err.kind().is_transient() && attempt <= max_retries {
                        warn!("attempt {attempt} failed, will retry: {err}");
                        backoff::Error::transient(err)
                    } else {
                        backoff::Error::permanent(err)
                    }
                })
            }
        })
        .await
    }
}

/// A completely received response from the model client.
#[derive(Clone, Debug)]
pub struct ModelClientResponse {
    pub text: String,
    /// The reason the model finished generating.
    pub finish_reason: Option<ModelFinishReason>,
}

async fn handle_response<P: ModelProvider + 'static>(
    resp_or_err: Result<P::Response, P::Error>,
    on_delta: OnDelta,
) -> SendRequestResult {
    let resp = match resp_or_err {
        Ok(resp) => resp,
        Err(err) => {
            error!("got an error: {err:?}");
            return Err(Box::new(err));
        }
    };

    let mut text = String::new();
    let mut finish_reason = None;

    trace!("start receiving events");

    let mut pinned_resp = pin!(resp);
    loop {
        let event_or_err =
            poll_fn(|cx| pinned_resp.as_mut().poll_next_event(cx)).await;
        let event = match event_or_err {
            Ok(event) => event,
            Err(err) => {
                error!("got an error: {err:?}");
                return Err(Box::new(err));
            }
        };

        let Some(event) = event else {
            break;
        };
        trace!("got an event: {event:?}");

        match event {
            ModelResponseEvent::MessageDelta(delta) => {
                on_delta(&delta);
                text.push_str(&delta);
            }
            ModelResponseEvent::Completed(reason) => {
                finish_reason = Some(reason);
            }
        }
    }

    trace!("finished a request");

    Ok(ModelClientResponse {
        text,
        finish_reason,
    })
}
