use std::pin::Pin;
use std::task::{Context, Poll, ready};

use chatloop_model::{
    ErrorKind, ModelFinishReason, ModelResponse, ModelResponseEvent,
};
use pin_project_lite::pin_project;

use crate::Error;
use crate::io::Sse;
use crate::proto::{self, ChatCompletionChunk, ErrorBody};

struct PartialState {
    sse: Sse,
    id: Option<String>,
    // This field will be cleared after the response returns the complete event.
    pending_finish_reason: Option<ModelFinishReason>,
}

type PinnedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type NextEvent = Result<(Option<ModelResponseEvent>, PartialState), Error>;

pin_project! {
    pub struct OpenAIResponse {
        next_event_fut: Option<PinnedFuture<NextEvent>>,
    }
}

impl OpenAIResponse {
    #[inline]
    pub fn from_sse(sse: Sse) -> Self {
        let partial_state = PartialState {
            sse,
            id: None,
            pending_finish_reason: None,
        };
        let next_event_fut = async move { next_event(partial_state).await };
        Self {
            next_event_fut: Some(Box::pin(next_event_fut)),
        }
    }
}

impl ModelResponse for OpenAIResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.project();
        let Some(next_event_fut) = this.next_event_fut else {
            return Poll::Ready(Ok(None));
        };
        let (event, partial_state) =
            match ready!(next_event_fut.as_mut().poll(cx)) {
                Ok((Some(event), partial_state)) => (event, partial_state),
                Ok((None, _)) => {
                    *this.next_event_fut = None;
                    return Poll::Ready(Ok(None));
                }
                Err(err) => {
                    *this.next_event_fut = None;
                    return Poll::Ready(Err(err));
                }
            };

        // The stream may still have more data to pull, create a new future for
        // the next event.
        let next_event_fut = async move { next_event(partial_state).await };
        *this.next_event_fut = Some(Box::pin(next_event_fut));

        Poll::Ready(Ok(Some(event)))
    }
}

async fn next_event(
    mut partial_state: PartialState,
) -> Result<(Option<ModelResponseEvent>, PartialState), Error> {
    let sse = &mut partial_state.sse;
    let mut message_delta = None;

    while partial_state.pending_finish_reason.is_none() {
        let sse_event = match sse.next_event().await {
            Ok(Some(event)) => event,
            Ok(None) => break,
            Err(err) => {
                return Err(Error::new(format!("{err:?}"), ErrorKind::Other));
            }
        };
        trace!("got sse event: {sse_event}");
        if sse_event == "[DONE]" {
            break;
        }

        let mut chunk =
            match serde_json::from_str::<ChatCompletionChunk>(&sse_event) {
                Ok(chunk) => chunk,
                Err(err) => return Err(stream_error(&sse_event, err)),
            };
        if partial_state.id.get_or_insert_with(|| chunk.id.clone()) != &chunk.id
        {
            return Err(Error::new("chunk id mismatch", ErrorKind::Other));
        };

        // Usage-only chunks carry no choices.
        let Some(choice) = chunk.choices.pop() else {
            continue;
        };

        if let Some(finish_reason) = choice.finish_reason {
            let finish_reason = if finish_reason == "length" {
                ModelFinishReason::Length
            } else {
                ModelFinishReason::Stop
            };
            partial_state.pending_finish_reason = Some(finish_reason);
        }

        if let Some(content) = choice.delta.content {
            if !content.is_empty() {
                message_delta = Some(content);
            }
        }

        if message_delta.is_some() {
            break;
        }
    }

    // The order of events are important. Always emit message delta first,
    // and then emit pending finish reason if any.

    if let Some(message_delta) = message_delta {
        return Ok((
            Some(ModelResponseEvent::MessageDelta(message_delta)),
            partial_state,
        ));
    }

    if let Some(finish_reason) = partial_state.pending_finish_reason.take() {
        return Ok((
            Some(ModelResponseEvent::Completed(finish_reason)),
            partial_state,
        ));
    }

    Ok((None, partial_state))
}

/// Some providers report failures as an error object inside the stream.
fn stream_error(payload: &str, parse_err: serde_json::Error) -> Error {
    match serde_json::from_str::<ErrorBody>(payload) {
        Ok(body) => {
            let kind = proto::classify_detail(&body.error);
            Error::new(body.error.message, kind)
        }
        Err(_) => Error::new(format!("{parse_err}"), ErrorKind::Other),
    }
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::pin::pin;

    use bytes::Bytes;

    use super::*;
    use crate::io::Chunks;

    async fn collect(
        resp: OpenAIResponse,
    ) -> Result<(String, Option<ModelFinishReason>), Error> {
        let mut resp = pin!(resp);
        let mut text = String::new();
        let mut finish_reason = None;
        while let Some(event) =
            poll_fn(|cx| resp.as_mut().poll_next_event(cx)).await?
        {
            match event {
                ModelResponseEvent::MessageDelta(delta) => {
                    text.push_str(&delta)
                }
                ModelResponseEvent::Completed(reason) => {
                    finish_reason = Some(reason)
                }
            }
        }
        Ok((text, finish_reason))
    }

    fn response_of(payload: &'static [u8]) -> OpenAIResponse {
        let chunks =
            Chunks::from_vec_deque(vec![Bytes::from_static(payload)].into());
        OpenAIResponse::from_sse(Sse::new(chunks))
    }

    #[tokio::test]
    async fn test_simple_events() {
        let resp = response_of(include_bytes!("../fixtures/test_response.txt"));
        let (text, finish_reason) = collect(resp).await.unwrap();
        assert_eq!(
            text,
            "Thought: I need to multiply.\nAction: calculator\nAction Input: 12 * 7"
        );
        assert_eq!(finish_reason, Some(ModelFinishReason::Stop));
    }

    #[tokio::test]
    async fn test_length_finish_reason() {
        let resp = response_of(
            b"data: {\"id\":\"1\",\"choices\":[{\"delta\":{\"content\":\"Final\"},\"finish_reason\":\"length\"}]}\n\n\
              data: [DONE]\n\n",
        );
        let (text, finish_reason) = collect(resp).await.unwrap();
        assert_eq!(text, "Final");
        assert_eq!(finish_reason, Some(ModelFinishReason::Length));
    }

    #[tokio::test]
    async fn test_error_in_stream() {
        let resp = response_of(
            b"data: {\"error\":{\"message\":\"Rate limit hit\",\"code\":\"rate_limit_exceeded\"}}\n\n",
        );
        let err = collect(resp).await.unwrap_err();
        assert_eq!(
            chatloop_model::ModelProviderError::kind(&err),
            ErrorKind::RateLimitExceeded
        );
        assert_eq!(err.message(), "Rate limit hit");
    }

    #[tokio::test]
    async fn test_chunk_id_mismatch() {
        let resp = response_of(
            b"data: {\"id\":\"1\",\"choices\":[{\"delta\":{\"content\":\"a\"},\"finish_reason\":null}]}\n\n\
              data: {\"id\":\"2\",\"choices\":[{\"delta\":{\"content\":\"b\"},\"finish_reason\":null}]}\n\n",
        );
        assert!(collect(resp).await.is_err());
    }
}
