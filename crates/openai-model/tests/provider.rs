use std::future::poll_fn;
use std::pin::pin;

use chatloop_model::{
    ErrorKind, ModelFinishReason, ModelMessage, ModelProvider,
    ModelProviderError, ModelRequest, ModelResponse, ModelResponseEvent,
};
use chatloop_openai_model::{OpenAIConfigBuilder, OpenAIProvider};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SSE_BODY: &str = concat!(
    "data: {\"id\":\"gen-1\",\"choices\":[{\"delta\":{\"content\":\"Final \"},\"finish_reason\":null}]}\n\n",
    "data: {\"id\":\"gen-1\",\"choices\":[{\"delta\":{\"content\":\"Answer: 84\"},\"finish_reason\":null}]}\n\n",
    "data: {\"id\":\"gen-1\",\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
    "data: [DONE]\n\n",
);

fn provider_for(server: &MockServer) -> OpenAIProvider {
    let config = OpenAIConfigBuilder::with_api_key("sk-or-test")
        .with_base_url(format!("{}/v1", server.uri()))
        .with_model("deepseek/deepseek-chat")
        .with_temperature(0.0)
        .with_header("HTTP-Referer", "http://localhost")
        .with_header("X-Title", "chatloop")
        .build();
    OpenAIProvider::new(config)
}

fn request() -> ModelRequest {
    ModelRequest {
        messages: vec![ModelMessage::User("What is 12 * 7?".to_owned())],
        stop: vec!["\nObservation:".to_owned()],
    }
}

#[tokio::test]
async fn test_streams_completion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-or-test"))
        .and(header("x-title", "chatloop"))
        .and(body_partial_json(json!({
            "model": "deepseek/deepseek-chat",
            "stop": ["\nObservation:"],
            "stream": true
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(SSE_BODY, "text/event-stream"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    let resp = provider.send_request(&request()).await.unwrap();
    let mut resp = pin!(resp);

    let mut text = String::new();
    let mut finish_reason = None;
    while let Some(event) = poll_fn(|cx| resp.as_mut().poll_next_event(cx))
        .await
        .unwrap()
    {
        match event {
            ModelResponseEvent::MessageDelta(delta) => text.push_str(&delta),
            ModelResponseEvent::Completed(reason) => {
                finish_reason = Some(reason)
            }
        }
    }

    assert_eq!(text, "Final Answer: 84");
    assert_eq!(finish_reason, Some(ModelFinishReason::Stop));
}

#[tokio::test]
async fn test_maps_error_statuses() {
    let cases = [
        (401, json!({"error": {"message": "No auth credentials found"}}), ErrorKind::Unauthorized),
        (429, json!({"error": {"message": "Slow down"}}), ErrorKind::RateLimitExceeded),
        (
            400,
            json!({"error": {
                "message": "This endpoint's maximum context length is 8192 tokens.",
                "code": 400
            }}),
            ErrorKind::ContextOverflow,
        ),
        (502, json!({"error": {"message": "Upstream error"}}), ErrorKind::Other),
    ];

    for (status, body, expected) in cases {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let err = provider.send_request(&request()).await.err().unwrap();
        assert_eq!(err.kind(), expected, "status {status}");
    }
}

#[tokio::test]
async fn test_rejects_non_streaming_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": "x"})),
        )
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    let err = provider.send_request(&request()).await.err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Other);
    assert!(err.message().contains("Unexpected content type"));
}
