use chatloop::SessionBuilder;
use chatloop::core::AgentStep;
use chatloop::core::conversation::Role;
use chatloop::tools::SearchTool;
use chatloop_openai_model::{OpenAIConfigBuilder, OpenAIProvider};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sse_body(text: &str) -> String {
    let delta = json!({
        "id": "gen-1",
        "choices": [{"delta": {"content": text}, "finish_reason": null}]
    });
    let stop = json!({
        "id": "gen-1",
        "choices": [{"delta": {}, "finish_reason": "stop"}]
    });
    format!("data: {delta}\n\ndata: {stop}\n\ndata: [DONE]\n\n")
}

async fn mount_completion(server: &MockServer, text: &str) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(sse_body(text), "text/event-stream"),
        )
        .up_to_n_times(1)
        .expect(1)
        .mount(server)
        .await;
}

fn provider_for(server: &MockServer) -> OpenAIProvider {
    let config = OpenAIConfigBuilder::with_api_key("sk-or-test")
        .with_base_url(server.uri())
        .build();
    OpenAIProvider::new(config)
}

#[tokio::test]
async fn test_calculator_turn() {
    let server = MockServer::start().await;
    mount_completion(
        &server,
        "Thought: I need to multiply.\nAction: calculator\nAction Input: 12 * 7",
    )
    .await;
    mount_completion(
        &server,
        "Thought: I now know the final answer\nFinal Answer: 84",
    )
    .await;

    let mut session = SessionBuilder::with_model_provider(provider_for(&server))
        .with_calculator()
        .build();
    let outcome = session.send_message("What is 12 * 7?").await.unwrap();

    assert_eq!(outcome.answer, "84");
    assert_eq!(outcome.iterations, 2);
    assert!(
        outcome
            .steps
            .contains(&AgentStep::Observation("84".to_owned()))
    );

    let history = session.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role(), Role::User);
    assert_eq!(history[1].content(), "84");
}

#[tokio::test]
async fn test_search_turn() {
    let model_server = MockServer::start().await;
    mount_completion(
        &model_server,
        "Action: search\nAction Input: \"capital of France\"",
    )
    .await;
    mount_completion(&model_server, "Final Answer: Paris").await;

    let search_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search.json"))
        .and(query_param("q", "capital of France"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "answer_box": {"answer": "Paris"}
        })))
        .expect(1)
        .mount(&search_server)
        .await;

    let search_tool =
        SearchTool::new("serp-test-key").with_base_url(search_server.uri());
    let mut session =
        SessionBuilder::with_model_provider(provider_for(&model_server))
            .with_search_tool(search_tool)
            .with_calculator()
            .build();
    let outcome = session.send_message("What is the capital of France?").await.unwrap();

    assert_eq!(outcome.answer, "Paris");
    assert_eq!(outcome.transcript[2].tool_name(), Some("search"));
    assert_eq!(outcome.transcript[2].content(), "Paris");
}
