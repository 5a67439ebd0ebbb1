use std::fmt::{self, Debug};
use std::sync::Arc;

use chatloop_core::tool::{Error as ToolError, Tool, ToolResult};
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::Value;

const DEFAULT_BASE_URL: &str = "https://serpapi.com";
const MAX_SNIPPETS: usize = 3;
const NO_RESULT: &str = "No good search result found";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    error: Option<String>,
    answer_box: Option<OneOrMany<AnswerBox>>,
    knowledge_graph: Option<KnowledgeGraph>,
    sports_results: Option<SportsResults>,
    #[serde(default)]
    organic_results: Vec<OrganicResult>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    fn first(&self) -> Option<&T> {
        match self {
            OneOrMany::One(item) => Some(item),
            OneOrMany::Many(items) => items.first(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AnswerBox {
    answer: Option<String>,
    snippet: Option<String>,
    #[serde(default)]
    snippet_highlighted_words: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct KnowledgeGraph {
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SportsResults {
    game_spotlight: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct OrganicResult {
    snippet: Option<String>,
}

impl SearchResponse {
    /// Picks the most direct answer out of the result page.
    fn into_answer(self) -> ToolResult {
        if let Some(error) = self.error {
            return Err(ToolError::execution_error().with_reason(error));
        }

        let answer_box = self.answer_box.as_ref().and_then(OneOrMany::first);
        if let Some(answer_box) = answer_box {
            let text = answer_box
                .answer
                .as_ref()
                .or(answer_box.snippet.as_ref())
                .or(answer_box.snippet_highlighted_words.first());
            if let Some(text) = text {
                return Ok(text.clone());
            }
        }

        if let Some(description) =
            self.knowledge_graph.and_then(|graph| graph.description)
        {
            return Ok(description);
        }

        if let Some(spotlight) =
            self.sports_results.and_then(|sports| sports.game_spotlight)
        {
            return Ok(spotlight.to_string());
        }

        let snippets: Vec<_> = self
            .organic_results
            .into_iter()
            .filter_map(|result| result.snippet)
            .take(MAX_SNIPPETS)
            .collect();
        if snippets.is_empty() {
            return Ok(NO_RESULT.to_owned());
        }
        Ok(snippets.join("\n"))
    }
}

/// A tool that searches the web via the SerpApi Google engine.
#[derive(Clone)]
pub struct SearchTool {
    client: Client,
    api_key: Arc<str>,
    base_url: Arc<str>,
}

impl SearchTool {
    /// Creates a new search tool with the given SerpApi key.
    #[inline]
    pub fn new<S: Into<String>>(api_key: S) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into().into(),
            base_url: DEFAULT_BASE_URL.into(),
        }
    }

    /// Sets a custom base URL, mostly for testing.
    #[inline]
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').into();
        self
    }
}

impl Debug for SearchTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchTool")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl Tool for SearchTool {
    fn name(&self) -> &str {
        "search"
    }

    fn description(&self) -> &str {
        r#"
A search engine. Useful for when you need to answer questions about current events.
Input should be a search query."#
    }

    fn execute(
        &self,
        input: String,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let client = self.client.clone();
        let api_key = Arc::clone(&self.api_key);
        let base_url = Arc::clone(&self.base_url);

        async move {
            let query = input.trim().trim_matches('"').trim();
            if query.is_empty() {
                return Err(ToolError::invalid_input()
                    .with_reason("the search query is empty"));
            }

            let url = Url::parse_with_params(
                &format!("{base_url}/search.json"),
                [
                    ("q", query),
                    ("engine", "google"),
                    ("api_key", &*api_key),
                ],
            )
            .map_err(|err| {
                ToolError::execution_error().with_reason(err.to_string())
            })?;

            debug!("searching for {query:?}");
            let resp = client.get(url).send().await.map_err(|err| {
                warn!("search request failed: {err}");
                ToolError::execution_error()
                    .with_reason(format!("search request failed: {err}"))
            })?;

            let status = resp.status();
            let body = resp.text().await.map_err(|err| {
                ToolError::execution_error().with_reason(err.to_string())
            })?;
            let parsed = serde_json::from_str::<SearchResponse>(&body);

            if !status.is_success() {
                let reason = match parsed {
                    Ok(SearchResponse {
                        error: Some(error), ..
                    }) => error,
                    _ => format!("search failed with status {status}"),
                };
                warn!("search failed: {reason}");
                return Err(ToolError::execution_error().with_reason(reason));
            }

            parsed
                .map_err(|err| {
                    ToolError::execution_error()
                        .with_reason(format!("malformed search result: {err}"))
                })?
                .into_answer()
        }
    }
}

#[cfg(test)]
mod tests {
    use chatloop_core::tool::ErrorKind;
    use serde_json::json;

    use super::*;

    fn answer(value: Value) -> ToolResult {
        serde_json::from_value::<SearchResponse>(value)
            .unwrap()
            .into_answer()
    }

    #[test]
    fn test_answer_priority() {
        assert_eq!(
            answer(json!({
                "answer_box": {"answer": "22°C", "snippet": "Sunny"},
                "knowledge_graph": {"description": "Paris is..."},
                "organic_results": [{"snippet": "Weather in Paris"}],
            }))
            .unwrap(),
            "22°C"
        );
        assert_eq!(
            answer(json!({
                "answer_box": [{"snippet_highlighted_words": ["Everest"]}],
                "organic_results": [{"snippet": "Mountains"}],
            }))
            .unwrap(),
            "Everest"
        );
        assert_eq!(
            answer(json!({
                "answer_box": {"title": "No text here"},
                "knowledge_graph": {"description": "A city in France."},
            }))
            .unwrap(),
            "A city in France."
        );
        assert_eq!(
            answer(json!({
                "sports_results": {"game_spotlight": {"score": "2-1"}},
            }))
            .unwrap(),
            r#"{"score":"2-1"}"#
        );
        assert_eq!(
            answer(json!({
                "organic_results": [
                    {"snippet": "one"},
                    {"title": "no snippet"},
                    {"snippet": "two"},
                    {"snippet": "three"},
                    {"snippet": "four"},
                ],
            }))
            .unwrap(),
            "one\ntwo\nthree"
        );
        assert_eq!(answer(json!({})).unwrap(), NO_RESULT);
    }

    #[test]
    fn test_error_field() {
        let err = answer(json!({"error": "Invalid API key."})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExecutionError);
        assert_eq!(err.reason(), "Invalid API key.");
    }

    #[test]
    fn test_debug_redacts_key() {
        let tool = SearchTool::new("secret-key");
        assert!(!format!("{tool:?}").contains("secret-key"));
    }
}
