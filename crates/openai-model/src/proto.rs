use chatloop_model::{ErrorKind, ModelMessage, ModelRequest};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::OpenAIConfig;

// ------------------------------
// Types received from the server
// ------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct Choice {
    pub delta: Delta,
    pub finish_reason: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct Delta {
    pub content: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub message: String,
    // OpenAI sends string codes, OpenRouter sends the HTTP status.
    pub code: Option<Value>,
    pub r#type: Option<String>,
}

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System { content: String },
    User { content: String },
    Assistant { content: String },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop: Vec<String>,
    stream: bool,
}

// -----------
// Conversions
// -----------

#[inline]
pub fn create_request(
    req: &ModelRequest,
    config: &OpenAIConfig,
) -> ChatCompletionRequest {
    ChatCompletionRequest {
        model: config.model.clone(),
        messages: req.messages.iter().map(create_message).collect(),
        temperature: config.temperature,
        max_tokens: config.max_tokens,
        stop: req.stop.clone(),
        stream: true,
    }
}

#[inline]
fn create_message(msg: &ModelMessage) -> Message {
    let content = msg.content().to_owned();
    match msg {
        ModelMessage::System(_) => Message::System { content },
        ModelMessage::User(_) => Message::User { content },
        ModelMessage::Assistant(_) => Message::Assistant { content },
    }
}

/// Classifies a failed response by its status and (possibly JSON) body.
pub fn classify_error(status: StatusCode, body: &str) -> (ErrorKind, String) {
    let detail = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .map(|b| b.error);
    let message = match &detail {
        Some(detail) if !detail.message.is_empty() => {
            format!("{status}: {}", detail.message)
        }
        _ if body.trim().is_empty() => status.to_string(),
        _ => format!("{status}: {}", body.trim()),
    };

    let kind = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ErrorKind::Unauthorized
        }
        StatusCode::TOO_MANY_REQUESTS => ErrorKind::RateLimitExceeded,
        _ => detail
            .as_ref()
            .map(classify_detail)
            .unwrap_or(ErrorKind::Other),
    };
    (kind, message)
}

/// Classifies an error object, either from an error response or from an
/// error event in the middle of a stream.
pub fn classify_detail(detail: &ErrorDetail) -> ErrorKind {
    let code = match &detail.code {
        Some(Value::String(code)) => code.as_str(),
        _ => detail.r#type.as_deref().unwrap_or_default(),
    };
    let message = detail.message.to_ascii_lowercase();
    if code == "context_length_exceeded"
        || message.contains("context length")
        || message.contains("context window")
    {
        ErrorKind::ContextOverflow
    } else if code == "content_filter" || code == "moderation" {
        ErrorKind::Moderated
    } else if code == "rate_limit_exceeded" {
        ErrorKind::RateLimitExceeded
    } else {
        ErrorKind::Other
    }
}
