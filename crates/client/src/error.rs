//! Client error types and backend error-body parsing.

use paciolus_shared::AppError;
use serde_json::Value;
use thiserror::Error;

/// Errors returned by [`crate::ApiClient`] result conversions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The backend (or the network) rejected the request.
    #[error(transparent)]
    Api(#[from] AppError),

    /// The response body did not match the expected shape.
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// The request could not be built.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A successful response carried no body where one was required.
    #[error("Response contained no data")]
    EmptyResponse,
}

impl ClientError {
    /// HTTP status behind the error; 0 when no response was received.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Api(err) => err.status_code(),
            Self::Decode(_) | Self::InvalidRequest(_) | Self::EmptyResponse => 0,
        }
    }
}

/// Extracts a user-facing message from a backend error body.
///
/// Understands `{"detail": "..."}`, Pydantic-style
/// `{"detail": [{"loc": [...], "msg": "..."}]}`, `{"detail": {"message": ...}}`
/// and top-level `message` / `error` fields.
#[must_use]
pub fn extract_error_detail(body: &Value) -> Option<String> {
    match body {
        Value::String(message) => non_empty(message),
        Value::Object(map) => map
            .get("detail")
            .and_then(detail_message)
            .or_else(|| map.get("message").and_then(Value::as_str).and_then(non_empty))
            .or_else(|| map.get("error").and_then(Value::as_str).and_then(non_empty)),
        _ => None,
    }
}

fn detail_message(detail: &Value) -> Option<String> {
    match detail {
        Value::String(message) => non_empty(message),
        Value::Array(items) => {
            let messages: Vec<String> = items.iter().filter_map(validation_message).collect();
            if messages.is_empty() {
                None
            } else {
                Some(messages.join("; "))
            }
        }
        Value::Object(map) => ["message", "error", "msg"]
            .iter()
            .find_map(|field| map.get(*field).and_then(Value::as_str))
            .and_then(non_empty),
        _ => None,
    }
}

/// Formats one Pydantic validation error as `field: message`.
fn validation_message(item: &Value) -> Option<String> {
    if let Value::String(message) = item {
        return non_empty(message);
    }
    let message = item.get("msg").and_then(Value::as_str)?;
    let field = item
        .get("loc")
        .and_then(Value::as_array)
        .map(|loc| {
            loc.iter()
                .filter(|part| part.as_str() != Some("body"))
                .map(|part| match part {
                    Value::String(name) => name.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(".")
        })
        .unwrap_or_default();

    if field.is_empty() {
        Some(message.to_string())
    } else {
        Some(format!("{field}: {message}"))
    }
}

fn non_empty(message: &str) -> Option<String> {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
