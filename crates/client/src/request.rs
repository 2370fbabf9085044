//! Request bodies and per-call options.

use std::time::Duration;

use bytes::Bytes;
use reqwest::Method;
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::error::ClientError;

/// Request body.
#[derive(Debug, Clone)]
pub enum RequestBody {
    /// JSON payload, sent with `Content-Type: application/json`.
    Json(Value),
    /// Multipart form, e.g. a trial-balance upload.
    Form(FormData),
}

impl RequestBody {
    /// Serializes `value` into a JSON body.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, ClientError> {
        serde_json::to_value(value)
            .map(Self::Json)
            .map_err(|e| ClientError::InvalidRequest(e.to_string()))
    }
}

impl From<Value> for RequestBody {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl From<FormData> for RequestBody {
    fn from(form: FormData) -> Self {
        Self::Form(form)
    }
}

/// One multipart field.
#[derive(Debug, Clone)]
pub enum FormPart {
    /// Plain text field.
    Text(String),
    /// File field.
    File {
        /// File contents.
        bytes: Bytes,
        /// File name reported to the backend.
        filename: String,
        /// MIME type, if known.
        mime: Option<String>,
    },
}

/// Multipart form that can be rebuilt for every retry attempt.
///
/// `reqwest::multipart::Form` is consumed on send, so the client keeps this
/// description and materialises a fresh form per attempt.
#[derive(Debug, Clone, Default)]
pub struct FormData {
    parts: Vec<(String, FormPart)>,
}

impl FormData {
    /// Creates an empty form.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a text field.
    #[must_use]
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push((name.into(), FormPart::Text(value.into())));
        self
    }

    /// Adds a file field.
    #[must_use]
    pub fn file(
        mut self,
        name: impl Into<String>,
        bytes: impl Into<Bytes>,
        filename: impl Into<String>,
        mime: Option<&str>,
    ) -> Self {
        self.parts.push((
            name.into(),
            FormPart::File {
                bytes: bytes.into(),
                filename: filename.into(),
                mime: mime.map(ToString::to_string),
            },
        ));
        self
    }

    /// Fields in insertion order.
    #[must_use]
    pub fn parts(&self) -> &[(String, FormPart)] {
        &self.parts
    }

    pub(crate) fn to_multipart(&self) -> Result<Form, ClientError> {
        let mut form = Form::new();
        for (name, part) in &self.parts {
            form = match part {
                FormPart::Text(value) => form.text(name.clone(), value.clone()),
                FormPart::File {
                    bytes,
                    filename,
                    mime,
                } => {
                    let mut file = Part::bytes(bytes.to_vec()).file_name(filename.clone());
                    if let Some(mime) = mime {
                        file = file
                            .mime_str(mime)
                            .map_err(|e| ClientError::InvalidRequest(e.to_string()))?;
                    }
                    form.part(name.clone(), file)
                }
            };
        }
        Ok(form)
    }
}

/// Per-call options.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Bearer token overriding the session token.
    pub token: Option<String>,
    /// Bypass the response cache for reads and writes.
    pub skip_cache: bool,
    /// Timeout overriding the client default.
    pub timeout: Option<Duration>,
    /// Sent as `Idempotency-Key`; also makes POST/PATCH retryable.
    pub idempotency_key: Option<String>,
    /// Retry budget overriding the client policy.
    pub max_retries: Option<u32>,
    /// Extra headers.
    pub headers: Vec<(String, String)>,
}

impl RequestOptions {
    /// Default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `token` instead of the session token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Bypasses the response cache.
    #[must_use]
    pub fn skip_cache(mut self) -> Self {
        self.skip_cache = true;
        self
    }

    /// Overrides the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets an explicit idempotency key.
    #[must_use]
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    /// Generates a fresh idempotency key.
    #[must_use]
    pub fn idempotent(self) -> Self {
        self.with_idempotency_key(Uuid::new_v4().to_string())
    }

    /// Overrides the retry budget.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Adds an extra header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Whether `method` changes server state and needs a CSRF token.
#[must_use]
pub fn is_mutating(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}
