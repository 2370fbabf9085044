//! Response envelope and file downloads.

use bytes::Bytes;
use paciolus_shared::AppError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ClientError;

/// Outcome of one API call.
///
/// Failures never panic or bubble up as transport errors: they arrive here
/// with `ok == false`, a user-facing `error` and the HTTP `status` (0 when
/// no response was received).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse<T> {
    /// Decoded body, absent on failure and on empty successful responses.
    pub data: Option<T>,
    /// User-facing error message.
    pub error: Option<String>,
    /// HTTP status; 0 for network errors and timeouts.
    pub status: u16,
    /// Whether the call succeeded.
    pub ok: bool,
    /// Whether the data came from the response cache.
    pub cached: bool,
}

impl<T> ApiResponse<T> {
    /// Successful response.
    #[must_use]
    pub const fn success(data: Option<T>, status: u16, cached: bool) -> Self {
        Self {
            data,
            error: None,
            status,
            ok: true,
            cached,
        }
    }

    /// Failed response carrying the error's message and status.
    #[must_use]
    pub fn failure(error: &AppError) -> Self {
        Self {
            data: None,
            error: Some(error.to_string()),
            status: error.status_code(),
            ok: false,
            cached: false,
        }
    }

    /// Failed response for any client error.
    #[must_use]
    pub fn from_error(error: &ClientError) -> Self {
        match error {
            ClientError::Api(error) => Self::failure(error),
            other => Self {
                data: None,
                error: Some(other.to_string()),
                status: other.status_code(),
                ok: false,
                cached: false,
            },
        }
    }

    /// Maps the payload, keeping the envelope.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiResponse<U> {
        ApiResponse {
            data: self.data.map(f),
            error: self.error,
            status: self.status,
            ok: self.ok,
            cached: self.cached,
        }
    }

    /// Converts into a `Result`, requiring data on success.
    pub fn into_result(self) -> Result<T, ClientError> {
        match (self.ok, self.data) {
            (true, Some(data)) => Ok(data),
            (true, None) => Err(ClientError::EmptyResponse),
            (false, _) if (200..300).contains(&self.status) => Err(ClientError::Decode(
                self.error.unwrap_or_default(),
            )),
            (false, _) => Err(ClientError::Api(AppError::from_status(
                self.status,
                self.error,
            ))),
        }
    }
}

impl ApiResponse<Value> {
    /// Decodes the JSON payload into `T`.
    ///
    /// A payload that does not match `T` turns the response into a failure
    /// with the original status.
    #[must_use]
    pub fn decode<T: DeserializeOwned>(self) -> ApiResponse<T> {
        let Self {
            data,
            error,
            status,
            ok,
            cached,
        } = self;
        match data.map(serde_json::from_value::<T>).transpose() {
            Ok(data) => ApiResponse {
                data,
                error,
                status,
                ok,
                cached,
            },
            Err(e) => ApiResponse {
                data: None,
                error: Some(format!("Failed to decode response: {e}")),
                status,
                ok: false,
                cached,
            },
        }
    }
}

/// A downloaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadResult {
    /// File contents.
    pub bytes: Bytes,
    /// File name from `Content-Disposition`, or the caller's default.
    pub filename: String,
    /// `Content-Type` of the response.
    pub content_type: Option<String>,
}

/// Extracts the file name from a `Content-Disposition` header.
///
/// Prefers the RFC 5987 `filename*=` form over `filename=`. Directory
/// components are stripped so the result is safe to join onto a directory.
#[must_use]
pub fn parse_content_disposition(header: &str) -> Option<String> {
    let mut plain = None;
    let mut extended = None;

    for param in header.split(';').map(str::trim) {
        let Some((name, value)) = param.split_once('=') else {
            continue;
        };
        match name.trim().to_ascii_lowercase().as_str() {
            "filename*" => extended = decode_extended(value.trim()),
            "filename" => plain = Some(unquote(value.trim())),
            _ => {}
        }
    }

    extended
        .or(plain)
        .map(|name| basename(&name).to_string())
        .filter(|name| !name.is_empty())
}

fn unquote(value: &str) -> String {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .map_or_else(|| value.to_string(), |v| v.replace("\\\"", "\""))
}

/// Decodes `charset'lang'percent-encoded` values.
fn decode_extended(value: &str) -> Option<String> {
    let mut pieces = value.splitn(3, '\'');
    let _charset = pieces.next()?;
    let _language = pieces.next()?;
    let encoded = pieces.next()?;
    percent_decode(encoded)
}

fn percent_decode(encoded: &str) -> Option<String> {
    let raw = encoded.as_bytes();
    let mut decoded = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'%' {
            let hex = encoded.get(i + 1..i + 3)?;
            decoded.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            decoded.push(raw[i]);
            i += 1;
        }
    }
    String::from_utf8(decoded).ok()
}

fn basename(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name).trim()
}
