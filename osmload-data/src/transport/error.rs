//! Structured failure shared by every upload transport.

use serde::Deserialize;
use thiserror::Error;

/// A failed store call.
///
/// `status` is the HTTP status for protocol-level failures and `0` when no
/// response was received (connection refused, process failed to start, ...).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("store request failed (status {status}{}): {message}", provider_suffix(.provider_code))]
pub struct ApiError {
    /// Human-readable description.
    pub message: String,
    /// HTTP status, or `0` for transport-level failures.
    pub status: u16,
    /// Store-specific error number parsed from the response body.
    pub provider_code: Option<i64>,
}

fn provider_suffix(code: &Option<i64>) -> String {
    code.map(|code| format!(", error {code}")).unwrap_or_default()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error_message: Option<String>,
    error_num: Option<i64>,
}

impl ApiError {
    /// Construct an error from its parts.
    pub fn new(message: impl Into<String>, status: u16, provider_code: Option<i64>) -> Self {
        Self {
            message: message.into(),
            status,
            provider_code,
        }
    }

    /// A failure with no HTTP response.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(message, 0, None)
    }

    /// Map a non-success response to an error.
    ///
    /// Uses `errorMessage` and `errorNum` from a JSON error body when
    /// present, otherwise the raw body text, otherwise the status reason.
    ///
    /// # Examples
    /// ```
    /// use osmload_data::transport::ApiError;
    ///
    /// let body = br#"{"error":true,"errorMessage":"duplicate name","errorNum":1207}"#;
    /// let err = ApiError::from_response(409, body);
    /// assert_eq!(err.message, "duplicate name");
    /// assert_eq!(err.provider_code, Some(1207));
    /// assert!(err.is_conflict());
    /// ```
    #[must_use]
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        let mut scratch = body.to_vec();
        if let Ok(parsed) = simd_json::serde::from_slice::<ErrorBody>(&mut scratch)
            && (parsed.error_message.is_some() || parsed.error_num.is_some())
        {
            let message = parsed
                .error_message
                .unwrap_or_else(|| canonical_reason(status));
            return Self::new(message, status, parsed.error_num);
        }
        let text = String::from_utf8_lossy(body);
        let text = text.trim();
        let message = if text.is_empty() {
            canonical_reason(status)
        } else {
            text.to_owned()
        };
        Self::new(message, status, None)
    }

    /// Whether the store reported a conflict (HTTP 409).
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        self.status == 409
    }
}

fn canonical_reason(status: u16) -> String {
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .map_or_else(|| format!("HTTP {status}"), str::to_owned)
}
