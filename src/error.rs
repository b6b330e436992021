use thiserror::Error;

/// Shown when neither the backend nor the transport produced any text.
pub const GENERIC_FAILURE: &str = "Something went wrong. Please try again.";

const MAX_BODY_MESSAGE: usize = 500;
const MB: f64 = 1024.0 * 1024.0;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Caller misuse: missing file or id, unset backend. Never reaches the network.
    #[error("{0}")]
    Input(String),

    /// Client-side size policy violation, raised before any request is sent.
    #[error("{}", too_large_message(.size, .limit))]
    PayloadTooLarge { size: u64, limit: u64 },

    /// Network failure, non-2xx status or a body that could not be parsed.
    #[error("{message}")]
    Transport { status: Option<u16>, message: String },
}

impl ClientError {
    pub fn input(message: impl Into<String>) -> Self {
        ClientError::Input(message.into())
    }

    pub fn transport(status: Option<u16>, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            GENERIC_FAILURE.to_string()
        } else {
            message
        };
        ClientError::Transport { status, message }
    }

    /// Human-readable message; never empty.
    pub fn message(&self) -> String {
        let msg = self.to_string();
        if msg.trim().is_empty() {
            GENERIC_FAILURE.to_string()
        } else {
            msg
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Transport { status, .. } => *status,
            _ => None,
        }
    }

    /// Build the error for a non-2xx response.
    ///
    /// Precedence: structured detail in a JSON body, then the plain-text
    /// body, then the status line, then the generic fallback.
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        let text = String::from_utf8_lossy(body);
        let text = text.trim();

        if let Ok(value) = serde_json::from_str::<serde_json::Value>(text) {
            if let Some(detail) = structured_detail(&value) {
                return ClientError::transport(Some(status), detail);
            }
        }
        if !text.is_empty() {
            return ClientError::transport(Some(status), truncate(text, MAX_BODY_MESSAGE));
        }
        ClientError::transport(Some(status), format!("Request failed with status code {}", status))
    }
}

/// Extract the backend's own error text from a JSON error body.
///
/// Recognized shapes: `{"error": {"detail": X}}`, `{"detail": X}`,
/// `{"error": X}` and `{"message": X}`. A validation array under `detail`
/// yields its first `msg`.
pub fn structured_detail(value: &serde_json::Value) -> Option<String> {
    let candidates = [
        value.pointer("/error/detail"),
        value.get("detail"),
        value.get("error"),
        value.get("message"),
    ];
    candidates.into_iter().flatten().find_map(detail_text)
}

fn detail_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Array(items) => items.iter().find_map(|item| {
            item.get("msg")
                .and_then(|m| m.as_str())
                .filter(|m| !m.trim().is_empty())
                .map(|m| m.to_string())
        }),
        _ => None,
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}

/// Sizes in MB to one decimal, or exact byte counts when the rounded
/// figures would read the same.
fn too_large_message(size: &u64, limit: &u64) -> String {
    let size_mb = format!("{:.1}", *size as f64 / MB);
    let limit_mb = format!("{:.1}", *limit as f64 / MB);
    if size_mb == limit_mb {
        format!(
            "File too large: {} bytes exceeds the {} byte upload limit",
            size, limit
        )
    } else {
        format!(
            "File too large: {} MB exceeds the {} MB upload limit",
            size_mb, limit_mb
        )
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::transport(err.status().map(|s| s.as_u16()), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_detail_wins() {
        let err = ClientError::from_response(400, br#"{"error":{"detail":"X"}}"#);
        assert_eq!(err.message(), "X");
        assert_eq!(err.status(), Some(400));
    }

    #[test]
    fn test_fastapi_detail_string() {
        let err = ClientError::from_response(404, br#"{"detail":"Analysis not found or expired."}"#);
        assert_eq!(err.message(), "Analysis not found or expired.");
    }

    #[test]
    fn test_validation_array_uses_first_msg() {
        let body = br#"{"detail":[{"loc":["body","file"],"msg":"field required","type":"value_error.missing"}]}"#;
        let err = ClientError::from_response(422, body);
        assert_eq!(err.message(), "field required");
    }

    #[test]
    fn test_plain_text_body_is_used() {
        let err = ClientError::from_response(502, b"  Bad Gateway from proxy \n");
        assert_eq!(err.message(), "Bad Gateway from proxy");
    }

    #[test]
    fn test_empty_body_falls_back_to_status_line() {
        let err = ClientError::from_response(503, b"");
        assert_eq!(err.message(), "Request failed with status code 503");
    }

    #[test]
    fn test_blank_transport_message_never_empty() {
        let err = ClientError::transport(None, "   ");
        assert_eq!(err.message(), GENERIC_FAILURE);
    }

    #[test]
    fn test_long_body_is_truncated() {
        let body = "e".repeat(2000);
        let msg = ClientError::from_response(500, body.as_bytes()).message();
        assert_eq!(msg.chars().count(), MAX_BODY_MESSAGE + 1);
    }

    #[test]
    fn test_payload_too_large_cites_both_sizes() {
        let err = ClientError::PayloadTooLarge {
            size: 25 * 1024 * 1024,
            limit: 20 * 1024 * 1024,
        };
        assert_eq!(
            err.message(),
            "File too large: 25.0 MB exceeds the 20.0 MB upload limit"
        );
    }

    #[test]
    fn test_payload_too_large_near_limit_uses_bytes() {
        let err = ClientError::PayloadTooLarge {
            size: 20 * 1024 * 1024 + 30_000,
            limit: 20 * 1024 * 1024,
        };
        assert_eq!(
            err.message(),
            "File too large: 21001520 bytes exceeds the 20971520 byte upload limit"
        );
    }

    #[test]
    fn test_payload_too_large_small_limits_use_bytes() {
        let err = ClientError::PayloadTooLarge { size: 8042, limit: 2000 };
        assert_eq!(
            err.message(),
            "File too large: 8042 bytes exceeds the 2000 byte upload limit"
        );
    }
}
