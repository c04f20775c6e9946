//! Shared HTTP utilities for the weighted redirect workspace.
//!
//! Provides common response builders, path decoding, and time formatting
//! used by the api-server, kept framework-agnostic.

use chrono::{DateTime, SecondsFormat, Utc};
use std::time::SystemTime;

// ============================================================================
// JSON Response Helpers (framework-agnostic)
// ============================================================================

/// Create a structured error JSON with a default message based on the code.
///
/// Returns: `{"error": {"code": "<code>", "message": "<default message>"}}`
pub fn json_err(code: &str) -> serde_json::Value {
    let message = match code {
        "not_found" => "Resource not found",
        "bad_request" => "Bad request",
        "invalid_keyword" => "Invalid keyword format",
        "unauthorized" => "Authentication required",
        "error" | "internal" => "Internal server error",
        _ => code, // Fallback to code as message for unknown codes
    };
    serde_json::json!({"error": {"code": code, "message": message}})
}

/// Create a structured error JSON with a custom message.
///
/// Returns: `{"error": {"code": "<code>", "message": "<message>"}}`
pub fn json_error_with_message(code: &str, message: &str) -> serde_json::Value {
    serde_json::json!({"error": {"code": code, "message": message}})
}

// ============================================================================
// Path Helpers
// ============================================================================

/// Percent-decode a request path into a raw keyword candidate.
///
/// Returns `None` when the decoded bytes are not valid UTF-8. Slashes are
/// left in place; keyword sanitization strips and collapses them.
pub fn decode_path(path: &str) -> Option<String> {
    urlencoding::decode(path).ok().map(|s| s.into_owned())
}

/// Round a percentage for display (two decimal places).
pub fn round_share(pct: f64) -> f64 {
    (pct * 100.0).round() / 100.0
}

// ============================================================================
// Time Utilities
// ============================================================================

/// Convert SystemTime to RFC3339 string (seconds precision, UTC).
pub fn system_time_to_rfc3339(t: SystemTime) -> String {
    let dt: DateTime<Utc> = t.into();
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_json_err() {
        let err = json_err("not_found");
        assert_eq!(err, serde_json::json!({"error": {"code": "not_found", "message": "Resource not found"}}));

        // Unknown code falls back to code as message
        let err = json_err("custom_error");
        assert_eq!(err, serde_json::json!({"error": {"code": "custom_error", "message": "custom_error"}}));
    }

    #[test]
    fn test_json_error_with_message() {
        let err = json_error_with_message("invalid_keyword", "bad keyword!");
        assert_eq!(
            err,
            serde_json::json!({"error": {"code": "invalid_keyword", "message": "bad keyword!"}})
        );
    }

    #[test]
    fn test_decode_path() {
        assert_eq!(decode_path("/promo/spring").as_deref(), Some("/promo/spring"));
        assert_eq!(decode_path("/a%2Fb").as_deref(), Some("/a/b"));
        assert_eq!(decode_path("/caf%C3%A9").as_deref(), Some("/café"));
        assert_eq!(decode_path("/%FF"), None);
    }

    #[test]
    fn test_round_share() {
        assert_eq!(round_share(33.333333), 33.33);
        assert_eq!(round_share(66.666666), 66.67);
        assert_eq!(round_share(0.0), 0.0);
    }

    #[test]
    fn test_system_time_to_rfc3339() {
        let t = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        assert_eq!(system_time_to_rfc3339(t), "2023-11-14T22:13:20Z");
    }
}
