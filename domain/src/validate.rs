//! Lightweight input validation helpers shared by the sanitizer. Keep logic
//! minimal and deterministic.

use url::Url;

use crate::{CoreError, RawWeight};

const MAX_URL_LENGTH: usize = 2048;

/// Validate a destination URL: absolute, with a scheme and a host.
///
/// The input is expected to be trimmed already; the string itself is kept
/// as-is by callers (no normalization), so a sanitized value stays a fixed
/// point.
pub fn validate_destination_url(s: &str) -> Result<(), CoreError> {
    if s.is_empty() {
        return Err(CoreError::InvalidUrl("empty".into()));
    }
    if s.len() > MAX_URL_LENGTH {
        return Err(CoreError::InvalidUrl("too long".into()));
    }
    if s.chars().any(|c| c.is_control() || c.is_whitespace()) {
        return Err(CoreError::InvalidUrl("contains whitespace or control characters".into()));
    }
    let parsed = Url::parse(s).map_err(|e| CoreError::InvalidUrl(format!("{}: {}", s, e)))?;
    if parsed.cannot_be_a_base() || !parsed.has_host() {
        return Err(CoreError::InvalidUrl(format!("{}: missing host", s)));
    }
    Ok(())
}

/// Coerce a raw weight into a finite, non-negative float. Anything that does
/// not parse, or parses to NaN/infinity, becomes `0.0`.
pub fn coerce_weight(raw: &RawWeight) -> f64 {
    let value = match raw {
        RawWeight::Number(n) => *n,
        RawWeight::Text(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        RawWeight::Missing => 0.0,
    };
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_validation_basic() {
        assert!(validate_destination_url("https://example.com").is_ok());
        assert!(validate_destination_url("http://example.com/path?q=1").is_ok());
        assert!(validate_destination_url("ftp://files.example.com").is_ok());
        assert!(validate_destination_url("").is_err());
        assert!(validate_destination_url("not-a-url").is_err());
        assert!(validate_destination_url("mailto:someone@example.com").is_err());
        assert!(validate_destination_url("https://exa mple.com").is_err());
    }

    #[test]
    fn url_validation_length_cap() {
        let long = format!("https://example.com/{}", "a".repeat(MAX_URL_LENGTH));
        assert!(matches!(
            validate_destination_url(&long),
            Err(CoreError::InvalidUrl(_))
        ));
    }

    #[test]
    fn weight_coercion() {
        assert_eq!(coerce_weight(&RawWeight::Number(12.5)), 12.5);
        assert_eq!(coerce_weight(&RawWeight::Text(" 40 ".into())), 40.0);
        assert_eq!(coerce_weight(&RawWeight::Text("abc".into())), 0.0);
        assert_eq!(coerce_weight(&RawWeight::Text("".into())), 0.0);
        assert_eq!(coerce_weight(&RawWeight::Number(-3.0)), 0.0);
        assert_eq!(coerce_weight(&RawWeight::Text("NaN".into())), 0.0);
        assert_eq!(coerce_weight(&RawWeight::Text("inf".into())), 0.0);
        assert_eq!(coerce_weight(&RawWeight::Missing), 0.0);
    }
}
