//! Result Normalization
//!
//! Maps each adapter's raw sign-in result onto the canonical
//! [`TokenResponse`] shape. Pure: no I/O, no shared state, same output for
//! the same inputs.

use crate::error::{Error, Result};
use crate::models::{RawTokenPayload, TokenResponse};

/// Normalize a raw platform payload into the canonical response.
///
/// - Empty-string sentinels on optional fields collapse to true absence.
/// - Floating-point epoch seconds convert to integer milliseconds; expiry
///   is omitted when the platform provided none.
/// - The nonce appears in the output only when an ID token is present. A
///   platform-echoed nonce must match the attempt nonce when one was
///   generated; without an attempt nonce, the platform's echo passes
///   through as-is. A nonce is never fabricated.
pub fn normalize(raw: RawTokenPayload, attempt_nonce: Option<&str>) -> Result<TokenResponse> {
    if raw.access_token.is_empty() {
        return Err(Error::Adapter(
            "platform returned no access token".to_string(),
        ));
    }

    let id_token = none_if_empty(raw.id_token);
    let refresh_token = none_if_empty(raw.refresh_token);

    let expires_at = raw
        .expires_at
        .or_else(|| raw.expiration_seconds.map(seconds_to_millis));

    let nonce = match id_token {
        Some(_) => match (none_if_empty(raw.nonce), attempt_nonce) {
            (Some(echoed), Some(expected)) if echoed != expected => {
                return Err(Error::Adapter(
                    "ID token nonce does not match the attempt nonce".to_string(),
                ));
            }
            (Some(echoed), _) => Some(echoed),
            (None, _) => None,
        },
        None => None,
    };

    Ok(TokenResponse {
        id_token,
        access_token: raw.access_token,
        scopes: raw.scopes,
        refresh_token,
        expires_at,
        nonce,
    })
}

fn none_if_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn seconds_to_millis(seconds: f64) -> i64 {
    (seconds * 1000.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw() -> RawTokenPayload {
        RawTokenPayload {
            access_token: "tok1".to_string(),
            id_token: Some("jwt1".to_string()),
            refresh_token: None,
            scopes: vec!["openid".to_string(), "email".to_string()],
            nonce: Some("n1".to_string()),
            expires_at: None,
            expiration_seconds: Some(1_700_000_000.0),
        }
    }

    #[test]
    fn test_canonical_mapping() {
        let response = normalize(raw(), Some("n1")).unwrap();
        assert_eq!(response.access_token, "tok1");
        assert_eq!(response.id_token.as_deref(), Some("jwt1"));
        assert_eq!(response.nonce.as_deref(), Some("n1"));
        assert_eq!(response.scopes, vec!["openid", "email"]);
        assert_eq!(response.expires_at, Some(1_700_000_000_000));
    }

    #[test]
    fn test_missing_access_token_is_an_adapter_failure() {
        let mut payload = raw();
        payload.access_token = String::new();
        assert!(matches!(
            normalize(payload, None),
            Err(Error::Adapter(_))
        ));
    }

    #[test]
    fn test_empty_string_refresh_token_collapses_to_absent() {
        let mut payload = raw();
        payload.refresh_token = Some(String::new());
        let response = normalize(payload, Some("n1")).unwrap();
        assert_eq!(response.refresh_token, None);
    }

    #[test]
    fn test_millisecond_expiry_wins_over_seconds() {
        let mut payload = raw();
        payload.expires_at = Some(1_800_000_000_000);
        let response = normalize(payload, Some("n1")).unwrap();
        assert_eq!(response.expires_at, Some(1_800_000_000_000));
    }

    #[test]
    fn test_expiry_omitted_when_platform_gives_none() {
        let mut payload = raw();
        payload.expiration_seconds = None;
        let response = normalize(payload, Some("n1")).unwrap();
        assert_eq!(response.expires_at, None);
    }

    #[test]
    fn test_nonce_never_fabricated_without_id_token() {
        let mut payload = raw();
        payload.id_token = None;
        payload.nonce = None;
        let response = normalize(payload, Some("attempt-nonce")).unwrap();
        assert_eq!(response.nonce, None);
    }

    #[test]
    fn test_nonce_dropped_when_id_token_absent_despite_echo() {
        let mut payload = raw();
        payload.id_token = None;
        let response = normalize(payload, Some("n1")).unwrap();
        assert_eq!(response.nonce, None);
    }

    #[test]
    fn test_mismatched_echo_nonce_is_rejected() {
        let payload = raw();
        assert!(matches!(
            normalize(payload, Some("different-nonce")),
            Err(Error::Adapter(_))
        ));
    }

    #[test]
    fn test_platform_nonce_passes_through_without_attempt_nonce() {
        let response = normalize(raw(), None).unwrap();
        assert_eq!(response.nonce.as_deref(), Some("n1"));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let first = normalize(raw(), Some("n1")).unwrap();
        let second = normalize(raw(), Some("n1")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_fractional_seconds_round_to_millis() {
        let mut payload = raw();
        payload.expiration_seconds = Some(1_700_000_000.5);
        let response = normalize(payload, Some("n1")).unwrap();
        assert_eq!(response.expires_at, Some(1_700_000_000_500));
    }
}
