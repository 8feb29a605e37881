//! Bridge Wire Types
//!
//! Request and response shapes exchanged with the calling application, plus
//! the raw payload shape the platform adapters hand to the normalizer.
//! Wire naming is camelCase; timestamps are integer milliseconds since the
//! Unix epoch.

use serde::{Deserialize, Serialize};
use std::fmt;

// ── Requests ────────────────────────────────────────────────────────────────

/// Configuration for one sign-in attempt. Immutable once constructed;
/// validated by the flow orchestrator before any adapter call.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInRequest {
    pub client_id: String,
    /// Required by the desktop adapter for the token exchange.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    /// Server (web) client ID, for platforms that mint server-auditable
    /// ID tokens against a backend client.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<String>>,
    /// Restrict sign-in to a hosted G Suite domain.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hosted_domain: Option<String>,
    /// Pre-fill the account picker / email field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login_hint: Option<String>,
    /// Overrides the default loopback redirect on desktop.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,
    /// HTML shown in the browser after a successful desktop redirect.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success_html_response: Option<String>,
}

impl SignInRequest {
    /// The granted view of the requested scopes (empty when absent).
    pub fn scopes(&self) -> &[String] {
        self.scopes.as_deref().unwrap_or_default()
    }

    /// Whether this attempt may produce an ID token, and therefore needs a
    /// replay-protection nonce.
    pub fn requests_id_token(&self) -> bool {
        self.scopes().iter().any(|s| s == "openid")
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignOutRequest {
    /// When absent, sign-out is local-only and performs no revocation call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
}

// ── Responses ───────────────────────────────────────────────────────────────

/// Canonical token response, identical across platforms.
///
/// Invariants: `access_token` is non-empty on success; `nonce` is present
/// if and only if `id_token` is present.
#[derive(Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub id_token: Option<String>,
    pub access_token: String,
    pub scopes: Vec<String>,
    pub refresh_token: Option<String>,
    /// Access-token expiry, milliseconds since the Unix epoch.
    pub expires_at: Option<i64>,
    pub nonce: Option<String>,
}

// Redact token material when the response is formatted for logs.
impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("id_token", &self.id_token.as_ref().map(|_| "[REDACTED]"))
            .field("access_token", &"[REDACTED]")
            .field("scopes", &self.scopes)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_at", &self.expires_at)
            .field("nonce", &self.nonce)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignOutResponse {
    pub success: bool,
}

// ── Raw adapter payload ─────────────────────────────────────────────────────

/// What a platform adapter actually resolves with, before normalization.
///
/// The native SDKs disagree on optionality: one reports an absent refresh
/// token as an empty string, another omits the key, one lists granted
/// scopes under `grantedScopes`, and expiry arrives either as integer
/// milliseconds or floating-point epoch seconds. The normalizer reconciles
/// all of it; adapters never shape this into the canonical response.
#[derive(Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTokenPayload {
    #[serde(default)]
    pub access_token: String,
    pub id_token: Option<String>,
    pub refresh_token: Option<String>,
    #[serde(default, alias = "grantedScopes")]
    pub scopes: Vec<String>,
    /// Nonce echoed by platforms that confirm ID-token binding.
    pub nonce: Option<String>,
    /// Expiry as integer milliseconds since epoch (mobile SDK form).
    pub expires_at: Option<i64>,
    /// Expiry as seconds since epoch, possibly fractional (desktop form).
    pub expiration_seconds: Option<f64>,
}

impl fmt::Debug for RawTokenPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawTokenPayload")
            .field("access_token", &"[REDACTED]")
            .field("id_token", &self.id_token.as_ref().map(|_| "[REDACTED]"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("scopes", &self.scopes)
            .field("nonce", &self.nonce)
            .field("expires_at", &self.expires_at)
            .field("expiration_seconds", &self.expiration_seconds)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requests_id_token_requires_openid_scope() {
        let mut request = SignInRequest {
            client_id: "abc".to_string(),
            client_secret: None,
            server_client_id: None,
            scopes: Some(vec!["email".to_string()]),
            hosted_domain: None,
            login_hint: None,
            redirect_uri: None,
            success_html_response: None,
        };
        assert!(!request.requests_id_token());

        request.scopes = Some(vec!["openid".to_string(), "email".to_string()]);
        assert!(request.requests_id_token());

        request.scopes = None;
        assert!(!request.requests_id_token());
    }

    #[test]
    fn test_raw_payload_accepts_granted_scopes_alias() {
        let payload: RawTokenPayload = serde_json::from_str(
            r#"{"accessToken":"tok1","grantedScopes":["openid","email"]}"#,
        )
        .unwrap();
        assert_eq!(payload.scopes, vec!["openid", "email"]);
        assert_eq!(payload.access_token, "tok1");
    }

    #[test]
    fn test_raw_payload_tolerates_missing_access_token() {
        // One mobile variant resolves with only an ID token and nonce.
        let payload: RawTokenPayload =
            serde_json::from_str(r#"{"idToken":"jwt1","nonce":"n1"}"#).unwrap();
        assert!(payload.access_token.is_empty());
        assert_eq!(payload.nonce.as_deref(), Some("n1"));
    }

    #[test]
    fn test_token_response_serializes_camel_case() {
        let response = TokenResponse {
            id_token: Some("jwt1".to_string()),
            access_token: "tok1".to_string(),
            scopes: vec!["openid".to_string()],
            refresh_token: None,
            expires_at: Some(1_700_000_000_000),
            nonce: Some("n1".to_string()),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["accessToken"], "tok1");
        assert_eq!(json["expiresAt"], 1_700_000_000_000_i64);
        assert_eq!(json["idToken"], "jwt1");
    }

    #[test]
    fn test_debug_output_redacts_token_material() {
        let response = TokenResponse {
            id_token: Some("jwt-secret".to_string()),
            access_token: "tok-secret".to_string(),
            scopes: vec![],
            refresh_token: Some("refresh-secret".to_string()),
            expires_at: None,
            nonce: None,
        };
        let printed = format!("{:?}", response);
        assert!(!printed.contains("tok-secret"));
        assert!(!printed.contains("jwt-secret"));
        assert!(!printed.contains("refresh-secret"));
    }
}
