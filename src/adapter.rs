//! Platform Sign-In Adapter Abstraction
//!
//! One implementation per platform, selected at compile time. Adapters
//! invoke the native or browser sign-in capability and resolve with the raw
//! provider payload; they never see or produce the canonical response.

use crate::error::Result;
use crate::models::{RawTokenPayload, RefreshTokenRequest, SignInRequest};

/// Platform sign-in capability.
///
/// Implementations must fail explicitly (never silently) when the user
/// cancels, no scopes were granted, or no presentation surface exists.
#[allow(async_fn_in_trait)]
pub trait SignInAdapter {
    /// Adapter name for logging (e.g. "desktop").
    fn name(&self) -> &str;

    /// Whether the platform rejects sign-in without an explicit scope list.
    fn requires_explicit_scopes(&self) -> bool {
        false
    }

    /// Whether the platform needs a client secret for its token exchange.
    fn requires_client_secret(&self) -> bool {
        false
    }

    /// Present the platform sign-in UI and resolve with the raw result.
    /// `nonce` is set when the attempt may return an ID token; the adapter
    /// threads it into the platform request for ID-token binding.
    async fn sign_in(
        &self,
        request: &SignInRequest,
        nonce: Option<&str>,
    ) -> Result<RawTokenPayload>;

    /// Best-effort revocation. With no access token, clear local platform
    /// state only and still report success.
    async fn sign_out(&self, access_token: Option<&str>) -> Result<()>;

    /// Exchange a refresh token for new tokens. Platforms without a refresh
    /// capability fail with `Error::NotSupported` rather than crashing.
    async fn refresh_token(&self, request: &RefreshTokenRequest) -> Result<RawTokenPayload>;
}
