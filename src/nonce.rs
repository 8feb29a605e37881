//! Nonce Generation
//!
//! One fresh nonce per sign-in attempt that may return an ID token. The
//! nonce is threaded into the platform request and bound into the issued
//! ID token, preventing token replay across attempts.

use uuid::Uuid;

/// Generate a fresh replay-protection nonce.
///
/// UUID-v4 textual form, drawn from the operating system's CSPRNG. Never
/// persisted or reused.
pub fn generate() -> String {
    Uuid::new_v4().to_string()
}
