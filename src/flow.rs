//! Flow Orchestration
//!
//! Owns the lifecycle of each bridge invocation: argument validation,
//! adapter invocation, normalization or error translation, response
//! delivery. One sign-in attempt at a time per orchestrator instance; the
//! platform SDK configuration behind the adapter is not safe under
//! concurrent reconfiguration, so overlapping attempts are rejected rather
//! than interleaved.

#[cfg(any(mobile, test))]
use std::sync::Mutex as StdMutex;
#[cfg(any(mobile, test))]
use tokio::sync::oneshot;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::adapter::SignInAdapter;
use crate::error::{Error, Result};
#[cfg(any(mobile, test))]
use crate::models::RawTokenPayload;
use crate::models::{
    RefreshTokenRequest, SignInRequest, SignOutRequest, SignOutResponse, TokenResponse,
};
use crate::{nonce, normalize};

// ── Attempt state ───────────────────────────────────────────────────────────

/// Transient state of one in-flight sign-in attempt: the originating
/// request and the nonce generated for it. Dropped when the attempt
/// resolves; never shared across attempts.
struct AuthAttempt {
    request: SignInRequest,
    nonce: Option<String>,
}

impl AuthAttempt {
    fn new(request: SignInRequest) -> Self {
        let nonce = request.requests_id_token().then(nonce::generate);
        Self { request, nonce }
    }

    fn nonce(&self) -> Option<&str> {
        self.nonce.as_deref()
    }
}

// ── Single-resolution callback slot ─────────────────────────────────────────

/// Holder for a pending adapter callback, enforcing exactly-one resolution.
///
/// Callback-style platform APIs can double-invoke; the sender is taken out
/// of the slot on first resolution, so a second resolution (or a callback
/// arriving with no attempt awaiting it) is discarded and logged instead of
/// resolving twice.
#[cfg(any(mobile, test))]
pub(crate) struct AttemptSlot {
    pending: StdMutex<Option<oneshot::Sender<Result<RawTokenPayload>>>>,
}

#[cfg(any(mobile, test))]
impl AttemptSlot {
    pub(crate) fn new() -> Self {
        Self {
            pending: StdMutex::new(None),
        }
    }

    /// Arm the slot for a new attempt and return the receiving end.
    pub(crate) fn arm(&self) -> oneshot::Receiver<Result<RawTokenPayload>> {
        let (tx, rx) = oneshot::channel();
        let mut pending = self.pending.lock().expect("attempt slot poisoned");
        if pending.replace(tx).is_some() {
            warn!("Replacing a stale pending sign-in callback");
        }
        rx
    }

    /// Resolve the pending attempt, if any. An orphaned callback (nothing
    /// awaiting) is discarded and logged, not treated as an error.
    pub(crate) fn resolve(&self, result: Result<RawTokenPayload>) {
        let sender = self.pending.lock().expect("attempt slot poisoned").take();
        match sender {
            Some(tx) => {
                if tx.send(result).is_err() {
                    warn!("Sign-in attempt was no longer awaiting its callback");
                }
            }
            None => warn!("Orphaned sign-in callback discarded"),
        }
    }
}

// ── Orchestrator ────────────────────────────────────────────────────────────

/// Per-platform flow orchestrator. Independent instances do not share
/// adapter state.
pub struct FlowOrchestrator<A: SignInAdapter> {
    adapter: A,
    /// Serializes sign-in attempts; held for the whole attempt lifetime.
    attempt_gate: Mutex<()>,
}

impl<A: SignInAdapter> FlowOrchestrator<A> {
    pub fn new(adapter: A) -> Self {
        Self {
            adapter,
            attempt_gate: Mutex::new(()),
        }
    }

    /// Run one sign-in attempt to a terminal state.
    pub async fn sign_in(&self, request: SignInRequest) -> Result<TokenResponse> {
        let _attempt_guard = match self.attempt_gate.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                warn!("Rejecting overlapping sign-in attempt");
                return Err(Error::Busy);
            }
        };

        self.validate_sign_in(&request)?;

        let attempt = AuthAttempt::new(request);
        info!("Presenting {} sign-in UI", self.adapter.name());

        let raw = self
            .adapter
            .sign_in(&attempt.request, attempt.nonce())
            .await?;

        let response = normalize::normalize(raw, attempt.nonce())?;
        info!(
            "Sign-in succeeded with {} granted scope(s)",
            response.scopes.len()
        );
        Ok(response)
    }

    /// Sign out, revoking the access token when one is supplied.
    pub async fn sign_out(&self, request: SignOutRequest) -> Result<SignOutResponse> {
        if request.access_token.is_none() {
            info!("Signing out locally (no token to revoke)");
        }
        self.adapter.sign_out(request.access_token.as_deref()).await?;
        Ok(SignOutResponse { success: true })
    }

    /// Exchange a refresh token for a fresh canonical response.
    pub async fn refresh_token(&self, request: RefreshTokenRequest) -> Result<TokenResponse> {
        if request.refresh_token.is_empty() {
            return Err(Error::InvalidArgument(
                "refreshToken must not be empty".to_string(),
            ));
        }

        let raw = self.adapter.refresh_token(&request).await?;
        // Refresh responses carry no attempt nonce; any platform echo for a
        // returned ID token passes through unverified.
        normalize::normalize(raw, None)
    }

    fn validate_sign_in(&self, request: &SignInRequest) -> Result<()> {
        if request.client_id.is_empty() {
            return Err(Error::InvalidArgument(
                "clientId must not be empty".to_string(),
            ));
        }

        if self.adapter.requires_explicit_scopes() && request.scopes().is_empty() {
            return Err(Error::InvalidArgument(format!(
                "the {} platform requires an explicit, non-empty scope list",
                self.adapter.name()
            )));
        }

        if self.adapter.requires_client_secret()
            && request.client_secret.as_deref().unwrap_or_default().is_empty()
        {
            return Err(Error::InvalidArgument(format!(
                "clientSecret is required on the {} platform",
                self.adapter.name()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::Notify;

    /// Scripted adapter standing in for a platform SDK.
    #[derive(Clone)]
    struct MockAdapter {
        payload: RawTokenPayload,
        explicit_scopes: bool,
        sign_in_calls: Arc<AtomicUsize>,
        revocation_calls: Arc<AtomicUsize>,
        seen_nonces: Arc<StdMutex<Vec<Option<String>>>>,
        /// When set, sign-in suspends until notified.
        hold: Option<Arc<Notify>>,
    }

    impl MockAdapter {
        fn new(payload: RawTokenPayload) -> Self {
            Self {
                payload,
                explicit_scopes: true,
                sign_in_calls: Arc::new(AtomicUsize::new(0)),
                revocation_calls: Arc::new(AtomicUsize::new(0)),
                seen_nonces: Arc::new(StdMutex::new(Vec::new())),
                hold: None,
            }
        }
    }

    impl SignInAdapter for MockAdapter {
        fn name(&self) -> &str {
            "mock"
        }

        fn requires_explicit_scopes(&self) -> bool {
            self.explicit_scopes
        }

        async fn sign_in(
            &self,
            _request: &SignInRequest,
            nonce: Option<&str>,
        ) -> Result<RawTokenPayload> {
            self.sign_in_calls.fetch_add(1, Ordering::SeqCst);
            self.seen_nonces
                .lock()
                .unwrap()
                .push(nonce.map(str::to_string));
            if let Some(hold) = &self.hold {
                hold.notified().await;
            }
            let mut payload = self.payload.clone();
            if payload.id_token.is_some() && payload.nonce.is_none() {
                payload.nonce = nonce.map(str::to_string);
            }
            Ok(payload)
        }

        async fn sign_out(&self, access_token: Option<&str>) -> Result<()> {
            if access_token.is_some() {
                self.revocation_calls.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        }

        async fn refresh_token(
            &self,
            _request: &RefreshTokenRequest,
        ) -> Result<RawTokenPayload> {
            Ok(self.payload.clone())
        }
    }

    fn request(client_id: &str, scopes: Option<Vec<&str>>) -> SignInRequest {
        SignInRequest {
            client_id: client_id.to_string(),
            client_secret: None,
            server_client_id: None,
            scopes: scopes.map(|s| s.into_iter().map(String::from).collect()),
            hosted_domain: None,
            login_hint: None,
            redirect_uri: None,
            success_html_response: None,
        }
    }

    fn payload_with_id_token() -> RawTokenPayload {
        RawTokenPayload {
            access_token: "tok1".to_string(),
            id_token: Some("jwt1".to_string()),
            scopes: vec!["openid".to_string(), "email".to_string()],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_valid_sign_in_yields_canonical_response() {
        let adapter = MockAdapter::new(payload_with_id_token());
        let orchestrator = FlowOrchestrator::new(adapter);

        let response = orchestrator
            .sign_in(request("abc", Some(vec!["openid", "email"])))
            .await
            .unwrap();

        assert!(!response.access_token.is_empty());
        assert!(response.id_token.is_some());
        // The attempt nonce came back on the ID-token path.
        assert!(response.nonce.is_some());
    }

    #[tokio::test]
    async fn test_empty_client_id_fails_before_adapter_runs() {
        let adapter = MockAdapter::new(payload_with_id_token());
        let calls = Arc::clone(&adapter.sign_in_calls);
        let orchestrator = FlowOrchestrator::new(adapter);

        let err = orchestrator
            .sign_in(request("", Some(vec!["openid"])))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidArgument(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_scopes_rejected_where_adapter_mandates_them() {
        let adapter = MockAdapter::new(payload_with_id_token());
        let calls = Arc::clone(&adapter.sign_in_calls);
        let orchestrator = FlowOrchestrator::new(adapter);

        for scopes in [None, Some(vec![])] {
            let err = orchestrator
                .sign_in(request("abc", scopes))
                .await
                .unwrap_err();
            assert!(matches!(err, Error::InvalidArgument(_)));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_scopes_allowed_where_adapter_does_not_mandate_them() {
        let mut adapter = MockAdapter::new(RawTokenPayload {
            access_token: "tok1".to_string(),
            ..Default::default()
        });
        adapter.explicit_scopes = false;
        let orchestrator = FlowOrchestrator::new(adapter);

        let response = orchestrator.sign_in(request("abc", None)).await.unwrap();
        assert_eq!(response.access_token, "tok1");
        assert_eq!(response.nonce, None);
    }

    #[tokio::test]
    async fn test_no_nonce_generated_without_openid_scope() {
        let adapter = MockAdapter::new(RawTokenPayload {
            access_token: "tok1".to_string(),
            scopes: vec!["email".to_string()],
            ..Default::default()
        });
        let nonces = Arc::clone(&adapter.seen_nonces);
        let orchestrator = FlowOrchestrator::new(adapter);

        orchestrator
            .sign_in(request("abc", Some(vec!["email"])))
            .await
            .unwrap();

        assert_eq!(nonces.lock().unwrap().as_slice(), &[None]);
    }

    #[tokio::test]
    async fn test_overlapping_sign_in_is_busy_and_keeps_first_nonce() {
        let mut adapter = MockAdapter::new(payload_with_id_token());
        let hold = Arc::new(Notify::new());
        adapter.hold = Some(Arc::clone(&hold));
        let nonces = Arc::clone(&adapter.seen_nonces);

        let orchestrator = Arc::new(FlowOrchestrator::new(adapter));

        let first = {
            let orchestrator = Arc::clone(&orchestrator);
            tokio::spawn(async move {
                orchestrator
                    .sign_in(request("abc", Some(vec!["openid"])))
                    .await
            })
        };

        // Let the first attempt reach the adapter before contending.
        while nonces.lock().unwrap().is_empty() {
            tokio::task::yield_now().await;
        }

        let err = orchestrator
            .sign_in(request("abc", Some(vec!["openid"])))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Busy));

        hold.notify_one();
        let response = first.await.unwrap().unwrap();

        // Exactly one attempt reached the adapter, and its nonce survived.
        let seen = nonces.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].as_deref(), response.nonce.as_deref());
    }

    #[tokio::test]
    async fn test_sign_out_without_token_skips_revocation() {
        let adapter = MockAdapter::new(payload_with_id_token());
        let revocations = Arc::clone(&adapter.revocation_calls);
        let orchestrator = FlowOrchestrator::new(adapter);

        let response = orchestrator
            .sign_out(SignOutRequest { access_token: None })
            .await
            .unwrap();

        assert!(response.success);
        assert_eq!(revocations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_sign_out_with_token_revokes() {
        let adapter = MockAdapter::new(payload_with_id_token());
        let revocations = Arc::clone(&adapter.revocation_calls);
        let orchestrator = FlowOrchestrator::new(adapter);

        orchestrator
            .sign_out(SignOutRequest {
                access_token: Some("tok1".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(revocations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refresh_with_empty_token_is_invalid_argument() {
        let adapter = MockAdapter::new(payload_with_id_token());
        let orchestrator = FlowOrchestrator::new(adapter);

        let err = orchestrator
            .refresh_token(RefreshTokenRequest {
                refresh_token: String::new(),
                client_id: None,
                client_secret: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_adapter_error_passes_through_classified() {
        struct FailingAdapter;

        impl SignInAdapter for FailingAdapter {
            fn name(&self) -> &str {
                "failing"
            }

            async fn sign_in(
                &self,
                _request: &SignInRequest,
                _nonce: Option<&str>,
            ) -> Result<RawTokenPayload> {
                Err(Error::UserCancelled("user dismissed the flow".to_string()))
            }

            async fn sign_out(&self, _access_token: Option<&str>) -> Result<()> {
                Ok(())
            }

            async fn refresh_token(
                &self,
                _request: &RefreshTokenRequest,
            ) -> Result<RawTokenPayload> {
                Err(Error::NotSupported("refresh_token"))
            }
        }

        let orchestrator = FlowOrchestrator::new(FailingAdapter);

        let err = orchestrator
            .sign_in(request("abc", Some(vec!["openid"])))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UserCancelled(_)));

        let err = orchestrator
            .refresh_token(RefreshTokenRequest {
                refresh_token: "rt1".to_string(),
                client_id: None,
                client_secret: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotSupported(_)));
    }

    #[tokio::test]
    async fn test_attempt_slot_resolves_exactly_once() {
        let slot = AttemptSlot::new();
        let rx = slot.arm();

        slot.resolve(Ok(payload_with_id_token()));
        // Second resolution is discarded, not delivered.
        slot.resolve(Err(Error::Adapter("late duplicate".to_string())));

        let delivered = rx.await.unwrap().unwrap();
        assert_eq!(delivered.access_token, "tok1");
    }

    #[tokio::test]
    async fn test_orphaned_callback_is_discarded() {
        let slot = AttemptSlot::new();
        // No attempt armed: must not panic, just drop the result.
        slot.resolve(Ok(payload_with_id_token()));
    }

    #[tokio::test]
    async fn test_dropped_receiver_does_not_poison_slot() {
        let slot = AttemptSlot::new();
        let rx = slot.arm();
        drop(rx);
        slot.resolve(Ok(payload_with_id_token()));

        // Slot stays usable for the next attempt.
        let rx = slot.arm();
        slot.resolve(Ok(payload_with_id_token()));
        assert!(rx.await.unwrap().is_ok());
    }
}
