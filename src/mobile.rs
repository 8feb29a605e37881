//! Mobile Sign-In Adapters
//!
//! Bridges to the registered native sign-in plugins (Kotlin on Android,
//! Swift on iOS). The native layer owns UI presentation and the SDK
//! configuration singleton; this side threads the attempt nonce down,
//! routes the completion callback back into the active attempt, and hands
//! the raw payload to the normalizer untouched.

use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tauri::{
    plugin::{PluginApi, PluginHandle},
    AppHandle, Runtime,
};
use tokio::sync::oneshot;
use tracing::info;

use crate::adapter::SignInAdapter;
use crate::error::{Error, Result};
use crate::flow::AttemptSlot;
use crate::models::{RawTokenPayload, RefreshTokenRequest, SignInRequest, SignOutResponse};

#[cfg(target_os = "android")]
const PLUGIN_IDENTIFIER: &str = "app.tauri.googleauth";

#[cfg(target_os = "ios")]
tauri::ios_plugin_binding!(init_plugin_google_auth);

pub fn init<R: Runtime, C: DeserializeOwned>(
    _app: &AppHandle<R>,
    api: PluginApi<R, C>,
) -> Result<MobileSignIn<R>> {
    #[cfg(target_os = "android")]
    let handle = api
        .register_android_plugin(PLUGIN_IDENTIFIER, "GoogleSignInPlugin")
        .map_err(|e| Error::Adapter(e.to_string()))?;
    #[cfg(target_os = "ios")]
    let handle = api
        .register_ios_plugin(init_plugin_google_auth)
        .map_err(|e| Error::Adapter(e.to_string()))?;

    Ok(MobileSignIn {
        handle,
        pending: Arc::new(AttemptSlot::new()),
    })
}

// ── Native call payloads ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct NativeSignInArgs {
    client_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    server_client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scopes: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hosted_domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    login_hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    nonce: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct NativeSignOutArgs {
    #[serde(skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct NativeRefreshArgs {
    refresh_token: String,
}

// ── Adapter ─────────────────────────────────────────────────────────────────

/// Native mobile sign-in.
pub struct MobileSignIn<R: Runtime> {
    handle: PluginHandle<R>,
    /// Active-attempt callback slot; orphaned native callbacks are
    /// discarded here instead of resolving a dead attempt.
    pending: Arc<AttemptSlot>,
}

impl<R: Runtime> SignInAdapter for MobileSignIn<R> {
    fn name(&self) -> &str {
        if cfg!(target_os = "android") {
            "android"
        } else {
            "ios"
        }
    }

    // The iOS SDK rejects sign-in without an explicit scope list; the
    // Android credential flow derives its own.
    fn requires_explicit_scopes(&self) -> bool {
        cfg!(target_os = "ios")
    }

    async fn sign_in(
        &self,
        request: &SignInRequest,
        nonce: Option<&str>,
    ) -> Result<RawTokenPayload> {
        let args = NativeSignInArgs {
            client_id: request.client_id.clone(),
            server_client_id: request.server_client_id.clone(),
            scopes: request.scopes.clone(),
            hosted_domain: request.hosted_domain.clone(),
            login_hint: request.login_hint.clone(),
            nonce: nonce.map(str::to_string),
        };

        info!("Invoking native {} sign-in", self.name());

        let receiver = self.pending.arm();
        let handle = self.handle.clone();
        let slot = Arc::clone(&self.pending);
        tauri::async_runtime::spawn_blocking(move || {
            let result = handle
                .run_mobile_plugin::<RawTokenPayload>("signIn", args)
                .map_err(|e| Error::from_platform_message(e.to_string()));
            slot.resolve(result);
        });

        match receiver.await {
            Ok(result) => result,
            // Sender dropped without resolving: the presenting context went
            // away (or a newer attempt re-armed the slot).
            Err(_) => Err(Error::UserCancelled(
                "the presenting context was destroyed before sign-in completed".to_string(),
            )),
        }
    }

    async fn sign_out(&self, access_token: Option<&str>) -> Result<()> {
        let args = NativeSignOutArgs {
            access_token: access_token.map(str::to_string),
        };
        let response: SignOutResponse =
            run_native(self.handle.clone(), "signOut", args).await?;
        if response.success {
            Ok(())
        } else {
            Err(Error::Adapter(
                "platform sign-out reported failure".to_string(),
            ))
        }
    }

    async fn refresh_token(&self, request: &RefreshTokenRequest) -> Result<RawTokenPayload> {
        let args = NativeRefreshArgs {
            refresh_token: request.refresh_token.clone(),
        };
        run_native(self.handle.clone(), "refreshToken", args).await
    }
}

/// Run a native plugin call off the async executor, suspending the caller
/// until the native completion handler resolves.
async fn run_native<R, A, T>(handle: PluginHandle<R>, method: &'static str, args: A) -> Result<T>
where
    R: Runtime,
    A: Serialize + Send + 'static,
    T: DeserializeOwned + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    tauri::async_runtime::spawn_blocking(move || {
        let result = handle
            .run_mobile_plugin::<T>(method, args)
            .map_err(|e| Error::from_platform_message(e.to_string()));
        let _ = tx.send(result);
    });
    rx.await
        .map_err(|_| Error::Adapter("platform call was aborted".to_string()))?
}
