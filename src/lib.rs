//! Google OAuth2 Sign-In Bridge
//!
//! One uniform command surface (`sign_in`, `sign_out`, `refresh_token`)
//! over three platform sign-in backends: the Android and iOS native SDK
//! plugins and a desktop browser-redirect flow. Platform results are
//! normalized into a single canonical token response; failures are
//! classified before they cross the bridge.

use tauri::{
    plugin::{Builder, TauriPlugin},
    Manager, Runtime,
};

mod adapter;
mod commands;
mod error;
mod flow;
mod models;
mod nonce;
mod normalize;

#[cfg(desktop)]
mod desktop;
#[cfg(mobile)]
mod mobile;

pub use adapter::SignInAdapter;
pub use error::{Error, Result};
pub use models::{
    RawTokenPayload, RefreshTokenRequest, SignInRequest, SignOutRequest, SignOutResponse,
    TokenResponse,
};

#[cfg(desktop)]
type PlatformSignIn<R> = desktop::DesktopSignIn<R>;
#[cfg(mobile)]
type PlatformSignIn<R> = mobile::MobileSignIn<R>;

/// Access to the google-auth bridge.
///
/// One instance per app, managed by the plugin; holds the flow
/// orchestrator for the platform's sign-in adapter.
pub struct GoogleAuth<R: Runtime> {
    orchestrator: flow::FlowOrchestrator<PlatformSignIn<R>>,
}

impl<R: Runtime> GoogleAuth<R> {
    /// Run a sign-in attempt through the platform adapter.
    pub async fn sign_in(&self, request: SignInRequest) -> Result<TokenResponse> {
        self.orchestrator.sign_in(request).await
    }

    /// Sign out, revoking the supplied access token when present.
    pub async fn sign_out(&self, request: SignOutRequest) -> Result<SignOutResponse> {
        self.orchestrator.sign_out(request).await
    }

    /// Exchange a refresh token for new tokens.
    pub async fn refresh_token(&self, request: RefreshTokenRequest) -> Result<TokenResponse> {
        self.orchestrator.refresh_token(request).await
    }
}

/// Extension trait to reach the bridge from an [`tauri::AppHandle`] or
/// [`tauri::Window`].
pub trait GoogleAuthExt<R: Runtime> {
    fn google_auth(&self) -> &GoogleAuth<R>;
}

impl<R: Runtime, T: Manager<R>> GoogleAuthExt<R> for T {
    fn google_auth(&self) -> &GoogleAuth<R> {
        self.state::<GoogleAuth<R>>().inner()
    }
}

/// Initialize the google-auth plugin.
pub fn init<R: Runtime>() -> TauriPlugin<R> {
    Builder::new("google-auth")
        .invoke_handler(tauri::generate_handler![
            commands::sign_in,
            commands::sign_out,
            commands::refresh_token,
        ])
        .setup(|app, api| {
            #[cfg(desktop)]
            let platform = desktop::init(app, api)?;
            #[cfg(mobile)]
            let platform = mobile::init(app, api)?;

            app.manage(GoogleAuth {
                orchestrator: flow::FlowOrchestrator::new(platform),
            });
            Ok(())
        })
        .build()
}
