//! Bridge Command Surface
//!
//! The three commands the host application invokes. Each delegates to the
//! flow orchestrator and flattens errors into the string messages the
//! invoke boundary expects.

use tauri::{AppHandle, Runtime};

use crate::models::{
    RefreshTokenRequest, SignInRequest, SignOutRequest, SignOutResponse, TokenResponse,
};
use crate::GoogleAuthExt;

#[tauri::command]
pub(crate) async fn sign_in<R: Runtime>(
    app: AppHandle<R>,
    payload: SignInRequest,
) -> Result<TokenResponse, String> {
    app.google_auth().sign_in(payload).await.map_err(Into::into)
}

#[tauri::command]
pub(crate) async fn sign_out<R: Runtime>(
    app: AppHandle<R>,
    payload: Option<SignOutRequest>,
) -> Result<SignOutResponse, String> {
    app.google_auth()
        .sign_out(payload.unwrap_or_default())
        .await
        .map_err(Into::into)
}

#[tauri::command]
pub(crate) async fn refresh_token<R: Runtime>(
    app: AppHandle<R>,
    payload: RefreshTokenRequest,
) -> Result<TokenResponse, String> {
    app.google_auth()
        .refresh_token(payload)
        .await
        .map_err(Into::into)
}
