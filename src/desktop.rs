//! Desktop Sign-In Adapter
//!
//! Browser-redirect OAuth2 flow: bind a loopback listener, open the system
//! browser on Google's authorization endpoint, wait for the redirect, then
//! exchange the authorization code (PKCE) for tokens. The loopback listener
//! and the exchange are adapter internals; the orchestrator only sees the
//! raw payload or a classified error.

use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Mutex as StdMutex;
use tauri::{plugin::PluginApi, AppHandle, Manager, Runtime};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info, warn};

use crate::adapter::SignInAdapter;
use crate::error::{Error, Result};
use crate::models::{RawTokenPayload, RefreshTokenRequest, SignInRequest};

// ── Google OAuth endpoints ──────────────────────────────────────────────────

const AUTH_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const REVOKE_ENDPOINT: &str = "https://oauth2.googleapis.com/revoke";

const HTTP_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

pub fn init<R: Runtime, C: DeserializeOwned>(
    app: &AppHandle<R>,
    _api: PluginApi<R, C>,
) -> Result<DesktopSignIn<R>> {
    Ok(DesktopSignIn::new(app.clone()))
}

/// Client configuration for one sign-in session. Mirrors the shared SDK
/// configuration object on the mobile side: rewritten at the start of each
/// sign-in, which is why the orchestrator serializes attempts.
#[derive(Clone)]
struct SessionConfig {
    client_id: String,
    client_secret: String,
    hosted_domain: Option<String>,
    login_hint: Option<String>,
    redirect_uri: Option<String>,
    success_html: Option<String>,
}

/// Desktop browser-redirect sign-in.
pub struct DesktopSignIn<R: Runtime> {
    app: AppHandle<R>,
    config: StdMutex<Option<SessionConfig>>,
}

impl<R: Runtime> DesktopSignIn<R> {
    pub(crate) fn new(app: AppHandle<R>) -> Self {
        Self {
            app,
            config: StdMutex::new(None),
        }
    }

    /// Reconfigure the session from the incoming request and return the
    /// active configuration.
    fn configure(&self, request: &SignInRequest) -> SessionConfig {
        let config = SessionConfig {
            client_id: request.client_id.clone(),
            client_secret: request.client_secret.clone().unwrap_or_default(),
            hosted_domain: request.hosted_domain.clone(),
            login_hint: request.login_hint.clone(),
            redirect_uri: request.redirect_uri.clone(),
            success_html: request.success_html_response.clone(),
        };
        *self.config.lock().expect("session config poisoned") = Some(config.clone());
        config
    }
}

impl<R: Runtime> SignInAdapter for DesktopSignIn<R> {
    fn name(&self) -> &str {
        "desktop"
    }

    fn requires_explicit_scopes(&self) -> bool {
        true
    }

    fn requires_client_secret(&self) -> bool {
        true
    }

    async fn sign_in(
        &self,
        request: &SignInRequest,
        nonce: Option<&str>,
    ) -> Result<RawTokenPayload> {
        if self.app.webview_windows().is_empty() {
            return Err(Error::NoPresentationSurface(
                "no active window to anchor the sign-in flow".to_string(),
            ));
        }

        let config = self.configure(request);

        let code_verifier = generate_code_verifier();
        let code_challenge = generate_code_challenge(&code_verifier);
        let state = generate_state();

        // Bind the loopback listener before the browser opens, on the port
        // the caller pinned via redirectUri or an ephemeral one.
        let (listener, redirect_uri) = match &config.redirect_uri {
            Some(uri) => {
                let port = loopback_port(uri).ok_or_else(|| {
                    Error::InvalidArgument(
                        "redirectUri must be a loopback URI with an explicit port".to_string(),
                    )
                })?;
                let listener = TcpListener::bind(("127.0.0.1", port))
                    .await
                    .map_err(|e| Error::Adapter(format!("Failed to bind local server: {}", e)))?;
                (listener, uri.clone())
            }
            None => {
                let listener = TcpListener::bind("127.0.0.1:0")
                    .await
                    .map_err(|e| Error::Adapter(format!("Failed to bind local server: {}", e)))?;
                let port = listener
                    .local_addr()
                    .map_err(|e| Error::Adapter(format!("Failed to get local address: {}", e)))?
                    .port();
                (listener, format!("http://127.0.0.1:{}", port))
            }
        };
        info!("OAuth callback server listening on {}", redirect_uri);

        let auth_url = authorize_url(
            &config,
            request.scopes(),
            &state,
            &code_challenge,
            &redirect_uri,
            nonce,
        );

        info!("Opening browser for OAuth authorization");
        if let Err(e) = open::that(&auth_url) {
            return Err(Error::NoPresentationSurface(format!(
                "could not open a browser for sign-in: {}",
                e
            )));
        }

        let code = await_callback(listener, &state, config.success_html.as_deref()).await?;

        info!("Exchanging authorization code for tokens");
        let mut payload = exchange_code(
            &config,
            &code,
            &code_verifier,
            &redirect_uri,
        )
        .await?;

        if payload.scopes.is_empty() {
            return Err(Error::Adapter("no scopes were granted".to_string()));
        }

        // The authorize URL carried the nonce, so Google bound it into the
        // issued ID token; echo it for the normalizer to thread through.
        if payload.id_token.is_some() {
            payload.nonce = nonce.map(str::to_string);
        }

        Ok(payload)
    }

    async fn sign_out(&self, access_token: Option<&str>) -> Result<()> {
        let Some(token) = access_token else {
            // Local-only sign-out: nothing to clear on desktop, report success.
            return Ok(());
        };

        info!("Revoking access token at Google");
        let response = http_client()?
            .post(REVOKE_ENDPOINT)
            .form(&[("token", token)])
            .send()
            .await
            .map_err(|e| Error::Adapter(format!("Revocation request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        // Google answers 400 for tokens that are already invalid or revoked.
        if status.as_u16() == 400 {
            warn!("Token was already revoked or invalid");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        error!("Revocation failed with HTTP {}: {}", status, body);
        Err(Error::Adapter(format!(
            "Revocation failed with HTTP {}",
            status
        )))
    }

    async fn refresh_token(&self, _request: &RefreshTokenRequest) -> Result<RawTokenPayload> {
        Err(Error::NotSupported("refresh_token"))
    }
}

// ── Browser redirect handling ───────────────────────────────────────────────

/// Accept loopback connections until the OAuth redirect arrives, answer the
/// browser, and return the authorization code. No timeout is imposed here;
/// cancellation belongs to the caller's lifecycle.
async fn await_callback(
    listener: TcpListener,
    expected_state: &str,
    success_html: Option<&str>,
) -> Result<String> {
    loop {
        let (mut socket, _) = listener
            .accept()
            .await
            .map_err(|e| Error::Adapter(format!("Callback server error: {}", e)))?;

        let mut reader = BufReader::new(&mut socket);
        let mut request_line = String::new();
        reader
            .read_line(&mut request_line)
            .await
            .map_err(|e| Error::Adapter(format!("Callback server error: {}", e)))?;

        // Request line: "GET /path?query HTTP/1.1"
        let Some(path_and_query) = request_line.split_whitespace().nth(1) else {
            continue;
        };
        let query = path_and_query
            .split_once('?')
            .map(|(_, q)| q)
            .unwrap_or_default();
        let params = parse_query_params(query);

        if let (Some(code), Some(state)) = (params.get("code"), params.get("state")) {
            if state != expected_state {
                respond(
                    &mut socket,
                    "400 Bad Request",
                    &result_page("Sign-in failed: invalid state parameter."),
                )
                .await;
                return Err(Error::Adapter(
                    "state parameter mismatch on OAuth redirect".to_string(),
                ));
            }

            let page = success_html
                .map(str::to_string)
                .unwrap_or_else(|| result_page("Sign-in complete. You can close this tab."));
            respond(&mut socket, "200 OK", &page).await;
            return Ok(code.clone());
        }

        if let Some(err) = params.get("error") {
            let description = params
                .get("error_description")
                .map(|s| s.as_str())
                .unwrap_or("Unknown error");
            respond(
                &mut socket,
                "400 Bad Request",
                &result_page(&format!("Sign-in failed: {}", description)),
            )
            .await;

            return Err(if err == "access_denied" {
                Error::UserCancelled("the user declined the consent screen".to_string())
            } else {
                Error::Adapter(format!("{}: {}", err, description))
            });
        }

        // Not the OAuth redirect (favicon and friends); keep listening.
    }
}

/// Answer the browser. Failures here are logged, not surfaced: the flow
/// outcome is already decided.
async fn respond(socket: &mut TcpStream, status: &str, html: &str) {
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\n\r\n{}",
        status,
        html.len(),
        html
    );
    if let Err(e) = socket.write_all(response.as_bytes()).await {
        warn!("Failed to answer the browser redirect: {}", e);
    }
    let _ = socket.flush().await;
}

fn result_page(message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Google Sign-In</title>
    <style>
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            display: flex;
            justify-content: center;
            align-items: center;
            height: 100vh;
            margin: 0;
        }}
        .container {{
            padding: 2rem;
            border-radius: 12px;
            box-shadow: 0 10px 40px rgba(0,0,0,0.2);
            text-align: center;
            max-width: 400px;
        }}
    </style>
</head>
<body>
    <div class="container">
        <p>{}</p>
    </div>
</body>
</html>"#,
        message
    )
}

/// Parse URL query parameters into a map.
fn parse_query_params(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter_map(|part| {
            let (key, value) = part.split_once('=')?;
            let decoded = urlencoding::decode(value).ok()?;
            Some((key.to_string(), decoded.into_owned()))
        })
        .collect()
}

/// Extract the port from a loopback redirect URI such as
/// `http://127.0.0.1:8723/callback`.
fn loopback_port(uri: &str) -> Option<u16> {
    let rest = uri.strip_prefix("http://")?;
    let host_port = rest.split('/').next()?;
    let (_, port) = host_port.split_once(':')?;
    port.parse().ok()
}

// ── Authorization URL ───────────────────────────────────────────────────────

fn authorize_url(
    config: &SessionConfig,
    scopes: &[String],
    state: &str,
    code_challenge: &str,
    redirect_uri: &str,
    nonce: Option<&str>,
) -> String {
    let scope_str = scopes.join(" ");
    let mut url = format!(
        "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}&code_challenge={}&code_challenge_method=S256&access_type=offline&prompt=consent",
        AUTH_ENDPOINT,
        urlencoding::encode(&config.client_id),
        urlencoding::encode(redirect_uri),
        urlencoding::encode(&scope_str),
        urlencoding::encode(state),
        urlencoding::encode(code_challenge),
    );
    if let Some(nonce) = nonce {
        url.push_str(&format!("&nonce={}", urlencoding::encode(nonce)));
    }
    if let Some(hd) = &config.hosted_domain {
        url.push_str(&format!("&hd={}", urlencoding::encode(hd)));
    }
    if let Some(hint) = &config.login_hint {
        url.push_str(&format!("&login_hint={}", urlencoding::encode(hint)));
    }
    url
}

// ── Token exchange ──────────────────────────────────────────────────────────

async fn exchange_code(
    config: &SessionConfig,
    code: &str,
    code_verifier: &str,
    redirect_uri: &str,
) -> Result<RawTokenPayload> {
    let mut params = HashMap::new();
    params.insert("client_id", config.client_id.as_str());
    params.insert("client_secret", config.client_secret.as_str());
    params.insert("code", code);
    params.insert("code_verifier", code_verifier);
    params.insert("grant_type", "authorization_code");
    params.insert("redirect_uri", redirect_uri);

    let body = post_form(TOKEN_ENDPOINT, &params).await?;
    parse_token_payload(&body, chrono::Utc::now().timestamp() as f64)
}

fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(|e| Error::Adapter(format!("Failed to build HTTP client: {}", e)))
}

/// POST a form-encoded request and return the response body. Secrets travel
/// in the request body, never in process arguments.
async fn post_form(url: &str, params: &HashMap<&str, &str>) -> Result<String> {
    let response = http_client()?
        .post(url)
        .form(params)
        .send()
        .await
        .map_err(|e| Error::Adapter(format!("HTTP request failed: {}", e)))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read error response".to_string());
        error!("HTTP error {}: {}", status, body);
        return Err(Error::Adapter(format!("HTTP {} error: {}", status, body)));
    }

    response
        .text()
        .await
        .map_err(|e| Error::Adapter(format!("Failed to read response body: {}", e)))
}

/// Parse a Google token response into the raw payload shape. `now` is the
/// current epoch time in seconds, used to anchor the relative `expires_in`.
fn parse_token_payload(body: &str, now: f64) -> Result<RawTokenPayload> {
    let parsed: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| Error::Adapter(format!("Invalid JSON response: {}", e)))?;

    if let Some(err) = parsed.get("error").and_then(|v| v.as_str()) {
        let description = parsed
            .get("error_description")
            .and_then(|v| v.as_str())
            .unwrap_or("Unknown error");
        return Err(Error::Adapter(format!("{}: {}", err, description)));
    }

    let access_token = parsed
        .get("access_token")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::Adapter("Missing access_token in response".to_string()))?
        .to_string();

    let expiration_seconds = parsed
        .get("expires_in")
        .and_then(|v| v.as_f64())
        .map(|expires_in| now + expires_in);

    Ok(RawTokenPayload {
        access_token,
        id_token: parsed
            .get("id_token")
            .and_then(|v| v.as_str())
            .map(String::from),
        refresh_token: parsed
            .get("refresh_token")
            .and_then(|v| v.as_str())
            .map(String::from),
        scopes: parsed
            .get("scope")
            .and_then(|v| v.as_str())
            .map(|s| s.split(' ').map(String::from).collect())
            .unwrap_or_default(),
        nonce: None,
        expires_at: None,
        expiration_seconds,
    })
}

// ── PKCE & state ────────────────────────────────────────────────────────────

/// Generate a PKCE code verifier (43-128 characters of unreserved URI
/// characters).
fn generate_code_verifier() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    base64_url_encode(&bytes)
}

/// Derive the PKCE code challenge from a code verifier using S256.
fn generate_code_challenge(verifier: &str) -> String {
    use sha2::{Digest, Sha256};
    let hash = Sha256::digest(verifier.as_bytes());
    base64_url_encode(&hash)
}

/// Random state string for CSRF protection on the redirect.
fn generate_state() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Base64url encoding (no padding) per RFC 4648 §5.
fn base64_url_encode(data: &[u8]) -> String {
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    URL_SAFE_NO_PAD.encode(data)
}
