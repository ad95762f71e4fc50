use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::get,
};
use rspotify::{prelude::*, scopes, AuthCodeSpotify, ClientCredsSpotify, Credentials, OAuth, Token};
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::{AuthMode, BackupConfig};
use crate::error::{BackupError, Result};
use crate::model::SpotifyClient;

const RESPONSE: &str = r#"
<!doctype html>
<html>
<head><title>Success</title></head>
<body><h1>Authentication Successful!</h1><script>window.close();</script></body>
</html>
"#;
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

fn playlist_scopes() -> HashSet<String> {
    scopes!("playlist-read-private", "playlist-read-collaborative")
}

/// Produce an authorized client using the configured flow. Every network step of the
/// flow, including waiting for the browser, counts against `config.timeout()`.
pub async fn authorize(config: &BackupConfig) -> Result<SpotifyClient> {
    let timeout = config.timeout();

    match config.auth_mode {
        AuthMode::ClientCredentials => {
            tracing::info!("Requesting client credentials token");
            let spotify = ClientCredsSpotify::new(credentials(config));
            with_timeout(timeout, spotify.request_token()).await?;
            Ok(SpotifyClient::ClientCredentials(spotify))
        }
        AuthMode::AuthorizationCode => {
            let spotify = auth_code_client(config);

            if restore_cached_token(&spotify, timeout).await? {
                tracing::info!("Reusing cached authorization");
            } else {
                tracing::info!("Starting browser-based OAuth flow");
                let authorize_url = spotify
                    .get_authorize_url(false)
                    .map_err(|e| BackupError::Auth(e.to_string()))?;
                let listener = CallbackListener::bind(&config.redirect_uri).await?;

                println!("Log in to Spotify on this page: {authorize_url}");
                let code = listener
                    .await_authorization(&spotify.oauth.state, timeout)
                    .await?;
                // Also writes the token cache for the next run
                with_timeout(timeout, spotify.request_token(&code)).await?;
            }

            match spotify.me().await {
                Ok(user) => tracing::info!(user_id = user.id.id(), "Authorized"),
                Err(e) => tracing::warn!(error = %e, "Could not look up current user"),
            }
            Ok(SpotifyClient::AuthorizationCode(spotify))
        }
    }
}

fn credentials(config: &BackupConfig) -> Credentials {
    Credentials::new(&config.spotify_client_id, &config.spotify_client_secret)
}

/// Authorization-code client whose token is cached at `config.token_cache_path`
fn auth_code_client(config: &BackupConfig) -> AuthCodeSpotify {
    let oauth = OAuth {
        redirect_uri: config.redirect_uri.clone(),
        scopes: playlist_scopes(),
        ..Default::default()
    };
    AuthCodeSpotify::with_config(
        credentials(config),
        oauth,
        rspotify::Config {
            token_cached: true,
            token_refreshing: true,
            cache_path: config.token_cache_path.clone(),
            ..Default::default()
        },
    )
}

/// Load the token an earlier run cached and refresh it. `false` when there is none or
/// it can no longer be refreshed, in which case the browser flow has to run.
async fn restore_cached_token(spotify: &AuthCodeSpotify, timeout: Duration) -> Result<bool> {
    let Some(token) = cached_token(spotify).await else {
        return Ok(false);
    };

    *spotify
        .token
        .lock()
        .await
        .map_err(|_| BackupError::Auth("token store unavailable".to_string()))? = Some(token);

    match with_timeout(timeout, spotify.refresh_token()).await {
        Ok(()) => Ok(true),
        Err(e) => {
            tracing::warn!(error = %e, "Cached token could not be refreshed, re-authenticating");
            Ok(false)
        }
    }
}

async fn cached_token(spotify: &AuthCodeSpotify) -> Option<Token> {
    let path = &spotify.config.cache_path;
    if !path.exists() {
        tracing::debug!(path = %path.display(), "No cached token");
        return None;
    }
    match spotify.read_token_cache(true).await {
        Ok(token) => token,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable token cache");
            None
        }
    }
}

async fn with_timeout<F>(timeout: Duration, request: F) -> Result<()>
where
    F: std::future::Future<Output = rspotify::ClientResult<()>>,
{
    match tokio::time::timeout(timeout, request).await {
        Err(_) => Err(BackupError::AuthTimeout(timeout)),
        Ok(Err(e)) => Err(BackupError::Auth(e.to_string())),
        Ok(Ok(())) => Ok(()),
    }
}

/// Local listener for the OAuth redirect
pub struct CallbackListener {
    listener: TcpListener,
    path: String,
}

#[derive(Clone)]
struct CallbackState {
    expected_state: Arc<str>,
    sender: Arc<Mutex<Option<oneshot::Sender<Result<String>>>>>,
}

impl CallbackListener {
    /// Listen on the host and port of `redirect_uri`
    pub async fn bind(redirect_uri: &str) -> Result<Self> {
        let url = Url::parse(redirect_uri)
            .map_err(|e| BackupError::Config(format!("invalid redirect_uri: {e}")))?;
        let host = url
            .host_str()
            .ok_or_else(|| BackupError::Config("redirect_uri has no host".to_string()))?;
        let port = url.port_or_known_default().unwrap_or(80);

        let listener = TcpListener::bind((host, port))
            .await
            .map_err(|e| BackupError::Auth(format!("cannot listen on {host}:{port}: {e}")))?;
        let callback = Self {
            listener,
            path: url.path().to_string(),
        };
        tracing::debug!(addr = ?callback.local_addr().ok(), "Waiting for OAuth callback");
        Ok(callback)
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve the redirect path until the browser comes back with an authorization code,
    /// the state check fails, or `timeout` passes. Other paths get a 404.
    pub async fn await_authorization(self, state: &str, timeout: Duration) -> Result<String> {
        let (tx, rx) = oneshot::channel();
        let app = Router::new()
            .route(&self.path, get(handle_callback))
            .with_state(CallbackState {
                expected_state: Arc::from(state),
                sender: Arc::new(Mutex::new(Some(tx))),
            });

        let shutdown = CancellationToken::new();
        let stop = shutdown.clone();
        let listener = self.listener;
        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(stop.cancelled_owned())
                .await
        });

        let received = tokio::time::timeout(timeout, rx).await;

        // Let the in-flight response reach the browser before the listener goes away
        shutdown.cancel();
        match tokio::time::timeout(SHUTDOWN_GRACE, server).await {
            Ok(Ok(Err(e))) => tracing::debug!(error = %e, "Callback server failed"),
            Ok(_) => {}
            Err(_) => tracing::debug!("Callback server did not stop in time"),
        }

        match received {
            Err(_) => Err(BackupError::AuthTimeout(timeout)),
            Ok(Err(_)) => Err(BackupError::Auth("callback listener stopped".to_string())),
            Ok(Ok(result)) => result,
        }
    }
}

async fn handle_callback(
    State(state): State<CallbackState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let result = check_callback(&params, &state.expected_state);
    let response = match &result {
        Ok(_) => (StatusCode::OK, Html(RESPONSE)),
        Err(e) => {
            tracing::warn!(error = %e, "Rejected OAuth callback");
            (StatusCode::FORBIDDEN, Html("Couldn't get token"))
        }
    };

    if let Some(sender) = state.sender.lock().await.take() {
        let _ = sender.send(result);
    }
    response
}

/// Authorization code from the redirect's query parameters
fn check_callback(params: &HashMap<String, String>, expected_state: &str) -> Result<String> {
    if let Some(error) = params.get("error") {
        return Err(BackupError::Auth(format!("authorization denied: {error}")));
    }
    if params.get("state").map(String::as_str) != Some(expected_state) {
        return Err(BackupError::StateMismatch);
    }
    params
        .get("code")
        .cloned()
        .ok_or_else(|| BackupError::Auth("callback carried no code".to_string()))
}
