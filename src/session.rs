//! Session manager (C7): maintains a bearer credential against the NSP auth
//! endpoint, refreshing it proactively and revoking it on shutdown.

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{debug, warn};

const REFRESH_BUFFER: Duration = Duration::seconds(-300); // subtracted via `+`, so negate

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct TokenState {
    access_token: String,
    refresh_token: Option<String>,
    expiry_time: DateTime<Utc>,
}

/// A maintained bearer credential. Internal state is behind a
/// `tokio::sync::RwLock`: the common path (token still valid) only takes a
/// read lock, so concurrent callers never serialize against each other; a
/// refresh takes a write lock so concurrent refreshes collapse into one HTTP
/// round trip.
pub struct Session {
    client: Client,
    auth_url: String,
    revoke_url: String,
    username: String,
    password: String,
    state: RwLock<Option<TokenState>>,
}

impl Session {
    pub fn new(host: &str, server: &ServerConfig) -> Result<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(!server.verify_ssl)
            .timeout(std::time::Duration::from_secs(server.http_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            auth_url: format!("https://{host}:8443/rest-gateway/rest/api/v1/auth/token"),
            revoke_url: format!("https://{host}:8443/rest-gateway/rest/api/v1/auth/revocation"),
            username: server.username.clone(),
            password: server.password.clone(),
            state: RwLock::new(None),
        })
    }

    /// Authenticate (or refresh) and return a valid, non-expired access
    /// token.
    pub async fn current_token(&self) -> Result<String> {
        {
            let guard = self.state.read().await;
            if let Some(state) = guard.as_ref() {
                if Utc::now() < state.expiry_time {
                    return Ok(state.access_token.clone());
                }
            }
        }

        let mut guard = self.state.write().await;
        // Another writer may have refreshed while we waited for the lock.
        if let Some(state) = guard.as_ref() {
            if Utc::now() < state.expiry_time {
                return Ok(state.access_token.clone());
            }
        }

        let refresh_token = guard.as_ref().and_then(|s| s.refresh_token.clone());
        let new_state = match refresh_token {
            Some(token) => match self.do_refresh(&token).await {
                Ok(state) => state,
                Err(err) => {
                    warn!(error = %err, "token refresh failed, falling back to re-authentication");
                    self.do_authenticate().await?
                }
            },
            None => self.do_authenticate().await?,
        };

        let token = new_state.access_token.clone();
        *guard = Some(new_state);
        Ok(token)
    }

    async fn do_authenticate(&self) -> Result<TokenState> {
        debug!("authenticating against NSP auth endpoint");
        let resp = self
            .client
            .post(&self.auth_url)
            .basic_auth(&self.username, Some(&self.password))
            .json(&json!({"grant_type": "client_credentials"}))
            .send()
            .await?
            .error_for_status()
            .map_err(|e| Error::auth(e.to_string()))?;

        let parsed: TokenResponse = resp.json().await?;
        Ok(Self::to_state(parsed))
    }

    async fn do_refresh(&self, refresh_token: &str) -> Result<TokenState> {
        debug!("refreshing NSP access token");
        let resp = self
            .client
            .post(&self.auth_url)
            .basic_auth(&self.username, Some(&self.password))
            .json(&json!({"grant_type": "refresh_token", "refresh_token": refresh_token}))
            .send()
            .await?
            .error_for_status()
            .map_err(|e| Error::auth(e.to_string()))?;

        let parsed: TokenResponse = resp.json().await?;
        Ok(Self::to_state(parsed))
    }

    fn to_state(resp: TokenResponse) -> TokenState {
        let expiry_time = Utc::now() + Duration::seconds(resp.expires_in) + REFRESH_BUFFER;
        TokenState {
            access_token: resp.access_token,
            refresh_token: resp.refresh_token,
            expiry_time,
        }
    }

    /// Revoke the current access token, if one has been obtained. Best
    /// effort: errors are returned to the caller (the supervisor logs and
    /// continues teardown regardless).
    pub async fn revoke(&self) -> Result<()> {
        let token = {
            let guard = self.state.read().await;
            guard.as_ref().map(|s| s.access_token.clone())
        };
        let Some(token) = token else {
            return Ok(());
        };

        self.client
            .post(&self.revoke_url)
            .basic_auth(&self.username, Some(&self.password))
            .form(&[("token", token.as_str()), ("token_type_hint", "token")])
            .send()
            .await?
            .error_for_status()
            .map_err(|e| Error::auth(e.to_string()))?;
        Ok(())
    }
}
