//! Access token acquisition for the directory API.
//!
//! A signed assertion is exchanged for an OAuth bearer token using the
//! JWT-bearer grant. The token's expiry is never parsed: it is kept until a
//! directory call fails and the gateway invalidates it.

use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use dirsync_connector::resilience::{RetryExecutor, RetryPolicy};

use crate::assertion::TokenMinter;
use crate::config::{Office365Config, Office365Credentials};
use crate::error::{Office365Error, Office365Result};
use crate::graph_client::extract_error_message;

/// Grant type for exchanging a self-signed assertion.
pub const JWT_BEARER_GRANT: &str = "http://oauth.net/grant_type/jwt/1.0/bearer";

const BEARER_PREFIX: &str = "Bearer ";

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
}

/// Owns the single bearer token of a connection.
pub struct TokenService {
    minter: TokenMinter,
    auth_url: String,
    resource: String,
    token_lifetime_secs: i64,
    http_client: reqwest::Client,
    retry: RetryExecutor,
    cached_token: Arc<RwLock<Option<SecretString>>>,
}

impl TokenService {
    /// Creates a token service sharing `http_client` with the gateway.
    pub fn new(
        config: &Office365Config,
        credentials: &Office365Credentials,
        http_client: reqwest::Client,
    ) -> Office365Result<Self> {
        Ok(Self {
            minter: TokenMinter::new(config, credentials)?,
            auth_url: config.auth_url.clone(),
            resource: config.token_resource()?,
            token_lifetime_secs: config.token_lifetime_secs,
            http_client,
            retry: RetryExecutor::new(RetryPolicy::immediate(config.max_token_attempts)),
            cached_token: Arc::new(RwLock::new(None)),
        })
    }

    /// Replace the retry policy, e.g. to add backoff between attempts.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = RetryExecutor::new(policy);
        self
    }

    /// Returns the cached `Bearer ...` value, acquiring one if none is held.
    ///
    /// # Errors
    ///
    /// [`Office365Error::Auth`] once every attempt has failed, or
    /// [`Office365Error::Crypto`] if the assertion cannot be signed at all.
    #[instrument(skip(self), fields(resource = %self.resource))]
    pub async fn get_token(&self) -> Office365Result<SecretString> {
        {
            let cache = self.cached_token.read().await;
            if let Some(ref token) = *cache {
                debug!("Using cached token");
                return Ok(token.clone());
            }
        }

        debug!("No cached token, acquiring");
        let token = self
            .retry
            .execute(
                || self.acquire_token(),
                |e| !matches!(e, Office365Error::Crypto(_) | Office365Error::Config(_)),
            )
            .await
            .map_err(|failure| match failure.last_error {
                e @ (Office365Error::Crypto(_) | Office365Error::Config(_)) => e,
                e => Office365Error::Auth {
                    attempts: failure.attempts,
                    message: e.to_string(),
                },
            })?;

        {
            let mut cache = self.cached_token.write().await;
            *cache = Some(token.clone());
        }
        info!("Acquired directory access token");
        Ok(token)
    }

    /// One mint-and-exchange round trip.
    async fn acquire_token(&self) -> Office365Result<SecretString> {
        let assertion = self.minter.mint(Utc::now(), self.token_lifetime_secs)?;
        let assertion = assertion.compact();

        let params = [
            ("grant_type", JWT_BEARER_GRANT),
            ("assertion", assertion.expose_secret()),
            ("resource", self.resource.as_str()),
        ];

        let response = self
            .http_client
            .post(&self.auth_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Token request failed");
                Office365Error::Transport(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Token endpoint rejected assertion");
            return Err(Office365Error::directory(
                status.as_u16(),
                extract_error_message(&body),
                body,
            ));
        }

        let parsed: TokenResponse = response.json().await.map_err(|e| {
            Office365Error::InvalidResponse(format!("token response is not JSON: {e}"))
        })?;

        match parsed.access_token {
            Some(token) if !token.is_empty() => {
                Ok(SecretString::from(format!("{BEARER_PREFIX}{token}")))
            }
            _ => {
                warn!("Token response carried no access_token");
                Err(Office365Error::InvalidResponse(
                    "token response has no access_token".to_string(),
                ))
            }
        }
    }

    /// Drops the cached token; the next [`get_token`](Self::get_token) re-acquires.
    pub async fn invalidate(&self) {
        let mut cache = self.cached_token.write().await;
        if cache.take().is_some() {
            warn!("Invalidated directory access token");
        }
    }

    /// Whether a token is currently cached.
    pub async fn has_token(&self) -> bool {
        self.cached_token.read().await.is_some()
    }
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("auth_url", &self.auth_url)
            .field("resource", &self.resource)
            .field("minter", &self.minter)
            .finish_non_exhaustive()
    }
}
