use std::time::Duration;

use axum::http::StatusCode;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::config::AppConfig;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token endpoint not configured (KEAP_TOKEN_URL)")]
    MissingTokenUrl,

    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    #[error("token request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Keap token refresh failed: {status} - {body}")]
    Rejected { status: StatusCode, body: String },
}

/// Token endpoint response body, passed through untouched. Usually carries
/// `access_token`, `refresh_token`, `expires_in` and `token_type`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TokenPair(pub Value);

impl TokenPair {
    fn from_body(body: String) -> Self {
        match serde_json::from_str(&body) {
            Ok(value) => TokenPair(value),
            Err(_) => TokenPair(Value::String(body)),
        }
    }
}

/// OAuth client for Keap's token endpoint.
#[derive(Clone)]
pub struct TokenClient {
    client: reqwest::Client,
    token_url: Option<String>,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl TokenClient {
    pub fn new(config: &AppConfig) -> Result<Self, TokenError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.proxy.timeout_secs))
            .user_agent(config.proxy.user_agent.clone())
            .build()
            .map_err(TokenError::ClientBuild)?;

        Ok(Self {
            client,
            token_url: config.keap.token_url.clone(),
            client_id: config.keap.client_id.clone(),
            client_secret: config.keap.client_secret.clone(),
            redirect_uri: config.keap.redirect_uri.clone(),
        })
    }

    fn token_url(&self) -> Result<&str, TokenError> {
        self.token_url.as_deref().ok_or(TokenError::MissingTokenUrl)
    }

    /// Exchanges an authorization code. Whatever the endpoint answers is
    /// returned, including OAuth error bodies; only transport failures error.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenPair, TokenError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("code", code),
        ];

        let response = self.client.post(self.token_url()?).form(&params).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            tracing::info!("Exchanged Keap authorization code");
        } else {
            tracing::warn!(status = status.as_u16(), "Keap rejected authorization code");
        }

        Ok(TokenPair::from_body(body))
    }

    /// Trades a refresh token for a new pair, authenticating the client with
    /// HTTP Basic credentials.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, TokenError> {
        let params = [("grant_type", "refresh_token"), ("refresh_token", refresh_token)];

        let response = self
            .client
            .post(self.token_url()?)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::error!(status = status.as_u16(), "Keap token refresh failed: {}", body);
            return Err(TokenError::Rejected { status, body });
        }

        tracing::info!("Refreshed Keap access token");
        Ok(TokenPair::from_body(body))
    }
}
