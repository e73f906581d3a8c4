pub mod token;

use std::sync::Arc;

use chrono::{Duration, Utc};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
pub use reqwest::Method;
use thiserror::Error;

use crate::config::GatewayConfig;
use crate::types::OAuthTokenResponse;
pub use token::{CachedToken, Credentials, InMemoryTokenCache, TokenCache};

#[derive(Debug, Error)]
pub enum ClientError {
    /// Token endpoint rejected the client-credentials exchange. Not retried
    /// here; callers decide.
    #[error("token exchange rejected ({status}): {body}")]
    AuthenticationFailure { status: u16, body: String },
    /// Any non-2xx from the provider other than the token endpoint. The body
    /// is parsed so callers can branch on provider error codes.
    #[error("provider returned {status}")]
    Api {
        status: u16,
        body: serde_json::Value,
    },
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("undecodable provider response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ClientError {
    /// Matches the provider error body against a specific issue code, e.g.
    /// `("UNPROCESSABLE_ENTITY", "ORDER_ALREADY_CAPTURED")`.
    pub fn has_issue(&self, name: &str, issue: &str) -> bool {
        let ClientError::Api { body, .. } = self else {
            return false;
        };
        let name_matches = body
            .get("name")
            .and_then(|value| value.as_str())
            .is_some_and(|value| value == name);
        let issue_matches = body
            .get("details")
            .and_then(|details| details.as_array())
            .is_some_and(|details| {
                details.iter().any(|detail| {
                    detail
                        .get("issue")
                        .and_then(|value| value.as_str())
                        .is_some_and(|value| value == issue)
                })
            });
        name_matches && issue_matches
    }

    /// Matches only the top-level error name, for provider errors that carry
    /// no detail entries (e.g. `WEBHOOK_URL_ALREADY_EXISTS`).
    pub fn has_name(&self, name: &str) -> bool {
        let ClientError::Api { body, .. } = self else {
            return false;
        };
        body.get("name")
            .and_then(|value| value.as_str())
            .is_some_and(|value| value == name)
    }
}

/// Outcome of one provider call: a parsed JSON body, or the sentinel for a
/// successful DELETE (the provider answers 204 with no body).
#[derive(Debug, Clone)]
pub enum ApiResult {
    Json(serde_json::Value),
    Deleted,
}

impl ApiResult {
    pub fn into_json(self) -> serde_json::Value {
        match self {
            ApiResult::Json(value) => value,
            ApiResult::Deleted => serde_json::Value::Null,
        }
    }
}

/// Authenticated client for the provider's REST API. One attempt per call,
/// no retry or backoff; connection handling is whatever reqwest does.
#[derive(Clone)]
pub struct PaypalClient {
    http: reqwest::Client,
    config: GatewayConfig,
    credentials: Credentials,
    token_cache: Arc<dyn TokenCache>,
}

impl PaypalClient {
    pub fn new(
        config: GatewayConfig,
        credentials: Credentials,
        token_cache: Arc<dyn TokenCache>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            credentials,
            token_cache,
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn auth_hash(&self) -> String {
        self.credentials.auth_hash()
    }

    /// Returns a cached bearer token when one is present and unexpired,
    /// otherwise runs the client-credentials exchange. The cache expiry is
    /// the configured timeout, deliberately independent of the token's own
    /// reported lifetime. Concurrent refreshes may overwrite each other;
    /// any valid token is interchangeable.
    pub async fn access_token(&self) -> Result<String, ClientError> {
        let key = self.config.token_cache_key(&self.credentials.auth_hash());
        if let Some(cached) = self.token_cache.get(&key) {
            return Ok(cached.access_token);
        }

        let url = format!(
            "{}{}",
            self.config.effective_api_url(),
            self.config.auth_path
        );
        let response = self
            .http
            .post(&url)
            .header(
                AUTHORIZATION,
                format!("Basic {}", self.credentials.basic_auth()),
            )
            .header(ACCEPT, "application/json")
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), "paypal token exchange failed");
            return Err(ClientError::AuthenticationFailure {
                status: status.as_u16(),
                body,
            });
        }

        let token: OAuthTokenResponse = response.json().await?;
        self.token_cache.put(
            &key,
            CachedToken {
                access_token: token.access_token.clone(),
                expires_at: Utc::now()
                    + Duration::seconds(self.config.auth_cache_timeout_secs as i64),
            },
        );
        Ok(token.access_token)
    }

    /// Issues one authenticated request. `path` may be a full URL or a path
    /// relative to the effective API base.
    pub async fn call(
        &self,
        path: &str,
        method: Method,
        payload: Option<&serde_json::Value>,
    ) -> Result<ApiResult, ClientError> {
        let url = if path.to_lowercase().starts_with("http") {
            path.to_string()
        } else {
            format!("{}{}", self.config.effective_api_url(), path)
        };

        let token = self.access_token().await?;
        let mut request = self
            .http
            .request(method.clone(), &url)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .header(CONTENT_TYPE, "application/json");
        if let Some(payload) = payload {
            request = request.json(payload);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            tracing::error!(status = status.as_u16(), %url, "paypal api error: {text}");
            let body = serde_json::from_str(&text)
                .unwrap_or_else(|_| serde_json::Value::String(text));
            return Err(ClientError::Api {
                status: status.as_u16(),
                body,
            });
        }

        if method == Method::DELETE {
            return Ok(ApiResult::Deleted);
        }
        if text.is_empty() {
            return Ok(ApiResult::Json(serde_json::Value::Null));
        }
        Ok(ApiResult::Json(serde_json::from_str(&text)?))
    }
}
