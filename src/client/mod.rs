//! HTTP client adapter: the single chokepoint for traffic to the backend.
//!
//! Every request goes through [`ApiClient::execute`], which attaches the
//! bearer token from the session store, normalizes responses to a
//! `{status, body}` pair and tears the session down when the backend answers
//! unauthorized or forbidden. Under the default fail-fast policy a request
//! issued without a token never reaches the network.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::session::SessionStore;

/// A backend response normalized to status code plus JSON body.
///
/// Non-JSON bodies normalize to `Value::Null`; the data layer decides what
/// to make of the shape.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

/// Whether a request carries the stored session token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenPolicy {
    /// Attach the token; under fail-fast, error out when there is none.
    Session,
    /// Never attach a token and never tear the session down. Login only.
    Public,
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: Arc<SessionStore>,
    require_token: bool,
}

impl ApiClient {
    pub fn new(config: &Config, session: Arc<SessionStore>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api.timeout_secs))
            .build()
            .map_err(|err| Error::Request {
                status: None,
                message: "failed to build HTTP client".to_string(),
                source: Some(err),
            })?;

        Ok(Self {
            http,
            base_url: config.api.base_url.trim_end_matches('/').to_string(),
            session,
            require_token: config.api.require_token,
        })
    }

    /// The session store this client reads tokens from and clears on
    /// unauthorized responses.
    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub async fn get(&self, path: &str, query: &[(String, String)]) -> Result<ApiResponse> {
        self.execute(Method::GET, path, Some(query), None, TokenPolicy::Session)
            .await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<ApiResponse> {
        self.execute(Method::POST, path, None, Some(body), TokenPolicy::Session)
            .await
    }

    pub async fn put(&self, path: &str, body: &Value) -> Result<ApiResponse> {
        self.execute(Method::PUT, path, None, Some(body), TokenPolicy::Session)
            .await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse> {
        self.execute(Method::DELETE, path, None, None, TokenPolicy::Session)
            .await
    }

    /// Issue a request with no token attached, e.g. the login call itself.
    pub async fn post_public(&self, path: &str, body: &Value) -> Result<ApiResponse> {
        self.execute(Method::POST, path, None, Some(body), TokenPolicy::Public)
            .await
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        query: Option<&[(String, String)]>,
        body: Option<&Value>,
        policy: TokenPolicy,
    ) -> Result<ApiResponse> {
        let token = self.session.token();

        if policy == TokenPolicy::Session && token.is_none() && self.require_token {
            debug!(%method, path, "Rejecting request: no session token");
            return Err(Error::AuthenticationRequired);
        }

        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.request(method.clone(), &url);
        if let Some(query) = query {
            if !query.is_empty() {
                request = request.query(query);
            }
        }
        if policy == TokenPolicy::Session {
            if let Some(token) = token {
                request = request.bearer_auth(token);
            }
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        debug!(%method, %url, "Issuing request");
        let response = request.send().await.map_err(|err| Error::Request {
            status: None,
            message: format!("request to {path} failed"),
            source: Some(err),
        })?;

        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);

        if policy == TokenPolicy::Session
            && (status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN)
        {
            warn!(status = status.as_u16(), path, "Backend rejected session; clearing it");
            self.session.clear();
        }

        if !status.is_success() {
            let message = backend_message(&body).unwrap_or_else(|| {
                format!(
                    "backend returned {} for {}",
                    status.as_u16(),
                    path
                )
            });
            return Err(Error::Request {
                status: Some(status.as_u16()),
                message,
                source: None,
            });
        }

        Ok(ApiResponse {
            status: status.as_u16(),
            body,
        })
    }
}

/// Pull the human-readable `message` field most backend errors carry.
fn backend_message(body: &Value) -> Option<String> {
    body.get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
}
