//! Auth adapter: login, logout and session checks against the backend.
//!
//! Login is the only call that goes out without a token. A successful login
//! stores `{token, role, username}` in the shared session store; any failed
//! outcome (bad credentials, missing token in the response, wrong role)
//! leaves the store untouched so no partial session state ever exists.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

use crate::client::ApiClient;
use crate::error::{Error, Result};
use crate::session::SessionStore;

const LOGIN_PATH: &str = "/api/auth/login";

/// Who the current session belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub id: String,
    pub full_name: String,
    pub role: String,
}

pub struct AuthProvider {
    client: ApiClient,
    required_role: String,
}

impl AuthProvider {
    pub fn new(client: ApiClient, required_role: impl Into<String>) -> Self {
        Self {
            client,
            required_role: required_role.into(),
        }
    }

    fn session(&self) -> &Arc<SessionStore> {
        self.client.session()
    }

    /// Exchange credentials for a token. Succeeds only when the backend
    /// returns a token together with the required role.
    pub async fn login(&self, username: &str, password: &str) -> Result<()> {
        let credentials = serde_json::json!({
            "username": username,
            "password": password,
        });

        let response = self
            .client
            .post_public(LOGIN_PATH, &credentials)
            .await
            .map_err(|err| Error::Login {
                reason: match &err {
                    Error::Request {
                        status: Some(401), ..
                    } => "invalid credentials".to_string(),
                    _ => err.to_string(),
                },
            })?;

        let token = match response.body.get("access_token").and_then(Value::as_str) {
            Some(token) => token,
            None => {
                return Err(Error::Login {
                    reason: "login response did not include an access token".to_string(),
                })
            }
        };

        let role = response
            .body
            .get("role")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if role != self.required_role {
            debug!(role, required = %self.required_role, "Rejecting login: insufficient role");
            return Err(Error::Login {
                reason: format!("role `{role}` does not grant console access"),
            });
        }

        self.session().set(token, role, username);
        info!(username, "Logged in");
        Ok(())
    }

    /// Drop the session. Never fails and may be called repeatedly.
    pub fn logout(&self) {
        self.session().clear();
        info!("Logged out");
    }

    /// Succeeds iff a token with the required role is present.
    pub fn check_auth(&self) -> Result<()> {
        match self.session().get() {
            Some(session) if !session.token.is_empty() && session.role == self.required_role => {
                Ok(())
            }
            _ => Err(Error::SessionInvalid),
        }
    }

    /// Hook for the presentation layer: a 401/403 tears the session down
    /// and demands a fresh login; every other status is survivable.
    pub fn check_error(&self, status: u16) -> Result<()> {
        if status == 401 || status == 403 {
            self.session().clear();
            return Err(Error::SessionInvalid);
        }
        Ok(())
    }

    pub fn get_identity(&self) -> Result<Identity> {
        match self.session().get() {
            Some(session) if !session.username.is_empty() && !session.role.is_empty() => {
                Ok(Identity {
                    id: session.username.clone(),
                    full_name: session.username,
                    role: session.role,
                })
            }
            _ => Err(Error::SessionInvalid),
        }
    }

    /// The stored role, absent when nobody is logged in.
    pub fn get_permissions(&self) -> Option<String> {
        self.session().role()
    }
}
