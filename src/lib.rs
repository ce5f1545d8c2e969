pub mod auth;
pub mod cli;
pub mod client;
pub mod config;
pub mod data;
pub mod error;
pub mod resource;
pub mod session;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{Error, Result};

use std::sync::Arc;

use auth::AuthProvider;
use client::ApiClient;
use config::Config;
use data::DataProvider;
use session::SessionStore;

/// Everything a frontend needs, wired from one config: a shared session
/// store and the data and auth providers built on top of it.
pub struct Console {
    pub session: Arc<SessionStore>,
    pub data: DataProvider,
    pub auth: AuthProvider,
}

impl Console {
    pub fn new(config: &Config) -> Result<Self> {
        let session = Arc::new(SessionStore::new(&config.auth.session_file));
        Self::with_session(config, session)
    }

    /// Wire the providers around an existing session store. Used by tests
    /// and embedders that manage persistence themselves.
    pub fn with_session(config: &Config, session: Arc<SessionStore>) -> Result<Self> {
        let client = ApiClient::new(config, session.clone())?;
        let data = DataProvider::new(client.clone(), config.api.parse_mode);
        let auth = AuthProvider::new(client, config.auth.required_role.clone());
        Ok(Self {
            session,
            data,
            auth,
        })
    }
}
