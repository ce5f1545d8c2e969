//! Shared fixtures for in-file tests: a throwaway axum backend bound to an
//! ephemeral port and client builders wired to an in-memory session store.

use std::sync::Arc;

use axum::Router;

use crate::client::ApiClient;
use crate::config::Config;
use crate::session::SessionStore;

/// Serve `app` on an ephemeral local port and return its base URL.
pub(crate) async fn spawn_backend(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

pub(crate) fn config_for(base_url: &str) -> Config {
    let mut config = Config::default();
    config.api.base_url = base_url.to_string();
    config
}

/// Client with default (fail-fast) policy and an in-memory session store.
pub(crate) fn client_for(base_url: &str) -> ApiClient {
    ApiClient::new(&config_for(base_url), Arc::new(SessionStore::in_memory())).unwrap()
}
