//! Error taxonomy shared by the client, data and auth layers.
//!
//! Every failure the library surfaces is one of a closed set of variants
//! with structured fields, so callers branch on the kind (and on the ids
//! inside a batch failure) instead of parsing message strings.

use thiserror::Error;

use crate::resource::Resource;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A resource name outside the fixed set. Programmer error, never retried.
    #[error("unknown resource `{name}`")]
    UnknownResource { name: String },

    /// No session token present where one is required. The request never
    /// reached the network.
    #[error("authentication required: no session token")]
    AuthenticationRequired,

    /// Transport failure or a non-2xx backend response.
    #[error("{message}")]
    Request {
        /// HTTP status, absent for transport-level failures.
        status: Option<u16>,
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// The backend reported no record for the given id.
    #[error("{resource} record `{id}` not found")]
    NotFound { resource: Resource, id: String },

    /// Operation not supported for the resource, or payload rejected.
    #[error("validation failed for {resource}: {reason}")]
    Validation { resource: Resource, reason: String },

    /// Bad credentials, missing token in the response, or insufficient role.
    #[error("login failed: {reason}")]
    Login { reason: String },

    /// Stale or absent session detected by a check.
    #[error("session is missing or invalid")]
    SessionInvalid,

    /// Aggregated outcome of a batch write where some ids failed. Updates
    /// that already succeeded are not rolled back.
    #[error("{operation} on {resource} failed for {} of {} record(s)", .failed.len(), .failed.len() + .succeeded.len())]
    Batch {
        resource: Resource,
        operation: &'static str,
        /// Ids the backend accepted before or alongside the failures.
        succeeded: Vec<String>,
        failed: Vec<BatchFailure>,
    },
}

/// One failed id inside an [`Error::Batch`].
#[derive(Debug)]
pub struct BatchFailure {
    pub id: String,
    pub reason: String,
}

impl Error {
    /// HTTP status associated with this error, when one exists.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Request { status, .. } => *status,
            Error::NotFound { .. } => Some(404),
            _ => None,
        }
    }

    /// True when the error should send the operator back to the login screen.
    pub fn is_auth_error(&self) -> bool {
        match self {
            Error::AuthenticationRequired | Error::SessionInvalid => true,
            Error::Request {
                status: Some(status),
                ..
            } => *status == 401 || *status == 403,
            _ => false,
        }
    }
}
