//! Static mapping from logical resource names to backend paths and
//! capabilities.
//!
//! The backend manages a fixed set of record types; everything the client
//! needs to know about them (path prefix, envelope keys, which write
//! operations are allowed) lives in this one exhaustively-matched enum.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// One of the fixed backend-managed record types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Parameters,
    Requests,
    Users,
}

/// Which write operations a resource supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub creatable: bool,
    pub writable: bool,
    pub deletable: bool,
}

impl Resource {
    pub const ALL: [Resource; 3] = [Resource::Parameters, Resource::Requests, Resource::Users];

    /// Backend path prefix for this resource. Pure and side-effect free.
    pub fn path(&self) -> &'static str {
        match self {
            Resource::Parameters => "/admin/parameters",
            Resource::Requests => "/admin/requests",
            Resource::Users => "/admin/users",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Parameters => "parameters",
            Resource::Requests => "requests",
            Resource::Users => "users",
        }
    }

    /// Key under which the backend nests the record array in list envelopes,
    /// e.g. `{"parameters": [...], "total": 3}`.
    pub fn record_key(&self) -> &'static str {
        self.as_str()
    }

    /// Key under which the backend nests a single record in create/read
    /// envelopes, e.g. `{"parameter": {...}}`.
    pub fn singular_key(&self) -> &'static str {
        match self {
            Resource::Parameters => "parameter",
            Resource::Requests => "request",
            Resource::Users => "user",
        }
    }

    /// Request logs are read-only; parameters and users take the full set
    /// of write operations.
    pub fn capabilities(&self) -> Capabilities {
        match self {
            Resource::Requests => Capabilities {
                creatable: false,
                writable: false,
                deletable: false,
            },
            Resource::Parameters | Resource::Users => Capabilities {
                creatable: true,
                writable: true,
                deletable: true,
            },
        }
    }
}

impl FromStr for Resource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "parameters" => Ok(Resource::Parameters),
            "requests" => Ok(Resource::Requests),
            "users" => Ok(Resource::Users),
            other => Err(Error::UnknownResource {
                name: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
