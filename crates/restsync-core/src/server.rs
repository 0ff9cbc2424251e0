//! Managed server transport seam
//!
//! The HTTP client lives outside this crate. The engine describes each
//! call as a [`RequestSpec`] and only distinguishes not-found, conflict
//! and everything else in the answer.

use std::collections::BTreeMap;

use restsync_metadata::OperationSpec;
use restsync_resource::{LogicalPath, Resource};
use serde::Serialize;

/// A single remote call: method, path, headers and query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestSpec {
    pub method: String,
    /// Remote path, always starting with `/`
    pub path: String,
    pub headers: BTreeMap<String, String>,
    pub query: BTreeMap<String, String>,
}

impl RequestSpec {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            headers: BTreeMap::new(),
            query: BTreeMap::new(),
        }
    }

    /// Request for `operation` against a resolved remote path.
    pub fn for_operation(operation: &OperationSpec, path: &LogicalPath) -> Self {
        Self {
            method: operation.method.clone(),
            path: path.key(),
            headers: operation.headers.clone(),
            query: operation.query.clone(),
        }
    }
}

/// Errors reported by a [`ManagedServer`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServerError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("{}{message}", .status.map(|s| format!("HTTP {s}: ")).unwrap_or_default())]
    Other { status: Option<u16>, message: String },
}

impl ServerError {
    pub fn other(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Other {
            status,
            message: message.into(),
        }
    }
}

pub type ServerResult<T> = std::result::Result<T, ServerError>;

/// Remote HTTP-managed server holding the live resources.
///
/// Create and update return the body the server answered with.
pub trait ManagedServer: Send + Sync {
    fn get_resource(&self, spec: &RequestSpec) -> ServerResult<Resource>;

    fn get_resource_collection(&self, spec: &RequestSpec) -> ServerResult<Vec<Resource>>;

    fn create_resource(&self, body: &Resource, spec: &RequestSpec) -> ServerResult<Resource>;

    fn update_resource(&self, body: &Resource, spec: &RequestSpec) -> ServerResult<Resource>;

    fn delete_resource(&self, spec: &RequestSpec) -> ServerResult<()>;

    /// Probe for existence; not-found is `Ok(false)`.
    fn resource_exists(&self, spec: &RequestSpec) -> ServerResult<bool> {
        match self.get_resource(spec) {
            Ok(_) => Ok(true),
            Err(ServerError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
