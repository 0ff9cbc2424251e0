//! Error types for restsync-core

use crate::server::ServerError;

/// Result type for restsync-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in restsync-core operations
///
/// Not-found and conflict drive the fallback decisions of the engine and
/// surface only when no fallback applies. Everything else is returned as
/// it came, never retried.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Resource or collection absent locally or remotely
    #[error("Not found: {0}")]
    NotFound(String),

    /// Remote rejected a create because the resource already exists
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A required collaborator (managed server, secret store) is not wired up
    #[error("Not configured: {0}")]
    NotConfigured(String),

    /// Malformed input rejected before any I/O
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The resource record disables the operation for this path
    #[error("Operation '{operation}' is not defined for {path}")]
    OperationUndefined { operation: String, path: String },

    /// Transform the payload engine cannot apply
    #[error("Unsupported payload transform: {0}")]
    UnsupportedTransform(String),

    /// Any other failure reported by the managed server
    #[error("Remote {operation} of {path} failed: {source}")]
    Remote {
        operation: String,
        path: String,
        #[source]
        source: ServerError,
    },

    #[error(transparent)]
    Secrets(#[from] restsync_secrets::Error),

    #[error(transparent)]
    Metadata(#[from] restsync_metadata::Error),

    #[error(transparent)]
    Resource(#[from] restsync_resource::Error),

    #[error(transparent)]
    Fs(#[from] restsync_fs::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Classify a server error for `operation` on `path`.
    pub fn remote(operation: impl Into<String>, path: impl std::fmt::Display, source: ServerError) -> Self {
        let operation = operation.into();
        match source {
            ServerError::NotFound(message) => Self::NotFound(format!("{path} ({operation}: {message})")),
            ServerError::Conflict(message) => Self::Conflict(format!("{path} ({operation}: {message})")),
            other => Self::Remote {
                operation,
                path: path.to_string(),
                source: other,
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    pub fn is_not_configured(&self) -> bool {
        match self {
            Self::NotConfigured(_) => true,
            Self::Secrets(e) => e.is_not_configured(),
            _ => false,
        }
    }

    pub fn is_not_initialized(&self) -> bool {
        matches!(self, Self::Secrets(e) if e.is_not_initialized())
    }

    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::Resource(_)
                | Self::Metadata(restsync_metadata::Error::InvalidTemplate { .. })
                | Self::Secrets(restsync_secrets::Error::Resource(_))
                | Self::Secrets(restsync_secrets::Error::InvalidPlaceholder(_))
                | Self::Secrets(restsync_secrets::Error::CollectionSecrets { .. })
        )
    }
}
