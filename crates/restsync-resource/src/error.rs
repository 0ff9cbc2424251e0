//! Error types for restsync-resource

/// Result type for restsync-resource operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in restsync-resource operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Logical path must not be empty")]
    EmptyPath,

    #[error("Invalid logical path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Invalid attribute path '{path}': {reason}")]
    InvalidAttributePath { path: String, reason: String },

    #[error("Cannot apply patch at '{path}': {reason}")]
    PatchFailed { path: String, reason: String },
}

impl Error {
    pub fn invalid_attribute(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidAttributePath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn patch(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PatchFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
