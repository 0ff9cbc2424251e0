//! Error types for restsync-metadata

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid path template '{template}': {reason}")]
    InvalidTemplate { template: String, reason: String },

    #[error("Invalid metadata for {path}: {message}")]
    InvalidMetadata { path: String, message: String },

    #[error(transparent)]
    Resource(#[from] restsync_resource::Error),

    #[error("Filesystem error: {0}")]
    Fs(#[from] restsync_fs::Error),
}

impl Error {
    pub fn invalid_template(template: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTemplate {
            template: template.into(),
            reason: reason.into(),
        }
    }
}
