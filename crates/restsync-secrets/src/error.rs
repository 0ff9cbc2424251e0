//! Error types for restsync-secrets

/// Result type for restsync-secrets operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in restsync-secrets operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No usable secret store configuration (missing, ambiguous or unreadable)
    #[error("Secret store is not configured: {reason}")]
    NotConfigured { reason: String },

    /// The store was used before `init()` succeeded (or after `close()`)
    #[error("Secret store is not initialized")]
    NotInitialized,

    #[error("Invalid secret key material: {reason}")]
    InvalidKey { reason: String },

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("Unsupported secrets file version {0}")]
    UnsupportedVersion(u32),

    #[error("Unsupported cipher '{0}'")]
    UnsupportedCipher(String),

    #[error("Unsupported key derivation function '{0}'")]
    UnsupportedKdf(String),

    #[error("Malformed secrets file: {reason}")]
    MalformedEnvelope { reason: String },

    #[error("Failed to decrypt secrets file (wrong key or tampered data)")]
    Decryption,

    #[error("Failed to encrypt secrets: {0}")]
    Encryption(String),

    #[error("Secret '{key}' not found for {path}")]
    SecretNotFound { path: String, key: String },

    #[error("Secret key must not be empty")]
    EmptySecretKey,

    #[error("Cannot persist secrets of collection resource {path}; mask each item instead")]
    CollectionSecrets { path: String },

    #[error("Invalid secret placeholder '{0}'")]
    InvalidPlaceholder(String),

    #[error(transparent)]
    Resource(#[from] restsync_resource::Error),

    #[error(transparent)]
    Fs(#[from] restsync_fs::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn not_configured(reason: impl Into<String>) -> Self {
        Self::NotConfigured {
            reason: reason.into(),
        }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedEnvelope {
            reason: reason.into(),
        }
    }

    pub fn is_not_configured(&self) -> bool {
        matches!(self, Self::NotConfigured { .. })
    }

    pub fn is_not_initialized(&self) -> bool {
        matches!(self, Self::NotInitialized)
    }
}
