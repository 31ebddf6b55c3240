use syncman_types::ConfigError;
use thiserror::Error;

/// Failures talking to a store backend.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    #[error("etcd error: {0}")]
    Etcd(#[from] etcd_client::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Non-2xx response from an HTTP store API
    #[error("Backend returned {status}: {message}")]
    Backend { status: u16, message: String },

    /// Watch, session, or lease ended and must be re-established
    #[error("Watch closed: {0}")]
    WatchClosed(String),

    /// Stored value could not be decoded
    #[error("Malformed value under {key}: {message}")]
    Decode { key: String, message: String },

    #[error("Invalid store configuration: {0}")]
    InvalidConfig(String),
}

impl StoreError {
    pub fn backend(status: u16, message: impl Into<String>) -> Self {
        Self::Backend { status, message: message.into() }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
