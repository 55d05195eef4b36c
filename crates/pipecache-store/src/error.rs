//! Error types for key-value stores.

/// Errors that can occur when talking to a key-value store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A Redis command or connection failed.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// The store is not reachable.
    #[error("store unavailable: {reason}")]
    Unavailable { reason: String },

    /// The entry options are not acceptable.
    #[error("invalid entry options: {0}")]
    InvalidOptions(String),
}

impl StoreError {
    /// Creates a new store unavailable error.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Creates a new invalid options error.
    pub fn invalid_options(msg: impl Into<String>) -> Self {
        Self::InvalidOptions(msg.into())
    }

    /// Returns true if this is a transient error that might succeed on retry.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Unavailable { .. } => true,
            Self::Redis(err) => {
                err.is_io_error() || err.is_timeout() || err.is_connection_dropped()
            },
            Self::InvalidOptions(_) => false,
        }
    }
}
