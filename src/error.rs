//! Top-level error types for tickerbot.

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error enum wrapping domain-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required config key: {0}")]
    MissingKey(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Market data and news provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("provider request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("provider returned a malformed payload: {0}")]
    MalformedResponse(String),

    #[error("no data for symbol: {symbol}")]
    NotFound { symbol: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Messaging platform send/edit/delete errors.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("failed to send message: {0}")]
    Send(String),

    #[error("failed to edit message {message_id}: {reason}")]
    Edit { message_id: u64, reason: String },

    #[error("failed to delete message {message_id}: {reason}")]
    Delete { message_id: u64, reason: String },

    #[error("gateway error: {0}")]
    Gateway(#[from] serenity::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
