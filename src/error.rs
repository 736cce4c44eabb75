use thiserror::Error;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

/// Errors delivered to pending watch callers.
///
/// These fan out to every waiter registered on a subscription, so they must
/// be cheap to clone.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WatchError {
    #[error("connection closed: {reason}")]
    ConnectionClosed { reason: String },

    #[error("subscription failed: {message}")]
    SubscriptionFailed { message: String },
}

/// Replica store merge failures.
///
/// Both variants are local to a single symbol and recoverable: the
/// subscription stays alive and the next snapshot rebuilds the replica.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// A delta arrived for a symbol with no replica (out of sequence).
    #[error("delta received before snapshot")]
    NoReplica,

    /// A merge produced a crossed book (best bid >= best ask); the replica
    /// was discarded and a fresh snapshot is required.
    #[error("crossed book after merge")]
    CrossedBook,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Watch(#[from] WatchError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("WebSocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Error::WebSocket(Box::new(err))
    }
}
