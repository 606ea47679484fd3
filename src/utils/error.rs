use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the broker and the client tools.
#[derive(Debug, Error)]
pub enum Error {
    /// Fatal at startup: the listen address is in use or unavailable.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("transport error: {0}")]
    Transport(#[from] tungstenite::Error),

    /// A frame that violates the protocol; the offending link or connection
    /// is closed, everything else is untouched.
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("invalid address URL: {0}")]
    Url(String),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection closed")]
    ConnectionClosed,
}
