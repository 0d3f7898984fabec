use std::path::PathBuf;

/// Core error type.
///
/// Adapter crates map their specific errors into this type (transport failures
/// become [`Error::Transport`]) so the bot core can tell user-facing failures
/// from ones that only get logged.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown batch: {0}")]
    UnknownBatch(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("deletion store unavailable at {path}: {reason}")]
    StoreUnavailable { path: PathBuf, reason: String },

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Why a deep-link payload was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvalidTokenReason {
    Empty,
    TooLong,
    Unrecognized,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid token ({reason:?})")]
pub struct InvalidToken {
    pub reason: InvalidTokenReason,
}

impl InvalidToken {
    pub fn new(reason: InvalidTokenReason) -> Self {
        Self { reason }
    }
}

/// Failure classes reported by the chat transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Chat or message no longer exists.
    NotFound,
    /// The bot lost the right to act (blocked, kicked, message too old).
    Forbidden,
    RateLimited,
    /// Network faults and other conditions that may clear on their own.
    Transient,
    /// Any other request the transport refused.
    Rejected,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("transport error ({kind:?}): {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}
