use clawden_common::FromMessage;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Sanitization rejected a user id. Surfaced at the call site, never retried.
    #[error("invalid user id: {0}")]
    InvalidUserId(String),
    /// Unexpected filesystem fault. Propagated to the caller.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// Transport or non-2xx failure talking to the cloud backend.
    #[error("upstream error: {0}")]
    Upstream(String),
    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}

impl FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message { message }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

clawden_common::impl_context!();
