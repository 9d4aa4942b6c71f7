use ngl_core::CollabError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid mail address '{addr}': {reason}")]
    Address { addr: String, reason: String },

    #[error("smtp transport: {0}")]
    Transport(String),

    #[error("message: {0}")]
    Message(String),
}

impl From<NotifyError> for CollabError {
    fn from(e: NotifyError) -> Self {
        CollabError::Mail(e.to_string())
    }
}
