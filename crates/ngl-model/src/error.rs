use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid image reference: {0}")]
    InvalidImageRef(String),

    #[error("invalid volume mount '{0}' (expected host:container[:options])")]
    InvalidVolume(String),

    #[error("app '{app}': {reason}")]
    InvalidDescriptor { app: String, reason: String },

    #[error("duplicate app name: {0}")]
    DuplicateApp(String),

    #[error("invalid mail configuration: {0}")]
    InvalidMail(String),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ModelError {
    pub(crate) fn descriptor(app: &str, reason: impl Into<String>) -> Self {
        ModelError::InvalidDescriptor {
            app: app.to_string(),
            reason: reason.into(),
        }
    }
}
