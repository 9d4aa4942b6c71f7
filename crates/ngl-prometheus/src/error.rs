use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("metric registration failed: {0}")]
    Registry(#[from] prometheus::Error),
    #[error("metrics encoding is not utf-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
    #[error("writing {path}: {reason}")]
    Write { path: String, reason: String },
}
