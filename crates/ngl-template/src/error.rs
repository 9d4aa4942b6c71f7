use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template directory {0} does not exist")]
    MissingDir(String),
}
