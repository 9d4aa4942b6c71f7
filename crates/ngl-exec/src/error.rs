use ngl_core::CollabError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("spawn `{program}` failed: {reason}")]
    Spawn { program: String, reason: String },
    #[error("`{command}` exited with {status}: {stderr}")]
    NonZeroExit {
        command: String,
        status: String,
        stderr: String,
    },
    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },
    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ExecError {
    fn from(e: std::io::Error) -> Self {
        ExecError::Io(e.to_string())
    }
}

impl From<ExecError> for CollabError {
    fn from(e: ExecError) -> Self {
        match e {
            ExecError::Spawn { program, reason } => CollabError::Spawn {
                command: program,
                reason,
            },
            ExecError::NonZeroExit {
                command,
                status,
                stderr,
            } => CollabError::non_zero(command, status, stderr),
            parse @ ExecError::Parse { .. } => CollabError::Parse(parse.to_string()),
            ExecError::Io(reason) => CollabError::Io(reason),
        }
    }
}

pub type ExecResult<T> = Result<T, ExecError>;
