use thiserror::Error;

/// Failure reported by an external collaborator (git, container engine, renderer, shell, mail).
#[derive(Debug, Error)]
pub enum CollabError {
    #[error("`{command}` exited with {status}: {output}")]
    NonZeroExit {
        command: String,
        status: String,
        output: String,
    },
    #[error("failed to spawn `{command}`: {reason}")]
    Spawn { command: String, reason: String },
    /// Engine output could not be read; the listing is unusable.
    #[error("unreadable engine output: {0}")]
    Parse(String),
    #[error("template '{0}' not found")]
    TemplateNotFound(String),
    #[error("template error: {0}")]
    Template(String),
    #[error("mail delivery failed: {0}")]
    Mail(String),
    #[error("io error: {0}")]
    Io(String),
}

impl CollabError {
    pub fn non_zero(
        command: impl Into<String>,
        status: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        CollabError::NonZeroExit {
            command: command.into(),
            status: status.into(),
            output: output.into(),
        }
    }

    /// True for failures to read container or image listings.
    #[inline]
    pub fn is_query_failure(&self) -> bool {
        matches!(self, CollabError::Parse(_))
    }
}

impl From<std::io::Error> for CollabError {
    fn from(e: std::io::Error) -> Self {
        CollabError::Io(e.to_string())
    }
}

/// Fatal failure of one build attempt.
///
/// The payload is the detail that gets logged; [`AttemptError::user_message`] is what ends up in results and reports.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("clone failed: {0}")]
    Clone(String),
    #[error("custom prebuild failed: {0}")]
    Prebuild(String),
    #[error("version set command failed: {0}")]
    VersionCommand(String),
    #[error("manifest render failed: {0}")]
    ManifestRender(String),
    #[error("image build failed: {0}")]
    EngineBuild(String),
    #[error("flatten failed: {0}")]
    Flatten(String),
    #[error("postbuild tagging failed: {0}")]
    Postbuild(String),
    #[error("archive failed: {0}")]
    Archive(String),
    #[error("launch failed: {0}")]
    Launch(String),
    #[error("push failed: {0}")]
    Push(String),
    #[error("workspace error: {0}")]
    Workspace(String),
}

impl AttemptError {
    /// Fixed message for this failure kind; never contains collaborator output.
    pub fn user_message(&self) -> &'static str {
        match self {
            AttemptError::Clone(_) => "source checkout failed",
            AttemptError::Prebuild(_) => "custom prebuild failed",
            AttemptError::VersionCommand(_) => "version set command failed",
            AttemptError::ManifestRender(_) => "manifest render failed",
            AttemptError::EngineBuild(_) => "image build failed",
            AttemptError::Flatten(_) => "image flatten failed",
            AttemptError::Postbuild(_) => "postbuild tagging failed",
            AttemptError::Archive(_) => "image archive failed",
            AttemptError::Launch(_) => "launch failed",
            AttemptError::Push(_) => "registry push failed",
            AttemptError::Workspace(_) => "workspace preparation failed",
        }
    }

    /// Short stage label used as a structured log field.
    pub fn stage(&self) -> &'static str {
        match self {
            AttemptError::Clone(_) => "clone",
            AttemptError::Prebuild(_) => "prebuild",
            AttemptError::VersionCommand(_) => "version",
            AttemptError::ManifestRender(_) => "manifest",
            AttemptError::EngineBuild(_) => "build",
            AttemptError::Flatten(_) => "flatten",
            AttemptError::Postbuild(_) => "postbuild",
            AttemptError::Archive(_) => "archive",
            AttemptError::Launch(_) => "launch",
            AttemptError::Push(_) => "push",
            AttemptError::Workspace(_) => "workspace",
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            AttemptError::Clone(d)
            | AttemptError::Prebuild(d)
            | AttemptError::VersionCommand(d)
            | AttemptError::ManifestRender(d)
            | AttemptError::EngineBuild(d)
            | AttemptError::Flatten(d)
            | AttemptError::Postbuild(d)
            | AttemptError::Archive(d)
            | AttemptError::Launch(d)
            | AttemptError::Push(d)
            | AttemptError::Workspace(d) => d,
        }
    }
}

/// Removal failure for a single aged image; the sweep continues.
#[derive(Debug, Error)]
#[error("failed to remove {image}: {reason}")]
pub struct RotationFailure {
    pub image: String,
    pub reason: String,
}
