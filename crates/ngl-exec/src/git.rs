use std::path::Path;

use async_trait::async_trait;
use ngl_core::{CollabError, SourceControl};
use tracing::debug;

use crate::{
    error::ExecError,
    proc::{ProcConfig, run},
};

/// Source control through the `git` binary.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: String,
    /// Clone with `--depth 1`; tags outside the fetched history are then invisible to the version lookup.
    shallow: bool,
}

impl Default for GitCli {
    fn default() -> Self {
        Self {
            program: "git".to_string(),
            shallow: false,
        }
    }
}

impl GitCli {
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn shallow(mut self, shallow: bool) -> Self {
        self.shallow = shallow;
        self
    }

    fn clone_args(&self, repo: &str, branch: &str, dest: &Path) -> ProcConfig {
        let mut cfg = ProcConfig::new(&self.program).args(["clone", "--branch", branch, "--recursive"]);
        if self.shallow {
            cfg = cfg.args(["--depth", "1"]);
        }
        cfg.arg(repo).arg(dest.to_string_lossy())
    }
}

/// `git describe` wording for a history without any tag.
fn is_untagged(stderr: &str) -> bool {
    stderr.contains("No names found") || stderr.contains("No tags can describe")
}

#[async_trait]
impl SourceControl for GitCli {
    async fn clone_repo(&self, repo: &str, branch: &str, dest: &Path) -> Result<(), CollabError> {
        debug!(target: "ngl.exec.git", repo, branch, dest = %dest.display(), "clone");
        run(&self.clone_args(repo, branch, dest)).await?;
        Ok(())
    }

    async fn latest_tag(&self, checkout: &Path) -> Result<Option<String>, CollabError> {
        let cfg = ProcConfig::new(&self.program)
            .arg("-C")
            .arg(checkout.to_string_lossy())
            .args(["describe", "--tags", "--abbrev=0"]);
        match run(&cfg).await {
            Ok(out) => {
                let tag = out.stdout.trim();
                Ok((!tag.is_empty()).then(|| tag.to_string()))
            }
            Err(ExecError::NonZeroExit { ref stderr, .. }) if is_untagged(stderr) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_is_full_by_default() {
        let cfg = GitCli::default().clone_args("git@h:web.git", "master", Path::new("/w/web"));
        assert_eq!(
            cfg.display(),
            "git clone --branch master --recursive git@h:web.git /w/web"
        );

        let cfg = GitCli::default()
            .shallow(true)
            .clone_args("r", "dev", Path::new("/w/x"));
        assert_eq!(
            cfg.display(),
            "git clone --branch dev --recursive --depth 1 r /w/x"
        );
    }

    #[test]
    fn untagged_history_is_recognised() {
        assert!(is_untagged("fatal: No names found, cannot describe anything."));
        assert!(!is_untagged("fatal: not a git repository"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn lookup_outside_a_repository_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let git = GitCli::default();
        // Either git is missing (spawn error) or the directory is not a repository.
        assert!(git.latest_tag(dir.path()).await.is_err());
    }
}
