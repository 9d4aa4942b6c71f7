use std::{
    io,
    path::{Path, PathBuf},
};

use tracing::{debug, info, warn};
use uuid::Uuid;

/// Directory name of the staged environment inside the run root.
pub const ENVIRONMENT_DIR: &str = "environment";

/// Per-run scratch directory; it is also the image build context.
#[derive(Debug)]
pub struct RunWorkspace {
    root: PathBuf,
    keep: bool,
}

impl RunWorkspace {
    /// Create `nightingale-<uuid>` under the system temp directory.
    pub async fn create() -> io::Result<Self> {
        Self::create_in(&std::env::temp_dir()).await
    }

    pub async fn create_in(base: &Path) -> io::Result<Self> {
        let root = base.join(format!("nightingale-{}", Uuid::new_v4()));
        tokio::fs::create_dir_all(&root).await?;
        info!(root = %root.display(), "run workspace created");
        Ok(Self { root, keep: false })
    }

    /// Leave the directory in place when the run ends.
    pub fn keep(mut self, keep: bool) -> Self {
        self.keep = keep;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Copy `envdir` into `<root>/environment`; returns false when there is nothing to copy.
    pub async fn stage_environment(&self, envdir: &Path) -> io::Result<bool> {
        if !tokio::fs::metadata(envdir)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
        {
            warn!(envdir = %envdir.display(), "environment directory missing; skipped");
            return Ok(false);
        }
        copy_dir(envdir, &self.root.join(ENVIRONMENT_DIR)).await?;
        debug!(envdir = %envdir.display(), "environment staged");
        Ok(true)
    }

    /// Remove the run root unless it is kept.
    pub async fn finish(self) -> io::Result<()> {
        if self.keep {
            info!(root = %self.root.display(), "run workspace kept");
            return Ok(());
        }
        tokio::fs::remove_dir_all(&self.root).await?;
        debug!(root = %self.root.display(), "run workspace removed");
        Ok(())
    }
}

/// Recursively copy `src` into a fresh `dst`.
pub(crate) async fn copy_dir(src: &Path, dst: &Path) -> io::Result<()> {
    let (src, dst) = (src.to_path_buf(), dst.to_path_buf());
    tokio::task::spawn_blocking(move || copy_dir_blocking(&src, &dst))
        .await
        .map_err(io::Error::other)?
}

fn copy_dir_blocking(src: &Path, dst: &Path) -> io::Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        let kind = entry.file_type()?;
        if kind.is_dir() {
            copy_dir_blocking(&entry.path(), &target)?;
        } else if kind.is_symlink() {
            let link = std::fs::read_link(entry.path())?;
            copy_link(&link, &entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_link(link: &Path, _origin: &Path, target: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(link, target)
}

#[cfg(not(unix))]
fn copy_link(_link: &Path, origin: &Path, target: &Path) -> io::Result<()> {
    std::fs::copy(origin, target).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn environment_is_copied_and_root_removed() {
        let base = tempfile::tempdir().unwrap();
        let env = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(env.path().join("certs")).unwrap();
        std::fs::write(env.path().join("certs/ca.pem"), "pem").unwrap();
        std::fs::write(env.path().join("npmrc"), "registry=x").unwrap();

        let ws = RunWorkspace::create_in(base.path()).await.unwrap();
        let root = ws.root().to_path_buf();
        assert!(
            root.file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with("nightingale-")
        );

        assert!(ws.stage_environment(env.path()).await.unwrap());
        assert_eq!(
            std::fs::read_to_string(root.join("environment/certs/ca.pem")).unwrap(),
            "pem"
        );
        assert!(root.join("environment/npmrc").is_file());

        ws.finish().await.unwrap();
        assert!(!root.exists());
    }

    #[tokio::test]
    async fn kept_root_survives_and_missing_envdir_is_skipped() {
        let base = tempfile::tempdir().unwrap();
        let ws = RunWorkspace::create_in(base.path()).await.unwrap().keep(true);
        let root = ws.root().to_path_buf();

        assert!(!ws.stage_environment(&base.path().join("nope")).await.unwrap());
        ws.finish().await.unwrap();
        assert!(root.is_dir());
    }
}
