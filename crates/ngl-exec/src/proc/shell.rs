use std::path::Path;

use async_trait::async_trait;
use ngl_core::{CollabError, CommandRunner, DependencyInstaller};
use tracing::debug;

use super::{ProcConfig, run};

/// Install command used when a descriptor does not bring its own.
pub const DEFAULT_INSTALL_COMMAND: &str = "npm install";

/// Wrap `script` in the platform shell (`sh -c` / `cmd /C`).
pub fn shell_command(script: &str) -> ProcConfig {
    cfg_if::cfg_if! {
        if #[cfg(target_family = "windows")] {
            ProcConfig::new("cmd").args(["/C", script])
        } else {
            ProcConfig::new("sh").args(["-c", script])
        }
    }
}

/// Runs prebuild and version scripts through the platform shell.
#[derive(Debug, Clone, Default)]
pub struct ShellRunner {
    /// Extra variables exported to every script.
    env: Vec<(String, String)>,
}

impl ShellRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run_shell(
        &self,
        script: &str,
        cwd: &Path,
        env: &[(String, String)],
    ) -> Result<(), CollabError> {
        if script.trim().is_empty() {
            return Err(CollabError::Spawn {
                command: "shell".into(),
                reason: "empty script".into(),
            });
        }
        let mut cfg = shell_command(script).cwd(cwd);
        cfg.env.extend(self.env.iter().cloned());
        cfg.env.extend(env.iter().cloned());

        debug!(target: "ngl.exec.shell", %script, cwd = %cwd.display(), "run");
        run(&cfg).await?;
        Ok(())
    }
}

/// Dependency installation as a shell command, `npm install` unless overridden.
#[derive(Debug, Clone)]
pub struct ShellInstaller {
    default_command: String,
    shell: ShellRunner,
}

impl Default for ShellInstaller {
    fn default() -> Self {
        Self {
            default_command: DEFAULT_INSTALL_COMMAND.to_string(),
            shell: ShellRunner::new(),
        }
    }
}

impl ShellInstaller {
    pub fn with_default_command(mut self, command: impl Into<String>) -> Self {
        self.default_command = command.into();
        self
    }
}

#[async_trait]
impl DependencyInstaller for ShellInstaller {
    async fn install(&self, dir: &Path, command: Option<&str>) -> Result<(), CollabError> {
        let command = command.unwrap_or(&self.default_command);
        self.shell.run_shell(command, dir, &[]).await
    }
}
