//! CLI-backed collaborators: `git`, `docker`, the platform shell and the dependency installer.
mod error;
pub use error::{ExecError, ExecResult};

pub mod proc;
pub use proc::shell::{DEFAULT_INSTALL_COMMAND, ShellInstaller, ShellRunner, shell_command};
pub use proc::{ProcConfig, ProcOutput};

mod git;
pub use git::GitCli;

pub mod docker;
pub use docker::DockerCli;

pub mod prelude {
    pub use crate::error::{ExecError, ExecResult};
    pub use crate::{DockerCli, GitCli, ShellInstaller, ShellRunner};
}
