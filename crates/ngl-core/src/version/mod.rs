use std::{path::Path, sync::Arc};

use ngl_model::{DEFAULT_VERSION, WorkloadDescriptor, nightly_stamp};
use time::PrimitiveDateTime;
use tracing::{debug, warn};

use crate::{
    error::AttemptError,
    ports::{CommandRunner, SourceControl},
};

/// Environment variable carrying the resolved version into the version set command and the prebuild.
pub const VERSION_ENV: &str = "NIGHTINGALE_VERSION";

/// Placeholder replaced by the version inside `versionSetCommand`.
pub const VERSION_PLACEHOLDER: &str = "{version}";

/// Computes the release version of a checkout.
///
/// Precedence: latest reachable tag, then the descriptor fallback, then the configured default.
/// Nightly builds get a `-YYYYMMDDhhmm` suffix on top of whichever was picked.
pub struct VersionResolver {
    scm: Arc<dyn SourceControl>,
    shell: Arc<dyn CommandRunner>,
    default_version: String,
}

impl VersionResolver {
    pub fn new(scm: Arc<dyn SourceControl>, shell: Arc<dyn CommandRunner>) -> Self {
        Self {
            scm,
            shell,
            default_version: DEFAULT_VERSION.to_string(),
        }
    }

    pub fn with_default_version(mut self, version: impl Into<String>) -> Self {
        self.default_version = version.into();
        self
    }

    pub async fn resolve(
        &self,
        checkout: &Path,
        descriptor: &WorkloadDescriptor,
        now: PrimitiveDateTime,
    ) -> Result<String, AttemptError> {
        let name = descriptor.name.as_str();
        let tag = match self.scm.latest_tag(checkout).await {
            Ok(Some(tag)) if !tag.trim().is_empty() => Some(tag.trim().to_string()),
            Ok(_) => {
                debug!(app = name, "no tag reachable from checkout");
                None
            }
            Err(e) => {
                warn!(app = name, error = %e, "tag lookup failed; treating as untagged");
                None
            }
        };

        let base = tag.unwrap_or_else(|| {
            descriptor
                .fallback_version
                .clone()
                .unwrap_or_else(|| self.default_version.clone())
        });
        if !descriptor.mode.is_nightly() {
            return Ok(base);
        }

        let version = format!("{base}{}", nightly_stamp(now));
        if let Some(command) = &descriptor.version_set_command {
            let script = version_command(command, &version);
            let env = [(VERSION_ENV.to_string(), version.clone())];
            self.shell
                .run_shell(&script, checkout, &env)
                .await
                .map_err(|e| AttemptError::VersionCommand(e.to_string()))?;
            debug!(app = name, %version, "version recorded in source tree");
        }
        Ok(version)
    }
}

/// Substitute `{version}` in `command`, or append the version as one quoted argument.
pub fn version_command(command: &str, version: &str) -> String {
    if command.contains(VERSION_PLACEHOLDER) {
        command.replace(VERSION_PLACEHOLDER, version)
    } else {
        format!("{command} {}", shell_quote(version))
    }
}

/// POSIX single-quote `s`.
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}
