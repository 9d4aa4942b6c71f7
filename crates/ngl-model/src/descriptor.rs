use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

use crate::{AppName, BuildMode, EnvVars, ModelError, Port, VolumeMount};

/// Declarative definition of one application to build and deploy.
///
/// Field names follow the camelCase config format; the short names used by older configuration files are accepted as aliases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadDescriptor {
    /// Unique application name, also the image repository name.
    pub name: AppName,
    pub mode: BuildMode,
    #[serde(alias = "repo")]
    pub source_repo: String,
    #[serde(alias = "branch")]
    pub source_branch: String,
    /// Build root inside the checkout, if not the checkout itself.
    #[serde(default, alias = "subdir", skip_serializing_if = "Option::is_none")]
    pub source_subdir: Option<PathBuf>,
    /// Custom prebuild command run in the application directory.
    #[serde(default, alias = "buildcmd", skip_serializing_if = "Option::is_none")]
    pub build_command: Option<String>,
    /// Directory produced by `build_command`, relative to the application directory.
    #[serde(default, alias = "builddir", skip_serializing_if = "Option::is_none")]
    pub build_output_dir: Option<PathBuf>,
    /// Overrides the default dependency installer command for the custom prebuild.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_command: Option<String>,
    /// Template name, without the `.j2` extension.
    #[serde(alias = "docker_template")]
    pub manifest_template: String,
    #[serde(
        default,
        deserialize_with = "de_port",
        skip_serializing_if = "Option::is_none"
    )]
    pub port: Option<Port>,
    #[serde(
        default,
        alias = "inner_port",
        deserialize_with = "de_port",
        skip_serializing_if = "Option::is_none"
    )]
    pub inner_port: Option<Port>,
    #[serde(default, alias = "env", skip_serializing_if = "EnvVars::is_empty")]
    pub environment_variables: EnvVars,
    #[serde(default, alias = "volumes", skip_serializing_if = "Vec::is_empty")]
    pub volume_mounts: Vec<VolumeMount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_version: Option<String>,
    /// Shell command that records the resolved version in the source tree.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_set_command: Option<String>,
}

impl WorkloadDescriptor {
    /// Minimal descriptor; optional recipe parts are added with the `with_*` helpers.
    pub fn new(
        name: impl Into<AppName>,
        mode: BuildMode,
        source_repo: impl Into<String>,
        source_branch: impl Into<String>,
        manifest_template: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            mode,
            source_repo: source_repo.into(),
            source_branch: source_branch.into(),
            source_subdir: None,
            build_command: None,
            build_output_dir: None,
            install_command: None,
            manifest_template: manifest_template.into(),
            port: None,
            inner_port: None,
            environment_variables: EnvVars::new(),
            volume_mounts: Vec::new(),
            fallback_version: None,
            version_set_command: None,
        }
    }

    pub fn with_ports(mut self, port: Port, inner_port: Port) -> Self {
        self.port = Some(port);
        self.inner_port = Some(inner_port);
        self
    }

    pub fn with_prebuild(
        mut self,
        command: impl Into<String>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        self.build_command = Some(command.into());
        self.build_output_dir = Some(output_dir.into());
        self
    }

    pub fn with_subdir(mut self, subdir: impl Into<PathBuf>) -> Self {
        self.source_subdir = Some(subdir.into());
        self
    }

    pub fn with_fallback_version(mut self, version: impl Into<String>) -> Self {
        self.fallback_version = Some(version.into());
        self
    }

    pub fn with_version_set_command(mut self, command: impl Into<String>) -> Self {
        self.version_set_command = Some(command.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment_variables.insert(key, value);
        self
    }

    pub fn with_volume(mut self, volume: VolumeMount) -> Self {
        self.volume_mounts.push(volume);
        self
    }

    /// True when a custom prebuild step runs before the manifest build.
    #[inline]
    pub fn has_custom_prebuild(&self) -> bool {
        self.build_command.is_some()
    }

    /// `(host, container)` port pair to publish, if the descriptor declares a port.
    ///
    /// The container port defaults to the host port.
    pub fn published_port(&self) -> Option<(Port, Port)> {
        self.port.map(|p| (p, self.inner_port.unwrap_or(p)))
    }

    /// Check the invariants the pipeline relies on.
    pub fn validate(&self) -> Result<(), ModelError> {
        let name = self.name.as_str();
        if !is_valid_repository_name(name) {
            return Err(ModelError::descriptor(
                name,
                "name must be a lowercase image repository name ([a-z0-9._/-], starting with a letter or digit)",
            ));
        }
        if self.source_repo.trim().is_empty() {
            return Err(ModelError::descriptor(name, "sourceRepo is empty"));
        }
        if self.source_branch.trim().is_empty() {
            return Err(ModelError::descriptor(name, "sourceBranch is empty"));
        }
        if self.manifest_template.trim().is_empty() || self.manifest_template.contains("..") {
            return Err(ModelError::descriptor(
                name,
                "manifestTemplate is empty or escapes the template directory",
            ));
        }
        if let BuildMode::Custom(mode) = &self.mode
            && (mode.is_empty() || mode.chars().any(char::is_whitespace))
        {
            return Err(ModelError::descriptor(name, format!("invalid mode '{mode}'")));
        }

        match (&self.build_command, &self.build_output_dir) {
            (Some(cmd), Some(_)) if cmd.trim().is_empty() => {
                return Err(ModelError::descriptor(name, "buildCommand is empty"));
            }
            (Some(_), None) => {
                return Err(ModelError::descriptor(name, "buildCommand requires buildOutputDir"));
            }
            (None, Some(_)) => {
                return Err(ModelError::descriptor(name, "buildOutputDir requires buildCommand"));
            }
            _ => {}
        }
        if self.install_command.is_some() && self.build_command.is_none() {
            return Err(ModelError::descriptor(name, "installCommand requires buildCommand"));
        }

        for (field, path) in [
            ("sourceSubdir", &self.source_subdir),
            ("buildOutputDir", &self.build_output_dir),
        ] {
            if let Some(path) = path
                && !is_contained_relative(path)
            {
                return Err(ModelError::descriptor(
                    name,
                    format!("{field} must be a relative path inside the checkout"),
                ));
            }
        }

        if matches!(self.port, Some(0)) || matches!(self.inner_port, Some(0)) {
            return Err(ModelError::descriptor(name, "ports must be non-zero"));
        }
        if self.inner_port.is_some() && self.port.is_none() {
            return Err(ModelError::descriptor(name, "innerPort requires port"));
        }
        if let Some(v) = &self.fallback_version
            && v.trim().is_empty()
        {
            return Err(ModelError::descriptor(name, "fallbackVersion is empty"));
        }
        Ok(())
    }
}

fn is_valid_repository_name(name: &str) -> bool {
    let Some(first) = name.chars().next() else {
        return false;
    };
    first.is_ascii_alphanumeric()
        && !name.ends_with('/')
        && !name.contains("//")
        && !name.contains("..")
        && name.chars().all(|c| {
            c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-' | '/')
        })
}

fn is_contained_relative(path: &Path) -> bool {
    !path.as_os_str().is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

fn de_port<'de, D>(deserializer: D) -> Result<Option<Port>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(Port),
        Str(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Num(p)) => Ok(Some(p)),
        Some(Raw::Str(s)) => s
            .trim()
            .parse::<Port>()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid port '{s}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn web() -> WorkloadDescriptor {
        WorkloadDescriptor::new("web", BuildMode::Nightly, "git@host:web.git", "main", "node")
    }

    #[test]
    fn accepts_legacy_field_names() {
        let json = r#"{
            "name": "web",
            "mode": "nightly",
            "repo": "git@host:web.git",
            "branch": "develop",
            "buildcmd": "npm run build",
            "builddir": "dist",
            "docker_template": "nginx",
            "port": "8080",
            "inner_port": "80",
            "volumes": ["/srv/web:/data:ro"]
        }"#;
        let d: WorkloadDescriptor = serde_json::from_str(json).unwrap();

        assert_eq!(d.source_branch, "develop");
        assert_eq!(d.manifest_template, "nginx");
        assert_eq!(d.published_port(), Some((8080, 80)));
        assert_eq!(d.volume_mounts[0].options.as_deref(), Some("ro"));
        assert!(d.has_custom_prebuild());
        d.validate().unwrap();
    }

    #[test]
    fn accepts_camel_case_fields() {
        let json = r#"{
            "name": "api",
            "mode": "release",
            "sourceRepo": "https://example.com/api.git",
            "sourceBranch": "main",
            "sourceSubdir": "server",
            "manifestTemplate": "python",
            "port": 9000,
            "environmentVariables": {"RUST_LOG": "info"},
            "fallbackVersion": "1.0.0"
        }"#;
        let d: WorkloadDescriptor = serde_json::from_str(json).unwrap();

        assert!(d.mode.is_release());
        assert_eq!(d.published_port(), Some((9000, 9000)));
        assert_eq!(d.environment_variables.get("RUST_LOG"), Some("info"));
        d.validate().unwrap();
    }

    #[test]
    fn rejects_non_numeric_port() {
        let json = r#"{"name":"w","mode":"nightly","repo":"r","branch":"b","docker_template":"t","port":"http"}"#;
        assert!(serde_json::from_str::<WorkloadDescriptor>(json).is_err());
    }

    #[test]
    fn prebuild_needs_both_halves() {
        let mut d = web();
        d.build_command = Some("make".into());
        assert!(d.validate().is_err());

        let mut d = web();
        d.build_output_dir = Some("dist".into());
        assert!(d.validate().is_err());

        assert!(web().with_prebuild("make", "dist").validate().is_ok());
    }

    #[test]
    fn rejects_escaping_paths() {
        assert!(web().with_subdir("../other").validate().is_err());
        assert!(web().with_subdir("/etc").validate().is_err());
        assert!(web().with_prebuild("make", "../../out").validate().is_err());
        assert!(web().with_subdir("services/web").validate().is_ok());
    }

    #[test]
    fn rejects_bad_names() {
        for bad in ["", "Web", "-web", "web app", "web/", "a//b"] {
            let mut d = web();
            d.name = bad.to_string();
            assert!(d.validate().is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn inner_port_alone_is_rejected() {
        let mut d = web();
        d.inner_port = Some(80);
        assert!(d.validate().is_err());
    }
}
