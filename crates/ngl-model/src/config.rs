use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{ModelError, WorkloadDescriptor};

/// Version used when neither a tag nor a descriptor fallback is available.
pub const DEFAULT_VERSION: &str = "0.0.1";

/// Host directory under which each launched workload gets its log directory.
pub const DEFAULT_LOG_ROOT: &str = "/var/log";

/// Contents of the JSON configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployConfig {
    #[serde(default)]
    pub apps: Vec<WorkloadDescriptor>,
    /// DNS resolver handed to every launched workload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns: Option<String>,
    #[serde(default = "default_log_root")]
    pub log_root: PathBuf,
    /// Registries every final image is pushed to.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub registries: Vec<String>,
    #[serde(default = "default_version")]
    pub default_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mail: Option<MailConfig>,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            apps: Vec::new(),
            dns: None,
            log_root: default_log_root(),
            registries: Vec::new(),
            default_version: default_version(),
            mail: None,
        }
    }
}

impl DeployConfig {
    /// Parse and validate a configuration document.
    pub fn from_json(raw: &str) -> Result<Self, ModelError> {
        let cfg: DeployConfig = serde_json::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        let mut seen = HashSet::new();
        for app in &self.apps {
            app.validate()?;
            if !seen.insert(app.name.as_str()) {
                return Err(ModelError::DuplicateApp(app.name.clone()));
            }
        }
        if self.default_version.trim().is_empty() {
            return Err(ModelError::descriptor("*", "defaultVersion is empty"));
        }
        if let Some(mail) = &self.mail {
            mail.validate()?;
        }
        Ok(())
    }

    pub fn app(&self, name: &str) -> Option<&WorkloadDescriptor> {
        self.apps.iter().find(|a| a.name == name)
    }
}

fn default_log_root() -> PathBuf {
    PathBuf::from(DEFAULT_LOG_ROOT)
}

fn default_version() -> String {
    DEFAULT_VERSION.to_string()
}

/// How the SMTP connection is secured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailSecurity {
    /// Plain connection; only sensible for a local relay.
    None,
    /// Upgrade with STARTTLS.
    #[default]
    Starttls,
    /// Implicit TLS from the first byte.
    Tls,
}

/// Notification transport settings.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub from: String,
    pub to: Vec<String>,
    #[serde(default)]
    pub security: MailSecurity,
}

impl MailConfig {
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.host.trim().is_empty() {
            return Err(ModelError::InvalidMail("host is empty".into()));
        }
        if self.from.trim().is_empty() {
            return Err(ModelError::InvalidMail("from is empty".into()));
        }
        if self.to.is_empty() || self.to.iter().any(|r| r.trim().is_empty()) {
            return Err(ModelError::InvalidMail("at least one non-empty recipient is required".into()));
        }
        if self.password.is_some() && self.user.is_none() {
            return Err(ModelError::InvalidMail("password given without user".into()));
        }
        Ok(())
    }
}

impl std::fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("from", &self.from)
            .field("to", &self.to)
            .field("security", &self.security)
            .finish()
    }
}

fn default_smtp_port() -> u16 {
    25
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "dns": "10.0.0.2",
        "apps": [
            {"name": "web", "mode": "nightly", "repo": "r1", "branch": "main", "docker_template": "node"},
            {"name": "api", "mode": "release", "repo": "r2", "branch": "main", "docker_template": "python"}
        ],
        "mail": {"host": "smtp.local", "from": "ci@local", "to": ["dev@local"]}
    }"#;

    #[test]
    fn parses_with_defaults() {
        let cfg = DeployConfig::from_json(SAMPLE).unwrap();

        assert_eq!(cfg.apps.len(), 2);
        assert_eq!(cfg.dns.as_deref(), Some("10.0.0.2"));
        assert_eq!(cfg.log_root, PathBuf::from("/var/log"));
        assert_eq!(cfg.default_version, "0.0.1");
        assert!(cfg.registries.is_empty());

        let mail = cfg.mail.unwrap();
        assert_eq!(mail.port, 25);
        assert_eq!(mail.security, MailSecurity::Starttls);
        assert!(cfg.apps.iter().any(|a| a.name == "api"));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let raw = r#"{"apps": [
            {"name": "web", "mode": "nightly", "repo": "r", "branch": "b", "docker_template": "t"},
            {"name": "web", "mode": "release", "repo": "r", "branch": "b", "docker_template": "t"}
        ]}"#;
        let err = DeployConfig::from_json(raw).unwrap_err();
        assert!(matches!(err, ModelError::DuplicateApp(name) if name == "web"));
    }

    #[test]
    fn invalid_descriptor_names_the_app() {
        let raw = r#"{"apps": [{"name": "web", "mode": "nightly", "repo": "", "branch": "b", "docker_template": "t"}]}"#;
        let err = DeployConfig::from_json(raw).unwrap_err();
        assert!(err.to_string().contains("web"));
    }

    #[test]
    fn mail_requires_recipients() {
        let raw = r#"{"mail": {"host": "smtp", "from": "a@b", "to": []}}"#;
        assert!(matches!(
            DeployConfig::from_json(raw),
            Err(ModelError::InvalidMail(_))
        ));
    }

    #[test]
    fn mail_debug_hides_password() {
        let mail = MailConfig {
            host: "smtp".into(),
            port: 587,
            user: Some("ci".into()),
            password: Some("hunter2".into()),
            from: "ci@local".into(),
            to: vec!["dev@local".into()],
            security: MailSecurity::Tls,
        };
        let shown = format!("{mail:?}");
        assert!(!shown.contains("hunter2"));
    }
}
