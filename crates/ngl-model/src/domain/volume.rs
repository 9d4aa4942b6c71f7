use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// A `host:container[:options]` bind mount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VolumeMount {
    pub host: String,
    pub container: String,
    pub options: Option<String>,
}

impl VolumeMount {
    pub fn new(host: impl Into<String>, container: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            container: container.into(),
            options: None,
        }
    }

    pub fn with_options(mut self, options: impl Into<String>) -> Self {
        self.options = Some(options.into());
        self
    }
}

impl FromStr for VolumeMount {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':');
        let host = parts.next().unwrap_or_default().trim();
        let container = parts.next().unwrap_or_default().trim();
        let options = parts.next().map(str::trim);

        if host.is_empty() || container.is_empty() || parts.next().is_some() {
            return Err(ModelError::InvalidVolume(s.to_string()));
        }
        if matches!(options, Some("")) {
            return Err(ModelError::InvalidVolume(s.to_string()));
        }
        Ok(Self {
            host: host.to_string(),
            container: container.to_string(),
            options: options.map(str::to_string),
        })
    }
}

impl TryFrom<String> for VolumeMount {
    type Error = ModelError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<VolumeMount> for String {
    fn from(v: VolumeMount) -> Self {
        v.to_string()
    }
}

impl fmt::Display for VolumeMount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.options {
            Some(opts) => write!(f, "{}:{}:{}", self.host, self.container, opts),
            None => write!(f, "{}:{}", self.host, self.container),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_with_and_without_options() {
        let v: VolumeMount = "/srv/data:/data".parse().unwrap();
        assert_eq!(v, VolumeMount::new("/srv/data", "/data"));

        let v: VolumeMount = "/srv/logs:/var/log:rw".parse().unwrap();
        assert_eq!(v.options.as_deref(), Some("rw"));
        assert_eq!(v.to_string(), "/srv/logs:/var/log:rw");
    }

    #[test]
    fn rejects_malformed_specs() {
        for bad in ["", "/only-host", ":/data", "/a:/b:rw:extra", "/a:/b:"] {
            assert!(bad.parse::<VolumeMount>().is_err(), "{bad} should be rejected");
        }
    }
}
