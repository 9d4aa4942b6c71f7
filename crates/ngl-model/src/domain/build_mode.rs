use std::fmt;

use serde::{Deserialize, Serialize};

/// How an application is built and whether it is deployed afterwards.
///
/// Serialized as a plain string; anything other than `release` or `nightly` is kept verbatim as a custom mode.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BuildMode {
    /// Flattened image, archived for distribution, never launched.
    Release,
    /// Timestamped version, launched in place of the previous instance.
    Nightly,
    /// Any other tag flavour: built and tagged only.
    Custom(String),
}

impl BuildMode {
    pub fn as_str(&self) -> &str {
        match self {
            BuildMode::Release => "release",
            BuildMode::Nightly => "nightly",
            BuildMode::Custom(s) => s.as_str(),
        }
    }

    #[inline]
    pub fn is_release(&self) -> bool {
        matches!(self, BuildMode::Release)
    }

    #[inline]
    pub fn is_nightly(&self) -> bool {
        matches!(self, BuildMode::Nightly)
    }
}

impl From<String> for BuildMode {
    fn from(s: String) -> Self {
        match s.as_str() {
            "release" => BuildMode::Release,
            "nightly" => BuildMode::Nightly,
            _ => BuildMode::Custom(s),
        }
    }
}

impl From<BuildMode> for String {
    fn from(mode: BuildMode) -> Self {
        match mode {
            BuildMode::Custom(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
