use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::AppName;

/// Outcome of one build attempt (build plus optional launch) for one descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildAttemptResult {
    pub descriptor_name: AppName,
    /// Retry round that produced this result (starts at 1).
    pub round: u32,
    pub success: bool,
    /// Fixed user-facing message; never carries raw collaborator output.
    pub message: String,
    /// Resolved version, present on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<Duration>,
}

impl BuildAttemptResult {
    pub fn succeeded(
        name: impl Into<AppName>,
        round: u32,
        version: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            descriptor_name: name.into(),
            round,
            success: true,
            message: message.into(),
            version: Some(version.into()),
            duration: None,
        }
    }

    pub fn failed(name: impl Into<AppName>, round: u32, message: impl Into<String>) -> Self {
        Self {
            descriptor_name: name.into(),
            round,
            success: false,
            message: message.into(),
            version: None,
            duration: None,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }
}
