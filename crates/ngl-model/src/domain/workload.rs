use serde::{Deserialize, Serialize};

use super::Port;

/// A container observed in the container engine, running or stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunningWorkload {
    pub id: String,
    /// Image repository with the tag stripped.
    pub image_name: String,
    /// `None` when the container references its image without a tag (or by id).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_tag: Option<String>,
    /// Published host port of the first port mapping, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_port: Option<Port>,
    /// Container-side port of the first port entry, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exposed_port: Option<Port>,
    pub status: String,
}

impl RunningWorkload {
    /// True when this container was started from exactly `name:tag`.
    pub fn uses_image(&self, name: &str, tag: &str) -> bool {
        self.image_name == name && self.image_tag.as_deref() == Some(tag)
    }
}
