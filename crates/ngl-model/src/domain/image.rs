use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use time::PrimitiveDateTime;

use super::stamp::parse_nightly_stamp;
use crate::error::ModelError;

/// Suffix of the unflattened intermediate image.
pub const TMP_TAG: &str = "tmp";
/// Suffix of the flattened release intermediate.
pub const FLAT_TAG: &str = "flat";

/// A `name:tag` image reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ImageRef {
    pub name: String,
    pub tag: String,
}

impl ImageRef {
    pub fn new(name: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag: tag.into(),
        }
    }

    /// `{name}:tmp`, the raw output of the manifest build.
    pub fn intermediate(name: &str) -> Self {
        Self::new(name, TMP_TAG)
    }

    /// `{name}:flat`, the single-layer re-import of a release build.
    pub fn flattened(name: &str) -> Self {
        Self::new(name, FLAT_TAG)
    }

    /// True for the transient tags that must never survive an attempt.
    pub fn is_intermediate(&self) -> bool {
        self.tag == TMP_TAG || self.tag == FLAT_TAG
    }

    /// Same image addressed through a registry prefix.
    pub fn in_registry(&self, registry: &str) -> Self {
        let registry = registry.trim_end_matches('/');
        Self::new(format!("{registry}/{}", self.name), self.tag.clone())
    }

    /// Split `name[:tag]`; the tag is whatever follows the last `:` unless that part contains `/`,
    /// in which case the colon belongs to a registry port and the tag is absent.
    pub fn split(reference: &str) -> (&str, Option<&str>) {
        match reference.rsplit_once(':') {
            Some((name, tag)) if !tag.contains('/') && !name.is_empty() => (name, Some(tag)),
            _ => (reference, None),
        }
    }
}

impl FromStr for ImageRef {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match ImageRef::split(s.trim()) {
            (name, Some(tag)) if !tag.is_empty() => Ok(ImageRef::new(name, tag)),
            _ => Err(ModelError::InvalidImageRef(s.to_string())),
        }
    }
}

impl TryFrom<String> for ImageRef {
    type Error = ModelError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ImageRef> for String {
    fn from(r: ImageRef) -> Self {
        r.to_string()
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.tag)
    }
}

/// An image observed in the container engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredImage {
    pub image_name: String,
    pub image_tag: String,
    pub image_id: String,
    /// Build time recovered from a nightly tag suffix; `None` for every other tag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub built_at: Option<PrimitiveDateTime>,
}

impl DiscoveredImage {
    /// Build from listing columns, deriving `built_at` from the tag.
    pub fn new(
        image_name: impl Into<String>,
        image_tag: impl Into<String>,
        image_id: impl Into<String>,
    ) -> Self {
        let image_tag = image_tag.into();
        let built_at = parse_nightly_stamp(&image_tag);
        Self {
            image_name: image_name.into(),
            image_tag,
            image_id: image_id.into(),
            built_at,
        }
    }

    pub fn reference(&self) -> ImageRef {
        ImageRef::new(self.image_name.clone(), self.image_tag.clone())
    }
}

impl fmt::Display for DiscoveredImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}:{}", self.image_id, self.image_name, self.image_tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plain_reference() {
        let r: ImageRef = "web:1.2.3".parse().unwrap();
        assert_eq!(r, ImageRef::new("web", "1.2.3"));
        assert_eq!(r.to_string(), "web:1.2.3");
    }

    #[test]
    fn registry_port_is_not_a_tag() {
        assert_eq!(
            ImageRef::split("registry.local:5000/web"),
            ("registry.local:5000/web", None)
        );
        let r: ImageRef = "registry.local:5000/web:2.0".parse().unwrap();
        assert_eq!(r.name, "registry.local:5000/web");
        assert_eq!(r.tag, "2.0");
        assert!("registry.local:5000/web".parse::<ImageRef>().is_err());
    }

    #[test]
    fn intermediates_are_recognised() {
        assert!(ImageRef::intermediate("web").is_intermediate());
        assert!(ImageRef::flattened("web").is_intermediate());
        assert!(!ImageRef::new("web", "1.0").is_intermediate());
    }

    #[test]
    fn registry_prefix_is_normalised() {
        let r = ImageRef::new("web", "1.0").in_registry("hub.example.com/");
        assert_eq!(r.to_string(), "hub.example.com/web:1.0");
    }

    #[test]
    fn discovered_image_derives_build_time_from_tag() {
        assert!(DiscoveredImage::new("web", "0.0.1-202401011200", "sha").built_at.is_some());
        assert!(DiscoveredImage::new("web", "1.0.0", "sha").built_at.is_none());
        assert!(DiscoveredImage::new("<none>", "<none>", "sha").built_at.is_none());
    }
}
