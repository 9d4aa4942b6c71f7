use std::{collections::HashSet, sync::Arc};

use ngl_model::ImageRef;
use time::{Duration, PrimitiveDateTime};
use tracing::{debug, info, instrument, warn};

use crate::{
    error::{CollabError, RotationFailure},
    ports::ContainerEngine,
};

/// What one sweep did.
#[derive(Debug, Default)]
pub struct RotationReport {
    pub removed: Vec<ImageRef>,
    /// Aged images kept because a container still uses them.
    pub retained: Vec<ImageRef>,
    pub failed: Vec<RotationFailure>,
}

impl RotationReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Age-based image garbage collection that never removes an image backing a container.
pub struct ImageRotation {
    engine: Arc<dyn ContainerEngine>,
}

impl ImageRotation {
    pub fn new(engine: Arc<dyn ContainerEngine>) -> Self {
        Self { engine }
    }

    /// Remove every image whose tag stamp is more than `max_age_days` older than `now`.
    ///
    /// Fails only when a listing cannot be read; individual removals are reported, not raised.
    #[instrument(level = "debug", skip(self, now))]
    pub async fn rotate(
        &self,
        max_age_days: u32,
        now: PrimitiveDateTime,
    ) -> Result<RotationReport, CollabError> {
        let images = self.engine.list_images().await?;
        let in_use: HashSet<(String, String)> = self
            .engine
            .list_containers()
            .await?
            .into_iter()
            .filter_map(|w| w.image_tag.map(|tag| (w.image_name, tag)))
            .collect();

        let threshold = Duration::days(i64::from(max_age_days));
        let mut report = RotationReport::default();
        for image in images {
            let Some(built_at) = image.built_at else {
                continue;
            };
            if now - built_at <= threshold {
                continue;
            }
            let reference = image.reference();
            if in_use.contains(&(image.image_name.clone(), image.image_tag.clone())) {
                warn!(image = %image, "container is running on an obsolete image; kept");
                report.retained.push(reference);
                continue;
            }
            match self.engine.remove_image(&reference).await {
                Ok(()) => {
                    debug!(image = %reference, "aged image removed");
                    report.removed.push(reference);
                }
                Err(e) => {
                    warn!(image = %reference, error = %e, "aged image not removed");
                    report.failed.push(RotationFailure {
                        image: reference.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            removed = report.removed.len(),
            retained = report.retained.len(),
            failed = report.failed.len(),
            "image rotation finished"
        );
        Ok(report)
    }
}
