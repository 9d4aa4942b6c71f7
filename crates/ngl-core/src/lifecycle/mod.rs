use std::{path::PathBuf, sync::Arc};

use ngl_model::{DEFAULT_LOG_ROOT, ImageRef, RunningWorkload, VolumeMount, WorkloadDescriptor};
use tracing::{debug, info, instrument};

use crate::{
    error::AttemptError,
    ports::{ContainerEngine, PortMapping, RunOptions},
};

/// Whether `workload` is an instance of `descriptor` that a new launch replaces.
///
/// The image name must equal the descriptor name. Ports are compared only when the descriptor declares one
/// and the workload publishes one; otherwise the name alone decides.
pub fn matches(workload: &RunningWorkload, descriptor: &WorkloadDescriptor) -> bool {
    if workload.image_name != descriptor.name {
        return false;
    }
    match (descriptor.port, workload.host_port) {
        (Some(declared), Some(observed)) => declared == observed,
        _ => true,
    }
}

/// Replaces running instances of an application with a freshly built image.
pub struct LifecycleManager {
    engine: Arc<dyn ContainerEngine>,
    dns: Option<String>,
    log_root: PathBuf,
}

impl LifecycleManager {
    pub fn new(engine: Arc<dyn ContainerEngine>) -> Self {
        Self {
            engine,
            dns: None,
            log_root: PathBuf::from(DEFAULT_LOG_ROOT),
        }
    }

    pub fn with_dns(mut self, dns: Option<String>) -> Self {
        self.dns = dns;
        self
    }

    pub fn with_log_root(mut self, log_root: impl Into<PathBuf>) -> Self {
        self.log_root = log_root.into();
        self
    }

    /// Stop and remove every matching container, then start `image`.
    ///
    /// There is no rollback: if the launch fails after the old instance was removed, nothing is running.
    #[instrument(level = "debug", skip(self, descriptor), fields(app = %descriptor.name, %image))]
    pub async fn replace_and_run(
        &self,
        image: &ImageRef,
        descriptor: &WorkloadDescriptor,
    ) -> Result<String, AttemptError> {
        let launch = |e: crate::error::CollabError| AttemptError::Launch(e.to_string());

        let existing = self.engine.list_containers().await.map_err(launch)?;
        for workload in existing.iter().filter(|w| matches(w, descriptor)) {
            debug!(app = %descriptor.name, id = %workload.id, status = %workload.status, "replacing container");
            self.engine.stop(&workload.id).await.map_err(launch)?;
            self.engine.remove(&workload.id).await.map_err(launch)?;
        }

        let opts = self.run_options(descriptor);
        let id = self.engine.run(image, &opts).await.map_err(launch)?;
        info!(app = %descriptor.name, %image, id = %id, "workload started");
        Ok(id)
    }

    /// Launch options for `descriptor`; the host log mount always comes first.
    pub fn run_options(&self, descriptor: &WorkloadDescriptor) -> RunOptions {
        let log_dir = self.log_root.join(&descriptor.name);
        let mut volumes = vec![
            VolumeMount::new(log_dir.to_string_lossy(), "/var/log").with_options("rw"),
        ];
        volumes.extend(descriptor.volume_mounts.iter().cloned());

        RunOptions {
            detached: true,
            restart_always: true,
            dns: self.dns.clone(),
            publish: descriptor
                .published_port()
                .map(|(host, inner)| PortMapping::all_interfaces(host, inner)),
            env: descriptor
                .environment_variables
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            volumes,
        }
    }
}
