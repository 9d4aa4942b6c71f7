//! Contracts the orchestrator needs from the outside world.
//!
//! Every call takes absolute paths; implementations never rely on the process working directory.
use std::{collections::BTreeMap, path::Path, sync::Arc};

use async_trait::async_trait;
use ngl_model::{DiscoveredImage, ImageRef, Port, RunningWorkload, VolumeMount};

use crate::{error::CollabError, report::Report};

/// Named string parameters handed to a template.
pub type TemplateParams = BTreeMap<String, String>;

#[async_trait]
pub trait SourceControl: Send + Sync {
    /// Check out `branch` of `repo` into `dest`, which must not exist yet.
    async fn clone_repo(&self, repo: &str, branch: &str, dest: &Path) -> Result<(), CollabError>;

    /// Most recent tag reachable from the checked-out revision, if any.
    async fn latest_tag(&self, checkout: &Path) -> Result<Option<String>, CollabError>;
}

#[async_trait]
pub trait ContainerEngine: Send + Sync {
    async fn build(
        &self,
        manifest: &Path,
        context: &Path,
        tag: &ImageRef,
        quiet: bool,
    ) -> Result<(), CollabError>;

    /// Start a container and return its id.
    async fn run(&self, image: &ImageRef, opts: &RunOptions) -> Result<String, CollabError>;
    async fn stop(&self, id: &str) -> Result<(), CollabError>;
    async fn remove(&self, id: &str) -> Result<(), CollabError>;

    /// Every container, stopped ones included.
    async fn list_containers(&self) -> Result<Vec<RunningWorkload>, CollabError>;
    async fn list_images(&self) -> Result<Vec<DiscoveredImage>, CollabError>;
    async fn remove_image(&self, image: &ImageRef) -> Result<(), CollabError>;

    /// Collapse the filesystem of `source` into the single-layer image `target`.
    async fn flatten(&self, source: &ImageRef, target: &ImageRef) -> Result<(), CollabError>;
    async fn tag(&self, existing: &ImageRef, alias: &ImageRef) -> Result<(), CollabError>;

    /// Push a registry-qualified reference.
    async fn push(&self, image: &ImageRef) -> Result<(), CollabError>;

    /// Write a compressed archive of `image` to `dest`.
    async fn save(&self, image: &ImageRef, dest: &Path) -> Result<(), CollabError>;
}

/// Renders named templates; the same name and parameters always give the same text.
pub trait TemplateRenderer: Send + Sync {
    fn render(&self, name: &str, params: &TemplateParams) -> Result<String, CollabError>;
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run_shell(
        &self,
        script: &str,
        cwd: &Path,
        env: &[(String, String)],
    ) -> Result<(), CollabError>;
}

#[async_trait]
pub trait DependencyInstaller: Send + Sync {
    /// Install dependencies in `dir`, using `command` instead of the default when given.
    async fn install(&self, dir: &Path, command: Option<&str>) -> Result<(), CollabError>;
}

#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, report: &Report) -> Result<(), CollabError>;
}

/// The collaborator set one build attempt talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub scm: Arc<dyn SourceControl>,
    pub engine: Arc<dyn ContainerEngine>,
    pub renderer: Arc<dyn TemplateRenderer>,
    pub shell: Arc<dyn CommandRunner>,
    pub installer: Arc<dyn DependencyInstaller>,
}

/// `host_ip:host:container` publication of a container port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortMapping {
    pub host_ip: String,
    pub host: Port,
    pub container: Port,
}

impl PortMapping {
    /// Publish on every interface.
    pub fn all_interfaces(host: Port, container: Port) -> Self {
        Self {
            host_ip: "0.0.0.0".to_string(),
            host,
            container,
        }
    }
}

/// Everything `ContainerEngine::run` needs besides the image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub detached: bool,
    pub restart_always: bool,
    pub dns: Option<String>,
    /// The container port is also exposed when set.
    pub publish: Option<PortMapping>,
    pub env: Vec<(String, String)>,
    /// Mount order is preserved.
    pub volumes: Vec<VolumeMount>,
}

impl RunOptions {
    /// Container port to expose, if any is published.
    pub fn exposed_port(&self) -> Option<Port> {
        self.publish.as_ref().map(|p| p.container)
    }
}
