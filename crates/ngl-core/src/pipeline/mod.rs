//! The per-attempt build state machine.
//!
//! `Cloned → VersionResolved → (PreBuilt) → ManifestRendered → ImageBuilt → (Flattened) →
//! PostbuiltTagged → IntermediatesCleaned → (Archived) → (Pushed)`
//!
//! Stages only move forward. Once an intermediate tag exists, a failure triggers a best-effort removal
//! of the intermediates before the error is returned.
use std::path::{Path, PathBuf};

use ngl_model::{ImageRef, WorkloadDescriptor};
use time::PrimitiveDateTime;
use tracing::{debug, info, instrument, warn};

use crate::{
    error::AttemptError,
    ports::{Collaborators, TemplateParams},
    version::{VERSION_ENV, VersionResolver},
    workspace::copy_dir,
};

/// Template rendered on top of the intermediate image to produce the final tag.
pub const POSTBUILD_TEMPLATE: &str = "postbuild";

/// Knobs that are the same for every attempt of a run.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Run root; build context of every image.
    pub run_root: PathBuf,
    /// Where release images are archived; no archive when absent.
    pub archive_dir: Option<PathBuf>,
    pub registries: Vec<String>,
    pub verbose_build: bool,
}

impl PipelineSettings {
    pub fn new(run_root: impl Into<PathBuf>) -> Self {
        Self {
            run_root: run_root.into(),
            archive_dir: None,
            registries: Vec::new(),
            verbose_build: false,
        }
    }

    pub fn with_archive_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.archive_dir = Some(dir.into());
        self
    }

    pub fn with_registries(mut self, registries: Vec<String>) -> Self {
        self.registries = registries;
        self
    }

    pub fn with_verbose_build(mut self, verbose: bool) -> Self {
        self.verbose_build = verbose;
        self
    }
}

/// Result of a successful attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltImage {
    pub image: ImageRef,
    pub version: String,
    /// Archive written for release builds, if any.
    pub archive: Option<PathBuf>,
}

pub struct BuildPipeline {
    collab: Collaborators,
    versions: VersionResolver,
    settings: PipelineSettings,
}

/// Filesystem layout of one attempt.
struct AttemptPaths {
    dir: PathBuf,
    checkout: PathBuf,
}

impl BuildPipeline {
    pub fn new(collab: Collaborators, settings: PipelineSettings) -> Self {
        let versions = VersionResolver::new(collab.scm.clone(), collab.shell.clone());
        Self {
            collab,
            versions,
            settings,
        }
    }

    pub fn with_default_version(mut self, version: impl Into<String>) -> Self {
        self.versions = self.versions.with_default_version(version);
        self
    }

    /// Run every stage for `descriptor`; the returned image is the only tag left behind.
    #[instrument(level = "debug", skip(self, descriptor, now), fields(app = %descriptor.name))]
    pub async fn build(
        &self,
        descriptor: &WorkloadDescriptor,
        round: u32,
        now: PrimitiveDateTime,
    ) -> Result<BuiltImage, AttemptError> {
        let name = descriptor.name.as_str();
        let paths = self.prepare(name, round).await?;

        self.collab
            .scm
            .clone_repo(&descriptor.source_repo, &descriptor.source_branch, &paths.checkout)
            .await
            .map_err(|e| AttemptError::Clone(e.to_string()))?;
        let app_dir = match &descriptor.source_subdir {
            Some(sub) => paths.checkout.join(sub),
            None => paths.checkout.clone(),
        };
        if !is_dir(&app_dir).await {
            return Err(AttemptError::Clone(format!(
                "source subdirectory {} missing from checkout",
                app_dir.display()
            )));
        }
        stage(name, "cloned");

        let version = self.versions.resolve(&app_dir, descriptor, now).await?;
        stage(name, "version-resolved");

        let context_dir = if descriptor.has_custom_prebuild() {
            let out = self.prebuild(descriptor, &paths, &app_dir, &version).await?;
            stage(name, "prebuilt");
            out
        } else {
            app_dir
        };

        let manifest = self
            .render_manifest(descriptor, &paths, &context_dir, &version)
            .await?;
        stage(name, "manifest-rendered");

        let mut live = Vec::new();
        let outcome = self
            .produce(descriptor, &paths, &manifest, &version, &mut live)
            .await;
        if outcome.is_err() {
            self.discard(name, &live).await;
        }
        let image = outcome?;
        stage(name, "intermediates-cleaned");

        let archive = self.archive(descriptor, &image, &version).await?;
        self.push(name, &image).await?;

        info!(app = name, image = %image, round, "image built");
        Ok(BuiltImage {
            image,
            version,
            archive,
        })
    }

    async fn prepare(&self, name: &str, round: u32) -> Result<AttemptPaths, AttemptError> {
        let dir = self.settings.run_root.join(format!("{name}-r{round}"));
        if is_dir(&dir).await {
            tokio::fs::remove_dir_all(&dir)
                .await
                .map_err(|e| workspace(&dir, e))?;
        }
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| workspace(&dir, e))?;
        let checkout = dir.join(name);
        Ok(AttemptPaths { dir, checkout })
    }

    /// Install, build, then keep only the build output; returns the new application directory.
    async fn prebuild(
        &self,
        descriptor: &WorkloadDescriptor,
        paths: &AttemptPaths,
        app_dir: &Path,
        version: &str,
    ) -> Result<PathBuf, AttemptError> {
        let (Some(command), Some(output_dir)) =
            (&descriptor.build_command, &descriptor.build_output_dir)
        else {
            return Err(AttemptError::Prebuild(
                "build command without output directory".into(),
            ));
        };

        self.collab
            .installer
            .install(app_dir, descriptor.install_command.as_deref())
            .await
            .map_err(|e| AttemptError::Prebuild(e.to_string()))?;

        let env = [(VERSION_ENV.to_string(), version.to_string())];
        self.collab
            .shell
            .run_shell(command, app_dir, &env)
            .await
            .map_err(|e| AttemptError::Prebuild(e.to_string()))?;

        let output = app_dir.join(output_dir);
        if !is_dir(&output).await {
            return Err(AttemptError::Prebuild(format!(
                "build output {} was not produced",
                output.display()
            )));
        }
        let target = paths.dir.join(format!("{}_build", descriptor.name));
        copy_dir(&output, &target)
            .await
            .map_err(|e| AttemptError::Prebuild(format!("copy build output: {e}")))?;
        tokio::fs::remove_dir_all(&paths.checkout)
            .await
            .map_err(|e| AttemptError::Prebuild(format!("discard checkout: {e}")))?;
        Ok(target)
    }

    async fn render_manifest(
        &self,
        descriptor: &WorkloadDescriptor,
        paths: &AttemptPaths,
        context_dir: &Path,
        version: &str,
    ) -> Result<PathBuf, AttemptError> {
        let appdir = relative_to(context_dir, &self.settings.run_root)?;
        let params = TemplateParams::from([
            ("appdir".to_string(), appdir),
            ("appname".to_string(), descriptor.name.clone()),
            ("version".to_string(), version.to_string()),
            ("mode".to_string(), descriptor.mode.to_string()),
        ]);
        let text = self
            .collab
            .renderer
            .render(&descriptor.manifest_template, &params)
            .map_err(|e| AttemptError::ManifestRender(e.to_string()))?;

        let manifest = paths.dir.join(format!("{}.Dockerfile", descriptor.name));
        tokio::fs::write(&manifest, text)
            .await
            .map_err(|e| workspace(&manifest, e))?;
        Ok(manifest)
    }

    /// Build, flatten and retag. Every intermediate that currently exists is tracked in `live`.
    async fn produce(
        &self,
        descriptor: &WorkloadDescriptor,
        paths: &AttemptPaths,
        manifest: &Path,
        version: &str,
        live: &mut Vec<ImageRef>,
    ) -> Result<ImageRef, AttemptError> {
        let name = descriptor.name.as_str();
        let engine = &self.collab.engine;
        let quiet = !self.settings.verbose_build;
        let context = self.settings.run_root.as_path();

        let tmp = ImageRef::intermediate(name);
        live.push(tmp.clone());
        engine
            .build(manifest, context, &tmp, quiet)
            .await
            .map_err(|e| AttemptError::EngineBuild(e.to_string()))?;
        stage(name, "image-built");

        let mut current = tmp;
        if descriptor.mode.is_release() {
            let flat = ImageRef::flattened(name);
            live.push(flat.clone());
            engine
                .flatten(&current, &flat)
                .await
                .map_err(|e| AttemptError::Flatten(e.to_string()))?;
            engine
                .remove_image(&current)
                .await
                .map_err(|e| AttemptError::Flatten(e.to_string()))?;
            live.retain(|r| r != &current);
            current = flat;
            stage(name, "flattened");
        }

        let params = TemplateParams::from([
            ("imagename".to_string(), current.to_string()),
            ("appname".to_string(), name.to_string()),
        ]);
        let text = self
            .collab
            .renderer
            .render(POSTBUILD_TEMPLATE, &params)
            .map_err(|e| AttemptError::Postbuild(e.to_string()))?;
        let postbuild = paths.dir.join(format!("{name}.postbuild.Dockerfile"));
        tokio::fs::write(&postbuild, text)
            .await
            .map_err(|e| workspace(&postbuild, e))?;

        let image = ImageRef::new(name, version);
        engine
            .build(&postbuild, context, &image, quiet)
            .await
            .map_err(|e| AttemptError::Postbuild(e.to_string()))?;
        stage(name, "postbuild-tagged");

        engine
            .remove_image(&current)
            .await
            .map_err(|e| AttemptError::Postbuild(e.to_string()))?;
        live.retain(|r| r != &current);
        Ok(image)
    }

    /// Best-effort removal of intermediates left by a failed attempt.
    async fn discard(&self, name: &str, live: &[ImageRef]) {
        for image in live {
            if let Err(e) = self.collab.engine.remove_image(image).await {
                warn!(app = name, %image, error = %e, "intermediate not removed");
            }
        }
    }

    async fn archive(
        &self,
        descriptor: &WorkloadDescriptor,
        image: &ImageRef,
        version: &str,
    ) -> Result<Option<PathBuf>, AttemptError> {
        let Some(dir) = self
            .settings
            .archive_dir
            .as_ref()
            .filter(|_| descriptor.mode.is_release())
        else {
            return Ok(None);
        };
        let dest = dir.join(format!("{}_{version}.tar.xz", descriptor.name));
        self.collab
            .engine
            .save(image, &dest)
            .await
            .map_err(|e| AttemptError::Archive(e.to_string()))?;
        stage(&descriptor.name, "archived");
        Ok(Some(dest))
    }

    async fn push(&self, name: &str, image: &ImageRef) -> Result<(), AttemptError> {
        let engine = &self.collab.engine;
        for registry in &self.settings.registries {
            let alias = image.in_registry(registry);
            let push = |e: crate::error::CollabError| AttemptError::Push(format!("{alias}: {e}"));
            engine.tag(image, &alias).await.map_err(push)?;
            let pushed = engine.push(&alias).await;
            let untagged = engine.remove_image(&alias).await;
            if let Err(e) = pushed {
                if let Err(rm) = untagged {
                    warn!(app = name, %alias, error = %rm, "registry alias not removed");
                }
                return Err(push(e));
            }
            untagged.map_err(push)?;
            debug!(app = name, %alias, "pushed");
        }
        if !self.settings.registries.is_empty() {
            stage(name, "pushed");
        }
        Ok(())
    }
}

fn stage(app: &str, stage: &'static str) {
    debug!(app, stage, "stage complete");
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
}

fn workspace(path: &Path, e: std::io::Error) -> AttemptError {
    AttemptError::Workspace(format!("{}: {e}", path.display()))
}

/// `path` relative to `root`, always with `/` separators since it ends up inside a manifest.
fn relative_to(path: &Path, root: &Path) -> Result<String, AttemptError> {
    let rel = path.strip_prefix(root).map_err(|_| {
        AttemptError::Workspace(format!(
            "{} is outside the build context {}",
            path.display(),
            root.display()
        ))
    })?;
    Ok(rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/"))
}
