use std::path::Path;

use async_trait::async_trait;
use ngl_core::{CollabError, ContainerEngine, RunOptions};
use ngl_model::{DiscoveredImage, ImageRef, RunningWorkload};
use tracing::{debug, warn};

use crate::proc::{ProcConfig, pipe, run};

pub mod parse;

/// Container engine through the `docker` binary (and `xz` for archives).
#[derive(Debug, Clone)]
pub struct DockerCli {
    program: String,
    xz: String,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self {
            program: "docker".to_string(),
            xz: "xz".to_string(),
        }
    }
}

impl DockerCli {
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn cmd(&self) -> ProcConfig {
        ProcConfig::new(&self.program)
    }

    async fn exec(&self, cfg: ProcConfig) -> Result<String, CollabError> {
        Ok(run(&cfg).await?.stdout)
    }
}

/// Arguments of `docker run` for `opts`, without the image.
pub fn run_args(opts: &RunOptions) -> Vec<String> {
    let mut args = vec!["run".to_string()];
    if opts.detached {
        args.push("-d".into());
    }
    if opts.restart_always {
        args.push("--restart=always".into());
    }
    if let Some(dns) = &opts.dns {
        args.push(format!("--dns={dns}"));
    }
    if let Some(p) = &opts.publish {
        args.push("-p".into());
        args.push(format!("{}:{}:{}", p.host_ip, p.host, p.container));
        args.push(format!("--expose={}", p.container));
    }
    for (k, v) in &opts.env {
        args.push("-e".into());
        args.push(format!("{k}={v}"));
    }
    for v in &opts.volumes {
        args.push("-v".into());
        args.push(v.to_string());
    }
    args
}

#[async_trait]
impl ContainerEngine for DockerCli {
    async fn build(
        &self,
        manifest: &Path,
        context: &Path,
        tag: &ImageRef,
        quiet: bool,
    ) -> Result<(), CollabError> {
        let mut cfg = self.cmd().arg("build");
        if quiet {
            cfg = cfg.arg("--quiet");
        }
        let cfg = cfg
            .args(["-t".to_string(), tag.to_string()])
            .arg("--file")
            .arg(manifest.to_string_lossy())
            .arg(context.to_string_lossy());
        self.exec(cfg).await?;
        Ok(())
    }

    async fn run(&self, image: &ImageRef, opts: &RunOptions) -> Result<String, CollabError> {
        let cfg = self.cmd().args(run_args(opts)).arg(image.to_string());
        let id = self.exec(cfg).await?.trim().to_string();
        if id.is_empty() {
            return Err(CollabError::Parse("docker run printed no container id".into()));
        }
        Ok(id)
    }

    async fn stop(&self, id: &str) -> Result<(), CollabError> {
        self.exec(self.cmd().args(["stop", id])).await.map(drop)
    }

    async fn remove(&self, id: &str) -> Result<(), CollabError> {
        self.exec(self.cmd().args(["rm", id])).await.map(drop)
    }

    async fn list_containers(&self) -> Result<Vec<RunningWorkload>, CollabError> {
        let out = self
            .exec(self.cmd().args(["ps", "-a", "--no-trunc", "--format", "{{json .}}"]))
            .await?;
        Ok(parse::containers(&out)?)
    }

    async fn list_images(&self) -> Result<Vec<DiscoveredImage>, CollabError> {
        let out = self
            .exec(self.cmd().args(["images", "--format", "{{json .}}"]))
            .await?;
        Ok(parse::images(&out)?)
    }

    async fn remove_image(&self, image: &ImageRef) -> Result<(), CollabError> {
        self.exec(self.cmd().arg("rmi").arg(image.to_string()))
            .await
            .map(drop)
    }

    async fn flatten(&self, source: &ImageRef, target: &ImageRef) -> Result<(), CollabError> {
        let container = self
            .exec(self.cmd().arg("create").arg(source.to_string()))
            .await?
            .trim()
            .to_string();
        debug!(target: "ngl.exec.docker", %source, %target, %container, "flatten");

        let flattened = pipe(
            &self.cmd().args(["export", container.as_str()]),
            &self.cmd().args(["import", "-"]).arg(target.to_string()),
            None,
        )
        .await;
        let removed = self.remove(&container).await;
        flattened?;
        removed
    }

    async fn tag(&self, existing: &ImageRef, alias: &ImageRef) -> Result<(), CollabError> {
        self.exec(self.cmd().args(["tag".to_string(), existing.to_string(), alias.to_string()]))
            .await
            .map(drop)
    }

    async fn push(&self, image: &ImageRef) -> Result<(), CollabError> {
        self.exec(self.cmd().arg("push").arg(image.to_string()))
            .await
            .map(drop)
    }

    async fn save(&self, image: &ImageRef, dest: &Path) -> Result<(), CollabError> {
        let saved = pipe(
            &self.cmd().arg("save").arg(image.to_string()),
            &ProcConfig::new(&self.xz).args(["--compress", "-9"]),
            Some(dest),
        )
        .await;
        if let Err(e) = saved {
            if let Err(rm) = tokio::fs::remove_file(dest).await
                && rm.kind() != std::io::ErrorKind::NotFound
            {
                warn!(
                    target: "ngl.exec.docker",
                    dest = %dest.display(),
                    error = %rm,
                    "partial archive left behind"
                );
            }
            return Err(e.into());
        }
        Ok(())
    }
}
