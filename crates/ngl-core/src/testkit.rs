//! In-memory collaborators for exercising the engine without git, docker or a shell.
use std::{
    collections::{BTreeSet, HashMap, HashSet},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use ngl_model::{DiscoveredImage, ImageRef, RunningWorkload};

use crate::{
    error::CollabError,
    ports::{
        Collaborators, CommandRunner, ContainerEngine, DependencyInstaller, RunOptions,
        SourceControl, TemplateParams, TemplateRenderer,
    },
};

#[derive(Default)]
pub struct FakeScm {
    tag: Option<String>,
    tag_lookup_fails: bool,
    failing_repos: HashSet<String>,
    files: Vec<(PathBuf, String)>,
    pub clones: Mutex<Vec<PathBuf>>,
}

impl FakeScm {
    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tag = Some(tag.to_string());
        self
    }

    pub fn with_broken_tag_lookup(mut self) -> Self {
        self.tag_lookup_fails = true;
        self
    }

    pub fn failing_repo(mut self, repo: &str) -> Self {
        self.failing_repos.insert(repo.to_string());
        self
    }

    /// File written into every checkout.
    pub fn with_file(mut self, rel: &str, content: &str) -> Self {
        self.files.push((PathBuf::from(rel), content.to_string()));
        self
    }

    pub fn clones(&self) -> Vec<PathBuf> {
        self.clones.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceControl for FakeScm {
    async fn clone_repo(&self, repo: &str, _branch: &str, dest: &Path) -> Result<(), CollabError> {
        self.clones.lock().unwrap().push(dest.to_path_buf());
        if self.failing_repos.contains(repo) {
            return Err(CollabError::non_zero(
                format!("git clone {repo}"),
                "exit code 128",
                "repository not found",
            ));
        }
        std::fs::create_dir_all(dest)?;
        for (rel, content) in &self.files {
            let path = dest.join(rel);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, content)?;
        }
        Ok(())
    }

    async fn latest_tag(&self, _checkout: &Path) -> Result<Option<String>, CollabError> {
        if self.tag_lookup_fails {
            return Err(CollabError::non_zero("git describe", "exit code 128", "no names found"));
        }
        Ok(self.tag.clone())
    }
}

#[derive(Default)]
pub struct FakeEngine {
    images: Mutex<BTreeSet<ImageRef>>,
    containers: Mutex<Vec<RunningWorkload>>,
    calls: Mutex<Vec<String>>,
    runs: Mutex<Vec<(ImageRef, RunOptions)>>,
    /// Remaining forced build failures per image name; `u32::MAX` means always.
    failing_builds: Mutex<HashMap<String, u32>>,
    failing_ops: HashSet<&'static str>,
    failing_removals: HashSet<ImageRef>,
    next_id: Mutex<u32>,
}

impl FakeEngine {
    pub fn with_image(self, reference: &str) -> Self {
        let image: ImageRef = reference.parse().unwrap();
        self.images.lock().unwrap().insert(image);
        self
    }

    pub fn with_container(self, workload: RunningWorkload) -> Self {
        self.containers.lock().unwrap().push(workload);
        self
    }

    pub fn failing_build(self, name: &str) -> Self {
        self.failing_build_times(name, u32::MAX)
    }

    pub fn failing_build_times(self, name: &str, times: u32) -> Self {
        self.failing_builds
            .lock()
            .unwrap()
            .insert(name.to_string(), times);
        self
    }

    /// Make every call of `op` fail (`flatten`, `push`, `save`, `run`, `stop`, `tag`,
    /// `list_images`, `list_containers`).
    pub fn failing(mut self, op: &'static str) -> Self {
        self.failing_ops.insert(op);
        self
    }

    pub fn failing_removal(mut self, reference: &str) -> Self {
        self.failing_removals.insert(reference.parse().unwrap());
        self
    }

    pub fn images(&self) -> Vec<String> {
        self.images
            .lock()
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_of(&self, op: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.split(' ').next() == Some(op))
            .collect()
    }

    pub fn runs(&self) -> Vec<(ImageRef, RunOptions)> {
        self.runs.lock().unwrap().clone()
    }

    pub fn containers(&self) -> Vec<RunningWorkload> {
        self.containers.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn check(&self, op: &'static str) -> Result<(), CollabError> {
        if self.failing_ops.contains(op) {
            return Err(CollabError::non_zero(
                format!("docker {op}"),
                "exit code 1",
                "forced failure",
            ));
        }
        Ok(())
    }

    fn require(&self, image: &ImageRef) -> Result<(), CollabError> {
        if self.images.lock().unwrap().contains(image) {
            Ok(())
        } else {
            Err(CollabError::non_zero(
                "docker",
                "exit code 1",
                format!("No such image: {image}"),
            ))
        }
    }
}

#[async_trait]
impl ContainerEngine for FakeEngine {
    async fn build(
        &self,
        manifest: &Path,
        context: &Path,
        tag: &ImageRef,
        _quiet: bool,
    ) -> Result<(), CollabError> {
        self.record(format!("build {tag}"));
        if !manifest.is_file() || !context.is_dir() {
            return Err(CollabError::Io(format!(
                "missing manifest {} or context {}",
                manifest.display(),
                context.display()
            )));
        }
        {
            let mut failing = self.failing_builds.lock().unwrap();
            if let Some(left) = failing.get_mut(&tag.name)
                && *left > 0
            {
                if *left != u32::MAX {
                    *left -= 1;
                }
                return Err(CollabError::non_zero(
                    format!("docker build -t {tag}"),
                    "exit code 1",
                    "forced failure",
                ));
            }
        }
        self.images.lock().unwrap().insert(tag.clone());
        Ok(())
    }

    async fn run(&self, image: &ImageRef, opts: &RunOptions) -> Result<String, CollabError> {
        self.record(format!("run {image}"));
        self.check("run")?;
        self.require(image)?;
        let id = {
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            format!("new{next}")
        };
        self.runs.lock().unwrap().push((image.clone(), opts.clone()));
        self.containers.lock().unwrap().push(RunningWorkload {
            id: id.clone(),
            image_name: image.name.clone(),
            image_tag: Some(image.tag.clone()),
            host_port: opts.publish.as_ref().map(|p| p.host),
            exposed_port: opts.exposed_port(),
            status: "Up 1 second".to_string(),
        });
        Ok(id)
    }

    async fn stop(&self, id: &str) -> Result<(), CollabError> {
        self.record(format!("stop {id}"));
        self.check("stop")?;
        let mut containers = self.containers.lock().unwrap();
        let c = containers
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| CollabError::non_zero("docker stop", "exit code 1", "no such container"))?;
        c.status = "Exited (0) 1 second ago".to_string();
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<(), CollabError> {
        self.record(format!("rm {id}"));
        self.containers.lock().unwrap().retain(|c| c.id != id);
        Ok(())
    }

    async fn list_containers(&self) -> Result<Vec<RunningWorkload>, CollabError> {
        if self.failing_ops.contains("list_containers") {
            return Err(CollabError::Parse("garbled ps output".into()));
        }
        Ok(self.containers())
    }

    async fn list_images(&self) -> Result<Vec<DiscoveredImage>, CollabError> {
        if self.failing_ops.contains("list_images") {
            return Err(CollabError::Parse("garbled images output".into()));
        }
        Ok(self
            .images
            .lock()
            .unwrap()
            .iter()
            .enumerate()
            .map(|(i, r)| DiscoveredImage::new(r.name.clone(), r.tag.clone(), format!("sha{i}")))
            .collect())
    }

    async fn remove_image(&self, image: &ImageRef) -> Result<(), CollabError> {
        self.record(format!("rmi {image}"));
        if self.failing_removals.contains(image) {
            return Err(CollabError::non_zero("docker rmi", "exit code 1", "conflict"));
        }
        self.require(image)?;
        self.images.lock().unwrap().remove(image);
        Ok(())
    }

    async fn flatten(&self, source: &ImageRef, target: &ImageRef) -> Result<(), CollabError> {
        self.record(format!("flatten {source} {target}"));
        self.check("flatten")?;
        self.require(source)?;
        self.images.lock().unwrap().insert(target.clone());
        Ok(())
    }

    async fn tag(&self, existing: &ImageRef, alias: &ImageRef) -> Result<(), CollabError> {
        self.record(format!("tag {existing} {alias}"));
        self.check("tag")?;
        self.require(existing)?;
        self.images.lock().unwrap().insert(alias.clone());
        Ok(())
    }

    async fn push(&self, image: &ImageRef) -> Result<(), CollabError> {
        self.record(format!("push {image}"));
        self.check("push")?;
        self.require(image)
    }

    async fn save(&self, image: &ImageRef, dest: &Path) -> Result<(), CollabError> {
        self.record(format!("save {image} {}", dest.display()));
        self.check("save")?;
        self.require(image)?;
        std::fs::write(dest, b"archive")?;
        Ok(())
    }
}

pub struct FakeRenderer {
    known: HashSet<String>,
    pub rendered: Mutex<Vec<(String, TemplateParams)>>,
}

impl FakeRenderer {
    pub fn knowing(names: &[&str]) -> Self {
        Self {
            known: names.iter().map(|n| n.to_string()).collect(),
            rendered: Mutex::new(Vec::new()),
        }
    }

    pub fn rendered(&self) -> Vec<(String, TemplateParams)> {
        self.rendered.lock().unwrap().clone()
    }
}

impl TemplateRenderer for FakeRenderer {
    fn render(&self, name: &str, params: &TemplateParams) -> Result<String, CollabError> {
        if !self.known.contains(name) {
            return Err(CollabError::TemplateNotFound(format!("{name}.j2")));
        }
        self.rendered
            .lock()
            .unwrap()
            .push((name.to_string(), params.clone()));
        let mut out = format!("# {name}\n");
        for (k, v) in params {
            out.push_str(&format!("ARG {k}={v}\n"));
        }
        Ok(out)
    }
}

#[derive(Default)]
pub struct FakeShell {
    failing: HashSet<String>,
    /// Directories (relative to the cwd) a successful script leaves behind.
    outputs: HashMap<String, String>,
    pub scripts: Mutex<Vec<(String, PathBuf, Vec<(String, String)>)>>,
}

impl FakeShell {
    pub fn failing(mut self, script: &str) -> Self {
        self.failing.insert(script.to_string());
        self
    }

    pub fn producing(mut self, script: &str, rel_dir: &str) -> Self {
        self.outputs.insert(script.to_string(), rel_dir.to_string());
        self
    }

    pub fn scripts(&self) -> Vec<(String, PathBuf, Vec<(String, String)>)> {
        self.scripts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for FakeShell {
    async fn run_shell(
        &self,
        script: &str,
        cwd: &Path,
        env: &[(String, String)],
    ) -> Result<(), CollabError> {
        self.scripts
            .lock()
            .unwrap()
            .push((script.to_string(), cwd.to_path_buf(), env.to_vec()));
        if self.failing.contains(script) {
            return Err(CollabError::non_zero(script, "exit code 2", "forced failure"));
        }
        if let Some(rel) = self.outputs.get(script) {
            let dir = cwd.join(rel);
            std::fs::create_dir_all(&dir)?;
            std::fs::write(dir.join("index.html"), "<html></html>")?;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeInstaller {
    fails: bool,
    pub installs: Mutex<Vec<(PathBuf, Option<String>)>>,
}

impl FakeInstaller {
    pub fn failing() -> Self {
        Self {
            fails: true,
            ..Self::default()
        }
    }

    pub fn installs(&self) -> Vec<(PathBuf, Option<String>)> {
        self.installs.lock().unwrap().clone()
    }
}

#[async_trait]
impl DependencyInstaller for FakeInstaller {
    async fn install(&self, dir: &Path, command: Option<&str>) -> Result<(), CollabError> {
        self.installs
            .lock()
            .unwrap()
            .push((dir.to_path_buf(), command.map(str::to_string)));
        if self.fails {
            return Err(CollabError::non_zero("npm install", "exit code 1", "ERESOLVE"));
        }
        Ok(())
    }
}

/// One fake of each collaborator, kept as concrete handles for assertions.
pub struct Kit {
    pub scm: Arc<FakeScm>,
    pub engine: Arc<FakeEngine>,
    pub renderer: Arc<FakeRenderer>,
    pub shell: Arc<FakeShell>,
    pub installer: Arc<FakeInstaller>,
}

impl Kit {
    pub fn new() -> Self {
        Self {
            scm: Arc::new(FakeScm::default()),
            engine: Arc::new(FakeEngine::default()),
            renderer: Arc::new(FakeRenderer::knowing(&["web", "api", "postbuild"])),
            shell: Arc::new(FakeShell::default()),
            installer: Arc::new(FakeInstaller::default()),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            scm: self.scm.clone(),
            engine: self.engine.clone(),
            renderer: self.renderer.clone(),
            shell: self.shell.clone(),
            installer: self.installer.clone(),
        }
    }
}
