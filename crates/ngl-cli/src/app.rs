use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, SystemTime},
};

use anyhow::{Context, bail};
use ngl_core::{
    BatchOutcome, BuildPipeline, Collaborators, ContainerEngine, Deployer, ImageRotation,
    LifecycleManager, MailTransport, PipelineSettings, Report, ReportComposer, RetryController,
    RetryPolicy, RotationReport, RunWorkspace, local_now,
};
use ngl_exec::{DockerCli, GitCli, ShellInstaller, ShellRunner};
use ngl_model::DeployConfig;
use ngl_notify::SmtpMailer;
use ngl_prometheus::OutcomeMetrics;
use ngl_template::JinjaRenderer;
use tracing::{error, info, warn};

use crate::cli::Cli;

/// How a run ended, short of a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Succeeded,
    Failed,
}

/// Read and validate the configuration; no file means an empty configuration.
pub fn load_config(cli: &Cli) -> anyhow::Result<DeployConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading configuration {}", path.display()))?;
            DeployConfig::from_json(&raw)
                .with_context(|| format!("invalid configuration {}", path.display()))?
        }
        None => DeployConfig::default(),
    };

    if let Some(password) = &cli.smtp_password
        && let Some(mail) = config.mail.as_mut()
    {
        mail.password = Some(password.clone());
        mail.validate().context("invalid mail configuration")?;
    }
    if cli.notify && config.mail.is_none() {
        bail!("--notify requires a `mail` section in the configuration");
    }
    Ok(config)
}

/// Registries from the configuration followed by those given on the command line, without repeats.
pub fn registries(config: &DeployConfig, extra: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for r in config.registries.iter().chain(extra) {
        let r = r.trim();
        if !r.is_empty() && !out.iter().any(|o| o == r) {
            out.push(r.to_string());
        }
    }
    out
}

pub async fn run(cli: Cli) -> anyhow::Result<RunStatus> {
    let config = load_config(&cli)?;
    let mailer = match (&config.mail, cli.notify) {
        (Some(mail), true) => Some(SmtpMailer::from_config(mail).context("mail transport")?),
        _ => None,
    };
    for name in &cli.applications {
        if config.app(name).is_none() {
            warn!(app = %name, "requested application is not configured");
        }
    }
    if !cli.build && cli.rotate.is_none() {
        warn!("neither --build nor --rotate given; nothing to do");
    }

    let workspace = RunWorkspace::create()
        .await
        .context("creating run directory")?
        .keep(cli.savetmp);
    info!(root = %workspace.root().display(), "run directory ready");

    let outcome = match stage_and_execute(&cli, &config, &workspace).await {
        Ok(outcome) => outcome,
        Err(e) => {
            finish(workspace).await;
            return Err(e);
        }
    };
    finish(workspace).await;

    let mailer = mailer.as_ref().map(|m| m as &dyn MailTransport);
    Ok(conclude(&outcome, mailer, cli.metrics_file.as_deref()).await)
}

/// Report the outcome everywhere it was asked for; delivery problems never change the status.
async fn conclude(
    outcome: &BatchOutcome,
    mailer: Option<&dyn MailTransport>,
    metrics_file: Option<&Path>,
) -> RunStatus {
    for rotation in &outcome.rotations {
        log_rotation(rotation);
    }
    for name in &outcome.skipped {
        info!(app = %name, "skipped");
    }

    let report = ReportComposer::for_this_host().compose(&outcome.results, local_now());
    print_report(&report);
    if let Some(mailer) = mailer {
        notify(mailer, &report).await;
    }
    if let Some(path) = metrics_file {
        write_metrics(outcome, path);
    }

    if outcome.all_succeeded() {
        RunStatus::Succeeded
    } else {
        RunStatus::Failed
    }
}

async fn stage_and_execute(
    cli: &Cli,
    config: &DeployConfig,
    workspace: &RunWorkspace,
) -> anyhow::Result<BatchOutcome> {
    workspace
        .stage_environment(&cli.envdir)
        .await
        .with_context(|| format!("copying environment {}", cli.envdir.display()))?;

    let engine: Arc<dyn ContainerEngine> = Arc::new(DockerCli::default());
    if cli.build {
        let controller = controller(cli, config, workspace.root(), engine)?;
        return Ok(controller.run(&config.apps, &cli.applications).await);
    }

    let mut outcome = BatchOutcome::default();
    if let Some(days) = cli.rotate {
        match ImageRotation::new(engine).rotate(days, local_now()).await {
            Ok(report) => outcome.rotations.push(report),
            Err(e) => warn!(error = %e, "image listing unreadable; rotation skipped"),
        }
    }
    Ok(outcome)
}

fn controller(
    cli: &Cli,
    config: &DeployConfig,
    run_root: &Path,
    engine: Arc<dyn ContainerEngine>,
) -> anyhow::Result<RetryController> {
    let renderer = JinjaRenderer::from_dir(&cli.templatedir).context("loading templates")?;
    let collab = Collaborators {
        scm: Arc::new(GitCli::default()),
        engine: engine.clone(),
        renderer: Arc::new(renderer),
        shell: Arc::new(ShellRunner::new()),
        installer: Arc::new(ShellInstaller::default()),
    };

    let archive_dir = match &cli.imagedir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("resolving current directory")?,
    };
    let settings = PipelineSettings::new(run_root)
        .with_archive_dir(archive_dir)
        .with_registries(registries(config, &cli.push))
        .with_verbose_build(cli.verbose_build);
    let pipeline =
        BuildPipeline::new(collab, settings).with_default_version(config.default_version.clone());
    let lifecycle = LifecycleManager::new(engine.clone())
        .with_dns(config.dns.clone())
        .with_log_root(config.log_root.clone());

    let policy = RetryPolicy::default()
        .with_tries(cli.tries)
        .with_delay(Duration::from_secs(cli.retries_delay))
        .with_rotation(cli.rotate);
    Ok(RetryController::new(Arc::new(Deployer::new(pipeline, lifecycle)), policy)
        .with_rotation(ImageRotation::new(engine)))
}

async fn finish(workspace: RunWorkspace) {
    let root: PathBuf = workspace.root().to_path_buf();
    if let Err(e) = workspace.finish().await {
        warn!(root = %root.display(), error = %e, "run directory not removed");
    }
}

fn log_rotation(report: &RotationReport) {
    info!(
        removed = report.removed.len(),
        retained = report.retained.len(),
        failed = report.failed.len(),
        "image rotation finished"
    );
    for failure in &report.failed {
        warn!(image = %failure.image, reason = %failure.reason, "image not removed");
    }
}

fn print_report(report: &Report) {
    println!("{}", report.subject);
    print!("{}", report.body);
}

async fn notify(mailer: &dyn MailTransport, report: &Report) {
    if let Err(e) = mailer.send(report).await {
        error!(error = %e, "report not mailed");
    }
}

fn write_metrics(outcome: &BatchOutcome, path: &Path) {
    let written = OutcomeMetrics::new().and_then(|m| {
        m.record(outcome, SystemTime::now());
        m.write_textfile(path)
    });
    if let Err(e) = written {
        warn!(path = %path.display(), error = %e, "metrics not written");
    }
}
