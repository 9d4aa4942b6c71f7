use std::path::PathBuf;

use clap::{ArgAction, Parser};
use ngl_observe::LoggerFormat;

/// Environment variable consulted for the SMTP password.
pub const SMTP_PASSWORD_ENV: &str = "NIGHTINGALE_SMTP_PASSWORD";

#[derive(Debug, Parser)]
#[command(name = "nightingale")]
#[command(about = "Build, archive and redeploy container images for configured applications")]
#[command(version)]
pub struct Cli {
    /// Configuration JSON file; without it the run has no applications
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory copied into the build context as `environment`
    #[arg(long, value_name = "DIR", default_value = "./environment")]
    pub envdir: PathBuf,

    /// Directory holding the `<name>.j2` manifest templates
    #[arg(long, value_name = "DIR", default_value = "./templates")]
    pub templatedir: PathBuf,

    /// Keep the temporary run directory
    #[arg(long)]
    pub savetmp: bool,

    /// Build (and for nightly apps, run) new images
    #[arg(long)]
    pub build: bool,

    /// Remove images older than N days (N >= 1)
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pub rotate: Option<u32>,

    /// Where release image archives are written (defaults to the current directory)
    #[arg(long, value_name = "DIR")]
    pub imagedir: Option<PathBuf>,

    /// Rounds of attempts for failing applications
    #[arg(long, value_name = "N", default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub tries: u32,

    /// Seconds to wait between rounds
    #[arg(long = "retries-delay", value_name = "SECS", default_value_t = 60)]
    pub retries_delay: u64,

    /// Show full `docker build` output
    #[arg(long)]
    pub verbose_build: bool,

    /// Mail the run report to the configured recipients
    #[arg(long)]
    pub notify: bool,

    /// SMTP password; overrides the configuration file
    #[arg(long, env = SMTP_PASSWORD_ENV, hide_env_values = true)]
    pub smtp_password: Option<String>,

    /// Extra registry to push final images to (repeatable)
    #[arg(long = "push", value_name = "REGISTRY")]
    pub push: Vec<String>,

    /// Write Prometheus textfile metrics for the run
    #[arg(long, value_name = "PATH")]
    pub metrics_file: Option<PathBuf>,

    /// Log output: text, json or journald
    #[arg(long, value_name = "FORMAT", default_value = "text")]
    pub log_format: LoggerFormat,

    /// Log filter directive, e.g. `info,ngl_core=debug`
    #[arg(long, value_name = "FILTER", env = ngl_observe::LOG_ENV)]
    pub log_level: Option<String>,

    /// Raise log verbosity (repeatable)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Limit the run to these applications
    #[arg(value_name = "APP")]
    pub applications: Vec<String>,
}
