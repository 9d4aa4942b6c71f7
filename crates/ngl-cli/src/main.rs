//! `nightingale`: build container images for configured applications, redeploy nightly ones,
//! rotate old images and report the outcome.
mod app;
mod cli;

use std::process::ExitCode;

use clap::Parser;
use ngl_observe::{LoggerConfig, init_logger};
use tracing::error;

use crate::{app::RunStatus, cli::Cli};

/// Exit status for errors that stop the run before any build.
const EXIT_FATAL: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_cfg = LoggerConfig::from_verbosity(cli.verbose)
        .with_format(cli.log_format)
        .with_level(cli.log_level.as_deref());
    if let Err(e) = init_logger(&log_cfg) {
        eprintln!("nightingale: {e}");
        return ExitCode::from(EXIT_FATAL);
    }

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "tokio runtime unavailable");
            return ExitCode::from(EXIT_FATAL);
        }
    };

    match runtime.block_on(app::run(cli)) {
        Ok(RunStatus::Succeeded) => ExitCode::SUCCESS,
        Ok(RunStatus::Failed) => ExitCode::FAILURE,
        Err(e) => {
            error!(error = %format!("{e:#}"), "fatal");
            eprintln!("nightingale: {e:#}");
            ExitCode::from(EXIT_FATAL)
        }
    }
}
