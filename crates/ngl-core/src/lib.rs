//! Orchestration engine: version resolution, the build pipeline, workload replacement,
//! image rotation, the retry loop and report composition.
//!
//! Everything outside the process (git, the container engine, templates, shell, mail) is reached
//! through the traits in [`ports`].
pub mod error;
pub use error::{AttemptError, CollabError, RotationFailure};

pub mod ports;
pub use ports::{
    Collaborators, CommandRunner, ContainerEngine, DependencyInstaller, MailTransport,
    PortMapping, RunOptions, SourceControl, TemplateParams, TemplateRenderer,
};

mod clock;
pub use clock::{Clock, fixed_clock, local_now, system_clock};

mod version;
pub use version::{VERSION_ENV, VERSION_PLACEHOLDER, VersionResolver, shell_quote, version_command};

mod pipeline;
pub use pipeline::{BuildPipeline, BuiltImage, POSTBUILD_TEMPLATE, PipelineSettings};

mod lifecycle;
pub use lifecycle::{LifecycleManager, matches};

mod rotation;
pub use rotation::{ImageRotation, RotationReport};

mod retry;
pub use retry::{AttemptRunner, BatchOutcome, Deployer, RetryController, RetryPolicy};

mod report;
pub use report::{Report, ReportComposer, SUBJECT_PREFIX, human_duration, latest_per_descriptor};

mod workspace;
pub use workspace::{ENVIRONMENT_DIR, RunWorkspace};

#[cfg(test)]
mod testkit;
