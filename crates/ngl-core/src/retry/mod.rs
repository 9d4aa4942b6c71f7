use std::{collections::HashSet, sync::Arc, time::Duration};

use async_trait::async_trait;
use ngl_model::{BuildAttemptResult, WorkloadDescriptor};
use tokio::time::Instant;
use tracing::{info, instrument, warn};

use crate::{
    clock::{Clock, system_clock},
    error::AttemptError,
    lifecycle::LifecycleManager,
    pipeline::{BuildPipeline, BuiltImage},
    report::latest_per_descriptor,
    rotation::{ImageRotation, RotationReport},
};

/// One attempt for one descriptor; the retry loop only sees success or a classified failure.
#[async_trait]
pub trait AttemptRunner: Send + Sync {
    async fn attempt(
        &self,
        descriptor: &WorkloadDescriptor,
        round: u32,
    ) -> Result<BuiltImage, AttemptError>;
}

/// Builds an image and, for nightly descriptors, puts it into service.
pub struct Deployer {
    pipeline: BuildPipeline,
    lifecycle: LifecycleManager,
    clock: Clock,
}

impl Deployer {
    pub fn new(pipeline: BuildPipeline, lifecycle: LifecycleManager) -> Self {
        Self {
            pipeline,
            lifecycle,
            clock: system_clock(),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }
}

#[async_trait]
impl AttemptRunner for Deployer {
    async fn attempt(
        &self,
        descriptor: &WorkloadDescriptor,
        round: u32,
    ) -> Result<BuiltImage, AttemptError> {
        let built = self
            .pipeline
            .build(descriptor, round, (self.clock)())
            .await?;
        if descriptor.mode.is_nightly() {
            self.lifecycle
                .replace_and_run(&built.image, descriptor)
                .await?;
        }
        Ok(built)
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of rounds; at least one round always runs.
    pub tries: u32,
    /// Pause between rounds that still have failures.
    pub delay: Duration,
    /// Rotate images older than this many days after every round.
    pub rotate_after_days: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            tries: 1,
            delay: Duration::from_secs(60),
            rotate_after_days: None,
        }
    }
}

impl RetryPolicy {
    pub fn with_tries(mut self, tries: u32) -> Self {
        self.tries = tries.max(1);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// A zero age disables rotation rather than sweeping every stamped image.
    pub fn with_rotation(mut self, max_age_days: Option<u32>) -> Self {
        self.rotate_after_days = max_age_days.filter(|days| *days > 0);
        self
    }
}

/// Everything a batch run produced.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Every attempt, in execution order.
    pub results: Vec<BuildAttemptResult>,
    pub rounds: u32,
    pub rotations: Vec<RotationReport>,
    /// Descriptors left out by the allow-list.
    pub skipped: Vec<String>,
}

impl BatchOutcome {
    /// Latest result per descriptor, in first-attempt order.
    pub fn final_results(&self) -> Vec<&BuildAttemptResult> {
        latest_per_descriptor(&self.results)
    }

    pub fn all_succeeded(&self) -> bool {
        self.final_results().iter().all(|r| r.success)
    }

    pub fn attempts(&self, name: &str) -> usize {
        self.results
            .iter()
            .filter(|r| r.descriptor_name == name)
            .count()
    }
}

/// Drives a batch through repeated rounds, re-running only what failed.
pub struct RetryController {
    runner: Arc<dyn AttemptRunner>,
    rotation: Option<ImageRotation>,
    policy: RetryPolicy,
    clock: Clock,
}

impl RetryController {
    pub fn new(runner: Arc<dyn AttemptRunner>, policy: RetryPolicy) -> Self {
        Self {
            runner,
            rotation: None,
            policy,
            clock: system_clock(),
        }
    }

    /// Image rotation to run after each round when the policy sets an age.
    pub fn with_rotation(mut self, rotation: ImageRotation) -> Self {
        self.rotation = Some(rotation);
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[instrument(level = "debug", skip_all, fields(batch = batch.len(), tries = self.policy.tries))]
    pub async fn run(&self, batch: &[WorkloadDescriptor], allow: &[String]) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        let mut working = select(batch, allow, &mut outcome.skipped);
        let tries = self.policy.tries.max(1);

        for round in 1..=tries {
            if working.is_empty() {
                break;
            }
            outcome.rounds = round;
            info!(round, apps = working.len(), "round started");

            let mut failed = Vec::new();
            for descriptor in working {
                let result = self.attempt(descriptor, round).await;
                if !result.success {
                    failed.push(descriptor);
                }
                outcome.results.push(result);
            }
            self.rotate(&mut outcome).await;

            working = failed;
            if !working.is_empty() && round < tries {
                info!(
                    round,
                    failed = working.len(),
                    delay_secs = self.policy.delay.as_secs(),
                    "retrying failed apps after delay"
                );
                tokio::time::sleep(self.policy.delay).await;
            }
        }

        if outcome.rounds == 0 {
            self.rotate(&mut outcome).await;
        }
        outcome
    }

    async fn attempt(&self, descriptor: &WorkloadDescriptor, round: u32) -> BuildAttemptResult {
        let name = descriptor.name.as_str();
        let started = Instant::now();
        let result = match self.runner.attempt(descriptor, round).await {
            Ok(built) => BuildAttemptResult::succeeded(
                name,
                round,
                built.version,
                format!("built {}", built.image),
            ),
            Err(e) => {
                warn!(app = name, round, stage = e.stage(), error = %e, "attempt failed");
                BuildAttemptResult::failed(name, round, e.user_message())
            }
        };
        result.with_duration(started.elapsed())
    }

    async fn rotate(&self, outcome: &mut BatchOutcome) {
        let (Some(rotation), Some(days)) = (&self.rotation, self.policy.rotate_after_days) else {
            return;
        };
        match rotation.rotate(days, (self.clock)()).await {
            Ok(report) => outcome.rotations.push(report),
            Err(e) => warn!(error = %e, "image listing unreadable; rotation skipped"),
        }
    }
}

/// Apply the allow-list; an empty list admits everything.
fn select<'a>(
    batch: &'a [WorkloadDescriptor],
    allow: &[String],
    skipped: &mut Vec<String>,
) -> Vec<&'a WorkloadDescriptor> {
    if allow.is_empty() {
        return batch.iter().collect();
    }
    let allowed: HashSet<&str> = allow.iter().map(String::as_str).collect();
    for name in &allowed {
        if !batch.iter().any(|d| d.name == *name) {
            warn!(app = name, "requested app is not configured");
        }
    }
    batch
        .iter()
        .filter(|d| {
            let keep = allowed.contains(d.name.as_str());
            if !keep {
                info!(app = %d.name, "skipped");
                skipped.push(d.name.clone());
            }
            keep
        })
        .collect()
}
