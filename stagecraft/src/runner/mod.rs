//! Stage execution and result classification.
//!
//! The runner resolves a stage's declared inputs from its predecessor's
//! frozen artifact area, runs the body, and folds the raw outcome plus
//! output verification into a three-valued [`StageResult`]:
//!
//! - exit 0 with every required output present → Success
//! - exit 0 with a required output missing → Degraded (incomplete outputs)
//! - exit 2 → Degraded (stage declared itself provisional)
//! - anything else, a spawn failure, or a timeout → Failed
//!
//! Dependency problems are detected *before* the body is invoked and
//! surface as errors, never as stage results.

mod process;

pub use process::{
    BodyOutcome, CommandStageBody, StageBody, StageInvocation, ENV_INPUT_DIR, ENV_OUTPUT_DIR,
    ENV_STAGE_NAME,
};

use crate::config::EngineConfig;
use crate::core::{ResultCause, StageResult};
use crate::errors::{Result, StagecraftError};
use crate::registry::{StageDescriptor, StageRegistry};
use crate::store::ArtifactStore;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Outcome of a stage's declared self-check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfCheckResult {
    /// Whether the check exited 0.
    pub passed: bool,
    /// Captured check output.
    pub log: PathBuf,
}

/// Executes one stage at a time against an artifact store.
pub struct StageRunner {
    registry: Arc<StageRegistry>,
    store: ArtifactStore,
    config: EngineConfig,
    body: Arc<dyn StageBody>,
}

impl StageRunner {
    /// Creates a runner backed by real child processes.
    #[must_use]
    pub fn new(registry: Arc<StageRegistry>, store: ArtifactStore, config: EngineConfig) -> Self {
        Self::with_body(registry, store, config, Arc::new(CommandStageBody))
    }

    /// Creates a runner with a substitute body implementation.
    #[must_use]
    pub fn with_body(
        registry: Arc<StageRegistry>,
        store: ArtifactStore,
        config: EngineConfig,
        body: Arc<dyn StageBody>,
    ) -> Self {
        Self {
            registry,
            store,
            config,
            body,
        }
    }

    /// The store this runner writes into.
    #[must_use]
    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Runs one stage to a terminal result.
    ///
    /// Fails fast with `MissingDependency` when the predecessor's
    /// artifact area is absent or empty, without invoking the body.
    pub async fn run(&self, descriptor: &StageDescriptor) -> Result<StageResult> {
        let input_dir = self.resolve_input(descriptor)?;

        let area = self.store.area_for(&descriptor.name);
        area.reset()?;

        let invocation = StageInvocation {
            stage: descriptor.name.clone(),
            command: descriptor.entrypoint().to_string(),
            working_dir: descriptor.working_dir.clone(),
            input_dir,
            output_dir: Some(area.path().to_path_buf()),
            log_path: self.config.logs_dir.join(format!("{}.log", descriptor.name)),
        };

        info!(stage = %descriptor.name, command = %invocation.command, "stage started");
        let started = Instant::now();
        let outcome = self.body.invoke(&invocation, self.config.timeout).await;
        let duration = started.elapsed();

        let result = match outcome {
            Err(spawn_err) => {
                error!(stage = %descriptor.name, error = %spawn_err, "stage body could not be spawned");
                StageResult::failed(
                    None,
                    ResultCause::SpawnFailure {
                        message: spawn_err.to_string(),
                    },
                    invocation.log_path.clone(),
                    duration,
                )
            }
            Ok(BodyOutcome::TimedOut) => {
                error!(
                    stage = %descriptor.name,
                    timeout_secs = self.config.timeout.as_secs(),
                    "stage timed out; partial artifacts left frozen in place"
                );
                StageResult::failed(
                    None,
                    ResultCause::Timeout,
                    invocation.log_path.clone(),
                    duration,
                )
            }
            Ok(BodyOutcome::Signalled) => {
                error!(stage = %descriptor.name, "stage killed by signal");
                StageResult::failed(
                    None,
                    ResultCause::NonZeroExit,
                    invocation.log_path.clone(),
                    duration,
                )
            }
            Ok(BodyOutcome::Exited(0)) => {
                let missing = self.missing_outputs(descriptor);
                if missing.is_empty() {
                    info!(stage = %descriptor.name, "stage succeeded");
                    StageResult::success(invocation.log_path.clone(), duration)
                } else {
                    warn!(
                        stage = %descriptor.name,
                        missing = ?missing,
                        "stage exited 0 but declared outputs are missing; downgraded"
                    );
                    StageResult::degraded(
                        0,
                        ResultCause::IncompleteOutputs { missing },
                        invocation.log_path.clone(),
                        duration,
                    )
                }
            }
            Ok(BodyOutcome::Exited(2)) => {
                warn!(stage = %descriptor.name, "stage declared its result provisional");
                StageResult::degraded(
                    2,
                    ResultCause::Provisional,
                    invocation.log_path.clone(),
                    duration,
                )
            }
            Ok(BodyOutcome::Exited(code)) => {
                error!(stage = %descriptor.name, code, "stage failed");
                StageResult::failed(
                    Some(code),
                    ResultCause::NonZeroExit,
                    invocation.log_path.clone(),
                    duration,
                )
            }
        };

        Ok(result)
    }

    /// Runs the stage's declared self-check, if any, without touching
    /// input or output areas.
    pub async fn self_check(
        &self,
        descriptor: &StageDescriptor,
    ) -> Result<Option<SelfCheckResult>> {
        let Some(command) = descriptor.manifest.self_check.clone() else {
            return Ok(None);
        };

        let invocation = StageInvocation {
            stage: descriptor.name.clone(),
            command,
            working_dir: descriptor.working_dir.clone(),
            input_dir: None,
            output_dir: None,
            log_path: self
                .config
                .logs_dir
                .join(format!("{}.check.log", descriptor.name)),
        };

        debug!(stage = %descriptor.name, "running self-check");
        let outcome = self
            .body
            .invoke(&invocation, self.config.timeout)
            .await
            .map_err(StagecraftError::Io)?;

        Ok(Some(SelfCheckResult {
            passed: outcome == BodyOutcome::Exited(0),
            log: invocation.log_path,
        }))
    }

    /// Resolves the stage's input area: the predecessor's frozen output,
    /// or for the first stage the external seed / checked-in inputs.
    fn resolve_input(&self, descriptor: &StageDescriptor) -> Result<Option<PathBuf>> {
        match self.registry.predecessor(&descriptor.name)? {
            Some(predecessor) => {
                let area = self.store.area_for(&predecessor.name);
                if !area.exists() {
                    return Err(StagecraftError::missing_dependency(
                        &descriptor.name,
                        &predecessor.name,
                        "absent",
                    ));
                }
                if !area.has_output() {
                    return Err(StagecraftError::missing_dependency(
                        &descriptor.name,
                        &predecessor.name,
                        "empty",
                    ));
                }
                Ok(Some(area.path().to_path_buf()))
            }
            None => Ok(self
                .config
                .seed_dir
                .clone()
                .or_else(|| self.store.input_dir(&descriptor.name))),
        }
    }

    /// Declared outputs missing or empty in the stage's artifact area.
    fn missing_outputs(&self, descriptor: &StageDescriptor) -> Vec<String> {
        let area = self.store.area_for(&descriptor.name);
        descriptor
            .manifest
            .required_outputs
            .iter()
            .filter(|name| !area.contains(name))
            .cloned()
            .collect()
    }
}
