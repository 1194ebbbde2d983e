//! Pipeline controller.
//!
//! Walks the registry in order (or a caller-selected window), invokes the
//! runner per stage, and aggregates results into a [`RunReport`]. The
//! controller never repairs a failure: it halts the window and surfaces
//! the report, leaving recovery (supplying a credential, fixing code,
//! re-running `--from` the failed stage) to the operator.

use crate::config::{EngineConfig, ExecutionMode};
use crate::core::{RunReport, StageState};
use crate::errors::{Result, StagecraftError};
use crate::registry::{StageRange, StageRegistry};
use crate::runner::{SelfCheckResult, StageRunner};
use crate::store::ArtifactStore;
use std::sync::Arc;
use tracing::{info, warn};

/// Aggregated outcome of the `test` verb.
#[derive(Debug, Clone, Default)]
pub struct SelfCheckReport {
    /// (stage, result) for every stage with a declared self-check.
    pub checks: Vec<(String, SelfCheckResult)>,
    /// Stages without a declared self-check, skipped.
    pub skipped: Vec<String>,
}

impl SelfCheckReport {
    /// True when every declared check passed.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|(_, c)| c.passed)
    }
}

/// Sequential executor over the stage order.
pub struct PipelineController {
    registry: Arc<StageRegistry>,
    store: ArtifactStore,
    runner: StageRunner,
    mode: ExecutionMode,
}

impl PipelineController {
    /// Builds a controller (and its runner) from engine configuration.
    #[must_use]
    pub fn new(registry: Arc<StageRegistry>, config: EngineConfig) -> Self {
        let store = ArtifactStore::new(&config.root);
        let mode = config.mode;
        let runner = StageRunner::new(Arc::clone(&registry), store.clone(), config);
        Self {
            registry,
            store,
            runner,
            mode,
        }
    }

    /// Builds a controller around an existing runner. Intended for tests
    /// that substitute the stage body.
    #[must_use]
    pub fn with_runner(
        registry: Arc<StageRegistry>,
        store: ArtifactStore,
        runner: StageRunner,
        mode: ExecutionMode,
    ) -> Self {
        Self {
            registry,
            store,
            runner,
            mode,
        }
    }

    /// The registry this controller walks.
    #[must_use]
    pub fn registry(&self) -> &StageRegistry {
        &self.registry
    }

    /// Executes the selected window strictly in order.
    ///
    /// On a Failed result no later stage is attempted; `halted_at` is
    /// set only when the failure left stages in the window unattempted,
    /// never on a failure at the window's end. Best-effort mode keeps
    /// attempting every stage instead. A dependency error after at
    /// least one stage has been recorded never discards the report: the
    /// stage is recorded as skipped and the run halts (or, best-effort,
    /// moves on). Only an error before anything ran returns `Err`.
    pub async fn execute(&self, range: &StageRange) -> Result<RunReport> {
        let window = self.registry.slice(range)?;
        let mut report = RunReport::new();

        info!(stages = window.len(), "pipeline invocation started");
        for (position, descriptor) in window.iter().enumerate() {
            let exhausted = position + 1 == window.len();
            match self.runner.run(descriptor).await {
                Ok(result) => {
                    let failed = result.status.is_failure();
                    report.record(&descriptor.name, result);
                    if failed && self.mode == ExecutionMode::HaltOnFailure {
                        if !exhausted {
                            report.halt_at(&descriptor.name);
                            warn!(stage = %descriptor.name, "halting run; later stages not attempted");
                        }
                        break;
                    }
                }
                Err(err @ StagecraftError::MissingDependency { .. }) if !report.is_empty() => {
                    warn!(stage = %descriptor.name, error = %err, "stage skipped; inputs unavailable");
                    report.skip(&descriptor.name, err.to_string());
                    if self.mode == ExecutionMode::HaltOnFailure {
                        if !exhausted {
                            report.halt_at(&descriptor.name);
                        }
                        break;
                    }
                }
                Err(err) => return Err(err),
            }
        }

        Ok(report)
    }

    /// Read-only per-stage progress projection.
    ///
    /// Derived purely from artifact-area existence and occupancy, so it
    /// can be queried without re-running anything and is independent of
    /// any [`RunReport`].
    pub fn status(&self, range: &StageRange) -> Result<Vec<(String, StageState)>> {
        let window = self.registry.slice(range)?;
        Ok(window
            .iter()
            .map(|descriptor| {
                let area = self.store.area_for(&descriptor.name);
                let state = if !area.exists() {
                    StageState::NotRun
                } else if area.has_output() {
                    StageState::CompletedWithOutput
                } else {
                    StageState::Attempted
                };
                (descriptor.name.clone(), state)
            })
            .collect())
    }

    /// Runs every declared self-check in the window. Does not mutate
    /// pipeline state.
    pub async fn self_checks(&self, range: &StageRange) -> Result<SelfCheckReport> {
        let window = self.registry.slice(range)?;
        let mut report = SelfCheckReport::default();
        for descriptor in window {
            match self.runner.self_check(descriptor).await? {
                Some(check) => report.checks.push((descriptor.name.clone(), check)),
                None => report.skipped.push(descriptor.name.clone()),
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StageStatus;
    use crate::registry::{StageDescriptor, StageManifest};
    use crate::runner::{BodyOutcome, StageBody, StageInvocation};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Maps stage name -> (exit code, outputs to write).
    struct PlanBody {
        plan: HashMap<String, (i32, Vec<&'static str>)>,
    }

    #[async_trait]
    impl StageBody for PlanBody {
        async fn invoke(
            &self,
            invocation: &StageInvocation,
            _timeout: Duration,
        ) -> std::io::Result<BodyOutcome> {
            let (exit, outputs) = match self.plan.get(&invocation.stage) {
                Some((exit, outputs)) => (*exit, outputs.clone()),
                None => (0, Vec::new()),
            };
            if let Some(dir) = &invocation.output_dir {
                for name in outputs {
                    std::fs::write(dir.join(name), b"data")?;
                }
            }
            Ok(BodyOutcome::Exited(exit))
        }
    }

    fn descriptor(root: &TempDir, name: &str) -> StageDescriptor {
        let working_dir = root.path().join(name);
        std::fs::create_dir_all(&working_dir).unwrap();
        let (prefix, _) = name.split_once('_').unwrap();
        StageDescriptor {
            name: name.to_string(),
            ordinal: prefix.parse().unwrap(),
            working_dir,
            manifest: StageManifest::default(),
        }
    }

    fn controller(
        root: &TempDir,
        names: &[&str],
        plan: HashMap<String, (i32, Vec<&'static str>)>,
        mode: ExecutionMode,
    ) -> PipelineController {
        let stages = names.iter().map(|n| descriptor(root, n)).collect();
        let registry = Arc::new(StageRegistry::from_descriptors(stages));
        let store = ArtifactStore::new(root.path());
        let config = EngineConfig::defaults(root.path()).with_mode(mode);
        let runner = StageRunner::with_body(
            Arc::clone(&registry),
            store.clone(),
            config,
            Arc::new(PlanBody { plan }),
        );
        PipelineController::with_runner(registry, store, runner, mode)
    }

    fn plan(entries: &[(&str, i32, &[&'static str])]) -> HashMap<String, (i32, Vec<&'static str>)> {
        entries
            .iter()
            .map(|(name, exit, outputs)| ((*name).to_string(), (*exit, outputs.to_vec())))
            .collect()
    }

    #[tokio::test]
    async fn test_full_run_success() {
        let root = TempDir::new().unwrap();
        let ctl = controller(
            &root,
            &["02_a", "03_b"],
            plan(&[("02_a", 0, &["a.json"]), ("03_b", 0, &["b.json"])]),
            ExecutionMode::HaltOnFailure,
        );
        let report = ctl.execute(&StageRange::full()).await.unwrap();
        assert!(report.is_success());
        assert!(report.halted_at.is_none());
        assert_eq!(report.ordered_results.len(), 2);
    }

    #[tokio::test]
    async fn test_halt_on_failure_skips_later_stages() {
        // A succeeds, B is killed (137), C never attempted.
        let root = TempDir::new().unwrap();
        let ctl = controller(
            &root,
            &["02_a", "03_b", "04_c"],
            plan(&[
                ("02_a", 0, &["a.json"]),
                ("03_b", 137, &["partial.json"]),
                ("04_c", 0, &["c.json"]),
            ]),
            ExecutionMode::HaltOnFailure,
        );
        let report = ctl.execute(&StageRange::full()).await.unwrap();
        assert_eq!(report.ordered_results.len(), 2);
        assert_eq!(report.ordered_results[0].1.status, StageStatus::Success);
        assert_eq!(report.ordered_results[1].1.status, StageStatus::Failed);
        assert_eq!(report.halted_at.as_deref(), Some("03_b"));
        assert!(!report.is_success());
    }

    #[tokio::test]
    async fn test_degraded_stage_does_not_halt() {
        let root = TempDir::new().unwrap();
        let ctl = controller(
            &root,
            &["02_a", "03_b"],
            plan(&[("02_a", 2, &["partial.json"]), ("03_b", 0, &["b.json"])]),
            ExecutionMode::HaltOnFailure,
        );
        let report = ctl.execute(&StageRange::full()).await.unwrap();
        assert_eq!(report.ordered_results.len(), 2);
        assert_eq!(report.ordered_results[0].1.status, StageStatus::Degraded);
        assert!(report.halted_at.is_none());
        assert!(report.is_success());
    }

    #[tokio::test]
    async fn test_best_effort_keeps_going() {
        let root = TempDir::new().unwrap();
        // 03_b fails but writes output, so 04_c's dependency check passes.
        let ctl = controller(
            &root,
            &["02_a", "03_b", "04_c"],
            plan(&[
                ("02_a", 0, &["a.json"]),
                ("03_b", 1, &["b.json"]),
                ("04_c", 0, &["c.json"]),
            ]),
            ExecutionMode::BestEffort,
        );
        let report = ctl.execute(&StageRange::full()).await.unwrap();
        assert_eq!(report.ordered_results.len(), 3);
        assert_eq!(report.first_failed_stage(), Some("03_b"));
        // Every stage in the window was attempted, so no halt point.
        assert!(report.halted_at.is_none());
        assert!(!report.is_success());
    }

    #[tokio::test]
    async fn test_failure_at_final_stage_leaves_halted_at_unset() {
        // Nothing after the failure was left unattempted.
        let root = TempDir::new().unwrap();
        let ctl = controller(
            &root,
            &["02_a", "03_b"],
            plan(&[("02_a", 0, &["a.json"]), ("03_b", 1, &["b.json"])]),
            ExecutionMode::HaltOnFailure,
        );
        let report = ctl.execute(&StageRange::full()).await.unwrap();
        assert_eq!(report.ordered_results.len(), 2);
        assert_eq!(report.ordered_results[1].1.status, StageStatus::Failed);
        assert_eq!(report.halted_at, None);
        assert!(!report.is_success());
    }

    #[tokio::test]
    async fn test_best_effort_records_skip_after_empty_failure() {
        // 03_b fails leaving its area empty, so 04_c's dependency check
        // cannot pass; the report must still carry A's and B's results.
        let root = TempDir::new().unwrap();
        let ctl = controller(
            &root,
            &["02_a", "03_b", "04_c"],
            plan(&[
                ("02_a", 0, &["a.json"]),
                ("03_b", 1, &[]),
                ("04_c", 0, &["c.json"]),
            ]),
            ExecutionMode::BestEffort,
        );
        let report = ctl.execute(&StageRange::full()).await.unwrap();
        assert_eq!(report.ordered_results.len(), 2);
        assert_eq!(report.ordered_results[0].1.status, StageStatus::Success);
        assert_eq!(report.ordered_results[1].1.status, StageStatus::Failed);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].0, "04_c");
        assert!(report.skipped[0].1.contains("empty"));
        assert!(report.halted_at.is_none());
    }

    #[tokio::test]
    async fn test_mid_window_dependency_skip_halts_with_report() {
        // 02_a exits 2 without writing anything, so it is Degraded and
        // the run continues, but 03_b's inputs cannot be resolved.
        let root = TempDir::new().unwrap();
        let ctl = controller(
            &root,
            &["02_a", "03_b", "04_c"],
            plan(&[("02_a", 2, &[]), ("03_b", 0, &["b.json"])]),
            ExecutionMode::HaltOnFailure,
        );
        let report = ctl.execute(&StageRange::full()).await.unwrap();
        assert_eq!(report.ordered_results.len(), 1);
        assert_eq!(report.ordered_results[0].1.status, StageStatus::Degraded);
        assert_eq!(report.skipped[0].0, "03_b");
        assert_eq!(report.halted_at.as_deref(), Some("03_b"));
    }

    #[tokio::test]
    async fn test_status_projection() {
        let root = TempDir::new().unwrap();
        let ctl = controller(
            &root,
            &["02_a", "03_b", "04_c"],
            plan(&[("02_a", 0, &["a.json"]), ("03_b", 0, &[])]),
            ExecutionMode::HaltOnFailure,
        );

        let before = ctl.status(&StageRange::full()).unwrap();
        assert!(before.iter().all(|(_, s)| *s == StageState::NotRun));

        // Run A then B; B produces nothing so C is never reached.
        ctl.execute(&StageRange::bounded(None, Some("02_a".into())))
            .await
            .unwrap();
        ctl.execute(&StageRange::single("03_b")).await.unwrap();

        let after = ctl.status(&StageRange::full()).unwrap();
        assert_eq!(
            after,
            vec![
                ("02_a".to_string(), StageState::CompletedWithOutput),
                ("03_b".to_string(), StageState::Attempted),
                ("04_c".to_string(), StageState::NotRun),
            ]
        );
    }

    #[tokio::test]
    async fn test_single_stage_window_uses_frozen_predecessor() {
        let root = TempDir::new().unwrap();
        let ctl = controller(
            &root,
            &["02_a", "03_b"],
            plan(&[("02_a", 0, &["a.json"]), ("03_b", 0, &["b.json"])]),
            ExecutionMode::HaltOnFailure,
        );

        // First invocation runs only A; second invocation runs only B and
        // must resolve its input from A's frozen area.
        ctl.execute(&StageRange::single("02_a")).await.unwrap();
        let report = ctl.execute(&StageRange::single("03_b")).await.unwrap();
        assert!(report.is_success());
        assert_eq!(report.ordered_results.len(), 1);
    }

    #[tokio::test]
    async fn test_single_stage_window_without_predecessor_output() {
        let root = TempDir::new().unwrap();
        let ctl = controller(
            &root,
            &["02_a", "03_b"],
            plan(&[("03_b", 0, &["b.json"])]),
            ExecutionMode::HaltOnFailure,
        );
        let err = ctl.execute(&StageRange::single("03_b")).await.unwrap_err();
        assert!(matches!(
            err,
            crate::errors::StagecraftError::MissingDependency { .. }
        ));
    }

    #[tokio::test]
    async fn test_unknown_stage_in_range() {
        let root = TempDir::new().unwrap();
        let ctl = controller(
            &root,
            &["02_a"],
            plan(&[]),
            ExecutionMode::HaltOnFailure,
        );
        assert!(ctl.execute(&StageRange::single("09_zz")).await.is_err());
    }
}
