//! Run report aggregation.

use super::{StageResult, StageStatus};
use serde::{Deserialize, Serialize};

/// The cumulative account of one pipeline invocation.
///
/// Holds one entry per stage actually attempted, in execution order.
/// Stages after a halt point never appear. The report is owned by the
/// controller for the lifetime of one invocation and is not carried
/// between invocations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// (stage name, result) pairs, insertion-ordered.
    pub ordered_results: Vec<(String, StageResult)>,
    /// Stages whose bodies never ran because their inputs could not be
    /// resolved, with the reason.
    pub skipped: Vec<(String, String)>,
    /// The stage where the run stopped, set only when later stages in
    /// the selected window were left unattempted.
    pub halted_at: Option<String>,
    /// When the invocation started (ISO 8601).
    pub started_at: String,
}

impl RunReport {
    /// Creates an empty report stamped with the current time.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ordered_results: Vec::new(),
            skipped: Vec::new(),
            halted_at: None,
            started_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Appends the result of an attempted stage.
    pub fn record(&mut self, stage: impl Into<String>, result: StageResult) {
        self.ordered_results.push((stage.into(), result));
    }

    /// Records a stage whose body never ran, with the reason.
    pub fn skip(&mut self, stage: impl Into<String>, reason: impl Into<String>) {
        self.skipped.push((stage.into(), reason.into()));
    }

    /// Marks the stage that halted the run.
    pub fn halt_at(&mut self, stage: impl Into<String>) {
        self.halted_at = Some(stage.into());
    }

    /// Returns true if nothing has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ordered_results.is_empty() && self.skipped.is_empty()
    }

    /// Returns true if every recorded stage ran without failing and
    /// none was skipped.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.skipped.is_empty()
            && self
                .ordered_results
                .iter()
                .all(|(_, r)| !r.status.is_failure())
    }

    /// The first stage that failed or was skipped, if any.
    #[must_use]
    pub fn first_failed_stage(&self) -> Option<&str> {
        self.ordered_results
            .iter()
            .find(|(_, r)| r.status.is_failure())
            .map(|(name, _)| name.as_str())
            .or_else(|| self.skipped.first().map(|(name, _)| name.as_str()))
    }

    /// Names of stages that finished Degraded, with their causes.
    #[must_use]
    pub fn degraded_stages(&self) -> Vec<(&str, Option<&super::ResultCause>)> {
        self.ordered_results
            .iter()
            .filter(|(_, r)| r.status == StageStatus::Degraded)
            .map(|(name, r)| (name.as_str(), r.cause.as_ref()))
            .collect()
    }

    /// The result of the last attempted stage, if any stage ran.
    #[must_use]
    pub fn last_result(&self) -> Option<&(String, StageResult)> {
        self.ordered_results.last()
    }
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}
