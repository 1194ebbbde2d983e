//! Audit findings and the overall verdict.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Which of the gate's five checks produced a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    /// Placeholder signature scan over stage source.
    PatternScan,
    /// Resolution of external references inside stage code.
    CrossReference,
    /// Full pipeline execution result.
    ExecutionCheck,
    /// Adjacent-stage artifact flow heuristic.
    FlowCheck,
    /// Category vocabulary coverage heuristic.
    ComplexityCheck,
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PatternScan => write!(f, "pattern_scan"),
            Self::CrossReference => write!(f, "cross_reference"),
            Self::ExecutionCheck => write!(f, "execution_check"),
            Self::FlowCheck => write!(f, "flow_check"),
            Self::ComplexityCheck => write!(f, "complexity_check"),
        }
    }
}

/// Whether a finding blocks the verdict or merely asks for human review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Unambiguous authenticity violation; fails the verdict.
    Fatal,
    /// Heuristic, prone to false positives; surfaced for review only.
    Advisory,
}

/// One recorded audit observation with stage and file attribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// The check that produced this finding.
    pub check: CheckKind,
    /// Fatal or advisory.
    pub severity: Severity,
    /// The stage the finding is attributed to.
    pub stage: String,
    /// The file the finding is attributed to, when one applies.
    pub file: Option<PathBuf>,
    /// Human-readable description of what was observed.
    pub detail: String,
}

impl Finding {
    /// Creates a fatal finding.
    #[must_use]
    pub fn fatal(check: CheckKind, stage: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            check,
            severity: Severity::Fatal,
            stage: stage.into(),
            file: None,
            detail: detail.into(),
        }
    }

    /// Creates an advisory finding.
    #[must_use]
    pub fn advisory(check: CheckKind, stage: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            check,
            severity: Severity::Advisory,
            stage: stage.into(),
            file: None,
            detail: detail.into(),
        }
    }

    /// Attaches file attribution.
    #[must_use]
    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }
}

/// The gate's output: every finding plus the overall pass/fail.
///
/// Created fresh on every gate invocation and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticityVerdict {
    /// All findings from all checks, in check order.
    pub findings: Vec<Finding>,
    /// Pass iff no fatal finding was recorded.
    pub pass: bool,
    /// When the audit ran (ISO 8601).
    pub audited_at: String,
}

impl AuthenticityVerdict {
    /// Seals a finding list into a verdict.
    #[must_use]
    pub fn from_findings(findings: Vec<Finding>) -> Self {
        let pass = !findings.iter().any(|f| f.severity == Severity::Fatal);
        Self {
            findings,
            pass,
            audited_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Findings recorded by one check.
    #[must_use]
    pub fn findings_for(&self, check: CheckKind) -> Vec<&Finding> {
        self.findings.iter().filter(|f| f.check == check).collect()
    }

    /// Count of fatal findings.
    #[must_use]
    pub fn fatal_count(&self) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Fatal)
            .count()
    }

    /// Count of advisory findings.
    #[must_use]
    pub fn advisory_count(&self) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Advisory)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_with_only_advisory_findings() {
        let verdict = AuthenticityVerdict::from_findings(vec![Finding::advisory(
            CheckKind::FlowCheck,
            "03_b",
            "no textual input/output engagement",
        )]);
        assert!(verdict.pass);
        assert_eq!(verdict.advisory_count(), 1);
        assert_eq!(verdict.fatal_count(), 0);
    }

    #[test]
    fn test_fail_with_fatal_finding() {
        let verdict = AuthenticityVerdict::from_findings(vec![
            Finding::fatal(CheckKind::PatternScan, "02_a", "mock-literal-return")
                .with_file("02_a/run.py"),
            Finding::advisory(CheckKind::ComplexityCheck, "02_a", "vocabulary below threshold"),
        ]);
        assert!(!verdict.pass);
        assert_eq!(verdict.findings_for(CheckKind::PatternScan).len(), 1);
    }

    #[test]
    fn test_empty_findings_pass() {
        let verdict = AuthenticityVerdict::from_findings(Vec::new());
        assert!(verdict.pass);
    }

    #[test]
    fn test_check_kind_display() {
        assert_eq!(CheckKind::PatternScan.to_string(), "pattern_scan");
        assert_eq!(CheckKind::FlowCheck.to_string(), "flow_check");
    }
}
