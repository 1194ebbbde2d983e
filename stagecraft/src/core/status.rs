//! Stage status, result cause, and classified stage results.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// The classified outcome of one stage execution.
///
/// Stage bodies signal their outcome through the exit-code convention
/// (0 success, 2 degraded, anything else failure); the runner folds that
/// signal together with output verification into this enum so downstream
/// logic branches on meaning, not magic numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Stage completed and produced every declared output.
    Success,
    /// Stage ran and produced usable output, but the result is
    /// provisional or incomplete. The pipeline continues.
    Degraded,
    /// Stage crashed, timed out, or exited with an unexpected code.
    /// The pipeline halts unless running in best-effort mode.
    Failed,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Degraded => write!(f, "degraded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl StageStatus {
    /// Returns true if the pipeline may advance past this result.
    #[must_use]
    pub fn allows_continuation(&self) -> bool {
        matches!(self, Self::Success | Self::Degraded)
    }

    /// Returns true if this result halts the run.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

/// Why a stage was classified Degraded or Failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ResultCause {
    /// Exit 0 but one or more declared outputs are missing or empty.
    IncompleteOutputs {
        /// Names of the missing or empty outputs.
        missing: Vec<String>,
    },
    /// Exit 2: the stage itself declared its result provisional.
    Provisional,
    /// The stage body exceeded its allotted time and was killed.
    Timeout,
    /// The stage body could not be spawned at all.
    SpawnFailure {
        /// The spawn error text.
        message: String,
    },
    /// The stage body exited with a code outside the 0/2 convention,
    /// or was killed by a signal (no code).
    NonZeroExit,
}

impl fmt::Display for ResultCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IncompleteOutputs { missing } => {
                write!(f, "incomplete outputs: {}", missing.join(", "))
            }
            Self::Provisional => write!(f, "stage declared result provisional"),
            Self::Timeout => write!(f, "timed out"),
            Self::SpawnFailure { message } => write!(f, "spawn failure: {message}"),
            Self::NonZeroExit => write!(f, "unexpected exit status"),
        }
    }
}

/// The immutable record of a single stage execution.
///
/// Created by the runner at the moment the stage body terminates and
/// never mutated afterwards; the controller aggregates these into a
/// [`RunReport`](crate::core::RunReport).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageResult {
    /// The classified status.
    pub status: StageStatus,
    /// The raw exit code, when the body ran to an exit at all.
    pub exit_code: Option<i32>,
    /// Why the status is not Success, when it is not.
    pub cause: Option<ResultCause>,
    /// Captured stdout/stderr, retained for postmortem.
    pub log: PathBuf,
    /// Wall-clock duration of the body.
    #[serde(with = "duration_millis")]
    pub duration: Duration,
}

impl StageResult {
    /// Creates a success result.
    #[must_use]
    pub fn success(log: PathBuf, duration: Duration) -> Self {
        Self {
            status: StageStatus::Success,
            exit_code: Some(0),
            cause: None,
            log,
            duration,
        }
    }

    /// Creates a degraded result with a cause.
    #[must_use]
    pub fn degraded(exit_code: i32, cause: ResultCause, log: PathBuf, duration: Duration) -> Self {
        Self {
            status: StageStatus::Degraded,
            exit_code: Some(exit_code),
            cause: Some(cause),
            log,
            duration,
        }
    }

    /// Creates a failed result.
    #[must_use]
    pub fn failed(
        exit_code: Option<i32>,
        cause: ResultCause,
        log: PathBuf,
        duration: Duration,
    ) -> Self {
        Self {
            status: StageStatus::Failed,
            exit_code,
            cause: Some(cause),
            log,
            duration,
        }
    }
}

/// Read-only projection of a stage's progress, derived purely from its
/// artifact area on disk. Independent of any run report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageState {
    /// No artifact area exists for the stage.
    NotRun,
    /// An artifact area exists but holds no entries.
    Attempted,
    /// An artifact area exists and holds at least one entry.
    CompletedWithOutput,
}

impl fmt::Display for StageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotRun => write!(f, "not_run"),
            Self::Attempted => write!(f, "attempted"),
            Self::CompletedWithOutput => write!(f, "completed_with_output"),
        }
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        u64::try_from(d.as_millis())
            .unwrap_or(u64::MAX)
            .serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let ms = u64::deserialize(d)?;
        Ok(Duration::from_millis(ms))
    }
}
