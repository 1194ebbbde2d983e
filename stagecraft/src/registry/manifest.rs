//! Typed stage manifest (`stage.json`).
//!
//! The manifest is the stage's declared contract with the engine: which
//! artifacts it must produce, how to invoke it, and optional hooks for
//! self-checks and the audit's complexity heuristic. A missing manifest
//! is legal and yields defaults.

use crate::errors::{Result, StagecraftError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Filename of the per-stage manifest inside the working directory.
pub const MANIFEST_FILE: &str = "stage.json";

/// Default entrypoint when the manifest does not name one. Invoked
/// through the shell, so the script needs no execute bit.
pub const DEFAULT_ENTRYPOINT: &str = "sh run.sh";

/// Declared contract of one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct StageManifest {
    /// Command run as the stage body, relative to the working directory.
    pub entrypoint: String,
    /// Artifact names the stage must leave, non-empty, in its output
    /// area for its completion to count as full Success.
    pub required_outputs: Vec<String>,
    /// Optional self-check command for the `test` verb. Self-checks do
    /// not mutate pipeline state.
    pub self_check: Option<String>,
    /// Optional algorithm category consulted by the audit's complexity
    /// heuristic (e.g. "statistics", "llm_generation").
    pub category: Option<String>,
    /// Free-form description, surfaced in status output.
    pub description: Option<String>,
}

impl Default for StageManifest {
    fn default() -> Self {
        Self {
            entrypoint: DEFAULT_ENTRYPOINT.to_string(),
            required_outputs: Vec::new(),
            self_check: None,
            category: None,
            description: None,
        }
    }
}

impl StageManifest {
    /// Loads the manifest from a stage working directory, falling back
    /// to defaults when no `stage.json` is present.
    pub fn load(stage: &str, working_dir: &Path) -> Result<Self> {
        let path = working_dir.join(MANIFEST_FILE);
        if !path.is_file() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(&path)?;
        serde_json::from_str(&raw).map_err(|source| StagecraftError::Manifest {
            stage: stage.to_string(),
            source,
        })
    }
}
