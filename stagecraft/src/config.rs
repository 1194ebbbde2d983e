//! Engine configuration.
//!
//! Settings layer as: built-in defaults, then an optional
//! `stagecraft.json` next to the pipeline root, then CLI overrides.

use crate::errors::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default per-stage timeout in seconds. Generous on purpose; stage
/// bodies call external services and crunch datasets.
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Name of the optional configuration overlay file.
pub const CONFIG_FILE: &str = "stagecraft.json";

/// How the controller reacts to a Failed stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Stop advancing at the first Failed stage (default).
    HaltOnFailure,
    /// Attempt every stage in the window; later stages may still fail
    /// their own dependency checks.
    BestEffort,
}

impl Default for ExecutionMode {
    fn default() -> Self {
        Self::HaltOnFailure
    }
}

/// Resolved engine settings for one invocation.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Pipeline root holding the stage working directories.
    pub root: PathBuf,
    /// Directory for captured stage logs. Retained indefinitely.
    pub logs_dir: PathBuf,
    /// Externally supplied seed inputs for the first stage.
    pub seed_dir: Option<PathBuf>,
    /// Per-stage timeout; the only cancellation mechanism.
    pub timeout: Duration,
    /// Halt policy.
    pub mode: ExecutionMode,
}

/// On-disk shape of `stagecraft.json`. Every field optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
struct ConfigFile {
    logs_dir: Option<PathBuf>,
    seed_dir: Option<PathBuf>,
    timeout_secs: Option<u64>,
    mode: Option<ExecutionMode>,
}

impl EngineConfig {
    /// Defaults for a pipeline root, folding in `stagecraft.json` when
    /// one sits next to the root.
    pub fn load(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let mut config = Self::defaults(&root);

        let overlay_path = root.join(CONFIG_FILE);
        if overlay_path.is_file() {
            let raw = fs::read_to_string(&overlay_path)?;
            let overlay: ConfigFile = serde_json::from_str(&raw).map_err(|e| {
                crate::errors::StagecraftError::registry_load(
                    &root,
                    format!("invalid {CONFIG_FILE}: {e}"),
                )
            })?;
            if let Some(logs) = overlay.logs_dir {
                config.logs_dir = root.join(logs);
            }
            if let Some(seed) = overlay.seed_dir {
                config.seed_dir = Some(root.join(seed));
            }
            if let Some(secs) = overlay.timeout_secs {
                config.timeout = Duration::from_secs(secs);
            }
            if let Some(mode) = overlay.mode {
                config.mode = mode;
            }
        }

        Ok(config)
    }

    /// Built-in defaults for a pipeline root.
    #[must_use]
    pub fn defaults(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            logs_dir: root.join("logs"),
            seed_dir: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            mode: ExecutionMode::default(),
        }
    }

    /// Sets the per-stage timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the halt policy.
    #[must_use]
    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the seed input directory for the first stage.
    #[must_use]
    pub fn with_seed_dir(mut self, seed: impl Into<PathBuf>) -> Self {
        self.seed_dir = Some(seed.into());
        self
    }

    /// Sets the log directory.
    #[must_use]
    pub fn with_logs_dir(mut self, logs: impl Into<PathBuf>) -> Self {
        self.logs_dir = logs.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::defaults(Path::new("steps"));
        assert_eq!(config.logs_dir, Path::new("steps").join("logs"));
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(config.mode, ExecutionMode::HaltOnFailure);
        assert!(config.seed_dir.is_none());
    }

    #[test]
    fn test_overlay_file() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{"timeout_secs": 30, "mode": "best_effort", "logs_dir": "run_logs"}"#,
        )
        .unwrap();
        let config = EngineConfig::load(dir.path()).unwrap();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.mode, ExecutionMode::BestEffort);
        assert_eq!(config.logs_dir, dir.path().join("run_logs"));
    }

    #[test]
    fn test_invalid_overlay_is_an_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "{bad").unwrap();
        assert!(EngineConfig::load(dir.path()).is_err());
    }

    #[test]
    fn test_builder_overrides() {
        let config = EngineConfig::defaults(Path::new("steps"))
            .with_timeout(Duration::from_secs(5))
            .with_mode(ExecutionMode::BestEffort)
            .with_seed_dir("seed");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.mode, ExecutionMode::BestEffort);
        assert_eq!(config.seed_dir.as_deref(), Some(Path::new("seed")));
    }
}
