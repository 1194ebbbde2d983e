//! Error types for the stagecraft engine.
//!
//! Configuration and sequencing problems (unknown stage names, invalid
//! ranges, missing predecessor artifacts) are errors; a stage body that
//! runs and fails is *data* (`StageResult`), not an error, so the
//! controller can record it and apply its halt policy.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for stagecraft operations.
#[derive(Debug, Error)]
pub enum StagecraftError {
    /// A stage name was requested that is not present in the registry.
    #[error("unknown stage '{name}'")]
    UnknownStage {
        /// The requested stage name.
        name: String,
    },

    /// A range's `from` stage sorts after its `to` stage.
    #[error("invalid range: '{from}' comes after '{to}' in registry order")]
    InvalidRange {
        /// The requested lower bound.
        from: String,
        /// The requested upper bound.
        to: String,
    },

    /// A stage's predecessor produced no usable artifacts.
    #[error(
        "missing dependency for stage '{stage}': artifact area of '{predecessor}' is {reason}"
    )]
    MissingDependency {
        /// The stage whose inputs could not be resolved.
        stage: String,
        /// The predecessor stage that should have produced them.
        predecessor: String,
        /// Why resolution failed ("absent" or "empty").
        reason: String,
    },

    /// The registry could not be built from the pipeline root.
    #[error("registry load failed at {root}: {reason}")]
    RegistryLoad {
        /// The pipeline root that was scanned.
        root: PathBuf,
        /// Human-readable cause.
        reason: String,
    },

    /// A stage manifest could not be parsed.
    #[error("invalid manifest for stage '{stage}': {source}")]
    Manifest {
        /// The stage whose manifest is invalid.
        stage: String,
        /// The underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// An audit rule failed to compile.
    #[error("audit rule error: {0}")]
    Rule(#[from] regex::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StagecraftError {
    /// Creates an unknown-stage error.
    #[must_use]
    pub fn unknown_stage(name: impl Into<String>) -> Self {
        Self::UnknownStage { name: name.into() }
    }

    /// Creates a missing-dependency error.
    #[must_use]
    pub fn missing_dependency(
        stage: impl Into<String>,
        predecessor: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::MissingDependency {
            stage: stage.into(),
            predecessor: predecessor.into(),
            reason: reason.into(),
        }
    }

    /// Creates a registry-load error.
    #[must_use]
    pub fn registry_load(root: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::RegistryLoad {
            root: root.into(),
            reason: reason.into(),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StagecraftError>;
