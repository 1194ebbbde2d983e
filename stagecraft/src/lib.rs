//! # Stagecraft
//!
//! A staged execution engine with an authenticity gate.
//!
//! Stagecraft runs a named, ordered sequence of processing stages. Each
//! stage is an opaque external program that consumes the artifacts of
//! the stage before it and leaves new artifacts for the stage after it:
//!
//! - **Registry**: stage directories (`02_dataset_preparation`, ...)
//!   scanned once into an immutable ordered table
//! - **Artifact store**: per-stage `output/` areas, frozen once the
//!   owning stage finishes and shared by reference downstream
//! - **Runner**: spawns stage bodies, captures their streams, enforces
//!   timeouts, and classifies exits into Success / Degraded / Failed
//! - **Controller**: ordered (or windowed) execution with halt-on-failure
//!   and a read-only status projection
//! - **Authenticity gate**: post-hoc audit that certifies artifacts are
//!   real computed results rather than placeholder content
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use stagecraft::prelude::*;
//! use std::sync::Arc;
//!
//! let config = EngineConfig::load("steps")?;
//! let registry = Arc::new(StageRegistry::scan(&config.root)?);
//! let controller = PipelineController::new(Arc::clone(&registry), config);
//! let report = controller.execute(&StageRange::full()).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod audit;
pub mod cli;
pub mod config;
pub mod controller;
pub mod core;
pub mod errors;
pub mod registry;
pub mod runner;
pub mod store;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::audit::{
        AuthenticityGate, AuthenticityVerdict, CheckKind, Finding, RuleCatalogue, Severity,
    };
    pub use crate::config::{EngineConfig, ExecutionMode};
    pub use crate::controller::{PipelineController, SelfCheckReport};
    pub use crate::core::{ResultCause, RunReport, StageResult, StageState, StageStatus};
    pub use crate::errors::{Result, StagecraftError};
    pub use crate::registry::{StageDescriptor, StageManifest, StageRange, StageRegistry};
    pub use crate::runner::{CommandStageBody, StageBody, StageRunner};
    pub use crate::store::{ArtifactArea, ArtifactStore};
}
