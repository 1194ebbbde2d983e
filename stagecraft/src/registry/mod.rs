//! Stage descriptor registry.
//!
//! The registry is a static, load-once table built by scanning the
//! pipeline root for ordinal-prefixed stage directories (`02_dataset_prep`,
//! `03_api_config`, ...). Ordering is total and equals execution order.
//! After [`StageRegistry::scan`] the registry performs no further I/O and
//! is immutable for the duration of a run.

mod manifest;

pub use manifest::{StageManifest, DEFAULT_ENTRYPOINT, MANIFEST_FILE};

use crate::errors::{Result, StagecraftError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Identity of one pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDescriptor {
    /// Unique ordinal-prefixed identifier, e.g. `04_query_generation`.
    pub name: String,
    /// Numeric prefix; stage execution order equals ordinal order.
    pub ordinal: u32,
    /// Location of stage-private code and its input/output areas.
    pub working_dir: PathBuf,
    /// The stage's declared contract.
    pub manifest: StageManifest,
}

impl StageDescriptor {
    /// The command that runs the stage body.
    #[must_use]
    pub fn entrypoint(&self) -> &str {
        &self.manifest.entrypoint
    }
}

/// A caller-selected contiguous window of the stage order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageRange {
    /// Lower bound (inclusive); defaults to the first stage.
    pub from: Option<String>,
    /// Upper bound (inclusive); defaults to the last stage.
    pub to: Option<String>,
}

impl StageRange {
    /// The full stage order.
    #[must_use]
    pub fn full() -> Self {
        Self::default()
    }

    /// A window of exactly one stage.
    #[must_use]
    pub fn single(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            from: Some(name.clone()),
            to: Some(name),
        }
    }

    /// A bounded window; either bound may be omitted.
    #[must_use]
    pub fn bounded(from: Option<String>, to: Option<String>) -> Self {
        Self { from, to }
    }
}

/// The ordered, immutable table of stage descriptors.
#[derive(Debug, Clone)]
pub struct StageRegistry {
    stages: Vec<StageDescriptor>,
}

impl StageRegistry {
    /// Builds the registry by scanning the pipeline root.
    ///
    /// Every directory named `NN_slug` becomes a stage; anything else
    /// (the log directory, loose files) is ignored. Duplicate ordinals
    /// are a load error since they would make execution order ambiguous.
    pub fn scan(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(StagecraftError::registry_load(
                root,
                "pipeline root is not a directory",
            ));
        }

        let mut stages = Vec::new();
        for entry in fs::read_dir(root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(String::from) else {
                continue;
            };
            let Some(ordinal) = parse_ordinal(&name) else {
                continue;
            };
            let working_dir = entry.path();
            let manifest = StageManifest::load(&name, &working_dir)?;
            stages.push(StageDescriptor {
                name,
                ordinal,
                working_dir,
                manifest,
            });
        }

        stages.sort_by(|a, b| a.ordinal.cmp(&b.ordinal).then_with(|| a.name.cmp(&b.name)));

        for pair in stages.windows(2) {
            if pair[0].ordinal == pair[1].ordinal {
                return Err(StagecraftError::registry_load(
                    root,
                    format!(
                        "stages '{}' and '{}' share ordinal {}",
                        pair[0].name, pair[1].name, pair[0].ordinal
                    ),
                ));
            }
        }

        if stages.is_empty() {
            return Err(StagecraftError::registry_load(
                root,
                "no stage directories found (expected NN_name)",
            ));
        }

        Ok(Self { stages })
    }

    /// Builds a registry directly from descriptors. Ordering is taken
    /// as given; intended for tests and embedders.
    #[must_use]
    pub fn from_descriptors(stages: Vec<StageDescriptor>) -> Self {
        Self { stages }
    }

    /// The full ordered stage sequence.
    #[must_use]
    pub fn stages(&self) -> &[StageDescriptor] {
        &self.stages
    }

    /// Number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns true if the registry holds no stages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Looks up a stage by name.
    pub fn find(&self, name: &str) -> Result<&StageDescriptor> {
        self.stages
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| StagecraftError::unknown_stage(name))
    }

    /// Position of a stage in the execution order.
    pub fn index_of(&self, name: &str) -> Result<usize> {
        self.stages
            .iter()
            .position(|s| s.name == name)
            .ok_or_else(|| StagecraftError::unknown_stage(name))
    }

    /// The immediate predecessor of a stage, if it has one.
    pub fn predecessor(&self, name: &str) -> Result<Option<&StageDescriptor>> {
        let idx = self.index_of(name)?;
        Ok(idx.checked_sub(1).map(|i| &self.stages[i]))
    }

    /// Restricts the stage order to a contiguous window. Never reorders.
    pub fn slice(&self, range: &StageRange) -> Result<&[StageDescriptor]> {
        let from = match &range.from {
            Some(name) => self.index_of(name)?,
            None => 0,
        };
        let to = match &range.to {
            Some(name) => self.index_of(name)?,
            None => self.stages.len() - 1,
        };
        if from > to {
            return Err(StagecraftError::InvalidRange {
                from: self.stages[from].name.clone(),
                to: self.stages[to].name.clone(),
            });
        }
        Ok(&self.stages[from..=to])
    }
}

/// Parses the `NN` ordinal prefix out of a directory name.
fn parse_ordinal(name: &str) -> Option<u32> {
    let (prefix, rest) = name.split_once('_')?;
    if rest.is_empty() {
        return None;
    }
    prefix.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn make_pipeline(names: &[&str]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for name in names {
            fs::create_dir_all(dir.path().join(name)).unwrap();
        }
        dir
    }

    #[test]
    fn test_parse_ordinal() {
        assert_eq!(parse_ordinal("02_dataset_preparation"), Some(2));
        assert_eq!(parse_ordinal("10_report"), Some(10));
        assert_eq!(parse_ordinal("logs"), None);
        assert_eq!(parse_ordinal("02_"), None);
        assert_eq!(parse_ordinal("x_name"), None);
    }

    #[test]
    fn test_scan_orders_by_ordinal() {
        let dir = make_pipeline(&["04_query_generation", "02_dataset_preparation", "03_api_configuration", "logs"]);
        let registry = StageRegistry::scan(dir.path()).unwrap();
        let names: Vec<_> = registry.stages().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["02_dataset_preparation", "03_api_configuration", "04_query_generation"]
        );
    }

    #[test]
    fn test_scan_rejects_duplicate_ordinals() {
        let dir = make_pipeline(&["02_alpha", "02_beta"]);
        let err = StageRegistry::scan(dir.path()).unwrap_err();
        assert!(matches!(err, StagecraftError::RegistryLoad { .. }));
        assert!(err.to_string().contains("ordinal 2"));
    }

    #[test]
    fn test_scan_rejects_empty_root() {
        let dir = make_pipeline(&[]);
        assert!(StageRegistry::scan(dir.path()).is_err());
    }

    #[test]
    fn test_find_and_index_of() {
        let dir = make_pipeline(&["02_a", "03_b"]);
        let registry = StageRegistry::scan(dir.path()).unwrap();
        assert_eq!(registry.find("03_b").unwrap().ordinal, 3);
        assert_eq!(registry.index_of("02_a").unwrap(), 0);
        assert!(matches!(
            registry.find("09_missing"),
            Err(StagecraftError::UnknownStage { .. })
        ));
    }

    #[test]
    fn test_predecessor() {
        let dir = make_pipeline(&["02_a", "03_b"]);
        let registry = StageRegistry::scan(dir.path()).unwrap();
        assert!(registry.predecessor("02_a").unwrap().is_none());
        assert_eq!(registry.predecessor("03_b").unwrap().unwrap().name, "02_a");
    }

    #[test]
    fn test_slice_windows() {
        let dir = make_pipeline(&["02_a", "03_b", "04_c"]);
        let registry = StageRegistry::scan(dir.path()).unwrap();

        let full = registry.slice(&StageRange::full()).unwrap();
        assert_eq!(full.len(), 3);

        let single = registry.slice(&StageRange::single("03_b")).unwrap();
        assert_eq!(single.len(), 1);
        assert_eq!(single[0].name, "03_b");

        let tail = registry
            .slice(&StageRange::bounded(Some("03_b".into()), None))
            .unwrap();
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].name, "03_b");
    }

    #[test]
    fn test_slice_is_composable() {
        // slice(A, C) then narrowing to [B, C] equals slice(B, C).
        let dir = make_pipeline(&["02_a", "03_b", "04_c"]);
        let registry = StageRegistry::scan(dir.path()).unwrap();
        let outer = registry
            .slice(&StageRange::bounded(Some("02_a".into()), Some("04_c".into())))
            .unwrap();
        let narrowed: Vec<_> = outer.iter().filter(|s| s.ordinal >= 3).collect();
        let direct = registry
            .slice(&StageRange::bounded(Some("03_b".into()), Some("04_c".into())))
            .unwrap();
        let direct_refs: Vec<_> = direct.iter().collect();
        assert_eq!(narrowed, direct_refs);
    }

    #[test]
    fn test_slice_inverted_bounds() {
        let dir = make_pipeline(&["02_a", "03_b"]);
        let registry = StageRegistry::scan(dir.path()).unwrap();
        let err = registry
            .slice(&StageRange::bounded(Some("03_b".into()), Some("02_a".into())))
            .unwrap_err();
        assert!(matches!(err, StagecraftError::InvalidRange { .. }));
    }

    #[test]
    fn test_slice_unknown_bound() {
        let dir = make_pipeline(&["02_a"]);
        let registry = StageRegistry::scan(dir.path()).unwrap();
        assert!(matches!(
            registry.slice(&StageRange::single("09_missing")),
            Err(StagecraftError::UnknownStage { .. })
        ));
    }
}
