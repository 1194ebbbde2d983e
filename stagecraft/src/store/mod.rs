//! Filesystem-backed artifact store.
//!
//! Each stage owns exactly one [`ArtifactArea`] (its `output/` directory)
//! while it runs; once the stage reports a terminal status the area is
//! frozen and shared by reference with every downstream reader. Callers
//! never assemble paths themselves, which is what prevents accidental
//! cross-stage writes.

use crate::errors::Result;
use std::fs;
use std::path::{Path, PathBuf};

/// Directory name of a stage's output area inside its working directory.
pub const OUTPUT_DIR: &str = "output";

/// Directory name of a stage's input area inside its working directory.
pub const INPUT_DIR: &str = "input";

/// Handle to one stage's output area.
///
/// The handle itself is cheap and does no I/O until queried. Whether the
/// area is "frozen" is a protocol property (the engine only recreates an
/// area immediately before running its owning stage), not something the
/// filesystem enforces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactArea {
    stage: String,
    path: PathBuf,
}

impl ArtifactArea {
    /// The owning stage's name.
    #[must_use]
    pub fn stage(&self) -> &str {
        &self.stage
    }

    /// The directory backing this area.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if the area's directory exists at all.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.is_dir()
    }

    /// Returns true if the area exists and holds at least one non-empty
    /// entry. An area with zero entries counts as "no usable output"
    /// regardless of how its stage exited.
    #[must_use]
    pub fn has_output(&self) -> bool {
        !self.entries().unwrap_or_default().is_empty()
    }

    /// Lists the artifact names present in the area, sorted.
    pub fn entries(&self) -> Result<Vec<String>> {
        if !self.path.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Returns true if a named artifact is present and non-empty.
    #[must_use]
    pub fn contains(&self, artifact: &str) -> bool {
        let path = self.path.join(artifact);
        match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => meta.len() > 0,
            Ok(meta) if meta.is_dir() => fs::read_dir(&path)
                .map(|mut it| it.next().is_some())
                .unwrap_or(false),
            _ => false,
        }
    }

    /// Recreates the area empty. Called by the runner immediately before
    /// the owning stage's body starts; never called on a frozen area.
    pub fn reset(&self) -> Result<()> {
        if self.path.is_dir() {
            fs::remove_dir_all(&self.path)?;
        }
        fs::create_dir_all(&self.path)?;
        Ok(())
    }
}

/// The store of artifact areas for one pipeline, rooted at the pipeline
/// directory that also holds the stage working directories.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Creates a store rooted at the pipeline directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The pipeline root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the output area handle for a stage.
    #[must_use]
    pub fn area_for(&self, stage: &str) -> ArtifactArea {
        ArtifactArea {
            stage: stage.to_string(),
            path: self.root.join(stage).join(OUTPUT_DIR),
        }
    }

    /// Returns the stage-private input directory, if the stage ships one.
    ///
    /// First stages bootstrap from checked-in inputs rather than a
    /// predecessor's area.
    #[must_use]
    pub fn input_dir(&self, stage: &str) -> Option<PathBuf> {
        let path = self.root.join(stage).join(INPUT_DIR);
        path.is_dir().then_some(path)
    }
}
