//! Authenticity gate.
//!
//! A post-hoc auditor that certifies produced stage code and artifacts
//! are genuine computed results rather than stand-in content. Five
//! independent checks each contribute findings; a failing check never
//! aborts the others. Checks 1-3 (placeholder signatures, reference
//! resolution, execution) produce fatal findings; checks 4-5 (flow and
//! complexity heuristics) are advisory only, since they pattern-match
//! and are prone to false positives.
//!
//! The gate never blocks pipeline execution; it reads the same artifact
//! areas the controller writes and may run independently, on demand.

mod rules;
mod verdict;

pub use rules::{CategoryVocabulary, PatternRule, RuleCatalogue, COMPLEXITY_THRESHOLD};
pub use verdict::{AuthenticityVerdict, CheckKind, Finding, Severity};

use crate::controller::PipelineController;
use crate::errors::Result;
use crate::registry::{StageDescriptor, StageRange, StageRegistry};
use crate::store::ArtifactStore;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Source extensions scanned by the text checks.
const SOURCE_EXTENSIONS: &[&str] = &["py", "sh", "rs", "js", "ts"];

/// Directory names skipped during source collection.
const SKIP_DIRS: &[&str] = &["output", "logs", "__pycache__", ".git"];

/// The authenticity auditor.
pub struct AuthenticityGate {
    registry: Arc<StageRegistry>,
    store: ArtifactStore,
    rules: RuleCatalogue,
    import_pattern: Regex,
    script_ref_pattern: Regex,
    flow_pattern: Regex,
}

impl AuthenticityGate {
    /// Creates a gate with the standard rule catalogue.
    pub fn new(registry: Arc<StageRegistry>, store: ArtifactStore) -> Result<Self> {
        let rules = RuleCatalogue::standard()?;
        Self::with_catalogue(registry, store, rules)
    }

    /// Creates a gate with a caller-supplied catalogue.
    pub fn with_catalogue(
        registry: Arc<StageRegistry>,
        store: ArtifactStore,
        rules: RuleCatalogue,
    ) -> Result<Self> {
        Ok(Self {
            registry,
            store,
            rules,
            import_pattern: Regex::new(
                r"(?m)^\s*(?:from\s+([A-Za-z_][\w.]*)\s+import|import\s+([A-Za-z_][\w.]*))",
            )?,
            script_ref_pattern: Regex::new(r"(?m)(?:python3?|bash|sh)\s+([\w./-]+\.(?:py|sh))")?,
            flow_pattern: Regex::new(r"(?i)(?:input|output)")?,
        })
    }

    /// Runs the four static checks (1, 2, 4, 5).
    pub fn audit(&self) -> Result<AuthenticityVerdict> {
        let mut findings = Vec::new();
        self.scan_patterns(&mut findings);
        self.resolve_references(&mut findings);
        self.check_flow(&mut findings);
        self.check_complexity(&mut findings);

        let verdict = AuthenticityVerdict::from_findings(findings);
        info!(
            pass = verdict.pass,
            fatal = verdict.fatal_count(),
            advisory = verdict.advisory_count(),
            "audit complete"
        );
        Ok(verdict)
    }

    /// Runs all five checks, including a full controller execution
    /// (check 3). Execution mutates output areas, so it is opt-in.
    pub async fn audit_with_execution(
        &self,
        controller: &PipelineController,
    ) -> Result<AuthenticityVerdict> {
        let mut findings = Vec::new();
        self.scan_patterns(&mut findings);
        self.resolve_references(&mut findings);
        self.check_execution(controller, &mut findings).await;
        self.check_flow(&mut findings);
        self.check_complexity(&mut findings);
        Ok(AuthenticityVerdict::from_findings(findings))
    }

    /// Check 1: placeholder signature scan, fatal on any hit.
    fn scan_patterns(&self, findings: &mut Vec<Finding>) {
        for descriptor in self.registry.stages() {
            for (path, text) in self.stage_sources(descriptor) {
                for rule in &self.rules.patterns {
                    if rule.pattern.is_match(&text) {
                        findings.push(
                            Finding::fatal(
                                CheckKind::PatternScan,
                                &descriptor.name,
                                format!("placeholder signature '{}'", rule.name),
                            )
                            .with_file(&path),
                        );
                    }
                }
            }
        }
    }

    /// Check 2: every non-allowlisted reference inside stage code must
    /// resolve within the working set. Unresolved references are fatal.
    fn resolve_references(&self, findings: &mut Vec<Finding>) {
        for descriptor in self.registry.stages() {
            for (path, text) in self.stage_sources(descriptor) {
                if path.extension().is_some_and(|e| e == "py") {
                    self.resolve_python_imports(descriptor, &path, &text, findings);
                }
                self.resolve_script_references(descriptor, &path, &text, findings);
            }
        }
    }

    fn resolve_python_imports(
        &self,
        descriptor: &StageDescriptor,
        path: &Path,
        text: &str,
        findings: &mut Vec<Finding>,
    ) {
        for capture in self.import_pattern.captures_iter(text) {
            let Some(module) = capture.get(1).or_else(|| capture.get(2)) else {
                continue;
            };
            let module = module.as_str();
            if self.rules.is_allowlisted(module) {
                continue;
            }
            let top = module.split('.').next().unwrap_or(module);
            if !self.module_resolvable(&descriptor.working_dir, top) {
                findings.push(
                    Finding::fatal(
                        CheckKind::CrossReference,
                        &descriptor.name,
                        format!("broken reference: module '{module}' not resolvable in working set"),
                    )
                    .with_file(path),
                );
            }
        }
    }

    fn resolve_script_references(
        &self,
        descriptor: &StageDescriptor,
        path: &Path,
        text: &str,
        findings: &mut Vec<Finding>,
    ) {
        for capture in self.script_ref_pattern.captures_iter(text) {
            let Some(reference) = capture.get(1) else {
                continue;
            };
            let reference = reference.as_str();
            let from_script = path.parent().map(|d| d.join(reference));
            let from_root = descriptor.working_dir.join(reference);
            let resolvable =
                from_script.is_some_and(|p| p.is_file()) || from_root.is_file();
            if !resolvable {
                findings.push(
                    Finding::fatal(
                        CheckKind::CrossReference,
                        &descriptor.name,
                        format!("broken reference: script '{reference}' not found"),
                    )
                    .with_file(path),
                );
            }
        }
    }

    /// Check 3: full pipeline execution, recorded as a fatal finding on
    /// any failure (including dependency errors that prevent a run).
    async fn check_execution(&self, controller: &PipelineController, findings: &mut Vec<Finding>) {
        match controller.execute(&StageRange::full()).await {
            Ok(report) if report.is_success() => {
                debug!("execution check passed");
            }
            Ok(report) => {
                let stage = report.first_failed_stage().unwrap_or("pipeline").to_string();
                findings.push(Finding::fatal(
                    CheckKind::ExecutionCheck,
                    stage,
                    "pipeline execution failed at this stage",
                ));
            }
            Err(err) => {
                findings.push(Finding::fatal(
                    CheckKind::ExecutionCheck,
                    "pipeline",
                    format!("pipeline execution could not complete: {err}"),
                ));
            }
        }
    }

    /// Check 4: adjacent-pair flow heuristic, advisory only.
    fn check_flow(&self, findings: &mut Vec<Finding>) {
        for pair in self.registry.stages().windows(2) {
            let (earlier, later) = (&pair[0], &pair[1]);

            if !self.store.area_for(&earlier.name).has_output() {
                findings.push(Finding::advisory(
                    CheckKind::FlowCheck,
                    &later.name,
                    format!(
                        "possible disconnected flow: predecessor '{}' has an empty artifact area",
                        earlier.name
                    ),
                ));
            }

            let engages = self
                .stage_sources(later)
                .iter()
                .any(|(_, text)| self.flow_pattern.is_match(text));
            if !engages {
                findings.push(Finding::advisory(
                    CheckKind::FlowCheck,
                    &later.name,
                    "possible disconnected flow: stage code never mentions an input/output concept",
                ));
            }
        }
    }

    /// Check 5: category vocabulary coverage, advisory only.
    fn check_complexity(&self, findings: &mut Vec<Finding>) {
        for descriptor in self.registry.stages() {
            let Some(category) = descriptor.manifest.category.as_deref() else {
                continue;
            };
            let Some(vocabulary) = self.rules.vocabulary_for(category) else {
                continue;
            };

            let combined = self
                .stage_sources(descriptor)
                .into_iter()
                .map(|(_, text)| text.to_lowercase())
                .collect::<Vec<_>>()
                .join("\n");
            let present = vocabulary
                .terms
                .iter()
                .filter(|term| combined.contains(&term.to_lowercase()))
                .count();
            #[allow(clippy::cast_precision_loss)]
            let coverage = present as f64 / vocabulary.terms.len() as f64;

            if coverage < COMPLEXITY_THRESHOLD {
                findings.push(Finding::advisory(
                    CheckKind::ComplexityCheck,
                    &descriptor.name,
                    format!(
                        "under-implemented for category '{category}': {present}/{} expected terms present",
                        vocabulary.terms.len()
                    ),
                ));
            }
        }
    }

    /// Collects (path, text) for every source file in a stage's working
    /// directory, skipping artifact and log directories.
    fn stage_sources(&self, descriptor: &StageDescriptor) -> Vec<(PathBuf, String)> {
        let mut sources = Vec::new();
        let walker = WalkDir::new(&descriptor.working_dir)
            .into_iter()
            .filter_entry(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .map_or(true, |name| !SKIP_DIRS.contains(&name))
            });
        for entry in walker.flatten() {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let is_source = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| SOURCE_EXTENSIONS.contains(&e));
            if !is_source {
                continue;
            }
            if let Ok(bytes) = std::fs::read(path) {
                sources.push((path.to_path_buf(), String::from_utf8_lossy(&bytes).into_owned()));
            }
        }
        sources
    }

    /// A module resolves if `<top>.py` or a `<top>/` package directory
    /// exists anywhere under the stage's working directory.
    fn module_resolvable(&self, working_dir: &Path, top: &str) -> bool {
        let file = format!("{top}.py");
        WalkDir::new(working_dir)
            .into_iter()
            .flatten()
            .any(|entry| {
                entry.file_name().to_str().is_some_and(|name| {
                    name == file || (entry.file_type().is_dir() && name == top)
                })
            })
    }
}
