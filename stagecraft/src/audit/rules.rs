//! Pluggable audit rule catalogue.
//!
//! Rules are data, not control flow: the gate walks whatever catalogue it
//! is given, so signatures can be added or retired without touching the
//! checks themselves. All heuristic rules surface as advisory findings;
//! only the placeholder signatures and reference resolution are treated
//! as hard authenticity violations.

use regex::Regex;

/// A named placeholder signature matched against stage source text.
#[derive(Debug, Clone)]
pub struct PatternRule {
    /// Stable rule identifier, reported with each hit.
    pub name: &'static str,
    /// The compiled signature.
    pub pattern: Regex,
}

/// Vocabulary expected in code implementing a known complex-algorithm
/// category. Presence below [`COMPLEXITY_THRESHOLD`] flags the stage.
#[derive(Debug, Clone)]
pub struct CategoryVocabulary {
    /// Manifest `category` value this vocabulary applies to.
    pub category: &'static str,
    /// Terms a genuine implementation is expected to mention.
    pub terms: Vec<&'static str>,
}

/// Fraction of category vocabulary that must appear in stage source.
pub const COMPLEXITY_THRESHOLD: f64 = 0.5;

/// The full rule set consulted by the gate.
#[derive(Debug, Clone)]
pub struct RuleCatalogue {
    /// Placeholder signatures (check 1, fatal on hit).
    pub patterns: Vec<PatternRule>,
    /// Complexity vocabularies (check 5, advisory).
    pub vocabularies: Vec<CategoryVocabulary>,
    /// Module names exempt from cross-reference resolution (check 2):
    /// the language's standard library and well-known third-party
    /// packages installed outside the working set.
    pub import_allowlist: Vec<&'static str>,
}

impl RuleCatalogue {
    /// The built-in catalogue.
    pub fn standard() -> Result<Self, regex::Error> {
        let signatures: &[(&str, &str)] = &[
            (
                "unimplemented-marker",
                r"todo!\s*\(|unimplemented!\s*\(|raise\s+NotImplementedError|NotImplementedError\s*\(",
            ),
            (
                "mock-literal-return",
                r#"return\s+["'](?:mock|fake|dummy|placeholder|stub)"#,
            ),
            (
                "mock-value-literal",
                r#"["'](?:mock|fake)[_-](?:data|result|response|output)["']"#,
            ),
            (
                "placeholder-todo",
                r"(?:#|//)\s*(?:TODO|FIXME)[:\s].{0,40}implement",
            ),
            (
                "stub-function-body",
                r"(?m)def\s+\w+\([^)]*\):\s*\n\s*pass\s*$",
            ),
            (
                "not-implemented-signal",
                r#"(?i)(?:print|echo|eprintln!|println!)\s*\(?\s*["']not implemented"#,
            ),
        ];

        let mut patterns = Vec::with_capacity(signatures.len());
        for (name, source) in signatures {
            patterns.push(PatternRule {
                name,
                pattern: Regex::new(source)?,
            });
        }

        let vocabularies = vec![
            CategoryVocabulary {
                category: "statistics",
                terms: vec![
                    "mean",
                    "median",
                    "variance",
                    "std",
                    "percentile",
                    "distribution",
                    "sample",
                    "aggregate",
                ],
            },
            CategoryVocabulary {
                category: "llm_generation",
                terms: vec![
                    "prompt",
                    "temperature",
                    "token",
                    "model",
                    "completion",
                    "retry",
                    "api",
                    "seed",
                ],
            },
            CategoryVocabulary {
                category: "validation",
                terms: vec![
                    "schema",
                    "field",
                    "required",
                    "constraint",
                    "invalid",
                    "warning",
                    "report",
                    "timestamp",
                ],
            },
        ];

        let import_allowlist = vec![
            // Python standard library commonly seen in stage bodies.
            "os", "sys", "json", "re", "math", "random", "datetime", "pathlib", "typing",
            "collections", "itertools", "functools", "argparse", "logging", "time", "csv", "io",
            "subprocess", "shutil", "hashlib", "copy", "enum", "dataclasses", "abc", "uuid",
            "traceback", "string", "textwrap", "unittest", "glob", "tempfile", "warnings",
            // Third-party packages installed by environment bootstrap,
            // outside the working set by definition.
            "yaml", "pandas", "numpy", "pytz", "requests", "openai", "anthropic", "scipy",
            "sklearn", "matplotlib", "tqdm", "pytest", "dateutil", "httpx",
        ];

        Ok(Self {
            patterns,
            vocabularies,
            import_allowlist,
        })
    }

    /// Looks up the vocabulary for a manifest category, if any.
    #[must_use]
    pub fn vocabulary_for(&self, category: &str) -> Option<&CategoryVocabulary> {
        self.vocabularies.iter().find(|v| v.category == category)
    }

    /// Returns true if a module import is exempt from resolution.
    #[must_use]
    pub fn is_allowlisted(&self, module: &str) -> bool {
        // `pandas.io` resolves by its top-level package.
        let top = module.split('.').next().unwrap_or(module);
        self.import_allowlist.contains(&top)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalogue() -> RuleCatalogue {
        RuleCatalogue::standard().unwrap()
    }

    fn hits(rules: &RuleCatalogue, text: &str) -> Vec<&'static str> {
        rules
            .patterns
            .iter()
            .filter(|r| r.pattern.is_match(text))
            .map(|r| r.name)
            .collect()
    }

    #[test]
    fn test_detects_not_implemented_markers() {
        let rules = catalogue();
        assert_eq!(
            hits(&rules, "def run():\n    raise NotImplementedError\n"),
            vec!["unimplemented-marker"]
        );
        assert_eq!(hits(&rules, "let x = todo!();"), vec!["unimplemented-marker"]);
    }

    #[test]
    fn test_detects_mock_returns() {
        let rules = catalogue();
        assert_eq!(
            hits(&rules, "    return \"mock result\"\n"),
            vec!["mock-literal-return"]
        );
        assert_eq!(
            hits(&rules, "value = 'fake_response'"),
            vec!["mock-value-literal"]
        );
    }

    #[test]
    fn test_detects_stub_function_bodies() {
        let rules = catalogue();
        let source = "def compute_stats(df):\n    pass\n";
        assert_eq!(hits(&rules, source), vec!["stub-function-body"]);
    }

    #[test]
    fn test_clean_source_has_no_hits() {
        let rules = catalogue();
        let source = "def compute(df):\n    return df.describe()\n";
        assert!(hits(&rules, source).is_empty());
    }

    #[test]
    fn test_allowlist_covers_dotted_imports() {
        let rules = catalogue();
        assert!(rules.is_allowlisted("pandas"));
        assert!(rules.is_allowlisted("pandas.io"));
        assert!(!rules.is_allowlisted("prompt_templates"));
    }

    #[test]
    fn test_vocabulary_lookup() {
        let rules = catalogue();
        assert!(rules.vocabulary_for("statistics").is_some());
        assert!(rules.vocabulary_for("unknown_category").is_none());
    }
}
