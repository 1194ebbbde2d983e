//! Command-line control surface.
//!
//! Four verbs: `run` (full or windowed execution), `status` (read-only
//! projection from artifact areas), `audit` (authenticity gate), and
//! `test` (per-stage self-checks). Exit-code policy: a Degraded run
//! exits 0 so automation does not treat a missing credential as a
//! catastrophe; only a Failed stage or a failed audit exits nonzero.

use crate::audit::AuthenticityGate;
use crate::config::{EngineConfig, ExecutionMode};
use crate::controller::PipelineController;
use crate::core::RunReport;
use crate::errors::Result;
use crate::registry::{StageRange, StageRegistry};
use crate::store::ArtifactStore;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

/// Staged execution engine with an authenticity gate.
#[derive(Parser, Debug)]
#[command(name = "stagecraft")]
#[command(about = "Run, inspect, and audit a staged artifact pipeline", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Pipeline root holding the stage working directories.
    #[arg(long, default_value = "steps", env = "STAGECRAFT_ROOT")]
    pub root: PathBuf,

    /// Directory for captured stage logs (default: <root>/logs).
    #[arg(long)]
    pub logs: Option<PathBuf>,

    /// Externally supplied seed inputs for the first stage.
    #[arg(long)]
    pub seed: Option<PathBuf>,

    /// Increase log verbosity (-v: debug, -vv: trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// The four control verbs.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute the full sequence or a bounded sub-range
    Run {
        /// Run exactly one stage
        #[arg(long, conflicts_with_all = ["from", "to"])]
        step: Option<String>,

        /// First stage of the window (default: first in registry)
        #[arg(long)]
        from: Option<String>,

        /// Last stage of the window (default: last in registry)
        #[arg(long)]
        to: Option<String>,

        /// Keep attempting later stages after a failure
        #[arg(long)]
        best_effort: bool,

        /// Per-stage timeout in seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },

    /// Print per-stage progress derived from artifact areas only
    Status,

    /// Run the authenticity gate and print its findings
    Audit {
        /// Also run the full pipeline as part of the audit
        #[arg(long)]
        execute: bool,
    },

    /// Run each stage's declared self-check
    Test,
}

impl Cli {
    /// Default log filter directive for the chosen verbosity.
    #[must_use]
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }

    /// Resolves engine configuration from flags and the optional
    /// `stagecraft.json` overlay.
    pub fn engine_config(&self) -> Result<EngineConfig> {
        let mut config = EngineConfig::load(&self.root)?;
        if let Some(logs) = &self.logs {
            config = config.with_logs_dir(logs);
        }
        if let Some(seed) = &self.seed {
            config = config.with_seed_dir(seed);
        }
        if let Commands::Run {
            best_effort,
            timeout_secs,
            ..
        } = &self.command
        {
            if *best_effort {
                config = config.with_mode(ExecutionMode::BestEffort);
            }
            if let Some(secs) = timeout_secs {
                config = config.with_timeout(Duration::from_secs(*secs));
            }
        }
        Ok(config)
    }
}

/// Builds the range selected by `run` flags.
fn selected_range(step: Option<String>, from: Option<String>, to: Option<String>) -> StageRange {
    step.map_or_else(|| StageRange::bounded(from, to), StageRange::single)
}

/// Executes the parsed command and returns the process exit code.
pub async fn dispatch(cli: Cli) -> Result<ExitCode> {
    let config = cli.engine_config()?;
    let registry = Arc::new(StageRegistry::scan(&config.root)?);
    let store = ArtifactStore::new(&config.root);
    let controller = PipelineController::new(Arc::clone(&registry), config);

    match cli.command {
        Commands::Run { step, from, to, .. } => {
            let range = selected_range(step, from, to);
            let report = controller.execute(&range).await?;
            print_report(&report);
            Ok(if report.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::Status => {
            for (stage, state) in controller.status(&StageRange::full())? {
                println!("{stage}  {state}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Audit { execute } => {
            let gate = AuthenticityGate::new(Arc::clone(&registry), store)?;
            let verdict = if execute {
                gate.audit_with_execution(&controller).await?
            } else {
                gate.audit()?
            };
            print_verdict(&verdict);
            Ok(if verdict.pass {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::Test => {
            let report = controller.self_checks(&StageRange::full()).await?;
            for (stage, check) in &report.checks {
                let outcome = if check.passed { "pass" } else { "fail" };
                println!("{stage}  {outcome}  ({})", check.log.display());
            }
            for stage in &report.skipped {
                println!("{stage}  no self-check declared");
            }
            Ok(if report.all_passed() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

fn print_report(report: &RunReport) {
    for (stage, result) in &report.ordered_results {
        match &result.cause {
            Some(cause) => println!("{stage}  {}  ({cause})", result.status),
            None => println!("{stage}  {}", result.status),
        }
    }
    for (stage, reason) in &report.skipped {
        println!("{stage}  skipped  ({reason})");
    }
    let degraded = report.degraded_stages();
    if !degraded.is_empty() {
        println!();
        println!("degraded stages (usable but incomplete):");
        for (stage, cause) in degraded {
            match cause {
                Some(cause) => println!("  {stage}: {cause}"),
                None => println!("  {stage}"),
            }
        }
    }
    if let Some(failed) = report.first_failed_stage() {
        if let Some((_, result)) = report
            .ordered_results
            .iter()
            .find(|(name, _)| name == failed)
        {
            println!();
            println!(
                "failed at {failed}; captured log: {}",
                result.log.display()
            );
        }
    }
}

fn print_verdict(verdict: &crate::audit::AuthenticityVerdict) {
    for finding in &verdict.findings {
        let severity = match finding.severity {
            crate::audit::Severity::Fatal => "FATAL",
            crate::audit::Severity::Advisory => "advisory",
        };
        match &finding.file {
            Some(file) => println!(
                "[{severity}] {}  {}  {}: {}",
                finding.check,
                finding.stage,
                file.display(),
                finding.detail
            ),
            None => println!(
                "[{severity}] {}  {}: {}",
                finding.check, finding.stage, finding.detail
            ),
        }
    }
    println!();
    println!(
        "verdict: {} ({} fatal, {} advisory)",
        if verdict.pass { "PASS" } else { "FAIL" },
        verdict.fatal_count(),
        verdict.advisory_count()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_run_window() {
        let cli = Cli::parse_from([
            "stagecraft",
            "--root",
            "steps",
            "run",
            "--from",
            "02_a",
            "--to",
            "04_c",
        ]);
        match cli.command {
            Commands::Run { from, to, step, .. } => {
                assert_eq!(from.as_deref(), Some("02_a"));
                assert_eq!(to.as_deref(), Some("04_c"));
                assert!(step.is_none());
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_step_conflicts_with_bounds() {
        let parsed = Cli::try_parse_from([
            "stagecraft",
            "run",
            "--step",
            "03_b",
            "--from",
            "02_a",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_selected_range() {
        assert_eq!(
            selected_range(Some("03_b".into()), None, None),
            StageRange::single("03_b")
        );
        assert_eq!(
            selected_range(None, Some("02_a".into()), None),
            StageRange::bounded(Some("02_a".into()), None)
        );
    }

    #[test]
    fn test_verbosity_maps_to_filter() {
        let cli = Cli::parse_from(["stagecraft", "status"]);
        assert_eq!(cli.log_filter(), "info");
        let cli = Cli::parse_from(["stagecraft", "status", "-vv"]);
        assert_eq!(cli.log_filter(), "trace");
    }

    #[test]
    fn test_timeout_flag_overrides_config() {
        let cli = Cli::parse_from(["stagecraft", "run", "--timeout-secs", "30"]);
        // root "steps" does not exist here; defaults apply without overlay.
        let config = cli.engine_config().unwrap();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.mode, ExecutionMode::HaltOnFailure);
    }
}
