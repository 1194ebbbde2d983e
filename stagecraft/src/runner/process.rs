//! Process-backed stage body.
//!
//! The engine treats a stage body as an opaque blocking call: spawn the
//! entrypoint, stream both standard streams verbatim into the log file,
//! wait (bounded by the timeout), observe the exit status. Nothing is
//! summarized or discarded.

use async_trait::async_trait;
use std::fs::File;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Environment variable naming the stage being run.
pub const ENV_STAGE_NAME: &str = "STAGE_NAME";

/// Environment variable pointing at the resolved input area.
pub const ENV_INPUT_DIR: &str = "STAGE_INPUT_DIR";

/// Environment variable pointing at the stage's own output area.
pub const ENV_OUTPUT_DIR: &str = "STAGE_OUTPUT_DIR";

/// Everything a body invocation needs, resolved up front by the runner.
#[derive(Debug, Clone)]
pub struct StageInvocation {
    /// Stage name, exported as `STAGE_NAME`.
    pub stage: String,
    /// Shell command to run (the entrypoint or a self-check).
    pub command: String,
    /// Directory the command runs in.
    pub working_dir: PathBuf,
    /// Resolved input area, exported as `STAGE_INPUT_DIR` when present.
    pub input_dir: Option<PathBuf>,
    /// The stage's output area, exported as `STAGE_OUTPUT_DIR` when present.
    pub output_dir: Option<PathBuf>,
    /// Where captured stdout/stderr land.
    pub log_path: PathBuf,
}

/// Raw outcome of one body invocation, before classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyOutcome {
    /// The body ran to completion with this exit code.
    Exited(i32),
    /// The body was killed by a signal and reported no exit code.
    Signalled,
    /// The timeout expired and the body was forcibly terminated.
    TimedOut,
}

/// Seam between the runner and the mechanics of running a body.
///
/// Production uses [`CommandStageBody`]; tests substitute scripted
/// implementations so classification can be exercised without spawning
/// processes.
#[async_trait]
pub trait StageBody: Send + Sync {
    /// Runs one body invocation to completion or timeout.
    async fn invoke(
        &self,
        invocation: &StageInvocation,
        timeout: Duration,
    ) -> std::io::Result<BodyOutcome>;
}

/// Spawns the entrypoint as a child process via `sh -c`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandStageBody;

#[async_trait]
impl StageBody for CommandStageBody {
    async fn invoke(
        &self,
        invocation: &StageInvocation,
        timeout: Duration,
    ) -> std::io::Result<BodyOutcome> {
        if let Some(parent) = invocation.log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let log = File::create(&invocation.log_path)?;
        let log_err = log.try_clone()?;

        let mut command = Command::new("sh");
        command
            .arg("-c")
            .arg(&invocation.command)
            .current_dir(&invocation.working_dir)
            .env(ENV_STAGE_NAME, &invocation.stage)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .kill_on_drop(true);
        if let Some(input) = &invocation.input_dir {
            command.env(ENV_INPUT_DIR, input);
        }
        if let Some(output) = &invocation.output_dir {
            command.env(ENV_OUTPUT_DIR, output);
        }

        let mut child = command.spawn()?;

        match tokio::time::timeout(timeout, child.wait()).await {
            Ok(status) => {
                let status = status?;
                Ok(status
                    .code()
                    .map_or(BodyOutcome::Signalled, BodyOutcome::Exited))
            }
            Err(_elapsed) => {
                child.kill().await.ok();
                child.wait().await.ok();
                Ok(BodyOutcome::TimedOut)
            }
        }
    }
}
