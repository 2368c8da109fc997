//! Pipeline abstraction for the non-interactive `crew run` entry point.
//!
//! The [`Pipeline`] trait decouples the invoker from the actual crew backend
//! (currently a configured command that reads run inputs on stdin). Tests use
//! fake pipelines that succeed or fail without spawning processes.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::core::inputs::RunInputs;
use crate::io::process::exit_code_of;

/// Any failure raised by the pipeline during a local run.
#[derive(Debug, thiserror::Error)]
#[error("An error occurred while running the crew: {message}")]
pub struct PipelineExecutionError {
    /// Message of the original failure, including its context chain.
    pub message: String,
}

/// The external build-and-execute entry point.
pub trait Pipeline {
    fn kickoff(&self, inputs: &RunInputs) -> Result<()>;
}

/// Run the pipeline once with `inputs`, wrapping any failure. No retry.
#[instrument(skip_all, fields(topic = %inputs.topic, date = %inputs.date))]
pub fn invoke_pipeline<P: Pipeline>(
    pipeline: &P,
    inputs: &RunInputs,
) -> Result<(), PipelineExecutionError> {
    info!("kicking off pipeline");
    pipeline.kickoff(inputs).map_err(|err| {
        warn!(err = %format!("{err:#}"), "pipeline failed");
        PipelineExecutionError {
            message: format!("{err:#}"),
        }
    })?;
    debug!("pipeline completed");
    Ok(())
}

/// Pipeline backed by a command that reads the run inputs as JSON on stdin.
///
/// The child's stdout and stderr go straight to the terminal.
#[derive(Debug, Clone)]
pub struct CommandPipeline {
    pub program: String,
    pub args: Vec<String>,
    pub workdir: PathBuf,
}

impl CommandPipeline {
    pub fn new(command: &[String], workdir: impl Into<PathBuf>) -> Result<Self> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| anyhow!("pipeline command must be a non-empty array"))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            workdir: workdir.into(),
        })
    }
}

impl Pipeline for CommandPipeline {
    #[instrument(skip_all, fields(program = %self.program))]
    fn kickoff(&self, inputs: &RunInputs) -> Result<()> {
        let payload = serde_json::to_vec(inputs).context("serialize run inputs")?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .current_dir(&self.workdir)
            .stdin(Stdio::piped())
            .spawn()
            .with_context(|| format!("spawn {}", self.program))?;

        {
            let mut stdin = child
                .stdin
                .take()
                .ok_or_else(|| anyhow!("stdin was not piped"))?;
            // A pipeline that ignores its inputs may close stdin early.
            if let Err(e) = stdin.write_all(&payload) {
                debug!(err = %e, "pipeline did not consume run inputs");
            }
        }

        let status = child
            .wait()
            .with_context(|| format!("wait for {}", self.program))?;
        if !status.success() {
            return Err(anyhow!(
                "{} exited with status {}",
                self.program,
                exit_code_of(status)
            ));
        }
        Ok(())
    }
}
