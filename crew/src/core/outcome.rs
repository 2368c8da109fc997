//! Classification of finished child processes.

use serde::Serialize;

/// Final state of a child process that ran to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Success,
    Failed { exit_code: i32 },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Success)
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Success => 0,
            RunOutcome::Failed { exit_code } => *exit_code,
        }
    }
}

/// Map a raw exit code to an outcome. Zero is the only success.
pub fn classify_exit_code(exit_code: i32) -> RunOutcome {
    if exit_code == 0 {
        RunOutcome::Success
    } else {
        RunOutcome::Failed { exit_code }
    }
}
