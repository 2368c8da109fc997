//! Launches the crew tool for the UI and feeds its output to subscribers.

use anyhow::Result;
use crew::core::outcome::RunOutcome;
use crew::io::process::{LineSink, ProcessRunner, RunError, RunRequest};
use tracing::{info, warn};

use crate::state::{AppState, RunFailureKind};

/// Forwards each line into the shared run snapshot and the event channel.
struct BroadcastSink<'a> {
    state: &'a AppState,
}

impl LineSink for BroadcastSink<'_> {
    fn line(&mut self, line: &str) {
        self.state.push_line(line);
    }
}

/// Build the tool request with the credential injected, if one is set.
pub fn build_request(state: &AppState) -> Result<RunRequest> {
    let (program, args) = state.config.tool.split()?;
    let mut request = RunRequest::new(program, &state.paths.root).args(args.iter().cloned());
    if let Some(key) = state.credential() {
        request = request.env(state.config.credential.env_var.clone(), key);
    }
    Ok(request)
}

/// Start a run on the blocking pool. Returns false if a run is already active.
pub fn start_run(state: &AppState, request: RunRequest) -> bool {
    if !state.begin_run(&request.display_command()) {
        return false;
    }
    let state = state.clone();
    tokio::task::spawn_blocking(move || execute_run(&state, &request));
    true
}

/// Run to completion on the current thread, publishing progress through `state`.
pub fn execute_run(state: &AppState, request: &RunRequest) {
    let mut sink = BroadcastSink { state };
    match ProcessRunner.run(request, &mut sink).and_then(|s| s.into_result()) {
        Ok(_) => {
            info!("ui run finished");
            state.finish_run(RunOutcome::Success);
        }
        Err(RunError::ProcessFailure { exit_code, .. }) => {
            info!(exit_code, "ui run exited with non-zero status");
            state.finish_run(RunOutcome::Failed { exit_code });
        }
        Err(err) => {
            warn!(err = %err, "ui run failed to launch");
            let kind = match err {
                RunError::ToolNotFound { .. } => RunFailureKind::ToolNotFound,
                _ => RunFailureKind::Generic,
            };
            state.fail_run(kind, err.to_string());
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::state::UiEvent;
    use crew::io::config::CrewConfig;
    use crew::io::paths::ProjectPaths;

    fn state_with_tool(root: &std::path::Path, command: &[&str]) -> AppState {
        let mut cfg = CrewConfig::default();
        cfg.tool.command = command.iter().map(|s| s.to_string()).collect();
        AppState::new(ProjectPaths::with_config(root, &cfg), cfg)
    }

    #[test]
    fn request_carries_credential() {
        let temp = tempfile::tempdir().expect("tempdir");
        let state = state_with_tool(temp.path(), &["crewai", "run"]);
        state.set_credential(Some("sk-ui".to_string()));

        let request = build_request(&state).expect("request");
        assert_eq!(request.display_command(), "crewai run");
        assert_eq!(request.workdir, temp.path());
        assert_eq!(
            request.env.get("OPENAI_API_KEY").map(String::as_str),
            Some("sk-ui")
        );
    }

    #[test]
    fn execute_run_publishes_lines_and_outcome() {
        let temp = tempfile::tempdir().expect("tempdir");
        let state = state_with_tool(temp.path(), &["sh", "-c", "echo one; echo two; exit 7"]);
        let mut rx = state.event_tx.subscribe();
        let request = build_request(&state).expect("request");

        assert!(state.begin_run(&request.display_command()));
        execute_run(&state, &request);

        let snapshot = state.snapshot();
        assert!(!snapshot.running);
        assert_eq!(snapshot.log, "one\ntwo\n");
        assert_eq!(snapshot.outcome, Some(RunOutcome::Failed { exit_code: 7 }));

        let mut events = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            events.push(ev);
        }
        assert_eq!(
            events.last(),
            Some(&UiEvent::RunFinished {
                outcome: RunOutcome::Failed { exit_code: 7 }
            })
        );
    }

    #[test]
    fn missing_tool_is_reported_distinctly() {
        let temp = tempfile::tempdir().expect("tempdir");
        let state = state_with_tool(temp.path(), &["crew-ui-missing-tool-2b9a", "run"]);
        let mut rx = state.event_tx.subscribe();
        let request = build_request(&state).expect("request");

        assert!(state.begin_run(&request.display_command()));
        execute_run(&state, &request);

        assert!(!state.snapshot().running);
        let mut last = None;
        while let Ok(ev) = rx.try_recv() {
            last = Some(ev);
        }
        assert!(matches!(
            last,
            Some(UiEvent::RunFailed {
                kind: RunFailureKind::ToolNotFound,
                ..
            })
        ));
    }
}
