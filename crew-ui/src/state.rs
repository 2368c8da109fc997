//! Shared application state for the UI server.

use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use crew::core::outcome::RunOutcome;
use crew::io::config::CrewConfig;
use crew::io::credentials::CredentialFile;
use crew::io::documents::{ConfigDocKind, ConfigDocument};
use crew::io::paths::ProjectPaths;
use crew::io::report::ReportViewer;
use serde::Serialize;
use tokio::sync::broadcast;

/// Events broadcast to SSE clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiEvent {
    RunStarted { command: String },
    /// One output line, including its line terminator. `seq` counts from 0 per run.
    RunLine { seq: usize, line: String },
    RunFinished { outcome: RunOutcome },
    RunFailed { kind: RunFailureKind, message: String },
    ReportChanged,
    ConfigChanged { doc: ConfigDocKind },
    FilesChanged,
    /// Sent to a subscriber that fell behind and missed events.
    Resync { snapshot: RunSnapshot },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunFailureKind {
    ToolNotFound,
    Generic,
}

/// Latest process session as seen by the UI. Replaced when a new run starts.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSnapshot {
    pub running: bool,
    pub command: Option<String>,
    pub log: String,
    /// Number of lines in `log`; the `seq` the next `RunLine` will carry.
    pub lines: usize,
    pub outcome: Option<RunOutcome>,
    pub error: Option<String>,
}

/// Shared state accessible from all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<ProjectPaths>,
    pub config: Arc<CrewConfig>,
    /// Broadcast sender for run and file change events.
    pub event_tx: Arc<broadcast::Sender<UiEvent>>,
    run: Arc<Mutex<RunSnapshot>>,
    credential: Arc<RwLock<Option<String>>>,
    /// Serializes config document saves.
    pub save_lock: Arc<tokio::sync::Mutex<()>>,
}

impl AppState {
    pub fn new(paths: ProjectPaths, config: CrewConfig) -> Self {
        let (event_tx, _) = broadcast::channel(1024);
        Self {
            paths: Arc::new(paths),
            config: Arc::new(config),
            event_tx: Arc::new(event_tx),
            run: Arc::new(Mutex::new(RunSnapshot::default())),
            credential: Arc::new(RwLock::new(None)),
            save_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    pub fn document(&self, kind: ConfigDocKind) -> ConfigDocument {
        ConfigDocument::for_project(&self.paths, kind)
    }

    pub fn report(&self) -> ReportViewer {
        ReportViewer::new(&self.paths.report_path, self.config.report.preview_chars)
    }

    pub fn credential_file(&self) -> CredentialFile {
        CredentialFile::new(&self.paths.env_path, &self.config.credential.env_var)
            .restrict_permissions(self.config.credential.restrict_permissions)
    }

    pub fn credential(&self) -> Option<String> {
        self.credential
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn set_credential(&self, value: Option<String>) {
        let value = value.filter(|v| !v.is_empty());
        *self
            .credential
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = value;
    }

    pub fn snapshot(&self) -> RunSnapshot {
        self.lock_run().clone()
    }

    /// Claim the single run slot. Returns false if a run is already active.
    pub fn begin_run(&self, command: &str) -> bool {
        let mut run = self.lock_run();
        if run.running {
            return false;
        }
        *run = RunSnapshot {
            running: true,
            command: Some(command.to_string()),
            ..RunSnapshot::default()
        };
        drop(run);
        self.emit(UiEvent::RunStarted {
            command: command.to_string(),
        });
        true
    }

    pub fn push_line(&self, line: &str) {
        let seq = {
            let mut run = self.lock_run();
            run.log.push_str(line);
            run.lines += 1;
            run.lines - 1
        };
        self.emit(UiEvent::RunLine {
            seq,
            line: line.to_string(),
        });
    }

    pub fn finish_run(&self, outcome: RunOutcome) {
        {
            let mut run = self.lock_run();
            run.running = false;
            run.outcome = Some(outcome);
        }
        self.emit(UiEvent::RunFinished { outcome });
    }

    pub fn fail_run(&self, kind: RunFailureKind, message: String) {
        {
            let mut run = self.lock_run();
            run.running = false;
            run.error = Some(message.clone());
        }
        self.emit(UiEvent::RunFailed { kind, message });
    }

    /// Send to all subscribers; no subscribers is not an error.
    pub fn emit(&self, event: UiEvent) {
        let _ = self.event_tx.send(event);
    }

    fn lock_run(&self) -> MutexGuard<'_, RunSnapshot> {
        self.run.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> AppState {
        AppState::new(ProjectPaths::new("/tmp/crew-ui-state"), CrewConfig::default())
    }

    #[test]
    fn second_run_is_rejected_while_active() {
        let state = state();
        assert!(state.begin_run("crewai run"));
        assert!(!state.begin_run("crewai run"));

        state.finish_run(RunOutcome::Success);
        assert!(state.begin_run("crewai run"));
    }

    #[test]
    fn new_run_discards_previous_session() {
        let state = state();
        assert!(state.begin_run("crewai run"));
        state.push_line("old\n");
        state.finish_run(RunOutcome::Failed { exit_code: 2 });

        assert!(state.begin_run("crewai run"));
        let snapshot = state.snapshot();
        assert!(snapshot.running);
        assert_eq!(snapshot.log, "");
        assert_eq!(snapshot.outcome, None);
    }

    #[test]
    fn lines_accumulate_and_broadcast() {
        let state = state();
        let mut rx = state.event_tx.subscribe();
        assert!(state.begin_run("crewai run"));
        state.push_line("a\n");
        state.push_line("b\n");
        state.finish_run(RunOutcome::Success);

        assert_eq!(state.snapshot().log, "a\nb\n");
        assert_eq!(state.snapshot().lines, 2);

        let mut events = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            events.push(ev);
        }
        assert_eq!(
            events,
            vec![
                UiEvent::RunStarted {
                    command: "crewai run".to_string()
                },
                UiEvent::RunLine {
                    seq: 0,
                    line: "a\n".to_string()
                },
                UiEvent::RunLine {
                    seq: 1,
                    line: "b\n".to_string()
                },
                UiEvent::RunFinished {
                    outcome: RunOutcome::Success
                },
            ]
        );
    }

    #[test]
    fn empty_credential_is_unset() {
        let state = state();
        state.set_credential(Some(String::new()));
        assert_eq!(state.credential(), None);
        state.set_credential(Some("sk-x".to_string()));
        assert_eq!(state.credential().as_deref(), Some("sk-x"));
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let json = serde_json::to_string(&UiEvent::ConfigChanged {
            doc: ConfigDocKind::Tasks,
        })
        .expect("json");
        assert_eq!(json, r#"{"type":"config_changed","doc":"tasks"}"#);

        let json = serde_json::to_string(&UiEvent::RunFailed {
            kind: RunFailureKind::ToolNotFound,
            message: "missing".to_string(),
        })
        .expect("json");
        assert_eq!(
            json,
            r#"{"type":"run_failed","kind":"tool_not_found","message":"missing"}"#
        );
    }
}
