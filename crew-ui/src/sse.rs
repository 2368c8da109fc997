//! Server-Sent Events stream and file watcher.

use std::collections::BTreeSet;
use std::convert::Infallible;
use std::path::Path;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use crew::io::documents::ConfigDocKind;
use futures::stream::Stream;
use notify::{Event as NotifyEvent, EventKind, PollWatcher, RecursiveMode, Watcher};
use tokio::sync::broadcast;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::state::{AppState, UiEvent};

/// SSE endpoint handler.
pub async fn events_handler(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.event_tx.subscribe();

    let stream = async_stream::stream! {
        yield Ok(Event::default().event("connected").data("{}"));

        while let Some(ui_event) = forwarded(&state, rx.recv().await) {
            if let Ok(json) = serde_json::to_string(&ui_event) {
                yield Ok(Event::default().event("change").data(json));
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

/// Event to send for one broadcast receive, or `None` once the channel is closed.
///
/// A lagged subscriber has lost events, so it gets the full run snapshot instead.
fn forwarded(
    state: &AppState,
    received: Result<UiEvent, broadcast::error::RecvError>,
) -> Option<UiEvent> {
    match received {
        Ok(ui_event) => Some(ui_event),
        Err(broadcast::error::RecvError::Lagged(n)) => {
            warn!(skipped = n, "SSE client lagged, sending run snapshot");
            Some(UiEvent::Resync {
                snapshot: state.snapshot(),
            })
        }
        Err(broadcast::error::RecvError::Closed) => None,
    }
}

/// Start the file watcher in a background task.
pub fn start_file_watcher(state: AppState) {
    tokio::spawn(async move {
        if let Err(e) = run_file_watcher(state).await {
            warn!(error = %e, "file watcher failed");
        }
    });
}

async fn run_file_watcher(state: AppState) -> anyhow::Result<()> {
    let (tx, mut rx) = mpsc::channel::<NotifyEvent>(100);

    let mut watcher = PollWatcher::new(
        move |res: Result<NotifyEvent, notify::Error>| {
            if let Ok(event) = res {
                let _ = tx.try_send(event);
            }
        },
        notify::Config::default().with_poll_interval(Duration::from_millis(500)),
    )?;

    // Root only (not recursive): the project may hold large virtualenvs.
    watcher.watch(&state.paths.root, RecursiveMode::NonRecursive)?;
    info!(path = %state.paths.root.display(), "watching project root");
    let mut config_watched = watch_if_present(&mut watcher, &state.paths.config_dir)?;
    if !config_watched {
        info!(path = %state.paths.config_dir.display(), "config directory missing, waiting for it");
    }

    // Flush in batches so a report being written line by line yields one event per tick.
    let mut pending_events: Vec<NotifyEvent> = Vec::new();
    let mut flush_tick = tokio::time::interval(Duration::from_millis(100));
    flush_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            Some(event) = rx.recv() => {
                pending_events.push(event);
            }
            _ = flush_tick.tick() => {
                // The first save creates the config directory.
                if !config_watched {
                    config_watched = watch_if_present(&mut watcher, &state.paths.config_dir)?;
                    if config_watched {
                        // Documents written before the watch started produce no event.
                        for doc in [ConfigDocKind::Agents, ConfigDocKind::Tasks] {
                            state.emit(UiEvent::ConfigChanged { doc });
                        }
                    }
                }
                if pending_events.is_empty() {
                    continue;
                }
                process_events(&state, &pending_events);
                pending_events.clear();
            }
        }
    }
}

/// Start watching `dir` if it exists. Returns whether it is now watched.
fn watch_if_present<W: Watcher>(watcher: &mut W, dir: &Path) -> notify::Result<bool> {
    if !dir.is_dir() {
        return Ok(false);
    }
    watcher.watch(dir, RecursiveMode::NonRecursive)?;
    info!(path = %dir.display(), "watching config directory");
    Ok(true)
}

fn process_events(state: &AppState, events: &[NotifyEvent]) {
    let mut report_changed = false;
    let mut files_changed = false;
    let mut docs_changed: BTreeSet<ConfigDocKind> = BTreeSet::new();

    let paths = &state.paths;

    for event in events {
        let membership_change = matches!(event.kind, EventKind::Create(_) | EventKind::Remove(_));
        if !membership_change && !matches!(event.kind, EventKind::Modify(_)) {
            continue;
        }

        for path in &event.paths {
            if path == &paths.report_path {
                report_changed = true;
            } else if path == &paths.agents_path {
                docs_changed.insert(ConfigDocKind::Agents);
            } else if path == &paths.tasks_path {
                docs_changed.insert(ConfigDocKind::Tasks);
            }

            if membership_change && is_root_entry(&paths.root, path) {
                files_changed = true;
            }
        }
    }

    if report_changed {
        debug!("broadcasting report change");
        state.emit(UiEvent::ReportChanged);
    }
    for doc in docs_changed {
        debug!(doc = %doc, "broadcasting config change");
        state.emit(UiEvent::ConfigChanged { doc });
    }
    if files_changed {
        debug!("broadcasting file list change");
        state.emit(UiEvent::FilesChanged);
    }
}

fn is_root_entry(root: &Path, path: &Path) -> bool {
    path.parent() == Some(root)
}
