//! Bridges the backend's event channel into task registry mutations.

use log::{debug, info, warn};

use crate::events::{BackendEvent, EventReceiver, RawEvent};
use crate::router::View;
use crate::session::{AppState, Session};

/// What has to happen after an event was applied
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncEffect {
    pub repaint: bool,
    pub refresh_history: bool,
}

/// Applies one decoded event to the state.
///
/// Events for ids the registry no longer knows are dropped; a `complete`
/// racing a late `progress` for the same task is expected.
pub fn apply_event(state: &mut AppState, event: &BackendEvent) -> SyncEffect {
    let queued = state.tasks.len();
    let applied = match event {
        BackendEvent::Progress(update) => state.tasks.apply_progress(update),
        BackendEvent::Started(id) => state.tasks.mark_started(id),
        BackendEvent::Complete(id) => state.tasks.complete(id),
        BackendEvent::Error(id) => {
            let known = state.tasks.mark_error(id);
            if known {
                warn!("task {} failed", id);
            }
            known
        }
    };
    if !applied {
        debug!("ignoring event for unknown task {}", event.task_id());
    }

    let view = state.router.active();
    SyncEffect {
        // the sidebar badge shows the task count on every view
        repaint: applied && (view.shows_tasks() || state.tasks.len() != queued),
        refresh_history: matches!(event, BackendEvent::Complete(_)) && view == View::Finished,
    }
}

/// Consumer loop draining the backend's event channel
pub struct EventSynchronizer {
    session: Session,
    events: EventReceiver,
}

impl EventSynchronizer {
    /// Takes the gateway's event channel. `None` if it was already taken.
    pub fn subscribe(session: &Session) -> Option<Self> {
        let events = session.gateway().subscribe()?;
        Some(Self {
            session: session.clone(),
            events,
        })
    }

    /// Runs until the backend drops its sender. Must be spawned on the runtime.
    pub async fn run(mut self) {
        while let Some(raw) = self.events.recv().await {
            self.handle(&raw);
        }
        info!("backend event channel closed");
    }

    fn handle(&self, raw: &RawEvent) -> SyncEffect {
        let Some(event) = BackendEvent::decode(raw) else {
            warn!("dropping unreadable {} event: {}", raw.name, raw.payload);
            return SyncEffect::default();
        };

        let effect = apply_event(&mut self.session.state(), &event);
        if effect.repaint {
            self.session.request_repaint();
        }
        if effect.refresh_history {
            // refreshed off the loop so later events are not held up
            let session = self.session.clone();
            tokio::spawn(async move { session.refresh_history().await });
        }
        effect
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ProgressUpdate, RawEvent};
    use crate::gateway::mock::MockGateway;
    use crate::model::{HistoryEntry, TaskStatus};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn session_counting(gateway: Arc<MockGateway>) -> (Session, Arc<AtomicUsize>) {
        let repaints = Arc::new(AtomicUsize::new(0));
        let counter = repaints.clone();
        let session = Session::new(
            gateway,
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        (session, repaints)
    }

    fn progress(id: &str) -> BackendEvent {
        BackendEvent::Progress(ProgressUpdate {
            id: id.to_string(),
            percent: Some(50.0),
            speed: Some("2MiB/s".into()),
            eta: Some("00:05".into()),
            status: None,
        })
    }

    #[test]
    fn repaint_only_while_tasks_view_is_active() {
        let mut state = AppState::default();
        let id = state.tasks.create_task("http://x", "t", "");

        let effect = apply_event(&mut state, &progress(&id));
        assert!(!effect.repaint);
        assert_eq!(state.tasks.get(&id).unwrap().percent, 50.0);

        state.router.navigate(View::Downloading);
        assert!(apply_event(&mut state, &progress(&id)).repaint);
    }

    #[test]
    fn unknown_ids_change_nothing_and_request_nothing() {
        let mut state = AppState::default();
        state.router.navigate(View::Downloading);
        let effect = apply_event(&mut state, &progress("ghost"));
        assert_eq!(effect, SyncEffect::default());
        assert!(state.tasks.is_empty());
    }

    #[test]
    fn complete_on_history_view_refreshes_history() {
        let mut state = AppState::default();
        let id = state.tasks.create_task("http://x", "t", "");
        state.router.navigate(View::Finished);
        let effect = apply_event(&mut state, &BackendEvent::Complete(id.clone()));
        assert!(effect.refresh_history);
        assert!(effect.repaint);
        assert!(state.tasks.is_empty());
    }

    #[test]
    fn badge_changes_repaint_on_any_view() {
        let mut state = AppState::default();
        state.router.navigate(View::Settings);
        let done = state.tasks.create_task("http://a", "a", "");
        let failed = state.tasks.create_task("http://b", "b", "");

        assert!(!apply_event(&mut state, &BackendEvent::Started(done.clone())).repaint);
        assert!(!apply_event(&mut state, &BackendEvent::Error(failed)).repaint);
        let effect = apply_event(&mut state, &BackendEvent::Complete(done));
        assert!(effect.repaint);
        assert!(!effect.refresh_history);
        assert_eq!(state.tasks.len(), 1);
    }

    #[test]
    fn late_progress_after_complete_is_dropped() {
        let mut state = AppState::default();
        let id = state.tasks.create_task("http://x", "t", "");
        apply_event(&mut state, &BackendEvent::Complete(id.clone()));
        apply_event(&mut state, &progress(&id));
        assert!(state.tasks.is_empty());
    }

    #[test]
    fn error_keeps_task_visible() {
        let mut state = AppState::default();
        let id = state.tasks.create_task("http://x", "t", "");
        apply_event(&mut state, &BackendEvent::Started(id.clone()));
        apply_event(&mut state, &BackendEvent::Error(id.clone()));
        assert_eq!(state.tasks.get(&id).unwrap().status, TaskStatus::Error);
    }

    #[test]
    fn subscription_is_handed_out_once() {
        let gateway = Arc::new(MockGateway::new());
        let (session, _) = session_counting(gateway);
        assert!(EventSynchronizer::subscribe(&session).is_some());
        assert!(EventSynchronizer::subscribe(&session).is_none());
    }

    #[tokio::test]
    async fn loop_applies_events_in_order() {
        let gateway = Arc::new(MockGateway::new());
        let (session, repaints) = session_counting(gateway.clone());
        let mut sync = EventSynchronizer::subscribe(&session).unwrap();

        let (done, failed) = {
            let mut state = session.state();
            state.router.navigate(View::Downloading);
            (
                state.tasks.create_task("http://a", "a", ""),
                state.tasks.create_task("http://b", "b", ""),
            )
        };

        gateway.emit(RawEvent::started(&done));
        gateway.emit(RawEvent::progress(&done, "10.0%", "1MiB/s", "01:00"));
        gateway.emit(RawEvent::new("task_progress", json!("garbage")));
        gateway.emit(RawEvent::complete(&done));
        gateway.emit(RawEvent::progress(&done, "99.0%", "1MiB/s", "00:01"));
        gateway.emit(RawEvent::progress(&failed, "3%", "", ""));
        gateway.emit(RawEvent::error(&failed));

        while let Ok(raw) = sync.events.try_recv() {
            sync.handle(&raw);
        }

        let state = session.state();
        assert!(!state.tasks.contains(&done));
        let task = state.tasks.get(&failed).unwrap();
        assert_eq!(task.status, TaskStatus::Error);
        assert_eq!(task.percent, 3.0);
        // started, progress, complete, progress(b), error
        assert_eq!(repaints.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn completion_on_history_view_fetches_new_entry() {
        let gateway = Arc::new(MockGateway::new());
        let (session, _) = session_counting(gateway.clone());
        let sync = EventSynchronizer::subscribe(&session).unwrap();
        let id = {
            let mut state = session.state();
            state.router.navigate(View::Finished);
            state.tasks.create_task("http://a", "a", "")
        };
        gateway.history.lock().unwrap().push(HistoryEntry {
            id: id.clone(),
            title: "a".into(),
            thumbnail: String::new(),
            file_path: "/dl/a.mp4".into(),
        });

        gateway.emit(RawEvent::complete(&id));
        let handle = tokio::spawn(sync.run());

        // the refresh runs in its own task; wait for it to land
        for _ in 0..100 {
            if session.state().history.contains(&id) {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(session.state().history.contains(&id));
        handle.abort();
    }
}
