//! In-memory registry of queued and running download tasks.

use rand::Rng;

use crate::events::ProgressUpdate;
use crate::model::{Task, TaskStatus, DEFAULT_ETA, DEFAULT_SPEED, FAILED_SPEED};

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_LEN: usize = 8;

/// Tasks in the order they were queued. Finished tasks are removed, failed ones stay.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: Vec<Task>,
}

impl TaskRegistry {
    /// Registers a new `Waiting` task and returns its freshly generated id.
    pub fn create_task(&mut self, url: &str, title: &str, thumbnail: &str) -> String {
        let id = self.fresh_id();
        self.tasks.push(Task {
            id: id.clone(),
            url: url.to_string(),
            title: title.to_string(),
            thumbnail: thumbnail.to_string(),
            status: TaskStatus::Waiting,
            percent: 0.0,
            speed: DEFAULT_SPEED.to_string(),
            eta: DEFAULT_ETA.to_string(),
        });
        id
    }

    /// Merges a progress report into its task. Returns false for unknown ids.
    ///
    /// Fields absent from the report keep their previous value. Without an
    /// explicit status the task is considered `Downloading`.
    pub fn apply_progress(&mut self, update: &ProgressUpdate) -> bool {
        let Some(task) = self.get_mut(&update.id) else {
            return false;
        };
        if let Some(percent) = update.percent {
            task.percent = percent.clamp(0.0, 100.0);
        }
        if let Some(speed) = &update.speed {
            task.speed = speed.clone();
        }
        if let Some(eta) = &update.eta {
            task.eta = eta.clone();
        }
        task.status = update.status.unwrap_or(TaskStatus::Downloading);
        true
    }

    pub fn mark_started(&mut self, id: &str) -> bool {
        match self.get_mut(id) {
            Some(task) => {
                task.status = TaskStatus::Downloading;
                true
            }
            None => false,
        }
    }

    /// Removes the task. Calling it again for the same id is a no-op.
    pub fn complete(&mut self, id: &str) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        self.tasks.len() != before
    }

    /// Flags the task as failed without removing it.
    pub fn mark_error(&mut self, id: &str) -> bool {
        match self.get_mut(id) {
            Some(task) => {
                task.status = TaskStatus::Error;
                task.speed = FAILED_SPEED.to_string();
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    fn fresh_id(&self) -> String {
        let mut rng = rand::thread_rng();
        loop {
            let id: String = (0..ID_LEN)
                .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
                .collect();
            if !self.contains(&id) {
                return id;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn progress(id: &str, percent: f32) -> ProgressUpdate {
        ProgressUpdate {
            id: id.to_string(),
            percent: Some(percent),
            speed: Some("1.2MiB/s".to_string()),
            eta: Some("00:42".to_string()),
            status: None,
        }
    }

    #[test]
    fn created_ids_are_unique_among_live_tasks() {
        let mut reg = TaskRegistry::default();
        let ids: HashSet<String> = (0..500).map(|_| reg.create_task("http://x", "t", "")).collect();
        assert_eq!(ids.len(), 500);
        assert_eq!(reg.len(), 500);
        assert!(ids.iter().all(|id| id.len() == ID_LEN));
    }

    #[test]
    fn new_task_has_defaults() {
        let mut reg = TaskRegistry::default();
        let id = reg.create_task("http://x", "Title", "http://thumb");
        let task = reg.get(&id).unwrap();
        assert_eq!(task.status, TaskStatus::Waiting);
        assert_eq!(task.percent, 0.0);
        assert_eq!(task.speed, DEFAULT_SPEED);
        assert_eq!(task.eta, DEFAULT_ETA);
        assert_eq!(task.title, "Title");
    }

    #[test]
    fn progress_for_unknown_id_changes_nothing() {
        let mut reg = TaskRegistry::default();
        let id = reg.create_task("http://x", "t", "");
        let before: Vec<Task> = reg.iter().cloned().collect();
        assert!(!reg.apply_progress(&progress("missing", 50.0)));
        let after: Vec<Task> = reg.iter().cloned().collect();
        assert_eq!(before, after);
        assert!(reg.contains(&id));
    }

    #[test]
    fn progress_without_status_promotes_waiting_task() {
        let mut reg = TaskRegistry::default();
        let id = reg.create_task("http://x", "t", "");
        assert!(reg.apply_progress(&progress(&id, 12.5)));
        let task = reg.get(&id).unwrap();
        assert_eq!(task.status, TaskStatus::Downloading);
        assert_eq!(task.percent, 12.5);
        assert_eq!(task.speed, "1.2MiB/s");
    }

    #[test]
    fn missing_progress_fields_keep_previous_values() {
        let mut reg = TaskRegistry::default();
        let id = reg.create_task("http://x", "t", "");
        reg.apply_progress(&progress(&id, 30.0));
        reg.apply_progress(&ProgressUpdate {
            id: id.clone(),
            percent: Some(140.0),
            speed: None,
            eta: None,
            status: None,
        });
        let task = reg.get(&id).unwrap();
        assert_eq!(task.percent, 100.0);
        assert_eq!(task.speed, "1.2MiB/s");
        assert_eq!(task.eta, "00:42");
    }

    #[test]
    fn started_keeps_progress_fields() {
        let mut reg = TaskRegistry::default();
        let id = reg.create_task("http://x", "t", "");
        reg.apply_progress(&ProgressUpdate {
            status: Some(TaskStatus::Waiting),
            ..progress(&id, 5.0)
        });
        assert_eq!(reg.get(&id).unwrap().status, TaskStatus::Waiting);
        assert!(reg.mark_started(&id));
        let task = reg.get(&id).unwrap();
        assert_eq!(task.status, TaskStatus::Downloading);
        assert_eq!(task.percent, 5.0);
        assert!(!reg.mark_started("missing"));
    }

    #[test]
    fn complete_is_idempotent() {
        let mut reg = TaskRegistry::default();
        let a = reg.create_task("http://a", "a", "");
        let b = reg.create_task("http://b", "b", "");
        assert!(reg.complete(&a));
        assert_eq!(reg.len(), 1);
        assert!(!reg.complete(&a));
        assert_eq!(reg.len(), 1);
        assert!(reg.contains(&b));
    }

    #[test]
    fn error_keeps_task_and_can_be_overwritten() {
        let mut reg = TaskRegistry::default();
        let id = reg.create_task("http://x", "t", "");
        assert!(reg.mark_error(&id));
        let task = reg.get(&id).unwrap();
        assert_eq!(task.status, TaskStatus::Error);
        assert_eq!(task.speed, FAILED_SPEED);
        assert_eq!(reg.len(), 1);

        // a stray progress report after a failure is not locked out
        reg.apply_progress(&progress(&id, 60.0));
        assert_eq!(reg.get(&id).unwrap().status, TaskStatus::Downloading);
        assert!(!reg.mark_error("missing"));
    }

    #[test]
    fn progress_after_complete_does_not_resurrect() {
        let mut reg = TaskRegistry::default();
        let id = reg.create_task("http://x", "t", "");
        reg.complete(&id);
        assert!(!reg.apply_progress(&progress(&id, 99.0)));
        assert!(reg.is_empty());
    }

    #[test]
    fn iteration_follows_queue_order() {
        let mut reg = TaskRegistry::default();
        let ids: Vec<String> = ["a", "b", "c"]
            .iter()
            .map(|t| reg.create_task("http://x", t, ""))
            .collect();
        let seen: Vec<String> = reg.iter().map(|t| t.id.clone()).collect();
        assert_eq!(ids, seen);
    }
}
