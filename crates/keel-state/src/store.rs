//! StateStore — typed task state on top of any persister.
//!
//! This is the durable pod/task state handed to recovery overriders. Each
//! task lives at `Tasks/<task-name>` as a JSON document.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;

use crate::error::{PersisterError, PersisterResult};
use crate::persister::Persister;
use crate::types::TaskState;

const TASKS_ROOT: &str = "Tasks";

/// Convert any `Display` error into a `PersisterError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| PersisterError::$variant(e.to_string())
    };
}

#[derive(Clone)]
pub struct StateStore {
    persister: Arc<dyn Persister>,
}

impl StateStore {
    pub fn new(persister: Arc<dyn Persister>) -> Self {
        Self { persister }
    }

    pub fn persister(&self) -> &Arc<dyn Persister> {
        &self.persister
    }

    /// Insert or update a task record, stamping `updated_at`.
    pub fn store_task(&self, task: &TaskState) -> PersisterResult<()> {
        let mut task = task.clone();
        task.updated_at = epoch_secs();
        let value = serde_json::to_vec(&task).map_err(map_err!(Serialize))?;
        self.persister.set(&task_path(&task.name), &value)?;
        debug!(task = %task.name, status = ?task.status, "task state stored");
        Ok(())
    }

    /// Get a task by name.
    pub fn fetch_task(&self, name: &str) -> PersisterResult<Option<TaskState>> {
        match self.persister.get(&task_path(name)) {
            Ok(bytes) => {
                let task = serde_json::from_slice(&bytes).map_err(map_err!(Deserialize))?;
                Ok(Some(task))
            }
            Err(PersisterError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Names of every stored task, sorted.
    pub fn task_names(&self) -> PersisterResult<Vec<String>> {
        match self.persister.children(TASKS_ROOT) {
            Ok(names) => Ok(names),
            Err(PersisterError::NotFound(_)) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    /// All tasks belonging to one pod instance.
    pub fn tasks_for_pod(&self, pod_type: &str, pod_index: u32) -> PersisterResult<Vec<TaskState>> {
        let mut out = Vec::new();
        for name in self.task_names()? {
            if let Some(task) = self.fetch_task(&name)? {
                if task.pod_type == pod_type && task.pod_index == pod_index {
                    out.push(task);
                }
            }
        }
        Ok(out)
    }

    /// Flag a task as permanently failed. Fails with `NotFound` if unknown.
    pub fn set_permanently_failed(&self, name: &str) -> PersisterResult<()> {
        let mut task = self
            .fetch_task(name)?
            .ok_or_else(|| PersisterError::NotFound(task_path(name)))?;
        task.permanently_failed = true;
        self.store_task(&task)
    }

    pub fn is_permanently_failed(&self, name: &str) -> PersisterResult<bool> {
        Ok(self
            .fetch_task(name)?
            .is_some_and(|task| task.permanently_failed))
    }

    /// Delete a task record. Returns true if it existed.
    pub fn delete_task(&self, name: &str) -> PersisterResult<bool> {
        match self.persister.delete(&task_path(name)) {
            Ok(()) => Ok(true),
            Err(PersisterError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

fn task_path(name: &str) -> String {
    format!("{TASKS_ROOT}/{name}")
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinated::CoordinatedPersister;
    use crate::ensemble::Ensemble;
    use crate::types::TaskStatus;

    fn store() -> StateStore {
        let p = CoordinatedPersister::builder("/dcos-service-svc", "zk:2181")
            .build(Ensemble::open_in_memory().unwrap())
            .unwrap();
        StateStore::new(Arc::new(p))
    }

    #[test]
    fn task_put_and_get() {
        let store = store();
        let task = TaskState::new("hello", 0, "server", TaskStatus::Running);
        store.store_task(&task).unwrap();

        let fetched = store.fetch_task("hello-0-server").unwrap().unwrap();
        assert_eq!(fetched.status, TaskStatus::Running);
        assert_eq!(fetched.pod_type, "hello");
        assert!(fetched.updated_at > 0);
    }

    #[test]
    fn missing_task_is_none() {
        let store = store();
        assert!(store.fetch_task("nope").unwrap().is_none());
        assert!(store.task_names().unwrap().is_empty());
        assert!(!store.is_permanently_failed("nope").unwrap());
        assert!(!store.delete_task("nope").unwrap());
    }

    #[test]
    fn tasks_for_pod_filters_by_instance() {
        let store = store();
        store.store_task(&TaskState::new("hello", 0, "server", TaskStatus::Running)).unwrap();
        store.store_task(&TaskState::new("hello", 0, "sidecar", TaskStatus::Running)).unwrap();
        store.store_task(&TaskState::new("hello", 1, "server", TaskStatus::Lost)).unwrap();
        store.store_task(&TaskState::new("world", 0, "server", TaskStatus::Running)).unwrap();

        assert_eq!(store.task_names().unwrap().len(), 4);
        assert_eq!(store.tasks_for_pod("hello", 0).unwrap().len(), 2);
        assert_eq!(store.tasks_for_pod("hello", 1).unwrap().len(), 1);
        assert!(store.tasks_for_pod("hello", 2).unwrap().is_empty());
    }

    #[test]
    fn permanent_failure_flag() {
        let store = store();
        store.store_task(&TaskState::new("hello", 1, "server", TaskStatus::Lost)).unwrap();
        assert!(!store.is_permanently_failed("hello-1-server").unwrap());

        store.set_permanently_failed("hello-1-server").unwrap();
        assert!(store.is_permanently_failed("hello-1-server").unwrap());
        assert!(store.set_permanently_failed("ghost-0-server").unwrap_err().is_not_found());
    }

    #[test]
    fn delete_task_removes_record() {
        let store = store();
        store.store_task(&TaskState::new("hello", 0, "server", TaskStatus::Finished)).unwrap();
        assert!(store.delete_task("hello-0-server").unwrap());
        assert!(store.fetch_task("hello-0-server").unwrap().is_none());
    }

    #[test]
    fn terminal_statuses() {
        assert!(!TaskStatus::Running.is_terminal());
        assert!(!TaskStatus::Staging.is_terminal());
        assert!(TaskStatus::Lost.is_terminal());
        assert!(TaskStatus::Finished.is_terminal());
    }
}
