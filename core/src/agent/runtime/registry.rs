//! Task registry
//!
//! Maps in-flight task ids to their cancellation controller. An entry exists
//! exactly while the task's execution is running; the [`RegistrationGuard`]
//! returned by [`TaskRegistry::register`] removes it on every exit path.

use crate::agent::runtime::error::RuntimeError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

struct Registration {
    /// Distinguishes a re-registration of the same id after removal
    generation: u64,
    controller: CancellationToken,
}

/// Concurrent map of live task registrations
#[derive(Default)]
pub struct TaskRegistry {
    entries: DashMap<String, Registration>,
    next_generation: AtomicU64,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `controller` under `task_id`
    ///
    /// Fails with [`RuntimeError::DuplicateTask`] when the id is already live;
    /// the existing entry is left untouched.
    pub fn register(
        self: &Arc<Self>,
        task_id: &str,
        controller: CancellationToken,
    ) -> Result<RegistrationGuard, RuntimeError> {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);

        match self.entries.entry(task_id.to_string()) {
            Entry::Occupied(_) => {
                warn!(task_id = %task_id, "Task id already registered");
                Err(RuntimeError::DuplicateTask {
                    task_id: task_id.to_string(),
                })
            }
            Entry::Vacant(slot) => {
                slot.insert(Registration {
                    generation,
                    controller,
                });
                debug!(task_id = %task_id, generation, "Task registered");
                Ok(RegistrationGuard {
                    registry: Arc::clone(self),
                    task_id: task_id.to_string(),
                    generation,
                })
            }
        }
    }

    /// Remove an entry without signalling it
    pub fn remove(&self, task_id: &str) -> Option<CancellationToken> {
        self.entries
            .remove(task_id)
            .map(|(_, registration)| registration.controller)
    }

    /// Atomically remove the entry for `task_id` and cancel its controller
    ///
    /// Returns `false` for unknown or already-finished tasks.
    pub fn cancel(&self, task_id: &str) -> bool {
        info!(task_id = %task_id, "Cancellation requested");

        match self.remove(task_id) {
            Some(controller) => {
                controller.cancel();
                info!(task_id = %task_id, "Task cancelled successfully");
                true
            }
            None => {
                warn!(task_id = %task_id, "Task not found for cancellation");
                false
            }
        }
    }

    pub fn is_live(&self, task_id: &str) -> bool {
        self.entries.contains_key(task_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn release(&self, task_id: &str, generation: u64) {
        let removed = self
            .entries
            .remove_if(task_id, |_, registration| registration.generation == generation)
            .is_some();
        debug!(task_id = %task_id, removed, "Task cleanup completed");
    }
}

/// Removes its own registration when dropped
///
/// Only the entry created by the matching `register` call is removed, so a
/// cancelled-then-resubmitted task id is never evicted by a stale guard.
pub struct RegistrationGuard {
    registry: Arc<TaskRegistry>,
    task_id: String,
    generation: u64,
}

impl RegistrationGuard {
    pub fn task_id(&self) -> &str {
        &self.task_id
    }
}

impl Drop for RegistrationGuard {
    fn drop(&mut self) {
        self.registry.release(&self.task_id, self.generation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_removes_entry() {
        let registry = Arc::new(TaskRegistry::new());
        let guard = registry.register("t1", CancellationToken::new()).unwrap();
        assert!(registry.is_live("t1"));
        assert_eq!(guard.task_id(), "t1");

        drop(guard);
        assert!(!registry.is_live("t1"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let registry = Arc::new(TaskRegistry::new());
        let _live = registry.register("t1", CancellationToken::new()).unwrap();

        let second = registry.register("t1", CancellationToken::new());
        assert!(matches!(second, Err(RuntimeError::DuplicateTask { .. })));
        assert!(registry.is_live("t1"));
    }

    #[test]
    fn test_cancel_signals_and_removes() {
        let registry = Arc::new(TaskRegistry::new());
        let token = CancellationToken::new();
        let guard = registry.register("t1", token.clone()).unwrap();

        assert!(registry.cancel("t1"));
        assert!(token.is_cancelled());
        assert!(!registry.is_live("t1"));

        // Second cancel is "not found", not a fault
        assert!(!registry.cancel("t1"));
        drop(guard);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_cancel_unknown_has_no_side_effect() {
        let registry = Arc::new(TaskRegistry::new());
        let token = CancellationToken::new();
        let _guard = registry.register("live", token.clone()).unwrap();

        assert!(!registry.cancel("missing"));
        assert!(!token.is_cancelled());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_stale_guard_keeps_newer_registration() {
        let registry = Arc::new(TaskRegistry::new());
        let old = registry.register("t1", CancellationToken::new()).unwrap();
        assert!(registry.remove("t1").is_some());

        let _new = registry.register("t1", CancellationToken::new()).unwrap();
        drop(old);
        assert!(registry.is_live("t1"));
    }

    #[tokio::test]
    async fn test_concurrent_registrations() {
        let registry = Arc::new(TaskRegistry::new());
        let mut handles = Vec::new();
        for i in 0..32 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                let id = format!("task-{}", i);
                let guard = registry.register(&id, CancellationToken::new()).unwrap();
                tokio::task::yield_now().await;
                drop(guard);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert!(registry.is_empty());
    }
}
