// =============================================================================
// Task Router (spec §4.3 / C3)
// =============================================================================
//
// Maps outstanding `task_id -> client_id` so a `task.completed` /
// `task.failed` notification can be routed back to the client that asked for
// it. Rows also carry a deadline; a background sweep cancels tasks that
// never got an answer within `Timeouts::task_deadline` (spec §4.3 "no
// response within N seconds").
// =============================================================================

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

struct PendingTask {
    client_id: Uuid,
    request_id: Option<String>,
    deadline: Instant,
}

pub struct TaskRouter {
    pending: Mutex<HashMap<i64, PendingTask>>,
    task_deadline: Duration,
}

impl TaskRouter {
    pub fn new(task_deadline: Duration) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            task_deadline,
        }
    }

    /// Record that `client_id` is waiting on `task_id`, along with the
    /// `requestId` its original request carried so the eventual terminal
    /// message can echo it back (spec §4.6).
    pub fn track(&self, task_id: i64, client_id: Uuid, request_id: Option<String>) {
        self.pending.lock().insert(
            task_id,
            PendingTask {
                client_id,
                request_id,
                deadline: Instant::now() + self.task_deadline,
            },
        );
    }

    /// Resolve and remove a task, returning the waiting client and its
    /// original `requestId` if still known.
    pub fn resolve(&self, task_id: i64) -> Option<(Uuid, Option<String>)> {
        self.pending.lock().remove(&task_id).map(|t| (t.client_id, t.request_id))
    }

    /// Remove every pending task owned by a disconnecting client.
    pub fn drop_client(&self, client_id: Uuid) {
        self.pending.lock().retain(|_, t| t.client_id != client_id);
    }

    /// Sweep for tasks past their deadline. Returns `(task_id, client_id,
    /// request_id)` triples so the caller can push a `TIMEOUT` error to each
    /// waiting client.
    pub fn sweep_expired(&self) -> Vec<(i64, Uuid, Option<String>)> {
        let now = Instant::now();
        let mut pending = self.pending.lock();
        let expired: Vec<i64> = pending
            .iter()
            .filter(|(_, t)| t.deadline <= now)
            .map(|(id, _)| *id)
            .collect();

        let mut result = Vec::with_capacity(expired.len());
        for task_id in expired {
            if let Some(task) = pending.remove(&task_id) {
                warn!(task_id, client_id = %task.client_id, "task deadline exceeded");
                result.push((task_id, task.client_id, task.request_id));
            }
        }
        if !result.is_empty() {
            debug!(count = result.len(), "swept expired tasks");
        }
        result
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_and_resolve_roundtrip() {
        let router = TaskRouter::new(Duration::from_secs(30));
        let client_id = Uuid::new_v4();
        router.track(42, client_id, Some("r1".to_string()));
        assert_eq!(router.resolve(42), Some((client_id, Some("r1".to_string()))));
        assert_eq!(router.resolve(42), None);
    }

    #[test]
    fn drop_client_removes_only_its_tasks() {
        let router = TaskRouter::new(Duration::from_secs(30));
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        router.track(1, a, None);
        router.track(2, b, None);
        router.drop_client(a);
        assert_eq!(router.pending_count(), 1);
        assert_eq!(router.resolve(2), Some((b, None)));
    }

    #[test]
    fn sweep_expired_reports_overdue_tasks() {
        let router = TaskRouter::new(Duration::from_millis(1));
        let client_id = Uuid::new_v4();
        router.track(7, client_id, None);
        std::thread::sleep(Duration::from_millis(5));
        let expired = router.sweep_expired();
        assert_eq!(expired, vec![(7, client_id, None)]);
        assert_eq!(router.pending_count(), 0);
    }
}
