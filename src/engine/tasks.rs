//! Bookkeeping for generations started in the background
//!
//! Finished records are dropped once they are older than the store's TTL;
//! their meshes stay on disk.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Lifecycle of a background generation
#[derive(Debug, Clone, PartialEq)]
pub enum TaskStatus {
    Processing,
    Completed { path: PathBuf },
    Failed { error: String },
}

#[derive(Debug, Clone)]
pub struct TaskRecord {
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// In-memory task table keyed by request uid
pub struct TaskStore {
    tasks: RwLock<HashMap<Uuid, TaskRecord>>,
    ttl: Duration,
}

impl TaskStore {
    /// Create a store keeping finished tasks for `ttl`
    pub fn new(ttl: Duration) -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Register a task as processing, evicting expired records first
    pub async fn insert(&self, uid: Uuid) {
        let now = Utc::now();
        let mut tasks = self.tasks.write().await;
        let evicted = Self::evict_expired(&mut tasks, self.ttl);
        if evicted > 0 {
            tracing::debug!("evicted {} finished tasks", evicted);
        }
        tasks.insert(
            uid,
            TaskRecord {
                status: TaskStatus::Processing,
                created_at: now,
                updated_at: now,
            },
        );
    }

    pub async fn complete(&self, uid: Uuid, path: PathBuf) {
        self.set_status(uid, TaskStatus::Completed { path }).await;
    }

    pub async fn fail(&self, uid: Uuid, error: String) {
        self.set_status(uid, TaskStatus::Failed { error }).await;
    }

    async fn set_status(&self, uid: Uuid, status: TaskStatus) {
        let mut tasks = self.tasks.write().await;
        let now = Utc::now();
        let record = tasks.entry(uid).or_insert_with(|| TaskRecord {
            status: TaskStatus::Processing,
            created_at: now,
            updated_at: now,
        });
        record.status = status;
        record.updated_at = now;
    }

    /// Drop finished records older than the TTL; returns how many were removed
    pub async fn prune(&self) -> usize {
        Self::evict_expired(&mut *self.tasks.write().await, self.ttl)
    }

    fn evict_expired(tasks: &mut HashMap<Uuid, TaskRecord>, ttl: Duration) -> usize {
        let now = Utc::now();
        let before = tasks.len();
        tasks.retain(|_, record| {
            record.status == TaskStatus::Processing
                || !matches!((now - record.updated_at).to_std(), Ok(age) if age > ttl)
        });
        before - tasks.len()
    }

    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn get(&self, uid: &Uuid) -> Option<TaskRecord> {
        self.tasks.read().await.get(uid).cloned()
    }

    /// Number of tasks still running
    pub async fn processing(&self) -> usize {
        self.tasks
            .read()
            .await
            .values()
            .filter(|t| t.status == TaskStatus::Processing)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_task_lifecycle() {
        let store = TaskStore::new(Duration::from_secs(3600));
        let done = Uuid::new_v4();
        let broken = Uuid::new_v4();

        store.insert(done).await;
        store.insert(broken).await;
        assert_eq!(store.processing().await, 2);

        store.complete(done, PathBuf::from("out/done.glb")).await;
        store.fail(broken, "CUDA out of memory".to_string()).await;
        assert_eq!(store.processing().await, 0);

        let record = store.get(&done).await.unwrap();
        assert_eq!(
            record.status,
            TaskStatus::Completed {
                path: PathBuf::from("out/done.glb")
            }
        );
        assert!(record.updated_at >= record.created_at);

        let record = store.get(&broken).await.unwrap();
        assert!(matches!(record.status, TaskStatus::Failed { .. }));

        assert!(store.get(&Uuid::new_v4()).await.is_none());
        assert_eq!(store.prune().await, 0);
    }

    #[tokio::test]
    async fn test_expired_tasks_are_evicted() {
        let store = TaskStore::new(Duration::from_millis(20));
        let done = Uuid::new_v4();
        let broken = Uuid::new_v4();
        let running = Uuid::new_v4();

        store.insert(done).await;
        store.insert(broken).await;
        store.insert(running).await;
        store.complete(done, PathBuf::from("out/done.glb")).await;
        store.fail(broken, "boom".to_string()).await;

        tokio::time::sleep(Duration::from_millis(50)).await;

        let fresh = Uuid::new_v4();
        store.insert(fresh).await;
        assert_eq!(store.len().await, 2);
        assert!(store.get(&done).await.is_none());
        assert!(store.get(&broken).await.is_none());
        assert!(store.get(&running).await.is_some());
        assert!(store.get(&fresh).await.is_some());
    }
}
