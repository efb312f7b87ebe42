//! In-process task store.
//!
//! Used as the test double for every service, and by the CLI for dry runs.
//! Supports fault injection so partial-failure paths can be exercised.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use turnover_core::CleaningTask;

use super::{DEFAULT_MAX_BATCH, TaskPatch, TaskQuery, TaskStore, sort_tasks};
use crate::error::{StoreError, StoreResult};

#[derive(Debug)]
pub struct InMemoryTaskStore {
    tasks: RwLock<BTreeMap<String, CleaningTask>>,
    max_batch: usize,
    failing_writes: RwLock<HashSet<String>>,
    reads_down: AtomicBool,
    batch_calls: AtomicUsize,
}

impl Default for InMemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self {
            tasks: RwLock::new(BTreeMap::new()),
            max_batch: DEFAULT_MAX_BATCH,
            failing_writes: RwLock::new(HashSet::new()),
            reads_down: AtomicBool::new(false),
            batch_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_max_batch(mut self, max_batch: usize) -> Self {
        self.max_batch = max_batch.max(1);
        self
    }

    /// Seed a record as-is, bypassing merge semantics.
    pub async fn insert(&self, task: CleaningTask) {
        self.tasks.write().await.insert(task.id.clone(), task);
    }

    pub async fn remove(&self, id: &str) -> Option<CleaningTask> {
        self.tasks.write().await.remove(id)
    }

    pub async fn all(&self) -> Vec<CleaningTask> {
        let mut out: Vec<_> = self.tasks.read().await.values().cloned().collect();
        sort_tasks(&mut out);
        out
    }

    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }

    /// Make every write to `id` fail with `Unavailable`.
    pub async fn fail_writes_for(&self, id: impl Into<String>) {
        self.failing_writes.write().await.insert(id.into());
    }

    pub async fn heal_writes(&self) {
        self.failing_writes.write().await.clear();
    }

    /// Make `get` / `query` / `batch_exists` fail with `Unavailable`.
    pub fn set_reads_down(&self, down: bool) {
        self.reads_down.store(down, Ordering::SeqCst);
    }

    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    fn check_reads(&self) -> StoreResult<()> {
        if self.reads_down.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("reads disabled".into()));
        }
        Ok(())
    }

    async fn check_write(&self, id: &str) -> StoreResult<()> {
        if self.failing_writes.read().await.contains(id) {
            return Err(StoreError::Unavailable(format!("write to {id} failed")));
        }
        Ok(())
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn get(&self, id: &str) -> StoreResult<Option<CleaningTask>> {
        self.check_reads()?;
        Ok(self.tasks.read().await.get(id).cloned())
    }

    async fn query(&self, query: &TaskQuery) -> StoreResult<Vec<CleaningTask>> {
        self.check_reads()?;
        let mut out: Vec<_> = self
            .tasks
            .read()
            .await
            .values()
            .filter(|t| query.matches(t))
            .cloned()
            .collect();
        sort_tasks(&mut out);
        Ok(out)
    }

    async fn batch_exists(&self, ids: &[String]) -> StoreResult<HashSet<String>> {
        self.check_reads()?;
        if ids.len() > self.max_batch {
            return Err(StoreError::BatchTooLarge {
                got: ids.len(),
                limit: self.max_batch,
            });
        }
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        let tasks = self.tasks.read().await;
        Ok(ids.iter().filter(|id| tasks.contains_key(*id)).cloned().collect())
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch
    }

    async fn upsert(&self, id: &str, patch: &TaskPatch) -> StoreResult<CleaningTask> {
        self.check_write(id).await?;
        let mut tasks = self.tasks.write().await;
        let task = match tasks.get_mut(id) {
            Some(existing) => {
                patch.apply(existing);
                existing.clone()
            }
            None => {
                let created = patch.create(id)?;
                tasks.insert(id.to_string(), created.clone());
                created
            }
        };
        Ok(task)
    }

    async fn update(&self, id: &str, patch: &TaskPatch) -> StoreResult<CleaningTask> {
        self.check_write(id).await?;
        let mut tasks = self.tasks.write().await;
        let existing = tasks
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        patch.apply(existing);
        Ok(existing.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::exists_chunked;
    use chrono::NaiveDate;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[tokio::test]
    async fn update_requires_existing_record() {
        let store = InMemoryTaskStore::new();
        let err = store
            .update("2025-08-10_b1", &TaskPatch::assign("c1", "Alice"))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::NotFound("2025-08-10_b1".into()));
    }

    #[tokio::test]
    async fn upsert_creates_then_merges() {
        let store = InMemoryTaskStore::new();
        let t = CleaningTask::skeleton(d("2025-08-10"), "b1", "Sato");
        store.upsert(&t.id, &TaskPatch::skeleton(&t)).await.unwrap();
        store.update(&t.id, &TaskPatch::assign("c1", "Alice")).await.unwrap();
        let merged = store.upsert(&t.id, &TaskPatch::skeleton(&t)).await.unwrap();
        assert_eq!(merged.cleaner_id.as_deref(), Some("c1"));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn batch_ceiling_is_enforced_and_chunking_respects_it() {
        let store = InMemoryTaskStore::new().with_max_batch(3);
        let ids: Vec<String> = (0..7).map(|i| format!("id{i}")).collect();
        assert!(matches!(
            store.batch_exists(&ids).await,
            Err(StoreError::BatchTooLarge { got: 7, limit: 3 })
        ));

        let t = CleaningTask::skeleton(d("2025-08-10"), "b1", "Sato");
        store.insert(t.clone()).await;
        let mut probe = ids.clone();
        probe.push(t.id.clone());
        let found = exists_chunked(&store, &probe).await.unwrap();
        assert_eq!(found, HashSet::from([t.id]));
        assert_eq!(store.batch_calls(), 3);
    }

    #[tokio::test]
    async fn injected_faults_surface_as_retryable() {
        let store = InMemoryTaskStore::new();
        store.fail_writes_for("x").await;
        let err = store.upsert("x", &TaskPatch::unassign()).await.unwrap_err();
        assert!(err.is_retryable());

        store.set_reads_down(true);
        assert!(store.get("x").await.unwrap_err().is_retryable());
    }
}
