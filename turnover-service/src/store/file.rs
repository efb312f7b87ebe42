//! JSON-file task store for single-operator deployments.
//!
//! The whole collection lives in one file keyed by task id. Every call goes
//! back to the file (see [`crate::json_file`]), so several handles or
//! processes on one path see each other's writes and only ever change the
//! record they target.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;
use turnover_core::CleaningTask;

use super::{DEFAULT_MAX_BATCH, TaskPatch, TaskQuery, TaskStore, sort_tasks};
use crate::error::{StoreError, StoreResult};
use crate::json_file;

type Collection = BTreeMap<String, CleaningTask>;

#[derive(Debug)]
pub struct JsonFileTaskStore {
    path: PathBuf,
    max_batch: usize,
}

impl JsonFileTaskStore {
    /// Open (or start) a collection at `path`. A missing file is an empty
    /// collection; an unreadable one is `Corrupt`.
    pub async fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let tasks: Collection = json_file::load(&path).await?;
        debug!(path = %path.display(), tasks = tasks.len(), "task file opened");
        Ok(Self {
            path,
            max_batch: DEFAULT_MAX_BATCH,
        })
    }

    pub fn with_max_batch(mut self, max_batch: usize) -> Self {
        self.max_batch = max_batch.max(1);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> StoreResult<Collection> {
        json_file::load(&self.path).await
    }

    async fn write_with<F>(&self, id: &str, f: F) -> StoreResult<CleaningTask>
    where
        F: FnOnce(&mut Collection) -> StoreResult<CleaningTask>,
    {
        let task = json_file::modify(&self.path, f).await?;
        debug!(task_id = id, "task written");
        Ok(task)
    }
}

#[async_trait]
impl TaskStore for JsonFileTaskStore {
    async fn get(&self, id: &str) -> StoreResult<Option<CleaningTask>> {
        Ok(self.load().await?.remove(id))
    }

    async fn query(&self, query: &TaskQuery) -> StoreResult<Vec<CleaningTask>> {
        let mut out: Vec<_> = self
            .load()
            .await?
            .into_values()
            .filter(|t| query.matches(t))
            .collect();
        sort_tasks(&mut out);
        Ok(out)
    }

    async fn batch_exists(&self, ids: &[String]) -> StoreResult<HashSet<String>> {
        if ids.len() > self.max_batch {
            return Err(StoreError::BatchTooLarge {
                got: ids.len(),
                limit: self.max_batch,
            });
        }
        let tasks = self.load().await?;
        Ok(ids.iter().filter(|id| tasks.contains_key(*id)).cloned().collect())
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch
    }

    async fn upsert(&self, id: &str, patch: &TaskPatch) -> StoreResult<CleaningTask> {
        self.write_with(id, |tasks| match tasks.get_mut(id) {
            Some(existing) => {
                patch.apply(existing);
                Ok(existing.clone())
            }
            None => {
                let created = patch.create(id)?;
                tasks.insert(id.to_string(), created.clone());
                Ok(created)
            }
        })
        .await
    }

    async fn update(&self, id: &str, patch: &TaskPatch) -> StoreResult<CleaningTask> {
        self.write_with(id, |tasks| {
            let existing = tasks
                .get_mut(id)
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            patch.apply(existing);
            Ok(existing.clone())
        })
        .await
    }
}
