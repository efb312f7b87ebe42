//! Shared plumbing for the JSON-file stores.
//!
//! Nothing is cached between calls. Readers load the file; writers take a
//! cross-process lock, re-read, change what they own and rewrite the file
//! through a temp file + rename. Two processes editing different records
//! therefore never undo each other's work.
//!
//! The lock is `<file>.lock`, created exclusively. A lock older than
//! [`STALE_LOCK_AFTER`] was left by a crashed writer and is taken over.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::{StoreError, StoreResult};

pub const STALE_LOCK_AFTER: Duration = Duration::from_secs(30);
const LOCK_RETRY: Duration = Duration::from_millis(20);
const LOCK_ATTEMPTS: u32 = 250;

fn unavailable(path: &Path, e: impl std::fmt::Display) -> StoreError {
    StoreError::Unavailable(format!("{}: {e}", path.display()))
}

/// A missing or blank file is the default value; bad JSON is `Corrupt`.
pub(crate) async fn load<T: DeserializeOwned + Default>(path: &Path) -> StoreResult<T> {
    match tokio::fs::read_to_string(path).await {
        Ok(s) if s.trim().is_empty() => Ok(T::default()),
        Ok(s) => serde_json::from_str(&s)
            .map_err(|e| StoreError::Corrupt(format!("{}: {e}", path.display()))),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(unavailable(path, e)),
    }
}

async fn persist<T: Serialize>(path: &Path, value: &T) -> StoreResult<()> {
    let json =
        serde_json::to_string_pretty(value).map_err(|e| StoreError::Corrupt(e.to_string()))?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json)
        .await
        .map_err(|e| unavailable(&tmp, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| unavailable(path, e))
}

/// Read-modify-write of the whole file under the lock. An error from `f`
/// writes nothing.
pub(crate) async fn modify<T, R, F>(path: &Path, f: F) -> StoreResult<R>
where
    T: Serialize + DeserializeOwned + Default,
    F: FnOnce(&mut T) -> StoreResult<R>,
{
    if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| unavailable(dir, e))?;
    }
    let _lock = FileLock::acquire(path).await?;
    let mut value: T = load(path).await?;
    let out = f(&mut value)?;
    persist(path, &value).await?;
    Ok(out)
}

pub(crate) fn lock_path(target: &Path) -> PathBuf {
    target.with_extension("json.lock")
}

/// Removes the lock file on drop.
struct FileLock {
    path: PathBuf,
}

impl FileLock {
    async fn acquire(target: &Path) -> StoreResult<Self> {
        let path = lock_path(target);
        for _ in 0..LOCK_ATTEMPTS {
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(_) => return Ok(Self { path }),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if is_stale(&path).await {
                        warn!(lock = %path.display(), "taking over stale lock");
                        // Losing this race to another writer is fine; the
                        // next create_new decides.
                        let _ = tokio::fs::remove_file(&path).await;
                        continue;
                    }
                    tokio::time::sleep(LOCK_RETRY).await;
                }
                Err(e) => return Err(unavailable(&path, e)),
            }
        }
        Err(StoreError::Unavailable(format!(
            "{} is locked by another writer",
            target.display()
        )))
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

async fn is_stale(lock: &Path) -> bool {
    let Ok(meta) = tokio::fs::metadata(lock).await else {
        return false;
    };
    meta.modified()
        .ok()
        .and_then(|m| SystemTime::now().duration_since(m).ok())
        .is_some_and(|age| age > STALE_LOCK_AFTER)
}
