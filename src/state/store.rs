//! Shared, lock-guarded access to the state log
//!
//! One [`StateStore`] owns the in-memory log for a state log path. Share it between
//! tasks with an `Arc`. Every mutation is persisted before the lock is released.
//!
//! Refresh tasks read the log, release the lock, download, and then lock again to
//! commit. The check and the commit are not one critical section: two tasks can both
//! see a source as stale and both download it. The later commit wins, which is
//! harmless since both write "now".

use super::{persist, StateLog};
use crate::error::Result;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, MutexGuard};

pub struct StateStore {
    path: PathBuf,
    state_log: Mutex<StateLog>,
}

impl StateStore {
    /// Open the state log at `path`, creating it on disk if it doesn't exist
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let state_log = persist::load(&path)?;
        Ok(Self {
            path,
            state_log: Mutex::new(state_log),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wait for the lock and return a handle to the locked state log.
    ///
    /// The lock is not reentrant: drop, [`StateHandle::release`] or
    /// [`StateHandle::commit`] the handle before acquiring again from the same task.
    pub async fn acquire(&self) -> StateHandle<'_> {
        StateHandle {
            guard: self.state_log.lock().await,
            path: &self.path,
        }
    }

    /// Lock, apply `update`, persist, unlock
    pub async fn update<F>(&self, update: F) -> Result<()>
    where
        F: FnOnce(&mut StateLog),
    {
        self.acquire().await.commit(update)
    }

    /// Copy of the current state log
    pub async fn snapshot(&self) -> StateLog {
        self.state_log.lock().await.clone()
    }
}

/// The locked state log. Unlocks when released, committed or dropped.
pub struct StateHandle<'a> {
    guard: MutexGuard<'a, StateLog>,
    path: &'a Path,
}

impl StateHandle<'_> {
    /// Unlock without writing anything
    pub fn release(self) {}

    /// Apply `update` to the held log, persist it and unlock.
    ///
    /// The update is applied to a copy that is only swapped in after it was saved,
    /// so a failed write leaves the in-memory log as it was.
    pub fn commit<F>(mut self, update: F) -> Result<()>
    where
        F: FnOnce(&mut StateLog),
    {
        let mut updated = self.guard.clone();
        update(&mut updated);
        persist::save(&updated, self.path)?;
        *self.guard = updated;
        Ok(())
    }
}

impl Deref for StateHandle<'_> {
    type Target = StateLog;

    fn deref(&self) -> &StateLog {
        &self.guard
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::persist::STATE_LOG_FILE_NAME;
    use chrono::{DateTime, TimeZone, Utc};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn test_store() -> (TempDir, Arc<StateStore>) {
        let temp_dir = TempDir::new().unwrap();
        let store = StateStore::open(temp_dir.path().join(STATE_LOG_FILE_NAME)).unwrap();
        (temp_dir, Arc::new(store))
    }

    fn date(year: i32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, 12, 12, 0, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn open_creates_state_log_on_disk() {
        let (_temp_dir, store) = test_store();
        assert!(store.path().exists());
        assert_eq!(store.snapshot().await, StateLog::new());
    }

    #[tokio::test]
    async fn update_persists_to_disk() {
        let (_temp_dir, store) = test_store();

        store
            .update(|state_log| state_log.goatbots.prices_updated_at = date(2021))
            .await
            .unwrap();

        assert_eq!(store.snapshot().await.goatbots.prices_updated_at, date(2021));
        let on_disk = persist::load(store.path()).unwrap();
        assert_eq!(on_disk.goatbots.prices_updated_at, date(2021));
    }

    #[tokio::test]
    async fn release_does_not_persist() {
        let (_temp_dir, store) = test_store();
        let before = std::fs::read_to_string(store.path()).unwrap();

        let handle = store.acquire().await;
        assert_eq!(handle.title, crate::state::STATE_LOG_TITLE);
        handle.release();

        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), before);
        // Lock is free again
        store.acquire().await.release();
    }

    #[tokio::test]
    async fn committing_same_mark_twice_is_safe() {
        let (_temp_dir, store) = test_store();
        let now = Utc::now();

        store.update(|l| l.mark_prices_updated(now)).await.unwrap();
        let first = store.snapshot().await;
        store.update(|l| l.mark_prices_updated(now)).await.unwrap();

        assert_eq!(store.snapshot().await, first);
        assert_eq!(persist::load(store.path()).unwrap(), first);
    }

    #[tokio::test]
    async fn failed_save_leaves_memory_unchanged() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("state");
        let store = StateStore::open(dir.join(STATE_LOG_FILE_NAME)).unwrap();

        // Replace the directory with a plain file so the save can't succeed
        std::fs::remove_dir_all(&dir).unwrap();
        std::fs::write(&dir, b"in the way").unwrap();

        let result = store
            .update(|state_log| state_log.goatbots.prices_updated_at = date(2021))
            .await;

        assert!(result.is_err());
        assert_eq!(store.snapshot().await, StateLog::new());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_access_is_serialized() {
        // Task 1 locks the log, holds it for 100ms, then commits the 2021 date.
        // Task 2 starts 80ms in, blocks on the lock, must see the 2021 date once it
        // gets the lock, and then commits the 2022 date.
        let (_temp_dir, store) = test_store();

        let store_1 = Arc::clone(&store);
        let task_1 = tokio::spawn(async move {
            let handle = store_1.acquire().await;
            tokio::time::sleep(Duration::from_millis(100)).await;
            handle
                .commit(|state_log| state_log.goatbots.card_definitions_updated_at = date(2021))
                .unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
        });

        let store_2 = Arc::clone(&store);
        let task_2 = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(80)).await;
            let handle = store_2.acquire().await;
            let seen = handle.goatbots.card_definitions_updated_at;
            handle
                .commit(|state_log| state_log.goatbots.card_definitions_updated_at = date(2022))
                .unwrap();
            seen
        });

        task_1.await.unwrap();
        let seen_by_task_2 = task_2.await.unwrap();

        assert_eq!(seen_by_task_2, date(2021));
        assert_eq!(
            store.snapshot().await.goatbots.card_definitions_updated_at,
            date(2022)
        );
        let on_disk = persist::load(store.path()).unwrap();
        assert_eq!(on_disk.goatbots.card_definitions_updated_at, date(2022));
    }
}
