use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use log::{error, info};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::oneshot;

mod migrations;

use migrations::run_migrations;

use crate::models::{Settings, StoredUser, TimeTrackingMap};

const SETTINGS_KEY: &str = "scrollstop_settings";
const USER_KEY: &str = "scrollstop_user";
const TIME_TRACKING_KEY: &str = "scrollstop_time_tracking";

type DbTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum DbCommand {
    Execute(DbTask),
    Shutdown,
}

struct StorageInner {
    sender: mpsc::Sender<DbCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for StorageInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(DbCommand::Shutdown) {
                error!("Failed to send shutdown to storage thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join storage thread: {join_err:?}");
            }
        }
    }
}

/// SQLite-backed key-value store for the settings, stored-user and
/// time-tracking blobs. Every blob is read and written whole; there is no
/// partial-field update API.
///
/// All SQL runs on one dedicated worker thread; async callers bridge via a
/// oneshot reply channel.
#[derive(Clone)]
pub struct Storage {
    inner: Arc<StorageInner>,
    db_path: Arc<PathBuf>,
}

impl Storage {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create storage directory {}", parent.display())
            })?;
        }

        let (command_tx, command_rx) = mpsc::channel::<DbCommand>();
        let (ready_tx, ready_rx) = mpsc::channel();
        let path_for_thread = db_path.clone();

        let worker = thread::Builder::new()
            .name("scrollstop-db".into())
            .spawn(move || {
                let mut conn = match Connection::open(&path_for_thread) {
                    Ok(connection) => connection,
                    Err(err) => {
                        let _ = ready_tx.send(Err(anyhow::Error::new(err)
                            .context("failed to open SQLite database")));
                        return;
                    }
                };

                if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                    error!("Failed to enable WAL mode: {err}");
                }

                let init_result =
                    run_migrations(&mut conn).context("failed to run database migrations");
                if ready_tx.send(init_result).is_err() {
                    error!("Storage initialization receiver dropped before ready signal");
                    return;
                }

                while let Ok(command) = command_rx.recv() {
                    match command {
                        DbCommand::Execute(task) => {
                            task(&mut conn);
                        }
                        DbCommand::Shutdown => break,
                    }
                }

                info!("Storage thread shutting down");
            })
            .with_context(|| "failed to spawn storage worker thread")?;

        ready_rx
            .recv()
            .context("storage worker exited before signaling readiness")??;

        info!("Storage initialized at {}", db_path.as_path().display());

        Ok(Self {
            inner: Arc::new(StorageInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
            db_path: Arc::new(db_path),
        })
    }

    pub fn path(&self) -> &Path {
        self.db_path.as_path()
    }

    async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let sender = self.inner.sender.clone();
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = DbCommand::Execute(Box::new(move |conn| {
            let result = task(conn);
            if reply_tx.send(result).is_err() {
                error!("Storage caller dropped before receiving result");
            }
        }));

        sender
            .send(command)
            .map_err(|err| anyhow!("failed to send command to storage thread: {err}"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("storage thread terminated unexpectedly"))?
    }

    async fn read_blob<T>(&self, key: &'static str) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.execute(move |conn| {
            let raw: Option<String> = conn
                .query_row(
                    "SELECT value FROM kv_store WHERE key = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()
                .with_context(|| format!("failed to read blob '{key}'"))?;

            match raw {
                Some(json) => {
                    let value = serde_json::from_str(&json)
                        .with_context(|| format!("failed to decode blob '{key}'"))?;
                    Ok(Some(value))
                }
                None => Ok(None),
            }
        })
        .await
    }

    async fn write_blob<T>(&self, key: &'static str, value: &T) -> Result<()>
    where
        T: Serialize,
    {
        let json = serde_json::to_string(value)
            .with_context(|| format!("failed to encode blob '{key}'"))?;
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                                updated_at = excluded.updated_at",
                params![key, json, Utc::now().to_rfc3339()],
            )
            .with_context(|| format!("failed to write blob '{key}'"))?;
            Ok(())
        })
        .await
    }

    async fn delete_blob(&self, key: &'static str) -> Result<()> {
        self.execute(move |conn| {
            conn.execute("DELETE FROM kv_store WHERE key = ?1", params![key])
                .with_context(|| format!("failed to delete blob '{key}'"))?;
            Ok(())
        })
        .await
    }

    /// Settings blob, falling back to defaults when nothing has been saved.
    pub async fn get_settings(&self) -> Result<Settings> {
        Ok(self.read_blob(SETTINGS_KEY).await?.unwrap_or_default())
    }

    pub async fn save_settings(&self, settings: &Settings) -> Result<()> {
        self.write_blob(SETTINGS_KEY, settings).await
    }

    /// The whole domain → time record map. Mutate one key, then write the
    /// whole map back with [`Storage::save_time_tracking`].
    pub async fn get_time_tracking(&self) -> Result<TimeTrackingMap> {
        Ok(self.read_blob(TIME_TRACKING_KEY).await?.unwrap_or_default())
    }

    pub async fn save_time_tracking(&self, data: &TimeTrackingMap) -> Result<()> {
        self.write_blob(TIME_TRACKING_KEY, data).await
    }

    pub async fn get_user(&self) -> Result<Option<StoredUser>> {
        self.read_blob(USER_KEY).await
    }

    pub async fn save_user(&self, user: &StoredUser) -> Result<()> {
        self.write_blob(USER_KEY, user).await
    }

    pub async fn clear_user(&self) -> Result<()> {
        self.delete_blob(USER_KEY).await
    }

    /// Explicit user reset for one domain: zero the accumulated time and
    /// clear the blocked flag, leaving other domains untouched.
    pub async fn reset_domain(&self, domain: &str) -> Result<()> {
        let mut data = self.get_time_tracking().await?;
        if let Some(record) = data.get_mut(domain) {
            record.total_seconds = 0.0;
            record.blocked = false;
            self.save_time_tracking(&data).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DomainTimeRecord;

    fn temp_storage() -> (tempfile::TempDir, Storage) {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path().join("scrollstop.sqlite3")).unwrap();
        (dir, storage)
    }

    #[tokio::test]
    async fn settings_default_until_saved() {
        let (_dir, storage) = temp_storage();

        let settings = storage.get_settings().await.unwrap();
        assert_eq!(settings, Settings::default());

        let mut custom = Settings::default();
        custom.time_limit_minutes = 1;
        storage.save_settings(&custom).await.unwrap();
        assert_eq!(storage.get_settings().await.unwrap(), custom);
    }

    #[tokio::test]
    async fn time_tracking_round_trips_whole_map() {
        let (_dir, storage) = temp_storage();
        let now = Utc::now();

        let mut map = TimeTrackingMap::new();
        map.insert("reddit.com".into(), DomainTimeRecord::new(now));
        map.insert("x.com".into(), DomainTimeRecord::new(now));
        storage.save_time_tracking(&map).await.unwrap();

        let loaded = storage.get_time_tracking().await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert!(!loaded["reddit.com"].blocked);
    }

    #[tokio::test]
    async fn reset_domain_clears_time_and_block_flag_only_for_that_domain() {
        let (_dir, storage) = temp_storage();
        let now = Utc::now();

        let mut map = TimeTrackingMap::new();
        let mut blocked = DomainTimeRecord::new(now);
        blocked.total_seconds = 901.0;
        blocked.blocked = true;
        map.insert("reddit.com".into(), blocked);
        let mut other = DomainTimeRecord::new(now);
        other.total_seconds = 42.0;
        map.insert("x.com".into(), other);
        storage.save_time_tracking(&map).await.unwrap();

        storage.reset_domain("reddit.com").await.unwrap();

        let loaded = storage.get_time_tracking().await.unwrap();
        assert_eq!(loaded["reddit.com"].total_seconds, 0.0);
        assert!(!loaded["reddit.com"].blocked);
        assert_eq!(loaded["x.com"].total_seconds, 42.0);
    }

    #[tokio::test]
    async fn user_save_and_clear() {
        let (_dir, storage) = temp_storage();
        assert!(storage.get_user().await.unwrap().is_none());

        let user = StoredUser {
            id: "u1".into(),
            username: "sam".into(),
            token: "tok".into(),
        };
        storage.save_user(&user).await.unwrap();
        assert_eq!(storage.get_user().await.unwrap(), Some(user));

        storage.clear_user().await.unwrap();
        assert!(storage.get_user().await.unwrap().is_none());
    }
}
