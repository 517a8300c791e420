use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use log::{error, info};
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::oneshot;

mod migrations;

use crate::persistence::KeyValueStore;
use migrations::run_migrations;

type DbTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum DbCommand {
    Execute(DbTask),
    Shutdown,
}

struct DatabaseInner {
    sender: mpsc::Sender<DbCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
    last_write_error: Arc<Mutex<Option<String>>>,
}

impl Drop for DatabaseInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        // Shutdown queues behind pending writes, so they drain before the join.
        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(DbCommand::Shutdown) {
                error!("Failed to send shutdown to DB thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join DB thread: {join_err:?}");
            }
        }
    }
}

/// SQLite-backed key-value store. Every statement runs on one worker thread
/// in the order it was submitted.
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
    db_path: Arc<PathBuf>,
}

impl Database {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let (command_tx, command_rx) = mpsc::channel::<DbCommand>();
        let (ready_tx, ready_rx) = mpsc::channel();
        let path_for_thread = db_path.clone();

        let worker = thread::Builder::new()
            .name("tally-db".into())
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
                    error!("DB initialization receiver dropped before ready signal");
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

                info!("Database thread shutting down");
            })
            .with_context(|| "failed to spawn database worker thread")?;

        ready_rx
            .recv()
            .context("database worker exited before signaling readiness")??;

        info!("Database initialized at {}", db_path.as_path().display());

        Ok(Self {
            inner: Arc::new(DatabaseInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
                last_write_error: Arc::new(Mutex::new(None)),
            }),
            db_path: Arc::new(db_path),
        })
    }

    pub fn path(&self) -> &Path {
        self.db_path.as_path()
    }

    /// Run `task` on the worker and wait for its result.
    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.enqueue(move |conn| {
            let result = task(conn);
            if reply_tx.send(result).is_err() {
                error!("DB caller dropped before receiving result");
            }
        })?;

        reply_rx
            .await
            .map_err(|_| anyhow!("database thread terminated unexpectedly"))?
    }

    /// Queue `task` without waiting for it to run.
    fn enqueue<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce(&mut Connection) + Send + 'static,
    {
        self.inner
            .sender
            .send(DbCommand::Execute(Box::new(task)))
            .map_err(|err| anyhow!("failed to send command to DB thread: {err}"))
    }

    pub async fn get_value(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        self.execute(move |conn| {
            conn.query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .with_context(|| format!("failed to read key '{key}'"))
        })
        .await
    }

    pub fn put_value(&self, key: &str, value: String) {
        let key = key.to_string();
        let errors = Arc::clone(&self.inner.last_write_error);
        let record_failure = move |message: String| {
            error!("{message}");
            let mut guard = match errors.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            *guard = Some(message);
        };

        let task_failure = record_failure.clone();
        let queued = self.enqueue(move |conn| {
            let result = conn.execute(
                "INSERT INTO kv_store (key, value, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET
                     value = excluded.value,
                     updated_at = excluded.updated_at",
                params![key, value, Utc::now().to_rfc3339()],
            );
            if let Err(err) = result {
                task_failure(format!("failed to write key '{key}': {err}"));
            }
        });

        if let Err(err) = queued {
            record_failure(format!("{err:#}"));
        }
    }
}

#[async_trait]
impl KeyValueStore for Database {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.get_value(key).await
    }

    fn set(&self, key: &str, value: String) {
        self.put_value(key, value);
    }

    async fn flush(&self) -> Result<()> {
        self.execute(|_| Ok(())).await
    }

    fn take_write_error(&self) -> Option<String> {
        let mut guard = match self.inner.last_write_error.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_apply_in_call_order() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("tally.sqlite3")).unwrap();

        for n in 0..50 {
            db.set("eventsData", format!("[{n}]"));
        }

        assert_eq!(db.get("eventsData").await.unwrap().as_deref(), Some("[49]"));
        assert!(db.take_write_error().is_none());
    }

    #[tokio::test]
    async fn queued_writes_drain_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tally.sqlite3");

        let db = Database::new(path.clone()).unwrap();
        db.set("eventsData", "[1]".into());
        db.set("eventsData", "[2]".into());
        drop(db);

        let reopened = Database::new(path).unwrap();
        assert_eq!(reopened.get("eventsData").await.unwrap().as_deref(), Some("[2]"));
        assert!(reopened.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn flush_waits_for_pending_writes() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("tally.sqlite3")).unwrap();

        db.set("a", "1".into());
        db.flush().await.unwrap();

        let stored = db
            .execute(|conn| {
                conn.query_row("SELECT COUNT(*) FROM kv_store", [], |row| row.get::<_, i64>(0))
                    .map_err(Into::into)
            })
            .await
            .unwrap();
        assert_eq!(stored, 1);
    }
}
