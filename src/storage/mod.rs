//! Session-scoped key/value store.
//!
//! Stands in for the browser's `storage.session` area: it outlives the
//! background's in-memory state but not the browser session. Backed by
//! SQLite on a dedicated worker thread; callers hop onto it through
//! [`SessionDatabase::execute`].

use std::{
    path::PathBuf,
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use log::{error, info};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::{SkipError, SkipResult};

mod migrations;

use migrations::run_migrations;

/// The fallback tier under the background's in-memory tab map.
#[async_trait]
pub trait SessionStorage: Send + Sync {
    async fn get(&self, key: &str) -> SkipResult<Option<Value>>;
    async fn set(&self, key: &str, value: Value) -> SkipResult<()>;
    async fn remove(&self, key: &str) -> SkipResult<()>;
}

type DbTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum DbCommand {
    Execute(DbTask),
    Shutdown,
}

struct DatabaseInner {
    sender: mpsc::Sender<DbCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for DatabaseInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(DbCommand::Shutdown) {
                error!("Failed to send shutdown to session store thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join session store thread: {join_err:?}");
            }
        }
    }
}

#[derive(Clone)]
pub struct SessionDatabase {
    inner: Arc<DatabaseInner>,
}

impl SessionDatabase {
    /// Store that lives exactly as long as this process.
    pub fn in_memory() -> Result<Self> {
        Self::spawn(None)
    }

    /// Store backed by a file, so it survives a background restart.
    pub fn open(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create session store directory {}", parent.display())
            })?;
        }
        Self::spawn(Some(path))
    }

    fn spawn(path: Option<PathBuf>) -> Result<Self> {
        let (command_tx, command_rx) = mpsc::channel::<DbCommand>();
        let (ready_tx, ready_rx) = mpsc::channel();
        let path_for_thread = path.clone();

        let worker = thread::Builder::new()
            .name("skipit-session-store".into())
            .spawn(move || {
                let opened = match &path_for_thread {
                    Some(path) => Connection::open(path),
                    None => Connection::open_in_memory(),
                };
                let mut conn = match opened {
                    Ok(connection) => connection,
                    Err(err) => {
                        let _ = ready_tx.send(Err(anyhow::Error::new(err)
                            .context("failed to open session store")));
                        return;
                    }
                };

                if path_for_thread.is_some() {
                    if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                        error!("Failed to enable WAL mode: {err}");
                    }
                }

                let init_result =
                    run_migrations(&mut conn).context("failed to run session store migrations");
                if ready_tx.send(init_result).is_err() {
                    error!("Session store initialization receiver dropped before ready signal");
                    return;
                }

                while let Ok(command) = command_rx.recv() {
                    match command {
                        DbCommand::Execute(task) => task(&mut conn),
                        DbCommand::Shutdown => break,
                    }
                }

                info!("Session store thread shutting down");
            })
            .context("failed to spawn session store worker thread")?;

        ready_rx
            .recv()
            .context("session store worker exited before signaling readiness")??;

        match &path {
            Some(path) => info!("Session store initialized at {}", path.display()),
            None => info!("Session store initialized in memory"),
        }

        Ok(Self {
            inner: Arc::new(DatabaseInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
        })
    }

    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = DbCommand::Execute(Box::new(move |conn| {
            let result = task(conn);
            if reply_tx.send(result).is_err() {
                error!("Session store caller dropped before receiving result");
            }
        }));

        self.inner
            .sender
            .send(command)
            .map_err(|err| anyhow!("failed to send command to session store thread: {err}"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("session store thread terminated unexpectedly"))?
    }

    pub async fn get_entry(&self, key: &str) -> Result<Option<Value>> {
        let key = key.to_string();
        self.execute(move |conn| {
            let raw: Option<String> = conn
                .query_row(
                    "SELECT value FROM session_entries WHERE key = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()
                .context("failed to read session entry")?;

            raw.map(|raw| {
                serde_json::from_str(&raw)
                    .with_context(|| format!("corrupt session entry '{key}'"))
            })
            .transpose()
        })
        .await
    }

    pub async fn put_entry(&self, key: &str, value: &Value) -> Result<()> {
        let key = key.to_string();
        let raw = serde_json::to_string(value).context("failed to serialize session entry")?;
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO session_entries (key, value, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, raw, Utc::now().to_rfc3339()],
            )
            .context("failed to write session entry")?;
            Ok(())
        })
        .await
    }

    pub async fn delete_entry(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        self.execute(move |conn| {
            conn.execute("DELETE FROM session_entries WHERE key = ?1", params![key])
                .context("failed to delete session entry")?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl SessionStorage for SessionDatabase {
    async fn get(&self, key: &str) -> SkipResult<Option<Value>> {
        self.get_entry(key).await.map_err(|err| SkipError::storage(format!("{err:#}")))
    }

    async fn set(&self, key: &str, value: Value) -> SkipResult<()> {
        self.put_entry(key, &value)
            .await
            .map_err(|err| SkipError::storage(format!("{err:#}")))
    }

    async fn remove(&self, key: &str) -> SkipResult<()> {
        self.delete_entry(key)
            .await
            .map_err(|err| SkipError::storage(format!("{err:#}")))
    }
}
