//! Embedded SQLite wrapper.
//!
//! One connection guarded by a mutex; concurrent callers are
//! serialized by the engine's own locking, not application locks.
//! All statements run on the tokio blocking pool.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::{KnowledgeError, Result};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const RETRY_BACKOFF: Duration = Duration::from_millis(50);

/// Handle to the single-file knowledge database.
///
/// Cloning is cheap and shares the same underlying connection.
#[derive(Clone)]
pub struct KnowledgeDb {
    conn: Arc<Mutex<Option<Connection>>>,
    path: PathBuf,
    queries: Arc<AtomicU64>,
}

impl KnowledgeDb {
    /// Open (or create) the database at `path` and ensure the schema
    /// exists. Idempotent.
    ///
    /// # Errors
    /// Returns `StoreUnavailable` if the file cannot be opened.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let conn = {
            let path = path.clone();
            run_blocking(move || -> Result<Connection> {
                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent).map_err(|e| {
                            KnowledgeError::StoreUnavailable(format!(
                                "create {}: {e}",
                                parent.display()
                            ))
                        })?;
                    }
                }
                let conn = Connection::open(&path)?;
                conn.busy_timeout(BUSY_TIMEOUT)?;
                init_schema(&conn)?;
                Ok(conn)
            })
            .await?
        };

        info!("Knowledge database opened at {}", path.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
            path,
            queries: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Path of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run a store operation on the blocking pool.
    ///
    /// Transient busy failures are retried once after a short backoff,
    /// then surfaced as `StoreUnavailable`.
    pub(crate) async fn call<T, F>(&self, f: F) -> Result<T>
    where
        F: Fn(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.queries.fetch_add(1, Ordering::Relaxed);
        let conn = Arc::clone(&self.conn);

        run_blocking(move || {
            let mut guard = conn.lock();
            let Some(conn) = guard.as_mut() else {
                return Err(KnowledgeError::StoreUnavailable(
                    "database connection is closed".into(),
                ));
            };
            match f(conn) {
                Err(e) if e.is_transient() => {
                    debug!("Store busy, retrying once: {e}");
                    std::thread::sleep(RETRY_BACKOFF);
                    f(conn)
                }
                other => other,
            }
        })
        .await
    }

    /// Number of store queries issued through this handle. Lets tests
    /// observe cache hits as "no new query".
    pub fn query_count(&self) -> u64 {
        self.queries.load(Ordering::Relaxed)
    }

    /// Drop the connection. Safe to call multiple times; subsequent
    /// operations fail with `StoreUnavailable`.
    pub async fn close(&self) {
        let conn = Arc::clone(&self.conn);
        let path = self.path.clone();
        let closed = run_blocking(move || Ok(conn.lock().take().is_some())).await;
        if matches!(closed, Ok(true)) {
            info!("Knowledge database closed at {}", path.display());
        }
    }
}

impl std::fmt::Debug for KnowledgeDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeDb")
            .field("path", &self.path)
            .field("queries", &self.query_count())
            .finish()
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| KnowledgeError::StoreUnavailable(format!("blocking task failed: {e}")))?
}

/// Entry table plus the derived FTS5 index. The payload is an opaque
/// JSON blob; only the scalar columns are indexed for filtering.
fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode=WAL;
        CREATE TABLE IF NOT EXISTS knowledge_entries (
            id TEXT PRIMARY KEY,
            type TEXT NOT NULL,
            source TEXT NOT NULL,
            content_json TEXT NOT NULL,
            confidence REAL NOT NULL DEFAULT 1.0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            refs_json TEXT NOT NULL DEFAULT '[]',
            tags_json TEXT NOT NULL DEFAULT '[]',
            context_tags_json TEXT NOT NULL DEFAULT '[]'
        );
        CREATE INDEX IF NOT EXISTS idx_entries_type ON knowledge_entries(type);
        CREATE INDEX IF NOT EXISTS idx_entries_source ON knowledge_entries(source);
        CREATE INDEX IF NOT EXISTS idx_entries_confidence ON knowledge_entries(confidence);
        CREATE INDEX IF NOT EXISTS idx_entries_updated ON knowledge_entries(updated_at);
        CREATE VIRTUAL TABLE IF NOT EXISTS knowledge_fts USING fts5(entry_id UNINDEXED, body);
        "#,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn temp_db() -> (tempfile::TempDir, KnowledgeDb) {
        let dir = tempfile::tempdir().unwrap();
        let db = KnowledgeDb::open(dir.path().join("knowledge.db")).await.unwrap();
        (dir, db)
    }

    #[tokio::test]
    async fn test_open_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("knowledge.db");

        let first = KnowledgeDb::open(&path).await.unwrap();
        first.close().await;

        // Reopening must not fail on the existing schema.
        let second = KnowledgeDb::open(&path).await.unwrap();
        let n: i64 = second
            .call(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM knowledge_entries", [], |r| r.get(0))?)
            })
            .await
            .unwrap();
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_fails_later_calls() {
        let (_dir, db) = temp_db().await;

        db.close().await;
        db.close().await;

        let result = db.call(|_conn| Ok(())).await;
        assert!(matches!(result, Err(KnowledgeError::StoreUnavailable(_))));
    }

    #[tokio::test]
    async fn test_query_count_increments_per_call() {
        let (_dir, db) = temp_db().await;
        let before = db.query_count();

        db.call(|conn| Ok(conn.query_row("SELECT 1", [], |r| r.get::<_, i64>(0))?))
            .await
            .unwrap();

        assert_eq!(db.query_count(), before + 1);
    }
}
