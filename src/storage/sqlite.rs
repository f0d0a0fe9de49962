//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.
//!
//! Every operation opens its own connection and runs in its own transaction,
//! so the handle can be shared between worker threads without a lock around
//! the whole store. SQLite serializes writers; WAL mode keeps readers unblocked.

use crate::item::NormalizedItem;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{AttemptStatus, AuditRecord, SourceStats};
use chrono::{SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Attempts made for an operation that keeps hitting a busy/locked database
const TRANSIENT_RETRY_ATTEMPTS: u32 = 3;

/// Fixed pause between those attempts
const TRANSIENT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// How long SQLite itself waits on a lock before reporting busy
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite storage backend
#[derive(Debug, Clone)]
pub struct SqliteStorage {
    path: PathBuf,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// Creates the file and schema if needed; opening an existing database
    /// leaves its schema untouched.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError::Fatal)` - The file exists but is not a usable database
    /// * `Err(StorageError)` - Any other failure opening the database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let storage = Self {
            path: path.to_path_buf(),
        };

        storage.with_retry(|conn| {
            // journal_mode is persistent, so setting it once here is enough
            conn.query_row("PRAGMA journal_mode = WAL", [], |row| {
                row.get::<_, String>(0)
            })?;
            initialize_schema(conn)?;
            Ok(())
        })?;

        tracing::debug!("Opened storage at {}", storage.path.display());
        Ok(storage)
    }

    fn connect(&self) -> StorageResult<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(
            "
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;
        Ok(conn)
    }

    /// Runs `op` on a fresh connection, retrying a bounded number of times
    /// while the database reports busy/locked
    fn with_retry<T>(
        &self,
        mut op: impl FnMut(&mut Connection) -> StorageResult<T>,
    ) -> StorageResult<T> {
        let mut attempt = 1;
        loop {
            let result = self.connect().and_then(|mut conn| op(&mut conn));
            match result {
                Err(e) if e.is_transient() && attempt < TRANSIENT_RETRY_ATTEMPTS => {
                    tracing::debug!(
                        "Storage busy (attempt {}/{}): {}",
                        attempt,
                        TRANSIENT_RETRY_ATTEMPTS,
                        e
                    );
                    attempt += 1;
                    std::thread::sleep(TRANSIENT_RETRY_DELAY);
                }
                Err(e) => {
                    if e.is_fatal() {
                        tracing::error!("Storage at {} is unusable: {}", self.path.display(), e);
                    }
                    return Err(e);
                }
                Ok(value) => return Ok(value),
            }
        }
    }
}

/// Current time as stored in `created_at` / `attempted_at`
pub(crate) fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn encode_tags(tags: &[String]) -> StorageResult<Option<String>> {
    if tags.is_empty() {
        Ok(None)
    } else {
        Ok(Some(serde_json::to_string(tags)?))
    }
}

fn decode_tags(raw: Option<String>) -> Vec<String> {
    raw.and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default()
}

fn upsert_batch(conn: &mut Connection, items: &[NormalizedItem]) -> StorageResult<()> {
    let now = now_rfc3339();
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    {
        let mut owner_stmt = tx.prepare("SELECT source FROM items WHERE id = ?1")?;
        let mut upsert_stmt = tx.prepare(
            "INSERT INTO items (id, title, url, source, timestamp, tags, raw_payload, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                url = excluded.url,
                timestamp = excluded.timestamp,
                tags = excluded.tags,
                raw_payload = excluded.raw_payload",
        )?;

        for item in items {
            let owner: Option<String> = owner_stmt
                .query_row(params![item.id], |row| row.get(0))
                .optional()?;
            if let Some(owner) = owner {
                if owner != item.source {
                    return Err(StorageError::ConstraintViolation(format!(
                        "identifier {} belongs to source '{}', not '{}'",
                        item.id, owner, item.source
                    )));
                }
            }

            upsert_stmt.execute(params![
                item.id,
                item.title,
                item.url,
                item.source,
                item.timestamp,
                encode_tags(&item.tags)?,
                item.raw_payload,
                item.created_at.as_deref().unwrap_or(&now),
            ])?;
        }
    }
    tx.commit()?;
    Ok(())
}

impl Storage for SqliteStorage {
    // ===== Items =====

    fn upsert_items(&self, items: &[NormalizedItem]) -> StorageResult<()> {
        if items.is_empty() {
            return Ok(());
        }
        self.with_retry(|conn| upsert_batch(conn, items))?;
        tracing::trace!("Upserted {} items", items.len());
        Ok(())
    }

    fn count_items(&self, source: &str) -> StorageResult<u64> {
        self.with_retry(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM items WHERE source = ?1",
                params![source],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
    }

    fn count_all_items(&self) -> StorageResult<u64> {
        self.with_retry(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))?;
            Ok(count as u64)
        })
    }

    fn get_items(
        &self,
        source: Option<&str>,
        since: Option<&str>,
    ) -> StorageResult<Vec<NormalizedItem>> {
        self.with_retry(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, title, url, source, timestamp, tags, raw_payload, created_at
                 FROM items
                 WHERE (?1 IS NULL OR source = ?1)
                   AND (?2 IS NULL OR timestamp >= ?2)
                 ORDER BY timestamp IS NULL, timestamp DESC, id",
            )?;

            let items = stmt
                .query_map(params![source, since], |row| {
                    Ok(NormalizedItem {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        url: row.get(2)?,
                        source: row.get(3)?,
                        timestamp: row.get(4)?,
                        tags: decode_tags(row.get(5)?),
                        raw_payload: row.get(6)?,
                        created_at: row.get(7)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(items)
        })
    }

    // ===== Audit Log =====

    fn log_attempt(&self, record: &AuditRecord) -> StorageResult<()> {
        self.with_retry(|conn| {
            conn.execute(
                "INSERT INTO audit_log
                 (source, attempted_at, status, item_count, error_message, duration_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    record.source,
                    record.attempted_at,
                    record.status.to_db_string(),
                    record.item_count as i64,
                    record.error_message,
                    record.duration_ms as i64,
                ],
            )?;
            Ok(())
        })
    }

    fn get_audit_log(&self, source: &str) -> StorageResult<Vec<AuditRecord>> {
        self.with_retry(|conn| {
            let mut stmt = conn.prepare(
                "SELECT source, attempted_at, status, item_count, error_message, duration_ms
                 FROM audit_log WHERE source = ?1 ORDER BY id",
            )?;

            let records = stmt
                .query_map(params![source], |row| {
                    Ok(AuditRecord {
                        source: row.get(0)?,
                        attempted_at: row.get(1)?,
                        status: AttemptStatus::from_db_string(&row.get::<_, String>(2)?)
                            .unwrap_or(AttemptStatus::Error),
                        item_count: row.get::<_, i64>(3)? as u64,
                        error_message: row.get(4)?,
                        duration_ms: row.get::<_, i64>(5)? as u64,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(records)
        })
    }

    // ===== Statistics =====

    fn aggregate_stats(&self) -> StorageResult<Vec<SourceStats>> {
        let query = "
            WITH audit AS (
                SELECT source,
                       COUNT(*) AS total_attempts,
                       SUM(CASE WHEN status = 'error' THEN 1 ELSE 0 END) AS error_count,
                       MAX(CASE WHEN status = 'success' THEN attempted_at END) AS last_success,
                       MAX(attempted_at) AS last_attempt
                FROM audit_log
                GROUP BY source
            ),
            stored AS (
                SELECT source, COUNT(*) AS item_count
                FROM items
                GROUP BY source
            ),
            sources AS (
                SELECT source FROM audit
                UNION
                SELECT source FROM stored
            )
            SELECT s.source,
                   COALESCE(st.item_count, 0),
                   COALESCE(a.error_count, 0),
                   COALESCE(a.total_attempts, 0),
                   a.last_success,
                   a.last_attempt,
                   (SELECT l.error_message FROM audit_log l
                     WHERE l.source = s.source AND l.status = 'error'
                     ORDER BY l.id DESC LIMIT 1)
            FROM sources s
            LEFT JOIN stored st ON st.source = s.source
            LEFT JOIN audit a ON a.source = s.source
            ORDER BY s.source
        ";

        self.with_retry(|conn| {
            let mut stmt = conn.prepare(query)?;
            let stats = stmt
                .query_map([], |row| {
                    Ok(SourceStats {
                        source: row.get(0)?,
                        item_count: row.get::<_, i64>(1)? as u64,
                        error_count: row.get::<_, i64>(2)? as u64,
                        total_attempts: row.get::<_, i64>(3)? as u64,
                        last_success: row.get(4)?,
                        last_attempt: row.get(5)?,
                        last_error: row.get(6)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(stats)
        })
    }
}
