//! SQLite implementation of the fingerprint store.
//!
//! Uses a `Mutex<Connection>` for thread-safe access. WAL mode and a busy
//! timeout keep contention manageable; operations themselves are
//! serialized, which matches the sequential pipeline this store feeds.

use crate::models::{
    ConversationId, MediaFingerprints, MediaKind, MessageId, PostMeta, StoredRecord, UserId,
};
use crate::storage::{FingerprintStore, ScanFlow};
use crate::{Error, Result};
use chrono::DateTime;
use rusqlite::{Connection, Row, params};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::instrument;

/// Helper to acquire the connection lock with poison recovery.
///
/// If the mutex is poisoned (a panic in a previous critical section), we
/// recover the inner value and log a warning. The connection state itself
/// is still valid.
fn acquire_lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("SQLite mutex was poisoned, recovering");
            poisoned.into_inner()
        },
    }
}

/// Configures a `SQLite` connection for performance and concurrency.
///
/// - **WAL mode**: concurrent readers with a single writer
/// - **NORMAL synchronous**: balances durability with performance
/// - **`busy_timeout`**: waits up to 5 seconds instead of failing with
///   `SQLITE_BUSY`
fn configure_connection(conn: &Connection) {
    // pragma_update returns the previous value for journal_mode, which is
    // not an error; ignore the results.
    let _ = conn.pragma_update(None, "journal_mode", "WAL");
    let _ = conn.pragma_update(None, "synchronous", "NORMAL");
    let _ = conn.pragma_update(None, "busy_timeout", "5000");
}

/// SQLite-backed [`FingerprintStore`].
///
/// One table, `posts`, keyed by (`message_id`, `conversation_id`), with a
/// kind discriminator separating image and video rows. Fingerprints are
/// stored as the codec's blob form, one column per algorithm.
pub struct SqliteStore {
    /// Database connection protected by a mutex.
    conn: Mutex<Connection>,
    /// Path to the database file (None for in-memory).
    db_path: Option<PathBuf>,
}

impl SqliteStore {
    /// Creates a store backed by a database file, creating the file and
    /// its parent directory when missing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StorageIo`] when the directory or database cannot
    /// be created or the schema cannot be initialized.
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| Error::StorageIo {
                    operation: "create_db_directory".to_string(),
                    cause: e.to_string(),
                })?;
            }
        }

        let conn = Connection::open(&db_path).map_err(|e| Error::StorageIo {
            operation: "open_database".to_string(),
            cause: e.to_string(),
        })?;
        configure_connection(&conn);

        let store = Self {
            conn: Mutex::new(conn),
            db_path: Some(db_path),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Creates an in-memory store, mainly for tests.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StorageIo`] when the database cannot be created.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::StorageIo {
            operation: "open_in_memory_database".to_string(),
            cause: e.to_string(),
        })?;
        configure_connection(&conn);

        let store = Self {
            conn: Mutex::new(conn),
            db_path: None,
        };
        store.initialize()?;
        Ok(store)
    }

    /// Returns the database file path, if file-backed.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Creates the schema when missing.
    fn initialize(&self) -> Result<()> {
        let conn = acquire_lock(&self.conn);

        conn.execute(
            "CREATE TABLE IF NOT EXISTS posts (
                message_id      INTEGER NOT NULL,
                conversation_id INTEGER NOT NULL,
                user_id         INTEGER NOT NULL,
                sent_at         INTEGER NOT NULL,
                kind            TEXT NOT NULL,
                phash           BLOB NOT NULL,
                dhash           BLOB NOT NULL,
                PRIMARY KEY (message_id, conversation_id)
            )",
            [],
        )
        .map_err(|e| Error::StorageIo {
            operation: "create_posts_table".to_string(),
            cause: e.to_string(),
        })?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_posts_conversation_kind
             ON posts(conversation_id, kind, message_id DESC)",
            [],
        )
        .map_err(|e| Error::StorageIo {
            operation: "create_posts_index".to_string(),
            cause: e.to_string(),
        })?;

        Ok(())
    }
}

/// Builds a record from a scan row.
///
/// Column order: `message_id`, `user_id`, `sent_at`, `kind`, `phash`,
/// `dhash`. The kind is decoded from the row itself rather than trusted
/// from the query filter.
fn record_from_row(conversation: ConversationId, row: &Row<'_>) -> Result<StoredRecord> {
    let read = |e: rusqlite::Error| Error::StorageIo {
        operation: "read_post_row".to_string(),
        cause: e.to_string(),
    };

    let message_id: i64 = row.get(0).map_err(read)?;
    let user_id: i64 = row.get(1).map_err(read)?;
    let sent_at: i64 = row.get(2).map_err(read)?;
    let kind: String = row.get(3).map_err(read)?;
    let phash: Vec<u8> = row.get(4).map_err(read)?;
    let dhash: Vec<u8> = row.get(5).map_err(read)?;

    let kind = MediaKind::parse(&kind).ok_or_else(|| Error::StorageIo {
        operation: "read_post_row".to_string(),
        cause: format!("unknown media kind {kind:?}"),
    })?;

    let sent_at = DateTime::from_timestamp(sent_at, 0).ok_or_else(|| Error::StorageIo {
        operation: "read_post_row".to_string(),
        cause: format!("sent_at {sent_at} is out of range"),
    })?;

    let fingerprints = MediaFingerprints::decode(kind, &phash, &dhash)?;
    let meta = PostMeta::new(
        MessageId::new(message_id),
        conversation,
        UserId::new(user_id),
        sent_at,
    );
    Ok(StoredRecord::new(meta, fingerprints))
}

impl FingerprintStore for SqliteStore {
    #[instrument(skip(self, record), fields(
        message_id = %record.meta.message_id,
        conversation_id = %record.meta.conversation_id,
        kind = %record.kind()
    ))]
    fn save(&self, record: &StoredRecord) -> Result<()> {
        let (phash, dhash) = record.fingerprints.encoded_blobs();
        let conn = acquire_lock(&self.conn);

        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO posts
                 (message_id, conversation_id, user_id, sent_at, kind, phash, dhash)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.meta.message_id.value(),
                    record.meta.conversation_id.value(),
                    record.meta.user_id.value(),
                    record.meta.sent_at.timestamp(),
                    record.kind().as_str(),
                    phash,
                    dhash,
                ],
            )
            .map_err(|e| Error::StorageIo {
                operation: "save_record".to_string(),
                cause: e.to_string(),
            })?;

        if inserted == 0 {
            tracing::debug!("record already stored, insert ignored");
        }
        Ok(())
    }

    #[instrument(skip(self, visit), fields(
        conversation = %conversation,
        kind = %kind
    ))]
    fn scan(
        &self,
        conversation: ConversationId,
        kind: MediaKind,
        visit: &mut dyn FnMut(StoredRecord) -> Result<ScanFlow>,
    ) -> Result<()> {
        let conn = acquire_lock(&self.conn);

        let mut stmt = conn
            .prepare(
                "SELECT message_id, user_id, sent_at, kind, phash, dhash
                 FROM posts
                 WHERE conversation_id = ?1 AND kind = ?2
                 ORDER BY message_id DESC",
            )
            .map_err(|e| Error::StorageIo {
                operation: "scan_records".to_string(),
                cause: e.to_string(),
            })?;

        let mut rows = stmt
            .query(params![conversation.value(), kind.as_str()])
            .map_err(|e| Error::StorageIo {
                operation: "scan_records".to_string(),
                cause: e.to_string(),
            })?;

        while let Some(row) = rows.next().map_err(|e| Error::StorageIo {
            operation: "scan_records".to_string(),
            cause: e.to_string(),
        })? {
            let record = record_from_row(conversation, row)?;
            if visit(record)? == ScanFlow::Stop {
                break;
            }
        }
        Ok(())
    }

    #[instrument(skip(self), fields(kind = %kind))]
    fn count(&self, kind: MediaKind) -> Result<u64> {
        let conn = acquire_lock(&self.conn);

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM posts WHERE kind = ?1",
                params![kind.as_str()],
                |row| row.get(0),
            )
            .map_err(|e| Error::StorageIo {
                operation: "count_records".to_string(),
                cause: e.to_string(),
            })?;

        Ok(u64::try_from(count).unwrap_or(0))
    }
}
