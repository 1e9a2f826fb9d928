//! Fingerprint persistence.
//!
//! One SQLite table holds image and video rows side by side, keyed by the
//! platform's natural key (message id, conversation id). There is no
//! similarity index; search is a full newest-first scan of one
//! conversation's rows.

// Allow significant_drop_tightening - dropping database connections slightly early
// provides no meaningful benefit.
#![allow(clippy::significant_drop_tightening)]

mod sqlite;

pub use sqlite::SqliteStore;

use crate::Result;
use crate::models::{ConversationId, MediaKind, StoredRecord};

/// Flow control for [`FingerprintStore::scan`] visitors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanFlow {
    /// Keep visiting older records.
    Continue,
    /// Stop the scan. Rows past the stopping point are neither read nor
    /// decoded.
    Stop,
}

/// Persistent store of media fingerprints.
///
/// Records are keyed by (message id, conversation id); saving an existing
/// key again is a silent no-op. Reads always hit the current state of the
/// database, newest message first.
pub trait FingerprintStore: Send + Sync {
    /// Persists one record. A duplicate key is ignored, not an error.
    fn save(&self, record: &StoredRecord) -> Result<()>;

    /// Streams records of `kind` in `conversation`, newest first, through
    /// `visit` until the rows run out or the visitor returns
    /// [`ScanFlow::Stop`].
    ///
    /// Rows are decoded one at a time as they are visited; a failure mid
    /// sequence propagates instead of truncating the scan.
    fn scan(
        &self,
        conversation: ConversationId,
        kind: MediaKind,
        visit: &mut dyn FnMut(StoredRecord) -> Result<ScanFlow>,
    ) -> Result<()>;

    /// Counts stored records of one kind across all conversations.
    fn count(&self, kind: MediaKind) -> Result<u64>;

    /// Returns all records of `kind` in `conversation`, newest first.
    ///
    /// A fresh, finite snapshot per call; callers wanting early stop use
    /// [`FingerprintStore::scan`] instead.
    fn query(
        &self,
        conversation: ConversationId,
        kind: MediaKind,
    ) -> Result<Vec<StoredRecord>> {
        let mut records = Vec::new();
        self.scan(conversation, kind, &mut |record| {
            records.push(record);
            Ok(ScanFlow::Continue)
        })?;
        Ok(records)
    }
}
