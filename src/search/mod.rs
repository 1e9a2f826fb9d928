//! Hamming-distance similarity search.
//!
//! A search walks one conversation's stored records newest first, asks a
//! classification callback for each record's distance and match verdict,
//! and collects the matches. A positive limit stops the walk as soon as
//! that many matches are in hand, so the newest matches win; the collected
//! matches are then sorted worst first. The stopping rule and the sort
//! order are independent of each other, and both are kept exactly as the
//! platform's users know them.

use crate::models::{ConversationId, MatchResult, MediaKind, StoredRecord};
use crate::storage::{FingerprintStore, ScanFlow};
use crate::{Error, Result};
use tracing::instrument;

/// Verdict of classifying one stored candidate against a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    /// Hamming distance between the query and the candidate.
    pub distance: u32,
    /// Whether the candidate counts as a match.
    pub is_match: bool,
}

impl Classification {
    /// Creates a verdict.
    #[must_use]
    pub const fn new(distance: u32, is_match: bool) -> Self {
        Self { distance, is_match }
    }

    /// A verdict for candidates excluded by policy, regardless of their
    /// distance.
    #[must_use]
    pub const fn excluded() -> Self {
        Self {
            distance: 0,
            is_match: false,
        }
    }
}

/// Searches `conversation` for stored records of `kind` similar to a
/// query.
///
/// `classify` is the matching policy. It is called on every scanned
/// candidate, including candidates the caller intends to exclude (those
/// return [`Classification::excluded`]), and yields the distance plus the
/// match verdict.
///
/// With `limit > 0` the scan stops as soon as `limit` matches are
/// collected; `limit == 0` scans the whole conversation. The collected
/// matches are returned sorted by distance descending, worst first. Equal
/// distances keep newest-first order.
///
/// # Errors
///
/// A `classify` failure aborts the search as
/// [`Error::DistanceComputation`] carrying the candidate's identity.
/// Storage and decode failures propagate unchanged; partial results are
/// never returned.
#[instrument(
    skip(store, classify),
    fields(
        operation = "similarity_search",
        conversation = %conversation,
        kind = %kind
    )
)]
pub fn search_similar<S, F>(
    store: &S,
    conversation: ConversationId,
    kind: MediaKind,
    limit: usize,
    mut classify: F,
) -> Result<Vec<MatchResult>>
where
    S: FingerprintStore + ?Sized,
    F: FnMut(&StoredRecord) -> Result<Classification>,
{
    let mut matches = Vec::new();

    store.scan(conversation, kind, &mut |record| {
        let verdict = classify(&record).map_err(|e| Error::DistanceComputation {
            message_id: record.meta.message_id,
            conversation_id: record.meta.conversation_id,
            cause: e.to_string(),
        })?;

        if verdict.is_match {
            tracing::debug!(
                message_id = %record.meta.message_id,
                distance = verdict.distance,
                "similar record found"
            );
            matches.push(MatchResult::new(record.meta, verdict.distance));
        }

        if limit != 0 && matches.len() >= limit {
            return Ok(ScanFlow::Stop);
        }
        Ok(ScanFlow::Continue)
    })?;

    matches.sort_by(|a, b| b.distance.cmp(&a.distance));
    Ok(matches)
}
