//! Duplicate classification over a conversation's posting history.
//!
//! Two modes per media kind:
//! 1. **Save**: classify against history, persist only when nothing
//!    similar exists. A duplicate keeps the earlier record.
//! 2. **Compare**: classify against history read-only, listing every
//!    similar earlier post except the referenced message itself.
//!
//! Classification compares difference fingerprints only. Perceptual
//! fingerprints are computed and persisted alongside but do not take part
//! in the match decision.

use image::DynamicImage;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::config::ThresholdConfig;
use crate::hasher::Fingerprinter;
use crate::models::{
    Fingerprint, MatchResult, MediaFingerprints, MediaKind, PostMeta, StoredRecord,
};
use crate::search::{Classification, search_similar};
use crate::storage::FingerprintStore;
use crate::video::FrameFingerprints;
use crate::{Error, Result};

/// Result of a save-mode classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveOutcome {
    /// Nothing similar in the conversation; the record was persisted.
    Stored,
    /// A similar earlier post exists; the new record was NOT persisted.
    Duplicate(MatchResult),
}

impl SaveOutcome {
    /// Returns `true` when an earlier similar post was found.
    #[must_use]
    pub const fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate(_))
    }
}

/// Service classifying new posts against a conversation's history.
///
/// # Example
///
/// ```rust,ignore
/// use dejavu::{DedupeService, Fingerprinter, SqliteStore, ThresholdConfig};
///
/// let store = SqliteStore::new("dejavu.db")?;
/// let service = DedupeService::new(store, Fingerprinter::new(), ThresholdConfig::default());
///
/// match service.save_image(&meta, &image)? {
///     SaveOutcome::Stored => println!("new content"),
///     SaveOutcome::Duplicate(m) => println!("repost of {} (distance {})", m.meta.message_id, m.distance),
/// }
/// ```
#[derive(Debug)]
pub struct DedupeService<S: FingerprintStore> {
    store: S,
    fingerprinter: Fingerprinter,
    thresholds: ThresholdConfig,
}

impl<S: FingerprintStore> DedupeService<S> {
    /// Creates a service over the given store and thresholds.
    #[must_use]
    pub const fn new(store: S, fingerprinter: Fingerprinter, thresholds: ThresholdConfig) -> Self {
        Self {
            store,
            fingerprinter,
            thresholds,
        }
    }

    /// Returns the underlying store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Classifies an image post and persists it unless it duplicates an
    /// earlier post in the same conversation.
    ///
    /// # Errors
    ///
    /// Returns an error when the history scan or the persist step fails.
    #[instrument(
        skip(self, meta, image),
        fields(
            operation = "save_image",
            message_id = %meta.message_id,
            conversation_id = %meta.conversation_id,
        )
    )]
    pub fn save_image(&self, meta: &PostMeta, image: &DynamicImage) -> Result<SaveOutcome> {
        let pair = self.fingerprinter.fingerprint_image(image);
        let threshold = self.thresholds.image_save;
        let matches = search_similar(
            &self.store,
            meta.conversation_id,
            MediaKind::Image,
            1,
            |record| {
                let distance = pair.difference.distance(image_difference(record)?)?;
                Ok(Classification::new(distance, distance < threshold))
            },
        )?;

        self.conclude_save(meta, MediaFingerprints::Image(pair), matches)
    }

    /// Lists earlier image posts similar to the referenced one, worst
    /// distance first. Read-only; the referenced message is excluded.
    ///
    /// # Errors
    ///
    /// Returns an error when the history scan fails.
    #[instrument(
        skip(self, meta, image),
        fields(
            operation = "compare_image",
            message_id = %meta.message_id,
            conversation_id = %meta.conversation_id,
        )
    )]
    pub fn compare_image(&self, meta: &PostMeta, image: &DynamicImage) -> Result<Vec<MatchResult>> {
        let pair = self.fingerprinter.fingerprint_image(image);
        let threshold = self.thresholds.image_compare;
        search_similar(
            &self.store,
            meta.conversation_id,
            MediaKind::Image,
            0,
            |record| {
                if record.meta.message_id == meta.message_id {
                    return Ok(Classification::excluded());
                }
                let distance = pair.difference.distance(image_difference(record)?)?;
                Ok(Classification::new(distance, distance < threshold))
            },
        )
    }

    /// Classifies a video post from its extracted frames and persists it
    /// unless it duplicates an earlier post in the same conversation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InsufficientFrames`] for fewer than four frames,
    /// otherwise any history scan or persist failure.
    #[instrument(
        skip(self, meta, frames),
        fields(
            operation = "save_video",
            message_id = %meta.message_id,
            conversation_id = %meta.conversation_id,
            frames = frames.len(),
        )
    )]
    pub fn save_video(&self, meta: &PostMeta, frames: &[DynamicImage]) -> Result<SaveOutcome> {
        let prints = self.fingerprinter.fingerprint_frames(frames)?;
        let threshold = self.thresholds.video_save;
        let matches = search_similar(
            &self.store,
            meta.conversation_id,
            MediaKind::Video,
            1,
            |record| {
                let distance = prints.difference.distance(video_difference(record)?)?;
                Ok(Classification::new(distance, distance < threshold))
            },
        )?;

        self.conclude_save(meta, MediaFingerprints::Video(prints), matches)
    }

    /// Lists earlier video posts similar to the referenced one, worst
    /// distance first. Read-only; the referenced message is excluded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InsufficientFrames`] for fewer than four frames,
    /// otherwise any history scan failure.
    #[instrument(
        skip(self, meta, frames),
        fields(
            operation = "compare_video",
            message_id = %meta.message_id,
            conversation_id = %meta.conversation_id,
            frames = frames.len(),
        )
    )]
    pub fn compare_video(
        &self,
        meta: &PostMeta,
        frames: &[DynamicImage],
    ) -> Result<Vec<MatchResult>> {
        let prints = self.fingerprinter.fingerprint_frames(frames)?;
        let threshold = self.thresholds.video_compare;
        search_similar(
            &self.store,
            meta.conversation_id,
            MediaKind::Video,
            0,
            |record| {
                if record.meta.message_id == meta.message_id {
                    return Ok(Classification::excluded());
                }
                let distance = prints.difference.distance(video_difference(record)?)?;
                Ok(Classification::new(distance, distance < threshold))
            },
        )
    }

    fn conclude_save(
        &self,
        meta: &PostMeta,
        fingerprints: MediaFingerprints,
        matches: Vec<MatchResult>,
    ) -> Result<SaveOutcome> {
        if let Some(duplicate) = matches.into_iter().next() {
            info!(
                matched_message = %duplicate.meta.message_id,
                distance = duplicate.distance,
                "duplicate found, earlier record kept"
            );
            return Ok(SaveOutcome::Duplicate(duplicate));
        }

        self.store.save(&StoredRecord::new(*meta, fingerprints))?;
        debug!("no duplicate, record stored");
        Ok(SaveOutcome::Stored)
    }
}

/// Difference fingerprint of a stored image row.
///
/// Scans are kind-filtered, so an image scan only yields image rows; a
/// video variant here means the row kind and blob shape disagree.
fn image_difference(record: &StoredRecord) -> Result<&Fingerprint> {
    record
        .as_image()
        .map(|pair| &pair.difference)
        .ok_or_else(|| Error::CorruptFingerprint {
            detail: format!(
                "image row for message {} holds video fingerprints",
                record.meta.message_id
            ),
        })
}

/// Difference fingerprints of a stored video row.
fn video_difference(record: &StoredRecord) -> Result<&FrameFingerprints> {
    record
        .as_video()
        .map(|prints| &prints.difference)
        .ok_or_else(|| Error::CorruptFingerprint {
            detail: format!(
                "video row for message {} holds image fingerprints",
                record.meta.message_id
            ),
        })
}
