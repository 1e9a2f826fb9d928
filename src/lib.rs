//! # Dejavu
//!
//! Perceptual-hash repost detection for chat media.
//!
//! Dejavu fingerprints images and videos posted to a conversation, stores
//! the fingerprints in SQLite, and flags new posts that are perceptually
//! close to something the conversation has already seen.
//!
//! ## Features
//!
//! - 64-bit perceptual (DCT) and difference (gradient) fingerprints
//! - Hamming-distance similarity search over per-conversation history
//! - Four-frame video fingerprints with positional pairing
//! - Save-time duplicate classification and read-only compare mode
//! - Single SQLite file, no server, no index to maintain
//!
//! ## Example
//!
//! ```rust,ignore
//! use dejavu::{DedupeService, Fingerprinter, SqliteStore, ThresholdConfig};
//!
//! let store = SqliteStore::new("dejavu.db")?;
//! let service = DedupeService::new(store, Fingerprinter::new(), ThresholdConfig::default());
//! let outcome = service.save_image(&meta, &image)?;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
// multiple_crate_versions is inherently crate-level (detects duplicate transitive dependencies).
// Cannot be moved to function level. Current duplicates: image/image_hasher transitive deps.
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod config;
pub mod hasher;
pub mod media;
pub mod models;
pub mod search;
pub mod services;
pub mod storage;
pub mod video;

// Re-exports for convenience
pub use config::{Config, FfmpegConfig, ThresholdConfig};
pub use hasher::Fingerprinter;
pub use media::{FfmpegFrameSource, FrameSource, FsMediaSource, MediaSource};
pub use models::{
    ConversationId, Fingerprint, FingerprintPair, HashAlgorithm, MatchResult, MediaFingerprints,
    MediaKind, MessageId, PostMeta, StoredRecord, UserId,
};
pub use search::{Classification, search_similar};
pub use services::{DedupeService, SaveOutcome};
pub use storage::{FingerprintStore, ScanFlow, SqliteStore};
pub use video::{FrameFingerprints, VideoFingerprints, sample_positions};

/// Error type for dejavu operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `MediaFetch` | A media source cannot produce decoded pixels |
/// | `FrameExtraction` | A frame source cannot produce a frame sequence |
/// | `InsufficientFrames` | A video yields fewer than four frames |
/// | `CorruptFingerprint` | A stored fingerprint blob fails to decode |
/// | `AlgorithmMismatch` | Hamming distance over different hash algorithms |
/// | `DistanceComputation` | Classification of a stored candidate fails |
/// | `StorageIo` | SQLite open/read/write failures |
/// | `Config` | Configuration file is unreadable or invalid |
#[derive(Debug, ThisError)]
pub enum Error {
    /// A media source failed to produce an image.
    ///
    /// Raised when:
    /// - The referenced file does not exist or cannot be read
    /// - The bytes are not a decodable image
    #[error("media fetch failed for '{reference}': {cause}")]
    MediaFetch {
        /// The media reference that failed.
        reference: String,
        /// The underlying cause.
        cause: String,
    },

    /// A frame source failed to produce a frame sequence.
    ///
    /// Raised when:
    /// - The extraction subprocess cannot be spawned or exits nonzero
    /// - Extracted frame files cannot be read back
    #[error("frame extraction failed for '{reference}': {cause}")]
    FrameExtraction {
        /// The media reference that failed.
        reference: String,
        /// The underlying cause.
        cause: String,
    },

    /// A video produced too few frames to fingerprint.
    ///
    /// Four sampled frames are required; shorter sequences cannot be
    /// fingerprinted at all.
    #[error("insufficient frames: got {got}, need at least {need}")]
    InsufficientFrames {
        /// How many frames were extracted.
        got: usize,
        /// The minimum frame count.
        need: usize,
    },

    /// A stored fingerprint blob failed to decode.
    ///
    /// Aborts the enclosing read; a corrupt row is never silently skipped.
    #[error("corrupt fingerprint: {detail}")]
    CorruptFingerprint {
        /// What was wrong with the bytes.
        detail: String,
    },

    /// Hamming distance was requested across different algorithms.
    ///
    /// A perceptual and a difference fingerprint occupy unrelated bit
    /// spaces; comparing them is a caller bug, never a distance of 0.
    #[error("algorithm mismatch: cannot compare {left} with {right}")]
    AlgorithmMismatch {
        /// Algorithm of the left-hand fingerprint.
        left: models::HashAlgorithm,
        /// Algorithm of the right-hand fingerprint.
        right: models::HashAlgorithm,
    },

    /// Classifying a stored candidate failed mid-search.
    ///
    /// Wraps the underlying failure (corrupt fingerprint, algorithm
    /// mismatch) together with the candidate's identity. Aborts the whole
    /// search; partial results are never returned.
    #[error(
        "distance computation failed for message {message_id} in conversation {conversation_id}: {cause}"
    )]
    DistanceComputation {
        /// Message id of the candidate being classified.
        message_id: models::MessageId,
        /// Conversation the candidate belongs to.
        conversation_id: models::ConversationId,
        /// The underlying cause.
        cause: String,
    },

    /// A storage operation failed.
    ///
    /// Raised when:
    /// - The database file cannot be opened or configured
    /// - An insert or scan statement fails
    #[error("storage operation '{operation}' failed: {cause}")]
    StorageIo {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// Configuration could not be loaded.
    ///
    /// Raised when:
    /// - The config file exists but cannot be read
    /// - TOML parsing fails
    #[error("config error: {detail}")]
    Config {
        /// What went wrong.
        detail: String,
    },
}

/// Result type alias for dejavu operations.
pub type Result<T> = std::result::Result<T, Error>;
