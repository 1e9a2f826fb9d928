//! Data models for dejavu.
//!
//! Core value types: fingerprints with their byte codec, post identity,
//! and the records the store persists.

mod fingerprint;
mod record;

pub use fingerprint::{
    ENCODED_FINGERPRINT_LEN, FINGERPRINT_BITS, Fingerprint, FingerprintPair, HashAlgorithm,
};
pub use record::{
    ConversationId, MatchResult, MediaFingerprints, MediaKind, MessageId, PostMeta, StoredRecord,
    UserId,
};
