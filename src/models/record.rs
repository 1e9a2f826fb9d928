//! Post identity and persistence records.
//!
//! A record ties the fingerprints of one posted media item to where it was
//! posted. Identity is the natural key of the platform: the message id
//! within its conversation.

use crate::Result;
use crate::models::{Fingerprint, FingerprintPair};
use crate::video::VideoFingerprints;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a message within a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(i64);

impl MessageId {
    /// Creates a message id.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw id value.
    #[must_use]
    pub const fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for MessageId {
    fn from(id: i64) -> Self {
        Self::new(id)
    }
}

/// Identifier of a conversation (chat, channel, group).
///
/// Platform conversation ids are frequently negative; the raw value is
/// stored as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(i64);

impl ConversationId {
    /// Creates a conversation id.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw id value.
    #[must_use]
    pub const fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ConversationId {
    fn from(id: i64) -> Self {
        Self::new(id)
    }
}

/// Identifier of the user who posted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(i64);

impl UserId {
    /// Creates a user id.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw id value.
    #[must_use]
    pub const fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self::new(id)
    }
}

/// The kind of media a record describes.
///
/// Image and video rows live in one table; the kind keeps their searches
/// apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// A single still image.
    Image,
    /// A video summarized by sampled frames.
    Video,
}

impl MediaKind {
    /// Returns the kind as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }

    /// Parses a kind from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "image" => Some(Self::Image),
            "video" => Some(Self::Video),
            _ => None,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Identity and provenance of one post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostMeta {
    /// Message id within the conversation.
    pub message_id: MessageId,
    /// Conversation the message was posted to.
    pub conversation_id: ConversationId,
    /// User who posted the message.
    pub user_id: UserId,
    /// When the message was sent.
    pub sent_at: DateTime<Utc>,
}

impl PostMeta {
    /// Creates post metadata.
    #[must_use]
    pub const fn new(
        message_id: MessageId,
        conversation_id: ConversationId,
        user_id: UserId,
        sent_at: DateTime<Utc>,
    ) -> Self {
        Self {
            message_id,
            conversation_id,
            user_id,
            sent_at,
        }
    }
}

/// The fingerprints of one media item, image or video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaFingerprints {
    /// A still image's perceptual and difference fingerprints.
    Image(FingerprintPair),
    /// A video's sampled-frame fingerprints.
    Video(VideoFingerprints),
}

impl MediaFingerprints {
    /// Returns the media kind these fingerprints describe.
    #[must_use]
    pub const fn kind(&self) -> MediaKind {
        match self {
            Self::Image(_) => MediaKind::Image,
            Self::Video(_) => MediaKind::Video,
        }
    }

    /// Serializes to the two column blobs, perceptual first.
    ///
    /// Image rows hold one encoded fingerprint per column; video rows hold
    /// the four sampled frames concatenated.
    #[must_use]
    pub fn encoded_blobs(&self) -> (Vec<u8>, Vec<u8>) {
        match self {
            Self::Image(pair) => (
                pair.perceptual.encode().to_vec(),
                pair.difference.encode().to_vec(),
            ),
            Self::Video(video) => (video.perceptual.encode(), video.difference.encode()),
        }
    }

    /// Deserializes from the two column blobs for the given kind.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::CorruptFingerprint`] when either blob does
    /// not decode as the kind demands.
    pub fn decode(kind: MediaKind, perceptual: &[u8], difference: &[u8]) -> Result<Self> {
        use crate::video::FrameFingerprints;
        match kind {
            MediaKind::Image => Ok(Self::Image(FingerprintPair {
                perceptual: Fingerprint::decode(perceptual)?,
                difference: Fingerprint::decode(difference)?,
            })),
            MediaKind::Video => Ok(Self::Video(VideoFingerprints {
                perceptual: FrameFingerprints::decode(perceptual)?,
                difference: FrameFingerprints::decode(difference)?,
            })),
        }
    }
}

/// One persisted post with its fingerprints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// Identity and provenance of the post.
    pub meta: PostMeta,
    /// The post's fingerprints.
    pub fingerprints: MediaFingerprints,
}

impl StoredRecord {
    /// Creates a record from metadata and fingerprints.
    #[must_use]
    pub const fn new(meta: PostMeta, fingerprints: MediaFingerprints) -> Self {
        Self { meta, fingerprints }
    }

    /// Returns the media kind of this record.
    #[must_use]
    pub const fn kind(&self) -> MediaKind {
        self.fingerprints.kind()
    }

    /// Returns the image fingerprint pair, if this is an image record.
    #[must_use]
    pub const fn as_image(&self) -> Option<&FingerprintPair> {
        match &self.fingerprints {
            MediaFingerprints::Image(pair) => Some(pair),
            MediaFingerprints::Video(_) => None,
        }
    }

    /// Returns the video fingerprints, if this is a video record.
    #[must_use]
    pub const fn as_video(&self) -> Option<&VideoFingerprints> {
        match &self.fingerprints {
            MediaFingerprints::Video(video) => Some(video),
            MediaFingerprints::Image(_) => None,
        }
    }
}

/// One earlier post that matched a query, with its distance.
///
/// Transient search output; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Identity of the matched earlier post.
    pub meta: PostMeta,
    /// Hamming distance between the query and the matched post.
    pub distance: u32,
}

impl MatchResult {
    /// Creates a match result.
    #[must_use]
    pub const fn new(meta: PostMeta, distance: u32) -> Self {
        Self { meta, distance }
    }
}
