//! Multi-frame video fingerprints.
//!
//! A video is summarized by four frames sampled at fixed relative positions
//! from an externally extracted, ordered frame sequence. Each sampled frame
//! is fingerprinted like a still image. Two videos are compared position by
//! position (first with first, and so on) and their distance is the integer
//! mean of the four pairwise distances. There is no cross-position
//! matching; a re-cut of the same material lands on different sampled
//! frames and is treated as different.

use crate::models::{ENCODED_FINGERPRINT_LEN, Fingerprint};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Number of frames sampled from every video.
pub const SAMPLED_FRAMES: usize = 4;

/// Minimum frame-sequence length that can be fingerprinted.
pub const MIN_FRAMES: usize = 4;

/// Picks the sampled positions from a frame sequence of length
/// `frame_count`.
///
/// Positions are 0-based indices `[1, n/4, n - n/4, n - 2]` with integer
/// division. For short sequences positions may coincide or run out of
/// order; the sampling is a fixed heuristic, not a sorted selection.
/// Twelve frames sample positions `[1, 3, 9, 10]`.
///
/// # Errors
///
/// Returns [`Error::InsufficientFrames`] when fewer than [`MIN_FRAMES`]
/// frames are available.
pub const fn sample_positions(frame_count: usize) -> Result<[usize; SAMPLED_FRAMES]> {
    if frame_count < MIN_FRAMES {
        return Err(Error::InsufficientFrames {
            got: frame_count,
            need: MIN_FRAMES,
        });
    }
    Ok([
        1,
        frame_count / 4,
        frame_count - frame_count / 4,
        frame_count - 2,
    ])
}

/// Borrows the four sampled frames from an extracted sequence.
///
/// # Errors
///
/// Returns [`Error::InsufficientFrames`] when the sequence is shorter than
/// [`MIN_FRAMES`].
pub fn sample_frames<T>(frames: &[T]) -> Result<[&T; SAMPLED_FRAMES]> {
    let positions = sample_positions(frames.len())?;
    Ok([
        &frames[positions[0]],
        &frames[positions[1]],
        &frames[positions[2]],
        &frames[positions[3]],
    ])
}

/// Fingerprints of the four sampled frames of one algorithm, in position
/// order A through D.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameFingerprints {
    /// The four frame fingerprints, position A first.
    pub frames: [Fingerprint; SAMPLED_FRAMES],
}

impl FrameFingerprints {
    /// Creates a frame set from four fingerprints in position order.
    #[must_use]
    pub const fn new(frames: [Fingerprint; SAMPLED_FRAMES]) -> Self {
        Self { frames }
    }

    /// Computes the video distance to another frame set.
    ///
    /// Frames pair strictly by position and the result is the integer mean
    /// of the four pairwise Hamming distances.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlgorithmMismatch`] when any pair mixes
    /// algorithms.
    pub fn distance(&self, other: &Self) -> Result<u32> {
        let mut total = 0;
        for (a, b) in self.frames.iter().zip(other.frames.iter()) {
            total += a.distance(b)?;
        }
        Ok(total / 4)
    }

    /// Serializes the four fingerprints as one concatenated blob.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(SAMPLED_FRAMES * ENCODED_FINGERPRINT_LEN);
        for frame in &self.frames {
            out.extend_from_slice(&frame.encode());
        }
        out
    }

    /// Deserializes a frame set from its concatenated blob form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CorruptFingerprint`] when the blob length is not
    /// exactly four encoded fingerprints or any fingerprint is malformed.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let want = SAMPLED_FRAMES * ENCODED_FINGERPRINT_LEN;
        if bytes.len() != want {
            return Err(Error::CorruptFingerprint {
                detail: format!("expected {want} bytes for a frame set, got {}", bytes.len()),
            });
        }
        let mut frames = [Fingerprint::perceptual(0); SAMPLED_FRAMES];
        for (slot, chunk) in frames
            .iter_mut()
            .zip(bytes.chunks_exact(ENCODED_FINGERPRINT_LEN))
        {
            *slot = Fingerprint::decode(chunk)?;
        }
        Ok(Self { frames })
    }
}

/// The perceptual and difference frame sets of one video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VideoFingerprints {
    /// Perceptual fingerprints of the sampled frames.
    pub perceptual: FrameFingerprints,
    /// Difference fingerprints of the sampled frames.
    pub difference: FrameFingerprints,
}

impl VideoFingerprints {
    /// Creates a video fingerprint from its two frame sets.
    #[must_use]
    pub const fn new(perceptual: FrameFingerprints, difference: FrameFingerprints) -> Self {
        Self {
            perceptual,
            difference,
        }
    }
}
