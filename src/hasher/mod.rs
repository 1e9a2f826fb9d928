//! Fingerprint generation from decoded images.
//!
//! Wraps the `image_hasher` crate with the two fixed 64-bit
//! configurations this system stores: a DCT-preprocessed mean hash as the
//! perceptual fingerprint and a gradient hash as the difference
//! fingerprint.

use crate::models::{Fingerprint, FingerprintPair};
use crate::video::{FrameFingerprints, SAMPLED_FRAMES, VideoFingerprints, sample_frames};
use crate::Result;
use image::DynamicImage;
use image_hasher::{HashAlg, Hasher, HasherConfig, ImageHash};
use std::fmt;

/// Produces the perceptual and difference fingerprints of decoded images.
///
/// The configuration is fixed at 8x8 (64 bits) for both algorithms so
/// that every fingerprint fits the store's payload width.
pub struct Fingerprinter {
    /// DCT mean hasher (pHash).
    perceptual: Hasher,
    /// Gradient hasher (dHash).
    difference: Hasher,
}

impl Fingerprinter {
    /// Creates a fingerprinter with the fixed 64-bit configurations.
    #[must_use]
    pub fn new() -> Self {
        let perceptual = HasherConfig::new()
            .hash_size(8, 8)
            .preproc_dct()
            .hash_alg(HashAlg::Mean)
            .to_hasher();
        let difference = HasherConfig::new()
            .hash_size(8, 8)
            .hash_alg(HashAlg::Gradient)
            .to_hasher();
        Self {
            perceptual,
            difference,
        }
    }

    /// Fingerprints one still image.
    #[must_use]
    pub fn fingerprint_image(&self, image: &DynamicImage) -> FingerprintPair {
        let perceptual = self.perceptual.hash_image(image);
        let difference = self.difference.hash_image(image);
        FingerprintPair::new(
            Fingerprint::perceptual(hash_bits(&perceptual)),
            Fingerprint::difference(hash_bits(&difference)),
        )
    }

    /// Fingerprints a video from its extracted frame sequence.
    ///
    /// Samples the four fixed positions, then fingerprints each sampled
    /// frame like a still image.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InsufficientFrames`] when fewer than four
    /// frames are available.
    pub fn fingerprint_frames(&self, frames: &[DynamicImage]) -> Result<VideoFingerprints> {
        let sampled = sample_frames(frames)?;

        let mut perceptual = [Fingerprint::perceptual(0); SAMPLED_FRAMES];
        let mut difference = [Fingerprint::difference(0); SAMPLED_FRAMES];
        for (position, frame) in sampled.iter().enumerate() {
            let pair = self.fingerprint_image(frame);
            perceptual[position] = pair.perceptual;
            difference[position] = pair.difference;
        }

        Ok(VideoFingerprints::new(
            FrameFingerprints::new(perceptual),
            FrameFingerprints::new(difference),
        ))
    }
}

impl Default for Fingerprinter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Fingerprinter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fingerprinter").finish_non_exhaustive()
    }
}

/// Packs a 64-bit hash into its integer payload.
fn hash_bits(hash: &ImageHash) -> u64 {
    let mut bytes = [0u8; 8];
    for (slot, byte) in bytes.iter_mut().zip(hash.as_bytes()) {
        *slot = *byte;
    }
    u64::from_be_bytes(bytes)
}
