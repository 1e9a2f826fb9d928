//! Perceptual fingerprints and their byte codec.
//!
//! A fingerprint is a 64-bit summary of an image's visual content, tagged
//! with the algorithm that produced it. Two fingerprints of the same
//! algorithm are compared by Hamming distance; a small distance means the
//! images look alike.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of bits in every fingerprint payload.
pub const FINGERPRINT_BITS: u32 = 64;

/// Encoded size of one fingerprint: a one-byte algorithm tag followed by
/// the big-endian payload.
pub const ENCODED_FINGERPRINT_LEN: usize = 9;

/// The algorithm that produced a fingerprint.
///
/// The two algorithms occupy unrelated bit spaces, so distances are only
/// defined between fingerprints of the same algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// DCT-based perceptual hash (pHash).
    Perceptual,
    /// Gradient-based difference hash (dHash).
    Difference,
}

impl HashAlgorithm {
    /// Returns the algorithm as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Perceptual => "perceptual",
            Self::Difference => "difference",
        }
    }

    /// Returns the tag byte used in the encoded form.
    #[must_use]
    pub const fn tag(&self) -> u8 {
        match self {
            Self::Perceptual => b'p',
            Self::Difference => b'd',
        }
    }

    /// Looks up an algorithm by its tag byte.
    #[must_use]
    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            b'p' => Some(Self::Perceptual),
            b'd' => Some(Self::Difference),
            _ => None,
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A 64-bit perceptual fingerprint tagged with its algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    /// The algorithm that produced this fingerprint.
    pub algorithm: HashAlgorithm,
    /// The fingerprint payload.
    pub bits: u64,
}

impl Fingerprint {
    /// Creates a fingerprint from an algorithm and payload.
    #[must_use]
    pub const fn new(algorithm: HashAlgorithm, bits: u64) -> Self {
        Self { algorithm, bits }
    }

    /// Creates a perceptual (pHash) fingerprint.
    #[must_use]
    pub const fn perceptual(bits: u64) -> Self {
        Self::new(HashAlgorithm::Perceptual, bits)
    }

    /// Creates a difference (dHash) fingerprint.
    #[must_use]
    pub const fn difference(bits: u64) -> Self {
        Self::new(HashAlgorithm::Difference, bits)
    }

    /// Computes the Hamming distance to another fingerprint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlgorithmMismatch`] when the fingerprints were
    /// produced by different algorithms. A mismatch is never a distance.
    pub fn distance(&self, other: &Self) -> Result<u32> {
        if self.algorithm != other.algorithm {
            return Err(Error::AlgorithmMismatch {
                left: self.algorithm,
                right: other.algorithm,
            });
        }
        Ok((self.bits ^ other.bits).count_ones())
    }

    /// Serializes the fingerprint to its 9-byte wire form.
    ///
    /// Layout: algorithm tag byte, then the payload big-endian. There is
    /// no format version; the layout is fixed.
    #[must_use]
    pub fn encode(&self) -> [u8; ENCODED_FINGERPRINT_LEN] {
        let mut out = [0u8; ENCODED_FINGERPRINT_LEN];
        out[0] = self.algorithm.tag();
        out[1..].copy_from_slice(&self.bits.to_be_bytes());
        out
    }

    /// Deserializes a fingerprint from its 9-byte wire form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CorruptFingerprint`] when the input is not exactly
    /// [`ENCODED_FINGERPRINT_LEN`] bytes or carries an unknown tag byte.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != ENCODED_FINGERPRINT_LEN {
            return Err(Error::CorruptFingerprint {
                detail: format!(
                    "expected {ENCODED_FINGERPRINT_LEN} bytes, got {}",
                    bytes.len()
                ),
            });
        }
        let algorithm = HashAlgorithm::from_tag(bytes[0]).ok_or_else(|| {
            Error::CorruptFingerprint {
                detail: format!("unknown algorithm tag 0x{:02x}", bytes[0]),
            }
        })?;
        let mut payload = [0u8; 8];
        payload.copy_from_slice(&bytes[1..]);
        Ok(Self {
            algorithm,
            bits: u64::from_be_bytes(payload),
        })
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}",
            self.algorithm,
            hex::encode(self.bits.to_be_bytes())
        )
    }
}

/// The perceptual and difference fingerprints of one image.
///
/// Both are always computed together; classification reads the difference
/// side while the perceptual side is persisted alongside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FingerprintPair {
    /// DCT-based perceptual fingerprint.
    pub perceptual: Fingerprint,
    /// Gradient-based difference fingerprint.
    pub difference: Fingerprint,
}

impl FingerprintPair {
    /// Creates a pair from its two fingerprints.
    #[must_use]
    pub const fn new(perceptual: Fingerprint, difference: Fingerprint) -> Self {
        Self {
            perceptual,
            difference,
        }
    }
}
