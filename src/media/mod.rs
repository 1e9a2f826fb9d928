//! Media collaborators: how pixels and frames reach the core.
//!
//! The core never fetches media itself. A [`MediaSource`] resolves a
//! reference to one decoded image; a [`FrameSource`] resolves a video
//! reference to an ordered frame sequence. What a reference means (a
//! path, an object key) is the implementation's business; the core only
//! sees pixels.

mod ffmpeg;
mod fs;

pub use ffmpeg::FfmpegFrameSource;
pub use fs::FsMediaSource;

use crate::Result;
use image::DynamicImage;

/// Produces one decoded image for a media reference.
pub trait MediaSource: Send + Sync {
    /// Loads and decodes the referenced image.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MediaFetch`] when the reference cannot be
    /// resolved or its bytes do not decode as an image.
    fn load_image(&self, reference: &str) -> Result<DynamicImage>;
}

/// Produces the ordered frame sequence of a video reference.
pub trait FrameSource: Send + Sync {
    /// Extracts frames in presentation order.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::FrameExtraction`] when the sequence cannot
    /// be produced at all. Producing too few frames is not this layer's
    /// error; the fingerprinting step decides how many it needs.
    fn extract_frames(&self, reference: &str) -> Result<Vec<DynamicImage>>;
}
