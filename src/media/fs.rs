//! Filesystem-backed media source.

use image::DynamicImage;
use tracing::instrument;

use crate::{Error, Result};

use super::MediaSource;

/// Loads images from local paths.
///
/// The reference is interpreted as a filesystem path. Decoding format is
/// whatever the `image` crate recognises from the file contents.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsMediaSource;

impl FsMediaSource {
    /// Creates a filesystem media source.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl MediaSource for FsMediaSource {
    #[instrument(skip(self), fields(operation = "load_image"))]
    fn load_image(&self, reference: &str) -> Result<DynamicImage> {
        image::open(reference).map_err(|e| Error::MediaFetch {
            reference: reference.to_string(),
            cause: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    #[test]
    fn test_loads_written_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.png");
        let img = ImageBuffer::from_fn(16, 16, |x, _| Rgb([(x * 16) as u8, 0, 0]));
        img.save(&path).unwrap();

        let source = FsMediaSource::new();
        let loaded = source.load_image(path.to_str().unwrap()).unwrap();

        assert_eq!(loaded.width(), 16);
        assert_eq!(loaded.height(), 16);
    }

    #[test]
    fn test_missing_file_is_media_fetch_error() {
        let source = FsMediaSource::new();
        let err = source.load_image("/nonexistent/photo.png").unwrap_err();

        assert!(matches!(
            err,
            Error::MediaFetch { ref reference, .. } if reference == "/nonexistent/photo.png"
        ));
    }

    #[test]
    fn test_non_image_file_is_media_fetch_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"not pixels").unwrap();

        let source = FsMediaSource::new();
        let err = source.load_image(path.to_str().unwrap()).unwrap_err();

        assert!(matches!(err, Error::MediaFetch { .. }));
    }
}
