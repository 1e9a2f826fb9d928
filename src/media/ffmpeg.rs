//! Frame extraction through the ffmpeg binary.

use std::path::{Path, PathBuf};
use std::process::Command;

use image::DynamicImage;
use tracing::{debug, instrument};

use crate::video::MIN_FRAMES;
use crate::{Error, Result};

use super::FrameSource;

/// Output pattern handed to ffmpeg. Zero padding keeps names sortable,
/// but ordering is done on the parsed frame number regardless.
const FRAME_PATTERN: &str = "frame-%04d.png";

/// Extracts frames by shelling out to ffmpeg.
///
/// Extraction runs in two passes. The first keeps only scene changes
/// (`select='gt(scene,t)'`). Static clips can yield almost no scene
/// changes, so when the first pass produces fewer than [`MIN_FRAMES`]
/// frames a second pass samples at a fixed 1 fps instead.
#[derive(Debug, Clone)]
pub struct FfmpegFrameSource {
    binary: String,
    scene_threshold: f64,
}

impl FfmpegFrameSource {
    /// Default scene score above which a frame counts as a scene change.
    pub const DEFAULT_SCENE_THRESHOLD: f64 = 0.2;

    /// Creates an extractor using the given ffmpeg binary and scene
    /// threshold.
    #[must_use]
    pub fn new(binary: impl Into<String>, scene_threshold: f64) -> Self {
        Self {
            binary: binary.into(),
            scene_threshold,
        }
    }

    fn run_pass(&self, reference: &str, filter: &str, out_dir: &Path) -> Result<()> {
        let output = Command::new(&self.binary)
            .arg("-i")
            .arg(reference)
            .arg("-vf")
            .arg(filter)
            .arg("-vsync")
            .arg("vfr")
            .arg(out_dir.join(FRAME_PATTERN))
            .output()
            .map_err(|e| Error::FrameExtraction {
                reference: reference.to_string(),
                cause: format!("failed to run {}: {e}", self.binary),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let cause = stderr
                .lines()
                .rev()
                .find(|line| !line.trim().is_empty())
                .unwrap_or("ffmpeg exited with an error")
                .to_string();
            return Err(Error::FrameExtraction {
                reference: reference.to_string(),
                cause,
            });
        }

        Ok(())
    }
}

impl Default for FfmpegFrameSource {
    fn default() -> Self {
        Self::new("ffmpeg", Self::DEFAULT_SCENE_THRESHOLD)
    }
}

impl FrameSource for FfmpegFrameSource {
    #[instrument(skip(self), fields(operation = "extract_frames"))]
    fn extract_frames(&self, reference: &str) -> Result<Vec<DynamicImage>> {
        let threshold = self.scene_threshold;

        let scene_dir = workdir(reference)?;
        self.run_pass(
            reference,
            &format!("select='gt(scene,{threshold})'"),
            scene_dir.path(),
        )?;
        let frames = collect_frames(scene_dir.path(), reference)?;
        if frames.len() >= MIN_FRAMES {
            debug!(frames = frames.len(), "extracted scene-change frames");
            return Ok(frames);
        }

        debug!(
            frames = frames.len(),
            "too few scene changes, sampling at fixed rate"
        );
        let rate_dir = workdir(reference)?;
        self.run_pass(reference, "fps=1", rate_dir.path())?;
        let frames = collect_frames(rate_dir.path(), reference)?;
        debug!(frames = frames.len(), "extracted fixed-rate frames");
        Ok(frames)
    }
}

fn workdir(reference: &str) -> Result<tempfile::TempDir> {
    tempfile::tempdir().map_err(|e| Error::FrameExtraction {
        reference: reference.to_string(),
        cause: format!("failed to create frame directory: {e}"),
    })
}

/// Decodes every extracted frame in frame-number order.
fn collect_frames(dir: &Path, reference: &str) -> Result<Vec<DynamicImage>> {
    let io_err = |e: std::io::Error| Error::FrameExtraction {
        reference: reference.to_string(),
        cause: format!("failed to list frames: {e}"),
    };

    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(io_err)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<_>>()
        .map_err(io_err)?;
    paths.sort_by_key(|path| frame_index(path));

    paths
        .iter()
        .map(|path| {
            image::open(path).map_err(|e| Error::FrameExtraction {
                reference: reference.to_string(),
                cause: format!("failed to decode frame {}: {e}", path.display()),
            })
        })
        .collect()
}

/// Frame number embedded in an extracted file name, or `u64::MAX` for
/// anything that does not look like one so strays sort last.
fn frame_index(path: &Path) -> u64 {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .and_then(|stem| stem.rsplit('-').next())
        .and_then(|digits| digits.parse().ok())
        .unwrap_or(u64::MAX)
}
