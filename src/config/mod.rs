//! Configuration management.
//!
//! Configuration is resolved in three layers: built-in defaults, an
//! optional TOML file, then `DEJAVU_*` environment overrides.

use serde::Deserialize;
use std::path::PathBuf;

use crate::media::FfmpegFrameSource;
use crate::{Error, Result};

/// Runtime configuration for dejavu.
///
/// # Environment Variables
///
/// | Variable | Type | Default | Description |
/// |----------|------|---------|-------------|
/// | `DEJAVU_DB_PATH` | path | `dejavu.db` | SQLite database file |
/// | `DEJAVU_THRESHOLD_IMAGE_SAVE` | u32 | `10` | Save-mode image threshold |
/// | `DEJAVU_THRESHOLD_IMAGE_COMPARE` | u32 | `15` | Compare-mode image threshold |
/// | `DEJAVU_THRESHOLD_VIDEO_SAVE` | u32 | `10` | Save-mode video threshold |
/// | `DEJAVU_THRESHOLD_VIDEO_COMPARE` | u32 | `15` | Compare-mode video threshold |
/// | `DEJAVU_FFMPEG_BINARY` | string | `ffmpeg` | Frame extraction binary |
/// | `DEJAVU_FFMPEG_SCENE_THRESHOLD` | f64 | `0.2` | Scene-change score cutoff |
///
/// # Example
///
/// ```rust
/// use dejavu::Config;
///
/// let config = Config::default();
/// assert_eq!(config.thresholds.image_save, 10);
/// assert_eq!(config.ffmpeg.binary, "ffmpeg");
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// Distance thresholds for duplicate classification.
    pub thresholds: ThresholdConfig,
    /// Frame extraction settings.
    pub ffmpeg: FfmpegConfig,
}

/// Hamming-distance thresholds, one per mode and media kind.
///
/// A candidate matches when its distance is strictly below the threshold
/// for the mode in play.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdConfig {
    /// Save-mode image threshold.
    pub image_save: u32,
    /// Compare-mode image threshold.
    pub image_compare: u32,
    /// Save-mode video threshold.
    pub video_save: u32,
    /// Compare-mode video threshold.
    pub video_compare: u32,
}

/// Frame extraction settings.
#[derive(Debug, Clone, PartialEq)]
pub struct FfmpegConfig {
    /// Binary name or path.
    pub binary: String,
    /// Scene score above which a frame counts as a scene change.
    pub scene_threshold: f64,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Database path.
    pub db_path: Option<String>,
    /// Thresholds section.
    pub thresholds: Option<ConfigFileThresholds>,
    /// Ffmpeg section.
    pub ffmpeg: Option<ConfigFileFfmpeg>,
}

/// Thresholds section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileThresholds {
    /// Save-mode image threshold.
    pub image_save: Option<u32>,
    /// Compare-mode image threshold.
    pub image_compare: Option<u32>,
    /// Save-mode video threshold.
    pub video_save: Option<u32>,
    /// Compare-mode video threshold.
    pub video_compare: Option<u32>,
}

/// Ffmpeg section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileFfmpeg {
    /// Binary name or path.
    pub binary: Option<String>,
    /// Scene-change score cutoff.
    pub scene_threshold: Option<f64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("dejavu.db"),
            thresholds: ThresholdConfig::default(),
            ffmpeg: FfmpegConfig::default(),
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be read or parsed.
    pub fn load_from_file(path: &std::path::Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::Config {
            detail: format!("failed to read {}: {e}", path.display()),
        })?;

        let file: ConfigFile = toml::from_str(&contents).map_err(|e| Error::Config {
            detail: format!("failed to parse {}: {e}", path.display()),
        })?;

        Ok(Self::from_config_file(file))
    }

    /// Loads configuration from the default location.
    ///
    /// Checks the following paths in order:
    /// 1. Platform-specific config dir (`~/Library/Application Support/dejavu/` on macOS)
    /// 2. XDG config dir (`~/.config/dejavu/` for Unix compatibility)
    ///
    /// Returns default configuration if no config file is found.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Self::default();
        };

        // Check platform-specific config dir first
        let platform_config = base_dirs.config_dir().join("dejavu").join("config.toml");
        if platform_config.exists() {
            if let Ok(config) = Self::load_from_file(&platform_config) {
                return config;
            }
        }

        // Fall back to XDG-style ~/.config/dejavu/ for Unix compatibility
        let xdg_config = base_dirs
            .home_dir()
            .join(".config")
            .join("dejavu")
            .join("config.toml");
        if xdg_config.exists() {
            if let Ok(config) = Self::load_from_file(&xdg_config) {
                return config;
            }
        }

        Self::default()
    }

    /// Applies `DEJAVU_*` environment overrides on top of this
    /// configuration. Unset or unparseable variables leave values as-is.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(path) = std::env::var("DEJAVU_DB_PATH") {
            self.db_path = PathBuf::from(path);
        }
        if let Some(v) = env_parse("DEJAVU_THRESHOLD_IMAGE_SAVE") {
            self.thresholds.image_save = v;
        }
        if let Some(v) = env_parse("DEJAVU_THRESHOLD_IMAGE_COMPARE") {
            self.thresholds.image_compare = v;
        }
        if let Some(v) = env_parse("DEJAVU_THRESHOLD_VIDEO_SAVE") {
            self.thresholds.video_save = v;
        }
        if let Some(v) = env_parse("DEJAVU_THRESHOLD_VIDEO_COMPARE") {
            self.thresholds.video_compare = v;
        }
        if let Ok(binary) = std::env::var("DEJAVU_FFMPEG_BINARY") {
            self.ffmpeg.binary = binary;
        }
        if let Some(v) = env_parse("DEJAVU_FFMPEG_SCENE_THRESHOLD") {
            self.ffmpeg.scene_threshold = v;
        }
        self
    }

    /// Converts a `ConfigFile` to `Config`.
    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::default();

        if let Some(db_path) = file.db_path {
            config.db_path = PathBuf::from(db_path);
        }
        if let Some(thresholds) = file.thresholds {
            if let Some(v) = thresholds.image_save {
                config.thresholds.image_save = v;
            }
            if let Some(v) = thresholds.image_compare {
                config.thresholds.image_compare = v;
            }
            if let Some(v) = thresholds.video_save {
                config.thresholds.video_save = v;
            }
            if let Some(v) = thresholds.video_compare {
                config.thresholds.video_compare = v;
            }
        }
        if let Some(ffmpeg) = file.ffmpeg {
            if let Some(binary) = ffmpeg.binary {
                config.ffmpeg.binary = binary;
            }
            if let Some(v) = ffmpeg.scene_threshold {
                config.ffmpeg.scene_threshold = v;
            }
        }

        config
    }

    /// Sets the database path.
    #[must_use]
    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = path.into();
        self
    }

    /// Sets the thresholds.
    #[must_use]
    pub const fn with_thresholds(mut self, thresholds: ThresholdConfig) -> Self {
        self.thresholds = thresholds;
        self
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            image_save: 10,
            image_compare: 15,
            video_save: 10,
            video_compare: 15,
        }
    }
}

impl ThresholdConfig {
    /// Builder method to set the save-mode image threshold.
    #[must_use]
    pub const fn with_image_save(mut self, threshold: u32) -> Self {
        self.image_save = threshold;
        self
    }

    /// Builder method to set the compare-mode image threshold.
    #[must_use]
    pub const fn with_image_compare(mut self, threshold: u32) -> Self {
        self.image_compare = threshold;
        self
    }

    /// Builder method to set the save-mode video threshold.
    #[must_use]
    pub const fn with_video_save(mut self, threshold: u32) -> Self {
        self.video_save = threshold;
        self
    }

    /// Builder method to set the compare-mode video threshold.
    #[must_use]
    pub const fn with_video_compare(mut self, threshold: u32) -> Self {
        self.video_compare = threshold;
        self
    }
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            binary: "ffmpeg".to_string(),
            scene_threshold: FfmpegFrameSource::DEFAULT_SCENE_THRESHOLD,
        }
    }
}

impl FfmpegConfig {
    /// Builder method to set the binary.
    #[must_use]
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Builder method to set the scene-change cutoff.
    #[must_use]
    pub const fn with_scene_threshold(mut self, threshold: f64) -> Self {
        self.scene_threshold = threshold;
        self
    }
}

/// Parses an environment variable, treating unset and unparseable alike.
fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Helper for float comparisons in tests.
    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < f64::EPSILON
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.db_path, PathBuf::from("dejavu.db"));
        assert_eq!(config.thresholds.image_save, 10);
        assert_eq!(config.thresholds.image_compare, 15);
        assert_eq!(config.thresholds.video_save, 10);
        assert_eq!(config.thresholds.video_compare, 15);
        assert_eq!(config.ffmpeg.binary, "ffmpeg");
        assert!(approx_eq(config.ffmpeg.scene_threshold, 0.2));
    }

    #[test]
    fn test_builder_methods() {
        let thresholds = ThresholdConfig::default()
            .with_image_save(5)
            .with_image_compare(20)
            .with_video_save(7)
            .with_video_compare(25);
        let config = Config::default()
            .with_db_path("/tmp/other.db")
            .with_thresholds(thresholds);

        assert_eq!(config.db_path, PathBuf::from("/tmp/other.db"));
        assert_eq!(config.thresholds.image_save, 5);
        assert_eq!(config.thresholds.image_compare, 20);
        assert_eq!(config.thresholds.video_save, 7);
        assert_eq!(config.thresholds.video_compare, 25);
    }

    #[test]
    fn test_load_from_file_applies_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
db_path = "/var/lib/dejavu/posts.db"

[thresholds]
image_save = 6

[ffmpeg]
binary = "/usr/local/bin/ffmpeg"
"#,
        )
        .unwrap();

        let config = Config::load_from_file(&path).unwrap();

        assert_eq!(config.db_path, PathBuf::from("/var/lib/dejavu/posts.db"));
        // Overridden value applies, the rest keep defaults.
        assert_eq!(config.thresholds.image_save, 6);
        assert_eq!(config.thresholds.image_compare, 15);
        assert_eq!(config.ffmpeg.binary, "/usr/local/bin/ffmpeg");
        assert!(approx_eq(config.ffmpeg.scene_threshold, 0.2));
    }

    #[test]
    fn test_load_from_file_missing_is_config_error() {
        let err =
            Config::load_from_file(std::path::Path::new("/nonexistent/config.toml")).unwrap_err();

        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_load_from_file_malformed_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "db_path = [not toml").unwrap();

        let err = Config::load_from_file(&path).unwrap_err();

        assert!(matches!(err, Error::Config { .. }));
    }
}
