//! Binary entry point for dejavu.
//!
//! This binary provides the CLI interface for the repost detection core.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow option_if_let_else for configuration fallback chains
#![allow(clippy::option_if_let_else)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use chrono::Utc;
use dejavu::{
    Config, ConversationId, DedupeService, FfmpegFrameSource, FingerprintStore, Fingerprinter,
    FrameSource, FsMediaSource, MatchResult, MediaKind, MediaSource, MessageId, PostMeta,
    SaveOutcome, SqliteStore, UserId,
};
use tracing_subscriber::EnvFilter;

/// Dejavu - perceptual-hash repost detection for chat media.
#[derive(Parser)]
#[command(name = "dejavu")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true, env = "DEJAVU_CONFIG_PATH")]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Classify a media file, storing it unless it duplicates an earlier post.
    Save {
        /// Conversation the post belongs to. Group conversation ids are
        /// negative.
        #[arg(long, allow_negative_numbers = true)]
        conversation: i64,

        /// Message id of the post.
        #[arg(long, allow_negative_numbers = true)]
        message: i64,

        /// Id of the posting user.
        #[arg(long, allow_negative_numbers = true)]
        user: i64,

        /// Treat the file as a video.
        #[arg(long)]
        video: bool,

        /// Media file to classify.
        file: PathBuf,
    },

    /// List earlier posts similar to a media file.
    Compare {
        /// Conversation to search. Group conversation ids are negative.
        #[arg(long, allow_negative_numbers = true)]
        conversation: i64,

        /// Message id the media belongs to (excluded from the results).
        #[arg(long, allow_negative_numbers = true)]
        message: i64,

        /// Treat the file as a video.
        #[arg(long)]
        video: bool,

        /// Output format: table or json.
        #[arg(short, long, default_value = "table")]
        format: String,

        /// Media file to compare.
        file: PathBuf,
    },

    /// Show database status.
    Status,
}

/// Output format for compare results.
#[derive(Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    /// Human-readable lines.
    Table,
    /// Pretty-printed JSON.
    Json,
}

/// Main entry point.
fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    match run_command(cli, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

/// Runs the selected command.
fn run_command(cli: Cli, config: &Config) -> anyhow::Result<()> {
    match cli.command {
        Commands::Save {
            conversation,
            message,
            user,
            video,
            file,
        } => cmd_save(config, conversation, message, user, video, file),

        Commands::Compare {
            conversation,
            message,
            video,
            format,
            file,
        } => cmd_compare(config, conversation, message, video, &format, file),

        Commands::Status => cmd_status(config),
    }
}

/// Initializes stderr logging, keeping stdout free for command output.
fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "dejavu=debug" } else { "dejavu=info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Loads configuration.
///
/// The path covers both `--config` and `DEJAVU_CONFIG_PATH`; clap
/// resolves their precedence. A blank value means unset.
fn load_config(path: Option<&str>) -> anyhow::Result<Config> {
    let config = if let Some(config_path) = path.filter(|p| !p.trim().is_empty()) {
        Config::load_from_file(std::path::Path::new(config_path))?
    } else {
        Config::load_default()
    };

    Ok(config.with_env_overrides())
}

/// Parses an output format string.
fn parse_format(s: &str) -> OutputFormat {
    match s.to_lowercase().as_str() {
        "json" => OutputFormat::Json,
        _ => OutputFormat::Table,
    }
}

/// Builds the classification service over the configured database.
fn build_service(config: &Config) -> anyhow::Result<DedupeService<SqliteStore>> {
    let store = SqliteStore::new(&config.db_path)?;
    Ok(DedupeService::new(
        store,
        Fingerprinter::new(),
        config.thresholds,
    ))
}

/// Builds the frame extractor from configuration.
fn frame_source(config: &Config) -> FfmpegFrameSource {
    FfmpegFrameSource::new(&config.ffmpeg.binary, config.ffmpeg.scene_threshold)
}

/// Save command.
fn cmd_save(
    config: &Config,
    conversation: i64,
    message: i64,
    user: i64,
    video: bool,
    file: PathBuf,
) -> anyhow::Result<()> {
    let service = build_service(config)?;
    let meta = PostMeta::new(
        MessageId::new(message),
        ConversationId::new(conversation),
        UserId::new(user),
        Utc::now(),
    );
    let reference = file.to_string_lossy().into_owned();

    let outcome = if video {
        let frames = frame_source(config).extract_frames(&reference)?;
        service.save_video(&meta, &frames)?
    } else {
        let image = FsMediaSource::new().load_image(&reference)?;
        service.save_image(&meta, &image)?
    };

    match outcome {
        SaveOutcome::Stored => println!("stored"),
        SaveOutcome::Duplicate(m) => {
            println!(
                "duplicate of message {} (distance {})",
                m.meta.message_id, m.distance
            );
            println!(
                "  posted by user {} at {}",
                m.meta.user_id,
                m.meta.sent_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
        },
    }

    Ok(())
}

/// Compare command.
fn cmd_compare(
    config: &Config,
    conversation: i64,
    message: i64,
    video: bool,
    format: &str,
    file: PathBuf,
) -> anyhow::Result<()> {
    let service = build_service(config)?;
    // Only the ids take part in compare; user and time are placeholders.
    let meta = PostMeta::new(
        MessageId::new(message),
        ConversationId::new(conversation),
        UserId::new(0),
        Utc::now(),
    );
    let reference = file.to_string_lossy().into_owned();

    let matches = if video {
        let frames = frame_source(config).extract_frames(&reference)?;
        service.compare_video(&meta, &frames)?
    } else {
        let image = FsMediaSource::new().load_image(&reference)?;
        service.compare_image(&meta, &image)?
    };

    print_matches(&matches, parse_format(format))
}

/// Prints compare results in the requested format.
fn print_matches(matches: &[MatchResult], format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(matches)?);
        },
        OutputFormat::Table => {
            if matches.is_empty() {
                println!("no similar posts found");
                return Ok(());
            }

            println!("Found {} similar posts:", matches.len());
            for m in matches {
                println!(
                    "  [distance {:>2}] message {} by user {} at {}",
                    m.distance,
                    m.meta.message_id,
                    m.meta.user_id,
                    m.meta.sent_at.format("%Y-%m-%d %H:%M:%S UTC")
                );
            }
        },
    }

    Ok(())
}

/// Status command.
fn cmd_status(config: &Config) -> anyhow::Result<()> {
    println!("Dejavu Status");
    println!("=============");
    println!();
    println!("Version: {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Database: {}", config.db_path.display());

    if config.db_path.exists() {
        let store = SqliteStore::new(&config.db_path)?;
        println!("  Images: {}", store.count(MediaKind::Image)?);
        println!("  Videos: {}", store.count(MediaKind::Video)?);
    } else {
        println!("  Not initialized (created on first save)");
    }

    println!();
    println!("Thresholds:");
    println!(
        "  Image: save < {}, compare < {}",
        config.thresholds.image_save, config.thresholds.image_compare
    );
    println!(
        "  Video: save < {}, compare < {}",
        config.thresholds.video_save, config.thresholds.video_compare
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_accepts_negative_conversation_id() {
        let cli = Cli::try_parse_from([
            "dejavu",
            "save",
            "--conversation",
            "-1001",
            "--message",
            "42",
            "--user",
            "7",
            "photo.jpg",
        ])
        .unwrap();

        match cli.command {
            Commands::Save {
                conversation,
                message,
                user,
                video,
                file,
            } => {
                assert_eq!(conversation, -1001);
                assert_eq!(message, 42);
                assert_eq!(user, 7);
                assert!(!video);
                assert_eq!(file, PathBuf::from("photo.jpg"));
            },
            _ => panic!("expected save"),
        }
    }

    #[test]
    fn test_compare_accepts_negative_ids() {
        let cli = Cli::try_parse_from([
            "dejavu",
            "compare",
            "--conversation",
            "-1001234567",
            "--message",
            "-8",
            "--video",
            "clip.mp4",
        ])
        .unwrap();

        match cli.command {
            Commands::Compare {
                conversation,
                message,
                video,
                format,
                file,
            } => {
                assert_eq!(conversation, -1_001_234_567);
                assert_eq!(message, -8);
                assert!(video);
                assert_eq!(format, "table");
                assert_eq!(file, PathBuf::from("clip.mp4"));
            },
            _ => panic!("expected compare"),
        }
    }

    #[test]
    fn test_config_flag_is_parsed() {
        let cli = Cli::try_parse_from(["dejavu", "--config", "custom.toml", "status"]).unwrap();
        assert_eq!(cli.config.as_deref(), Some("custom.toml"));
    }

    #[test]
    fn test_parse_format_is_case_insensitive() {
        assert!(matches!(parse_format("json"), OutputFormat::Json));
        assert!(matches!(parse_format("JSON"), OutputFormat::Json));
        assert!(matches!(parse_format("table"), OutputFormat::Table));
        assert!(matches!(parse_format("anything"), OutputFormat::Table));
    }
}
