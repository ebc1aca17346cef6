//! Command-line configuration. Nothing is persisted between runs.

use crate::export::ExportOptions;
use crate::playback::PlaybackConfig;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "detection_app", version, about = "Object detection evaluator for images and videos")]
pub struct AppConfig {
    /// Image or video to open at start-up
    pub path: Option<PathBuf>,

    /// Delay between playback ticks in milliseconds
    #[arg(long, default_value_t = 33, value_parser = clap::value_parser!(u64).range(1..))]
    pub tick_interval_ms: u64,

    /// Longest edge of the displayed frame in pixels
    #[arg(long, default_value_t = 600)]
    pub display_size: u32,

    /// Default log filter, overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Four character codec code used for video export
    #[arg(long, default_value = "mp4v")]
    pub export_codec: String,

    /// Keep the output file when an export fails or is cancelled
    #[arg(long)]
    pub keep_partial_exports: bool,
}

impl AppConfig {
    pub fn playback(&self) -> PlaybackConfig {
        PlaybackConfig {
            tick_interval: Duration::from_millis(self.tick_interval_ms),
        }
    }

    pub fn export(&self) -> ExportOptions {
        ExportOptions {
            fourcc: self.export_codec.clone(),
            remove_partial_on_failure: !self.keep_partial_exports,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::parse_from(["detection_app"]);
        assert_eq!(config.path, None);
        assert_eq!(config.playback().tick_interval, Duration::from_millis(33));
        assert_eq!(config.display_size, 600);
        assert_eq!(config.export_codec, "mp4v");
        assert_eq!(config.export().fourcc, "mp4v");
        assert!(config.export().remove_partial_on_failure);
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::parse_from([
            "detection_app",
            "--tick-interval-ms",
            "50",
            "--keep-partial-exports",
            "--export-codec",
            "avc1",
            "clip.mp4",
        ]);
        assert_eq!(config.path, Some(PathBuf::from("clip.mp4")));
        assert_eq!(config.playback().tick_interval, Duration::from_millis(50));
        assert_eq!(config.export().fourcc, "avc1");
        assert!(!config.export().remove_partial_on_failure);
    }

    #[test]
    fn test_zero_tick_interval_rejected() {
        assert!(AppConfig::try_parse_from(["detection_app", "--tick-interval-ms", "0"]).is_err());
    }
}
