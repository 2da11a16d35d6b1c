use std::path::PathBuf;

use clap::Parser;
use tracing::Level;

macro_rules! arg_env {
    ($v:literal) => {
        concat!("FRAMECAP_", $v)
    };
}

/// Download a web video and extract frames out of it at regular intervals.
///
/// Uses `yt-dlp` (or `youtube-dl`) to download the video
/// and `ffmpeg` to decode it.
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Args {
    /// The URL of the video
    #[arg(env = arg_env!("URL"))]
    pub url: String,

    /// Interval between two extracted frames, in seconds
    #[arg(short, long, default_value_t = 30, env = arg_env!("INTERVAL"))]
    pub interval: u64,

    /// Output directory for the frames
    #[arg(short, long, default_value = "frames", env = arg_env!("OUTPUT"))]
    pub output: PathBuf,

    /// Keep the downloaded video file instead of deleting it after extraction
    #[arg(short, long, env = arg_env!("KEEP_VIDEO"))]
    pub keep_video: bool,

    /// Path to a TOML settings file
    #[arg(short, long, env = arg_env!("CONFIG"))]
    pub config: Option<PathBuf>,

    /// Maximum level of the logs to print
    #[arg(long, default_value_t = Level::INFO, env = arg_env!("LOG_LEVEL"))]
    pub log_level: Level,
}
