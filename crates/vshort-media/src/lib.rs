//! FFmpeg CLI wrapper for the VShort pipeline.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with multiple inputs
//! - Progress parsing from `-progress pipe:2` and yt-dlp output
//! - Timeouts that kill the child process
//! - Acquisition profiles, direct-URL resolution and raw byte transfer
//! - Audio extraction, segment cutting and concatenation
//! - Editing-style filter graphs, ASS subtitles and final composition
//! - Validation, repair and placeholder generation

pub mod audio;
pub mod clip;
pub mod command;
pub mod compose;
pub mod download;
pub mod error;
pub mod filters;
pub mod placeholder;
pub mod probe;
pub mod progress;
pub mod repair;
pub mod subtitles;

pub use audio::{extract_audio, AudioFormat};
pub use clip::{concat_segments, extract_segment};
pub use command::{check_ffmpeg, check_ffprobe, check_ytdlp, FfmpegCommand, FfmpegRunner};
pub use compose::{render, ComposeRequest};
pub use download::{
    download_with_profile, is_rate_limited, resolve_direct_url, transfer_bytes, DownloadProfile,
    DownloadRequest,
};
pub use error::{MediaError, MediaResult};
pub use filters::{build_style_filter, OUTPUT_HEIGHT, OUTPUT_WIDTH};
pub use placeholder::generate_placeholder_video;
pub use probe::{get_duration, has_video_stream, is_video_valid, probe_media};
pub use progress::{parse_ytdlp_percent, FfmpegProgress};
pub use repair::{repair_video, RepairMode};
pub use subtitles::{render_ass, render_srt, write_ass};
