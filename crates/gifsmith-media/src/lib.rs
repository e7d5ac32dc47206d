//! FFmpeg CLI wrapper for the gifsmith backend.
//!
//! Everything here shells out to `ffmpeg`/`ffprobe` with bounded
//! timeouts. The engine crate drives these functions through its
//! `Segmenter`/`ClipEncoder` traits; nothing in this crate knows about
//! jobs or the event stream.

pub mod command;
pub mod error;
pub mod fs_utils;
pub mod gif;
pub mod probe;
pub mod segment;
pub mod sniff;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use fs_utils::move_file;
pub use gif::{convert_grayscale, extract_clip_gif, merge_concat};
pub use probe::{probe_video, VideoInfo};
pub use segment::detect_scenes;
pub use sniff::{is_video_header, sniff_container};
