//! Media layer: FFmpeg frame extraction, perceptual hashing, and the
//! disk-backed frame store.
//!
//! This crate owns every interaction with the filesystem and FFmpeg. The
//! pipeline crate above it works purely in terms of `FrameId`s and the
//! payloads the [`FrameStore`] hands out.

pub mod command;
pub mod error;
pub mod extract;
pub mod phash;
pub mod store;

pub use command::{check_ffmpeg, run_ffmpeg, FfmpegCommand, FfmpegOutput};
pub use error::{MediaError, MediaResult};
pub use extract::{extract_frame_at, extract_frames, ExtractOptions};
pub use phash::hash_image_file;
pub use store::{read_jpeg_data_url, Frame, FrameStore, DEFAULT_CACHE_CAPACITY};
