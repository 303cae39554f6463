//! Dense frame extraction with scene detection and perceptual dedup.
//!
//! Two FFmpeg passes produce the raw frame set: interval sampling at
//! `fps = 1/interval`, and scene-change frames selected by the `scene`
//! filter with timestamps recovered from `showinfo` output. The merged,
//! time-sorted set is then thinned with a windowed perceptual-hash
//! comparison; dropped frames' files are deleted immediately.
//!
//! Failure policy: scene detection failing degrades to interval-only
//! frames; interval extraction failing yields an empty frame set. Neither
//! is fatal to the pipeline.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{info, warn};

use gearlens_models::{FrameId, FrameOrigin, PerceptualHash};

use crate::command::{run_ffmpeg, FfmpegCommand};
use crate::error::MediaResult;
use crate::phash::{hash_image_file, image_dimensions_or_default};
use crate::store::Frame;

/// How many recently kept frames a new frame is compared against.
const DEDUP_WINDOW: usize = 5;

/// Options for dense frame extraction.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Local video file path.
    pub video_path: PathBuf,
    /// Directory that receives frame JPEGs.
    pub output_dir: PathBuf,
    /// Interval between sampled frames, in seconds.
    pub interval_secs: u32,
    /// Whether to run the scene-change pass.
    pub scene_detection: bool,
    /// Normalized pixel-difference threshold for a scene cut.
    pub scene_threshold: f64,
    /// Hamming distance below which two frames are near-duplicates.
    pub dedup_threshold: u32,
    /// Per-FFmpeg-command timeout.
    pub command_timeout: Duration,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            video_path: PathBuf::new(),
            output_dir: PathBuf::new(),
            interval_secs: 2,
            scene_detection: true,
            scene_threshold: 0.3,
            dedup_threshold: 2,
            command_timeout: Duration::from_secs(300),
        }
    }
}

/// Extract frames from a video: interval sampling plus scene changes,
/// merged, hashed, and deduplicated.
pub async fn extract_frames(opts: &ExtractOptions) -> MediaResult<Vec<Frame>> {
    tokio::fs::create_dir_all(&opts.output_dir).await?;

    let interval_frames = extract_interval_frames(opts).await;
    info!(
        "Extracted {} interval frames (every {}s)",
        interval_frames.len(),
        opts.interval_secs
    );
    if interval_frames.is_empty() {
        return Ok(Vec::new());
    }

    let scene_frames = if opts.scene_detection {
        let frames = extract_scene_frames(opts, interval_frames.len()).await;
        info!("Extracted {} scene-change frames", frames.len());
        frames
    } else {
        Vec::new()
    };

    let mut all: Vec<Frame> = interval_frames.into_iter().chain(scene_frames).collect();
    all.sort_by_key(|f| f.timestamp_ms);

    // Hashing is CPU-bound image work; keep it off the runtime threads.
    let hashed = tokio::task::spawn_blocking(move || {
        for frame in all.iter_mut() {
            frame.phash = hash_image_file(&frame.path).unwrap_or(PerceptualHash::ZERO);
        }
        all
    })
    .await
    .unwrap_or_default();

    let before = hashed.len();
    let (kept, dropped) = dedup_by_hash(hashed, opts.dedup_threshold, DEDUP_WINDOW);
    if !dropped.is_empty() {
        info!(
            "Perceptual dedup removed {} of {} frames",
            dropped.len(),
            before
        );
        for frame in dropped {
            let _ = tokio::fs::remove_file(&frame.path).await;
        }
    }

    Ok(kept)
}

/// Extract one frame near a specific timestamp, for targeted gap queries.
pub async fn extract_frame_at(
    video_path: &Path,
    timestamp_ms: u64,
    out_path: &Path,
    timeout: Duration,
) -> MediaResult<()> {
    let cmd = FfmpegCommand::new(video_path, out_path)
        .seek(timestamp_ms as f64 / 1000.0)
        .single_frame()
        .jpeg_quality(2);
    run_ffmpeg(&cmd, timeout).await?;
    Ok(())
}

async fn extract_interval_frames(opts: &ExtractOptions) -> Vec<Frame> {
    let fps = 1.0 / opts.interval_secs as f64;
    let pattern = opts.output_dir.join("interval_%05d.jpg");
    let cmd = FfmpegCommand::new(&opts.video_path, &pattern)
        .video_filter(format!("fps={}", fps))
        .jpeg_quality(3)
        .vfr();

    if let Err(e) = run_ffmpeg(&cmd, opts.command_timeout).await {
        warn!("Interval extraction failed: {}", e);
        return Vec::new();
    }

    let files = list_frames(&opts.output_dir, "interval_").await;
    files
        .into_iter()
        .enumerate()
        .map(|(i, path)| {
            let (width, height) = image_dimensions_or_default(&path);
            Frame {
                id: FrameId::new(format!("frame_{:04}", i)),
                path,
                timestamp_ms: i as u64 * opts.interval_secs as u64 * 1000,
                width,
                height,
                phash: PerceptualHash::ZERO,
                origin: FrameOrigin::Interval,
            }
        })
        .collect()
}

async fn extract_scene_frames(opts: &ExtractOptions, existing_count: usize) -> Vec<Frame> {
    let pattern = opts.output_dir.join("scene_%05d.jpg");
    let filter = format!(
        "select=gt(scene\\,{}),showinfo",
        opts.scene_threshold
    );
    let cmd = FfmpegCommand::new(&opts.video_path, &pattern)
        .video_filter(filter)
        .jpeg_quality(3)
        .vfr();

    let output = match run_ffmpeg(&cmd, opts.command_timeout).await {
        Ok(output) => output,
        Err(e) => {
            warn!("Scene detection failed, continuing with interval frames: {}", e);
            return Vec::new();
        }
    };

    let files = list_frames(&opts.output_dir, "scene_").await;
    if files.is_empty() {
        return Vec::new();
    }

    let timestamps = parse_scene_timestamps(&output.stderr);
    if timestamps.is_empty() {
        warn!("Could not parse showinfo timestamps, discarding scene frames");
        for path in &files {
            let _ = tokio::fs::remove_file(path).await;
        }
        return Vec::new();
    }

    files
        .into_iter()
        .zip(timestamps)
        .enumerate()
        .map(|(i, (path, timestamp_ms))| {
            let (width, height) = image_dimensions_or_default(&path);
            Frame {
                id: FrameId::new(format!("scene_{:04}", existing_count + i)),
                path,
                timestamp_ms,
                width,
                height,
                phash: PerceptualHash::ZERO,
                origin: FrameOrigin::SceneChange,
            }
        })
        .collect()
}

/// List extracted frame files with the given prefix, sorted by name.
async fn list_frames(dir: &Path, prefix: &str) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if let Ok(mut entries) = tokio::fs::read_dir(dir).await {
        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(prefix) && name.ends_with(".jpg") {
                files.push(entry.path());
            }
        }
    }
    files.sort();
    files
}

/// Parse `pts_time:` values out of showinfo's stderr log, in milliseconds.
fn parse_scene_timestamps(stderr: &str) -> Vec<u64> {
    let mut timestamps = Vec::new();
    for chunk in stderr.split("pts_time:").skip(1) {
        let value: String = chunk
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        if let Ok(secs) = value.parse::<f64>() {
            timestamps.push((secs * 1000.0).round() as u64);
        }
    }
    timestamps
}

/// Drop frames whose hash is within `threshold` of any of the last `window`
/// kept frames. Returns (kept, dropped).
fn dedup_by_hash(frames: Vec<Frame>, threshold: u32, window: usize) -> (Vec<Frame>, Vec<Frame>) {
    let mut kept: Vec<Frame> = Vec::with_capacity(frames.len());
    let mut dropped = Vec::new();

    for frame in frames {
        let window_start = kept.len().saturating_sub(window);
        let is_duplicate = kept[window_start..]
            .iter()
            .any(|k| k.phash.distance(frame.phash) < threshold);
        if is_duplicate {
            dropped.push(frame);
        } else {
            kept.push(frame);
        }
    }

    (kept, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with_hash(idx: usize, bits: u64) -> Frame {
        Frame {
            id: FrameId::new(format!("frame_{:04}", idx)),
            path: PathBuf::from(format!("/tmp/frame_{:04}.jpg", idx)),
            timestamp_ms: idx as u64 * 2000,
            width: 1280,
            height: 720,
            phash: PerceptualHash::from_bits(bits),
            origin: FrameOrigin::Interval,
        }
    }

    #[test]
    fn parses_showinfo_timestamps() {
        let stderr = "\
[Parsed_showinfo_1 @ 0x55] n:   0 pts:  19278 pts_time:7.71 duration:...\n\
[Parsed_showinfo_1 @ 0x55] n:   1 pts:  54321 pts_time:21.73 fmt:yuv420p\n";
        assert_eq!(parse_scene_timestamps(stderr), vec![7710, 21730]);
    }

    #[test]
    fn parse_ignores_garbage() {
        assert!(parse_scene_timestamps("no timestamps here").is_empty());
        assert!(parse_scene_timestamps("pts_time:abc").is_empty());
    }

    #[test]
    fn dedup_keeps_exactly_one_of_a_near_pair() {
        let frames = vec![frame_with_hash(0, 0b1111_0000), frame_with_hash(1, 0b1111_0001)];
        let (kept, dropped) = dedup_by_hash(frames, 2, 5);
        assert_eq!(kept.len(), 1);
        assert_eq!(dropped.len(), 1);
        assert_eq!(kept[0].id.as_str(), "frame_0000");
    }

    #[test]
    fn dedup_keeps_distinct_frames() {
        let frames = vec![
            frame_with_hash(0, 0x0000_0000_0000_0000),
            frame_with_hash(1, 0xFFFF_FFFF_0000_0000),
            frame_with_hash(2, 0x0000_0000_FFFF_FFFF),
        ];
        let (kept, dropped) = dedup_by_hash(frames, 2, 5);
        assert_eq!(kept.len(), 3);
        assert!(dropped.is_empty());
    }

    #[test]
    fn dedup_window_limits_comparisons() {
        // Frame 0 and frame 7 share a hash, but frame 7 is outside the
        // window of 2 once five distinct frames sit between them.
        let mut frames = vec![frame_with_hash(0, 0)];
        for i in 1..7 {
            frames.push(frame_with_hash(i, 0xFF << (i * 8)));
        }
        frames.push(frame_with_hash(7, 0));
        let (kept, _) = dedup_by_hash(frames, 2, 2);
        assert_eq!(kept.len(), 8);
    }

    #[test]
    fn noisy_interval_frames_collapse() {
        // 200 frames of the same scene with lighting noise flipping at most
        // one low bit. Everything lands within the default threshold.
        let frames: Vec<Frame> = (0..200)
            .map(|i| frame_with_hash(i, 0xDEAD_BEEF ^ (i as u64 % 2)))
            .collect();
        let (kept, _) = dedup_by_hash(frames, 2, 5);
        assert!(kept.len() < 30, "kept {} frames", kept.len());
    }
}
