//! Pipeline configuration.

use std::time::Duration;

/// Tunable thresholds and limits for a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Videos shorter than this use the short-video sampling interval
    pub short_video_cutoff_secs: u32,
    /// Frame sampling interval for short videos (seconds)
    pub short_interval_secs: u32,
    /// Frame sampling interval for long videos (seconds)
    pub long_interval_secs: u32,
    /// Normalized pixel-difference threshold for scene cuts
    pub scene_threshold: f64,
    /// Hamming distance below which frames are near-duplicates
    pub dedup_hamming: u32,
    /// Base64 payloads kept resident in the frame store
    pub frame_cache_capacity: usize,
    /// Maximum gap between frames in one text cluster (ms)
    pub cluster_max_gap_ms: u64,
    /// Minimum Jaccard similarity to extend a text cluster
    pub cluster_min_jaccard: f64,
    /// Timestamp proximity window for cross-source matching (ms)
    pub timestamp_window_ms: u64,
    /// Confidence boost per corroborating source
    pub source_match_boost: u8,
    /// Confidence bonus when fusion merges duplicates
    pub merge_bonus: u8,
    /// Minimum oracle confidence to accept a gap resolution
    pub gap_accept_confidence: u8,
    /// Confidence assigned to unresolved transcript-only gaps
    pub gap_fallback_confidence: u8,
    /// Confidence assigned to gap resolutions matched via clusters
    pub gap_cluster_confidence: u8,
    /// Confidence for transcript mentions emitted standalone
    pub standalone_transcript_confidence: u8,
    /// Link resolutions below this confidence are discarded
    pub min_link_confidence: f32,
    /// Frames per text-detection oracle call
    pub detect_batch_size: usize,
    /// Clusters per identification oracle call
    pub identify_batch_size: usize,
    /// Concurrent oracle batches in flight
    pub oracle_concurrency: usize,
    /// Per-oracle-call timeout
    pub oracle_timeout: Duration,
    /// Retries for oracle batches that come back entirely empty
    pub empty_batch_retries: u32,
    /// Delay between empty-batch retries
    pub empty_batch_delay: Duration,
    /// Per-FFmpeg-command timeout
    pub command_timeout: Duration,
    /// Maximum description links sent to the link resolver
    pub max_description_links: usize,
    /// Whether the scene-change extraction pass runs
    pub scene_detection: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            short_video_cutoff_secs: 120,
            short_interval_secs: 1,
            long_interval_secs: 2,
            scene_threshold: 0.3,
            dedup_hamming: 2,
            frame_cache_capacity: 20,
            cluster_max_gap_ms: 6000,
            cluster_min_jaccard: 0.5,
            timestamp_window_ms: 30_000,
            source_match_boost: 20,
            merge_bonus: 10,
            gap_accept_confidence: 55,
            gap_fallback_confidence: 50,
            gap_cluster_confidence: 70,
            standalone_transcript_confidence: 65,
            min_link_confidence: 0.3,
            detect_batch_size: 10,
            identify_batch_size: 5,
            oracle_concurrency: 4,
            oracle_timeout: Duration::from_secs(60),
            empty_batch_retries: 3,
            empty_batch_delay: Duration::from_millis(500),
            command_timeout: Duration::from_secs(300),
            max_description_links: 15,
            scene_detection: true,
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            short_video_cutoff_secs: env_parse("GEARLENS_SHORT_VIDEO_CUTOFF_SECS")
                .unwrap_or(defaults.short_video_cutoff_secs),
            short_interval_secs: env_parse("GEARLENS_SHORT_INTERVAL_SECS")
                .unwrap_or(defaults.short_interval_secs),
            long_interval_secs: env_parse("GEARLENS_LONG_INTERVAL_SECS")
                .unwrap_or(defaults.long_interval_secs),
            scene_threshold: env_parse("GEARLENS_SCENE_THRESHOLD")
                .unwrap_or(defaults.scene_threshold),
            dedup_hamming: env_parse("GEARLENS_DEDUP_HAMMING").unwrap_or(defaults.dedup_hamming),
            frame_cache_capacity: env_parse("GEARLENS_FRAME_CACHE_CAPACITY")
                .unwrap_or(defaults.frame_cache_capacity),
            cluster_max_gap_ms: env_parse("GEARLENS_CLUSTER_MAX_GAP_MS")
                .unwrap_or(defaults.cluster_max_gap_ms),
            cluster_min_jaccard: env_parse("GEARLENS_CLUSTER_MIN_JACCARD")
                .unwrap_or(defaults.cluster_min_jaccard),
            timestamp_window_ms: env_parse("GEARLENS_TIMESTAMP_WINDOW_MS")
                .unwrap_or(defaults.timestamp_window_ms),
            source_match_boost: env_parse("GEARLENS_SOURCE_MATCH_BOOST")
                .unwrap_or(defaults.source_match_boost),
            merge_bonus: env_parse("GEARLENS_MERGE_BONUS").unwrap_or(defaults.merge_bonus),
            gap_accept_confidence: env_parse("GEARLENS_GAP_ACCEPT_CONFIDENCE")
                .unwrap_or(defaults.gap_accept_confidence),
            gap_fallback_confidence: env_parse("GEARLENS_GAP_FALLBACK_CONFIDENCE")
                .unwrap_or(defaults.gap_fallback_confidence),
            gap_cluster_confidence: env_parse("GEARLENS_GAP_CLUSTER_CONFIDENCE")
                .unwrap_or(defaults.gap_cluster_confidence),
            standalone_transcript_confidence: env_parse("GEARLENS_STANDALONE_TRANSCRIPT_CONF")
                .unwrap_or(defaults.standalone_transcript_confidence),
            min_link_confidence: env_parse("GEARLENS_MIN_LINK_CONFIDENCE")
                .unwrap_or(defaults.min_link_confidence),
            detect_batch_size: env_parse("GEARLENS_DETECT_BATCH_SIZE")
                .unwrap_or(defaults.detect_batch_size),
            identify_batch_size: env_parse("GEARLENS_IDENTIFY_BATCH_SIZE")
                .unwrap_or(defaults.identify_batch_size),
            oracle_concurrency: env_parse("GEARLENS_ORACLE_CONCURRENCY")
                .unwrap_or(defaults.oracle_concurrency),
            oracle_timeout: Duration::from_secs(
                env_parse("GEARLENS_ORACLE_TIMEOUT_SECS")
                    .unwrap_or(defaults.oracle_timeout.as_secs()),
            ),
            empty_batch_retries: env_parse("GEARLENS_EMPTY_BATCH_RETRIES")
                .unwrap_or(defaults.empty_batch_retries),
            empty_batch_delay: Duration::from_millis(
                env_parse("GEARLENS_EMPTY_BATCH_DELAY_MS")
                    .unwrap_or(defaults.empty_batch_delay.as_millis() as u64),
            ),
            command_timeout: Duration::from_secs(
                env_parse("GEARLENS_COMMAND_TIMEOUT_SECS")
                    .unwrap_or(defaults.command_timeout.as_secs()),
            ),
            max_description_links: env_parse("GEARLENS_MAX_DESCRIPTION_LINKS")
                .unwrap_or(defaults.max_description_links),
            scene_detection: env_parse("GEARLENS_SCENE_DETECTION")
                .unwrap_or(defaults.scene_detection),
        }
    }

    /// Frame sampling interval for a video of the given duration.
    pub fn interval_for_duration(&self, duration_secs: u32) -> u32 {
        if duration_secs < self.short_video_cutoff_secs {
            self.short_interval_secs
        } else {
            self.long_interval_secs
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}
