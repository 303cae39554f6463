//! Gap resolution for transcript mentions nothing else corroborated.
//!
//! Two escalating steps per mention, stopping at the first success: a free
//! lookup against the already-built text clusters, then up to three freshly
//! extracted frames around the mention and a single targeted oracle query.
//! A mention that survives both steps is kept as a transcript-only
//! candidate rather than dropped.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use gearlens_media::{extract_frame_at, read_jpeg_data_url};
use gearlens_models::{Candidate, FrameId, ProductCluster, Source, TranscriptMention};

use crate::brands::BrandDictionary;
use crate::config::PipelineConfig;
use crate::oracle::{FramePayload, GapQuery, RecognitionOracle};

/// Offsets around a mention at which fallback frames are captured.
const FRAME_OFFSETS_MS: [i64; 3] = [-10_000, 0, 10_000];

/// Files smaller than this are discarded as failed captures.
const MIN_FRAME_BYTES: u64 = 500;

/// Supplies frames captured around a timestamp for targeted gap queries.
#[async_trait]
pub trait GapFrameSource: Send + Sync {
    async fn frames_around(&self, timestamp_ms: u64) -> Vec<FramePayload>;
}

/// Frame source backed by the original video file.
pub struct VideoFrameSource {
    video_path: PathBuf,
    temp_dir: PathBuf,
    timeout: Duration,
}

impl VideoFrameSource {
    pub fn new(video_path: impl Into<PathBuf>, temp_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            video_path: video_path.into(),
            temp_dir: temp_dir.into(),
            timeout,
        }
    }
}

#[async_trait]
impl GapFrameSource for VideoFrameSource {
    async fn frames_around(&self, timestamp_ms: u64) -> Vec<FramePayload> {
        let mut frames = Vec::new();
        for offset in FRAME_OFFSETS_MS {
            let frame_ts = timestamp_ms.saturating_add_signed(offset);
            let out_path = self.temp_dir.join(format!("gap_{}.jpg", frame_ts / 1000));
            if let Err(e) = extract_frame_at(&self.video_path, frame_ts, &out_path, self.timeout).await {
                warn!("Gap frame capture at {}ms failed: {}", frame_ts, e);
                continue;
            }
            match tokio::fs::metadata(&out_path).await {
                Ok(meta) if meta.len() >= MIN_FRAME_BYTES => {}
                _ => continue,
            }
            match read_jpeg_data_url(&out_path).await {
                Ok(data_url) => frames.push(FramePayload {
                    frame_id: FrameId::new(format!("gap_{}", frame_ts / 1000)),
                    data_url,
                    timestamp_ms: frame_ts,
                }),
                Err(e) => warn!("Gap frame read failed: {}", e),
            }
        }
        frames
    }
}

/// Resolve every unmatched timestamped mention. Issues at most one oracle
/// query per mention.
pub async fn resolve_gaps(
    oracle: &dyn RecognitionOracle,
    frame_source: &dyn GapFrameSource,
    mentions: &[TranscriptMention],
    clusters: &[ProductCluster],
    dictionary: &BrandDictionary,
    config: &PipelineConfig,
) -> Vec<Candidate> {
    let mut resolved = Vec::new();

    for mention in mentions {
        let Some(timestamp_ms) = mention.timestamp_ms else {
            continue;
        };

        if let Some(cluster) = find_cluster_match(mention, timestamp_ms, clusters, config) {
            resolved.push(cluster_candidate(mention, timestamp_ms, cluster, config));
            continue;
        }

        match resolve_with_vision(oracle, frame_source, mention, timestamp_ms, dictionary).await {
            Some(candidate) if candidate.confidence >= config.gap_accept_confidence => {
                resolved.push(candidate);
            }
            _ => resolved.push(fallback_candidate(mention, timestamp_ms, config)),
        }
    }

    let accepted = resolved
        .iter()
        .filter(|c| c.confidence >= config.gap_accept_confidence)
        .count();
    info!(
        "Gap resolution: {} mentions, {} resolved, {} transcript-only",
        mentions.len(),
        accepted,
        resolved.len() - accepted
    );
    resolved
}

/// A cluster within the timestamp window whose text union references the
/// mention's name or brand.
fn find_cluster_match<'a>(
    mention: &TranscriptMention,
    timestamp_ms: u64,
    clusters: &'a [ProductCluster],
    config: &PipelineConfig,
) -> Option<&'a ProductCluster> {
    let full_name = mention.full_name().to_lowercase();
    let brand = mention
        .brand
        .as_deref()
        .map(|b| b.to_lowercase())
        .unwrap_or_default();

    clusters.iter().find(|cluster| {
        if !cluster.near_timestamp(timestamp_ms, config.timestamp_window_ms) {
            return false;
        }
        cluster.texts.iter().any(|text| {
            let text = text.to_lowercase();
            full_name.contains(&text)
                || text.contains(&full_name)
                || (!brand.is_empty() && text.contains(&brand))
        })
    })
}

fn cluster_candidate(
    mention: &TranscriptMention,
    timestamp_ms: u64,
    cluster: &ProductCluster,
    config: &PipelineConfig,
) -> Candidate {
    Candidate {
        name: mention.name.clone(),
        brand: mention.brand.clone().unwrap_or_default(),
        category: mention.category.clone(),
        confidence: config.gap_cluster_confidence,
        cluster_id: Some(cluster.id.clone()),
        frame_id: Some(cluster.representative_frame.clone()),
        detected_text: cluster.texts.clone(),
        evidence: mention.mention_context.clone(),
        timestamp_ms: Some(timestamp_ms),
        sources: BTreeSet::from([Source::Transcript, Source::TextOverlay]),
        purchase_link: None,
        image_url: None,
    }
}

async fn resolve_with_vision(
    oracle: &dyn RecognitionOracle,
    frame_source: &dyn GapFrameSource,
    mention: &TranscriptMention,
    timestamp_ms: u64,
    dictionary: &BrandDictionary,
) -> Option<Candidate> {
    let frames = frame_source.frames_around(timestamp_ms).await;
    if frames.is_empty() {
        return None;
    }

    let query = GapQuery {
        frames,
        timestamp_ms,
        expected_name: mention.name.clone(),
        expected_brand: mention.brand.clone(),
        category: mention.category.clone(),
        mention_context: mention.mention_context.clone(),
    };

    let raw = match oracle.resolve_gap(&query).await {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            warn!("Gap vision query failed: {}", e);
            return None;
        }
    };

    let name = if raw.name.trim().is_empty() {
        mention.name.clone()
    } else {
        raw.name.trim().to_string()
    };
    let brand_raw = if raw.brand.trim().is_empty() {
        mention.brand.clone().unwrap_or_default()
    } else {
        raw.brand.trim().to_string()
    };
    let brand = if brand_raw.is_empty() {
        brand_raw
    } else {
        dictionary.correct_or_keep(&brand_raw)
    };

    Some(Candidate {
        name,
        brand,
        category: raw.category.or_else(|| mention.category.clone()),
        confidence: Candidate::clamp_confidence(raw.confidence),
        cluster_id: None,
        frame_id: None,
        detected_text: Vec::new(),
        evidence: raw.evidence,
        timestamp_ms: Some(timestamp_ms),
        sources: BTreeSet::from([Source::Vision, Source::Transcript]),
        purchase_link: None,
        image_url: None,
    })
}

fn fallback_candidate(
    mention: &TranscriptMention,
    timestamp_ms: u64,
    config: &PipelineConfig,
) -> Candidate {
    Candidate {
        name: mention.name.clone(),
        brand: mention.brand.clone().unwrap_or_default(),
        category: mention.category.clone(),
        confidence: config.gap_fallback_confidence,
        cluster_id: None,
        frame_id: None,
        detected_text: Vec::new(),
        evidence: mention.mention_context.clone(),
        timestamp_ms: Some(timestamp_ms),
        sources: BTreeSet::from([Source::Transcript]),
        purchase_link: None,
        image_url: None,
    }
}
