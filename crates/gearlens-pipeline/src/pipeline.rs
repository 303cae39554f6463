//! Pipeline orchestration: one entry point that runs every stage in order
//! and always cleans up its extracted frames.
//!
//! Stage failures degrade rather than abort. A video with no readable
//! frames still produces transcript and link candidates; an oracle outage
//! during identification still produces whatever the other sources found.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tempfile::TempDir;
use tracing::{info, warn};
use uuid::Uuid;

use gearlens_media::{extract_frames, ExtractOptions, FrameStore};
use gearlens_models::{Candidate, ProductCluster, Source};

use crate::brands::BrandDictionary;
use crate::cluster::cluster_detections;
use crate::config::PipelineConfig;
use crate::error::PipelineResult;
use crate::fusion::fuse;
use crate::gap::{resolve_gaps, GapFrameSource, VideoFrameSource};
use crate::identify::{identify_clusters, synthetic_cluster};
use crate::links::{extract_description_urls, resolve_links};
use crate::oracle::{LinkResolver, RecognitionOracle, VideoContext};
use crate::text_detect::{detect_text_in_frames, detection_for_frame};
use crate::transcript::extract_mentions;
use crate::validate::cross_validate;

/// Transcript excerpt length forwarded to identification prompts.
const IDENTIFY_EXCERPT_CHARS: usize = 2000;

/// Frame count at or below which a short video is identified frame by
/// frame instead of through clusters.
const DIRECT_FRAME_LIMIT: usize = 30;

/// Cluster shortfall triggering evenly-spaced frame sampling.
const SPARSE_CLUSTER_LIMIT: usize = 10;
const SPARSE_FRAME_MINIMUM: usize = 50;
const SAMPLE_LIMIT: usize = 50;

/// Everything known about the video before the pipeline runs.
#[derive(Debug, Clone)]
pub struct PipelineInput {
    pub video_path: PathBuf,
    pub duration_secs: u32,
    pub title: String,
    pub channel_name: String,
    pub description: Option<String>,
    pub transcript: Option<String>,
}

/// Run counters reported alongside the product list.
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    pub total_products: usize,
    pub from_vision: usize,
    pub from_transcript: usize,
    pub from_links: usize,
    pub multi_source: usize,
    pub with_purchase_link: usize,
    pub with_image: usize,
    pub frames_extracted: usize,
    pub clusters_built: usize,
    pub gaps_resolved: usize,
    pub elapsed: Duration,
}

#[derive(Debug)]
pub struct PipelineOutput {
    pub products: Vec<Candidate>,
    pub stats: PipelineStats,
}

/// The product detection pipeline.
pub struct ProductPipeline {
    config: PipelineConfig,
    oracle: Arc<dyn RecognitionOracle>,
    link_resolver: Option<Arc<dyn LinkResolver>>,
    gap_frames: Option<Arc<dyn GapFrameSource>>,
    dictionary: BrandDictionary,
}

impl ProductPipeline {
    pub fn new(config: PipelineConfig, oracle: Arc<dyn RecognitionOracle>) -> Self {
        Self {
            config,
            oracle,
            link_resolver: None,
            gap_frames: None,
            dictionary: BrandDictionary::with_defaults(),
        }
    }

    pub fn with_link_resolver(mut self, resolver: Arc<dyn LinkResolver>) -> Self {
        self.link_resolver = Some(resolver);
        self
    }

    /// Replace the video-backed gap frame source.
    pub fn with_gap_frame_source(mut self, source: Arc<dyn GapFrameSource>) -> Self {
        self.gap_frames = Some(source);
        self
    }

    pub fn with_brand_dictionary(mut self, dictionary: BrandDictionary) -> Self {
        self.dictionary = dictionary;
        self
    }

    /// Run the full pipeline over one video.
    ///
    /// Extracted frame files are removed before this returns, on success
    /// and on error alike.
    pub async fn run(&self, input: &PipelineInput) -> PipelineResult<PipelineOutput> {
        let run_id = Uuid::new_v4();
        let started = Instant::now();
        info!(
            "Pipeline run {} starting for \"{}\" ({}s)",
            run_id, input.title, input.duration_secs
        );
        let workdir = TempDir::new()?;
        let store = FrameStore::new(self.config.frame_cache_capacity);

        let result = self.run_stages(input, &workdir, &store, started).await;
        store.cleanup().await;
        result
    }

    async fn run_stages(
        &self,
        input: &PipelineInput,
        workdir: &TempDir,
        store: &FrameStore,
        started: Instant,
    ) -> PipelineResult<PipelineOutput> {
        let mut stats = PipelineStats::default();

        // Stage 1: frame extraction. A failure here leaves the visual
        // stages empty but the run continues.
        let opts = ExtractOptions {
            video_path: input.video_path.clone(),
            output_dir: workdir.path().join("frames"),
            interval_secs: self.config.interval_for_duration(input.duration_secs),
            scene_detection: self.config.scene_detection,
            scene_threshold: self.config.scene_threshold,
            dedup_threshold: self.config.dedup_hamming,
            command_timeout: self.config.command_timeout,
        };
        match extract_frames(&opts).await {
            Ok(frames) => store.register(frames).await,
            Err(e) => warn!("Frame extraction failed, continuing without frames: {}", e),
        }
        stats.frames_extracted = store.len().await;
        if stats.frames_extracted == 0 {
            warn!("No frames available; relying on transcript and links only");
        }

        // Stage 2: transcript mentions and frame text, in parallel.
        let context = VideoContext {
            title: input.title.clone(),
            channel_name: input.channel_name.clone(),
        };
        let transcript = input.transcript.as_deref().unwrap_or("");
        let (mentions, detections) = tokio::join!(
            extract_mentions(
                Arc::clone(&self.oracle),
                transcript,
                &context,
                &self.dictionary
            ),
            detect_text_in_frames(Arc::clone(&self.oracle), store, &self.config),
        );

        // Stage 3: cluster the text detections and enrich each cluster
        // with nearby transcript context.
        let mut clusters = cluster_detections(
            &detections,
            &input.channel_name,
            &self.dictionary,
            self.config.cluster_max_gap_ms,
            self.config.cluster_min_jaccard,
        );
        for cluster in &mut clusters {
            cluster.transcript_context = mentions
                .iter()
                .filter(|m| {
                    m.timestamp_ms
                        .is_some_and(|ts| cluster.near_timestamp(ts, self.config.timestamp_window_ms))
                })
                .map(|m| {
                    m.mention_context
                        .clone()
                        .unwrap_or_else(|| format!("creator mentioned {}", m.full_name()))
                })
                .next();
        }
        self.add_coverage_clusters(input, store, &detections, &mut clusters)
            .await;
        stats.clusters_built = clusters.len();

        // Stage 4: identification, then link resolution.
        let vision = identify_clusters(
            Arc::clone(&self.oracle),
            store,
            &clusters,
            excerpt(transcript),
            &self.dictionary,
            &self.config,
        )
        .await;

        let links = match (&self.link_resolver, &input.description) {
            (Some(resolver), Some(description)) => {
                let urls =
                    extract_description_urls(description, self.config.max_description_links);
                resolve_links(Arc::clone(resolver), &urls, &self.config).await
            }
            _ => Vec::new(),
        };

        // Stage 5: cross-validate, resolve gaps, fuse.
        let outcome = cross_validate(vision, &mentions, &links, &self.config);

        let video_source;
        let gap_source: &dyn GapFrameSource = match &self.gap_frames {
            Some(source) => source.as_ref(),
            None => {
                video_source = VideoFrameSource::new(
                    &input.video_path,
                    workdir.path(),
                    self.config.command_timeout,
                );
                &video_source
            }
        };
        let gap_candidates = resolve_gaps(
            self.oracle.as_ref(),
            gap_source,
            &outcome.unmatched_mentions,
            &clusters,
            &self.dictionary,
            &self.config,
        )
        .await;
        stats.gaps_resolved = gap_candidates
            .iter()
            .filter(|c| c.confidence >= self.config.gap_accept_confidence)
            .count();

        let mut candidates = outcome.candidates;
        candidates.extend(gap_candidates);
        let products = fuse(candidates, &self.config);

        stats.total_products = products.len();
        for product in &products {
            if product.sources.contains(&Source::Vision) {
                stats.from_vision += 1;
            }
            if product.sources.contains(&Source::Transcript) {
                stats.from_transcript += 1;
            }
            if product.sources.contains(&Source::DescriptionLink) {
                stats.from_links += 1;
            }
            if product.sources.len() > 1 {
                stats.multi_source += 1;
            }
            if product.purchase_link.is_some() {
                stats.with_purchase_link += 1;
            }
            if product.image_url.is_some() {
                stats.with_image += 1;
            }
        }
        stats.elapsed = started.elapsed();

        info!(
            "Pipeline complete: {} products ({} multi-source) in {:.1}s",
            stats.total_products,
            stats.multi_source,
            stats.elapsed.as_secs_f64()
        );

        Ok(PipelineOutput { products, stats })
    }

    /// Make sure sparse clustering does not starve identification.
    ///
    /// Short videos with few frames are identified frame by frame; longer
    /// videos with many frames but few clusters get evenly-spaced samples.
    async fn add_coverage_clusters(
        &self,
        input: &PipelineInput,
        store: &FrameStore,
        detections: &[gearlens_models::TextDetection],
        clusters: &mut Vec<ProductCluster>,
    ) {
        let frame_ids = store.frame_ids().await;
        let covered: std::collections::HashSet<&str> = clusters
            .iter()
            .flat_map(|c| c.frame_ids.iter().map(|f| f.as_str()))
            .collect();
        let uncovered: Vec<_> = frame_ids
            .iter()
            .filter(|id| !covered.contains(id.as_str()))
            .cloned()
            .collect();

        let short_video = input.duration_secs < self.config.short_video_cutoff_secs;
        let sampled: Vec<_> = if short_video && frame_ids.len() <= DIRECT_FRAME_LIMIT {
            uncovered
        } else if clusters.len() < SPARSE_CLUSTER_LIMIT && frame_ids.len() > SPARSE_FRAME_MINIMUM {
            let step = (uncovered.len() / SAMPLE_LIMIT).max(1);
            uncovered.into_iter().step_by(step).take(SAMPLE_LIMIT).collect()
        } else {
            return;
        };
        if sampled.is_empty() {
            return;
        }

        let prefix = if short_video { "direct" } else { "sample" };
        info!(
            "Adding {} single-frame clusters for coverage ({})",
            sampled.len(),
            prefix
        );
        for (index, frame_id) in sampled.into_iter().enumerate() {
            let Some(meta) = store.meta(&frame_id).await else {
                continue;
            };
            let texts = detection_for_frame(detections, &frame_id)
                .map(|d| d.texts.clone())
                .unwrap_or_default();
            clusters.push(synthetic_cluster(
                prefix,
                index,
                frame_id,
                meta.timestamp_ms,
                texts,
            ));
        }
    }
}

/// Char-boundary-safe prefix of the transcript for identification prompts.
fn excerpt(transcript: &str) -> &str {
    match transcript.char_indices().nth(IDENTIFY_EXCERPT_CHARS) {
        Some((idx, _)) => &transcript[..idx],
        None => transcript,
    }
}
