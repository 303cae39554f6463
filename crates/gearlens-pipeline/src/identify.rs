//! Product identification over cluster representative frames.
//!
//! Sends batches of representative frames to the strong oracle with each
//! cluster's detected text, transcript snippet, and brand guess as context,
//! then sanitizes the results into candidates.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{info, warn};

use gearlens_media::FrameStore;
use gearlens_models::{Candidate, ClusterId, ProductCluster, Source};

use crate::brands::BrandDictionary;
use crate::config::PipelineConfig;
use crate::oracle::{ClusterQuery, FramePayload, RawIdentification, RecognitionOracle};

/// Identify products from every cluster, in oracle batches.
pub async fn identify_clusters(
    oracle: Arc<dyn RecognitionOracle>,
    store: &FrameStore,
    clusters: &[ProductCluster],
    transcript_excerpt: &str,
    dictionary: &BrandDictionary,
    config: &PipelineConfig,
) -> Vec<Candidate> {
    let mut candidates = Vec::new();

    for batch in clusters.chunks(config.identify_batch_size.max(1)) {
        let mut queries = Vec::new();
        for cluster in batch {
            let data_url = match store.load_base64(&cluster.representative_frame).await {
                Ok(url) => url,
                Err(e) => {
                    warn!(
                        "Skipping cluster {} with unreadable frame: {}",
                        cluster.id, e
                    );
                    continue;
                }
            };
            let timestamp_ms = store
                .meta(&cluster.representative_frame)
                .await
                .map(|m| m.timestamp_ms)
                .unwrap_or(cluster.start_ms);
            queries.push(ClusterQuery {
                cluster_id: cluster.id.clone(),
                frame: FramePayload {
                    frame_id: cluster.representative_frame.clone(),
                    data_url,
                    timestamp_ms,
                },
                detected_text: cluster.texts.clone(),
                transcript_context: cluster.transcript_context.clone(),
                brand_guess: cluster.brand_guess.clone(),
            });
        }
        if queries.is_empty() {
            continue;
        }

        let raw = match oracle.identify_products(&queries, transcript_excerpt).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Identification batch failed, skipping: {}", e);
                continue;
            }
        };

        for identification in raw {
            let Some(cluster) = batch
                .iter()
                .find(|c| c.id.as_str() == identification.cluster_id)
            else {
                continue;
            };
            let Some(query) = queries.iter().find(|q| q.cluster_id == cluster.id) else {
                continue;
            };
            candidates.push(to_candidate(
                identification,
                cluster,
                query.frame.timestamp_ms,
                dictionary,
            ));
        }
    }

    info!(
        "Identified {} products from {} clusters",
        candidates.len(),
        clusters.len()
    );
    candidates
}

/// Sanitize one oracle identification against its cluster.
fn to_candidate(
    raw: RawIdentification,
    cluster: &ProductCluster,
    timestamp_ms: u64,
    dictionary: &BrandDictionary,
) -> Candidate {
    let name = if raw.name.trim().is_empty() {
        cluster.primary_text.clone()
    } else {
        raw.name.trim().to_string()
    };

    let mut brand = raw.brand.trim().to_string();
    if !brand.is_empty() {
        brand = dictionary.correct_or_keep(&brand);
    }
    // When the oracle has no usable brand, try the cluster's detected text.
    if brand.is_empty() || brand.eq_ignore_ascii_case("unknown") {
        if let Some(matched) = cluster
            .texts
            .iter()
            .find_map(|t| dictionary.fuzzy_match(t).map(|m| m.brand.name.clone()))
        {
            brand = matched;
        }
    }

    Candidate {
        name,
        brand,
        category: raw.category.filter(|c| !c.trim().is_empty()),
        confidence: Candidate::clamp_confidence(raw.confidence),
        cluster_id: Some(cluster.id.clone()),
        frame_id: Some(cluster.representative_frame.clone()),
        detected_text: cluster.texts.clone(),
        evidence: raw.evidence,
        timestamp_ms: Some(timestamp_ms),
        sources: BTreeSet::from([Source::Vision, Source::TextOverlay]),
        purchase_link: None,
        image_url: None,
    }
}

/// Build one synthetic single-frame cluster, for the degenerate-coverage
/// paths where text clustering yields too little to identify from.
pub fn synthetic_cluster(
    prefix: &str,
    index: usize,
    frame_id: gearlens_models::FrameId,
    timestamp_ms: u64,
    texts: Vec<String>,
) -> ProductCluster {
    let primary_text = texts.first().cloned().unwrap_or_default();
    ProductCluster {
        id: ClusterId::new(format!("{}_{:03}", prefix, index)),
        frame_ids: vec![frame_id.clone()],
        representative_frame: frame_id,
        start_ms: timestamp_ms,
        end_ms: timestamp_ms,
        texts,
        primary_text,
        brand_guess: None,
        transcript_context: None,
    }
}
