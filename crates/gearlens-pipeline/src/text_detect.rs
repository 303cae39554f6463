//! Frame text detection stage.
//!
//! Thin adapter over the cheap oracle: loads frame payloads in batches,
//! issues bounded-concurrency detection calls, and derives the
//! has-product-text flag by filtering out generic video chrome.

use std::sync::Arc;
use std::sync::OnceLock;

use futures::stream::{self, StreamExt};
use regex::RegexSet;
use tracing::{info, warn};

use gearlens_media::FrameStore;
use gearlens_models::{FrameId, TextDetection};

use crate::config::PipelineConfig;
use crate::oracle::{FramePayload, RecognitionOracle};
use crate::retry::{retry_non_empty, RetryConfig};

/// Patterns for text that never identifies a product: calls to action,
/// social handles, hashtags, bare counts, and URLs.
fn generic_text_patterns() -> &'static RegexSet {
    static PATTERNS: OnceLock<RegexSet> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        RegexSet::new([
            r"(?i)^(please\s+)?(subscribe|like|share|follow|comment)\b",
            r"(?i)\b(link in bio|smash that|hit the bell|turn on notifications)\b",
            r"^#\w+",
            r"^@\w+",
            r"^[\d\s:.,%/\-]+$",
            r"(?i)^(https?://|www\.)",
        ])
        .expect("static patterns compile")
    })
}

/// True when a detected string is generic chrome rather than product text.
pub(crate) fn is_generic_text(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.len() < 2 || generic_text_patterns().is_match(trimmed)
}

/// Run text detection over every registered frame.
///
/// Batches frames, issues the batches with bounded concurrency, and
/// retries batches that come back entirely empty. Failed batches degrade
/// to no detections for their frames. Results are returned in frame
/// timestamp order.
pub async fn detect_text_in_frames(
    oracle: Arc<dyn RecognitionOracle>,
    store: &FrameStore,
    config: &PipelineConfig,
) -> Vec<TextDetection> {
    let frame_ids = store.frame_ids().await;
    if frame_ids.is_empty() {
        return Vec::new();
    }

    let mut batches: Vec<Vec<FramePayload>> = Vec::new();
    let mut current: Vec<FramePayload> = Vec::new();
    for id in &frame_ids {
        let meta = match store.meta(id).await {
            Some(meta) => meta,
            None => continue,
        };
        let data_url = match store.load_base64(id).await {
            Ok(url) => url,
            Err(e) => {
                warn!("Skipping unreadable frame {}: {}", id, e);
                continue;
            }
        };
        current.push(FramePayload {
            frame_id: id.clone(),
            data_url,
            timestamp_ms: meta.timestamp_ms,
        });
        if current.len() >= config.detect_batch_size {
            batches.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        batches.push(current);
    }

    let retry = RetryConfig::new("text detection batch")
        .with_max_retries(config.empty_batch_retries)
        .with_delay(config.empty_batch_delay);

    let raw_batches: Vec<_> = stream::iter(batches)
        .map(|batch| {
            let oracle = Arc::clone(&oracle);
            let retry = retry.clone();
            async move {
                let raw = retry_non_empty(&retry, || {
                    let oracle = Arc::clone(&oracle);
                    let batch = batch.clone();
                    async move { oracle.detect_text(&batch).await }
                })
                .await;
                (batch, raw)
            }
        })
        .buffer_unordered(config.oracle_concurrency.max(1))
        .collect()
        .await;

    let mut detections: Vec<TextDetection> = Vec::new();
    for (batch, raw) in raw_batches {
        for payload in &batch {
            let texts = raw
                .iter()
                .find(|r| r.frame_id == payload.frame_id.as_str())
                .map(|r| {
                    r.texts
                        .iter()
                        .map(|t| t.trim().to_string())
                        .filter(|t| !t.is_empty())
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default();
            let has_product_text = texts.iter().any(|t| !is_generic_text(t));
            detections.push(TextDetection {
                frame_id: payload.frame_id.clone(),
                timestamp_ms: payload.timestamp_ms,
                texts,
                has_product_text,
            });
        }
    }
    detections.sort_by_key(|d| (d.timestamp_ms, d.frame_id.clone()));

    let with_text = detections.iter().filter(|d| d.has_product_text).count();
    info!(
        "Text detection: {} frames, {} with product text",
        detections.len(),
        with_text
    );
    detections
}

/// Detection lookup by frame id, for the degenerate-coverage paths.
pub fn detection_for_frame<'a>(
    detections: &'a [TextDetection],
    frame_id: &FrameId,
) -> Option<&'a TextDetection> {
    detections.iter().find(|d| &d.frame_id == frame_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chrome_is_generic() {
        assert!(is_generic_text("SUBSCRIBE"));
        assert!(is_generic_text("please subscribe"));
        assert!(is_generic_text("Like and share"));
        assert!(is_generic_text("#vanlife"));
        assert!(is_generic_text("@creator"));
        assert!(is_generic_text("1,234"));
        assert!(is_generic_text("12:34"));
        assert!(is_generic_text("https://example.com"));
        assert!(is_generic_text("x"));
    }

    #[test]
    fn product_text_is_not_generic() {
        assert!(!is_generic_text("KETL Mtn"));
        assert!(!is_generic_text("Sunshirt"));
        assert!(!is_generic_text("MacBook Pro 14"));
    }
}
