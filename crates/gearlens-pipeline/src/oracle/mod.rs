//! Oracle seams: the external recognition and link-resolution capabilities
//! the pipeline consumes but does not implement.
//!
//! Everything crossing this boundary is parse-with-defaults: raw responses
//! are deserialized into the `Raw*` structs below with safe defaults for
//! missing fields, and confidence values are clamped on the way in. Raw
//! external JSON never travels past this module.

mod http;

pub use http::HttpRecognitionOracle;

use async_trait::async_trait;
use serde::Deserialize;

use gearlens_models::{ClusterId, FrameId};

use crate::error::PipelineResult;

/// One frame ready to be sent to an oracle.
#[derive(Debug, Clone)]
pub struct FramePayload {
    pub frame_id: FrameId,
    /// `data:image/jpeg;base64,...` URL.
    pub data_url: String,
    pub timestamp_ms: u64,
}

/// One cluster's worth of context for a product-identification call.
#[derive(Debug, Clone)]
pub struct ClusterQuery {
    pub cluster_id: ClusterId,
    pub frame: FramePayload,
    pub detected_text: Vec<String>,
    pub transcript_context: Option<String>,
    pub brand_guess: Option<String>,
}

/// A targeted query for one unmatched transcript mention.
#[derive(Debug, Clone)]
pub struct GapQuery {
    /// Frames captured around the mention; may be empty if extraction failed.
    pub frames: Vec<FramePayload>,
    pub timestamp_ms: u64,
    pub expected_name: String,
    pub expected_brand: Option<String>,
    pub category: Option<String>,
    pub mention_context: Option<String>,
}

/// Video-level context threaded into transcript prompts.
#[derive(Debug, Clone, Default)]
pub struct VideoContext {
    pub title: String,
    pub channel_name: String,
}

/// Per-frame text reading, as reported by the cheap oracle.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTextDetection {
    #[serde(default)]
    pub frame_id: String,
    #[serde(default)]
    pub texts: Vec<String>,
}

/// One identified product, as reported by the strong oracle.
#[derive(Debug, Clone, Deserialize)]
pub struct RawIdentification {
    #[serde(default)]
    pub cluster_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default = "default_confidence")]
    pub confidence: i64,
    #[serde(default)]
    pub evidence: Option<String>,
}

fn default_confidence() -> i64 {
    60
}

/// One product mention, as reported by the transcript oracle.
#[derive(Debug, Clone, Deserialize)]
pub struct RawMention {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub mention_context: Option<String>,
    /// "M:SS" or "H:MM:SS"; unparseable values fail soft to no timestamp.
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// What a link resolver learned about one URL.
#[derive(Debug, Clone, Deserialize)]
pub struct LinkResolution {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    /// 0.0-1.0.
    #[serde(default)]
    pub confidence: f32,
}

/// The vision/text/transcript oracle the pipeline's inference stages call.
#[async_trait]
pub trait RecognitionOracle: Send + Sync {
    /// Read visible text off a batch of frames.
    async fn detect_text(&self, frames: &[FramePayload]) -> PipelineResult<Vec<RawTextDetection>>;

    /// Identify the product shown in each cluster's representative frame.
    async fn identify_products(
        &self,
        clusters: &[ClusterQuery],
        transcript_excerpt: &str,
    ) -> PipelineResult<Vec<RawIdentification>>;

    /// Confirm or correct one expected product from frames around a mention.
    async fn resolve_gap(&self, query: &GapQuery) -> PipelineResult<Option<RawIdentification>>;

    /// Extract product mentions from a prompt over the transcript.
    async fn extract_mentions(&self, prompt: &str) -> PipelineResult<Vec<RawMention>>;
}

/// Resolves a purchase URL to the product it sells.
#[async_trait]
pub trait LinkResolver: Send + Sync {
    async fn resolve(&self, url: &str) -> PipelineResult<Option<LinkResolution>>;
}

/// Strip a surrounding markdown code fence from an oracle's JSON body.
pub(crate) fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    let text = text.strip_prefix("```json").unwrap_or(text);
    let text = text.strip_prefix("```").unwrap_or(text);
    let text = text.strip_suffix("```").unwrap_or(text);
    text.trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_json_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("{\"a\":1}"), "{\"a\":1}");
    }

    #[test]
    fn raw_identification_defaults() {
        let raw: RawIdentification = serde_json::from_str("{}").unwrap();
        assert_eq!(raw.confidence, 60);
        assert!(raw.name.is_empty());
        assert!(raw.brand.is_empty());
        assert!(raw.category.is_none());
    }

    #[test]
    fn raw_mention_tolerates_missing_fields() {
        let raw: RawMention =
            serde_json::from_str("{\"name\":\"Sunshirt\",\"timestamp\":\"2:34\"}").unwrap();
        assert_eq!(raw.name, "Sunshirt");
        assert_eq!(raw.timestamp.as_deref(), Some("2:34"));
        assert!(raw.brand.is_none());
    }
}
