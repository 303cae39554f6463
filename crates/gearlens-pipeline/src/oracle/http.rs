//! HTTP-backed recognition oracle.
//!
//! Talks to an OpenAI-compatible chat-completions endpoint: a cheap model
//! for frame text reading and a strong model for product identification and
//! gap queries. Responses are requested as JSON objects and still pass
//! through fence stripping before parsing, since models occasionally wrap
//! JSON in markdown anyway.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use gearlens_models::format_ms;

use crate::error::{PipelineError, PipelineResult};

use super::{
    strip_code_fences, ClusterQuery, FramePayload, GapQuery, RawIdentification, RawMention,
    RawTextDetection, RecognitionOracle,
};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_DETECT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_IDENTIFY_MODEL: &str = "gpt-4o";

/// Recognition oracle over an OpenAI-compatible API.
pub struct HttpRecognitionOracle {
    api_key: String,
    base_url: String,
    detect_model: String,
    identify_model: String,
    client: Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    response_format: ResponseFormat,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
    detail: &'static str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DetectionsEnvelope {
    #[serde(default)]
    detections: Vec<RawTextDetection>,
}

#[derive(Debug, Deserialize)]
struct ProductsEnvelope {
    #[serde(default)]
    products: Vec<RawIdentification>,
}

#[derive(Debug, Deserialize)]
struct GapEnvelope {
    product: Option<RawIdentification>,
}

#[derive(Debug, Deserialize)]
struct MentionsEnvelope {
    #[serde(default)]
    products: Vec<RawMention>,
}

impl HttpRecognitionOracle {
    /// Create an oracle reading its API key from `GEARLENS_ORACLE_API_KEY`.
    pub fn from_env(timeout: Duration) -> PipelineResult<Self> {
        let api_key = std::env::var("GEARLENS_ORACLE_API_KEY")
            .map_err(|_| PipelineError::config_error("GEARLENS_ORACLE_API_KEY not set"))?;
        let base_url = std::env::var("GEARLENS_ORACLE_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            api_key,
            base_url,
            detect_model: DEFAULT_DETECT_MODEL.to_string(),
            identify_model: DEFAULT_IDENTIFY_MODEL.to_string(),
            client,
        })
    }

    async fn chat(&self, request: &ChatRequest) -> PipelineResult<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| PipelineError::oracle_failed(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::oracle_failed(format!(
                "oracle returned {}: {}",
                status, body
            )));
        }

        let chat: ChatResponse = response.json().await?;
        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| PipelineError::oracle_failed("no content in oracle response"))
    }

    fn request(&self, model: &str, content: Vec<ContentPart>, max_tokens: u32) -> ChatRequest {
        ChatRequest {
            model: model.to_string(),
            messages: vec![Message {
                role: "user",
                content,
            }],
            response_format: ResponseFormat {
                format_type: "json_object",
            },
            temperature: 0.2,
            max_tokens,
        }
    }
}

fn image_part(frame: &FramePayload) -> ContentPart {
    ContentPart::ImageUrl {
        image_url: ImageUrl {
            url: frame.data_url.clone(),
            detail: "high",
        },
    }
}

fn detect_prompt(frames: &[FramePayload]) -> String {
    let frame_list = frames
        .iter()
        .enumerate()
        .map(|(i, f)| format!("Image {}: frame \"{}\" at {}", i + 1, f.frame_id, format_ms(f.timestamp_ms)))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Read ALL text visible in each of these video frames: overlays, labels, logos, product names, captions.

FRAMES:
{frame_list}

Return JSON:
{{
  "detections": [
    {{ "frame_id": "frame_0001", "texts": ["KETL Mtn", "Sunshirt"] }}
  ]
}}

Include an entry for every frame. Use an empty texts array when a frame has no readable text."#
    )
}

fn identify_prompt(clusters: &[ClusterQuery], transcript_excerpt: &str) -> String {
    let cluster_descriptions = clusters
        .iter()
        .enumerate()
        .map(|(i, q)| {
            let text_list = if q.detected_text.is_empty() {
                "none detected".to_string()
            } else {
                q.detected_text
                    .iter()
                    .map(|t| format!("\"{}\"", t))
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            let mut desc = format!(
                "Image {} ({}, {}):\n  Text detected: [{}]",
                i + 1,
                q.cluster_id,
                format_ms(q.frame.timestamp_ms),
                text_list
            );
            if let Some(ctx) = &q.transcript_context {
                desc.push_str(&format!("\n  Transcript: \"{}\"", ctx));
            }
            if let Some(brand) = &q.brand_guess {
                desc.push_str(&format!("\n  Possible brand: {}", brand));
            }
            desc
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    let transcript_section = if transcript_excerpt.is_empty() {
        String::new()
    } else {
        let excerpt: String = transcript_excerpt.chars().take(2000).collect();
        format!("\nVIDEO TRANSCRIPT CONTEXT (first 2000 chars):\n{excerpt}\n")
    };

    format!(
        r#"Identify the EXACT brand and model of each product shown in these video frames.

Pre-detected text for each frame is listed below. Use it as strong evidence.

CLUSTERS TO IDENTIFY:
{cluster_descriptions}
{transcript_section}
RULES:
1. The detected text often contains the brand name, model name, or both
2. If detected text says "KETL Mtn Sunshirt", the brand is "KETL Mtn" and the product is "Sunshirt"
3. If you see a brand logo the text detection missed, still include it
4. Set confidence on evidence: 95+ if text clearly shows brand+model, 80+ if brand visible but model unclear, 60+ if inference only
5. Return ONE product per image (the primary product shown)
6. Omit clusters where no product is visible (transition frame, person talking)

Return JSON:
{{
  "products": [
    {{
      "cluster_id": "cluster_007",
      "name": "Product Model Name (without brand prefix)",
      "brand": "Brand Name",
      "category": "category (e.g., shirt, backpack, laptop, headphones)",
      "confidence": 90,
      "evidence": "brief description of what's shown"
    }}
  ]
}}"#
    )
}

fn gap_prompt(query: &GapQuery) -> String {
    let full_name = match &query.expected_brand {
        Some(brand) if !brand.is_empty() => format!("{} {}", brand, query.expected_name),
        _ => query.expected_name.clone(),
    };
    let category = query.category.as_deref().unwrap_or("product");
    let context = query.mention_context.as_deref().unwrap_or("");

    format!(
        r#"The video creator mentions "{full_name}" (category: {category}) around timestamp {}.

These frames are from around that moment. Identify the EXACT product shown.

Context: "{context}"

Look for:
1. Text overlays showing brand/model
2. Brand logos
3. Distinctive product design

Return JSON:
{{
  "product": {{
    "name": "Model Name",
    "brand": "Brand",
    "category": "{category}",
    "confidence": 85,
    "evidence": "what you see"
  }}
}}

If you cannot identify the specific product, return {{ "product": null }}."#,
        format_ms(query.timestamp_ms)
    )
}

#[async_trait]
impl RecognitionOracle for HttpRecognitionOracle {
    async fn detect_text(&self, frames: &[FramePayload]) -> PipelineResult<Vec<RawTextDetection>> {
        if frames.is_empty() {
            return Ok(Vec::new());
        }
        let mut content = vec![ContentPart::Text {
            text: detect_prompt(frames),
        }];
        content.extend(frames.iter().map(image_part));

        let request = self.request(&self.detect_model, content, 2000);
        let body = self.chat(&request).await?;
        let envelope: DetectionsEnvelope = serde_json::from_str(strip_code_fences(&body))?;
        debug!(
            "Text detection: {} frames -> {} detections",
            frames.len(),
            envelope.detections.len()
        );
        Ok(envelope.detections)
    }

    async fn identify_products(
        &self,
        clusters: &[ClusterQuery],
        transcript_excerpt: &str,
    ) -> PipelineResult<Vec<RawIdentification>> {
        if clusters.is_empty() {
            return Ok(Vec::new());
        }
        let mut content = vec![ContentPart::Text {
            text: identify_prompt(clusters, transcript_excerpt),
        }];
        content.extend(clusters.iter().map(|q| image_part(&q.frame)));

        let request = self.request(&self.identify_model, content, 4000);
        let body = self.chat(&request).await?;
        let envelope: ProductsEnvelope = serde_json::from_str(strip_code_fences(&body))?;
        Ok(envelope.products)
    }

    async fn resolve_gap(&self, query: &GapQuery) -> PipelineResult<Option<RawIdentification>> {
        let mut content = vec![ContentPart::Text {
            text: gap_prompt(query),
        }];
        content.extend(query.frames.iter().map(image_part));

        let request = self.request(&self.identify_model, content, 1000);
        let body = match self.chat(&request).await {
            Ok(body) => body,
            Err(e) => {
                warn!("Gap query failed: {}", e);
                return Ok(None);
            }
        };
        let envelope: GapEnvelope = serde_json::from_str(strip_code_fences(&body))?;
        Ok(envelope.product)
    }

    async fn extract_mentions(&self, prompt: &str) -> PipelineResult<Vec<RawMention>> {
        let content = vec![ContentPart::Text {
            text: prompt.to_string(),
        }];
        let request = self.request(&self.identify_model, content, 8000);
        let body = self.chat(&request).await?;
        let envelope: MentionsEnvelope = serde_json::from_str(strip_code_fences(&body))?;
        Ok(envelope.products)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gearlens_models::FrameId;

    fn payload(id: &str, ts: u64) -> FramePayload {
        FramePayload {
            frame_id: FrameId::new(id),
            data_url: "data:image/jpeg;base64,AAAA".to_string(),
            timestamp_ms: ts,
        }
    }

    #[test]
    fn detect_prompt_lists_frames() {
        let prompt = detect_prompt(&[payload("frame_0000", 0), payload("frame_0001", 62_000)]);
        assert!(prompt.contains("frame_0000"));
        assert!(prompt.contains("1:02"));
    }

    #[test]
    fn gap_prompt_includes_expectation() {
        let query = GapQuery {
            frames: vec![],
            timestamp_ms: 154_000,
            expected_name: "Zed 3".to_string(),
            expected_brand: Some("Acme".to_string()),
            category: Some("putter".to_string()),
            mention_context: Some("my favorite putter".to_string()),
        };
        let prompt = gap_prompt(&query);
        assert!(prompt.contains("Acme Zed 3"));
        assert!(prompt.contains("2:34"));
        assert!(prompt.contains("putter"));
    }

    #[test]
    fn content_part_serialization() {
        let part = ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: "data:image/jpeg;base64,AAAA".to_string(),
                detail: "high",
            },
        };
        let json = serde_json::to_value(&part).unwrap();
        assert_eq!(json["type"], "image_url");
        assert_eq!(json["image_url"]["detail"], "high");
    }
}
