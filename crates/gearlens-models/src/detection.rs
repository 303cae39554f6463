//! Per-frame text detection results.

use serde::{Deserialize, Serialize};

use crate::frame::FrameId;

/// Text read off a single frame by the cheap recognition oracle.
///
/// Produced once per frame and never mutated. `has_product_text` is derived
/// at detection time by filtering out generic video chrome (calls to action,
/// view counts, hashtags).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextDetection {
    pub frame_id: FrameId,
    pub timestamp_ms: u64,
    /// Raw strings visible in the frame, in detection order.
    pub texts: Vec<String>,
    /// True when at least one detected string looks product-relevant.
    pub has_product_text: bool,
}
