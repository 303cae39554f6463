//! Product clusters: contiguous frame runs that show the same product.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::frame::FrameId;

/// Opaque identifier for a product cluster.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterId(String);

impl ClusterId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A contiguous run of frames whose detected-text sets overlap enough to be
/// judged as showing one product.
///
/// Built once per run by the text clusterer; immutable afterwards except for
/// the context fields the orchestrator attaches before identification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCluster {
    pub id: ClusterId,
    /// Member frames, in time order.
    pub frame_ids: Vec<FrameId>,
    /// The member with the most detected text; sent to the identify oracle.
    pub representative_frame: FrameId,
    pub start_ms: u64,
    pub end_ms: u64,
    /// Union of member texts, first-seen order.
    pub texts: Vec<String>,
    /// Most frequent normalized string, original casing from first occurrence.
    pub primary_text: String,
    /// Brand guessed from detected text, if the dictionary recognized one.
    pub brand_guess: Option<String>,
    /// Nearby transcript mention context, if any.
    pub transcript_context: Option<String>,
}

impl ProductCluster {
    /// True when the cluster's span or either endpoint lies within
    /// `window_ms` of the given timestamp.
    pub fn near_timestamp(&self, timestamp_ms: u64, window_ms: u64) -> bool {
        let near = |edge: u64| edge.abs_diff(timestamp_ms) <= window_ms;
        near(self.start_ms) || near(self.end_ms)
            || (self.start_ms <= timestamp_ms && timestamp_ms <= self.end_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster(start_ms: u64, end_ms: u64) -> ProductCluster {
        ProductCluster {
            id: ClusterId::new("cluster_000"),
            frame_ids: vec![FrameId::new("frame_0000")],
            representative_frame: FrameId::new("frame_0000"),
            start_ms,
            end_ms,
            texts: vec![],
            primary_text: String::new(),
            brand_guess: None,
            transcript_context: None,
        }
    }

    #[test]
    fn near_timestamp_within_window() {
        let c = cluster(60_000, 70_000);
        assert!(c.near_timestamp(40_000, 30_000));
        assert!(c.near_timestamp(95_000, 30_000));
        assert!(c.near_timestamp(65_000, 30_000));
        assert!(!c.near_timestamp(5_000, 30_000));
    }
}
