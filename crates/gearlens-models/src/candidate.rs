//! Identified product candidates and their source-specific inputs.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::cluster::ClusterId;
use crate::frame::FrameId;

/// Where a piece of evidence for a candidate came from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Identified from a frame by the strong vision oracle.
    Vision,
    /// On-screen text overlay corroborated the identification.
    TextOverlay,
    /// Extracted from the spoken transcript.
    Transcript,
    /// Resolved from a purchase link in the video description.
    DescriptionLink,
}

/// A purchase link attached to a candidate by the link resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseLink {
    pub url: String,
    pub domain: String,
    pub is_affiliate: bool,
}

/// One proposed product identification.
///
/// Candidates are enriched as stages corroborate them: confidence only goes
/// up (capped at 100) and `sources` only grows. Merging always produces a
/// new value so provenance stays auditable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub name: String,
    /// Empty string when unknown.
    pub brand: String,
    pub category: Option<String>,
    /// 0-100.
    pub confidence: u8,
    pub cluster_id: Option<ClusterId>,
    pub frame_id: Option<FrameId>,
    /// Detected-text evidence from the originating cluster.
    pub detected_text: Vec<String>,
    /// Visual description or transcript mention context.
    pub evidence: Option<String>,
    pub timestamp_ms: Option<u64>,
    pub sources: BTreeSet<Source>,
    pub purchase_link: Option<PurchaseLink>,
    pub image_url: Option<String>,
}

impl Candidate {
    /// Clamp an oracle-reported confidence into the 0-100 range.
    pub fn clamp_confidence(raw: i64) -> u8 {
        raw.clamp(0, 100) as u8
    }

    /// Raise confidence by `amount`, saturating at 100.
    pub fn boost(&mut self, amount: u8) {
        self.confidence = (u16::from(self.confidence) + u16::from(amount)).min(100) as u8;
    }

    /// Record an additional contributing source.
    pub fn add_source(&mut self, source: Source) {
        self.sources.insert(source);
    }

    /// `"Brand Name"` when a brand is known, else just the name.
    pub fn full_name(&self) -> String {
        if self.brand.is_empty() {
            self.name.clone()
        } else {
            format!("{} {}", self.brand, self.name)
        }
    }

    /// Whether the brand field carries usable information.
    pub fn has_brand(&self) -> bool {
        !self.brand.is_empty() && !self.brand.eq_ignore_ascii_case("unknown")
    }
}

/// A product mention extracted from the transcript by the transcript oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptMention {
    pub name: String,
    pub brand: Option<String>,
    pub category: Option<String>,
    /// What the creator said about it.
    pub mention_context: Option<String>,
    /// Missing when the oracle's timestamp was absent or unparseable.
    pub timestamp_ms: Option<u64>,
}

impl TranscriptMention {
    pub fn full_name(&self) -> String {
        match &self.brand {
            Some(brand) if !brand.is_empty() => format!("{} {}", brand, self.name),
            _ => self.name.clone(),
        }
    }
}

/// A product resolved from a description link by the link resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkCandidate {
    pub name: String,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub purchase_url: String,
    pub domain: String,
    pub is_affiliate: bool,
    /// 0.0-1.0 as reported by the resolver.
    pub confidence: f32,
}
