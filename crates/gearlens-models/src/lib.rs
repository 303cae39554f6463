//! Shared data models for the GearLens product pipeline.
//!
//! Frames, text detections, product clusters, and candidates flow through
//! every stage of the pipeline; the types here are the common vocabulary.
//! Candidates are value types: stages merge them by producing new values,
//! never by mutating another source's data in place.

pub mod candidate;
pub mod cluster;
pub mod detection;
pub mod frame;
pub mod timestamp;

pub use candidate::{Candidate, LinkCandidate, PurchaseLink, Source, TranscriptMention};
pub use cluster::{ClusterId, ProductCluster};
pub use detection::TextDetection;
pub use frame::{FrameId, FrameMeta, FrameOrigin, PerceptualHash};
pub use timestamp::{format_ms, parse_timestamp_ms, TimestampError};
