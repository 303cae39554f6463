//! Product detection pipeline for creator videos.
//!
//! Takes a downloaded video plus its metadata and returns the products
//! shown or mentioned in it, with confidence scores, timestamps, and
//! purchase links. Evidence is gathered from three independent sources
//! (frame text and vision, the transcript, and description links),
//! cross-validated, gap-filled, and fused into one deduplicated list.
//!
//! [`ProductPipeline`] is the entry point; everything that talks to an
//! external model sits behind the [`oracle::RecognitionOracle`] and
//! [`oracle::LinkResolver`] traits.

pub mod brands;
pub mod cluster;
pub mod config;
pub mod error;
pub mod fusion;
pub mod gap;
pub mod identify;
pub mod links;
pub mod oracle;
pub mod pipeline;
pub mod retry;
pub mod text;
pub mod text_detect;
pub mod transcript;
pub mod validate;

pub use brands::BrandDictionary;
pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult};
pub use gap::{GapFrameSource, VideoFrameSource};
pub use oracle::{HttpRecognitionOracle, LinkResolver, RecognitionOracle};
pub use pipeline::{PipelineInput, PipelineOutput, PipelineStats, ProductPipeline};
