//! Core library for tubescope: parses YouTube Studio analytics exports and
//! detects recurring content series across a channel's uploads.
//!
//! The pipeline has two stages. A deterministic pattern pass groups videos
//! by episode markers, bracketed prefixes, and recurring title prefixes; an
//! optional semantic pass sends the remainder to a language model. Merged
//! groups are enriched with per-series metrics (views, engagement, cadence,
//! trend) and optionally persisted through the [`store::SeriesStore`] trait.

pub mod detect;
pub mod error;
pub mod ingest;
pub mod llm;
pub mod model;
pub mod store;
pub mod usage;

pub use detect::{DetectionPipeline, DetectionReport, SemanticOutcome};
pub use error::PipelineError;
pub use ingest::{ingest_path, ingest_url, ingest_zip, parse_export_text};
pub use llm::{AnthropicClient, LlmClient};
pub use model::{
    Confidence, DetectionMethod, PatternSource, PerformanceTrend, SeriesCandidate, SeriesResult,
    VideoFormat, VideoRecord,
};
pub use store::{InMemorySeriesStore, SeriesStore};
pub use usage::{RunUsage, TokenUsage};
