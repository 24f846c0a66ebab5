//! Multi-stage pick generation: discovery, enrichment, criteria validation,
//! price analysis, final approval and diversification.

pub mod analyzer;
pub mod config;
pub mod discoverer;
pub mod enricher;
pub mod filter;
pub mod pacing;
pub mod pipeline;
pub mod prompts;
pub mod reference;
pub mod retry;
pub mod scorer;
pub mod validator;

pub use config::{FallbackPolicy, PipelineConfig, StageRetry, DEFAULT_CALLS_PER_MINUTE};
pub use pipeline::{PickPipeline, PipelineRun, RunStats};
pub use reference::{ReferenceData, ReferenceQuote};
