// Contract Analysis Pipeline
// Public surface of the chunk -> model -> merge -> bound pipeline

pub mod bounding;
pub mod error;
pub mod merge;
pub mod orchestrator;
pub mod prompt;

pub use bounding::{bound_result, fit_for_transport, BoundLimits, TRUNCATION_MARKER};
pub use error::PipelineError;
pub use merge::{merge_results, MergeLimits};
pub use orchestrator::{AnalysisOutcome, ChunkPlan, ContractAnalyzer};
pub use prompt::{build_analysis_prompt, parse_model_response};
