// Redline Core Services
// Extraction, text handling, configuration, model access and the analysis pipeline

pub mod text_processor;
pub mod config_store;
pub mod providers;
pub mod language;
pub mod extraction;
pub mod analysis;

pub use text_processor::*;
pub use config_store::*;
pub use providers::*;
pub use language::*;
pub use extraction::{extract_text, ExtractionError};

pub use analysis::{
    bound_result,
    fit_for_transport,
    merge_results,
    AnalysisOutcome,
    BoundLimits,
    ContractAnalyzer,
    MergeLimits,
    PipelineError,
};
