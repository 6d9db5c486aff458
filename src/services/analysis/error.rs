use thiserror::Error;

use crate::models::AnalysisResult;
use crate::services::providers::ProviderError;

pub const MISSING_KEY_MESSAGE: &str = "OpenAI API key not configured";
pub const EMPTY_TEXT_MESSAGE: &str = "No text could be extracted from the file.";
pub const GENERIC_FAILURE_MESSAGE: &str = "Failed to analyze contract. Please try again.";
pub const TIMEOUT_MESSAGE: &str =
    "Contract analysis took too long and was stopped. Please try again with a shorter contract.";
pub const TOO_LARGE_MESSAGE: &str =
    "The analysis result is too large. Please try a shorter contract.";
pub const MERGE_FAILURE_MESSAGE: &str =
    "Failed to combine the analysis of this contract. Please try a shorter contract.";
pub const NO_RESULTS_MESSAGE: &str = "No analysis results to merge";
pub const RESPONSE_TOO_LARGE_MESSAGE: &str = "Analysis result is too large to return. The contract may be too long. Please try with a shorter contract or split it into sections.";

/// Failure of one pipeline stage.
///
/// The `Display` text is for logs only. Clients see
/// [`PipelineError::user_message`] through [`PipelineError::into_result`].
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("model credential not configured")]
    MissingCredential,
    #[error("contract text is empty")]
    EmptyText,
    #[error("model call failed on chunk {chunk}: {source}")]
    Model {
        chunk: usize,
        #[source]
        source: ProviderError,
    },
    #[error("invalid model response on chunk {chunk}: {reason}")]
    InvalidModelResponse { chunk: usize, reason: String },
    #[error("result exceeds safety limits: {0}")]
    Oversize(String),
    #[error("analysis exceeded its {0}s budget")]
    Timeout(u64),
}

impl PipelineError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::MissingCredential => MISSING_KEY_MESSAGE,
            Self::EmptyText => EMPTY_TEXT_MESSAGE,
            Self::Model { .. } | Self::InvalidModelResponse { .. } => GENERIC_FAILURE_MESSAGE,
            Self::Oversize(_) => TOO_LARGE_MESSAGE,
            Self::Timeout(_) => TIMEOUT_MESSAGE,
        }
    }

    /// Degraded, client-safe result for this failure.
    pub fn into_result(self) -> AnalysisResult {
        AnalysisResult::failed(self.user_message())
    }
}
