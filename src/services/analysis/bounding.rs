// Size-Bounding Pass
// Guarantees the result handed to callers stays within fixed size limits

use tracing::{info, warn};

use super::error::{PipelineError, RESPONSE_TOO_LARGE_MESSAGE, TOO_LARGE_MESSAGE};
use crate::models::{AnalysisResult, Clause};
use crate::services::config_store::PipelineConfig;

pub const TRUNCATION_MARKER: &str = "... [truncated]";

const TRANSPORT_STAGES: [(usize, &str); 2] = [
    (5000, "... [truncated due to size]"),
    (3000, "... [truncated due to size limits]"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundLimits {
    pub max_clauses: usize,
    /// Characters kept per clause text field before the marker.
    pub max_field_length: usize,
    /// Serialized size above which the result is replaced by an error.
    pub max_result_bytes: usize,
}

impl Default for BoundLimits {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for BoundLimits {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            max_clauses: config.max_clauses,
            max_field_length: config.max_field_length,
            max_result_bytes: config.max_result_bytes,
        }
    }
}

/// Cap clause count and field lengths.
///
/// Error results pass through untouched. If the bounded result still cannot
/// be serialized within `max_result_bytes`, the clauses are dropped and a
/// generic error is returned with the original overall risk.
pub fn bound_result(result: AnalysisResult, limits: &BoundLimits) -> AnalysisResult {
    if result.is_error() {
        return result;
    }

    let overall_risk = result.overall_risk;
    match try_bound(result, limits) {
        Ok(bounded) => bounded,
        Err(e) => {
            warn!("[BOUND] falling back to minimal result: {}", e);
            AnalysisResult::failed_with_risk(overall_risk, TOO_LARGE_MESSAGE)
        }
    }
}

fn try_bound(mut result: AnalysisResult, limits: &BoundLimits) -> Result<AnalysisResult, PipelineError> {
    if result.clauses.len() > limits.max_clauses {
        info!(
            "[BOUND] dropping {} clauses over cap {}",
            result.clauses.len() - limits.max_clauses,
            limits.max_clauses
        );
        result.clauses.truncate(limits.max_clauses);
    }

    let mut truncated = 0usize;
    for clause in &mut result.clauses {
        truncated += bound_clause(clause, limits.max_field_length);
    }
    if truncated > 0 {
        info!("[BOUND] truncated {} fields to {} chars", truncated, limits.max_field_length);
    }

    let size = serialized_len(&result)?;
    if size > limits.max_result_bytes {
        return Err(PipelineError::Oversize(format!(
            "bounded result is {} bytes, limit {}",
            size, limits.max_result_bytes
        )));
    }

    Ok(result)
}

fn bound_clause(clause: &mut Clause, max_chars: usize) -> usize {
    [
        &mut clause.summary,
        &mut clause.original_text,
        &mut clause.suggested_redline,
    ]
    .into_iter()
    .map(|field| truncate_field(field, max_chars, TRUNCATION_MARKER) as usize)
    .sum()
}

/// Cut `field` to `max_chars` characters and append `marker`.
///
/// A field that was already cut with the same marker is left alone, so
/// running a pass twice changes nothing.
fn truncate_field(field: &mut String, max_chars: usize, marker: &str) -> bool {
    let chars = field.chars().count();
    if chars <= max_chars {
        return false;
    }
    if field.ends_with(marker) && chars <= max_chars + marker.chars().count() {
        return false;
    }

    let cut = field
        .char_indices()
        .nth(max_chars)
        .map(|(i, _)| i)
        .unwrap_or(field.len());
    field.truncate(cut);
    field.push_str(marker);
    true
}

fn serialized_len(result: &AnalysisResult) -> Result<usize, PipelineError> {
    serde_json::to_vec(result)
        .map(|bytes| bytes.len())
        .map_err(|e| PipelineError::Oversize(format!("result not serializable: {}", e)))
}

/// Last guard before a result leaves the pipeline.
///
/// Results under `max_response_bytes` are returned as is. Otherwise the
/// clause excerpts and redlines are cut harder in two stages, and if that is
/// still not enough an error result keeping the overall risk is returned.
pub fn fit_for_transport(result: AnalysisResult, max_response_bytes: usize) -> AnalysisResult {
    let overall_risk = result.overall_risk;
    let mut current = result;

    match serialized_len(&current) {
        Ok(size) if size <= max_response_bytes => return current,
        Ok(size) => warn!("[BOUND] response is {} bytes, limit {}", size, max_response_bytes),
        Err(e) => {
            warn!("[BOUND] {}", e);
            return AnalysisResult::failed_with_risk(overall_risk, RESPONSE_TOO_LARGE_MESSAGE);
        }
    }

    for (max_chars, marker) in TRANSPORT_STAGES {
        for clause in &mut current.clauses {
            truncate_field(&mut clause.original_text, max_chars, marker);
            truncate_field(&mut clause.suggested_redline, max_chars, marker);
        }
        match serialized_len(&current) {
            Ok(size) if size <= max_response_bytes => {
                info!("[BOUND] response fits after cutting fields to {} chars", max_chars);
                return current;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("[BOUND] {}", e);
                break;
            }
        }
    }

    AnalysisResult::failed_with_risk(overall_risk, RESPONSE_TOO_LARGE_MESSAGE)
}
