// Merge Engine
// Combines per-chunk analyses into one document-level result

use std::collections::HashMap;
use tracing::{info, warn};

use super::error::{PipelineError, MERGE_FAILURE_MESSAGE, NO_RESULTS_MESSAGE};
use crate::models::{AnalysisResult, Clause, RiskLevel};
use crate::services::config_store::PipelineConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeLimits {
    /// Partial results considered; later ones are ignored.
    pub max_results: usize,
    /// Distinct clause names kept; first-seen names win a slot.
    pub max_clauses: usize,
    /// Ceiling on the text held by the merged clauses.
    pub max_text_bytes: usize,
}

impl Default for MergeLimits {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for MergeLimits {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            max_results: config.max_merge_results,
            max_clauses: config.max_merged_clauses,
            max_text_bytes: config.max_merge_bytes,
        }
    }
}

/// Merge chunk results in chunk order.
///
/// Clauses are deduplicated by name. A later clause replaces an earlier one
/// only when its risk is strictly higher, so ties go to the first chunk.
/// The overall risk is the highest overall risk of any input. Failures
/// degrade to an empty, error-flagged result.
pub fn merge_results(results: Vec<AnalysisResult>, limits: &MergeLimits) -> AnalysisResult {
    match try_merge(results, limits) {
        Ok(merged) => merged,
        Err(e) => {
            warn!("[MERGE] merge failed, returning degraded result: {}", e);
            AnalysisResult::failed(MERGE_FAILURE_MESSAGE)
        }
    }
}

fn try_merge(mut results: Vec<AnalysisResult>, limits: &MergeLimits) -> Result<AnalysisResult, PipelineError> {
    if results.is_empty() {
        return Ok(AnalysisResult::failed(NO_RESULTS_MESSAGE));
    }
    if results.len() == 1 {
        return Ok(results.remove(0));
    }

    if results.len() > limits.max_results {
        warn!(
            "[MERGE] {} partial results exceed cap {}, ignoring the rest",
            results.len(),
            limits.max_results
        );
        results.truncate(limits.max_results);
    }

    let overall_risk = results
        .iter()
        .map(|r| r.overall_risk)
        .fold(RiskLevel::Low, |highest, current| {
            if current.priority() > highest.priority() {
                current
            } else {
                highest
            }
        });

    let mut index_by_name: HashMap<String, usize> = HashMap::new();
    let mut clauses: Vec<Clause> = Vec::new();
    let mut dropped = 0usize;

    for result in results {
        for clause in result.clauses {
            match index_by_name.get(&clause.name) {
                Some(&idx) => {
                    if clause.risk_level.priority() > clauses[idx].risk_level.priority() {
                        clauses[idx] = clause;
                    }
                }
                None if clauses.len() < limits.max_clauses => {
                    index_by_name.insert(clause.name.clone(), clauses.len());
                    clauses.push(clause);
                }
                None => dropped += 1,
            }
        }
    }

    if dropped > 0 {
        warn!(
            "[MERGE] clause cap {} reached, dropped {} new clause names",
            limits.max_clauses, dropped
        );
    }

    let text_bytes: usize = clauses.iter().map(clause_text_bytes).sum();
    if text_bytes > limits.max_text_bytes {
        return Err(PipelineError::Oversize(format!(
            "merged clauses hold {} bytes, limit {}",
            text_bytes, limits.max_text_bytes
        )));
    }

    info!(
        "[MERGE] merged clauses={} overall_risk={} text_bytes={}",
        clauses.len(),
        overall_risk,
        text_bytes
    );

    Ok(AnalysisResult::new(overall_risk, clauses))
}

fn clause_text_bytes(clause: &Clause) -> usize {
    clause.name.len()
        + clause.summary.len()
        + clause.original_text.len()
        + clause.suggested_redline.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clause(name: &str, risk: RiskLevel) -> Clause {
        Clause {
            name: name.to_string(),
            risk_level: risk,
            summary: format!("{} summary", name),
            original_text: format!("{} text", name),
            suggested_redline: format!("{} redline", name),
        }
    }

    fn result(overall: RiskLevel, clauses: Vec<Clause>) -> AnalysisResult {
        AnalysisResult::new(overall, clauses)
    }

    #[test]
    fn test_empty_input() {
        let merged = merge_results(vec![], &MergeLimits::default());
        assert_eq!(merged.overall_risk, RiskLevel::Low);
        assert!(merged.clauses.is_empty());
        assert_eq!(merged.error.as_deref(), Some(NO_RESULTS_MESSAGE));
    }

    #[test]
    fn test_single_input_unchanged() {
        let only = result(
            RiskLevel::Unknown,
            vec![clause("Term", RiskLevel::Low), clause("Term", RiskLevel::High)],
        );
        let merged = merge_results(vec![only.clone()], &MergeLimits::default());
        assert_eq!(merged, only);
    }

    #[test]
    fn test_higher_risk_overrides() {
        let merged = merge_results(
            vec![
                result(RiskLevel::Low, vec![clause("Term", RiskLevel::Low)]),
                result(RiskLevel::High, vec![clause("Term", RiskLevel::High)]),
            ],
            &MergeLimits::default(),
        );
        assert_eq!(merged.clauses.len(), 1);
        assert_eq!(merged.clauses[0].name, "Term");
        assert_eq!(merged.clauses[0].risk_level, RiskLevel::High);
        assert_eq!(merged.overall_risk, RiskLevel::High);
        assert!(merged.error.is_none());
    }

    #[test]
    fn test_first_seen_wins_ties_and_keeps_position() {
        let mut first = clause("Indemnity", RiskLevel::Medium);
        first.summary = "first".to_string();
        let mut second = clause("Indemnity", RiskLevel::Medium);
        second.summary = "second".to_string();

        let merged = merge_results(
            vec![
                result(RiskLevel::Medium, vec![first, clause("Term", RiskLevel::Low)]),
                result(RiskLevel::Low, vec![clause("Term", RiskLevel::High), second]),
            ],
            &MergeLimits::default(),
        );
        assert_eq!(merged.clauses[0].name, "Indemnity");
        assert_eq!(merged.clauses[0].summary, "first");
        assert_eq!(merged.clauses[1].name, "Term");
        assert_eq!(merged.clauses[1].risk_level, RiskLevel::High);
        assert_eq!(merged.overall_risk, RiskLevel::Medium);
    }

    #[test]
    fn test_unknown_risk_never_overrides() {
        let merged = merge_results(
            vec![
                result(RiskLevel::Unknown, vec![clause("Insurance", RiskLevel::Low)]),
                result(RiskLevel::Unknown, vec![clause("Insurance", RiskLevel::Unknown)]),
            ],
            &MergeLimits::default(),
        );
        assert_eq!(merged.clauses[0].risk_level, RiskLevel::Low);
        assert_eq!(merged.overall_risk, RiskLevel::Low);
    }

    #[test]
    fn test_disjoint_names_are_all_kept() {
        let merged = merge_results(
            vec![
                result(RiskLevel::Low, vec![clause("Term", RiskLevel::Low), clause("Insurance", RiskLevel::Low)]),
                result(RiskLevel::Low, vec![clause("Governing Law", RiskLevel::Medium)]),
            ],
            &MergeLimits::default(),
        );
        assert_eq!(merged.clauses.len(), 3);
    }

    #[test]
    fn test_distinct_clause_cap() {
        let results: Vec<AnalysisResult> = (0..3)
            .map(|r| {
                result(
                    RiskLevel::Low,
                    (0..100).map(|i| clause(&format!("c{}-{}", r, i), RiskLevel::Low)).collect(),
                )
            })
            .collect();
        let merged = merge_results(results, &MergeLimits::default());
        assert_eq!(merged.clauses.len(), 200);
        assert_eq!(merged.clauses[199].name, "c1-99");
    }

    #[test]
    fn test_result_cap_ignores_late_results() {
        let limits = MergeLimits { max_results: 2, ..MergeLimits::default() };
        let merged = merge_results(
            vec![
                result(RiskLevel::Low, vec![clause("Term", RiskLevel::Low)]),
                result(RiskLevel::Low, vec![clause("Insurance", RiskLevel::Low)]),
                result(RiskLevel::High, vec![clause("Term", RiskLevel::High)]),
            ],
            &limits,
        );
        assert_eq!(merged.clauses.len(), 2);
        assert_eq!(merged.clauses[0].risk_level, RiskLevel::Low);
        assert_eq!(merged.overall_risk, RiskLevel::Low);
    }

    #[test]
    fn test_oversize_degrades_to_error_result() {
        let limits = MergeLimits { max_text_bytes: 10, ..MergeLimits::default() };
        let merged = merge_results(
            vec![
                result(RiskLevel::High, vec![clause("Term", RiskLevel::High)]),
                result(RiskLevel::Low, vec![clause("Insurance", RiskLevel::Low)]),
            ],
            &limits,
        );
        assert!(merged.clauses.is_empty());
        assert_eq!(merged.error.as_deref(), Some(MERGE_FAILURE_MESSAGE));
    }
}
