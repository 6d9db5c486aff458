use super::{AnalysisResult, Clause, RiskLevel};

fn clause(name: &str, risk_level: RiskLevel, summary: &str, original_text: &str, suggested_redline: &str) -> Clause {
    Clause {
        name: name.to_string(),
        risk_level,
        summary: summary.to_string(),
        original_text: original_text.to_string(),
        suggested_redline: suggested_redline.to_string(),
    }
}

/// Demonstration analysis of a mutual NDA, used by `analyze_contract --sample`.
pub fn sample_nda_analysis() -> AnalysisResult {
    AnalysisResult::new(
        RiskLevel::Medium,
        vec![
            clause(
                "Confidentiality",
                RiskLevel::High,
                "Confidentiality lasts in perpetuity and survives even when the information becomes public, creating open-ended liability.",
                "The Receiving Party agrees to maintain the confidentiality of all Confidential Information disclosed by the Disclosing Party in perpetuity, and shall not disclose such information to any third party without prior written consent, regardless of whether such information becomes publicly available through no fault of the Receiving Party.",
                "The Receiving Party agrees to maintain the confidentiality of all Confidential Information disclosed by the Disclosing Party for a period of [X] years from the date of disclosure, or until such information becomes publicly available through no fault of the Receiving Party, whichever occurs first.",
            ),
            clause(
                "Term",
                RiskLevel::Low,
                "A two year term from the effective date is reasonable for an NDA.",
                "This Agreement shall remain in effect for a period of two (2) years from the Effective Date, unless terminated earlier in accordance with the provisions herein.",
                "[No changes needed - term is reasonable]",
            ),
            clause(
                "Termination",
                RiskLevel::Medium,
                "Either party may terminate on 30 days notice, but nothing says confidentiality obligations survive termination.",
                "Either party may terminate this Agreement at any time by providing thirty (30) days written notice to the other party.",
                "Either party may terminate this Agreement at any time by providing thirty (30) days written notice to the other party. Upon termination, all Confidential Information shall be returned or destroyed, and the confidentiality obligations set forth herein shall survive termination.",
            ),
            clause(
                "Indemnity",
                RiskLevel::High,
                "Indemnity runs one way only, against the receiving party.",
                "The Receiving Party shall indemnify, defend, and hold harmless the Disclosing Party from and against any and all claims arising out of or relating to any breach of this Agreement by the Receiving Party.",
                "Each party shall indemnify, defend, and hold harmless the other party from and against any and all claims arising out of any breach of this Agreement by such indemnifying party, except to the extent caused by the indemnified party's gross negligence or willful misconduct.",
            ),
            clause(
                "Governing Law",
                RiskLevel::Low,
                "California law governs, which is reasonable if both parties do business there.",
                "This Agreement shall be governed by and construed in accordance with the laws of the State of California, without regard to its conflict of law principles.",
                "[No changes needed if both parties are in California]",
            ),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_has_unique_clause_names() {
        let sample = sample_nda_analysis();
        let mut names: Vec<&str> = sample.clauses.iter().map(|c| c.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), sample.clauses.len());
        assert!(sample.error.is_none());
    }
}
