// Redline Data Models
// Wire shapes shared by the pipeline, the CLI report and persisted JSON

use serde::{Deserialize, Deserializer, Serialize};

mod sample;

pub use sample::sample_nda_analysis;

// ============ Risk ============

/// Risk classification for a clause or a whole contract.
///
/// Model output is parsed leniently: casing and surrounding whitespace are
/// ignored and anything outside the three known labels becomes `Unknown`,
/// which ranks below `Low` when results are merged.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Default)]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
    Unknown,
}

impl RiskLevel {
    pub fn from_label(val: &str) -> Self {
        match val.trim().to_lowercase().as_str() {
            "low" => Self::Low,
            "medium" => Self::Medium,
            "high" => Self::High,
            _ => Self::Unknown,
        }
    }

    /// Merge ordering: Unknown(0) < Low(1) < Medium(2) < High(3).
    pub fn priority(self) -> u8 {
        match self {
            Self::High => 3,
            Self::Medium => 2,
            Self::Low => 1,
            Self::Unknown => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Unknown => "Unknown",
        }
    }
}

impl<'de> Deserialize<'de> for RiskLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw
            .map(|s| RiskLevel::from_label(&s))
            .unwrap_or(RiskLevel::Unknown))
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============ Clause & Result ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clause {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default = "unknown_risk")]
    pub risk_level: RiskLevel,
    #[serde(default, deserialize_with = "lenient_string")]
    pub summary: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub original_text: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub suggested_redline: String,
}

/// The unit of output for one contract.
///
/// When `error` is set the clause list is empty; use [`AnalysisResult::failed`]
/// to build error results so that holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub overall_risk: RiskLevel,
    #[serde(default)]
    pub clauses: Vec<Clause>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnalysisResult {
    pub fn new(overall_risk: RiskLevel, clauses: Vec<Clause>) -> Self {
        Self {
            overall_risk,
            clauses,
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::failed_with_risk(RiskLevel::Low, message)
    }

    pub fn failed_with_risk(overall_risk: RiskLevel, message: impl Into<String>) -> Self {
        Self {
            overall_risk,
            clauses: Vec::new(),
            error: Some(message.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

// ============ Language & Documents ============

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractLanguage {
    Hindi,
    English,
    Mixed,
}

impl ContractLanguage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hindi => "hindi",
            Self::English => "english",
            Self::Mixed => "mixed",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    Docx,
}

// ============ Report ============

/// Envelope written by the command-line driver around one analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub request_id: String,
    pub file_name: String,
    pub language: ContractLanguage,
    pub chunk_count: usize,
    pub elapsed_ms: u128,
    pub result: AnalysisResult,
}

// ============ Default Value Functions ============

fn unknown_risk() -> RiskLevel { RiskLevel::Unknown }

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_parsing_is_lenient() {
        assert_eq!(RiskLevel::from_label(" high "), RiskLevel::High);
        assert_eq!(RiskLevel::from_label("MEDIUM"), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_label("Critical"), RiskLevel::Unknown);

        let parsed: RiskLevel = serde_json::from_str("null").unwrap();
        assert_eq!(parsed, RiskLevel::Unknown);
    }

    #[test]
    fn test_risk_priority_ordering() {
        assert!(RiskLevel::High.priority() > RiskLevel::Medium.priority());
        assert!(RiskLevel::Medium.priority() > RiskLevel::Low.priority());
        assert!(RiskLevel::Low.priority() > RiskLevel::Unknown.priority());
    }

    #[test]
    fn test_clause_missing_fields_become_empty() {
        let clause: Clause =
            serde_json::from_str(r#"{"name": "Term", "summary": null}"#).unwrap();
        assert_eq!(clause.name, "Term");
        assert_eq!(clause.summary, "");
        assert_eq!(clause.original_text, "");
        assert_eq!(clause.risk_level, RiskLevel::Unknown);
    }

    #[test]
    fn test_failed_result_has_no_clauses() {
        let result = AnalysisResult::failed("OpenAI API key not configured");
        assert!(result.is_error());
        assert!(result.clauses.is_empty());
        assert_eq!(result.overall_risk, RiskLevel::Low);

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["overall_risk"], "Low");
        assert_eq!(json["error"], "OpenAI API key not configured");
    }

    #[test]
    fn test_ok_result_omits_error_field() {
        let json = serde_json::to_value(AnalysisResult::new(RiskLevel::High, vec![])).unwrap();
        assert!(json.get("error").is_none());
        assert_eq!(json["overall_risk"], "High");
    }
}
