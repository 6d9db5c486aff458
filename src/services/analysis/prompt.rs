// Analysis prompt and reply protocol
// Builds the per-chunk instruction text and validates what the model sends back.

use serde_json::Value;

use crate::models::{AnalysisResult, ContractLanguage};

const PROMPT_HEADER: &str = "You are a legal contract risk analyzer. Analyze the following contract and extract these key clauses:";

const RISK_RUBRIC: &str = r#"For each clause found in the contract:
1. Assess the risk level as "Low", "Medium", or "High" based on:
   - Unfavorable terms to the client
   - Ambiguity or lack of clarity
   - Missing protections
   - Unusual or onerous conditions

2. Provide a plain-English summary explaining the risk and what the clause means

3. Extract the exact original text of the clause from the contract

4. Suggest an improved redline version that reduces risk or adds clarity

If a clause is not found, you may omit it from the results.

After analyzing all found clauses, determine an overall risk level for the entire contract:
- "Low": Contract is generally favorable with minimal concerns
- "Medium": Some concerning clauses but manageable with negotiation
- "High": Significant risks that require substantial changes"#;

const OUTPUT_TEMPLATE: &str = r#"Return your analysis as a JSON object in this EXACT format:
{
  "overall_risk": "Low" | "Medium" | "High",
  "clauses": [
    {
      "name": "Clause Name",
      "risk_level": "Low" | "Medium" | "High",
      "summary": "Plain-English explanation of the clause and its risks",
      "original_text": "Exact clause text from the contract",
      "suggested_redline": "Improved version of the clause text"
    }
  ]
}"#;

fn language_instruction(language: ContractLanguage) -> &'static str {
    match language {
        ContractLanguage::Hindi => "The contract is written in Hindi. Use the Hindi clause names exactly as listed above, write the summary and suggested redline in Hindi, and keep risk levels as the English words \"Low\", \"Medium\" or \"High\".",
        ContractLanguage::Mixed => "The contract mixes Hindi and English. Use the clause names exactly as listed above, quote original_text verbatim in its original script, and write the summary in English.",
        ContractLanguage::English => "The contract is written in English. Use the clause names exactly as listed above.",
    }
}

/// Full user prompt for one chunk. The chunk text always comes last.
pub fn build_analysis_prompt(chunk: &str, language: ContractLanguage, clause_names: &[String]) -> String {
    let numbered = clause_names
        .iter()
        .enumerate()
        .map(|(i, name)| format!("{}. {}", i + 1, name))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "{}\n\n{}\n\n{}\n\n{}\n\n{}\n\nContract text:\n{}",
        PROMPT_HEADER,
        numbered,
        RISK_RUBRIC,
        language_instruction(language),
        OUTPUT_TEMPLATE,
        chunk
    )
}

/// Slice from the first `{` to the last `}`, tolerating fences or chatter.
fn extract_json(content: &str) -> Option<&str> {
    let trimmed = content.trim();
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    (end > start).then(|| &trimmed[start..=end])
}

/// Parse and validate one model reply.
///
/// The reply must be a JSON object with a non-empty `overall_risk` and an
/// array `clauses`; anything else is a protocol violation described by the
/// returned reason.
pub fn parse_model_response(content: &str) -> Result<AnalysisResult, String> {
    let json_str = extract_json(content).ok_or_else(|| "no JSON object in response".to_string())?;
    let value: Value =
        serde_json::from_str(json_str).map_err(|e| format!("JSON parse error: {}", e))?;

    let obj = value
        .as_object()
        .ok_or_else(|| "response is not a JSON object".to_string())?;
    match obj.get("overall_risk") {
        None | Some(Value::Null) => return Err("missing overall_risk".to_string()),
        Some(Value::String(s)) if s.trim().is_empty() => return Err("empty overall_risk".to_string()),
        _ => {}
    }
    if !obj.get("clauses").is_some_and(Value::is_array) {
        return Err("clauses is not an array".to_string());
    }

    let mut result: AnalysisResult =
        serde_json::from_value(value).map_err(|e| format!("unexpected shape: {}", e))?;
    // An `error` key from the model is not ours to report.
    result.error = None;
    Ok(result)
}
