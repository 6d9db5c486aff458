// Contract Analysis Orchestrator
// language detection -> chunking -> sequential model calls -> merge -> bounding

use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::bounding::{bound_result, fit_for_transport, BoundLimits};
use super::error::PipelineError;
use super::merge::{merge_results, MergeLimits};
use super::prompt::{build_analysis_prompt, parse_model_response};
use crate::models::{AnalysisReport, AnalysisResult, ContractLanguage, RiskLevel};
use crate::services::config_store::PipelineConfig;
use crate::services::language::detect_language_with;
use crate::services::providers::LanguageModel;
use crate::services::text_processor::{chunk_spans, estimate_tokens, needs_chunking};

/// How a text will be sent to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPlan {
    pub language: ContractLanguage,
    /// Byte ranges into the source text, in document order.
    pub spans: Vec<(usize, usize)>,
}

impl ChunkPlan {
    pub fn chunk_count(&self) -> usize {
        self.spans.len()
    }
}

/// One finished analysis plus what the boundary needs to report it.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub request_id: String,
    pub language: ContractLanguage,
    pub chunk_count: usize,
    pub elapsed_ms: u128,
    pub result: AnalysisResult,
}

impl AnalysisOutcome {
    pub fn into_report(self, file_name: impl Into<String>) -> AnalysisReport {
        AnalysisReport {
            request_id: self.request_id,
            file_name: file_name.into(),
            language: self.language,
            chunk_count: self.chunk_count,
            elapsed_ms: self.elapsed_ms,
            result: self.result,
        }
    }
}

pub struct ContractAnalyzer<M: LanguageModel> {
    model: M,
    config: PipelineConfig,
}

impl<M: LanguageModel> ContractAnalyzer<M> {
    pub fn new(model: M, config: PipelineConfig) -> Self {
        Self { model, config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Detect the language and decide the chunk boundaries. Pure.
    pub fn plan(&self, text: &str) -> ChunkPlan {
        let language = detect_language_with(text, &self.config.language);

        let spans = if text.trim().is_empty() {
            Vec::new()
        } else if needs_chunking(text, self.config.chunk_threshold_tokens) {
            chunk_spans(text, self.config.chunk_size_tokens, self.config.overlap_tokens)
        } else {
            vec![(0, text.len())]
        };

        ChunkPlan { language, spans }
    }

    /// Analyze a contract and return only the client-facing result.
    pub async fn analyze(&self, text: &str) -> AnalysisResult {
        self.analyze_detailed(text).await.result
    }

    /// Analyze a contract under the configured wall-clock budget.
    ///
    /// Never fails: every pipeline error is logged and turned into an
    /// error-flagged result carrying a fixed, user-safe message.
    pub async fn analyze_detailed(&self, text: &str) -> AnalysisOutcome {
        let request_id = Uuid::new_v4().to_string();
        let started = Instant::now();
        let plan = self.plan(text);

        info!(
            "[PIPELINE] request_id={} start chars={} est_tokens={} language={} chunks={}",
            request_id,
            text.chars().count(),
            estimate_tokens(text),
            plan.language.as_str(),
            plan.chunk_count()
        );

        let budget = Duration::from_secs(self.config.timeout_secs);
        let outcome = match timeout(budget, self.execute(text, &plan, &request_id)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(PipelineError::Timeout(self.config.timeout_secs)),
        };

        let result = match outcome {
            Ok(result) => result,
            Err(e) => {
                match &e {
                    PipelineError::MissingCredential | PipelineError::EmptyText => {
                        warn!("[PIPELINE] request_id={} not analyzed: {}", request_id, e)
                    }
                    _ => error!("[PIPELINE] request_id={} failed: {}", request_id, e),
                }
                e.into_result()
            }
        };
        let result = fit_for_transport(result, self.config.max_response_bytes);

        let elapsed_ms = started.elapsed().as_millis();
        info!(
            "[PIPELINE] request_id={} done overall_risk={} clauses={} error={} elapsed_ms={}",
            request_id,
            result.overall_risk,
            result.clauses.len(),
            result.is_error(),
            elapsed_ms
        );

        AnalysisOutcome {
            request_id,
            language: plan.language,
            chunk_count: plan.chunk_count(),
            elapsed_ms,
            result,
        }
    }

    async fn execute(&self, text: &str, plan: &ChunkPlan, request_id: &str) -> Result<AnalysisResult, PipelineError> {
        if !self.model.is_configured() {
            return Err(PipelineError::MissingCredential);
        }
        if plan.spans.is_empty() {
            return Err(PipelineError::EmptyText);
        }

        let total = plan.chunk_count();
        let mut results = Vec::with_capacity(total);

        // One call at a time, in document order; the merge tie-break relies on it.
        for (idx, &(start, end)) in plan.spans.iter().enumerate() {
            let chunk = &text[start..end];
            let result = self
                .analyze_chunk(chunk, idx, total, plan.language, request_id)
                .await?;
            results.push(result);
        }

        let mut combined = if results.len() == 1 {
            results.remove(0)
        } else {
            merge_results(results, &MergeLimits::from(&self.config))
        };
        // Only Low, Medium and High leave the pipeline as an overall risk.
        if combined.overall_risk == RiskLevel::Unknown {
            combined.overall_risk = RiskLevel::Low;
        }

        Ok(bound_result(combined, &BoundLimits::from(&self.config)))
    }

    async fn analyze_chunk(
        &self,
        chunk: &str,
        idx: usize,
        total: usize,
        language: ContractLanguage,
        request_id: &str,
    ) -> Result<AnalysisResult, PipelineError> {
        debug!(
            "[PIPELINE] request_id={} chunk={}/{} chars={}",
            request_id,
            idx + 1,
            total,
            chunk.chars().count()
        );

        let prompt = build_analysis_prompt(chunk, language, self.config.vocabulary.for_language(language));
        let reply = self
            .model
            .complete(&prompt)
            .await
            .map_err(|source| PipelineError::Model { chunk: idx, source })?;

        let result = parse_model_response(&reply.content)
            .map_err(|reason| PipelineError::InvalidModelResponse { chunk: idx, reason })?;

        info!(
            "[PIPELINE] request_id={} chunk={}/{} clauses={} overall_risk={} latency_ms={}",
            request_id,
            idx + 1,
            total,
            result.clauses.len(),
            result.overall_risk,
            reply.latency_ms
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::analysis::error::{EMPTY_TEXT_MESSAGE, GENERIC_FAILURE_MESSAGE, TIMEOUT_MESSAGE};
    use crate::services::analysis::bounding::TRUNCATION_MARKER;
    use crate::services::providers::{ChatResult, ProviderError};
    use crate::services::text_processor::chunk_text;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    type Responder = Box<dyn Fn(usize, &str) -> Result<String, ProviderError> + Send + Sync>;

    struct ScriptedModel {
        configured: bool,
        responder: Responder,
        prompts: Mutex<Vec<String>>,
        delay: Option<Duration>,
    }

    impl ScriptedModel {
        fn new(responder: impl Fn(usize, &str) -> Result<String, ProviderError> + Send + Sync + 'static) -> Self {
            Self {
                configured: true,
                responder: Box::new(responder),
                prompts: Mutex::new(Vec::new()),
                delay: None,
            }
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        fn is_configured(&self) -> bool {
            self.configured
        }

        async fn complete(&self, prompt: &str) -> Result<ChatResult, ProviderError> {
            let idx = {
                let mut prompts = self.prompts.lock().unwrap();
                prompts.push(prompt.to_string());
                prompts.len() - 1
            };
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let content = (self.responder)(idx, prompt)?;
            Ok(ChatResult { content, latency_ms: 1 })
        }
    }

    fn reply(overall: &str, clauses: &[(&str, &str)]) -> String {
        let clauses: Vec<_> = clauses
            .iter()
            .map(|(name, risk)| {
                json!({
                    "name": name,
                    "risk_level": risk,
                    "summary": format!("{} summary", name),
                    "original_text": format!("{} text", name),
                    "suggested_redline": format!("{} redline", name),
                })
            })
            .collect();
        json!({ "overall_risk": overall, "clauses": clauses }).to_string()
    }

    fn small_chunk_config() -> PipelineConfig {
        PipelineConfig {
            chunk_size_tokens: 25,
            overlap_tokens: 0,
            chunk_threshold_tokens: 25,
            ..PipelineConfig::default()
        }
    }

    fn multi_chunk_text() -> String {
        "The supplier shall deliver the goods on time. ".repeat(8)
    }

    #[tokio::test]
    async fn test_missing_credential_makes_no_calls() {
        let mut model = ScriptedModel::new(|_, _| Ok(reply("Low", &[])));
        model.configured = false;
        let analyzer = ContractAnalyzer::new(model, PipelineConfig::default());

        let result = analyzer.analyze("This Agreement is governed by the laws of India.").await;
        assert_eq!(result, AnalysisResult::failed("OpenAI API key not configured"));
        assert!(analyzer.model().prompts().is_empty());
    }

    #[tokio::test]
    async fn test_empty_text_makes_no_calls() {
        let analyzer = ContractAnalyzer::new(
            ScriptedModel::new(|_, _| Ok(reply("Low", &[]))),
            PipelineConfig::default(),
        );
        let outcome = analyzer.analyze_detailed("  \n\t ").await;
        assert_eq!(outcome.result.error.as_deref(), Some(EMPTY_TEXT_MESSAGE));
        assert_eq!(outcome.chunk_count, 0);
        assert!(analyzer.model().prompts().is_empty());
    }

    #[tokio::test]
    async fn test_short_contract_single_call() {
        let analyzer = ContractAnalyzer::new(
            ScriptedModel::new(|_, _| Ok(reply("Medium", &[("Term", "Low"), ("Indemnity", "High")]))),
            PipelineConfig::default(),
        );
        let text = "This Agreement shall remain in force for two years.";
        let outcome = analyzer.analyze_detailed(text).await;

        let prompts = analyzer.model().prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].ends_with(text));
        assert_eq!(outcome.chunk_count, 1);
        assert_eq!(outcome.language, ContractLanguage::English);
        assert_eq!(outcome.result.overall_risk, RiskLevel::Medium);
        assert_eq!(outcome.result.clauses.len(), 2);
        assert!(!outcome.result.is_error());
        assert!(Uuid::parse_str(&outcome.request_id).is_ok());
    }

    #[tokio::test]
    async fn test_chunks_sent_in_document_order() {
        let text = multi_chunk_text();
        let expected = chunk_text(&text, 25, 0);
        assert!(expected.len() > 1);

        let analyzer = ContractAnalyzer::new(
            ScriptedModel::new(|_, _| Ok(reply("Low", &[]))),
            small_chunk_config(),
        );
        let outcome = analyzer.analyze_detailed(&text).await;

        let prompts = analyzer.model().prompts();
        assert_eq!(prompts.len(), expected.len());
        assert_eq!(outcome.chunk_count, expected.len());
        for (prompt, chunk) in prompts.iter().zip(&expected) {
            assert!(prompt.ends_with(chunk.as_str()));
        }
    }

    #[tokio::test]
    async fn test_higher_risk_in_later_chunk_wins() {
        let analyzer = ContractAnalyzer::new(
            ScriptedModel::new(|idx, _| {
                Ok(match idx {
                    1 => reply("High", &[("Term", "High")]),
                    _ => reply("Low", &[("Term", "Low"), ("Insurance", "Low")]),
                })
            }),
            small_chunk_config(),
        );
        let result = analyzer.analyze(&multi_chunk_text()).await;

        assert_eq!(result.overall_risk, RiskLevel::High);
        assert_eq!(result.clauses.len(), 2);
        assert_eq!(result.clauses[0].name, "Term");
        assert_eq!(result.clauses[0].risk_level, RiskLevel::High);
    }

    #[tokio::test]
    async fn test_invalid_reply_aborts_remaining_chunks() {
        let analyzer = ContractAnalyzer::new(
            ScriptedModel::new(|idx, _| {
                Ok(match idx {
                    1 => "I could not find any clauses.".to_string(),
                    _ => reply("Low", &[("Term", "Low")]),
                })
            }),
            small_chunk_config(),
        );
        let result = analyzer.analyze(&multi_chunk_text()).await;

        assert_eq!(analyzer.model().prompts().len(), 2);
        assert_eq!(result.error.as_deref(), Some(GENERIC_FAILURE_MESSAGE));
        assert!(result.clauses.is_empty());
    }

    #[tokio::test]
    async fn test_transport_error_is_not_echoed() {
        let analyzer = ContractAnalyzer::new(
            ScriptedModel::new(|_, _| {
                Err(ProviderError::ApiError {
                    status: 500,
                    message: "RangeError: Invalid array length".to_string(),
                })
            }),
            PipelineConfig::default(),
        );
        let result = analyzer.analyze("The tenant shall pay rent monthly.").await;

        assert_eq!(result.error.as_deref(), Some(GENERIC_FAILURE_MESSAGE));
        assert!(!serde_json::to_string(&result).unwrap().contains("RangeError"));
    }

    #[tokio::test]
    async fn test_hindi_contract_gets_hindi_vocabulary() {
        let analyzer = ContractAnalyzer::new(
            ScriptedModel::new(|_, _| Ok(reply("Low", &[("अवधि", "Low")]))),
            PipelineConfig::default(),
        );
        let outcome = analyzer.analyze_detailed("यह अनुबंध दो वर्ष की अवधि के लिए मान्य रहेगा।").await;

        assert_eq!(outcome.language, ContractLanguage::Hindi);
        let prompts = analyzer.model().prompts();
        assert!(prompts[0].contains("1. अवधि"));
        assert_eq!(outcome.result.clauses[0].name, "अवधि");
    }

    #[tokio::test]
    async fn test_long_contract_end_to_end_is_bounded() {
        let text = "The supplier shall deliver the goods on time. ".repeat(3500);
        assert!(estimate_tokens(&text) >= 40_000);

        let long_field = "w".repeat(12_000);
        let analyzer = ContractAnalyzer::new(
            ScriptedModel::new(move |idx, _| {
                let clauses: Vec<_> = (0..30)
                    .map(|i| {
                        let risk = if i % 7 == 0 { "High" } else { "Medium" };
                        json!({
                            "name": format!("Clause {}-{}", idx, i),
                            "risk_level": risk,
                            "summary": long_field,
                            "original_text": long_field,
                            "suggested_redline": long_field,
                        })
                    })
                    .collect();
                Ok(json!({ "overall_risk": "Medium", "clauses": clauses }).to_string())
            }),
            PipelineConfig::default(),
        );
        let outcome = analyzer.analyze_detailed(&text).await;
        let result = outcome.result;

        assert!(outcome.chunk_count > 1);
        assert_eq!(analyzer.model().prompts().len(), outcome.chunk_count);
        assert!(!result.is_error());
        assert_eq!(result.overall_risk, RiskLevel::Medium);
        assert_eq!(result.clauses.len(), 100);
        assert_eq!(result.clauses[0].name, "Clause 0-0");

        let max_chars = 10_000 + TRUNCATION_MARKER.len();
        for clause in &result.clauses {
            assert!(clause.summary.chars().count() <= max_chars);
            assert!(clause.original_text.chars().count() <= max_chars);
            assert!(clause.suggested_redline.chars().count() <= max_chars);
        }
    }

    #[tokio::test]
    async fn test_unrecognized_overall_risk_reported_as_low() {
        let analyzer = ContractAnalyzer::new(
            ScriptedModel::new(|_, _| Ok(reply("Critical", &[("Term", "High")]))),
            PipelineConfig::default(),
        );
        let result = analyzer.analyze("The term of this Agreement is five years.").await;

        assert!(!result.is_error());
        assert_eq!(result.overall_risk, RiskLevel::Low);
        assert_eq!(serde_json::to_value(&result).unwrap()["overall_risk"], "Low");
        assert_eq!(result.clauses[0].risk_level, RiskLevel::High);
    }

    #[tokio::test]
    async fn test_empty_overall_risk_fails_analysis() {
        let analyzer = ContractAnalyzer::new(
            ScriptedModel::new(|_, _| Ok(reply("", &[("Term", "Low")]))),
            PipelineConfig::default(),
        );
        let result = analyzer.analyze("The term of this Agreement is five years.").await;

        assert_eq!(result.error.as_deref(), Some(GENERIC_FAILURE_MESSAGE));
        assert!(result.clauses.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_overall_timeout() {
        let mut model = ScriptedModel::new(|_, _| Ok(reply("Low", &[])));
        model.delay = Some(Duration::from_secs(600));
        let config = PipelineConfig {
            timeout_secs: 1,
            ..PipelineConfig::default()
        };
        let analyzer = ContractAnalyzer::new(model, config);

        let result = analyzer.analyze("The licensee shall not sublicense.").await;
        assert_eq!(result.error.as_deref(), Some(TIMEOUT_MESSAGE));
        assert!(result.clauses.is_empty());
    }
}
