use anyhow::{bail, Context};
use redline_lib::init_logging;
use redline_lib::models::{AnalysisReport, AnalysisResult, ContractLanguage};
use redline_lib::models::sample_nda_analysis;
use redline_lib::services::config_store::{load_app_config, ConfigStore};
use redline_lib::services::extraction::extract_text;
use redline_lib::services::providers::{LanguageModel, OpenAiModel, OPENAI_PROVIDER};
use redline_lib::services::text_processor::estimate_tokens;
use redline_lib::services::ContractAnalyzer;

const USAGE: &str = "Usage:\n  analyze_contract <contract.pdf|contract.docx> [--mime <type>] [--out <json_path>] [--chunk-size <tokens>] [--threshold <tokens>]\n  analyze_contract --sample [--out <json_path>]\n  analyze_contract [--set-key <api_key>] [--delete-key] [--set-url <base_url>] [--show-config]\n\nNotes:\n  - The API key is read from OPENAI_API_KEY, REDLINE_OPENAI_API_KEY or the config file.\n  - OPENAI_API_URL overrides the chat completions endpoint.";

fn preview(s: &str, max_chars: usize) -> String {
    let mut out: String = s.chars().take(max_chars).collect();
    if s.chars().count() > max_chars {
        out.push_str("...");
    }
    out.replace('\n', " ")
}

fn parse_arg_value(args: &[String], key: &str) -> Option<String> {
    args.iter()
        .position(|a| a == key)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn has_flag(args: &[String], key: &str) -> bool {
    args.iter().any(|a| a == key)
}

fn print_result(result: &AnalysisResult) {
    println!("Overall risk: {}", result.overall_risk);
    if let Some(err) = &result.error {
        println!("Error: {}", err);
        return;
    }
    println!("Clauses: {}", result.clauses.len());
    for (i, c) in result.clauses.iter().enumerate() {
        println!("[C{:03}] {:<7} {}  {}", i, c.risk_level.as_str(), c.name, preview(&c.summary, 100));
    }
}

fn mask_key(key: &str) -> String {
    let tail: String = key.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
    format!("****{}", tail)
}

/// Apply the config flags to `store`. Returns the lines to print, or `None`
/// when no config flag was given.
fn run_config_command(store: &ConfigStore, args: &[String]) -> Result<Option<Vec<String>>, String> {
    let set_key = parse_arg_value(args, "--set-key");
    let set_url = parse_arg_value(args, "--set-url");
    let delete_key = has_flag(args, "--delete-key");
    let show = has_flag(args, "--show-config");

    if set_key.is_none() && set_url.is_none() && !delete_key && !show {
        return Ok(None);
    }

    let mut lines = Vec::new();
    if let Some(key) = set_key {
        let key = key.trim();
        if key.is_empty() {
            return Err("--set-key needs a non-empty key".to_string());
        }
        store.set_api_key(OPENAI_PROVIDER, key)?;
        lines.push("Stored OpenAI API key".to_string());
    }
    if delete_key {
        store.delete_api_key(OPENAI_PROVIDER)?;
        lines.push("Deleted OpenAI API key".to_string());
    }
    if let Some(url) = set_url {
        store.set_provider_url(OPENAI_PROVIDER, url.trim())?;
        lines.push(format!("Stored OpenAI base URL: {}", url.trim()));
    }

    let key = store.get_api_key(OPENAI_PROVIDER)?;
    let url = store.get_provider_url(OPENAI_PROVIDER)?;
    lines.push(format!(
        "API key: {}",
        key.as_deref().map(mask_key).unwrap_or_else(|| "(not set)".to_string())
    ));
    lines.push(format!("Base URL: {}", url.unwrap_or_else(|| "(default)".to_string())));
    Ok(Some(lines))
}

fn write_json(out_path: &str, report: &AnalysisReport) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(out_path, json).with_context(|| format!("write out failed: {}", out_path))?;
    println!();
    println!("Wrote JSON: {}", out_path);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let out_path = parse_arg_value(&args, "--out");

    if has_flag(&args, "--sample") {
        let report = AnalysisReport {
            request_id: "sample".to_string(),
            file_name: "sample-nda".to_string(),
            language: ContractLanguage::English,
            chunk_count: 1,
            elapsed_ms: 0,
            result: sample_nda_analysis(),
        };
        print_result(&report.result);
        if let Some(out_path) = out_path {
            write_json(&out_path, &report)?;
        }
        return Ok(());
    }

    if let Some(dir) = ConfigStore::default_config_dir() {
        let store = ConfigStore::new(dir);
        if let Some(lines) = run_config_command(&store, &args).map_err(anyhow::Error::msg)? {
            for line in lines {
                println!("{}", line);
            }
            return Ok(());
        }
    }

    if args.len() < 2 || args[1].starts_with("--") {
        eprintln!("{}", USAGE);
        return Ok(());
    }

    init_logging();

    let path = args[1].clone();
    let mime = parse_arg_value(&args, "--mime");

    let mut config = load_app_config();
    if let Some(n) = parse_arg_value(&args, "--chunk-size").and_then(|s| s.parse().ok()) {
        config.pipeline.chunk_size_tokens = n;
    }
    if let Some(n) = parse_arg_value(&args, "--threshold").and_then(|s| s.parse().ok()) {
        config.pipeline.chunk_threshold_tokens = n;
    }

    let bytes = std::fs::read(&path).with_context(|| format!("read file failed: {}", path))?;
    let file_name = std::path::Path::new(&path)
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.clone());

    let text = match extract_text(&file_name, mime.as_deref(), bytes).await {
        Ok(text) => text,
        Err(e) => bail!("{}", e.user_message()),
    };

    let model = OpenAiModel::from_config(&config);
    println!("File: {}", path);
    println!("Extracted: {} chars (~{} tokens)", text.chars().count(), estimate_tokens(&text));
    println!("Model: {}{}", model.model(), if model.is_configured() { "" } else { " (no API key)" });

    let analyzer = ContractAnalyzer::new(model, config.pipeline);
    let outcome = analyzer.analyze_detailed(&text).await;

    println!("Language: {}", outcome.language.as_str());
    println!("Chunks: {}", outcome.chunk_count);
    println!("Elapsed: {} ms", outcome.elapsed_ms);
    println!();

    let report = outcome.into_report(file_name);
    print_result(&report.result);

    if let Some(out_path) = out_path {
        write_json(&out_path, &report)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("analyze_contract")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_config_flags_update_store() {
        let dir = std::env::temp_dir().join(format!("redline-cli-{}", uuid::Uuid::new_v4()));
        let store = ConfigStore::new(dir.clone());

        assert!(run_config_command(&store, &args(&["contract.pdf"])).unwrap().is_none());

        let lines = run_config_command(
            &store,
            &args(&["--set-key", "sk-test-1234", "--set-url", "http://localhost:9999"]),
        )
        .unwrap()
        .unwrap();
        assert!(lines.contains(&"API key: ****1234".to_string()));
        assert!(lines.contains(&"Base URL: http://localhost:9999".to_string()));
        assert_eq!(store.get_api_key(OPENAI_PROVIDER).unwrap().as_deref(), Some("sk-test-1234"));

        let lines = run_config_command(&store, &args(&["--delete-key"])).unwrap().unwrap();
        assert!(lines.contains(&"API key: (not set)".to_string()));
        assert!(dir.join("backups").exists());

        assert!(run_config_command(&store, &args(&["--set-key", "  "])).is_err());

        let _ = std::fs::remove_dir_all(dir);
    }
}
