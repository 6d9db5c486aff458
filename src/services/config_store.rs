// Configuration Storage Service
// Handles config file read/write, version backup and pipeline settings

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use super::language::{ClauseVocabulary, LanguageThresholds};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default)]
    pub version: String,
    pub proxy: Option<ProxyConfig>,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    #[serde(default)]
    pub api_keys: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProxyConfig {
    pub enabled: bool,
    pub http: Option<String>,
    pub https: Option<String>,
}

impl ProxyConfig {
    /// Proxy URL to use for outbound model calls, if any.
    pub fn active_url(&self) -> Option<&str> {
        if !self.enabled {
            return None;
        }
        self.https
            .as_deref()
            .or(self.http.as_deref())
            .filter(|u| !u.trim().is_empty())
    }
}

/// Everything the analysis pipeline needs, passed to it explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size_tokens: usize,
    #[serde(default = "default_overlap")]
    pub overlap_tokens: usize,
    /// Documents estimated above this many tokens are chunked.
    #[serde(default = "default_chunk_threshold")]
    pub chunk_threshold_tokens: usize,
    /// Partial results considered by the merge; extra ones are ignored.
    #[serde(default = "default_max_merge_results")]
    pub max_merge_results: usize,
    /// Distinct clause names kept by the merge.
    #[serde(default = "default_max_merged_clauses")]
    pub max_merged_clauses: usize,
    /// Clauses kept by the bounding pass.
    #[serde(default = "default_max_clauses")]
    pub max_clauses: usize,
    /// Character limit per clause text field.
    #[serde(default = "default_max_field_length")]
    pub max_field_length: usize,
    /// Text the merge may accumulate before it gives up.
    #[serde(default = "default_max_merge_bytes")]
    pub max_merge_bytes: usize,
    /// Serialized size above which the bounding pass gives up.
    #[serde(default = "default_max_result_bytes")]
    pub max_result_bytes: usize,
    /// Hard ceiling on the serialized result handed to the caller.
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,
    /// Wall-clock budget for one whole analysis.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default)]
    pub language: LanguageThresholds,
    #[serde(default)]
    pub vocabulary: ClauseVocabulary,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size_tokens: default_chunk_size(),
            overlap_tokens: default_overlap(),
            chunk_threshold_tokens: default_chunk_threshold(),
            max_merge_results: default_max_merge_results(),
            max_merged_clauses: default_max_merged_clauses(),
            max_clauses: default_max_clauses(),
            max_field_length: default_max_field_length(),
            max_merge_bytes: default_max_merge_bytes(),
            max_result_bytes: default_max_result_bytes(),
            max_response_bytes: default_max_response_bytes(),
            timeout_secs: default_timeout_secs(),
            model: default_model(),
            temperature: default_temperature(),
            language: LanguageThresholds::default(),
            vocabulary: ClauseVocabulary::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    pub enabled: bool,
    pub model: Option<String>,
    pub base_url: Option<String>,
}

fn default_chunk_size() -> usize { 3000 }
fn default_overlap() -> usize { 200 }
fn default_chunk_threshold() -> usize { 8000 }
fn default_max_merge_results() -> usize { 100 }
fn default_max_merged_clauses() -> usize { 200 }
fn default_max_clauses() -> usize { 100 }
fn default_max_field_length() -> usize { 10_000 }
fn default_max_merge_bytes() -> usize { 64 * 1024 * 1024 }
fn default_max_result_bytes() -> usize { 32 * 1024 * 1024 }
fn default_max_response_bytes() -> usize { 10 * 1024 * 1024 }
fn default_timeout_secs() -> u64 { 300 }
fn default_model() -> String { "gpt-3.5-turbo".to_string() }
fn default_temperature() -> f64 { 0.3 }

pub struct ConfigStore {
    config_dir: PathBuf,
    config_file: PathBuf,
}

impl ConfigStore {
    pub fn new(config_dir: PathBuf) -> Self {
        let config_file = config_dir.join("config.json");
        Self { config_dir, config_file }
    }

    /// Get default config directory
    pub fn default_config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("redline"))
    }

    /// Ensure config directory exists
    pub fn ensure_dir(&self) -> Result<(), String> {
        fs::create_dir_all(&self.config_dir)
            .map_err(|e| format!("Failed to create config dir: {}", e))
    }

    /// Load configuration from file
    pub fn load(&self) -> Result<AppConfig, String> {
        if !self.config_file.exists() {
            return Ok(AppConfig::default());
        }

        let content = fs::read_to_string(&self.config_file)
            .map_err(|e| format!("Failed to read config: {}", e))?;

        serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse config: {}", e))
    }

    /// Save configuration to file
    pub fn save(&self, config: &AppConfig) -> Result<(), String> {
        self.ensure_dir()?;

        if self.config_file.exists() {
            self.create_backup()?;
        }

        let content = serde_json::to_string_pretty(config)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        fs::write(&self.config_file, content)
            .map_err(|e| format!("Failed to write config: {}", e))
    }

    fn create_backup(&self) -> Result<(), String> {
        let backup_dir = self.config_dir.join("backups");
        fs::create_dir_all(&backup_dir)
            .map_err(|e| format!("Failed to create backup dir: {}", e))?;

        // Sub-second suffix keeps back-to-back saves from overwriting each other.
        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S_%6f");
        let backup_file = backup_dir.join(format!("config_{}.json", timestamp));

        fs::copy(&self.config_file, &backup_file)
            .map_err(|e| format!("Failed to create backup: {}", e))?;

        self.cleanup_old_backups(&backup_dir, 10)?;

        Ok(())
    }

    /// Remove old backups, keeping only the most recent N
    fn cleanup_old_backups(&self, backup_dir: &Path, keep: usize) -> Result<(), String> {
        let mut entries: Vec<_> = fs::read_dir(backup_dir)
            .map_err(|e| format!("Failed to read backup dir: {}", e))?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "json"))
            .collect();

        if entries.len() <= keep {
            return Ok(());
        }

        // Names embed the timestamp, so lexical order is age order.
        entries.sort_by_key(|e| e.file_name());

        for entry in entries.iter().take(entries.len() - keep) {
            let _ = fs::remove_file(entry.path());
        }

        Ok(())
    }

    pub fn get_api_key(&self, provider: &str) -> Result<Option<String>, String> {
        let config = self.load()?;
        Ok(config.api_keys.get(provider).cloned())
    }

    pub fn set_api_key(&self, provider: &str, key: &str) -> Result<(), String> {
        let mut config = self.load()?;
        config.api_keys.insert(provider.to_string(), key.to_string());
        self.save(&config)
    }

    pub fn delete_api_key(&self, provider: &str) -> Result<(), String> {
        let mut config = self.load()?;
        config.api_keys.remove(provider);
        self.save(&config)
    }

    pub fn get_provider_url(&self, provider: &str) -> Result<Option<String>, String> {
        let config = self.load()?;
        Ok(config.providers.get(provider).and_then(|p| p.base_url.clone()))
    }

    pub fn set_provider_url(&self, provider: &str, url: &str) -> Result<(), String> {
        let mut config = self.load()?;
        let provider_config = config.providers.entry(provider.to_string()).or_default();
        provider_config.base_url = Some(url.to_string());
        self.save(&config)
    }
}

/// Load the application config from the default location, falling back to
/// defaults when the file is missing or unreadable.
pub fn load_app_config() -> AppConfig {
    let Some(dir) = ConfigStore::default_config_dir() else {
        return AppConfig::default();
    };
    match ConfigStore::new(dir).load() {
        Ok(config) => config,
        Err(e) => {
            warn!("[CONFIG] {}; using defaults", e);
            AppConfig::default()
        }
    }
}
