// Configuration Storage Service
// Handles config file read/write and version backup

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::SegmentationMode;
use crate::services::comparison::{ConfigurationError, Thresholds};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default)]
    pub version: String,
    pub default_provider: Option<String>,
    pub proxy: Option<ProxyConfig>,
    #[serde(default)]
    pub comparison: ComparisonConfig,
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
    /// Proxy URL to use, if the proxy is enabled.
    pub fn active_url(&self) -> Option<&str> {
        if !self.enabled {
            return None;
        }
        self.https.as_deref().or(self.http.as_deref())
    }
}

/// Which model the oracle asks for a given paragraph pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ModelSelectionPolicy {
    /// Use the provider's default model.
    #[default]
    ProviderDefault,
    Fixed { model: String },
    /// Longer pairs go to a heavier model.
    ByLength {
        threshold_chars: usize,
        short_model: String,
        long_model: String,
    },
}

impl ModelSelectionPolicy {
    pub fn select<'a>(&'a self, provider_default: &'a str, source: &str, target: &str) -> &'a str {
        match self {
            ModelSelectionPolicy::ProviderDefault => provider_default,
            ModelSelectionPolicy::Fixed { model } => model,
            ModelSelectionPolicy::ByLength {
                threshold_chars,
                short_model,
                long_model,
            } => {
                let chars = source.chars().count().max(target.chars().count());
                if chars >= *threshold_chars {
                    long_model
                } else {
                    short_model
                }
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonConfig {
    #[serde(default = "default_high_threshold")]
    pub high_threshold: f64,
    #[serde(default = "default_low_threshold")]
    pub low_threshold: f64,
    #[serde(default)]
    pub model_selection: ModelSelectionPolicy,
    #[serde(default = "default_oracle_timeout")]
    pub oracle_timeout_secs: u64,
    #[serde(default = "default_oracle_attempts")]
    pub oracle_max_attempts: usize,
    #[serde(default = "default_domain_hints")]
    pub domain_hints: Option<String>,
    #[serde(default)]
    pub segmentation: SegmentationMode,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            high_threshold: default_high_threshold(),
            low_threshold: default_low_threshold(),
            model_selection: ModelSelectionPolicy::default(),
            oracle_timeout_secs: default_oracle_timeout(),
            oracle_max_attempts: default_oracle_attempts(),
            domain_hints: default_domain_hints(),
            segmentation: SegmentationMode::default(),
        }
    }
}

impl ComparisonConfig {
    pub fn thresholds(&self) -> Result<Thresholds, ConfigurationError> {
        Thresholds::new(self.high_threshold, self.low_threshold)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    pub enabled: bool,
    pub model: Option<String>,
    pub base_url: Option<String>,
}

fn default_high_threshold() -> f64 { 0.98 }
fn default_low_threshold() -> f64 { 0.5 }
fn default_oracle_timeout() -> u64 { 60 }
fn default_oracle_attempts() -> usize { 3 }
fn default_domain_hints() -> Option<String> {
    Some("French off-plan property sale (VEFA): reservation contract vs. final notarial deed".to_string())
}

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
        dirs::config_dir().map(|p| p.join("contractmatch"))
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
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

        // Create backup if file exists
        if self.config_file.exists() {
            self.create_backup()?;
        }

        let content = serde_json::to_string_pretty(config)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        fs::write(&self.config_file, content)
            .map_err(|e| format!("Failed to write config: {}", e))
    }

    /// Create a backup of current config
    fn create_backup(&self) -> Result<(), String> {
        let backup_dir = self.config_dir.join("backups");
        fs::create_dir_all(&backup_dir)
            .map_err(|e| format!("Failed to create backup dir: {}", e))?;

        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S%3f");
        let backup_file = backup_dir.join(format!("config_{}.json", timestamp));

        fs::copy(&self.config_file, &backup_file)
            .map_err(|e| format!("Failed to create backup: {}", e))?;

        // Keep only last 10 backups
        self.cleanup_old_backups(&backup_dir, 10)?;

        Ok(())
    }

    /// Remove old backups, keeping only the most recent N
    fn cleanup_old_backups(&self, backup_dir: &Path, keep: usize) -> Result<(), String> {
        let mut entries: Vec<_> = fs::read_dir(backup_dir)
            .map_err(|e| format!("Failed to read backup dir: {}", e))?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map_or(false, |ext| ext == "json"))
            .collect();

        if entries.len() <= keep {
            return Ok(());
        }

        // Oldest first; names carry the timestamp so they sort chronologically
        entries.sort_by_key(|e| e.file_name());

        for entry in entries.iter().take(entries.len() - keep) {
            let _ = fs::remove_file(entry.path());
        }

        Ok(())
    }

    /// Get provider API key from config file
    pub fn get_api_key(&self, provider: &str) -> Result<Option<String>, String> {
        let config = self.load()?;
        Ok(config.api_keys.get(provider).cloned())
    }

    /// Store provider API key in config file
    pub fn set_api_key(&self, provider: &str, key: &str) -> Result<(), String> {
        let mut config = self.load()?;
        config.api_keys.insert(provider.to_string(), key.to_string());
        self.save(&config)
    }

    /// Delete provider API key from config file
    pub fn delete_api_key(&self, provider: &str) -> Result<(), String> {
        let mut config = self.load()?;
        config.api_keys.remove(provider);
        self.save(&config)
    }

    /// Set provider base URL in config file
    pub fn set_provider_url(&self, provider: &str, url: &str) -> Result<(), String> {
        let mut config = self.load()?;
        let provider_config = config.providers.entry(provider.to_string()).or_default();
        provider_config.base_url = Some(url.to_string());
        self.save(&config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.comparison.high_threshold, 0.98);
        assert_eq!(config.comparison.low_threshold, 0.5);
        assert_eq!(config.comparison.model_selection, ModelSelectionPolicy::ProviderDefault);
        assert!(config.comparison.thresholds().is_ok());
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let json = r#"{"comparison": {"lowThreshold": 0.4}}"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.comparison.low_threshold, 0.4);
        assert_eq!(config.comparison.high_threshold, 0.98);
        assert_eq!(config.comparison.oracle_max_attempts, 3);
    }

    #[test]
    fn test_model_selection_policy_serialization() {
        let json = r#"{"kind": "byLength", "thresholdChars": 300, "shortModel": "flash", "longModel": "pro"}"#;
        let policy: ModelSelectionPolicy = serde_json::from_str(json).unwrap();
        let short = "a".repeat(20);
        let long = "b".repeat(400);
        assert_eq!(policy.select("default", &short, &short), "flash");
        assert_eq!(policy.select("default", &short, &long), "pro");

        let fixed = ModelSelectionPolicy::Fixed { model: "m".to_string() };
        assert_eq!(fixed.select("default", "", ""), "m");
        assert_eq!(ModelSelectionPolicy::ProviderDefault.select("default", "", ""), "default");
    }

    #[test]
    fn test_proxy_active_url() {
        let proxy = ProxyConfig {
            enabled: true,
            http: Some("http://proxy:8080".to_string()),
            https: None,
        };
        assert_eq!(proxy.active_url(), Some("http://proxy:8080"));
        let disabled = ProxyConfig { enabled: false, ..proxy };
        assert_eq!(disabled.active_url(), None);
    }

    #[test]
    fn test_store_roundtrip_and_backups() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().to_path_buf());
        assert!(store.get_api_key("gemini").unwrap().is_none());

        store.set_api_key("gemini", "k-1").unwrap();
        assert_eq!(store.get_api_key("gemini").unwrap().as_deref(), Some("k-1"));

        store.set_provider_url("gemini", "http://localhost:9999").unwrap();
        let config = store.load().unwrap();
        assert_eq!(
            config.providers["gemini"].base_url.as_deref(),
            Some("http://localhost:9999")
        );

        store.delete_api_key("gemini").unwrap();
        assert!(store.get_api_key("gemini").unwrap().is_none());
        assert!(dir.path().join("backups").is_dir());
    }

    #[test]
    fn test_backup_retention() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().to_path_buf());
        for i in 0..14 {
            store.set_api_key("gemini", &format!("k-{}", i)).unwrap();
            std::thread::sleep(std::time::Duration::from_millis(2));
        }
        let backups = std::fs::read_dir(dir.path().join("backups")).unwrap().count();
        assert_eq!(backups, 10);
        assert_eq!(store.get_api_key("gemini").unwrap().as_deref(), Some("k-13"));
    }

    #[test]
    fn test_load_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.json"), "{ not json").unwrap();
        let store = ConfigStore::new(dir.path().to_path_buf());
        assert!(store.load().unwrap_err().contains("Failed to parse config"));
    }
}
