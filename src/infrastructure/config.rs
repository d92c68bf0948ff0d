//! Configuration infrastructure
//!
//! Loads and persists the application configuration as JSON. The canonical
//! product table, the per-marketplace selector profiles and the datasheet
//! rule tables all live here: site and layout drift is patched in
//! configuration without redeploying extraction logic.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::info;

use crate::domain::product::humanize_key;
use crate::infrastructure::selectors::MarketplaceProfiles;
use crate::infrastructure::spec_rules::DatasheetRuleSets;

/// Complete application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub http: HttpClientConfig,
    pub scraping: ScrapingConfig,
    pub sync: SyncScheduleConfig,
    pub llm: LlmConfig,
    pub logging: LoggingConfig,
    /// Canonical product table: one entry per SKU, in sync order. Immutable
    /// once defined; keys map one-to-one to datasheet URLs.
    pub catalog: Vec<CanonicalEntry>,
    pub datasheet_rules: DatasheetRuleSets,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            http: HttpClientConfig::default(),
            scraping: ScrapingConfig::default(),
            sync: SyncScheduleConfig::default(),
            llm: LlmConfig::default(),
            logging: LoggingConfig::default(),
            catalog: default_catalog(),
            datasheet_rules: DatasheetRuleSets::default(),
        }
    }
}

impl AppConfig {
    /// Default config file location under the platform config directory.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lapcat")
            .join("config.json")
    }

    /// Load the configuration file, creating it with defaults on first run.
    pub async fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = fs::read_to_string(path)
                .await
                .with_context(|| format!("failed to read config file: {}", path.display()))?;
            let config: Self = serde_json::from_str(&content)
                .with_context(|| format!("failed to parse config file: {}", path.display()))?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save(path).await?;
            info!(path = %path.display(), "created default configuration file");
            Ok(config)
        }
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create config dir: {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(self).context("failed to serialize config")?;
        fs::write(path, content)
            .await
            .with_context(|| format!("failed to write config file: {}", path.display()))?;
        Ok(())
    }
}

/// One canonical product: the stable key is the SKU and dedup identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalEntry {
    pub key: String,
    pub datasheet_url: String,
    /// Marketplace search query override; defaults to the humanized key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_query: Option<String>,
}

impl CanonicalEntry {
    pub fn new(key: &str, datasheet_url: &str) -> Self {
        Self {
            key: key.to_string(),
            datasheet_url: datasheet_url.to_string(),
            search_query: None,
        }
    }

    /// The query sent to the marketplace search entry point.
    pub fn model_query(&self) -> String {
        self.search_query
            .clone()
            .unwrap_or_else(|| humanize_key(&self.key))
    }
}

/// The shipped canonical catalog: Lenovo PSREF and HP datasheet endpoints.
fn default_catalog() -> Vec<CanonicalEntry> {
    vec![
        CanonicalEntry::new(
            "lenovo_thinkpad_e14_intel",
            "https://psref.lenovo.com/syspool/Sys/PDF/ThinkPad/ThinkPad_E14_Gen_5_Intel/ThinkPad_E14_Gen_5_Intel_Spec.PDF",
        ),
        CanonicalEntry::new(
            "lenovo_thinkpad_e14_amd",
            "https://psref.lenovo.com/syspool/Sys/PDF/ThinkPad/ThinkPad_E14_Gen_5_AMD/ThinkPad_E14_Gen_5_AMD_Spec.pdf",
        ),
        CanonicalEntry::new(
            "hp_probook_450_g10",
            "https://h20195.www2.hp.com/v2/GetPDF.aspx/c08504822.pdf",
        ),
        CanonicalEntry::new(
            "hp_probook_440_g11",
            "https://h20195.www2.hp.com/v2/getpdf.aspx/c08947328.pdf",
        ),
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("./data"))
            .join("lapcat");
        Self {
            url: format!("sqlite:{}", data_dir.join("catalog.db").display()),
        }
    }
}

/// HTTP client settings shared by the datasheet fetcher and scrape sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpClientConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    /// Datasheet downloads get a tighter bound; the URLs are static CDN
    /// endpoints and a slow response means an outage.
    pub datasheet_timeout_seconds: u64,
    pub max_requests_per_second: u32,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            user_agent: "lapcat/0.2 (catalog sync)".to_string(),
            timeout_seconds: 30,
            datasheet_timeout_seconds: 10,
            max_requests_per_second: 2,
        }
    }
}

/// Timing for the locate/extract scrape protocol plus the per-marketplace
/// selector profiles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapingConfig {
    pub locate_timeout_seconds: u64,
    pub locate_poll_ms: u64,
    pub settle_delay_ms: u64,
    pub profiles: MarketplaceProfiles,
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        Self {
            locate_timeout_seconds: 20,
            locate_poll_ms: 1500,
            settle_delay_ms: 3000,
            profiles: MarketplaceProfiles::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncScheduleConfig {
    /// Interval between lightweight refresh firings.
    pub interval_hours: u64,
    /// Compute embeddings for newly inserted records.
    pub embed_on_insert: bool,
    /// Run the price/availability drift report after lightweight firings.
    pub drift_report: bool,
}

impl Default for SyncScheduleConfig {
    fn default() -> Self {
        Self {
            interval_hours: 12,
            embed_on_insert: true,
            drift_report: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub enabled: bool,
    pub base_url: String,
    /// Name of the environment variable holding the API key. Secrets stay
    /// out of the config file.
    pub api_key_env: String,
    pub embedding_model: String,
    pub summary_model: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            summary_model: "gpt-4.1-nano".to_string(),
            timeout_seconds: 30,
            max_retries: 3,
        }
    }
}

/// Logging configuration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,
    pub console_output: bool,
    pub file_output: bool,
    pub json_format: bool,
    /// Log directory; defaults to `logs/` next to the executable.
    pub log_dir: Option<PathBuf>,
    /// Module-specific log level filters (e.g. "sqlx": "warn").
    pub module_filters: HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let mut module_filters = HashMap::new();
        module_filters.insert("sqlx".to_string(), "warn".to_string());
        module_filters.insert("reqwest".to_string(), "info".to_string());
        module_filters.insert("html5ever".to_string(), "error".to_string());
        Self {
            level: "info".to_string(),
            console_output: true,
            file_output: false,
            json_format: false,
            log_dir: None,
            module_filters,
        }
    }
}
