use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::classify::CategoryRule;
use crate::extract::Strategy;
use crate::models::SourceId;

/// Default location probed when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "./config/harvest.toml";

/// Largest create-many call the remote store accepts.
pub const STORE_MAX_BATCH: usize = 10;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sources: default_sources(),
            fetch: FetchConfig::default(),
            extraction: ExtractionConfig::default(),
            classifier: ClassifierConfig::default(),
            store: StoreConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SourceConfig {
    pub owner: String,
    pub repo: String,
    /// Set for sources whose primary-language document is not the default file.
    #[serde(default)]
    pub primary_file: Option<String>,
}

impl SourceConfig {
    pub fn id(&self) -> SourceId {
        SourceId::new(&self.owner, &self.repo)
    }
}

fn default_sources() -> Vec<SourceConfig> {
    let source = |owner: &str, repo: &str, primary_file: Option<&str>| SourceConfig {
        owner: owner.to_string(),
        repo: repo.to_string(),
        primary_file: primary_file.map(str::to_string),
    };
    vec![
        source("JimmyLv", "awesome-nano-banana", None),
        source("ZeroLu", "awesome-nanobanana-pro", None),
        source("PicoTrex", "Awesome-Nano-Banana-images", Some("README_en.md")),
        source("Super-Maker-AI", "awesome-nano-banana", None),
        source("muset-ai", "awesome-nano-banana-pro", None),
    ]
}

#[derive(Debug, Deserialize, Clone)]
pub struct FetchConfig {
    #[serde(default = "default_raw_base_url")]
    pub raw_base_url: String,
    #[serde(default = "default_branches")]
    pub branches: Vec<String>,
    #[serde(default = "default_file")]
    pub default_file: String,
    #[serde(default = "default_fetch_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            raw_base_url: default_raw_base_url(),
            branches: default_branches(),
            default_file: default_file(),
            timeout_secs: default_fetch_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_raw_base_url() -> String {
    "https://raw.githubusercontent.com".to_string()
}
fn default_branches() -> Vec<String> {
    vec!["main".to_string(), "master".to_string()]
}
fn default_file() -> String {
    "README.md".to_string()
}
fn default_fetch_timeout_secs() -> u64 {
    20
}
fn default_user_agent() -> String {
    format!("prompt-harvest/{}", env!("CARGO_PKG_VERSION"))
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionConfig {
    #[serde(default = "default_strategies")]
    pub strategies: Vec<Strategy>,
    #[serde(default = "default_min_prompt_chars")]
    pub min_prompt_chars: usize,
    #[serde(default = "default_max_foreign_ratio")]
    pub max_foreign_ratio: f64,
    #[serde(default = "default_true")]
    pub require_image: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            strategies: default_strategies(),
            min_prompt_chars: default_min_prompt_chars(),
            max_foreign_ratio: default_max_foreign_ratio(),
            require_image: true,
        }
    }
}

fn default_strategies() -> Vec<Strategy> {
    vec![
        Strategy::StructuredSection,
        Strategy::DottedSection,
        Strategy::FallbackBlock,
    ]
}
fn default_min_prompt_chars() -> usize {
    30
}
fn default_max_foreign_ratio() -> f64 {
    0.05
}
fn default_true() -> bool {
    true
}

/// Optional overrides for the classifier tables; `None` keeps the built-in table.
#[derive(Debug, Deserialize, Clone)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub categories: Option<Vec<CategoryRule>>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub reference_phrases: Option<Vec<String>>,
    #[serde(default = "default_fallback_category")]
    pub fallback_category: String,
    #[serde(default = "default_max_tags")]
    pub max_tags: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            categories: None,
            tags: None,
            reference_phrases: None,
            fallback_category: default_fallback_category(),
            max_tags: default_max_tags(),
        }
    }
}

fn default_fallback_category() -> String {
    "General".to_string()
}
fn default_max_tags() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Airtable,
    Sqlite,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_backend")]
    pub backend: StoreBackend,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_table")]
    pub table: String,
    #[serde(default = "default_fingerprint_field")]
    pub fingerprint_field: String,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_store_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            api_url: default_api_url(),
            table: default_table(),
            fingerprint_field: default_fingerprint_field(),
            page_size: default_page_size(),
            batch_size: default_store_batch_size(),
            batch_delay_ms: default_batch_delay_ms(),
            db_path: default_db_path(),
        }
    }
}

fn default_backend() -> StoreBackend {
    StoreBackend::Airtable
}
fn default_api_url() -> String {
    "https://api.airtable.com/v0".to_string()
}
fn default_table() -> String {
    "NanoBanana".to_string()
}
fn default_fingerprint_field() -> String {
    "Fingerprint".to_string()
}
fn default_page_size() -> usize {
    100
}
fn default_store_batch_size() -> usize {
    STORE_MAX_BATCH
}
fn default_batch_delay_ms() -> u64 {
    200
}
fn default_db_path() -> PathBuf {
    PathBuf::from("./data/harvest.sqlite")
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            sample_size: default_sample_size(),
        }
    }
}

fn default_sample_size() -> usize {
    5
}

/// Resolve the configuration for a CLI invocation.
///
/// An explicit path must exist. Without one, [`DEFAULT_CONFIG_PATH`] is used
/// when present and the built-in defaults otherwise.
pub fn resolve_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(p) => load_config(p),
        None => {
            let default_path = Path::new(DEFAULT_CONFIG_PATH);
            if default_path.exists() {
                load_config(default_path)
            } else {
                let config = Config::default();
                validate(&config)?;
                Ok(config)
            }
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.sources.is_empty() {
        bail!("at least one [[sources]] entry is required");
    }
    for source in &config.sources {
        if source.owner.trim().is_empty() || source.repo.trim().is_empty() {
            bail!("sources entries need a non-empty owner and repo");
        }
    }

    // Validate fetch
    if config.fetch.branches.is_empty() {
        bail!("fetch.branches must list at least one branch");
    }
    if config.fetch.timeout_secs == 0 {
        bail!("fetch.timeout_secs must be > 0");
    }

    // Validate extraction
    if config.extraction.strategies.is_empty() {
        bail!("extraction.strategies must list at least one strategy");
    }
    if !(0.0..=1.0).contains(&config.extraction.max_foreign_ratio) {
        bail!("extraction.max_foreign_ratio must be in [0.0, 1.0]");
    }

    // Validate store
    if config.store.batch_size == 0 || config.store.batch_size > STORE_MAX_BATCH {
        bail!("store.batch_size must be in 1..={}", STORE_MAX_BATCH);
    }
    if config.store.page_size == 0 {
        bail!("store.page_size must be > 0");
    }

    Ok(())
}
