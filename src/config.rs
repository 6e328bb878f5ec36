//! TOML configuration.
//!
//! Every section except `[index]` has defaults, so the smallest usable
//! config file is:
//!
//! ```toml
//! [index]
//! path = "./data/rules_index.sqlite"
//! ```
//!
//! Credentials are never stored in the file. The `[llm]` and `[pricing]`
//! sections name the environment variables that hold them.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub index: IndexConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
        }
    }
}

fn default_max_chars() -> usize {
    1500
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Character budget for the rules block handed to the judge prompt.
    #[serde(default = "default_rules_char_budget")]
    pub rules_char_budget: usize,
    /// Queries with fewer whitespace tokens than this are augmented with
    /// the previous user turn before embedding.
    #[serde(default = "default_short_query_tokens")]
    pub short_query_tokens: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            rules_char_budget: default_rules_char_budget(),
            short_query_tokens: default_short_query_tokens(),
        }
    }
}

fn default_top_k() -> usize {
    10
}
fn default_rules_char_budget() -> usize {
    12_000
}
fn default_short_query_tokens() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }

    /// Same provider settings, pinned to `model`. Used so queries are
    /// embedded with the model recorded in the index.
    pub fn with_model(&self, model: &str) -> EmbeddingConfig {
        let mut cfg = self.clone();
        if cfg.model.as_deref() != Some(model) {
            cfg.model = Some(model.to_string());
            cfg.dims = None;
        }
        cfg
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    /// OpenAI-compatible API root (the `/chat/completions` path is appended).
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_fast_model")]
    pub fast_model: String,
    #[serde(default = "default_deep_model")]
    pub deep_model: String,
    /// Model used for intent classification, card extraction and search
    /// translation. Falls back to `deep_model`.
    #[serde(default)]
    pub classifier_model: Option<String>,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_llm_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            api_key_env: default_llm_api_key_env(),
            fast_model: default_fast_model(),
            deep_model: default_deep_model(),
            classifier_model: None,
            timeout_secs: default_llm_timeout_secs(),
            max_retries: default_llm_max_retries(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
        }
    }
}

impl LlmConfig {
    pub fn classifier_model(&self) -> &str {
        self.classifier_model.as_deref().unwrap_or(&self.deep_model)
    }
}

fn default_llm_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}
fn default_llm_api_key_env() -> String {
    "GROQ_API_KEY".to_string()
}
fn default_fast_model() -> String {
    "llama-3.1-8b-instant".to_string()
}
fn default_deep_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}
fn default_llm_timeout_secs() -> u64 {
    30
}
fn default_llm_max_retries() -> u32 {
    2
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_output_tokens() -> u32 {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct CatalogConfig {
    #[serde(default = "default_catalog_base_url")]
    pub base_url: String,
    #[serde(default = "default_max_printings")]
    pub max_printings: usize,
    #[serde(default = "default_max_rulings")]
    pub max_rulings: usize,
    #[serde(default = "default_catalog_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: default_catalog_base_url(),
            max_printings: default_max_printings(),
            max_rulings: default_max_rulings(),
            timeout_secs: default_catalog_timeout_secs(),
        }
    }
}

fn default_catalog_base_url() -> String {
    "https://api.scryfall.com".to_string()
}
fn default_max_printings() -> usize {
    25
}
fn default_max_rulings() -> usize {
    8
}
fn default_catalog_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct PricingConfig {
    #[serde(default = "default_cardtrader_base_url")]
    pub cardtrader_base_url: String,
    #[serde(default = "default_cardtrader_token_env")]
    pub cardtrader_token_env: String,
    /// How many printings the versions menu asks the secondary source about.
    #[serde(default = "default_secondary_sample")]
    pub secondary_sample: usize,
    /// Absolute percent difference above which an arbitrage gap is rated `High`.
    #[serde(default = "default_spread_alert_pct")]
    pub spread_alert_pct: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            cardtrader_base_url: default_cardtrader_base_url(),
            cardtrader_token_env: default_cardtrader_token_env(),
            secondary_sample: default_secondary_sample(),
            spread_alert_pct: default_spread_alert_pct(),
        }
    }
}

fn default_cardtrader_base_url() -> String {
    "https://api.cardtrader.com/api/v2".to_string()
}
fn default_cardtrader_token_env() -> String {
    "CARDTRADER_TOKEN".to_string()
}
fn default_secondary_sample() -> usize {
    3
}
fn default_spread_alert_pct() -> f64 {
    15.0
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.max_chars == 0 {
        anyhow::bail!("chunking.max_chars must be > 0");
    }

    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if config.retrieval.rules_char_budget == 0 {
        anyhow::bail!("retrieval.rules_char_budget must be > 0");
    }

    if !(1..=30).contains(&config.catalog.max_printings) {
        anyhow::bail!("catalog.max_printings must be in [1, 30]");
    }

    if !(0.0..=2.0).contains(&config.llm.temperature) {
        anyhow::bail!("llm.temperature must be in [0.0, 2.0]");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" | "local" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, or local.",
            other
        ),
    }

    if matches!(config.embedding.provider.as_str(), "openai" | "ollama")
        && config.embedding.model.is_none()
    {
        anyhow::bail!(
            "embedding.model must be specified when provider is '{}'",
            config.embedding.provider
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_src: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_src)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let cfg = parse("[index]\npath = \"data/index.sqlite\"\n").unwrap();
        assert_eq!(cfg.retrieval.top_k, 10);
        assert_eq!(cfg.retrieval.rules_char_budget, 12_000);
        assert_eq!(cfg.chunking.max_chars, 1500);
        assert_eq!(cfg.catalog.max_printings, 25);
        assert_eq!(cfg.llm.fast_model, "llama-3.1-8b-instant");
        assert_eq!(cfg.llm.classifier_model(), "llama-3.3-70b-versatile");
        assert!(!cfg.embedding.is_enabled());
    }

    #[test]
    fn test_missing_index_section_fails() {
        assert!(parse("[retrieval]\ntop_k = 3\n").is_err());
    }

    #[test]
    fn test_zero_top_k_rejected() {
        let err = parse("[index]\npath = \"x\"\n[retrieval]\ntop_k = 0\n").unwrap_err();
        assert!(err.to_string().contains("top_k"));
    }

    #[test]
    fn test_printing_cap_bounded() {
        let err = parse("[index]\npath = \"x\"\n[catalog]\nmax_printings = 100\n").unwrap_err();
        assert!(err.to_string().contains("max_printings"));
    }

    #[test]
    fn test_unknown_embedding_provider_rejected() {
        let err = parse("[index]\npath = \"x\"\n[embedding]\nprovider = \"magic\"\n").unwrap_err();
        assert!(err.to_string().contains("Unknown embedding provider"));
    }

    #[test]
    fn test_remote_provider_requires_model() {
        assert!(parse("[index]\npath = \"x\"\n[embedding]\nprovider = \"openai\"\n").is_err());
        assert!(parse("[index]\npath = \"x\"\n[embedding]\nprovider = \"local\"\n").is_ok());
    }

    #[test]
    fn test_classifier_model_override() {
        let cfg = parse("[index]\npath = \"x\"\n[llm]\nclassifier_model = \"tiny\"\n").unwrap();
        assert_eq!(cfg.llm.classifier_model(), "tiny");
    }

    #[test]
    fn test_example_config_parses() {
        let cfg = parse(include_str!("../config/judge.example.toml")).unwrap();
        assert_eq!(cfg.embedding.provider, "local");
        assert_eq!(cfg.server.bind, "127.0.0.1:8000");
    }
}
