use crate::storage::{self, StorageManager};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

const CONFIG_FILE: &str = "config.yaml";

const DEFAULT_MIN_SIMILARITY: f64 = 0.5;
const DEFAULT_MIN_SERENDIPITY_SCORE: f64 = 0.3;
const DEFAULT_MAX_RESULTS: usize = 10;
/// Source notes sampled by the vault-wide search; bounds the O(n^2) scan.
const DEFAULT_SAMPLE_SIZE: usize = 100;

const DEFAULT_MAX_PAIRS_TO_EVALUATE: usize = 20;
const DEFAULT_MIN_QUALITY_SCORE: f64 = 0.5;
const DEFAULT_SAMPLES_PER_DOMAIN: usize = 3;
const DEFAULT_EXCERPT_CHARS: usize = 800;

/// Default embedding model (bge-base offers +13% accuracy vs MiniLM)
const DEFAULT_SEMANTIC_MODEL: &str = "bge-base-en-v1.5";
/// Default model download timeout in seconds
const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 300;

const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";
const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";
const DEFAULT_LLM_TIMEOUT_SECS: u64 = 60;

const DEFAULT_CACHE_TTL_MINUTES: u64 = 24 * 60;

/// How notes are assigned their primary domain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassificationMethod {
    #[default]
    Tag,
    Folder,
    Cluster,
}

/// Settings for similarity-first discovery.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f64,

    #[serde(default = "default_min_serendipity_score")]
    pub min_serendipity_score: f64,

    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Only consider notes under these folders. Empty = whole vault.
    #[serde(default)]
    pub include_folders: Vec<String>,

    #[serde(default)]
    pub exclude_folders: Vec<String>,

    #[serde(default)]
    pub classification_method: ClassificationMethod,

    /// Tag prefixes that mark a domain tag, e.g. "domain/" in "domain/biology"
    #[serde(default = "default_domain_tag_prefixes")]
    pub domain_tag_prefixes: Vec<String>,

    /// Overused words that lower a note's score (matched against title and tags)
    #[serde(default = "default_generic_terms")]
    pub generic_terms: Vec<String>,

    #[serde(default = "default_sample_size")]
    pub sample_size: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            min_similarity: DEFAULT_MIN_SIMILARITY,
            min_serendipity_score: DEFAULT_MIN_SERENDIPITY_SCORE,
            max_results: DEFAULT_MAX_RESULTS,
            include_folders: vec![],
            exclude_folders: vec![],
            classification_method: ClassificationMethod::default(),
            domain_tag_prefixes: default_domain_tag_prefixes(),
            generic_terms: default_generic_terms(),
            sample_size: DEFAULT_SAMPLE_SIZE,
        }
    }
}

impl DiscoveryConfig {
    /// Whether a note path passes the include/exclude folder filters.
    pub fn path_allowed(&self, path: &str) -> bool {
        let in_folder = |folder: &String| {
            let folder = folder.trim_matches('/');
            !folder.is_empty()
                && (path == folder || path.starts_with(&format!("{folder}/")))
        };

        if !self.include_folders.is_empty() && !self.include_folders.iter().any(in_folder) {
            return false;
        }

        !self.exclude_folders.iter().any(in_folder)
    }
}

/// Settings for LLM-first discovery.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeepConfig {
    /// Evaluator call budget per run
    #[serde(default = "default_max_pairs_to_evaluate")]
    pub max_pairs_to_evaluate: usize,

    #[serde(default = "default_min_quality_score")]
    pub min_quality_score: f64,

    #[serde(default = "default_samples_per_domain")]
    pub samples_per_domain: usize,

    /// Characters of note body included in each prompt
    #[serde(default = "default_excerpt_chars")]
    pub excerpt_chars: usize,
}

impl Default for DeepConfig {
    fn default() -> Self {
        Self {
            max_pairs_to_evaluate: DEFAULT_MAX_PAIRS_TO_EVALUATE,
            min_quality_score: DEFAULT_MIN_QUALITY_SCORE,
            samples_per_domain: DEFAULT_SAMPLES_PER_DOMAIN,
            excerpt_chars: DEFAULT_EXCERPT_CHARS,
        }
    }
}

/// Configuration for embedding generation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SemanticConfig {
    /// Model name for embeddings (e.g., "all-MiniLM-L6-v2")
    #[serde(default = "default_semantic_model")]
    pub model: String,

    /// Timeout for model download in seconds
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_SEMANTIC_MODEL.to_string(),
            download_timeout_secs: DEFAULT_DOWNLOAD_TIMEOUT_SECS,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    OpenAi,
    Ollama,
}

/// Chat model used to judge and explain connections
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProvider,

    /// Overrides the provider's default endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            base_url: None,
            model: DEFAULT_LLM_MODEL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            timeout_secs: DEFAULT_LLM_TIMEOUT_SECS,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_cache_ttl_minutes")]
    pub ttl_minutes: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_minutes: DEFAULT_CACHE_TTL_MINUTES,
        }
    }
}

fn default_min_similarity() -> f64 {
    DEFAULT_MIN_SIMILARITY
}

fn default_min_serendipity_score() -> f64 {
    DEFAULT_MIN_SERENDIPITY_SCORE
}

fn default_max_results() -> usize {
    DEFAULT_MAX_RESULTS
}

fn default_domain_tag_prefixes() -> Vec<String> {
    vec!["domain/".to_string()]
}

fn default_generic_terms() -> Vec<String> {
    ["note", "idea", "summary", "todo", "misc", "draft"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_sample_size() -> usize {
    DEFAULT_SAMPLE_SIZE
}

fn default_max_pairs_to_evaluate() -> usize {
    DEFAULT_MAX_PAIRS_TO_EVALUATE
}

fn default_min_quality_score() -> f64 {
    DEFAULT_MIN_QUALITY_SCORE
}

fn default_samples_per_domain() -> usize {
    DEFAULT_SAMPLES_PER_DOMAIN
}

fn default_excerpt_chars() -> usize {
    DEFAULT_EXCERPT_CHARS
}

fn default_semantic_model() -> String {
    DEFAULT_SEMANTIC_MODEL.to_string()
}

fn default_download_timeout_secs() -> u64 {
    DEFAULT_DOWNLOAD_TIMEOUT_SECS
}

fn default_llm_model() -> String {
    DEFAULT_LLM_MODEL.to_string()
}

fn default_api_key_env() -> String {
    DEFAULT_API_KEY_ENV.to_string()
}

fn default_llm_timeout_secs() -> u64 {
    DEFAULT_LLM_TIMEOUT_SECS
}

fn default_temperature() -> f32 {
    0.3
}

fn default_max_tokens() -> usize {
    400
}

fn default_cache_ttl_minutes() -> u64 {
    DEFAULT_CACHE_TTL_MINUTES
}

fn default_true() -> bool {
    true
}

fn default_vault_path() -> String {
    ".".to_string()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_vault_path")]
    pub vault_path: String,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub deep: DeepConfig,
    #[serde(default)]
    pub semantic: SemanticConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vault_path: default_vault_path(),
            discovery: DiscoveryConfig::default(),
            deep: DeepConfig::default(),
            semantic: SemanticConfig::default(),
            llm: LlmConfig::default(),
            cache: CacheConfig::default(),
            base_path: String::new(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        let disc = &self.discovery;
        for (name, value) in [
            ("discovery.min_similarity", disc.min_similarity),
            ("discovery.min_serendipity_score", disc.min_serendipity_score),
            ("deep.min_quality_score", self.deep.min_quality_score),
        ] {
            if !(0.0..=1.0).contains(&value) {
                bail!("{name} must be between 0.0 and 1.0, got {value}");
            }
        }

        if disc.max_results == 0 {
            bail!("discovery.max_results must be greater than 0");
        }

        if disc.sample_size == 0 {
            bail!("discovery.sample_size must be greater than 0");
        }

        if disc.classification_method == ClassificationMethod::Tag
            && disc.domain_tag_prefixes.iter().all(|p| p.trim().is_empty())
        {
            bail!("discovery.domain_tag_prefixes must not be empty when classifying by tag");
        }

        if self.deep.samples_per_domain == 0 {
            bail!("deep.samples_per_domain must be greater than 0");
        }

        if self.semantic.download_timeout_secs == 0 {
            bail!("semantic.download_timeout_secs must be greater than 0");
        }

        if self.llm.timeout_secs == 0 {
            bail!("llm.timeout_secs must be greater than 0");
        }

        Ok(())
    }

    pub fn load_with(base_path: &str) -> anyhow::Result<Self> {
        let store = storage::BackendLocal::new(base_path)?;

        // create new if does not exist
        if !store.exists(CONFIG_FILE) {
            store.write(CONFIG_FILE, serde_yml::to_string(&Self::default())?.as_bytes())?;
        }

        let config_str = String::from_utf8(store.read(CONFIG_FILE)?)
            .context("config file is not valid utf8")?;
        let mut config: Self = serde_yml::from_str(&config_str).context("config is malformed")?;

        config.base_path = base_path.to_string();

        config.validate()?;

        // resave in case config version needs an upgrade
        if config_str != serde_yml::to_string(&config)? {
            config.save()?;
        }

        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let store = storage::BackendLocal::new(&self.base_path)?;

        let config_str = serde_yml::to_string(&self)?;
        store.write(CONFIG_FILE, config_str.as_bytes())?;
        Ok(())
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }
}
