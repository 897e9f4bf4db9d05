use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::embeddings::EmbeddingProvider;
use crate::FusionRagError;

/// Prefix for environment overrides, e.g. `FUSIONRAG__FUSION__K=30`
pub const ENV_PREFIX: &str = "FUSIONRAG";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub backtrace: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            backtrace: false,
        }
    }
}

/// Supported text-generation backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    OpenAI,
    Doubao,
    Qwen,
    Ernie,
    Zhipu,
}

impl LlmProvider {
    pub const ALL: [Self; 5] = [
        Self::OpenAI,
        Self::Doubao,
        Self::Qwen,
        Self::Ernie,
        Self::Zhipu,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAI => "openai",
            Self::Doubao => "doubao",
            Self::Qwen => "qwen",
            Self::Ernie => "ernie",
            Self::Zhipu => "zhipu",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            Self::OpenAI => "gpt-3.5-turbo",
            Self::Doubao => "doubao-1-5-lite-32k-250115",
            Self::Qwen => "qwen-turbo",
            Self::Ernie => "ernie-bot-turbo",
            Self::Zhipu => "glm-4",
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            Self::OpenAI => "https://api.openai.com/v1",
            Self::Doubao => "https://ark.cn-beijing.volces.com/api/v3",
            Self::Qwen => "https://dashscope.aliyuncs.com/compatible-mode/v1",
            Self::Ernie => "https://aip.baidubce.com/rpc/2.0/ai_custom/v1/wenxinworkshop/chat",
            Self::Zhipu => "https://open.bigmodel.cn/api/paas/v4",
        }
    }

    /// Environment variable holding the credential for this provider
    pub fn credential_env(self) -> &'static str {
        match self {
            Self::OpenAI => "OPENAI_API_KEY",
            Self::Doubao => "DOUBAO_API_KEY",
            Self::Qwen => "DASHSCOPE_API_KEY",
            Self::Ernie => "ERNIE_API_KEY",
            Self::Zhipu => "ZHIPU_API_KEY",
        }
    }

    /// Whether the provider speaks the OpenAI chat completions protocol
    pub fn is_openai_compatible(self) -> bool {
        !matches!(self, Self::Ernie)
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LlmProvider {
    type Err = FusionRagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == lowered)
            .ok_or_else(|| {
                FusionRagError::ConfigError(format!(
                    "Unsupported LLM provider: {s}. Supported providers: {}",
                    Self::ALL.map(Self::as_str).join(", ")
                ))
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: LlmProvider,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

const fn default_llm_provider() -> LlmProvider {
    LlmProvider::Doubao
}

const fn default_temperature() -> f32 {
    0.7
}

const fn default_max_tokens() -> u32 {
    1000
}

const fn default_llm_timeout_secs() -> u64 {
    60
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: None,
            api_key: None,
            base_url: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

/// LLM settings with provider defaults and credential filled in
#[derive(Debug, Clone)]
pub struct ResolvedLlmConfig {
    pub provider: LlmProvider,
    pub model: String,
    pub api_key: String,
    pub base_url: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl ResolvedLlmConfig {
    /// Credential with everything but the first and last four characters hidden
    pub fn masked_api_key(&self) -> String {
        mask_secret(&self.api_key)
    }
}

impl LlmConfig {
    /// Resolve against the process environment
    pub fn resolve(&self) -> crate::Result<ResolvedLlmConfig> {
        self.resolve_with(|name| std::env::var(name).ok())
    }

    /// Resolve using `lookup` for the provider's credential variable
    pub fn resolve_with<F>(&self, lookup: F) -> crate::Result<ResolvedLlmConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let provider = self.provider;
        let api_key = self
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| lookup(provider.credential_env()).filter(|k| !k.trim().is_empty()))
            .ok_or_else(|| {
                FusionRagError::ConfigError(format!(
                    "No API key for provider {provider}: set {} or llm.api_key",
                    provider.credential_env()
                ))
            })?;

        Ok(ResolvedLlmConfig {
            provider,
            model: self
                .model
                .clone()
                .unwrap_or_else(|| provider.default_model().to_string()),
            api_key,
            base_url: self
                .base_url
                .clone()
                .unwrap_or_else(|| provider.default_base_url().to_string()),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            timeout: Duration::from_secs(self.timeout_secs),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingsConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: EmbeddingProvider,
    #[serde(default = "default_embedding_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,
    #[serde(default)]
    pub api_key: Option<String>,
}

const fn default_embedding_provider() -> EmbeddingProvider {
    EmbeddingProvider::Ollama
}

fn default_embedding_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_embedding_model() -> String {
    "bge-large".to_string()
}

const fn default_embedding_dimension() -> usize {
    1024
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            endpoint: default_embedding_endpoint(),
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    #[serde(default = "default_vector_store_url")]
    pub url: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_vector_store_url() -> String {
    "http://localhost:6333".to_string()
}

fn default_collection() -> String {
    "rag_documents".to_string()
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            url: default_vector_store_url(),
            collection: default_collection(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankerConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_reranker_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_reranker_model")]
    pub model: String,
    #[serde(default = "default_rerank_top_k")]
    pub top_k: usize,
}

fn default_reranker_endpoint() -> String {
    "http://localhost:8081".to_string()
}

fn default_reranker_model() -> String {
    "BAAI/bge-reranker-base".to_string()
}

const fn default_rerank_top_k() -> usize {
    3
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_reranker_endpoint(),
            model: default_reranker_model(),
            top_k: default_rerank_top_k(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionConfig {
    #[serde(default = "default_rrf_k")]
    pub k: f64,
    #[serde(default = "default_num_queries")]
    pub num_queries: usize,
    #[serde(default = "default_top_k_per_query")]
    pub top_k_per_query: usize,
    #[serde(default = "default_final_top_k")]
    pub final_top_k: usize,
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
}

const fn default_rrf_k() -> f64 {
    crate::rag::fusion::DEFAULT_RRF_K
}

const fn default_num_queries() -> usize {
    3
}

const fn default_top_k_per_query() -> usize {
    8
}

const fn default_final_top_k() -> usize {
    8
}

const fn default_call_timeout_secs() -> u64 {
    30
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            k: default_rrf_k(),
            num_queries: default_num_queries(),
            top_k_per_query: default_top_k_per_query(),
            final_top_k: default_final_top_k(),
            call_timeout_secs: default_call_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    #[serde(default = "default_max_context_length")]
    pub max_context_length: usize,
    #[serde(default = "default_fallback_prefix")]
    pub fallback_prefix: usize,
    #[serde(default = "default_annotate_scores")]
    pub annotate_scores: bool,
}

const fn default_max_context_length() -> usize {
    8000
}

const fn default_fallback_prefix() -> usize {
    5
}

const fn default_annotate_scores() -> bool {
    true
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_context_length: default_max_context_length(),
            fallback_prefix: default_fallback_prefix(),
            annotate_scores: default_annotate_scores(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embeddings: EmbeddingsConfig,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub reranker: RerankerConfig,
    #[serde(default)]
    pub fusion: FusionConfig,
    #[serde(default)]
    pub context: ContextConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file, with `FUSIONRAG__*` environment overrides
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(FusionRagError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Config file not found: {}", path.display()),
            )));
        }

        let settings = config::Config::builder()
            .add_source(config::File::from(path).format(config::FileFormat::Toml))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: AppConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML text, without environment overrides
    pub fn from_toml_str(content: &str) -> crate::Result<Self> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default config file path
    pub fn load() -> crate::Result<Self> {
        // Try to load from config.toml first, then fall back to config.example.toml
        if Path::new("config.toml").exists() {
            Self::from_file("config.toml")
        } else if Path::new("config.example.toml").exists() {
            tracing::warn!(
                "Using config.example.toml. Please create config.toml for production use."
            );
            Self::from_file("config.example.toml")
        } else {
            Err(FusionRagError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "No config file found. Please create config.toml or config.example.toml",
            )))
        }
    }

    /// Check value ranges and endpoint syntax
    pub fn validate(&self) -> crate::Result<()> {
        let fusion = &self.fusion;
        if !fusion.k.is_finite() || fusion.k <= 0.0 {
            return Err(FusionRagError::ConfigError(format!(
                "fusion.k must be a positive number, got {}",
                fusion.k
            )));
        }
        for (name, value) in [
            ("fusion.num_queries", fusion.num_queries),
            ("fusion.top_k_per_query", fusion.top_k_per_query),
            ("fusion.final_top_k", fusion.final_top_k),
            ("embeddings.dimension", self.embeddings.dimension),
        ] {
            if value == 0 {
                return Err(FusionRagError::ConfigError(format!(
                    "{name} must be greater than 0"
                )));
            }
        }
        if fusion.call_timeout_secs == 0 {
            return Err(FusionRagError::ConfigError(
                "fusion.call_timeout_secs must be greater than 0".to_string(),
            ));
        }

        check_url("vector_store.url", &self.vector_store.url)?;
        check_url("embeddings.endpoint", &self.embeddings.endpoint)?;
        if self.reranker.enabled {
            check_url("reranker.endpoint", &self.reranker.endpoint)?;
        }
        if let Some(base_url) = &self.llm.base_url {
            check_url("llm.base_url", base_url)?;
        }

        Ok(())
    }

    /// Get RRF smoothing constant
    pub fn fusion_k(&self) -> f64 {
        self.fusion.k
    }

    /// Get per-call timeout for external collaborators
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.fusion.call_timeout_secs)
    }

    /// Get embedding dimension
    pub fn embedding_dimension(&self) -> usize {
        self.embeddings.dimension
    }

    /// Get embedding model name
    pub fn embedding_model(&self) -> &str {
        &self.embeddings.model
    }

    /// Get vector store collection name
    pub fn collection(&self) -> &str {
        &self.vector_store.collection
    }

    /// Render the configuration as TOML with credentials masked
    pub fn to_masked_toml(&self) -> crate::Result<String> {
        let mut masked = self.clone();
        masked.llm.api_key = masked.llm.api_key.as_deref().map(mask_secret);
        masked.embeddings.api_key = masked.embeddings.api_key.as_deref().map(mask_secret);
        masked.vector_store.api_key = masked.vector_store.api_key.as_deref().map(mask_secret);
        toml::to_string_pretty(&masked)
            .map_err(|e| FusionRagError::ConfigError(format!("Failed to render config: {e}")))
    }
}

fn check_url(field: &str, value: &str) -> crate::Result<()> {
    url::Url::parse(value)
        .map(|_| ())
        .map_err(|e| FusionRagError::ConfigError(format!("{field} is not a valid URL ({value}): {e}")))
}

pub(crate) fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}
