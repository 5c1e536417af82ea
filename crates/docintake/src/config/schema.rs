use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level intake configuration, loaded from JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,

    /// Ledger location. Falls back to `~/.docintake/data/docintake.db`.
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    #[serde(default)]
    pub limits: LimitsConfig,

    #[serde(default)]
    pub cascade: CascadeConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub providers: ProvidersConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            database_path: None,
            limits: LimitsConfig::default(),
            cascade: CascadeConfig::default(),
            cache: CacheConfig::default(),
            providers: ProvidersConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_max_upload_bytes() -> u64 {
    50 * 1024 * 1024
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CascadeConfig {
    /// Upper bound for a single provider call.
    #[serde(default = "default_provider_timeout_secs")]
    pub provider_timeout_secs: u64,

    /// Results below this confidence are flagged, not failed.
    #[serde(default = "default_low_confidence_threshold")]
    pub low_confidence_threshold: f32,

    /// Upper bound for a whole pipeline stage (the cascade, the summariser).
    #[serde(default = "default_stage_timeout_secs")]
    pub stage_timeout_secs: u64,

    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            provider_timeout_secs: default_provider_timeout_secs(),
            low_confidence_threshold: default_low_confidence_threshold(),
            stage_timeout_secs: default_stage_timeout_secs(),
            retry: RetryConfig::default(),
        }
    }
}

fn default_provider_timeout_secs() -> u64 {
    30
}

fn default_low_confidence_threshold() -> f32 {
    0.3
}

fn default_stage_timeout_secs() -> u64 {
    120
}

/// Retry policy for provider calls. One attempt means no retry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    1
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    8_000
}

/// Upper bound on `cache.ttl_hours` (one year).
pub const MAX_CACHE_TTL_HOURS: u64 = 8_760;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: u64,

    #[serde(default = "default_max_entries")]
    pub max_entries: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_hours: default_ttl_hours(),
            max_entries: default_max_entries(),
        }
    }
}

fn default_ttl_hours() -> u64 {
    24
}

fn default_max_entries() -> u64 {
    1_000
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub tesseract: TesseractConfig,

    #[serde(default)]
    pub vision: VisionConfig,

    #[serde(default)]
    pub document_ai: DocumentAiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TesseractConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            languages: default_languages(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_languages() -> Vec<String> {
    vec!["eng".to_string()]
}

/// Google Cloud Vision. The API key may come from a direct value, a file,
/// or an environment variable (checked in that order).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionConfig {
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub api_key_file: Option<String>,

    #[serde(default)]
    pub api_key_env_var: Option<String>,

    #[serde(default = "default_vision_endpoint")]
    pub endpoint: String,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_file: None,
            api_key_env_var: None,
            endpoint: default_vision_endpoint(),
        }
    }
}

fn default_vision_endpoint() -> String {
    "https://vision.googleapis.com/v1".to_string()
}

/// Google Document AI, used for scanned PDFs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentAiConfig {
    #[serde(default)]
    pub project_id: Option<String>,

    #[serde(default = "default_document_ai_location")]
    pub location: String,

    #[serde(default)]
    pub processor_id: Option<String>,

    #[serde(default)]
    pub access_token: Option<String>,

    #[serde(default)]
    pub access_token_file: Option<String>,

    #[serde(default)]
    pub access_token_env_var: Option<String>,

    /// Overrides `https://{location}-documentai.googleapis.com/v1`.
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl Default for DocumentAiConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            location: default_document_ai_location(),
            processor_id: None,
            access_token: None,
            access_token_file: None,
            access_token_env_var: None,
            endpoint: None,
        }
    }
}

fn default_document_ai_location() -> String {
    "us".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
