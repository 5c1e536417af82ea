pub mod loader;
pub mod schema;

pub use loader::{load_config, load_config_from_str};
pub use schema::{
    CacheConfig, CascadeConfig, Config, DocumentAiConfig, LimitsConfig, LoggingConfig,
    ProvidersConfig, RetryConfig, TesseractConfig, VisionConfig, MAX_CACHE_TTL_HOURS,
};
