use std::path::Path;

use crate::config::schema::{Config, MAX_CACHE_TTL_HOURS};
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    let retry = &config.cascade.retry;
    if retry.max_backoff_ms < retry.initial_backoff_ms {
        return Err(ConfigError::Validation {
            message: format!(
                "cascade.retry.max_backoff_ms ({}) must be >= initial_backoff_ms ({})",
                retry.max_backoff_ms, retry.initial_backoff_ms
            ),
        });
    }

    let cascade = &config.cascade;
    if cascade.stage_timeout_secs < cascade.provider_timeout_secs {
        return Err(ConfigError::Validation {
            message: format!(
                "cascade.stage_timeout_secs ({}) must be >= provider_timeout_secs ({})",
                cascade.stage_timeout_secs, cascade.provider_timeout_secs
            ),
        });
    }

    let cache = &config.cache;
    if cache.ttl_hours == 0 || cache.ttl_hours > MAX_CACHE_TTL_HOURS {
        return Err(ConfigError::Validation {
            message: format!(
                "cache.ttl_hours ({}) must be between 1 and {}",
                cache.ttl_hours, MAX_CACHE_TTL_HOURS
            ),
        });
    }

    let tesseract = &config.providers.tesseract;
    if tesseract.enabled && tesseract.languages.is_empty() {
        return Err(ConfigError::Validation {
            message: "providers.tesseract.languages must not be empty when enabled".to_string(),
        });
    }

    let document_ai = &config.providers.document_ai;
    if document_ai.processor_id.is_some() && document_ai.project_id.is_none() {
        return Err(ConfigError::Validation {
            message: "providers.document_ai.processor_id requires project_id".to_string(),
        });
    }

    Ok(())
}
