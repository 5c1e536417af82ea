use std::time::Duration;

use crate::config::Config;

pub struct PipelineConfig {
    pub low_confidence_threshold: f32,
    pub stage_timeout: Duration,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            low_confidence_threshold: config.cascade.low_confidence_threshold,
            stage_timeout: Duration::from_secs(config.cascade.stage_timeout_secs),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}
