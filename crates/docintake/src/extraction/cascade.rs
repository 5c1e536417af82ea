//! Ordered strategies and the first-success-wins combinator.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info_span, warn, Instrument};

/// What a successful strategy produced.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyOutput {
    pub text: String,
    pub page_count: u32,
    pub confidence: f32,
    pub source: String,
    pub pages: Vec<String>,
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{code}: {message}")]
pub struct StrategyError {
    /// `PARSE_ERROR`, `NO_TEXT_LAYER`, or a provider error code.
    pub code: String,
    pub message: String,
}

impl StrategyError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait ExtractionStrategy: Send + Sync {
    fn name(&self) -> &str;

    async fn extract(&self, bytes: &[u8], mime: &str) -> Result<StrategyOutput, StrategyError>;
}

/// Record of one strategy invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionAttempt {
    pub strategy_name: String,
    pub succeeded: bool,
    #[serde(skip)]
    pub text: String,
    pub confidence: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CascadeRun {
    pub winner: Option<StrategyOutput>,
    pub attempts: Vec<ExtractionAttempt>,
}

/// Runs `strategies` in order and stops at the first `Ok`.
///
/// Later strategies are never invoked once one succeeds. Failures are logged
/// and recorded, never propagated.
pub async fn first_success(
    strategies: &[Arc<dyn ExtractionStrategy>],
    bytes: &[u8],
    mime: &str,
) -> CascadeRun {
    let mut run = CascadeRun::default();

    for strategy in strategies {
        let span = info_span!("strategy", name = strategy.name());
        match strategy.extract(bytes, mime).instrument(span).await {
            Ok(output) => {
                debug!(
                    strategy = strategy.name(),
                    chars = output.text.len(),
                    "strategy succeeded"
                );
                run.attempts.push(ExtractionAttempt {
                    strategy_name: strategy.name().to_string(),
                    succeeded: true,
                    text: output.text.clone(),
                    confidence: Some(output.confidence),
                    error_code: None,
                });
                run.winner = Some(output);
                return run;
            }
            Err(e) => {
                warn!(strategy = strategy.name(), error = %e, "strategy failed, falling back");
                run.attempts.push(ExtractionAttempt {
                    strategy_name: strategy.name().to_string(),
                    succeeded: false,
                    text: String::new(),
                    confidence: None,
                    error_code: Some(e.code),
                });
            }
        }
    }

    run
}
