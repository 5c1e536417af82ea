use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::cascade::{ExtractionStrategy, StrategyError, StrategyOutput};
use crate::providers::{call_with_policy, OcrProvider, RetryPolicy};

/// Adapts an OCR provider to the cascade: bounded timeout, optional retry,
/// provider errors reduced to their generic code.
pub struct ProviderStrategy {
    provider: Arc<dyn OcrProvider>,
    timeout: Duration,
    retry: RetryPolicy,
}

impl ProviderStrategy {
    pub fn new(provider: Arc<dyn OcrProvider>, timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            provider,
            timeout,
            retry,
        }
    }
}

#[async_trait]
impl ExtractionStrategy for ProviderStrategy {
    fn name(&self) -> &str {
        self.provider.name()
    }

    async fn extract(&self, bytes: &[u8], mime: &str) -> Result<StrategyOutput, StrategyError> {
        let recognition =
            call_with_policy(self.provider.as_ref(), bytes, mime, self.timeout, &self.retry)
                .await
                .map_err(|e| StrategyError::new(e.code.as_str(), e.message))?;

        let page_count = recognition.pages.len().max(1) as u32;
        let pages = if recognition.pages.is_empty() {
            vec![recognition.text.clone()]
        } else {
            recognition.pages
        };

        Ok(StrategyOutput {
            text: recognition.text,
            page_count,
            confidence: recognition.confidence,
            source: recognition.source,
            pages,
        })
    }
}
