use async_trait::async_trait;

use super::cascade::{ExtractionStrategy, StrategyError, StrategyOutput};

pub const PLAIN_TEXT: &str = "plain_text";

/// Reads `text/*` uploads directly. Invalid UTF-8 is replaced, never fatal.
pub struct PlainTextStrategy;

#[async_trait]
impl ExtractionStrategy for PlainTextStrategy {
    fn name(&self) -> &str {
        PLAIN_TEXT
    }

    async fn extract(&self, bytes: &[u8], _mime: &str) -> Result<StrategyOutput, StrategyError> {
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        let text = String::from_utf8_lossy(bytes).into_owned();

        Ok(StrategyOutput {
            pages: vec![text.clone()],
            text,
            page_count: 1,
            confidence: 1.0,
            source: PLAIN_TEXT.to_string(),
        })
    }
}
