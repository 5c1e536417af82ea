//! Google Document AI `:process` adapter, used for scanned PDFs and images.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::http::{build_client, classify_rpc_code, classify_status, classify_transport};
use super::{OcrProvider, ProviderError, Recognition};

pub const NAME: &str = "document_ai";

/// Identifies one Document AI processor.
#[derive(Debug, Clone, Default)]
pub struct ProcessorRef {
    pub project_id: Option<String>,
    pub location: String,
    pub processor_id: Option<String>,
}

impl ProcessorRef {
    fn path(&self) -> Option<String> {
        let project = self.project_id.as_deref().filter(|s| !s.is_empty())?;
        let processor = self.processor_id.as_deref().filter(|s| !s.is_empty())?;
        Some(format!(
            "projects/{}/locations/{}/processors/{}",
            project, self.location, processor
        ))
    }
}

pub struct DocumentAiProvider {
    processor: ProcessorRef,
    access_token: Option<SecretString>,
    endpoint: String,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProcessRequest {
    raw_document: RawDocument,
    skip_human_review: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RawDocument {
    content: String,
    mime_type: String,
}

#[derive(Debug, Deserialize)]
struct ProcessResponse {
    document: Option<ProcessedDocument>,
    error: Option<RpcStatus>,
}

#[derive(Debug, Deserialize)]
struct RpcStatus {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ProcessedDocument {
    #[serde(default)]
    text: String,
    #[serde(default)]
    pages: Vec<ProcessedPage>,
}

#[derive(Debug, Deserialize)]
struct ProcessedPage {
    layout: Option<Layout>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Layout {
    confidence: Option<f32>,
    text_anchor: Option<TextAnchor>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TextAnchor {
    #[serde(default)]
    text_segments: Vec<TextSegment>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TextSegment {
    #[serde(default)]
    start_index: Int64,
    #[serde(default)]
    end_index: Int64,
}

/// proto3 int64 arrives as a JSON string, older clients send numbers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Int64 {
    Str(String),
    Num(u64),
}

impl Default for Int64 {
    fn default() -> Self {
        Int64::Num(0)
    }
}

impl Int64 {
    fn value(&self) -> usize {
        match self {
            Int64::Str(s) => s.parse().unwrap_or(0),
            Int64::Num(n) => *n as usize,
        }
    }
}

impl DocumentAiProvider {
    pub fn new(
        processor: ProcessorRef,
        access_token: Option<SecretString>,
        endpoint: Option<String>,
        timeout: Duration,
    ) -> Self {
        let endpoint = endpoint
            .unwrap_or_else(|| format!("https://{}-documentai.googleapis.com/v1", processor.location))
            .trim_end_matches('/')
            .to_string();
        Self {
            processor,
            access_token,
            endpoint,
            timeout,
        }
    }

    fn process_url(&self) -> Option<String> {
        self.processor
            .path()
            .map(|path| format!("{}/{}:process", self.endpoint, path))
    }
}

#[async_trait]
impl OcrProvider for DocumentAiProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn is_configured(&self) -> bool {
        self.processor.path().is_some()
            && self
                .access_token
                .as_ref()
                .is_some_and(|t| !t.expose_secret().is_empty())
    }

    async fn recognize(&self, bytes: &[u8], mime: &str) -> Result<Recognition, ProviderError> {
        let (Some(url), Some(token)) = (self.process_url(), self.access_token.as_ref()) else {
            return Err(ProviderError::not_configured(NAME));
        };
        if mime != "application/pdf" && !mime.starts_with("image/") {
            return Err(ProviderError::invalid_input(format!(
                "{} cannot process {}",
                NAME, mime
            )));
        }
        if bytes.is_empty() {
            return Err(ProviderError::invalid_input("empty document"));
        }

        let request = ProcessRequest {
            raw_document: RawDocument {
                content: base64::engine::general_purpose::STANDARD.encode(bytes),
                mime_type: mime.to_string(),
            },
            skip_human_review: true,
        };

        let client = build_client(self.timeout)?;
        debug!(url = %url, bytes = bytes.len(), "calling document ai");

        let response = client
            .post(&url)
            .bearer_auth(token.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_transport(NAME, &e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| classify_transport(NAME, &e))?;
        if !status.is_success() {
            return Err(classify_status(NAME, status, &body));
        }

        parse_response(&body)
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        // Processing a page costs money; a blank PNG is the cheapest valid input.
        self.recognize(&super::probe_image(), "image/png")
            .await
            .map(|_| ())
    }
}

fn parse_response(body: &str) -> Result<Recognition, ProviderError> {
    let parsed: ProcessResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::unknown(format!("Unexpected document ai response: {}", e)))?;

    if let Some(err) = parsed.error {
        if err.code != 0 {
            return Err(classify_rpc_code(NAME, err.code, &err.message));
        }
    }

    let Some(document) = parsed.document else {
        return Ok(Recognition::new("", None, NAME));
    };

    let scores: Vec<f32> = document
        .pages
        .iter()
        .filter_map(|p| p.layout.as_ref().and_then(|l| l.confidence))
        .collect();
    let confidence = if scores.is_empty() {
        None
    } else {
        Some(scores.iter().sum::<f32>() / scores.len() as f32)
    };

    let pages: Vec<String> = document
        .pages
        .iter()
        .map(|page| {
            page.layout
                .as_ref()
                .and_then(|l| l.text_anchor.as_ref())
                .map(|anchor| {
                    anchor
                        .text_segments
                        .iter()
                        .map(|seg| slice_chars(&document.text, seg.start_index.value(), seg.end_index.value()))
                        .collect::<String>()
                })
                .unwrap_or_default()
        })
        .collect();

    Ok(Recognition::new(document.text.clone(), confidence, NAME).with_pages(pages))
}

/// Text anchors index characters, not bytes.
fn slice_chars(text: &str, start: usize, end: usize) -> String {
    if end <= start {
        return String::new();
    }
    text.chars().skip(start).take(end - start).collect()
}
