//! Google Cloud Vision `images:annotate` adapter (DOCUMENT_TEXT_DETECTION).

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::http::{build_client, classify_rpc_code, classify_status, classify_transport};
use super::{OcrProvider, ProviderError, Recognition};

pub const NAME: &str = "vision";

pub struct VisionProvider {
    api_key: Option<SecretString>,
    endpoint: String,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
struct AnnotateRequest {
    requests: Vec<AnnotateImageRequest>,
}

#[derive(Debug, Serialize)]
struct AnnotateImageRequest {
    image: ImageContent,
    features: Vec<Feature>,
}

#[derive(Debug, Serialize)]
struct ImageContent {
    content: String,
}

#[derive(Debug, Serialize)]
struct Feature {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<AnnotateImageResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateImageResponse {
    full_text_annotation: Option<FullTextAnnotation>,
    error: Option<RpcStatus>,
}

#[derive(Debug, Deserialize)]
struct FullTextAnnotation {
    #[serde(default)]
    text: String,
    #[serde(default)]
    pages: Vec<AnnotatedPage>,
}

#[derive(Debug, Deserialize)]
struct AnnotatedPage {
    confidence: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct RpcStatus {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

impl VisionProvider {
    pub fn new(api_key: Option<SecretString>, endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            api_key,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    fn build_request(bytes: &[u8]) -> AnnotateRequest {
        AnnotateRequest {
            requests: vec![AnnotateImageRequest {
                image: ImageContent {
                    content: base64::engine::general_purpose::STANDARD.encode(bytes),
                },
                features: vec![Feature {
                    kind: "DOCUMENT_TEXT_DETECTION",
                }],
            }],
        }
    }
}

#[async_trait]
impl OcrProvider for VisionProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn is_configured(&self) -> bool {
        self.api_key
            .as_ref()
            .is_some_and(|k| !k.expose_secret().is_empty())
    }

    async fn recognize(&self, bytes: &[u8], mime: &str) -> Result<Recognition, ProviderError> {
        let api_key = match &self.api_key {
            Some(key) if !key.expose_secret().is_empty() => key,
            _ => return Err(ProviderError::not_configured(NAME)),
        };
        if !mime.starts_with("image/") {
            return Err(ProviderError::invalid_input(format!(
                "{} only reads images, got {}",
                NAME, mime
            )));
        }
        if bytes.is_empty() {
            return Err(ProviderError::invalid_input("empty image"));
        }

        let client = build_client(self.timeout)?;
        let url = format!("{}/images:annotate", self.endpoint);
        debug!(url = %url, bytes = bytes.len(), "calling vision");

        let response = client
            .post(&url)
            .header("x-goog-api-key", api_key.expose_secret())
            .json(&Self::build_request(bytes))
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
}

fn parse_response(body: &str) -> Result<Recognition, ProviderError> {
    let parsed: AnnotateResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::unknown(format!("Unexpected vision response: {}", e)))?;

    // One image in, one response out. A missing entry means "no text".
    let Some(first) = parsed.responses.into_iter().next() else {
        return Ok(Recognition::new("", None, NAME));
    };

    if let Some(err) = first.error {
        if err.code != 0 {
            return Err(classify_rpc_code(NAME, err.code, &err.message));
        }
    }

    let Some(annotation) = first.full_text_annotation else {
        return Ok(Recognition::new("", None, NAME));
    };

    let scores: Vec<f32> = annotation.pages.iter().filter_map(|p| p.confidence).collect();
    let confidence = if scores.is_empty() {
        None
    } else {
        Some(scores.iter().sum::<f32>() / scores.len() as f32)
    };

    Ok(Recognition::new(annotation.text, confidence, NAME))
}
