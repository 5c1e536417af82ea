use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::document_ai::{DocumentAiProvider, ProcessorRef};
use super::policy::{check_with_timeout, RetryPolicy};
use super::tesseract::TesseractProvider;
use super::vision::VisionProvider;
use super::OcrProvider;
use crate::config::{Config, ProvidersConfig};
use crate::secrets::{SecretError, SecretSource};

/// Operator-facing status of one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeReport {
    pub provider: String,
    pub configured: bool,
    /// `None` when no round trip was attempted.
    pub reachable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Builds provider adapters from configuration. Every accessor returns a
/// freshly constructed adapter with freshly resolved credentials.
#[derive(Debug, Clone)]
pub struct ProviderFactory {
    providers: ProvidersConfig,
    timeout: Duration,
    retry: RetryPolicy,
}

impl ProviderFactory {
    pub fn new(providers: ProvidersConfig, timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            providers,
            timeout,
            retry,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.providers.clone(),
            Duration::from_secs(config.cascade.provider_timeout_secs),
            RetryPolicy::from_config(&config.cascade.retry),
        )
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn tesseract(&self) -> TesseractProvider {
        TesseractProvider::from_config(&self.providers.tesseract)
    }

    pub fn vision(&self) -> VisionProvider {
        let (key, _) = self.vision_key();
        VisionProvider::new(key, self.providers.vision.endpoint.clone(), self.timeout)
    }

    pub fn document_ai(&self) -> DocumentAiProvider {
        let cfg = &self.providers.document_ai;
        let (token, _) = self.document_ai_token();
        DocumentAiProvider::new(
            ProcessorRef {
                project_id: cfg.project_id.clone(),
                location: cfg.location.clone(),
                processor_id: cfg.processor_id.clone(),
            },
            token,
            cfg.endpoint.clone(),
            self.timeout,
        )
    }

    /// Image OCR order: local engine first, cloud vision only with a key.
    pub fn image_chain(&self) -> Vec<Arc<dyn OcrProvider>> {
        let mut chain: Vec<Arc<dyn OcrProvider>> = Vec::new();
        let tesseract = self.tesseract();
        if tesseract.is_configured() {
            chain.push(Arc::new(tesseract));
        }
        let vision = self.vision();
        if vision.is_configured() {
            chain.push(Arc::new(vision));
        }
        chain
    }

    /// OCR for PDFs without a usable text layer.
    pub fn scanned_pdf_chain(&self) -> Vec<Arc<dyn OcrProvider>> {
        let document_ai = self.document_ai();
        if document_ai.is_configured() {
            vec![Arc::new(document_ai)]
        } else {
            Vec::new()
        }
    }

    /// Reports every known provider. With `round_trip`, configured providers
    /// are also asked to answer a trivial request. Never fails.
    pub async fn probe_all(&self, round_trip: bool) -> Vec<ProbeReport> {
        let (_, vision_issue) = self.vision_key();
        let (_, document_ai_issue) = self.document_ai_token();

        let candidates: Vec<(Arc<dyn OcrProvider>, Option<String>)> = vec![
            (Arc::new(self.tesseract()), None),
            (Arc::new(self.vision()), vision_issue),
            (Arc::new(self.document_ai()), document_ai_issue),
        ];

        let timeout = self.timeout;
        join_all(candidates.into_iter().map(|(provider, issue)| async move {
            let configured = provider.is_configured();
            let mut report = ProbeReport {
                provider: provider.name().to_string(),
                configured,
                reachable: None,
                detail: issue.or_else(|| (!configured).then(|| "not configured".to_string())),
            };
            if round_trip && configured {
                match check_with_timeout(provider.as_ref(), timeout).await {
                    Ok(()) => report.reachable = Some(true),
                    Err(e) => {
                        report.reachable = Some(false);
                        report.detail = Some(e.to_string());
                    }
                }
            }
            report
        }))
        .await
    }

    /// True when at least one OCR backend could be used.
    pub fn ocr_available(&self) -> bool {
        !self.image_chain().is_empty() || !self.scanned_pdf_chain().is_empty()
    }

    fn vision_key(&self) -> (Option<SecretString>, Option<String>) {
        let cfg = &self.providers.vision;
        resolve_credential(
            "vision",
            SecretSource::new(
                cfg.api_key.as_deref(),
                cfg.api_key_file.as_deref(),
                cfg.api_key_env_var.as_deref(),
            ),
        )
    }

    fn document_ai_token(&self) -> (Option<SecretString>, Option<String>) {
        let cfg = &self.providers.document_ai;
        resolve_credential(
            "document_ai",
            SecretSource::new(
                cfg.access_token.as_deref(),
                cfg.access_token_file.as_deref(),
                cfg.access_token_env_var.as_deref(),
            ),
        )
    }
}

/// A credential that cannot be resolved leaves the provider unconfigured;
/// the reason is kept for the probe report.
fn resolve_credential(
    provider: &str,
    source: SecretSource<'_>,
) -> (Option<SecretString>, Option<String>) {
    match source.resolve_optional() {
        Ok(secret) => (secret, None),
        Err(e @ SecretError::EnvVarNotSet { .. }) => (None, Some(e.to_string())),
        Err(e) => {
            warn!(provider, error = %e, "failed to resolve provider credential");
            (None, Some(e.to_string()))
        }
    }
}
