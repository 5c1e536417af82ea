//! The extraction cascade: raw bytes plus a declared mime type in, best
//! available text out. Running the cascade never fails; exhausting every
//! strategy yields an empty, well-formed outcome with `ocr_needed` set.

pub mod cascade;
pub mod classify;
pub mod image;
pub mod pdf;
pub mod text;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, info_span, Instrument};

pub use cascade::{first_success, ExtractionAttempt, ExtractionStrategy, StrategyError, StrategyOutput};
pub use classify::{guess_doc_type, text_quality, DocType};

use crate::providers::ProviderFactory;

/// Coarse dispatch type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    Image,
    Text,
    Other,
}

impl DocumentKind {
    pub fn from_mime(mime: &str) -> Self {
        let essence = normalize_mime(mime);
        if essence == "application/pdf" {
            DocumentKind::Pdf
        } else if essence.starts_with("image/") {
            DocumentKind::Image
        } else if essence.starts_with("text/") {
            DocumentKind::Text
        } else {
            DocumentKind::Other
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DocumentKind::Pdf => "pdf",
            DocumentKind::Image => "image",
            DocumentKind::Text => "text",
            DocumentKind::Other => "other",
        };
        f.write_str(s)
    }
}

/// Lowercased mime essence without parameters (`; charset=...`).
pub fn normalize_mime(mime: &str) -> String {
    mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase()
}

/// The declared mime, or a guess from the filename when the declared value
/// is missing or generic.
pub fn resolve_mime(declared: &str, filename: &str) -> String {
    let essence = normalize_mime(declared);
    if essence.is_empty() || essence == "application/octet-stream" {
        if let Some(guess) = mime_guess::from_path(filename).first() {
            return guess.essence_str().to_string();
        }
    }
    essence
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionOutcome {
    pub kind: DocumentKind,
    /// Trimmed.
    pub text: String,
    pub page_count: u32,
    pub ocr_tried: bool,
    pub ocr_needed: bool,
    /// Winning strategy, if any.
    pub source: Option<String>,
    pub confidence: Option<f32>,
    pub pages: Vec<String>,
    pub attempts: Vec<ExtractionAttempt>,
}

impl ExtractionOutcome {
    fn empty(kind: DocumentKind, ocr_tried: bool) -> Self {
        Self {
            kind,
            text: String::new(),
            page_count: 0,
            ocr_tried,
            ocr_needed: true,
            source: None,
            confidence: None,
            pages: Vec::new(),
            attempts: Vec::new(),
        }
    }

    fn from_output(kind: DocumentKind, output: StrategyOutput, ocr_tried: bool) -> Self {
        Self {
            kind,
            text: output.text.trim().to_string(),
            page_count: output.page_count,
            ocr_tried,
            ocr_needed: false,
            source: Some(output.source),
            confidence: Some(output.confidence),
            pages: output.pages,
            attempts: Vec::new(),
        }
    }

    pub fn has_text(&self) -> bool {
        !self.text.is_empty()
    }
}

/// Ordered strategy lists per document kind.
#[derive(Clone, Default)]
pub struct ExtractionCascade {
    pdf: Vec<Arc<dyn ExtractionStrategy>>,
    pdf_ocr: Vec<Arc<dyn ExtractionStrategy>>,
    image: Vec<Arc<dyn ExtractionStrategy>>,
    text: Vec<Arc<dyn ExtractionStrategy>>,
}

impl ExtractionCascade {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pdf(mut self, strategies: Vec<Arc<dyn ExtractionStrategy>>) -> Self {
        self.pdf = strategies;
        self
    }

    /// OCR for PDFs whose text layer is missing. Empty by default.
    pub fn with_pdf_ocr(mut self, strategies: Vec<Arc<dyn ExtractionStrategy>>) -> Self {
        self.pdf_ocr = strategies;
        self
    }

    pub fn with_image(mut self, strategies: Vec<Arc<dyn ExtractionStrategy>>) -> Self {
        self.image = strategies;
        self
    }

    pub fn with_text(mut self, strategies: Vec<Arc<dyn ExtractionStrategy>>) -> Self {
        self.text = strategies;
        self
    }

    /// Production wiring: lopdf then pdf-extract for PDFs, configured OCR
    /// providers for images and scanned PDFs.
    pub fn from_factory(factory: &ProviderFactory) -> Self {
        let wrap = |providers: Vec<Arc<dyn crate::providers::OcrProvider>>| {
            providers
                .into_iter()
                .map(|p| {
                    Arc::new(image::ProviderStrategy::new(
                        p,
                        factory.timeout(),
                        factory.retry_policy().clone(),
                    )) as Arc<dyn ExtractionStrategy>
                })
                .collect::<Vec<_>>()
        };

        Self::new()
            .with_pdf(vec![
                Arc::new(pdf::LopdfTextStrategy),
                Arc::new(pdf::PdfExtractStrategy),
            ])
            .with_pdf_ocr(wrap(factory.scanned_pdf_chain()))
            .with_image(wrap(factory.image_chain()))
            .with_text(vec![Arc::new(text::PlainTextStrategy)])
    }

    pub async fn run(&self, bytes: &[u8], mime: &str) -> ExtractionOutcome {
        let kind = DocumentKind::from_mime(mime);
        let span = info_span!("cascade", %kind, bytes = bytes.len());
        let outcome = self.run_kind(kind, bytes, &normalize_mime(mime)).instrument(span).await;
        info!(
            %kind,
            source = outcome.source.as_deref().unwrap_or("none"),
            chars = outcome.text.len(),
            ocr_tried = outcome.ocr_tried,
            ocr_needed = outcome.ocr_needed,
            "extraction finished"
        );
        outcome
    }

    async fn run_kind(&self, kind: DocumentKind, bytes: &[u8], mime: &str) -> ExtractionOutcome {
        match kind {
            DocumentKind::Other => ExtractionOutcome::empty(kind, false),
            DocumentKind::Text => {
                let run = first_success(&self.text, bytes, mime).await;
                settle(kind, run, false, false)
            }
            DocumentKind::Image => {
                let run = first_success(&self.image, bytes, mime).await;
                settle(kind, run, true, true)
            }
            DocumentKind::Pdf => {
                let embedded = first_success(&self.pdf, bytes, mime).await;
                if embedded.winner.is_some() || self.pdf_ocr.is_empty() {
                    return settle(kind, embedded, false, false);
                }
                let mut scanned = first_success(&self.pdf_ocr, bytes, mime).await;
                let mut attempts = embedded.attempts;
                attempts.append(&mut scanned.attempts);
                scanned.attempts = attempts;
                settle(kind, scanned, true, true)
            }
        }
    }
}

fn settle(
    kind: DocumentKind,
    run: cascade::CascadeRun,
    ocr_tried_on_success: bool,
    ocr_tried_on_failure: bool,
) -> ExtractionOutcome {
    let mut outcome = match run.winner {
        Some(output) => ExtractionOutcome::from_output(kind, output, ocr_tried_on_success),
        None => ExtractionOutcome::empty(kind, ocr_tried_on_failure),
    };
    outcome.attempts = run.attempts;
    outcome
}
