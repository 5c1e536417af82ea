use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;

use super::{OcrProvider, ProviderError, Recognition};
use crate::config::TesseractConfig;

pub const NAME: &str = "tesseract";

/// Local Tesseract OCR through leptess. Needs no credentials, only the
/// `enabled` flag and installed language data.
#[derive(Clone)]
pub struct TesseractProvider {
    inner: Arc<TesseractInner>,
}

struct TesseractInner {
    enabled: bool,
    languages: String,
}

impl TesseractProvider {
    pub fn new(languages: &[String], enabled: bool) -> Self {
        let languages = if languages.is_empty() {
            "eng".to_string()
        } else {
            languages.join("+")
        };

        Self {
            inner: Arc::new(TesseractInner { enabled, languages }),
        }
    }

    pub fn from_config(config: &TesseractConfig) -> Self {
        Self::new(&config.languages, config.enabled)
    }

    pub fn languages(&self) -> &str {
        &self.inner.languages
    }
}

#[async_trait]
impl OcrProvider for TesseractProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn is_configured(&self) -> bool {
        self.inner.enabled
    }

    async fn recognize(&self, bytes: &[u8], mime: &str) -> Result<Recognition, ProviderError> {
        if !self.inner.enabled {
            return Err(ProviderError::not_configured(NAME));
        }
        if !mime.starts_with("image/") {
            return Err(ProviderError::invalid_input(format!(
                "{} only reads images, got {}",
                NAME, mime
            )));
        }

        let data = bytes.to_vec();
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || recognize_blocking(&inner.languages, &data))
            .await
            .map_err(|e| ProviderError::unknown(format!("OCR task failed: {}", e)))?
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        if !self.inner.enabled {
            return Err(ProviderError::not_configured(NAME));
        }
        let languages = self.inner.languages.clone();
        tokio::task::spawn_blocking(move || {
            leptess::LepTess::new(None, &languages)
                .map(|_| ())
                .map_err(|e| ProviderError::unknown(format!("Failed to initialize Tesseract: {}", e)))
        })
        .await
        .map_err(|e| ProviderError::unknown(format!("OCR task failed: {}", e)))?
    }
}

fn recognize_blocking(languages: &str, image_data: &[u8]) -> Result<Recognition, ProviderError> {
    let _span = tracing::info_span!("provider.tesseract", bytes = image_data.len()).entered();

    let img = image::load_from_memory(image_data)
        .map_err(|e| ProviderError::invalid_input(format!("Failed to load image: {}", e)))?;

    // leptess reads PNG reliably; normalise every input to it.
    let mut png_data = Vec::new();
    img.write_to(&mut Cursor::new(&mut png_data), image::ImageFormat::Png)
        .map_err(|e| ProviderError::invalid_input(format!("Failed to convert image: {}", e)))?;

    let mut lt = leptess::LepTess::new(None, languages)
        .map_err(|e| ProviderError::unknown(format!("Failed to initialize Tesseract: {}", e)))?;

    lt.set_image_from_mem(&png_data)
        .map_err(|e| ProviderError::invalid_input(format!("Failed to set image for OCR: {}", e)))?;

    let text = lt
        .get_utf8_text()
        .map_err(|e| ProviderError::unknown(format!("OCR failed: {}", e)))?;

    Ok(Recognition::new(text, tesseract_confidence(lt.mean_text_conf()), NAME))
}

/// Tesseract reports 0..=100, or a negative value when it has no estimate.
fn tesseract_confidence(raw: i32) -> Option<f32> {
    if raw < 0 {
        None
    } else {
        Some(raw as f32 / 100.0)
    }
}
