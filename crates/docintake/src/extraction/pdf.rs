//! Embedded-text PDF strategies. Neither one performs OCR.

use async_trait::async_trait;

use super::cascade::{ExtractionStrategy, StrategyError, StrategyOutput};
use super::classify::text_quality;

pub const LOPDF: &str = "lopdf";
pub const PDF_EXTRACT: &str = "pdf_extract";

/// Pattern for Identity-H Unimplemented errors (common with CID fonts).
const IDENTITY_H_PATTERN: &str = "?Identity-H Unimplemented?";

/// Text shorter than this is accepted regardless of composition.
const MIN_TOTAL_CHARS: usize = 50;

/// Below this share of alphanumerics the text layer is treated as garbled.
const MIN_ALPHANUMERIC_PERCENT: usize = 10;

/// True when a text layer is unusable: empty, only font-encoding markers,
/// or mostly non-alphanumeric noise.
pub fn needs_ocr(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return true;
    }

    let cleaned = trimmed
        .replace(IDENTITY_H_PATTERN, "")
        .replace(['\n', ' '], "");
    if cleaned.is_empty() {
        return true;
    }

    let total_chars = trimmed.chars().count();
    let alphanumeric_chars = trimmed.chars().filter(|c| c.is_alphanumeric()).count();

    total_chars > MIN_TOTAL_CHARS
        && alphanumeric_chars * 100 < total_chars * MIN_ALPHANUMERIC_PERCENT
}

fn finish(source: &str, pages: Vec<String>) -> Result<StrategyOutput, StrategyError> {
    let text = pages.join("\n");
    if needs_ocr(&text) {
        return Err(StrategyError::new(
            "NO_TEXT_LAYER",
            format!("{} found no usable embedded text", source),
        ));
    }
    Ok(StrategyOutput {
        confidence: text_quality(&text),
        page_count: pages.len() as u32,
        text,
        source: source.to_string(),
        pages,
    })
}

/// Per-page text through lopdf.
pub struct LopdfTextStrategy;

#[async_trait]
impl ExtractionStrategy for LopdfTextStrategy {
    fn name(&self) -> &str {
        LOPDF
    }

    async fn extract(&self, bytes: &[u8], _mime: &str) -> Result<StrategyOutput, StrategyError> {
        let data = bytes.to_vec();
        let pages = tokio::task::spawn_blocking(move || lopdf_pages(&data))
            .await
            .map_err(|e| StrategyError::new("PARSE_ERROR", format!("lopdf task failed: {}", e)))??;
        finish(LOPDF, pages)
    }
}

fn lopdf_pages(data: &[u8]) -> Result<Vec<String>, StrategyError> {
    let doc = lopdf::Document::load_mem(data)
        .map_err(|e| StrategyError::new("PARSE_ERROR", format!("Failed to load PDF: {}", e)))?;

    // A page that fails to decode contributes an empty string so page
    // numbering stays aligned.
    Ok(doc
        .get_pages()
        .keys()
        .map(|page_num| doc.extract_text(&[*page_num]).unwrap_or_default())
        .collect())
}

/// Independent second parser. pdf-extract can panic on malformed input, which
/// `spawn_blocking` turns into an ordinary failure.
pub struct PdfExtractStrategy;

#[async_trait]
impl ExtractionStrategy for PdfExtractStrategy {
    fn name(&self) -> &str {
        PDF_EXTRACT
    }

    async fn extract(&self, bytes: &[u8], _mime: &str) -> Result<StrategyOutput, StrategyError> {
        let data = bytes.to_vec();
        let pages = tokio::task::spawn_blocking(move || {
            pdf_extract::extract_text_from_mem_by_pages(&data)
                .map_err(|e| StrategyError::new("PARSE_ERROR", format!("pdf-extract failed: {}", e)))
        })
        .await
        .map_err(|e| StrategyError::new("PARSE_ERROR", format!("pdf-extract aborted: {}", e)))??;
        finish(PDF_EXTRACT, pages)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lopdf::dictionary;
    use lopdf::{Document, Object, Stream};

    /// A minimal PDF with one Helvetica text line per page.
    pub(crate) fn make_pdf(pages: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.4");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });

        let mut kids: Vec<Object> = Vec::new();
        for text in pages {
            let content = format!("BT /F1 12 Tf 72 720 Td ({}) Tj ET", text);
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Contents" => content_id,
                "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    #[test]
    fn test_needs_ocr_empty() {
        assert!(needs_ocr(""));
        assert!(needs_ocr("  \n\t "));
    }

    #[test]
    fn test_needs_ocr_identity_h_only() {
        assert!(needs_ocr("?Identity-H Unimplemented?\n?Identity-H Unimplemented?"));
    }

    #[test]
    fn test_needs_ocr_garbled() {
        let garbled = "§¶•–≠‘“…«»".repeat(10);
        assert!(needs_ocr(&garbled));
    }

    #[test]
    fn test_short_text_accepted() {
        assert!(!needs_ocr("--- 1 ---"));
        assert!(!needs_ocr("Clause 1.1 The Tenant shall pay the rent."));
    }

    #[tokio::test]
    async fn test_lopdf_reads_pages() {
        let pdf = make_pdf(&["Clause 1 Rent", "Schedule 2 Service Charge"]);
        let out = LopdfTextStrategy
            .extract(&pdf, "application/pdf")
            .await
            .unwrap();
        assert_eq!(out.page_count, 2);
        assert_eq!(out.pages.len(), 2);
        assert!(out.pages[0].contains("Clause 1 Rent"));
        assert!(out.pages[1].contains("Schedule 2"));
        assert_eq!(out.source, LOPDF);
    }

    #[tokio::test]
    async fn test_lopdf_rejects_garbage() {
        let err = LopdfTextStrategy
            .extract(b"definitely not a pdf", "application/pdf")
            .await
            .unwrap_err();
        assert_eq!(err.code, "PARSE_ERROR");
    }

    #[tokio::test]
    async fn test_blank_pdf_has_no_text_layer() {
        let pdf = make_pdf(&[""]);
        let err = LopdfTextStrategy
            .extract(&pdf, "application/pdf")
            .await
            .unwrap_err();
        assert_eq!(err.code, "NO_TEXT_LAYER");
    }

    #[tokio::test]
    async fn test_pdf_extract_rejects_garbage() {
        let result = PdfExtractStrategy
            .extract(b"%PDF-1.4 truncated", "application/pdf")
            .await;
        assert!(result.is_err());
    }
}
