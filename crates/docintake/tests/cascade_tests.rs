//! Fallback order, short-circuiting and terminal results of the extraction
//! cascade, observed through call counts on fakes.

mod common;

use std::time::Duration;

use common::{
    as_strategy, make_pdf, one_pixel_png, provider_strategy, Behaviour, CountingStrategy,
    FakeProvider,
};
use docintake::extraction::pdf::{LopdfTextStrategy, PdfExtractStrategy};
use docintake::{DocumentKind, ExtractionCascade, ProviderError};
use std::sync::Arc;

const TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn test_first_pdf_strategy_wins_and_second_is_never_called() {
    let a = CountingStrategy::text("parser_a", "Clause 7.2 Alterations");
    let b = CountingStrategy::text("parser_b", "never");
    let cascade = ExtractionCascade::new().with_pdf(vec![as_strategy(&a), as_strategy(&b)]);

    let outcome = cascade.run(b"%PDF-1.4", "application/pdf").await;

    assert_eq!(a.calls(), 1);
    assert_eq!(b.calls(), 0);
    assert_eq!(outcome.text, "Clause 7.2 Alterations");
    assert_eq!(outcome.source.as_deref(), Some("parser_a"));
    assert!(!outcome.ocr_tried);
    assert!(!outcome.ocr_needed);
}

#[tokio::test]
async fn test_pdf_falls_back_to_second_parser() {
    let a = CountingStrategy::failing("parser_a", "PARSE_ERROR");
    let b = CountingStrategy::pages("parser_b", vec!["  page one", "page two  "]);
    let cascade = ExtractionCascade::new().with_pdf(vec![as_strategy(&a), as_strategy(&b)]);

    let outcome = cascade.run(b"%PDF-1.4", "application/pdf").await;

    assert_eq!(b.calls(), 1);
    assert_eq!(outcome.text, "page one\npage two");
    assert_eq!(outcome.page_count, 2);
    assert_eq!(outcome.attempts.len(), 2);
    assert!(!outcome.attempts[0].succeeded);
    assert_eq!(outcome.attempts[0].error_code.as_deref(), Some("PARSE_ERROR"));
}

#[tokio::test]
async fn test_pdf_exhausted_is_empty_and_needs_ocr() {
    let a = CountingStrategy::failing("parser_a", "PARSE_ERROR");
    let b = CountingStrategy::failing("parser_b", "NO_TEXT_LAYER");
    let cascade = ExtractionCascade::new().with_pdf(vec![as_strategy(&a), as_strategy(&b)]);

    let outcome = cascade.run(b"garbage", "application/pdf").await;

    assert_eq!(outcome.text, "");
    assert_eq!(outcome.page_count, 0);
    assert!(outcome.ocr_needed);
    assert!(!outcome.ocr_tried);
}

#[tokio::test]
async fn test_scanned_pdf_goes_to_document_ocr() {
    let a = CountingStrategy::failing("parser_a", "NO_TEXT_LAYER");
    let b = CountingStrategy::failing("parser_b", "NO_TEXT_LAYER");
    let ocr = FakeProvider::new("document_ai", Behaviour::Text("Scanned lease", Some(0.8)));
    let cascade = ExtractionCascade::new()
        .with_pdf(vec![as_strategy(&a), as_strategy(&b)])
        .with_pdf_ocr(vec![provider_strategy(ocr.clone(), TIMEOUT)]);

    let outcome = cascade.run(b"%PDF-1.4", "application/pdf").await;

    assert_eq!(ocr.calls(), 1);
    assert_eq!(outcome.text, "Scanned lease");
    assert!(outcome.ocr_tried);
    assert!(!outcome.ocr_needed);
    assert_eq!(outcome.attempts.len(), 3);
}

#[tokio::test]
async fn test_text_pdf_never_reaches_document_ocr() {
    let ocr = FakeProvider::new("document_ai", Behaviour::Text("nope", None));
    let cascade = ExtractionCascade::new()
        .with_pdf(vec![Arc::new(LopdfTextStrategy), Arc::new(PdfExtractStrategy)])
        .with_pdf_ocr(vec![provider_strategy(ocr.clone(), TIMEOUT)]);

    let bytes = make_pdf(&["Schedule 5 Tenant Covenants", "Clause 9 Repairs"]);
    let outcome = cascade.run(&bytes, "application/pdf").await;

    assert_eq!(ocr.calls(), 0);
    assert_eq!(outcome.page_count, 2);
    assert!(outcome.text.contains("Schedule 5"));
    assert!(outcome.pages[1].contains("Clause 9"));
}

#[tokio::test]
async fn test_image_first_provider_short_circuits() {
    let local = FakeProvider::new("tesseract", Behaviour::Text("Gas Safety Record", Some(0.92)));
    let cloud = FakeProvider::new("vision", Behaviour::Text("never", None));
    let cascade = ExtractionCascade::new().with_image(vec![
        provider_strategy(local.clone(), TIMEOUT),
        provider_strategy(cloud.clone(), TIMEOUT),
    ]);

    let outcome = cascade.run(b"\x89PNG", "image/png").await;

    assert_eq!(local.calls(), 1);
    assert_eq!(cloud.calls(), 0);
    assert_eq!(outcome.text, "Gas Safety Record");
    assert_eq!(outcome.confidence, Some(0.92));
    assert!(outcome.ocr_tried);
}

#[tokio::test]
async fn test_image_falls_back_to_cloud_on_error() {
    let local = FakeProvider::new(
        "tesseract",
        Behaviour::Fail(ProviderError::invalid_input("unreadable image")),
    );
    let cloud = FakeProvider::new("vision", Behaviour::Text("Fire Risk Assessment", None));
    let cascade = ExtractionCascade::new().with_image(vec![
        provider_strategy(local.clone(), TIMEOUT),
        provider_strategy(cloud.clone(), TIMEOUT),
    ]);

    let outcome = cascade.run(b"\xff\xd8", "image/jpeg").await;

    assert_eq!(cloud.calls(), 1);
    assert_eq!(outcome.text, "Fire Risk Assessment");
    // No score from the provider means the synthetic default.
    assert_eq!(outcome.confidence, Some(docintake::providers::DEFAULT_CONFIDENCE));
    assert_eq!(
        outcome.attempts[0].error_code.as_deref(),
        Some("INVALID_INPUT")
    );
}

#[tokio::test]
async fn test_provider_timeout_falls_back() {
    let local = FakeProvider::new("tesseract", Behaviour::Hang(Duration::from_secs(30)));
    let cloud = FakeProvider::new("vision", Behaviour::Text("EICR", Some(0.7)));
    let cascade = ExtractionCascade::new().with_image(vec![
        provider_strategy(local.clone(), Duration::from_millis(50)),
        provider_strategy(cloud.clone(), TIMEOUT),
    ]);

    let outcome = cascade.run(b"\x89PNG", "image/png").await;

    assert_eq!(outcome.text, "EICR");
    assert_eq!(outcome.attempts[0].error_code.as_deref(), Some("UNKNOWN"));
}

#[tokio::test]
async fn test_image_exhausted_needs_ocr() {
    let local = FakeProvider::new("tesseract", Behaviour::Fail(ProviderError::unknown("boom")));
    let cloud = FakeProvider::new("vision", Behaviour::Fail(ProviderError::quota("quota")));
    let cascade = ExtractionCascade::new().with_image(vec![
        provider_strategy(local.clone(), TIMEOUT),
        provider_strategy(cloud.clone(), TIMEOUT),
    ]);

    let outcome = cascade.run(b"\x89PNG", "image/png").await;

    assert_eq!(outcome.text, "");
    assert!(outcome.ocr_needed);
    assert!(outcome.ocr_tried);
    assert_eq!(outcome.page_count, 0);
}

#[tokio::test]
async fn test_one_pixel_image_ran_and_found_nothing() {
    let local = FakeProvider::new("tesseract", Behaviour::Text("   ", None));
    let cascade =
        ExtractionCascade::new().with_image(vec![provider_strategy(local.clone(), TIMEOUT)]);

    let outcome = cascade.run(&one_pixel_png(), "image/png").await;

    assert_eq!(outcome.text, "");
    assert!(!outcome.ocr_needed);
    assert!(outcome.ocr_tried);
    assert_eq!(local.calls(), 1);
}

#[tokio::test]
async fn test_unsupported_type_invokes_nothing() {
    let pdf = CountingStrategy::text("parser_a", "x");
    let image = FakeProvider::new("tesseract", Behaviour::Text("x", None));
    let cascade = ExtractionCascade::new()
        .with_pdf(vec![as_strategy(&pdf)])
        .with_image(vec![provider_strategy(image.clone(), TIMEOUT)]);

    let outcome = cascade.run(b"PK\x03\x04", "application/zip").await;

    assert_eq!(outcome.kind, DocumentKind::Other);
    assert_eq!(outcome.text, "");
    assert_eq!(outcome.page_count, 0);
    assert!(!outcome.ocr_tried);
    assert!(outcome.ocr_needed);
    assert!(outcome.attempts.is_empty());
    assert_eq!(pdf.calls(), 0);
    assert_eq!(image.calls(), 0);
}
