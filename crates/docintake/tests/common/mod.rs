//! Shared test utilities for docintake integration tests.
//!
//! Counting fakes for providers and strategies, a tiny PDF builder and a
//! pipeline harness on a temp-file ledger with a manual clock.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tempfile::TempDir;

use docintake::extraction::image::ProviderStrategy;
use docintake::extraction::{ExtractionStrategy, StrategyError, StrategyOutput};
use docintake::ledger::JobOwner;
use docintake::providers::RetryPolicy;
use docintake::upload::ManualClock;
use docintake::{
    Database, ExtractionCache, ExtractionCascade, IntakeRequest, JobLedger, OcrProvider, Pipeline,
    PipelineConfig, ProviderError, Recognition, UploadGuard,
};

/// What a fake provider does when called.
#[derive(Clone)]
pub enum Behaviour {
    Text(&'static str, Option<f32>),
    Fail(ProviderError),
    Hang(Duration),
}

pub struct FakeProvider {
    name: &'static str,
    behaviour: Behaviour,
    calls: AtomicUsize,
}

impl FakeProvider {
    pub fn new(name: &'static str, behaviour: Behaviour) -> Arc<Self> {
        Arc::new(Self {
            name,
            behaviour,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OcrProvider for FakeProvider {
    fn name(&self) -> &str {
        self.name
    }

    fn is_configured(&self) -> bool {
        true
    }

    async fn recognize(&self, _bytes: &[u8], _mime: &str) -> Result<Recognition, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behaviour {
            Behaviour::Text(text, confidence) => Ok(Recognition::new(*text, *confidence, self.name)),
            Behaviour::Fail(e) => Err(e.clone()),
            Behaviour::Hang(d) => {
                tokio::time::sleep(*d).await;
                Ok(Recognition::new("too late", Some(1.0), self.name))
            }
        }
    }
}

/// Wraps fake providers the way production wires real ones.
pub fn provider_strategy(
    provider: Arc<FakeProvider>,
    timeout: Duration,
) -> Arc<dyn ExtractionStrategy> {
    Arc::new(ProviderStrategy::new(provider, timeout, RetryPolicy::none()))
}

/// A strategy with a scripted result that counts its invocations.
pub struct CountingStrategy {
    name: &'static str,
    result: Result<Vec<&'static str>, &'static str>,
    calls: AtomicUsize,
}

impl CountingStrategy {
    pub fn pages(name: &'static str, pages: Vec<&'static str>) -> Arc<Self> {
        Arc::new(Self {
            name,
            result: Ok(pages),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn text(name: &'static str, text: &'static str) -> Arc<Self> {
        Self::pages(name, vec![text])
    }

    pub fn failing(name: &'static str, code: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            result: Err(code),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExtractionStrategy for CountingStrategy {
    fn name(&self) -> &str {
        self.name
    }

    async fn extract(&self, _bytes: &[u8], _mime: &str) -> Result<StrategyOutput, StrategyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.result {
            Ok(pages) => Ok(StrategyOutput {
                text: pages.join("\n"),
                page_count: pages.len() as u32,
                confidence: 0.9,
                source: self.name.to_string(),
                pages: pages.iter().map(|p| p.to_string()).collect(),
            }),
            Err(code) => Err(StrategyError::new(*code, "scripted failure")),
        }
    }
}

pub fn as_strategy(s: &Arc<CountingStrategy>) -> Arc<dyn ExtractionStrategy> {
    Arc::clone(s) as Arc<dyn ExtractionStrategy>
}

/// A 1×1 white PNG.
pub fn one_pixel_png() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(1, 1, image::Rgb([255, 255, 255]));
    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png)
        .expect("encode png");
    buf.into_inner()
}

/// A minimal PDF with one Helvetica text line per page.
pub fn make_pdf(pages: &[&str]) -> Vec<u8> {
    use lopdf::dictionary;
    use lopdf::{Document, Object, Stream};

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
    doc.save_to(&mut buf).expect("save pdf");
    buf
}

/// Isolated pipeline environment: temp-file ledger, manual clock.
pub struct TestHarness {
    temp_dir: TempDir,
    pub clock: Arc<ManualClock>,
    pub ledger: JobLedger,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db = Database::open(&temp_dir.path().join("jobs.db")).expect("open ledger");
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
        ));
        Self {
            temp_dir,
            clock,
            ledger: JobLedger::new(db),
        }
    }

    pub fn pipeline(&self, cascade: ExtractionCascade) -> Pipeline {
        self.pipeline_with_timeout(cascade, Duration::from_secs(30))
    }

    pub fn pipeline_with_timeout(&self, cascade: ExtractionCascade, stage_timeout: Duration) -> Pipeline {
        let config = PipelineConfig {
            low_confidence_threshold: 0.3,
            stage_timeout,
        };
        Pipeline::new(
            config,
            UploadGuard::new(1024 * 1024, self.clock.clone()),
            ExtractionCache::new(100, Duration::from_secs(24 * 3600), self.clock.clone()),
            cascade,
            self.ledger.clone(),
        )
    }

    pub fn db_path(&self) -> std::path::PathBuf {
        self.temp_dir.path().join("jobs.db")
    }
}

pub fn request(filename: &str, mime: &str, bytes: &[u8]) -> IntakeRequest {
    IntakeRequest {
        bytes: bytes.to_vec(),
        mime: mime.to_string(),
        filename: filename.to_string(),
        owner: JobOwner::user("user-1"),
        force_reprocess: false,
    }
}
