use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::sync::Cache;
use tracing::debug;

use super::clock::{Clock, SystemClock};
use super::guard::UploadStamp;
use crate::config::{CacheConfig, MAX_CACHE_TTL_HOURS};
use crate::extraction::{DocumentKind, ExtractionOutcome};
use crate::sanitize::short_hash;

#[derive(Debug, Clone)]
pub struct CachedExtraction {
    pub fingerprint: String,
    pub outcome: ExtractionOutcome,
    pub created_at: DateTime<Utc>,
    /// Correlation id of the upload that produced this result.
    pub correlation_id: String,
}

/// The same bytes declared as a different type are a different entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    fingerprint: String,
    kind: DocumentKind,
}

impl CacheKey {
    fn new(fingerprint: &str, kind: DocumentKind) -> Self {
        Self {
            fingerprint: fingerprint.to_string(),
            kind,
        }
    }
}

/// Extraction results keyed by content fingerprint and document kind.
///
/// Freshness is judged against the entry's creation timestamp on the
/// configured clock; an entry at or past the TTL is evicted, never served.
#[derive(Clone)]
pub struct ExtractionCache {
    entries: Cache<CacheKey, Arc<CachedExtraction>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl ExtractionCache {
    pub fn new(max_entries: u64, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        let entries = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();
        Self {
            entries,
            ttl,
            clock,
        }
    }

    /// TTLs beyond [`MAX_CACHE_TTL_HOURS`] are clamped.
    pub fn from_config(config: &CacheConfig) -> Self {
        let hours = config.ttl_hours.min(MAX_CACHE_TTL_HOURS);
        Self::new(
            config.max_entries,
            Duration::from_secs(hours.saturating_mul(3600)),
            Arc::new(SystemClock),
        )
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// A fresh entry for these bytes read as `kind`, evicting it if stale.
    pub fn get_fresh(&self, fingerprint: &str, kind: DocumentKind) -> Option<Arc<CachedExtraction>> {
        let key = CacheKey::new(fingerprint, kind);
        let entry = self.entries.get(&key)?;
        if self.is_stale(&entry) {
            debug!(
                fingerprint = short_hash(fingerprint),
                %kind,
                created_at = %entry.created_at,
                "evicting stale extraction"
            );
            self.entries.invalidate(&key);
            return None;
        }
        Some(entry)
    }

    /// Cache lookup for an upload. A forced reprocess never reads the cache.
    pub fn lookup(&self, stamp: &UploadStamp, kind: DocumentKind) -> Option<Arc<CachedExtraction>> {
        if stamp.force_reprocess {
            debug!(
                correlation_id = %stamp.correlation_id,
                "force reprocess, skipping cache"
            );
            return None;
        }
        self.get_fresh(&stamp.fingerprint, kind)
    }

    /// Stores `outcome` under the upload's fingerprint and the outcome's kind.
    pub fn insert(&self, stamp: &UploadStamp, outcome: ExtractionOutcome) -> Arc<CachedExtraction> {
        let key = CacheKey::new(&stamp.fingerprint, outcome.kind);
        let entry = Arc::new(CachedExtraction {
            fingerprint: stamp.fingerprint.clone(),
            outcome,
            created_at: self.clock.now(),
            correlation_id: stamp.correlation_id.clone(),
        });
        self.entries.insert(key, Arc::clone(&entry));
        entry
    }

    fn is_stale(&self, entry: &CachedExtraction) -> bool {
        let age = self.clock.now().signed_duration_since(entry.created_at);
        // Entries from the future (clock moved back) are treated as fresh.
        age.to_std().map(|age| age >= self.ttl).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::ManualClock;
    use chrono::TimeZone;

    const DAY: Duration = Duration::from_secs(24 * 3600);

    fn outcome(text: &str) -> ExtractionOutcome {
        ExtractionOutcome {
            kind: DocumentKind::Text,
            text: text.to_string(),
            page_count: 1,
            ocr_tried: false,
            ocr_needed: false,
            source: Some("plain_text".to_string()),
            confidence: Some(1.0),
            pages: vec![text.to_string()],
            attempts: Vec::new(),
        }
    }

    fn stamp(fingerprint: &str, force: bool) -> UploadStamp {
        UploadStamp {
            fingerprint: fingerprint.to_string(),
            correlation_id: format!("1-{}-3", fingerprint),
            force_reprocess: force,
            filename: "a.txt".to_string(),
            size_bytes: 3,
            issued_at: Utc::now(),
        }
    }

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
        ))
    }

    #[test]
    fn test_hit_within_ttl() {
        let clock = clock();
        let cache = ExtractionCache::new(10, DAY, clock.clone());
        cache.insert(&stamp("h1", false), outcome("rent"));

        clock.advance(chrono::Duration::hours(23));
        let hit = cache.lookup(&stamp("h1", false), DocumentKind::Text).unwrap();
        assert_eq!(hit.outcome.text, "rent");
        assert_eq!(hit.correlation_id, "1-h1-3");
    }

    #[test]
    fn test_stale_after_ttl_and_evicted() {
        let clock = clock();
        let cache = ExtractionCache::new(10, DAY, clock.clone());
        cache.insert(&stamp("h1", false), outcome("rent"));

        clock.advance(chrono::Duration::hours(24));
        assert!(cache.get_fresh("h1", DocumentKind::Text).is_none());

        clock.advance(chrono::Duration::hours(-24));
        assert!(cache.get_fresh("h1", DocumentKind::Text).is_none(), "stale entry must be evicted");
    }

    #[test]
    fn test_force_reprocess_bypasses_lookup() {
        let cache = ExtractionCache::new(10, DAY, clock());
        cache.insert(&stamp("h1", false), outcome("rent"));
        assert!(cache.lookup(&stamp("h1", true), DocumentKind::Text).is_none());
        assert!(cache.lookup(&stamp("h1", false), DocumentKind::Text).is_some());
    }

    #[test]
    fn test_miss_for_other_fingerprint() {
        let cache = ExtractionCache::new(10, DAY, clock());
        cache.insert(&stamp("h1", false), outcome("rent"));
        assert!(cache.get_fresh("h2", DocumentKind::Text).is_none());
    }

    #[test]
    fn test_reinsert_resets_created_at() {
        let clock = clock();
        let cache = ExtractionCache::new(10, DAY, clock.clone());
        cache.insert(&stamp("h1", false), outcome("old"));
        clock.advance(chrono::Duration::hours(20));
        cache.insert(&stamp("h1", true), outcome("new"));
        clock.advance(chrono::Duration::hours(20));

        assert_eq!(cache.get_fresh("h1", DocumentKind::Text).unwrap().outcome.text, "new");
    }

    #[test]
    fn test_same_bytes_other_kind_is_a_miss() {
        let cache = ExtractionCache::new(10, DAY, clock());
        cache.insert(&stamp("h1", false), outcome("rent"));
        assert!(cache.lookup(&stamp("h1", false), DocumentKind::Other).is_none());
        assert!(cache.lookup(&stamp("h1", false), DocumentKind::Pdf).is_none());
        assert!(cache.lookup(&stamp("h1", false), DocumentKind::Text).is_some());
    }

    #[test]
    fn test_from_config_clamps_ttl() {
        let cache = ExtractionCache::from_config(&CacheConfig {
            ttl_hours: u64::MAX,
            ..Default::default()
        });
        assert_eq!(cache.ttl(), Duration::from_secs(MAX_CACHE_TTL_HOURS * 3600));
    }
}
