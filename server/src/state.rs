use dashmap::DashMap;
use oneview_scraper_cli::{scraper::Fetcher, AcademicRecord, RollNumber};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

// Shared by every request: the portal client and records already looked up.
#[derive(Clone)]
pub struct AppState {
    pub fetcher: Arc<dyn Fetcher>,
    cache: Arc<DashMap<RollNumber, (Instant, AcademicRecord)>>,
    cache_ttl: Duration,
}

impl AppState {
    pub fn new(fetcher: Arc<dyn Fetcher>, cache_ttl: Duration) -> Self {
        AppState {
            fetcher,
            cache: Arc::new(DashMap::new()),
            cache_ttl,
        }
    }

    /// Cached record for `roll`, unless it is older than the TTL.
    pub fn cached(&self, roll: &RollNumber) -> Option<AcademicRecord> {
        let fresh = self
            .cache
            .get(roll)
            .filter(|entry| entry.0.elapsed() < self.cache_ttl)
            .map(|entry| entry.1.clone());
        if fresh.is_none() {
            self.cache.remove(roll);
        }
        fresh
    }

    pub fn remember(&self, roll: RollNumber, record: AcademicRecord) {
        self.cache.insert(roll, (Instant::now(), record));
    }
}
