//! Single-entry forecast cache with time-based expiry.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

use crate::model::WeatherReport;

pub const DEFAULT_CACHE_DURATION_SECS: u64 = 900;

/// Source of "now" for cache freshness checks.
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub data: WeatherReport,
    pub fetched_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.fetched_at)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    Empty,
    Fresh,
    Stale,
}

#[derive(Debug, Clone)]
pub struct ForecastCache {
    entry: Option<CacheEntry>,
    ttl: Duration,
}

impl ForecastCache {
    /// A TTL too large for `chrono::Duration` saturates to `Duration::MAX`.
    pub fn new(ttl_secs: u64) -> Self {
        let ttl = i64::try_from(ttl_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX);
        Self { entry: None, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn entry(&self) -> Option<&CacheEntry> {
        self.entry.as_ref()
    }

    /// Fresh means `0 <= age < ttl`. An entry from the future (clock went
    /// backwards) is treated as stale.
    pub fn state(&self, now: DateTime<Utc>) -> CacheState {
        match &self.entry {
            None => CacheState::Empty,
            Some(entry) => {
                let age = entry.age(now);
                if age >= Duration::zero() && age < self.ttl {
                    CacheState::Fresh
                } else {
                    CacheState::Stale
                }
            }
        }
    }

    /// The cached report, only if it is still fresh.
    pub fn fresh(&self, now: DateTime<Utc>) -> Option<&WeatherReport> {
        match self.state(now) {
            CacheState::Fresh => self.entry.as_ref().map(|e| &e.data),
            _ => None,
        }
    }

    pub fn store(&mut self, data: WeatherReport, fetched_at: DateTime<Utc>) {
        self.entry = Some(CacheEntry { data, fetched_at });
    }

    pub fn clear(&mut self) {
        self.entry = None;
    }
}
