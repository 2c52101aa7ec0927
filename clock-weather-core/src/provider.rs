use crate::{
    Config,
    cache::{CacheState, Clock, ForecastCache, SystemClock},
    coordinates::Coordinates,
    error::{CoordinateError, WeatherError},
    model::{WeatherData, WeatherReport},
    provider::{
        mock::{MockProvider, MockSource},
        nws::{NwsProvider, NwsSettings},
    },
};
use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{convert::TryFrom, fmt::Debug, sync::Arc, time::Duration};
use tracing::{debug, error, info};

pub mod mock;
pub mod nws;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    #[default]
    Nws,
    Mock,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Nws => "nws",
            ProviderId::Mock => "mock",
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[ProviderId::Nws, ProviderId::Mock]
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "nws" | "weather.gov" => Ok(ProviderId::Nws),
            "mock" => Ok(ProviderId::Mock),
            _ => Err(anyhow::anyhow!(
                "Unknown provider '{value}'. Supported providers: nws, mock."
            )),
        }
    }
}

/// Public query interface shared by every weather provider.
///
/// Query methods take `&mut self`: one provider instance serves one flow of
/// control. Wrap it in a mutex to share it between tasks.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    fn id(&self) -> ProviderId;

    fn coordinates(&self) -> Coordinates;

    fn latitude(&self) -> f64 {
        self.coordinates().latitude()
    }

    fn longitude(&self) -> f64 {
        self.coordinates().longitude()
    }

    /// Validates, then clears the cached forecast and location handle.
    fn set_latitude(&mut self, latitude: f64) -> Result<(), CoordinateError>;

    /// Validates, then clears the cached forecast and location handle.
    fn set_longitude(&mut self, longitude: f64) -> Result<(), CoordinateError>;

    fn set_coordinates(&mut self, coordinates: Coordinates);

    fn cache_duration(&self) -> Duration;

    /// Drop the cached forecast and any cached location resolution.
    fn invalidate(&mut self);

    /// Cached data while fresh, otherwise a new fetch. Failures come back as
    /// `WeatherData::Error`.
    async fn get_current_weather(&mut self) -> WeatherData;

    /// Invalidate and fetch immediately.
    async fn refresh(&mut self) -> WeatherData;
}

/// Provider-specific half of the pipeline: obtain a raw payload, then turn
/// it into a [`WeatherReport`].
#[async_trait]
pub trait ForecastSource: Send + Sync + Debug {
    fn id(&self) -> ProviderId;

    async fn fetch(&mut self, coordinates: &Coordinates) -> Result<Value, WeatherError>;

    fn parse(&self, raw: &Value, coordinates: &Coordinates) -> Result<WeatherReport, WeatherError>;

    /// Forget anything derived from the current coordinates.
    fn invalidate(&mut self) {}
}

/// Cache-then-fetch orchestrator wrapped around a [`ForecastSource`].
#[derive(Debug)]
pub struct Forecaster<S> {
    coordinates: Coordinates,
    cache: ForecastCache,
    clock: Arc<dyn Clock>,
    source: S,
}

impl<S: ForecastSource> Forecaster<S> {
    pub fn with_source(coordinates: Coordinates, cache_duration_secs: u64, source: S) -> Self {
        Self {
            coordinates,
            cache: ForecastCache::new(cache_duration_secs),
            clock: Arc::new(SystemClock),
            source,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn cache(&self) -> &ForecastCache {
        &self.cache
    }

    pub fn cache_state(&self) -> CacheState {
        self.cache.state(self.clock.now())
    }

    async fn fetch_report(&mut self) -> Result<WeatherReport, WeatherError> {
        let raw = self.source.fetch(&self.coordinates).await?;
        self.source.parse(&raw, &self.coordinates)
    }
}

#[async_trait]
impl<S: ForecastSource> WeatherProvider for Forecaster<S> {
    fn id(&self) -> ProviderId {
        self.source.id()
    }

    fn coordinates(&self) -> Coordinates {
        self.coordinates
    }

    fn set_latitude(&mut self, latitude: f64) -> Result<(), CoordinateError> {
        let coordinates = self.coordinates.with_latitude(latitude)?;
        self.set_coordinates(coordinates);
        Ok(())
    }

    fn set_longitude(&mut self, longitude: f64) -> Result<(), CoordinateError> {
        let coordinates = self.coordinates.with_longitude(longitude)?;
        self.set_coordinates(coordinates);
        Ok(())
    }

    fn set_coordinates(&mut self, coordinates: Coordinates) {
        self.coordinates = coordinates;
        self.invalidate();
    }

    fn cache_duration(&self) -> Duration {
        self.cache.ttl().to_std().unwrap_or_default()
    }

    fn invalidate(&mut self) {
        self.cache.clear();
        self.source.invalidate();
        debug!(provider = %self.source.id(), "cache invalidated");
    }

    async fn get_current_weather(&mut self) -> WeatherData {
        if let Some(report) = self.cache.fresh(self.clock.now()) {
            debug!(provider = %self.source.id(), "serving cached weather");
            return WeatherData::Cached(report.clone());
        }

        match self.fetch_report().await {
            Ok(report) => {
                self.cache.store(report.clone(), self.clock.now());
                info!(
                    provider = %self.source.id(),
                    coordinates = %self.coordinates,
                    temperature = report.temperature,
                    "weather updated"
                );
                WeatherData::Ok(report)
            }
            Err(e) => {
                error!(
                    provider = %self.source.id(),
                    coordinates = %self.coordinates,
                    error = %e,
                    "weather fetch failed"
                );
                WeatherData::error(e.to_string())
            }
        }
    }

    async fn refresh(&mut self) -> WeatherData {
        self.invalidate();
        self.get_current_weather().await
    }
}

/// Construct the configured provider.
pub fn provider_from_config(config: &Config) -> anyhow::Result<Box<dyn WeatherProvider>> {
    let coordinates = config.coordinates()?;

    let boxed: Box<dyn WeatherProvider> = match config.provider {
        ProviderId::Nws => {
            let settings = NwsSettings::from_config(&config.nws);
            Box::new(
                NwsProvider::with_settings(coordinates, config.cache_duration_secs, settings)
                    .context("Failed to set up the weather.gov provider")?,
            )
        }
        ProviderId::Mock => Box::new(MockProvider::with_source(
            coordinates,
            config.cache_duration_secs,
            MockSource::new(config.mock.scenario),
        )),
    };

    Ok(boxed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cache::ManualClock,
        model::WeatherStatus,
        provider::mock::Scenario,
    };
    use chrono::{NaiveTime, TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts fetches and fails on demand.
    #[derive(Debug, Default)]
    struct CountingSource {
        fetches: Arc<AtomicUsize>,
        invalidations: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl ForecastSource for CountingSource {
        fn id(&self) -> ProviderId {
            ProviderId::Mock
        }

        async fn fetch(&mut self, _coordinates: &Coordinates) -> Result<Value, WeatherError> {
            let n = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail {
                return Err(WeatherError::Resolve("points lookup returned HTTP 503".into()));
            }
            Ok(serde_json::json!({ "n": n }))
        }

        fn parse(&self, raw: &Value, _coordinates: &Coordinates) -> Result<WeatherReport, WeatherError> {
            let n = raw["n"].as_f64().unwrap_or_default();
            Ok(WeatherReport {
                temperature: n,
                temperature_min: 0.0,
                temperature_max: 100.0,
                precipitation: 0,
                precipitation_min: 0,
                precipitation_max: 0,
                sunrise: NaiveTime::from_hms_opt(6, 30, 0).unwrap(),
                sunset: NaiveTime::from_hms_opt(18, 30, 0).unwrap(),
            })
        }

        fn invalidate(&mut self) {
            self.invalidations.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn forecaster(source: CountingSource) -> (Forecaster<CountingSource>, ManualClock) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap());
        let coordinates = Coordinates::new(40.0, -83.0).unwrap();
        let f = Forecaster::with_source(coordinates, 900, source).with_clock(Arc::new(clock.clone()));
        (f, clock)
    }

    #[test]
    fn provider_id_as_str_roundtrip() {
        for id in ProviderId::all() {
            let parsed = ProviderId::try_from(id.as_str()).expect("roundtrip should succeed");
            assert_eq!(*id, parsed);
        }
    }

    #[test]
    fn unknown_provider_error() {
        let err = ProviderId::try_from("openweather").unwrap_err();
        assert!(err.to_string().contains("Unknown provider"));
    }

    #[tokio::test]
    async fn empty_then_fresh_then_cached() {
        let fetches = Arc::new(AtomicUsize::new(0));
        let (mut f, _clock) = forecaster(CountingSource {
            fetches: fetches.clone(),
            ..Default::default()
        });
        assert_eq!(f.cache_state(), CacheState::Empty);

        let first = f.get_current_weather().await;
        assert_eq!(first.status(), WeatherStatus::Ok);
        assert_eq!(f.cache_state(), CacheState::Fresh);

        let second = f.get_current_weather().await;
        assert_eq!(second.status(), WeatherStatus::Cached);
        assert_eq!(second.report(), first.report());
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stale_exactly_at_ttl() {
        let fetches = Arc::new(AtomicUsize::new(0));
        let (mut f, clock) = forecaster(CountingSource {
            fetches: fetches.clone(),
            ..Default::default()
        });

        f.get_current_weather().await;
        clock.advance(chrono::Duration::seconds(899));
        assert_eq!(f.get_current_weather().await.status(), WeatherStatus::Cached);

        clock.advance(chrono::Duration::seconds(1));
        assert_eq!(f.cache_state(), CacheState::Stale);
        let data = f.get_current_weather().await;
        assert_eq!(data.status(), WeatherStatus::Ok);
        assert_eq!(data.report().unwrap().temperature, 2.0);
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn refresh_fetches_even_when_fresh() {
        let fetches = Arc::new(AtomicUsize::new(0));
        let invalidations = Arc::new(AtomicUsize::new(0));
        let (mut f, _clock) = forecaster(CountingSource {
            fetches: fetches.clone(),
            invalidations: invalidations.clone(),
            ..Default::default()
        });

        f.get_current_weather().await;
        let refreshed = f.refresh().await;
        assert_eq!(refreshed.status(), WeatherStatus::Ok);
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
        assert_eq!(invalidations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failure_returns_error_and_keeps_entry() {
        let (mut f, clock) = forecaster(CountingSource::default());
        f.get_current_weather().await;
        clock.advance(chrono::Duration::seconds(1000));

        f.source.fail = true;
        let data = f.get_current_weather().await;
        assert_eq!(data.status(), WeatherStatus::Error);
        assert!(data.error_message().is_some_and(|m| m.contains("503")));
        assert!(data.report().is_none());

        // still stale, still there
        assert_eq!(f.cache_state(), CacheState::Stale);
        assert!(f.cache().entry().is_some());
    }

    #[tokio::test]
    async fn setters_invalidate_regardless_of_state() {
        let invalidations = Arc::new(AtomicUsize::new(0));
        let (mut f, _clock) = forecaster(CountingSource {
            invalidations: invalidations.clone(),
            ..Default::default()
        });

        // Empty cache: still counts as an invalidation.
        f.set_latitude(41.0).unwrap();
        assert_eq!(invalidations.load(Ordering::SeqCst), 1);

        f.get_current_weather().await;
        f.set_longitude(-84.0).unwrap();
        assert_eq!(f.cache_state(), CacheState::Empty);
        assert_eq!(invalidations.load(Ordering::SeqCst), 2);
        assert_eq!(f.latitude(), 41.0);
        assert_eq!(f.longitude(), -84.0);
    }

    #[tokio::test]
    async fn rejected_setter_leaves_state_alone() {
        let invalidations = Arc::new(AtomicUsize::new(0));
        let (mut f, _clock) = forecaster(CountingSource {
            invalidations: invalidations.clone(),
            ..Default::default()
        });
        f.get_current_weather().await;

        assert!(matches!(
            f.set_latitude(91.0),
            Err(CoordinateError::OutOfRange { .. })
        ));
        assert!(matches!(
            f.set_longitude(f64::NAN),
            Err(CoordinateError::NotNumeric { .. })
        ));
        assert_eq!(f.latitude(), 40.0);
        assert_eq!(f.cache_state(), CacheState::Fresh);
        assert_eq!(invalidations.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn cache_duration_reports_ttl() {
        let (f, _clock) = forecaster(CountingSource::default());
        assert_eq!(f.cache_duration(), Duration::from_secs(900));
    }

    #[test]
    fn provider_from_config_builds_mock() {
        let mut cfg = Config::default();
        cfg.provider = ProviderId::Mock;
        cfg.mock.scenario = Scenario::Rainy;

        let provider = provider_from_config(&cfg).expect("mock provider builds");
        assert_eq!(provider.id(), ProviderId::Mock);
        assert_eq!(provider.latitude(), 40.0931191);
    }

    #[test]
    fn provider_from_config_rejects_bad_coordinates() {
        let mut cfg = Config::default();
        cfg.latitude = "95".into();

        let err = provider_from_config(&cfg).unwrap_err();
        assert!(format!("{err:#}").contains("outside the valid range"));
    }
}
