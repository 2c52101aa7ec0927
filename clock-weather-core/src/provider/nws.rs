//! National Weather Service (api.weather.gov) provider.
//!
//! Two requests per forecast: `points/{lat},{lon}` maps a coordinate to a
//! forecast office grid cell, then `gridpoints/{office}/{x},{y}/forecast`
//! returns named day/night periods. The grid cell never changes for a fixed
//! coordinate, so it is kept until the coordinates change.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveTime;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{
    config::NwsConfig,
    coordinates::Coordinates,
    error::WeatherError,
    http::{DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT, RetryClient, RetryPolicy},
    model::WeatherReport,
};

use super::{ForecastSource, Forecaster, ProviderId};

pub const NWS_BASE_URL: &str = "https://api.weather.gov";

const TODAY: &str = "Today";
const TONIGHT: &str = "Tonight";

// Placeholders used when the payload lacks a period or a value.
const DEFAULT_TEMPERATURE: f64 = 70.0;
const DEFAULT_TEMPERATURE_MIN: f64 = 50.0;
const DEFAULT_TEMPERATURE_MAX: f64 = 75.0;
// The forecast endpoint carries no astronomy data.
const PLACEHOLDER_SUNRISE: (u32, u32) = (6, 30);
const PLACEHOLDER_SUNSET: (u32, u32) = (18, 30);

pub type NwsProvider = Forecaster<NwsSource>;

#[derive(Debug, Clone)]
pub struct NwsSettings {
    pub base_url: String,
    pub user_agent: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for NwsSettings {
    fn default() -> Self {
        Self {
            base_url: NWS_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retry: RetryPolicy::default(),
        }
    }
}

impl NwsSettings {
    pub fn from_config(cfg: &NwsConfig) -> Self {
        Self {
            base_url: cfg.base_url.clone(),
            user_agent: cfg.user_agent.clone(),
            timeout: Duration::from_secs(cfg.timeout_secs),
            retry: RetryPolicy {
                max_attempts: cfg.max_attempts,
                ..RetryPolicy::default()
            },
        }
    }
}

impl Forecaster<NwsSource> {
    pub fn new(latitude: f64, longitude: f64, cache_duration_secs: u64) -> Result<Self, WeatherError> {
        let coordinates = Coordinates::new(latitude, longitude)?;
        Self::with_settings(coordinates, cache_duration_secs, NwsSettings::default())
    }

    pub fn with_settings(
        coordinates: Coordinates,
        cache_duration_secs: u64,
        settings: NwsSettings,
    ) -> Result<Self, WeatherError> {
        let source = NwsSource::new(settings)?;
        Ok(Self::with_source(coordinates, cache_duration_secs, source))
    }

    /// The resolved grid cell, if one is cached.
    pub fn grid_handle(&self) -> Option<&GridHandle> {
        self.source.resolver.cached()
    }

    /// Resolve (or reuse) the grid cell for the current coordinates.
    pub async fn resolve_location(&mut self) -> Result<GridHandle, WeatherError> {
        let source = &mut self.source;
        source
            .resolver
            .resolve(&source.client, &source.base_url, &self.coordinates)
            .await
    }
}

/// Forecast office plus grid cell, e.g. `OKX/33,35`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GridHandle {
    pub office: String,
    pub x: i64,
    pub y: i64,
}

impl std::fmt::Display for GridHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{},{}", self.office, self.x, self.y)
    }
}

#[derive(Debug, Deserialize)]
struct PointsResponse {
    properties: PointsProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PointsProperties {
    grid_id: Option<String>,
    grid_x: Option<i64>,
    grid_y: Option<i64>,
}

/// Caches the coordinate → grid cell lookup until invalidated.
#[derive(Debug, Default)]
pub struct GridResolver {
    handle: Option<GridHandle>,
}

impl GridResolver {
    pub fn cached(&self) -> Option<&GridHandle> {
        self.handle.as_ref()
    }

    pub fn invalidate(&mut self) {
        self.handle = None;
    }

    pub async fn resolve(
        &mut self,
        client: &RetryClient,
        base_url: &str,
        coordinates: &Coordinates,
    ) -> Result<GridHandle, WeatherError> {
        if let Some(handle) = &self.handle {
            return Ok(handle.clone());
        }

        let url = points_url(base_url, coordinates);
        debug!(%url, "resolving NWS grid");

        let raw = client
            .get_json(&url)
            .await
            .map_err(|e| WeatherError::Resolve(e.to_string()))?;

        let handle = grid_handle_from_points(raw)?;
        info!(%coordinates, grid = %handle, "NWS location resolved");
        self.handle = Some(handle.clone());
        Ok(handle)
    }
}

fn grid_handle_from_points(raw: Value) -> Result<GridHandle, WeatherError> {
    let points: PointsResponse = serde_json::from_value(raw)
        .map_err(|e| WeatherError::Resolve(format!("unexpected points response: {e}")))?;

    let PointsProperties {
        grid_id,
        grid_x,
        grid_y,
    } = points.properties;

    match (grid_id, grid_x, grid_y) {
        (Some(office), Some(x), Some(y)) if !office.is_empty() => Ok(GridHandle { office, x, y }),
        _ => Err(WeatherError::Resolve(
            "points response is missing gridId/gridX/gridY".to_string(),
        )),
    }
}

/// NWS answers coordinates with more than four decimals with a redirect.
fn format_coordinate(value: f64) -> String {
    let s = format!("{value:.4}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" { "0".to_string() } else { s.to_string() }
}

pub fn points_url(base_url: &str, coordinates: &Coordinates) -> String {
    format!(
        "{}/points/{},{}",
        base_url.trim_end_matches('/'),
        format_coordinate(coordinates.latitude()),
        format_coordinate(coordinates.longitude()),
    )
}

pub fn forecast_url(base_url: &str, handle: &GridHandle) -> String {
    format!(
        "{}/gridpoints/{}/{},{}/forecast",
        base_url.trim_end_matches('/'),
        handle.office,
        handle.x,
        handle.y
    )
}

#[derive(Debug)]
pub struct NwsSource {
    client: RetryClient,
    base_url: String,
    resolver: GridResolver,
}

impl NwsSource {
    pub fn new(settings: NwsSettings) -> Result<Self, WeatherError> {
        let client = RetryClient::new(&settings.user_agent, settings.timeout, settings.retry)?;
        Ok(Self {
            client,
            base_url: settings.base_url,
            resolver: GridResolver::default(),
        })
    }
}

#[async_trait]
impl ForecastSource for NwsSource {
    fn id(&self) -> ProviderId {
        ProviderId::Nws
    }

    async fn fetch(&mut self, coordinates: &Coordinates) -> Result<Value, WeatherError> {
        let handle = self
            .resolver
            .resolve(&self.client, &self.base_url, coordinates)
            .await?;

        let url = forecast_url(&self.base_url, &handle);
        debug!(%url, "fetching NWS forecast");

        let raw = self.client.get_json(&url).await?;
        info!(grid = %handle, "NWS forecast retrieved");
        Ok(raw)
    }

    fn parse(&self, raw: &Value, _coordinates: &Coordinates) -> Result<WeatherReport, WeatherError> {
        normalize_forecast(raw)
    }

    fn invalidate(&mut self) {
        self.resolver.invalidate();
    }
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    #[serde(default)]
    properties: ForecastProperties,
}

#[derive(Debug, Default, Deserialize)]
struct ForecastProperties {
    #[serde(default)]
    periods: Vec<ForecastPeriod>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ForecastPeriod {
    name: String,
    temperature: Option<f64>,
    temperature_unit: Option<String>,
    probability_of_precipitation: Option<QuantitativeValue>,
}

#[derive(Debug, Deserialize)]
struct QuantitativeValue {
    value: Option<f64>,
}

impl ForecastPeriod {
    fn temperature_f(&self) -> Option<f64> {
        let t = self.temperature?;
        match self.temperature_unit.as_deref() {
            Some("C") => Some(t * 9.0 / 5.0 + 32.0),
            _ => Some(t),
        }
    }

    fn precipitation(&self) -> Option<u8> {
        let v = self.probability_of_precipitation.as_ref()?.value?;
        Some(v.round().clamp(0.0, 100.0) as u8)
    }
}

/// Turn a gridpoint forecast into a [`WeatherReport`].
///
/// "Today" supplies the current and maximum temperature, "Tonight" the
/// minimum. A missing period falls back to placeholder values rather than
/// failing; only a payload whose shape cannot be read is an error.
pub fn normalize_forecast(raw: &Value) -> Result<WeatherReport, WeatherError> {
    let forecast = ForecastResponse::deserialize(raw)
        .map_err(|e| WeatherError::Parse(e.to_string()))?;
    let periods = forecast.properties.periods;

    let today = periods.iter().find(|p| p.name == TODAY);
    let tonight = periods.iter().find(|p| p.name == TONIGHT);

    if today.is_none() || tonight.is_none() {
        warn!(
            has_today = today.is_some(),
            has_tonight = tonight.is_some(),
            periods = periods.len(),
            "forecast lacks Today/Tonight periods, using placeholder values"
        );
    }

    let today_temp = today.and_then(ForecastPeriod::temperature_f);
    let tonight_temp = tonight.and_then(ForecastPeriod::temperature_f);

    let pops: Vec<u8> = [today, tonight]
        .into_iter()
        .flatten()
        .filter_map(ForecastPeriod::precipitation)
        .collect();
    let precipitation = today
        .and_then(ForecastPeriod::precipitation)
        .or_else(|| tonight.and_then(ForecastPeriod::precipitation))
        .unwrap_or(0);

    Ok(WeatherReport {
        temperature: today_temp.unwrap_or(DEFAULT_TEMPERATURE),
        temperature_min: tonight_temp.unwrap_or(DEFAULT_TEMPERATURE_MIN),
        temperature_max: today_temp.unwrap_or(DEFAULT_TEMPERATURE_MAX),
        precipitation,
        precipitation_min: pops.iter().copied().min().unwrap_or(0),
        precipitation_max: pops.iter().copied().max().unwrap_or(0),
        sunrise: placeholder_time(PLACEHOLDER_SUNRISE),
        sunset: placeholder_time(PLACEHOLDER_SUNSET),
    })
}

fn placeholder_time((h, m): (u32, u32)) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap_or(NaiveTime::MIN)
}
