//! Offline provider that serves canned scenarios. No network access.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{Duration, NaiveTime};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::{
    coordinates::Coordinates,
    error::WeatherError,
    model::WeatherReport,
};

use super::{ForecastSource, Forecaster, ProviderId, WeatherProvider};

pub type MockProvider = Forecaster<MockSource>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    #[default]
    Sunny,
    Rainy,
    Cloudy,
    Stormy,
    ExtremeHeat,
    ExtremeCold,
    /// One of the other six, chosen anew on every fetch.
    Random,
}

/// Temperatures (°F) and precipitation chances (%) for one scenario.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Conditions {
    pub temperature: f64,
    pub temperature_min: f64,
    pub temperature_max: f64,
    pub precipitation: u8,
    pub precipitation_min: u8,
    pub precipitation_max: u8,
}

const fn conditions(t: f64, t_min: f64, t_max: f64, p: u8, p_min: u8, p_max: u8) -> Conditions {
    Conditions {
        temperature: t,
        temperature_min: t_min,
        temperature_max: t_max,
        precipitation: p,
        precipitation_min: p_min,
        precipitation_max: p_max,
    }
}

impl Scenario {
    pub const CONCRETE: [Scenario; 6] = [
        Scenario::Sunny,
        Scenario::Rainy,
        Scenario::Cloudy,
        Scenario::Stormy,
        Scenario::ExtremeHeat,
        Scenario::ExtremeCold,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scenario::Sunny => "sunny",
            Scenario::Rainy => "rainy",
            Scenario::Cloudy => "cloudy",
            Scenario::Stormy => "stormy",
            Scenario::ExtremeHeat => "extreme_heat",
            Scenario::ExtremeCold => "extreme_cold",
            Scenario::Random => "random",
        }
    }

    pub fn all() -> impl Iterator<Item = Scenario> {
        Self::CONCRETE.into_iter().chain(std::iter::once(Scenario::Random))
    }

    /// `None` for [`Scenario::Random`], which has no row of its own.
    pub fn conditions(&self) -> Option<Conditions> {
        let row = match self {
            Scenario::Sunny => conditions(72.0, 65.0, 78.0, 5, 0, 10),
            Scenario::Rainy => conditions(58.0, 55.0, 62.0, 75, 60, 85),
            Scenario::Cloudy => conditions(64.0, 60.0, 68.0, 30, 20, 40),
            Scenario::Stormy => conditions(55.0, 52.0, 58.0, 95, 90, 100),
            Scenario::ExtremeHeat => conditions(105.0, 95.0, 110.0, 0, 0, 5),
            Scenario::ExtremeCold => conditions(-5.0, -15.0, 5.0, 45, 30, 60),
            Scenario::Random => return None,
        };
        Some(row)
    }

    /// Resolve `Random` to a concrete scenario; others map to themselves.
    pub fn pick(self) -> Scenario {
        match self {
            Scenario::Random => Self::CONCRETE
                .choose(&mut rand::thread_rng())
                .copied()
                .unwrap_or(Scenario::Sunny),
            concrete => concrete,
        }
    }
}

impl std::fmt::Display for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scenario {
    type Err = WeatherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        Scenario::all()
            .find(|sc| sc.as_str() == lower)
            .ok_or_else(|| WeatherError::Scenario(s.to_string()))
    }
}

const SUNRISE_BASE: (u32, u32) = (6, 30);
const SUNSET_BASE: (u32, u32) = (18, 45);

/// Base time shifted by `trunc(|latitude| / 10)` minutes: later in the
/// northern hemisphere, earlier in the southern. Wraps past midnight.
pub fn shifted_time((hour, minute): (u32, u32), latitude: f64) -> NaiveTime {
    let base = NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN);
    let offset = (latitude.abs() / 10.0).trunc() as i64;
    let offset = if latitude > 0.0 { offset } else { -offset };
    base.overflowing_add_signed(Duration::minutes(offset)).0
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Overrides {
    temperature: Option<(f64, f64, f64)>,
    precipitation: Option<(u8, u8, u8)>,
}

#[derive(Debug, Clone, Default)]
pub struct MockSource {
    scenario: Scenario,
    overrides: Overrides,
    last_pick: Option<Scenario>,
}

impl MockSource {
    pub fn new(scenario: Scenario) -> Self {
        Self {
            scenario,
            ..Self::default()
        }
    }

    pub fn scenario(&self) -> Scenario {
        self.scenario
    }

    /// The concrete scenario served by the most recent fetch.
    pub fn last_pick(&self) -> Option<Scenario> {
        self.last_pick
    }
}

#[async_trait]
impl ForecastSource for MockSource {
    fn id(&self) -> ProviderId {
        ProviderId::Mock
    }

    async fn fetch(&mut self, _coordinates: &Coordinates) -> Result<Value, WeatherError> {
        let picked = self.scenario.pick();
        if self.scenario == Scenario::Random {
            debug!(%picked, "random scenario selected");
        }
        self.last_pick = Some(picked);
        Ok(json!({ "scenario": picked.as_str() }))
    }

    fn parse(&self, raw: &Value, coordinates: &Coordinates) -> Result<WeatherReport, WeatherError> {
        let name = raw
            .get("scenario")
            .and_then(Value::as_str)
            .ok_or_else(|| WeatherError::Parse("mock payload has no scenario".to_string()))?;
        let scenario: Scenario = name.parse()?;
        let row = scenario
            .conditions()
            .ok_or_else(|| WeatherError::Parse(format!("mock payload names unresolved scenario '{name}'")))?;

        let (temperature, temperature_min, temperature_max) = self
            .overrides
            .temperature
            .unwrap_or((row.temperature, row.temperature_min, row.temperature_max));
        let (precipitation, precipitation_min, precipitation_max) = self.overrides.precipitation.unwrap_or((
            row.precipitation,
            row.precipitation_min,
            row.precipitation_max,
        ));

        let latitude = coordinates.latitude();
        Ok(WeatherReport {
            temperature,
            temperature_min,
            temperature_max,
            precipitation,
            precipitation_min,
            precipitation_max,
            sunrise: shifted_time(SUNRISE_BASE, latitude),
            sunset: shifted_time(SUNSET_BASE, latitude),
        })
    }
}

impl Forecaster<MockSource> {
    pub fn new(
        latitude: f64,
        longitude: f64,
        cache_duration_secs: u64,
        scenario: Scenario,
    ) -> Result<Self, WeatherError> {
        let coordinates = Coordinates::new(latitude, longitude)?;
        info!(%scenario, "mock weather provider initialized");
        Ok(Self::with_source(
            coordinates,
            cache_duration_secs,
            MockSource::new(scenario),
        ))
    }

    pub fn scenario(&self) -> Scenario {
        self.source.scenario
    }

    pub fn set_scenario(&mut self, scenario: Scenario) {
        self.source.scenario = scenario;
        self.invalidate();
        info!(%scenario, "weather scenario changed");
    }

    /// Pin temperatures (°F) regardless of scenario.
    pub fn set_temperature(&mut self, current: f64, min: f64, max: f64) {
        self.source.overrides.temperature = Some((current, min, max));
        self.invalidate();
        info!(current, min, max, "custom temperature set");
    }

    /// Pin precipitation chances; values above 100 are clamped.
    pub fn set_precipitation(&mut self, current: u8, min: u8, max: u8) {
        let clamp = |v: u8| v.min(100);
        self.source.overrides.precipitation = Some((clamp(current), clamp(min), clamp(max)));
        self.invalidate();
        info!(current, min, max, "custom precipitation set");
    }

    pub fn clear_overrides(&mut self) {
        self.source.overrides = Overrides::default();
        self.invalidate();
    }

    pub fn last_pick(&self) -> Option<Scenario> {
        self.source.last_pick
    }
}
