//! Weather core for the clock dashboard.
//!
//! This crate defines:
//! - Coordinate validation
//! - A retrying JSON-over-HTTP client
//! - Weather providers (weather.gov and an offline mock) behind one trait
//! - A single-entry TTL cache in front of every provider
//! - Configuration persisted as TOML
//!
//! The display layer only needs [`WeatherProvider::get_current_weather`]; it
//! never sees transport or parsing errors, just a [`WeatherData::Error`].

pub mod cache;
pub mod config;
pub mod coordinates;
pub mod error;
pub mod http;
pub mod model;
pub mod provider;

pub use cache::{CacheState, Clock, ManualClock, SystemClock};
pub use config::{Config, MockConfig, NwsConfig};
pub use coordinates::Coordinates;
pub use error::{Axis, CoordinateError, FetchError, WeatherError};
pub use http::{RetryClient, RetryPolicy};
pub use model::{WeatherData, WeatherReport, WeatherStatus};
pub use provider::{
    ForecastSource, Forecaster, ProviderId, WeatherProvider,
    mock::{MockProvider, Scenario},
    nws::{GridHandle, NwsProvider, NwsSettings},
    provider_from_config,
};
