use reqwest::StatusCode;

/// Which axis of a coordinate pair a validation error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Latitude,
    Longitude,
}

impl Axis {
    pub fn as_str(&self) -> &'static str {
        match self {
            Axis::Latitude => "latitude",
            Axis::Longitude => "longitude",
        }
    }

    /// Inclusive valid range for this axis.
    pub fn bounds(&self) -> (f64, f64) {
        match self {
            Axis::Latitude => (-90.0, 90.0),
            Axis::Longitude => (-180.0, 180.0),
        }
    }
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Invalid coordinate input. Always surfaced to the caller.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoordinateError {
    #[error("{axis} must be a finite number, got '{value}'")]
    NotNumeric { axis: Axis, value: String },

    #[error("{axis} {value} is outside the valid range [{min}, {max}]")]
    OutOfRange {
        axis: Axis,
        value: f64,
        min: f64,
        max: f64,
    },
}

/// Failure of a single GET performed by the retry client.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP {status}: failed to retrieve data from {url}")]
    Status { status: StatusCode, url: String },

    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("response from {url} is not valid JSON: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl FetchError {
    /// HTTP status carried by the error, if the server answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            FetchError::Network { source, .. } => source.status(),
            _ => None,
        }
    }
}

/// Failure anywhere in a provider's fetch-then-parse pipeline.
///
/// The orchestrator turns these into `WeatherData::Error`; they never escape
/// `get_current_weather`.
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("location lookup failed: {0}")]
    Resolve(String),

    #[error("forecast fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("malformed forecast payload: {0}")]
    Parse(String),

    #[error(transparent)]
    Coordinates(#[from] CoordinateError),

    #[error("unknown scenario '{0}'; expected one of: sunny, rainy, cloudy, stormy, extreme_heat, extreme_cold, random")]
    Scenario(String),
}
