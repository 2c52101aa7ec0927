use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// Normalized forecast fields shared by every provider.
///
/// Temperatures are °F, precipitation values are percent chance (0–100).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub temperature: f64,
    pub temperature_min: f64,
    pub temperature_max: f64,
    pub precipitation: u8,
    pub precipitation_min: u8,
    pub precipitation_max: u8,
    #[serde(with = "hhmm")]
    pub sunrise: NaiveTime,
    #[serde(with = "hhmm")]
    pub sunset: NaiveTime,
}

impl WeatherReport {
    pub fn sunrise_hhmm(&self) -> String {
        self.sunrise.format(hhmm::FORMAT).to_string()
    }

    pub fn sunset_hhmm(&self) -> String {
        self.sunset.format(hhmm::FORMAT).to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeatherStatus {
    Ok,
    Cached,
    Error,
}

impl WeatherStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeatherStatus::Ok => "ok",
            WeatherStatus::Cached => "cached",
            WeatherStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for WeatherStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Result of a weather query, as handed to the display layer.
///
/// Serializes to one flat object tagged by `status`; report fields are only
/// present for `ok`/`cached`, `error_message` only for `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum WeatherData {
    Ok(WeatherReport),
    Cached(WeatherReport),
    Error { error_message: String },
}

impl WeatherData {
    pub fn error(message: impl Into<String>) -> Self {
        WeatherData::Error {
            error_message: message.into(),
        }
    }

    pub fn status(&self) -> WeatherStatus {
        match self {
            WeatherData::Ok(_) => WeatherStatus::Ok,
            WeatherData::Cached(_) => WeatherStatus::Cached,
            WeatherData::Error { .. } => WeatherStatus::Error,
        }
    }

    pub fn report(&self) -> Option<&WeatherReport> {
        match self {
            WeatherData::Ok(report) | WeatherData::Cached(report) => Some(report),
            WeatherData::Error { .. } => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            WeatherData::Error { error_message } => Some(error_message),
            _ => None,
        }
    }
}

/// `HH:MM` (24h) serde representation for `NaiveTime`.
pub(crate) mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%H:%M";

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&time.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let s = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&s, FORMAT).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn report() -> WeatherReport {
        WeatherReport {
            temperature: 72.0,
            temperature_min: 65.0,
            temperature_max: 78.0,
            precipitation: 5,
            precipitation_min: 0,
            precipitation_max: 10,
            sunrise: NaiveTime::from_hms_opt(6, 34, 0).unwrap(),
            sunset: NaiveTime::from_hms_opt(18, 49, 0).unwrap(),
        }
    }

    #[test]
    fn ok_serializes_flat_with_status() {
        let value = serde_json::to_value(WeatherData::Ok(report())).unwrap();
        assert_eq!(
            value,
            json!({
                "status": "ok",
                "temperature": 72.0,
                "temperature_min": 65.0,
                "temperature_max": 78.0,
                "precipitation": 5,
                "precipitation_min": 0,
                "precipitation_max": 10,
                "sunrise": "06:34",
                "sunset": "18:49",
            })
        );
    }

    #[test]
    fn error_omits_report_fields() {
        let value = serde_json::to_value(WeatherData::error("HTTP 503")).unwrap();
        assert_eq!(value, json!({"status": "error", "error_message": "HTTP 503"}));
    }

    #[test]
    fn cached_parses_back() {
        let text = r#"{"status":"cached","temperature":58.0,"temperature_min":55.0,
            "temperature_max":62.0,"precipitation":75,"precipitation_min":60,
            "precipitation_max":85,"sunrise":"06:30","sunset":"18:45"}"#;
        let data: WeatherData = serde_json::from_str(text).unwrap();
        assert_eq!(data.status(), WeatherStatus::Cached);
        let r = data.report().expect("cached carries a report");
        assert_eq!(r.precipitation, 75);
        assert_eq!(r.sunset_hhmm(), "18:45");
        assert!(data.error_message().is_none());
    }

    #[test]
    fn rejects_malformed_time() {
        let text = r#"{"status":"ok","temperature":1.0,"temperature_min":1.0,
            "temperature_max":1.0,"precipitation":0,"precipitation_min":0,
            "precipitation_max":0,"sunrise":"25:00","sunset":"18:45"}"#;
        assert!(serde_json::from_str::<WeatherData>(text).is_err());
    }
}
