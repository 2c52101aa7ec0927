//! Validated latitude/longitude pair.

use serde::{Deserialize, Serialize};

use crate::error::{Axis, CoordinateError};

/// A coordinate pair that is always within range.
///
/// Fields are private; the only ways to obtain one go through validation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinates")]
pub struct Coordinates {
    latitude: f64,
    longitude: f64,
}

#[derive(Deserialize)]
struct RawCoordinates {
    latitude: f64,
    longitude: f64,
}

impl TryFrom<RawCoordinates> for Coordinates {
    type Error = CoordinateError;

    fn try_from(raw: RawCoordinates) -> Result<Self, Self::Error> {
        Coordinates::new(raw.latitude, raw.longitude)
    }
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, CoordinateError> {
        Ok(Self {
            latitude: validate(Axis::Latitude, latitude)?,
            longitude: validate(Axis::Longitude, longitude)?,
        })
    }

    /// Parse coordinates supplied as text (config files, CLI flags).
    pub fn parse(latitude: &str, longitude: &str) -> Result<Self, CoordinateError> {
        Ok(Self {
            latitude: parse_axis(Axis::Latitude, latitude)?,
            longitude: parse_axis(Axis::Longitude, longitude)?,
        })
    }

    /// Parse a single `"lat,lon"` string.
    pub fn parse_pair(pair: &str) -> Result<Self, CoordinateError> {
        let (lat, lon) = pair.split_once(',').ok_or_else(|| CoordinateError::NotNumeric {
            axis: Axis::Longitude,
            value: pair.to_string(),
        })?;
        Self::parse(lat, lon)
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Returns a copy with a new latitude, leaving `self` untouched on error.
    pub fn with_latitude(&self, latitude: f64) -> Result<Self, CoordinateError> {
        Ok(Self {
            latitude: validate(Axis::Latitude, latitude)?,
            longitude: self.longitude,
        })
    }

    pub fn with_longitude(&self, longitude: f64) -> Result<Self, CoordinateError> {
        Ok(Self {
            latitude: self.latitude,
            longitude: validate(Axis::Longitude, longitude)?,
        })
    }
}

impl std::fmt::Display for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.latitude, self.longitude)
    }
}

fn validate(axis: Axis, value: f64) -> Result<f64, CoordinateError> {
    if !value.is_finite() {
        return Err(CoordinateError::NotNumeric {
            axis,
            value: value.to_string(),
        });
    }

    let (min, max) = axis.bounds();
    if value < min || value > max {
        return Err(CoordinateError::OutOfRange {
            axis,
            value,
            min,
            max,
        });
    }

    Ok(value)
}

fn parse_axis(axis: Axis, text: &str) -> Result<f64, CoordinateError> {
    let value: f64 = text.trim().parse().map_err(|_| CoordinateError::NotNumeric {
        axis,
        value: text.to_string(),
    })?;
    validate(axis, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_full_range_and_echoes_input() {
        for (lat, lon) in [
            (0.0, 0.0),
            (1.0, 1.0),
            (90.0, 180.0),
            (-90.0, -180.0),
            (45.0, 45.0),
            (-45.0, -45.0),
            (40.0931191, -83.017962),
        ] {
            let c = Coordinates::new(lat, lon).expect("in range");
            assert_eq!(c.latitude(), lat);
            assert_eq!(c.longitude(), lon);
        }
    }

    #[test]
    fn rejects_out_of_range() {
        let err = Coordinates::new(91.0, 0.0).unwrap_err();
        assert!(matches!(
            err,
            CoordinateError::OutOfRange {
                axis: Axis::Latitude,
                ..
            }
        ));

        let err = Coordinates::new(0.0, -180.5).unwrap_err();
        assert!(matches!(
            err,
            CoordinateError::OutOfRange {
                axis: Axis::Longitude,
                ..
            }
        ));
    }

    #[test]
    fn rejects_non_finite_as_not_numeric() {
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = Coordinates::new(bad, 0.0).unwrap_err();
            assert!(matches!(err, CoordinateError::NotNumeric { .. }));
        }
    }

    #[test]
    fn parse_text() {
        let c = Coordinates::parse("40.0931191", " -83.017962 ").expect("valid text");
        assert_eq!(c.latitude(), 40.0931191);
        assert_eq!(c.longitude(), -83.017962);

        let err = Coordinates::parse("north", "0").unwrap_err();
        assert!(matches!(
            err,
            CoordinateError::NotNumeric {
                axis: Axis::Latitude,
                ..
            }
        ));

        let err = Coordinates::parse("0", "181").unwrap_err();
        assert!(matches!(err, CoordinateError::OutOfRange { .. }));
    }

    #[test]
    fn parse_pair_requires_comma() {
        let c = Coordinates::parse_pair("40.7,-73.9").expect("valid pair");
        assert_eq!(c.latitude(), 40.7);
        assert!(Coordinates::parse_pair("40.7 -73.9").is_err());
    }

    #[test]
    fn with_latitude_keeps_previous_on_error() {
        let c = Coordinates::new(10.0, 20.0).unwrap();
        assert!(c.with_latitude(-90.1).is_err());
        assert_eq!(c.latitude(), 10.0);

        let moved = c.with_longitude(-20.0).unwrap();
        assert_eq!(moved.latitude(), 10.0);
        assert_eq!(moved.longitude(), -20.0);
    }

    #[test]
    fn deserialize_validates() {
        let ok: Coordinates =
            serde_json::from_str(r#"{"latitude": 1.5, "longitude": 2.5}"#).unwrap();
        assert_eq!(ok.latitude(), 1.5);

        let bad = serde_json::from_str::<Coordinates>(r#"{"latitude": 100, "longitude": 0}"#);
        assert!(bad.is_err());
    }
}
