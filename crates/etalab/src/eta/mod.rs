//! Delivery time prediction.
//!
//! Predictions come from a remote ML service when it is reachable and from
//! a fixed local formula otherwise. Both sides speak the same request and
//! response shapes.

pub mod client;
pub mod fallback;
pub mod heuristic;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};

pub use client::{EtaClient, HealthResponse, ModelMetrics};
pub use fallback::FallbackPredictor;

/// Weather at order time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weather {
    /// Clear sky.
    #[default]
    Sunny,
    /// Overcast.
    Cloudy,
    /// Raining; slows deliveries down.
    Rainy,
}

impl fmt::Display for Weather {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sunny => write!(f, "sunny"),
            Self::Cloudy => write!(f, "cloudy"),
            Self::Rainy => write!(f, "rainy"),
        }
    }
}

impl FromStr for Weather {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sunny" => Ok(Self::Sunny),
            "cloudy" => Ok(Self::Cloudy),
            "rainy" => Ok(Self::Rainy),
            other => Err(format!("unknown weather: {other}")),
        }
    }
}

/// Road traffic on a 1 to 3 scale. Serialized as the bare number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum TrafficLevel {
    /// Free-flowing.
    #[default]
    Light = 1,
    /// Some congestion.
    Moderate = 2,
    /// Heavy congestion.
    Heavy = 3,
}

impl TrafficLevel {
    /// Typical traffic for an hour of the day: heavy in the evening peak
    /// (18-20), moderate at lunch (12-14), light otherwise.
    #[must_use]
    pub fn for_hour(hour: u32) -> Self {
        match hour {
            18..=20 => Self::Heavy,
            12..=14 => Self::Moderate,
            _ => Self::Light,
        }
    }
}

impl From<TrafficLevel> for u8 {
    fn from(level: TrafficLevel) -> Self {
        level as u8
    }
}

impl TryFrom<u8> for TrafficLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Light),
            2 => Ok(Self::Moderate),
            3 => Ok(Self::Heavy),
            other => Err(format!("traffic level must be 1-3, got {other}")),
        }
    }
}

impl fmt::Display for TrafficLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", u8::from(*self))
    }
}

/// See [`TrafficLevel::for_hour`].
#[must_use]
pub fn traffic_for_hour(hour: u32) -> TrafficLevel {
    TrafficLevel::for_hour(hour)
}

/// Lunch (12-14) and dinner (18-20) peaks, inclusive.
#[must_use]
pub fn is_rush_hour(hour: u32) -> bool {
    matches!(hour, 12..=14 | 18..=20)
}

/// Day 0 is Sunday, day 6 Saturday.
#[must_use]
pub fn is_weekend(day_of_week: u32) -> bool {
    matches!(day_of_week, 0 | 6)
}

/// Round to whole minutes, half away from zero, clamped to `u32`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(crate) fn round_minutes(minutes: f64) -> u32 {
    minutes.round().clamp(0.0, f64::from(u32::MAX)) as u32
}

/// Features sent to the prediction service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRequest {
    /// Restaurant to customer distance.
    pub distance_km: f64,
    /// 0 = Sunday .. 6 = Saturday.
    pub day_of_week: u32,
    /// 0-23.
    pub hour_of_day: u32,
    /// Current weather.
    pub weather: Weather,
    /// Current traffic.
    pub traffic_level: TrafficLevel,
    /// Kitchen time for the whole order.
    pub preparation_time_min: u32,
}

impl PredictionRequest {
    /// Build a request whose day, hour and traffic are taken from `at`.
    #[must_use]
    pub fn at(at: DateTime<Utc>, distance_km: f64, preparation_time_min: u32, weather: Weather) -> Self {
        let hour_of_day = at.hour();
        Self {
            distance_km,
            day_of_week: at.weekday().num_days_from_sunday(),
            hour_of_day,
            weather,
            traffic_level: TrafficLevel::for_hour(hour_of_day),
            preparation_time_min,
        }
    }
}

/// A delivery time estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    /// Predicted minutes until delivery.
    pub eta_minutes: u32,
    /// Confidence score, 0-100.
    pub confidence: u32,
    /// Human-readable conditions that make the estimate less reliable.
    pub risk_factors: Vec<String>,
    /// Which model produced the estimate.
    pub model_used: String,
    /// When the estimate was made.
    pub timestamp: String,
}

/// Something that turns features into a delivery estimate.
#[async_trait::async_trait]
pub trait Predictor: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Estimate the delivery time. Implementations never fail; they degrade
    /// to the local formula instead.
    async fn predict(&self, request: &PredictionRequest) -> PredictionResponse;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_traffic_for_hour() {
        assert_eq!(traffic_for_hour(8), TrafficLevel::Light);
        assert_eq!(traffic_for_hour(12), TrafficLevel::Moderate);
        assert_eq!(traffic_for_hour(14), TrafficLevel::Moderate);
        assert_eq!(traffic_for_hour(15), TrafficLevel::Light);
        assert_eq!(traffic_for_hour(18), TrafficLevel::Heavy);
        assert_eq!(traffic_for_hour(20), TrafficLevel::Heavy);
        assert_eq!(traffic_for_hour(21), TrafficLevel::Light);
    }

    #[test]
    fn test_rush_hour_and_weekend() {
        assert!(is_rush_hour(12));
        assert!(is_rush_hour(20));
        assert!(!is_rush_hour(11));
        assert!(!is_rush_hour(17));
        assert!(is_weekend(0));
        assert!(is_weekend(6));
        assert!(!is_weekend(3));
    }

    #[test]
    fn test_traffic_level_serializes_as_number() {
        assert_eq!(serde_json::to_string(&TrafficLevel::Heavy).unwrap(), "3");
        let level: TrafficLevel = serde_json::from_str("2").unwrap();
        assert_eq!(level, TrafficLevel::Moderate);
        assert!(serde_json::from_str::<TrafficLevel>("4").is_err());
    }

    #[test]
    fn test_weather_roundtrip() {
        assert_eq!(serde_json::to_string(&Weather::Rainy).unwrap(), "\"rainy\"");
        assert_eq!("cloudy".parse::<Weather>(), Ok(Weather::Cloudy));
        assert!("snowy".parse::<Weather>().is_err());
    }

    #[test]
    fn test_request_wire_format() {
        let request = PredictionRequest {
            distance_km: 2.5,
            day_of_week: 5,
            hour_of_day: 19,
            weather: Weather::Rainy,
            traffic_level: TrafficLevel::Heavy,
            preparation_time_min: 30,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "distance_km": 2.5,
                "day_of_week": 5,
                "hour_of_day": 19,
                "weather": "rainy",
                "traffic_level": 3,
                "preparation_time_min": 30
            })
        );
    }

    #[test]
    fn test_request_at_derives_time_features() {
        // Saturday evening.
        let at: DateTime<Utc> = "2024-03-09T19:15:00Z".parse().unwrap();
        let request = PredictionRequest::at(at, 1.2, 20, Weather::Sunny);
        assert_eq!(request.day_of_week, 6);
        assert_eq!(request.hour_of_day, 19);
        assert_eq!(request.traffic_level, TrafficLevel::Heavy);
    }
}
