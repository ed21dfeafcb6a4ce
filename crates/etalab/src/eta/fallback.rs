//! Local delivery estimate used when the prediction service is unavailable.
//!
//! `eta = (prep + 8 min/km) × adjustments`, never below five minutes.

use chrono::{DateTime, Utc};
use tracing::debug;

use super::{
    is_rush_hour, is_weekend, round_minutes, PredictionRequest, PredictionResponse, Predictor,
    TrafficLevel, Weather,
};

/// Name reported in `model_used`.
pub const MODEL_NAME: &str = "Local Fallback";

/// Minutes per kilometre before adjustments.
pub const MINUTES_PER_KM: f64 = 8.0;

/// Shortest estimate ever returned.
pub const MIN_ETA_MINUTES: u32 = 5;

const RUSH_HOUR_FACTOR: f64 = 1.3;
const RAIN_FACTOR: f64 = 1.2;
const HEAVY_TRAFFIC_FACTOR: f64 = 1.25;
const WEEKEND_FACTOR: f64 = 1.1;

const LONG_DISTANCE_KM: f64 = 3.5;
const LONG_PREP_MIN: u32 = 20;

/// Risk factor labels.
pub mod risk {
    /// Distance above 3.5 km.
    pub const LONG_DISTANCE: &str = "Long distance (>3.5km)";
    /// Traffic level 3.
    pub const HEAVY_TRAFFIC: &str = "Heavy traffic";
    /// Rain.
    pub const BAD_WEATHER: &str = "Adverse weather";
    /// Lunch or dinner peak.
    pub const RUSH_HOUR: &str = "Rush hour";
    /// Preparation above 20 minutes.
    pub const LONG_PREPARATION: &str = "Long preparation time";
}

/// Estimate a delivery locally.
#[must_use]
pub fn predict(request: &PredictionRequest, now: DateTime<Utc>) -> PredictionResponse {
    let rush_hour = is_rush_hour(request.hour_of_day);
    let rainy = request.weather == Weather::Rainy;
    let heavy_traffic = request.traffic_level == TrafficLevel::Heavy;

    let mut eta = f64::from(request.preparation_time_min) + request.distance_km * MINUTES_PER_KM;
    if rush_hour {
        eta *= RUSH_HOUR_FACTOR;
    }
    if rainy {
        eta *= RAIN_FACTOR;
    }
    if heavy_traffic {
        eta *= HEAVY_TRAFFIC_FACTOR;
    }
    if is_weekend(request.day_of_week) {
        eta *= WEEKEND_FACTOR;
    }

    let mut risk_factors = Vec::new();
    if request.distance_km > LONG_DISTANCE_KM {
        risk_factors.push(risk::LONG_DISTANCE.to_string());
    }
    if heavy_traffic {
        risk_factors.push(risk::HEAVY_TRAFFIC.to_string());
    }
    if rainy {
        risk_factors.push(risk::BAD_WEATHER.to_string());
    }
    if rush_hour {
        risk_factors.push(risk::RUSH_HOUR.to_string());
    }
    if request.preparation_time_min > LONG_PREP_MIN {
        risk_factors.push(risk::LONG_PREPARATION.to_string());
    }

    let penalty = 10 * u32::try_from(risk_factors.len()).unwrap_or(u32::MAX / 10);
    let confidence = 95u32.saturating_sub(penalty).max(60);

    PredictionResponse {
        eta_minutes: round_minutes(eta).max(MIN_ETA_MINUTES),
        confidence,
        risk_factors,
        model_used: MODEL_NAME.to_string(),
        timestamp: now.to_rfc3339(),
    }
}

/// [`Predictor`] that only ever uses the local formula.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackPredictor;

#[async_trait::async_trait]
impl Predictor for FallbackPredictor {
    fn name(&self) -> &'static str {
        "fallback"
    }

    async fn predict(&self, request: &PredictionRequest) -> PredictionResponse {
        let response = predict(request, Utc::now());
        debug!(eta = response.eta_minutes, "Local fallback estimate");
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        "2024-03-13T10:00:00Z".parse().unwrap()
    }

    fn calm_request(distance_km: f64, preparation_time_min: u32) -> PredictionRequest {
        PredictionRequest {
            distance_km,
            day_of_week: 3,
            hour_of_day: 10,
            weather: Weather::Sunny,
            traffic_level: TrafficLevel::Light,
            preparation_time_min,
        }
    }

    #[test]
    fn test_calm_conditions() {
        let response = predict(&calm_request(2.0, 15), now());
        assert_eq!(response.eta_minutes, 31);
        assert_eq!(response.confidence, 95);
        assert!(response.risk_factors.is_empty());
        assert_eq!(response.model_used, "Local Fallback");
        assert_eq!(response.timestamp, now().to_rfc3339());
    }

    #[test]
    fn test_all_adjustments() {
        let request = PredictionRequest {
            distance_km: 4.0,
            day_of_week: 6,
            hour_of_day: 19,
            weather: Weather::Rainy,
            traffic_level: TrafficLevel::Heavy,
            preparation_time_min: 25,
        };
        let response = predict(&request, now());

        // (25 + 32) × 1.3 × 1.2 × 1.25 × 1.1 = 122.265
        assert_eq!(response.eta_minutes, 122);
        assert_eq!(
            response.risk_factors,
            vec![
                risk::LONG_DISTANCE,
                risk::HEAVY_TRAFFIC,
                risk::BAD_WEATHER,
                risk::RUSH_HOUR,
                risk::LONG_PREPARATION,
            ]
        );
        assert_eq!(response.confidence, 60);
    }

    #[test]
    fn test_confidence_drops_per_risk() {
        let mut request = calm_request(1.0, 10);
        request.weather = Weather::Rainy;
        assert_eq!(predict(&request, now()).confidence, 85);

        request.hour_of_day = 13;
        assert_eq!(predict(&request, now()).confidence, 75);
    }

    #[test]
    fn test_moderate_traffic_not_penalized() {
        let mut request = calm_request(1.0, 10);
        request.traffic_level = TrafficLevel::Moderate;
        let response = predict(&request, now());
        assert_eq!(response.eta_minutes, 18);
        assert!(response.risk_factors.is_empty());
    }

    #[test]
    fn test_floor_of_five_minutes() {
        let response = predict(&calm_request(0.0, 0), now());
        assert_eq!(response.eta_minutes, MIN_ETA_MINUTES);
    }

    #[test]
    fn test_thresholds_are_exclusive() {
        let response = predict(&calm_request(3.5, 20), now());
        assert!(response.risk_factors.is_empty());
    }

    #[tokio::test]
    async fn test_fallback_predictor() {
        let predictor = FallbackPredictor;
        assert_eq!(predictor.name(), "fallback");
        let response = Predictor::predict(&predictor, &calm_request(2.0, 15)).await;
        assert_eq!(response.eta_minutes, 31);
    }

    fn arb_conditions() -> impl Strategy<Value = (u32, u32, Weather, TrafficLevel)> {
        (
            0u32..7,
            0u32..24,
            prop::sample::select(vec![Weather::Sunny, Weather::Cloudy, Weather::Rainy]),
            prop::sample::select(vec![
                TrafficLevel::Light,
                TrafficLevel::Moderate,
                TrafficLevel::Heavy,
            ]),
        )
    }

    proptest! {
        #[test]
        fn test_monotonic_in_distance(
            (day, hour, weather, traffic) in arb_conditions(),
            prep in 0u32..90,
            d1 in 0.0f64..30.0,
            extra in 0.0f64..30.0,
        ) {
            let base = PredictionRequest {
                distance_km: d1,
                day_of_week: day,
                hour_of_day: hour,
                weather,
                traffic_level: traffic,
                preparation_time_min: prep,
            };
            let farther = PredictionRequest { distance_km: d1 + extra, ..base.clone() };
            prop_assert!(predict(&base, now()).eta_minutes <= predict(&farther, now()).eta_minutes);
        }

        #[test]
        fn test_monotonic_in_preparation(
            (day, hour, weather, traffic) in arb_conditions(),
            distance in 0.0f64..30.0,
            p1 in 0u32..90,
            extra in 0u32..90,
        ) {
            let base = PredictionRequest {
                distance_km: distance,
                day_of_week: day,
                hour_of_day: hour,
                weather,
                traffic_level: traffic,
                preparation_time_min: p1,
            };
            let slower = PredictionRequest { preparation_time_min: p1 + extra, ..base.clone() };
            prop_assert!(predict(&base, now()).eta_minutes <= predict(&slower, now()).eta_minutes);
        }

        #[test]
        fn test_confidence_bounds(
            (day, hour, weather, traffic) in arb_conditions(),
            distance in 0.0f64..30.0,
            prep in 0u32..90,
        ) {
            let request = PredictionRequest {
                distance_km: distance,
                day_of_week: day,
                hour_of_day: hour,
                weather,
                traffic_level: traffic,
                preparation_time_min: prep,
            };
            let response = predict(&request, now());
            prop_assert!((60..=95).contains(&response.confidence));
            prop_assert!(response.eta_minutes >= MIN_ETA_MINUTES);
        }
    }
}
