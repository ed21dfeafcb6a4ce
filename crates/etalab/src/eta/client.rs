//! Client for the remote ETA prediction service.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{fallback, PredictionRequest, PredictionResponse, Predictor};
use crate::config::PredictionConfig;
use crate::error::Result;
use crate::remote::ServiceClient;

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `healthy` or `unhealthy`.
    pub status: String,
    /// Whether a trained model is loaded.
    #[serde(default)]
    pub model_loaded: bool,
    /// Free-form status text.
    #[serde(default)]
    pub message: String,
}

/// Body of `GET /metrics`: quality of the loaded model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    /// Share of predictions within tolerance.
    pub accuracy: f64,
    /// Mean absolute error in minutes.
    pub mae: f64,
    /// Root mean squared error in minutes.
    pub rmse: f64,
    /// Coefficient of determination.
    pub r2_score: f64,
    /// Percentage of deliveries that arrived after the prediction.
    pub late_percentage: f64,
    /// Predictions evaluated.
    pub total_predictions: u64,
    /// Model identifier.
    pub model_name: String,
}

/// Prediction client with a silent local fallback.
#[derive(Debug)]
pub struct EtaClient {
    service: ServiceClient,
    offline: bool,
    online: AtomicBool,
}

impl EtaClient {
    /// Create a client from the `[prediction]` configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid.
    pub fn from_config(config: &PredictionConfig) -> Result<Self> {
        let service = ServiceClient::new(
            &config.base_url,
            Duration::from_millis(config.request_timeout_ms),
            Duration::from_millis(config.health_timeout_ms),
        )?;
        Ok(Self {
            service,
            offline: config.offline,
            online: AtomicBool::new(false),
        })
    }

    /// Create a client for `base_url` with default timeouts.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid.
    pub fn new(base_url: &str) -> Result<Self> {
        Self::from_config(&PredictionConfig {
            base_url: base_url.to_string(),
            ..PredictionConfig::default()
        })
    }

    /// Whether the client skips the service entirely.
    #[must_use]
    pub fn is_offline(&self) -> bool {
        self.offline
    }

    /// Result of the most recent health probe.
    #[must_use]
    pub fn is_server_online(&self) -> bool {
        self.online.load(Ordering::Relaxed)
    }

    /// Probe the service and remember the answer.
    pub async fn check_health(&self) -> bool {
        let online = self.service.check_health().await;
        self.online.store(online, Ordering::Relaxed);
        online
    }

    /// Fetch the service's own health report.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn health(&self) -> Result<HealthResponse> {
        self.service.get_json("health").await
    }

    /// Fetch quality metrics of the loaded model.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or no model is loaded.
    pub async fn model_metrics(&self) -> Result<ModelMetrics> {
        self.service.get_json("metrics").await
    }

    /// Ask the service for a prediction, without any fallback.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-2xx answer, carrying
    /// the service's `detail` text.
    pub async fn predict_remote(&self, request: &PredictionRequest) -> Result<PredictionResponse> {
        self.service.post_json("predict", Some(request)).await
    }

    /// Predict via the service, falling back to the local formula when it
    /// is offline, unhealthy or answers with an error.
    pub async fn predict_at(&self, request: &PredictionRequest, now: DateTime<Utc>) -> PredictionResponse {
        if self.offline {
            debug!("Offline mode, using local estimate");
            return fallback::predict(request, now);
        }

        if !self.check_health().await {
            warn!(
                base_url = %self.service.base_url(),
                "Prediction service unavailable, using local estimate"
            );
            return fallback::predict(request, now);
        }

        match self.predict_remote(request).await {
            Ok(response) => {
                info!(eta = response.eta_minutes, model = %response.model_used, "Remote prediction");
                response
            }
            Err(err) => {
                warn!(error = %err, "Prediction failed, using local estimate");
                fallback::predict(request, now)
            }
        }
    }
}

#[async_trait::async_trait]
impl Predictor for EtaClient {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn predict(&self, request: &PredictionRequest) -> PredictionResponse {
        self.predict_at(request, Utc::now()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{json, Value};

    use crate::error::Error;
    use crate::eta::{TrafficLevel, Weather};
    use crate::remote::testing::{dead_address, serve};

    fn request() -> PredictionRequest {
        PredictionRequest {
            distance_km: 2.0,
            day_of_week: 3,
            hour_of_day: 10,
            weather: Weather::Sunny,
            traffic_level: TrafficLevel::Light,
            preparation_time_min: 15,
        }
    }

    async fn predict_handler(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
        if body["day_of_week"].as_u64() > Some(6) {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"detail": "day_of_week must be 0-6"})),
            );
        }
        (
            StatusCode::OK,
            Json(json!({
                "eta_minutes": 27,
                "confidence": 88,
                "risk_factors": [],
                "model_used": "RandomForest",
                "timestamp": "2024-03-13T10:00:00"
            })),
        )
    }

    async fn healthy_server() -> String {
        let app = Router::new()
            .route(
                "/health",
                get(|| async {
                    Json(json!({"status": "healthy", "model_loaded": true, "message": "ok"}))
                }),
            )
            .route("/predict", post(predict_handler))
            .route(
                "/metrics",
                get(|| async {
                    Json(json!({
                        "accuracy": 0.82, "mae": 4.1, "rmse": 5.3, "r2_score": 0.77,
                        "late_percentage": 12.5, "total_predictions": 400,
                        "model_name": "RandomForest"
                    }))
                }),
            );
        serve(app).await
    }

    #[tokio::test]
    async fn test_remote_prediction() {
        let client = EtaClient::new(&healthy_server().await).unwrap();
        let response = Predictor::predict(&client, &request()).await;

        assert_eq!(response.eta_minutes, 27);
        assert_eq!(response.model_used, "RandomForest");
        assert!(client.is_server_online());
    }

    #[tokio::test]
    async fn test_health_and_metrics() {
        let client = EtaClient::new(&healthy_server().await).unwrap();
        let health = client.health().await.unwrap();
        assert_eq!(health.status, "healthy");
        assert!(health.model_loaded);

        let metrics = client.model_metrics().await.unwrap();
        assert_eq!(metrics.total_predictions, 400);
        assert!((metrics.mae - 4.1).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_remote_error_detail_then_fallback() {
        let client = EtaClient::new(&healthy_server().await).unwrap();
        let mut bad = request();
        bad.day_of_week = 9;

        let err = client.predict_remote(&bad).await.unwrap_err();
        assert!(matches!(err, Error::Api { status: 400, ref detail } if detail == "day_of_week must be 0-6"));

        let response = Predictor::predict(&client, &bad).await;
        assert_eq!(response.model_used, fallback::MODEL_NAME);
    }

    #[tokio::test]
    async fn test_unreachable_server_falls_back() {
        let client = EtaClient::new(&dead_address().await).unwrap();
        let response = Predictor::predict(&client, &request()).await;

        assert_eq!(response.model_used, fallback::MODEL_NAME);
        assert_eq!(response.eta_minutes, 31);
        assert!(!client.is_server_online());
    }

    #[tokio::test]
    async fn test_offline_never_calls_service() {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route(
                "/health",
                get(|State(hits): State<Arc<AtomicUsize>>| async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    "ok"
                }),
            )
            .with_state(Arc::clone(&hits));

        let client = EtaClient::from_config(&PredictionConfig {
            base_url: serve(app).await,
            offline: true,
            ..PredictionConfig::default()
        })
        .unwrap();
        assert!(client.is_offline());

        let response = Predictor::predict(&client, &request()).await;
        assert_eq!(response.model_used, fallback::MODEL_NAME);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_garbled_answer_falls_back() {
        let app = Router::new()
            .route("/health", get(|| async { "ok" }))
            .route("/predict", post(|| async { Json(json!({"eta": "soon"})) }));
        let client = EtaClient::new(&serve(app).await).unwrap();

        let response = Predictor::predict(&client, &request()).await;
        assert_eq!(response.model_used, fallback::MODEL_NAME);
    }
}
