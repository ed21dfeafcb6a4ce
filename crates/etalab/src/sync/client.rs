//! Client for the training endpoints of the ML service.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{RetrainResponse, SyncStatus, TrainingPayload, TrainingStatus, UploadResponse};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::orders::OrderRepository;
use crate::remote::ServiceClient;

/// Result of an upload followed by a retrain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoSyncReport {
    /// Upload outcome.
    pub upload: UploadResponse,
    /// Retrain outcome; absent when the upload did not succeed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrain: Option<RetrainResponse>,
}

/// Uploads local training data and triggers retraining.
#[derive(Debug, Clone)]
pub struct SyncClient {
    service: ServiceClient,
    retrain_delay: Duration,
}

impl SyncClient {
    /// Create a client from the `[sync]` section, reusing the prediction
    /// timeouts.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid.
    pub fn from_config(config: &Config) -> Result<Self> {
        let service = ServiceClient::new(
            &config.sync.base_url,
            config.prediction_timeout(),
            config.health_timeout(),
        )?;
        Ok(Self {
            service,
            retrain_delay: config.retrain_delay(),
        })
    }

    /// Create a client for `base_url` with default settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid.
    pub fn new(base_url: &str) -> Result<Self> {
        let mut config = Config::default();
        config.sync.base_url = base_url.to_string();
        Self::from_config(&config)
    }

    /// Set the pause between upload and retrain in [`auto_sync`](Self::auto_sync).
    #[must_use]
    pub fn with_retrain_delay(mut self, delay: Duration) -> Self {
        self.retrain_delay = delay;
        self
    }

    /// Whether the service answers its health probe.
    pub async fn check_health(&self) -> bool {
        self.service.check_health().await
    }

    /// What the server holds so far.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn training_status(&self) -> Result<TrainingStatus> {
        self.service.get_json("training/status").await
    }

    /// Upload `payload` as is.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn upload(&self, payload: &TrainingPayload) -> Result<UploadResponse> {
        info!(
            orders = payload.orders.len(),
            ml_logs = payload.ml_logs.len(),
            "Uploading training data"
        );
        self.service
            .post_json("training/upload", Some(payload))
            .await
    }

    /// Upload every valid delivered order and training log in `repo`,
    /// optionally for one restaurant.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ServiceUnavailable`] when the health probe fails,
    /// [`Error::NoTrainingData`] when nothing qualifies, or an error if the
    /// upload is refused.
    pub async fn upload_training_data(
        &self,
        repo: &OrderRepository,
        restaurant_id: Option<&str>,
    ) -> Result<UploadResponse> {
        self.service.require_healthy().await?;

        let payload = TrainingPayload::collect(&repo.export()?, restaurant_id);
        if payload.is_empty() {
            return Err(Error::NoTrainingData);
        }
        self.upload(&payload).await
    }

    /// Ask the server to retrain on everything uploaded so far.
    ///
    /// A server without enough data answers with an error status rather
    /// than an HTTP error; that answer is returned as is.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn trigger_retrain(&self) -> Result<RetrainResponse> {
        let response: RetrainResponse = self
            .service
            .post_json::<(), _>("training/retrain", None)
            .await?;
        if response.status == SyncStatus::Success {
            info!(accuracy = ?response.new_accuracy, samples = ?response.training_samples, "Model retrained");
        } else {
            warn!(message = %response.message, "Retrain refused");
        }
        Ok(response)
    }

    /// Upload everything, wait the retrain delay, then retrain.
    ///
    /// # Errors
    ///
    /// Returns an error if the upload or the retrain request fails.
    pub async fn auto_sync(&self, repo: &OrderRepository) -> Result<AutoSyncReport> {
        let upload = self.upload_training_data(repo, None).await?;
        if upload.status != SyncStatus::Success {
            warn!(message = %upload.message, "Upload not accepted, skipping retrain");
            return Ok(AutoSyncReport {
                upload,
                retrain: None,
            });
        }

        tokio::time::sleep(self.retrain_delay).await;
        let retrain = self.trigger_retrain().await?;
        Ok(AutoSyncReport {
            upload,
            retrain: Some(retrain),
        })
    }
}
