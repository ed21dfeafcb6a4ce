//! Training data synchronisation with the ML service.
//!
//! Delivered orders and their training logs are uploaded in one batch; the
//! service stores them and can then be asked to retrain its model.

pub mod client;
pub mod sample;

use serde::{Deserialize, Serialize};

use crate::orders::{ExportData, MlTrainingLog, Order, OrderStatus};

pub use client::{AutoSyncReport, SyncClient};
pub use sample::{deliver_simulated, generate_sample_data, sample_orders};

/// Outcome reported by the training endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// The request did what was asked.
    Success,
    /// Anything else.
    #[serde(other)]
    Error,
}

/// Body of `GET /training/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingStatus {
    /// Upload batches stored on the server.
    pub data_files_count: u64,
    /// Orders across all batches.
    pub total_orders: u64,
    /// Training logs across all batches.
    pub total_logs: u64,
    /// Whether the server holds enough logs to retrain.
    pub ready_for_training: bool,
    /// Whether a retrained model has been produced.
    pub retrained_model_exists: bool,
}

/// Body of `POST /training/upload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Outcome.
    pub status: SyncStatus,
    /// Human-readable outcome.
    pub message: String,
    /// Orders stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orders_count: Option<u64>,
    /// Training logs stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ml_logs_count: Option<u64>,
}

/// Body of `POST /training/retrain`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrainResponse {
    /// Outcome.
    pub status: SyncStatus,
    /// Human-readable outcome.
    pub message: String,
    /// Accuracy of the new model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_accuracy: Option<f64>,
    /// Logs the new model was trained on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub training_samples: Option<u64>,
}

/// The batch sent to `POST /training/upload`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingPayload {
    /// Delivered orders with both predicted and actual minutes.
    pub orders: Vec<Order>,
    /// Logs with a delivery time, a distance and at least one item.
    pub ml_logs: Vec<MlTrainingLog>,
}

impl TrainingPayload {
    /// Select the records worth training on, optionally for one restaurant.
    #[must_use]
    pub fn collect(data: &ExportData, restaurant_id: Option<&str>) -> Self {
        let in_scope = |id: &str| restaurant_id.map_or(true, |r| r == id);

        let orders = data
            .orders
            .iter()
            .filter(|o| o.status == OrderStatus::Delivered && o.has_times())
            .filter(|o| in_scope(&o.restaurant_id))
            .cloned()
            .collect();
        let ml_logs = data
            .ml_logs
            .iter()
            .filter(|l| l.actual_delivery_min > 0 && l.distance_km > 0.0 && l.item_count > 0)
            .filter(|l| in_scope(&l.restaurant_id))
            .cloned()
            .collect();

        Self { orders, ml_logs }
    }

    /// True when there is nothing to upload.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty() && self.ml_logs.is_empty()
    }
}
