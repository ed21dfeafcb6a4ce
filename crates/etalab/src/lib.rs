//! `etalab` - delivery orders with ETA prediction and training-data sync
//!
//! This library keeps delivery orders in a local store, predicts delivery
//! times through the ML service (falling back to a local formula when it is
//! unreachable), derives training logs from completed deliveries and ships
//! them back for retraining.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod catalog;
pub mod checkout;
pub mod cli;
pub mod config;
pub mod error;
pub mod eta;
pub mod geo;
pub mod logging;
pub mod orders;
pub mod remote;
pub mod stats;
pub mod storage;
pub mod sync;

pub use catalog::{Catalog, Customer, Product, Restaurant};
pub use checkout::{place_order, OrderDraft, PlacedOrder};
pub use config::Config;
pub use error::{Error, Result};
pub use eta::{EtaClient, FallbackPredictor, PredictionRequest, PredictionResponse, Predictor};
pub use geo::{haversine_km, GeoPoint};
pub use logging::init_logging;
pub use orders::{ExportData, MlTrainingLog, Order, OrderItem, OrderRepository, OrderStatus};
pub use stats::{local_stats, order_stats, LocalStats, OrderStats};
pub use storage::Storage;
pub use sync::SyncClient;
