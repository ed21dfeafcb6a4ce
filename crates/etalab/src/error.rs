//! Error types for etalab.
//!
//! This module defines all error types used throughout the etalab crate,
//! providing detailed context for debugging and user-friendly error messages.

use std::path::PathBuf;
use thiserror::Error;

use crate::orders::OrderStatus;

/// The main error type for etalab operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    /// A stored value could not be decoded.
    #[error("corrupt record under key '{key}': {message}")]
    CorruptRecord {
        /// Storage key holding the value.
        key: String,
        /// Decoder message.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Domain Errors ===
    /// No order with the given id exists.
    #[error("order not found: {0}")]
    OrderNotFound(String),

    /// The requested status change is not allowed.
    #[error("cannot move order {order_id} from {from} to {to}")]
    InvalidTransition {
        /// The order being updated.
        order_id: String,
        /// Current status.
        from: OrderStatus,
        /// Requested status.
        to: OrderStatus,
    },

    /// A restaurant, product or customer id is not in the catalog.
    #[error("unknown {kind}: {id}")]
    UnknownCatalogEntry {
        /// `restaurant`, `product` or `customer`.
        kind: &'static str,
        /// The id that was looked up.
        id: String,
    },

    /// The seed catalog is inconsistent.
    #[error("invalid catalog: {0}")]
    InvalidCatalog(String),

    /// An order was placed without items.
    #[error("an order needs at least one product")]
    EmptyOrder,

    /// A product does not belong to the restaurant it was ordered from.
    #[error("product {product_id} is not sold by restaurant {restaurant_id}")]
    ProductNotInRestaurant {
        /// The product id.
        product_id: String,
        /// The restaurant id.
        restaurant_id: String,
    },

    /// There is nothing worth uploading for training.
    #[error("no valid training data: deliver some orders first")]
    NoTrainingData,

    // === Remote Service Errors ===
    /// An HTTP request could not be completed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote service did not answer its health check.
    #[error("service at {url} is unavailable")]
    ServiceUnavailable {
        /// Base URL of the service.
        url: String,
    },

    /// The remote service answered with an error.
    #[error("service returned {status}: {detail}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error detail reported by the service.
        detail: String,
    },

    /// The PINN dashboard client failed.
    #[error(transparent)]
    Pinn(#[from] etalab_pinn::Error),

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for etalab operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create an unknown catalog entry error.
    #[must_use]
    pub fn unknown(kind: &'static str, id: impl Into<String>) -> Self {
        Self::UnknownCatalogEntry {
            kind,
            id: id.into(),
        }
    }
}
