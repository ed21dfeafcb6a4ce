//! Order records and the training logs derived from them.
//!
//! Field names follow the JSON documents stored under
//! [`ORDERS_KEY`](crate::storage::ORDERS_KEY) and
//! [`ML_LOGS_KEY`](crate::storage::ML_LOGS_KEY), so exports stay compatible
//! with data produced by the web front end.

pub mod repository;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use repository::OrderRepository;

/// Lifecycle state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// The restaurant is preparing the food.
    Preparing,
    /// A courier is on the way.
    InRoute,
    /// Handed to the customer.
    Delivered,
    /// Abandoned before delivery.
    Cancelled,
}

impl OrderStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 4] = [
        Self::Preparing,
        Self::InRoute,
        Self::Delivered,
        Self::Cancelled,
    ];

    /// The forward step from this status, if any.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Preparing => Some(Self::InRoute),
            Self::InRoute => Some(Self::Delivered),
            Self::Delivered | Self::Cancelled => None,
        }
    }

    /// True for `delivered` and `cancelled`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        self.next().is_none()
    }

    /// Whether an order in this status may move to `target`.
    ///
    /// Orders advance one step at a time. Any non-terminal order may be
    /// cancelled.
    #[must_use]
    pub fn can_transition_to(self, target: Self) -> bool {
        if target == Self::Cancelled {
            return !self.is_terminal();
        }
        self.next() == Some(target)
    }

    /// The snake_case name used in stored JSON.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Preparing => "preparing",
            Self::InRoute => "in_route",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown order status: {s}"))
    }
}

/// One line of an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    /// Line id.
    pub id: String,
    /// Catalog product id.
    pub product_id: String,
    /// Units ordered.
    pub quantity: u32,
    /// Price of one unit at order time.
    pub unit_price: f64,
}

impl OrderItem {
    /// `quantity × unit_price`.
    #[must_use]
    pub fn subtotal(&self) -> f64 {
        f64::from(self.quantity) * self.unit_price
    }
}

/// A delivery order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Order id.
    pub id: String,
    /// Customer who placed it.
    pub customer_id: String,
    /// Restaurant preparing it.
    pub restaurant_id: String,
    /// Current lifecycle status.
    pub status: OrderStatus,
    /// ETA promised when the order was placed, in minutes.
    pub predicted_eta_min: Option<u32>,
    /// Minutes from creation to delivery.
    pub actual_delivery_min: Option<u32>,
    /// Restaurant to customer distance.
    pub distance_km: Option<f64>,
    /// When the order was placed.
    pub created_at: DateTime<Utc>,
    /// When the order was delivered.
    pub delivered_at: Option<DateTime<Utc>>,
    /// Ordered lines.
    pub items: Vec<OrderItem>,
    /// Sum of all line subtotals.
    pub total_amount: f64,
}

impl Order {
    /// Whether the delivery took longer than predicted.
    ///
    /// `None` until both times are known.
    #[must_use]
    pub fn is_late(&self) -> Option<bool> {
        match (self.actual_delivery_min, self.predicted_eta_min) {
            (Some(actual), Some(predicted)) => Some(actual > predicted),
            _ => None,
        }
    }

    /// True when both predicted and actual minutes are recorded and non-zero.
    #[must_use]
    pub fn has_times(&self) -> bool {
        matches!(
            (self.actual_delivery_min, self.predicted_eta_min),
            (Some(a), Some(p)) if a > 0 && p > 0
        )
    }
}

/// Prediction outcome of one delivered order, kept for model training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlTrainingLog {
    /// Log id.
    pub id: String,
    /// The delivered order.
    pub order_id: String,
    /// Restaurant of the order.
    pub restaurant_id: String,
    /// Customer of the order.
    pub customer_id: String,
    /// Delivery distance, 0 when unknown.
    pub distance_km: f64,
    /// Hour the order was placed, 0-23.
    pub hour_of_day: u32,
    /// Day the order was placed, 0 = Sunday.
    pub day_of_week: u32,
    /// Number of order lines.
    pub item_count: u32,
    /// Predicted minutes.
    pub predicted_eta_min: u32,
    /// Actual minutes.
    pub actual_delivery_min: u32,
    /// `actual > predicted`.
    pub is_late: bool,
    /// When the log was written.
    pub created_at: DateTime<Utc>,
}

/// Snapshot of everything in the store, as exported to a JSON file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportData {
    /// All orders.
    pub orders: Vec<Order>,
    /// All training logs.
    #[serde(rename = "mlLogs")]
    pub ml_logs: Vec<MlTrainingLog>,
}
