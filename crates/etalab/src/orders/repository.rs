//! Order and training log persistence.
//!
//! Both collections are stored as whole JSON arrays; every mutation reads
//! the array, changes it and writes it back. Reads for display fall back to
//! an empty list on a corrupt array; mutations refuse to overwrite it.

use chrono::{DateTime, Datelike, Timelike, Utc};
use tracing::{debug, info};

use super::{ExportData, MlTrainingLog, Order, OrderStatus};
use crate::error::{Error, Result};
use crate::storage::{Storage, ML_LOGS_KEY, ORDERS_KEY};

/// Repository of orders and training logs over a [`Storage`].
#[derive(Debug)]
pub struct OrderRepository {
    storage: Storage,
}

impl OrderRepository {
    /// Wrap an open storage.
    #[must_use]
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    /// The underlying storage.
    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// All orders in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage read fails.
    pub fn orders(&self) -> Result<Vec<Order>> {
        self.storage.get_json(ORDERS_KEY, Vec::new())
    }

    fn orders_for_update(&self) -> Result<Vec<Order>> {
        Ok(self.storage.load_json(ORDERS_KEY)?.unwrap_or_default())
    }

    fn save_orders(&self, orders: &[Order]) -> Result<()> {
        self.storage.set_json(ORDERS_KEY, orders)?;
        Ok(())
    }

    /// Insert `order`, or replace the stored order with the same id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CorruptRecord`] if the stored orders no longer
    /// decode, or an error if the storage read or write fails.
    pub fn save_order(&self, order: &Order) -> Result<()> {
        let mut orders = self.orders_for_update()?;
        match orders.iter_mut().find(|o| o.id == order.id) {
            Some(existing) => *existing = order.clone(),
            None => orders.push(order.clone()),
        }
        self.save_orders(&orders)?;
        debug!(order_id = %order.id, status = %order.status, "Saved order");
        Ok(())
    }

    /// Orders placed with `restaurant_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage read fails.
    pub fn orders_by_restaurant(&self, restaurant_id: &str) -> Result<Vec<Order>> {
        let mut orders = self.orders()?;
        orders.retain(|o| o.restaurant_id == restaurant_id);
        Ok(orders)
    }

    /// Orders placed by `customer_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage read fails.
    pub fn orders_by_customer(&self, customer_id: &str) -> Result<Vec<Order>> {
        let mut orders = self.orders()?;
        orders.retain(|o| o.customer_id == customer_id);
        Ok(orders)
    }

    /// Look up one order.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage read fails.
    pub fn order_by_id(&self, order_id: &str) -> Result<Option<Order>> {
        Ok(self.orders()?.into_iter().find(|o| o.id == order_id))
    }

    /// Move an order to `status`, using the current time.
    ///
    /// # Errors
    ///
    /// See [`update_order_status_at`](Self::update_order_status_at).
    pub fn update_order_status(&self, order_id: &str, status: OrderStatus) -> Result<Option<Order>> {
        self.update_order_status_at(order_id, status, Utc::now())
    }

    /// Move an order to `status` as of `now`.
    ///
    /// Delivering an order stamps `delivered_at`, fills in the actual
    /// delivery minutes unless they were already recorded, and appends a
    /// training log. Returns `Ok(None)` when no order has that id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] if the order cannot move to
    /// `status`, [`Error::CorruptRecord`] if a stored collection no longer
    /// decodes, or an error if storage fails.
    pub fn update_order_status_at(
        &self,
        order_id: &str,
        status: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<Order>> {
        let mut orders = self.orders_for_update()?;
        let Some(order) = orders.iter_mut().find(|o| o.id == order_id) else {
            return Ok(None);
        };

        if !order.status.can_transition_to(status) {
            return Err(Error::InvalidTransition {
                order_id: order_id.to_string(),
                from: order.status,
                to: status,
            });
        }

        order.status = status;
        if status == OrderStatus::Delivered {
            order.delivered_at = Some(now);
            if order.actual_delivery_min.is_none() {
                order.actual_delivery_min = Some(elapsed_minutes(order.created_at, now));
            }
        }
        let updated = order.clone();

        // The log goes first so a failed write leaves the order retryable.
        if status == OrderStatus::Delivered {
            self.record_training_log_at(&updated, now)?;
        }
        self.save_orders(&orders)?;

        info!(order_id, status = %status, "Order status updated");
        Ok(Some(updated))
    }

    /// Move an order one step forward (preparing, in route, delivered).
    ///
    /// # Errors
    ///
    /// Returns [`Error::OrderNotFound`] for an unknown id and
    /// [`Error::InvalidTransition`] when the order is already terminal.
    pub fn advance_order(&self, order_id: &str) -> Result<Order> {
        self.advance_order_at(order_id, Utc::now())
    }

    /// [`advance_order`](Self::advance_order) as of `now`.
    ///
    /// # Errors
    ///
    /// See [`advance_order`](Self::advance_order).
    pub fn advance_order_at(&self, order_id: &str, now: DateTime<Utc>) -> Result<Order> {
        let order = self
            .order_by_id(order_id)?
            .ok_or_else(|| Error::OrderNotFound(order_id.to_string()))?;
        let next = order.status.next().ok_or_else(|| Error::InvalidTransition {
            order_id: order_id.to_string(),
            from: order.status,
            to: order.status,
        })?;
        self.update_order_status_at(order_id, next, now)?
            .ok_or_else(|| Error::OrderNotFound(order_id.to_string()))
    }

    /// All training logs in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage read fails.
    pub fn ml_training_logs(&self) -> Result<Vec<MlTrainingLog>> {
        self.storage.get_json(ML_LOGS_KEY, Vec::new())
    }

    /// Append a training log for a delivered order.
    ///
    /// # Errors
    ///
    /// See [`record_training_log_at`](Self::record_training_log_at).
    pub fn record_training_log(&self, order: &Order) -> Result<Option<MlTrainingLog>> {
        self.record_training_log_at(order, Utc::now())
    }

    /// Append a training log for `order`, stamped `now`.
    ///
    /// Nothing is written when the predicted or actual minutes are missing
    /// or zero.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CorruptRecord`] if the stored logs no longer decode,
    /// or an error if the storage read or write fails.
    pub fn record_training_log_at(
        &self,
        order: &Order,
        now: DateTime<Utc>,
    ) -> Result<Option<MlTrainingLog>> {
        let (Some(actual), Some(predicted)) = (order.actual_delivery_min, order.predicted_eta_min)
        else {
            return Ok(None);
        };
        if actual == 0 || predicted == 0 {
            return Ok(None);
        }

        let log = MlTrainingLog {
            id: format!("ml_{}", uuid::Uuid::new_v4().simple()),
            order_id: order.id.clone(),
            restaurant_id: order.restaurant_id.clone(),
            customer_id: order.customer_id.clone(),
            distance_km: order.distance_km.unwrap_or(0.0),
            hour_of_day: order.created_at.hour(),
            day_of_week: order.created_at.weekday().num_days_from_sunday(),
            item_count: u32::try_from(order.items.len()).unwrap_or(u32::MAX),
            predicted_eta_min: predicted,
            actual_delivery_min: actual,
            is_late: actual > predicted,
            created_at: now,
        };

        let mut logs: Vec<MlTrainingLog> =
            self.storage.load_json(ML_LOGS_KEY)?.unwrap_or_default();
        logs.push(log.clone());
        self.storage.set_json(ML_LOGS_KEY, &logs)?;
        debug!(order_id = %order.id, is_late = log.is_late, "Recorded training log");
        Ok(Some(log))
    }

    /// Delete every order and training log.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage write fails.
    pub fn clear_all(&self) -> Result<()> {
        self.storage.remove(ORDERS_KEY)?;
        self.storage.remove(ML_LOGS_KEY)?;
        info!("Cleared all orders and training logs");
        Ok(())
    }

    /// Snapshot both collections.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage read fails.
    pub fn export(&self) -> Result<ExportData> {
        Ok(ExportData {
            orders: self.orders()?,
            ml_logs: self.ml_training_logs()?,
        })
    }

    /// Replace both collections with `data`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage write fails.
    pub fn import(&self, data: &ExportData) -> Result<()> {
        self.save_orders(&data.orders)?;
        self.storage.set_json(ML_LOGS_KEY, &data.ml_logs)?;
        info!(
            orders = data.orders.len(),
            ml_logs = data.ml_logs.len(),
            "Imported data"
        );
        Ok(())
    }
}

/// Whole minutes between two instants, rounded half up, never negative.
fn elapsed_minutes(from: DateTime<Utc>, to: DateTime<Utc>) -> u32 {
    let millis = (to - from).num_milliseconds().max(0);
    u32::try_from((millis + 30_000) / 60_000).unwrap_or(u32::MAX)
}
