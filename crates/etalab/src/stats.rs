//! Delivery analytics computed from local data.

use serde::{Deserialize, Serialize};

use crate::orders::{MlTrainingLog, Order, OrderStatus};

/// Predictions within this many minutes of reality count as accurate.
pub const ACCURACY_TOLERANCE_MIN: u32 = 5;

/// Default number of valid logs needed before retraining makes sense.
pub const DEFAULT_MIN_TRAINING_LOGS: usize = 5;

/// Headline numbers over orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStats {
    /// Orders considered.
    pub total_orders: usize,
    /// Orders in `delivered` state.
    pub delivered_orders: usize,
    /// Mean actual minutes over delivered orders with both times.
    pub average_delivery_time: u32,
    /// Share of timed deliveries that were not late, in percent.
    pub accuracy_rate: u32,
    /// Timed deliveries that took longer than predicted.
    pub late_orders: usize,
}

/// Breakdown of local data, including training readiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalStats {
    /// Orders considered.
    pub total_orders: usize,
    /// Orders in `delivered` state.
    pub delivered_orders: usize,
    /// Orders in `preparing` state.
    pub preparing_orders: usize,
    /// Orders in `in_route` state.
    pub in_route_orders: usize,
    /// Orders in `cancelled` state.
    pub cancelled_orders: usize,
    /// Training logs with a real delivery time and distance.
    pub ml_logs: usize,
    /// Valid logs predicted within the tolerance.
    pub accurate_predictions: usize,
    /// `accurate_predictions / ml_logs`, in percent.
    pub accuracy_rate: u32,
    /// Valid logs flagged late.
    pub late_deliveries: usize,
    /// Valid logs not flagged late, in percent.
    pub on_time_rate: u32,
    /// Mean actual minutes over valid logs.
    pub avg_delivery_time: u32,
    /// Enough valid logs to retrain.
    pub ready_for_training: bool,
}

/// Rounded integer percentage; 0 when `whole` is 0.
#[must_use]
pub fn percentage(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        return 0;
    }
    let rounded = (part * 200 + whole) / (whole * 2);
    u32::try_from(rounded).unwrap_or(u32::MAX)
}

fn rounded_mean(values: impl Iterator<Item = u32>) -> u32 {
    let (sum, count) = values.fold((0u64, 0u64), |(sum, count), v| (sum + u64::from(v), count + 1));
    if count == 0 {
        return 0;
    }
    u32::try_from((sum * 2 + count) / (count * 2)).unwrap_or(u32::MAX)
}

/// Statistics over `orders`.
#[must_use]
pub fn order_stats(orders: &[Order]) -> OrderStats {
    let delivered: Vec<&Order> = orders
        .iter()
        .filter(|o| o.status == OrderStatus::Delivered)
        .collect();
    let timed: Vec<&Order> = delivered.iter().copied().filter(|o| o.has_times()).collect();
    let late_orders = timed.iter().filter(|o| o.is_late() == Some(true)).count();

    OrderStats {
        total_orders: orders.len(),
        delivered_orders: delivered.len(),
        average_delivery_time: rounded_mean(timed.iter().filter_map(|o| o.actual_delivery_min)),
        accuracy_rate: percentage(timed.len() - late_orders, timed.len()),
        late_orders,
    }
}

/// Whether a training log carries a usable delivery.
#[must_use]
pub fn is_valid_log(log: &MlTrainingLog) -> bool {
    log.actual_delivery_min > 0 && log.distance_km > 0.0
}

/// Statistics over orders and logs, optionally for one restaurant.
#[must_use]
pub fn local_stats(
    orders: &[Order],
    logs: &[MlTrainingLog],
    restaurant_id: Option<&str>,
    min_training_logs: usize,
) -> LocalStats {
    let in_scope = |id: &str| restaurant_id.map_or(true, |r| r == id);
    let orders: Vec<&Order> = orders.iter().filter(|o| in_scope(&o.restaurant_id)).collect();
    let valid: Vec<&MlTrainingLog> = logs
        .iter()
        .filter(|l| in_scope(&l.restaurant_id) && is_valid_log(l))
        .collect();

    let count = |status: OrderStatus| orders.iter().filter(|o| o.status == status).count();
    let accurate_predictions = valid
        .iter()
        .filter(|l| l.actual_delivery_min.abs_diff(l.predicted_eta_min) <= ACCURACY_TOLERANCE_MIN)
        .count();
    let late_deliveries = valid.iter().filter(|l| l.is_late).count();

    LocalStats {
        total_orders: orders.len(),
        delivered_orders: count(OrderStatus::Delivered),
        preparing_orders: count(OrderStatus::Preparing),
        in_route_orders: count(OrderStatus::InRoute),
        cancelled_orders: count(OrderStatus::Cancelled),
        ml_logs: valid.len(),
        accurate_predictions,
        accuracy_rate: percentage(accurate_predictions, valid.len()),
        late_deliveries,
        on_time_rate: percentage(valid.len() - late_deliveries, valid.len()),
        avg_delivery_time: rounded_mean(valid.iter().map(|l| l.actual_delivery_min)),
        ready_for_training: valid.len() >= min_training_logs,
    }
}
