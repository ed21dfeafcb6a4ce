//! Fabricated data for trying out training without real deliveries.

use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::info;

use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::eta::heuristic::simulate_actual_delivery;
use crate::eta::round_minutes;
use crate::orders::{Order, OrderItem, OrderRepository, OrderStatus};

/// Orders delivered per call of [`generate_sample_data`].
pub const SAMPLE_DELIVERIES: usize = 5;

/// Orders produced by [`sample_orders`].
pub const SAMPLE_ORDER_COUNT: usize = 10;

/// Prediction assumed for orders that never got one.
const DEFAULT_PREDICTED_MIN: u32 = 30;

/// Deliver up to five `preparing` orders with a plausible actual time of
/// ±10 minutes around the prediction (at least 10), producing training logs.
///
/// Returns how many orders were delivered; 0 when none was preparing.
///
/// # Errors
///
/// Returns an error if storage fails.
pub fn generate_sample_data<R: Rng + ?Sized>(
    repo: &OrderRepository,
    rng: &mut R,
    now: DateTime<Utc>,
) -> Result<usize> {
    let preparing: Vec<Order> = repo
        .orders()?
        .into_iter()
        .filter(|o| o.status == OrderStatus::Preparing)
        .take(SAMPLE_DELIVERIES)
        .collect();

    for order in &preparing {
        let predicted = order.predicted_eta_min.unwrap_or(DEFAULT_PREDICTED_MIN);
        let variation: f64 = rng.gen_range(-10.0..10.0);
        let actual = round_minutes(f64::from(predicted) + variation).max(10);

        let mut updated = order.clone();
        updated.actual_delivery_min = Some(actual);
        repo.save_order(&updated)?;

        repo.update_order_status_at(&order.id, OrderStatus::InRoute, now)?;
        repo.update_order_status_at(&order.id, OrderStatus::Delivered, now)?;
    }

    info!(delivered = preparing.len(), "Generated sample deliveries");
    Ok(preparing.len())
}

/// Deliver an in-route order as of `now`, pretending it took somewhere
/// between ten minutes less and twenty minutes more than predicted.
///
/// # Errors
///
/// Returns [`Error::OrderNotFound`] for an unknown id,
/// [`Error::InvalidTransition`] unless the order is in route, or an error if
/// storage fails.
pub fn deliver_simulated<R: Rng + ?Sized>(
    repo: &OrderRepository,
    order_id: &str,
    rng: &mut R,
    now: DateTime<Utc>,
) -> Result<Order> {
    let mut order = repo
        .order_by_id(order_id)?
        .ok_or_else(|| Error::OrderNotFound(order_id.to_string()))?;
    if !order.status.can_transition_to(OrderStatus::Delivered) {
        return Err(Error::InvalidTransition {
            order_id: order_id.to_string(),
            from: order.status,
            to: OrderStatus::Delivered,
        });
    }

    let predicted = order.predicted_eta_min.unwrap_or(DEFAULT_PREDICTED_MIN);
    order.actual_delivery_min = Some(simulate_actual_delivery(predicted, rng));
    repo.save_order(&order)?;

    repo.update_order_status_at(order_id, OrderStatus::Delivered, now)?
        .ok_or_else(|| Error::OrderNotFound(order_id.to_string()))
}

/// Ten random historical orders from the last week across the catalog.
///
/// Delivered ones carry an actual time within ten minutes of the
/// prediction.
#[must_use]
pub fn sample_orders<R: Rng + ?Sized>(catalog: &Catalog, rng: &mut R, now: DateTime<Utc>) -> Vec<Order> {
    const STATUSES: [OrderStatus; 3] = [
        OrderStatus::Preparing,
        OrderStatus::InRoute,
        OrderStatus::Delivered,
    ];

    let mut orders = Vec::with_capacity(SAMPLE_ORDER_COUNT);
    for i in 0..SAMPLE_ORDER_COUNT {
        let (Some(restaurant), Some(customer)) = (
            catalog.restaurants.choose(rng),
            catalog.customers.choose(rng),
        ) else {
            break;
        };

        let product_count = rng.gen_range(1..=3);
        let items: Vec<OrderItem> = catalog
            .products_for(&restaurant.id)
            .take(product_count)
            .map(|product| OrderItem {
                id: format!("item_{i}_{}", product.id),
                product_id: product.id.clone(),
                quantity: rng.gen_range(1..=3),
                unit_price: product.price,
            })
            .collect();
        let total_amount = items.iter().map(OrderItem::subtotal).sum();

        let created_at = now - Duration::days(rng.gen_range(0..7));
        let status = STATUSES[rng.gen_range(0..STATUSES.len())];
        let predicted: u32 = rng.gen_range(30..60);
        let distance: f64 = rng.gen_range(2.0..10.0);

        let (actual_delivery_min, delivered_at) = if status == OrderStatus::Delivered {
            let offset: i64 = rng.gen_range(-10..10);
            let minutes = i64::from(predicted) + offset;
            (
                u32::try_from(minutes).ok(),
                Some(created_at + Duration::minutes(minutes)),
            )
        } else {
            (None, None)
        };

        orders.push(Order {
            id: format!("order_sample_{}", i + 1),
            customer_id: customer.id.clone(),
            restaurant_id: restaurant.id.clone(),
            status,
            predicted_eta_min: Some(predicted),
            actual_delivery_min,
            distance_km: Some((distance * 100.0).round() / 100.0),
            created_at,
            delivered_at,
            items,
            total_amount,
        });
    }
    orders
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::tests::sample_order;
    use crate::storage::Storage;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn now() -> DateTime<Utc> {
        "2024-03-13T12:00:00Z".parse().unwrap()
    }

    #[test]
    fn test_generate_sample_data_without_preparing_orders() {
        let repo = OrderRepository::new(Storage::open_in_memory().unwrap());
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(generate_sample_data(&repo, &mut rng, now()).unwrap(), 0);
    }

    #[test]
    fn test_generate_sample_data_delivers_at_most_five() {
        let repo = OrderRepository::new(Storage::open_in_memory().unwrap());
        for i in 0..7 {
            let mut order = sample_order();
            order.id = format!("order_{i}");
            if i == 6 {
                order.predicted_eta_min = None;
            }
            repo.save_order(&order).unwrap();
        }
        let mut rng = StdRng::seed_from_u64(11);

        assert_eq!(generate_sample_data(&repo, &mut rng, now()).unwrap(), 5);

        let orders = repo.orders().unwrap();
        let delivered: Vec<&Order> = orders
            .iter()
            .filter(|o| o.status == OrderStatus::Delivered)
            .collect();
        assert_eq!(delivered.len(), 5);
        for order in &delivered {
            let actual = order.actual_delivery_min.unwrap();
            assert!((20..=40).contains(&actual), "got {actual}");
            assert_eq!(order.delivered_at, Some(now()));
        }
        assert_eq!(repo.ml_training_logs().unwrap().len(), 5);

        // The remaining two, including the one without a prediction.
        assert_eq!(generate_sample_data(&repo, &mut rng, now()).unwrap(), 2);
        let last = repo.order_by_id("order_6").unwrap().unwrap();
        assert!(last.actual_delivery_min.unwrap() >= 20);
        assert_eq!(repo.ml_training_logs().unwrap().len(), 6);
    }

    #[test]
    fn test_deliver_simulated() {
        let repo = OrderRepository::new(Storage::open_in_memory().unwrap());
        let mut order = sample_order();
        order.status = OrderStatus::InRoute;
        repo.save_order(&order).unwrap();
        let mut rng = StdRng::seed_from_u64(5);

        let delivered = deliver_simulated(&repo, "order_1", &mut rng, now()).unwrap();

        assert_eq!(delivered.status, OrderStatus::Delivered);
        assert_eq!(delivered.delivered_at, Some(now()));
        let actual = delivered.actual_delivery_min.unwrap();
        assert!((20..=50).contains(&actual), "got {actual}");

        let logs = repo.ml_training_logs().unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].actual_delivery_min, actual);
    }

    #[test]
    fn test_deliver_simulated_requires_in_route() {
        let repo = OrderRepository::new(Storage::open_in_memory().unwrap());
        repo.save_order(&sample_order()).unwrap();
        let mut rng = StdRng::seed_from_u64(5);

        let err = deliver_simulated(&repo, "order_1", &mut rng, now()).unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { from: OrderStatus::Preparing, .. }));
        assert!(matches!(
            deliver_simulated(&repo, "missing", &mut rng, now()),
            Err(Error::OrderNotFound(_))
        ));
        assert!(repo.ml_training_logs().unwrap().is_empty());
    }

    #[test]
    fn test_sample_orders_are_consistent() {
        let catalog = Catalog::builtin().unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let orders = sample_orders(&catalog, &mut rng, now());

        assert_eq!(orders.len(), SAMPLE_ORDER_COUNT);
        for (i, order) in orders.iter().enumerate() {
            assert_eq!(order.id, format!("order_sample_{}", i + 1));
            assert!((1..=3).contains(&order.items.len()));
            for item in &order.items {
                let product = catalog.product(&item.product_id).unwrap();
                assert_eq!(product.restaurant_id, order.restaurant_id);
            }
            assert!(order.created_at <= now());
            assert!(order.created_at > now() - Duration::days(7));

            let predicted = order.predicted_eta_min.unwrap();
            assert!((30..60).contains(&predicted));
            let distance = order.distance_km.unwrap();
            assert!((2.0..=10.0).contains(&distance));

            match order.status {
                OrderStatus::Delivered => {
                    let actual = order.actual_delivery_min.unwrap();
                    assert!(actual.abs_diff(predicted) <= 10);
                    assert!(order.delivered_at.is_some());
                }
                _ => assert!(order.actual_delivery_min.is_none()),
            }
        }
    }
}
