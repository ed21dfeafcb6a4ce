//! Placing new orders.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::catalog::{Catalog, Product};
use crate::error::{Error, Result};
use crate::eta::heuristic::estimate_eta;
use crate::eta::{
    is_rush_hour, PredictionRequest, PredictionResponse, Predictor, TrafficLevel, Weather,
};
use crate::geo::haversine_km;
use crate::orders::{Order, OrderItem, OrderRepository, OrderStatus};

/// What a customer asked for, before pricing and prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDraft {
    /// Ordering customer.
    pub customer_id: String,
    /// Restaurant to order from.
    pub restaurant_id: String,
    /// One entry per unit; every product must be sold by the restaurant.
    pub product_ids: Vec<String>,
    /// Weather to predict with; sunny when unknown.
    pub weather: Option<Weather>,
    /// Traffic to predict with; derived from the hour when unknown.
    pub traffic: Option<TrafficLevel>,
}

/// A saved order together with the estimate it was promised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedOrder {
    /// The stored order.
    pub order: Order,
    /// The estimate behind `predicted_eta_min`.
    pub prediction: PredictionResponse,
}

fn resolve_products<'a>(catalog: &'a Catalog, draft: &OrderDraft) -> Result<Vec<&'a Product>> {
    if draft.product_ids.is_empty() {
        return Err(Error::EmptyOrder);
    }

    draft
        .product_ids
        .iter()
        .map(|id| {
            let product = catalog.require_product(id)?;
            if product.restaurant_id != draft.restaurant_id {
                return Err(Error::ProductNotInRestaurant {
                    product_id: id.clone(),
                    restaurant_id: draft.restaurant_id.clone(),
                });
            }
            Ok(product)
        })
        .collect()
}

/// Features for predicting `draft` as of `now`.
///
/// # Errors
///
/// Returns an error for unknown ids, an empty product list or products from
/// another restaurant.
pub fn build_prediction_request(
    catalog: &Catalog,
    draft: &OrderDraft,
    now: DateTime<Utc>,
) -> Result<PredictionRequest> {
    let restaurant = catalog.require_restaurant(&draft.restaurant_id)?;
    let customer = catalog.require_customer(&draft.customer_id)?;
    let products = resolve_products(catalog, draft)?;

    let preparation = restaurant.avg_prep_time_min
        + products.iter().map(|p| p.additional_prep_min).sum::<u32>();
    let distance = haversine_km(restaurant.location(), customer.location());

    let mut request = PredictionRequest::at(now, distance, preparation, draft.weather.unwrap_or_default());
    if let Some(traffic) = draft.traffic {
        request.traffic_level = traffic;
    }
    Ok(request)
}

/// Rough kitchen-plus-travel estimate for `draft` at `now`, without asking
/// any predictor.
///
/// # Errors
///
/// Returns an error for unknown ids, an empty product list or products from
/// another restaurant.
pub fn quick_estimate(catalog: &Catalog, draft: &OrderDraft, now: DateTime<Utc>) -> Result<u32> {
    let restaurant = catalog.require_restaurant(&draft.restaurant_id)?;
    let customer = catalog.require_customer(&draft.customer_id)?;
    let additional = resolve_products(catalog, draft)?
        .iter()
        .map(|p| p.additional_prep_min)
        .sum();
    let distance = haversine_km(restaurant.location(), customer.location());

    Ok(estimate_eta(
        restaurant.avg_prep_time_min,
        additional,
        distance,
        is_rush_hour(now.hour()),
    ))
}

/// Price, predict and store a new order in `preparing` state.
///
/// # Errors
///
/// Returns an error if the draft is invalid or the order cannot be saved.
/// Prediction itself never fails; it degrades to the local estimate.
pub async fn place_order<P: Predictor + ?Sized>(
    catalog: &Catalog,
    repo: &OrderRepository,
    predictor: &P,
    draft: &OrderDraft,
    now: DateTime<Utc>,
) -> Result<PlacedOrder> {
    let request = build_prediction_request(catalog, draft, now)?;
    let products = resolve_products(catalog, draft)?;

    let prediction = predictor.predict(&request).await;

    let items: Vec<OrderItem> = products
        .iter()
        .map(|product| OrderItem {
            id: format!("item_{}", uuid::Uuid::new_v4().simple()),
            product_id: product.id.clone(),
            quantity: 1,
            unit_price: product.price,
        })
        .collect();
    let total_amount = items.iter().map(OrderItem::subtotal).sum();

    let order = Order {
        id: format!("order_{}", uuid::Uuid::new_v4().simple()),
        customer_id: draft.customer_id.clone(),
        restaurant_id: draft.restaurant_id.clone(),
        status: OrderStatus::Preparing,
        predicted_eta_min: Some(prediction.eta_minutes),
        actual_delivery_min: None,
        distance_km: Some(request.distance_km),
        created_at: now,
        delivered_at: None,
        items,
        total_amount,
    };
    repo.save_order(&order)?;

    info!(
        order_id = %order.id,
        eta = prediction.eta_minutes,
        model = %prediction.model_used,
        predictor = predictor.name(),
        "Order placed"
    );
    Ok(PlacedOrder { order, prediction })
}
