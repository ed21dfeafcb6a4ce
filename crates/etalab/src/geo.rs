//! Great-circle distance between two coordinates.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lon: f64,
}

impl GeoPoint {
    /// Create a point.
    #[must_use]
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Distance to `other` in kilometres. See [`haversine_km`].
    #[must_use]
    pub fn distance_to(&self, other: &Self) -> f64 {
        haversine_km(*self, *other)
    }
}

/// Haversine distance in kilometres, rounded to two decimals.
#[must_use]
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    (EARTH_RADIUS_KM * c * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_same_point_is_zero() {
        let p = GeoPoint::new(-23.5505, -46.6333);
        assert!(haversine_km(p, p).abs() < f64::EPSILON);
    }

    #[test]
    fn test_known_distance() {
        // Pizzaria Bella Napoli to Ana Silva.
        let restaurant = GeoPoint::new(-23.5505, -46.6333);
        let customer = GeoPoint::new(-23.5612, -46.6556);
        let d = haversine_km(restaurant, customer);
        assert!((d - 2.57).abs() < 1e-9, "got {d}");
    }

    #[test]
    fn test_rounded_to_two_decimals() {
        let d = haversine_km(GeoPoint::new(0.0, 0.0), GeoPoint::new(0.123, 0.456));
        assert!(((d * 100.0).round() - d * 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_distance_to_matches_free_function() {
        let a = GeoPoint::new(-23.5489, -46.6388);
        let b = GeoPoint::new(-23.5712, -46.6678);
        assert!((a.distance_to(&b) - haversine_km(a, b)).abs() < f64::EPSILON);
    }

    fn arb_point() -> impl Strategy<Value = GeoPoint> {
        (-90.0f64..=90.0, -180.0f64..=180.0).prop_map(|(lat, lon)| GeoPoint::new(lat, lon))
    }

    proptest! {
        #[test]
        fn test_identity(p in arb_point()) {
            prop_assert!(haversine_km(p, p).abs() < f64::EPSILON);
        }

        #[test]
        fn test_symmetric(a in arb_point(), b in arb_point()) {
            prop_assert!((haversine_km(a, b) - haversine_km(b, a)).abs() <= 0.01);
        }

        #[test]
        fn test_bounded_by_half_circumference(a in arb_point(), b in arb_point()) {
            let d = haversine_km(a, b);
            prop_assert!(d >= 0.0);
            prop_assert!(d <= std::f64::consts::PI * EARTH_RADIUS_KM + 0.01);
        }
    }
}
