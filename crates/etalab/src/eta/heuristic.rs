//! Quick in-form estimate and delivery simulation.
//!
//! This is the rough estimate shown while an order is being composed, and
//! the noise model used to fabricate historical deliveries.

use rand::Rng;

use super::round_minutes;

/// Waiting time in the kitchen queue at peak hours.
pub const PEAK_QUEUE_MIN: u32 = 7;
/// Waiting time in the kitchen queue off-peak.
pub const OFF_PEAK_QUEUE_MIN: u32 = 1;
/// Travel minutes per kilometre off-peak.
pub const TRAVEL_MIN_PER_KM: f64 = 4.0;
/// Travel slowdown at peak hours.
pub const PEAK_TRAVEL_FACTOR: f64 = 1.5;

/// Estimate `prep + queue + travel` in whole minutes.
#[must_use]
pub fn estimate_eta(avg_prep_min: u32, additional_prep_min: u32, distance_km: f64, peak: bool) -> u32 {
    let prep = f64::from(avg_prep_min) + f64::from(additional_prep_min);
    let queue = if peak { PEAK_QUEUE_MIN } else { OFF_PEAK_QUEUE_MIN };
    let mut travel = distance_km * TRAVEL_MIN_PER_KM;
    if peak {
        travel *= PEAK_TRAVEL_FACTOR;
    }
    round_minutes(prep + f64::from(queue) + travel)
}

/// A plausible real delivery time for a `predicted` one: between ten
/// minutes early and twenty minutes late, never under five minutes.
pub fn simulate_actual_delivery<R: Rng + ?Sized>(predicted: u32, rng: &mut R) -> u32 {
    let variance: f64 = rng.gen_range(-10.0..20.0);
    round_minutes(f64::from(predicted) + variance).max(5)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_estimate_off_peak() {
        // 25 + 5 + 1 + 2.5 × 4
        assert_eq!(estimate_eta(25, 5, 2.5, false), 41);
    }

    #[test]
    fn test_estimate_peak() {
        // 25 + 5 + 7 + 2.5 × 4 × 1.5
        assert_eq!(estimate_eta(25, 5, 2.5, true), 52);
    }

    #[test]
    fn test_estimate_rounds() {
        // 15 + 3 + 1 + 1.13 × 4 = 23.52
        assert_eq!(estimate_eta(15, 3, 1.13, false), 24);
    }

    #[test]
    fn test_simulation_stays_in_band() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1_000 {
            let actual = simulate_actual_delivery(40, &mut rng);
            assert!((30..=60).contains(&actual), "got {actual}");
        }
    }

    #[test]
    fn test_simulation_floor() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..200 {
            assert!(simulate_actual_delivery(0, &mut rng) >= 5);
        }
    }
}
