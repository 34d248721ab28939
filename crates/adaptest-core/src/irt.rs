//! Three-parameter logistic response model.
//!
//! Pure functions of ability and item parameters; safe to call from any
//! thread without synchronization.
//!
//! P(θ) = c + (1 - c) / (1 + exp(-D·a·(θ - b)))

use crate::model::ItemParameters;

/// Logistic scaling constant aligning the logistic curve with the normal ogive.
pub const SCALING_D: f64 = 1.7;

/// Overflow-free logistic function.
#[inline]
fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let exp_x = x.exp();
        exp_x / (1.0 + exp_x)
    }
}

/// Probability of a correct response at ability `theta`.
///
/// Lies in `[c, 1]`; strictly inside for any `|theta - b|` where the
/// logistic term is representable.
#[inline]
pub fn probability_correct(theta: f64, b: f64, a: f64, c: f64) -> f64 {
    c + (1.0 - c) * sigmoid(SCALING_D * a * (theta - b))
}

/// Fisher information of one item at `theta`.
///
/// `info = (D·a·(p - c))² / ((p - c)·(1 - p))`. Pass `p` when already
/// computed. Returns `0.0` when `p` sits on the guessing floor or at `1`,
/// where the formula would divide by zero.
#[inline]
pub fn item_information(theta: f64, b: f64, a: f64, c: f64, p: Option<f64>) -> f64 {
    let p = p.unwrap_or_else(|| probability_correct(theta, b, a, c));
    let above_floor = p - c;
    let q = 1.0 - p;
    if above_floor <= 0.0 || q <= 0.0 {
        return 0.0;
    }
    let numerator = (SCALING_D * a * above_floor).powi(2);
    numerator / (above_floor * q)
}

/// Log-likelihood score contribution of one observed response.
#[inline]
pub fn score_contribution(is_correct: bool, p: f64) -> f64 {
    if is_correct {
        1.0 - p
    } else {
        -p
    }
}

/// Standard error implied by an amount of information.
///
/// Infinite for non-positive (or NaN) information; never NaN.
#[inline]
pub fn standard_error(information: f64) -> f64 {
    if information > 0.0 {
        1.0 / information.sqrt()
    } else {
        f64::INFINITY
    }
}

/// [`probability_correct`] for a validated parameter set.
#[inline]
pub fn probability(theta: f64, params: &ItemParameters) -> f64 {
    probability_correct(
        theta,
        params.difficulty(),
        params.discrimination(),
        params.guessing(),
    )
}

/// [`item_information`] for a validated parameter set.
#[inline]
pub fn information(theta: f64, params: &ItemParameters) -> f64 {
    item_information(
        theta,
        params.difficulty(),
        params.discrimination(),
        params.guessing(),
        None,
    )
}

/// Total information of a set of items at `theta`.
pub fn test_information<'a>(theta: f64, items: impl IntoIterator<Item = &'a ItemParameters>) -> f64 {
    items.into_iter().map(|p| information(theta, p)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-12;

    #[test]
    fn probability_at_difficulty_is_midpoint_above_floor() {
        let p = probability_correct(0.0, 0.0, 1.0, 0.2);
        assert!((p - 0.6).abs() < TOL, "got {p}");
        let p = probability_correct(1.5, 1.5, 2.0, 0.0);
        assert!((p - 0.5).abs() < TOL, "got {p}");
    }

    #[test]
    fn probability_stays_within_bounds_and_increases() {
        let (b, a, c) = (0.3, 1.4, 0.25);
        let mut prev = c;
        for step in -40..=40 {
            let theta = step as f64 * 0.1;
            let p = probability_correct(theta, b, a, c);
            assert!(p > c && p < 1.0, "p={p} at theta={theta}");
            assert!(p > prev, "not increasing at theta={theta}");
            prev = p;
        }
    }

    #[test]
    fn probability_extreme_theta_does_not_overflow() {
        let hi = probability_correct(1e6, 0.0, 3.0, 0.1);
        let lo = probability_correct(-1e6, 0.0, 3.0, 0.1);
        assert!(hi.is_finite() && lo.is_finite());
        assert_eq!(hi, 1.0);
        assert!((lo - 0.1).abs() < TOL);
    }

    #[test]
    fn information_reference_value() {
        // p = 0.6, c = 0.2: (1.7 * 0.4)^2 / (0.4 * 0.4) = 2.89
        let info = item_information(0.0, 0.0, 1.0, 0.2, None);
        assert!((info - 2.89).abs() < 1e-9, "got {info}");
    }

    #[test]
    fn information_uses_supplied_probability() {
        let info = item_information(99.0, 0.0, 1.0, 0.0, Some(0.5));
        assert!((info - SCALING_D * SCALING_D).abs() < 1e-12, "got {info}");
    }

    #[test]
    fn information_zero_at_degenerate_probabilities() {
        assert_eq!(item_information(0.0, 0.0, 1.0, 0.2, Some(0.2)), 0.0);
        assert_eq!(item_information(0.0, 0.0, 1.0, 0.2, Some(1.0)), 0.0);
        // Far above the item the logistic saturates to exactly 1.
        let info = item_information(1e4, 0.0, 1.0, 0.2, None);
        assert_eq!(info, 0.0);
        // Far below, p collapses onto the guessing floor.
        let info = item_information(-1e4, 0.0, 1.0, 0.2, None);
        assert_eq!(info, 0.0);
    }

    #[test]
    fn information_is_non_negative() {
        for step in -60..=60 {
            let theta = step as f64 * 0.1;
            for &(b, a, c) in &[(0.0, 1.0, 0.0), (-2.0, 0.4, 0.3), (2.5, 2.2, 0.1)] {
                let info = item_information(theta, b, a, c, None);
                assert!(info >= 0.0 && info.is_finite(), "info={info} at theta={theta}");
            }
        }
    }

    #[test]
    fn score_contribution_signs() {
        assert!((score_contribution(true, 0.6) - 0.4).abs() < TOL);
        assert!((score_contribution(false, 0.6) + 0.6).abs() < TOL);
    }

    #[test]
    fn standard_error_edges() {
        assert!((standard_error(4.0) - 0.5).abs() < TOL);
        assert!(standard_error(0.0).is_infinite());
        assert!(standard_error(-1.0).is_infinite());
        assert!(standard_error(f64::NAN).is_infinite());
    }

    #[test]
    fn test_information_sums_items() {
        let items = [
            ItemParameters::new(0.0, 1.0, 0.2).unwrap(),
            ItemParameters::new(0.0, 1.0, 0.2).unwrap(),
        ];
        let total = test_information(0.0, &items);
        assert!((total - 5.78).abs() < 1e-9, "got {total}");
    }
}
