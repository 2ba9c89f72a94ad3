// ── Statistical helpers ───────────────────────────────────────────────────

/// Empirical quantile with linear interpolation between order statistics.
///
/// For sorted values x_(0) ≤ … ≤ x_(n−1) and h = q·(n−1):
///   Q(q) = x_(⌊h⌋) + (h − ⌊h⌋) · (x_(⌊h⌋+1) − x_(⌊h⌋))
///
/// Non-finite values are ignored.  Returns `None` on an empty sample or a `q`
/// outside [0, 1].
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if !(0.0..=1.0).contains(&q) {
        return None;
    }
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);

    let h = q * (sorted.len() - 1) as f64;
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    let x = sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo]);
    // rounding must not push the interpolant past its bracketing order statistics
    Some(x.clamp(sorted[lo], sorted[hi]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use statrs::statistics::Statistics;

    #[test]
    fn quantile_linear_interpolation() {
        let v = [4.0, 1.0, 3.0, 2.0];
        assert_eq!(quantile(&v, 0.0), Some(1.0));
        assert_eq!(quantile(&v, 1.0), Some(4.0));
        assert!((quantile(&v, 0.5).unwrap() - 2.5).abs() < 1e-12);
        // h = 0.9 * 3 = 2.7 → 3 + 0.7
        assert!((quantile(&v, 0.9).unwrap() - 3.7).abs() < 1e-12);
    }

    #[test]
    fn quantile_edge_cases() {
        assert_eq!(quantile(&[], 0.5), None);
        assert_eq!(quantile(&[7.0], 0.9), Some(7.0));
        assert_eq!(quantile(&[1.0, 2.0], 1.5), None);
        assert_eq!(quantile(&[f64::NAN, 2.0], 0.5), Some(2.0));
    }

    proptest! {
        #[test]
        fn quantiles_are_monotonic(
            v in prop::collection::vec(-1e6f64..1e6, 1..200),
            a in 0.0f64..=1.0,
            b in 0.0f64..=1.0,
        ) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(quantile(&v, lo).unwrap() <= quantile(&v, hi).unwrap());
        }

        #[test]
        fn quantile_within_sample_range(v in prop::collection::vec(-1e3f64..1e3, 1..100), q in 0.0f64..=1.0) {
            let x = quantile(&v, q).unwrap();
            let min = Statistics::min(&v);
            let max = Statistics::max(&v);
            prop_assert!(x >= min && x <= max);
        }
    }
}
