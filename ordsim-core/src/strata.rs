//! Empirical quartiles and age × SOFA risk strata.

use serde::{Deserialize, Serialize};

use crate::numbers::{floor_f64_to_usize, usize_to_f64};

/// Empirical quantile using linear interpolation between order statistics
/// (the "type 7" definition). `sorted` must be ascending and non-empty.
#[must_use]
pub fn quantile_sorted(sorted: &[f64], p: f64) -> f64 {
    match sorted {
        [] => f64::NAN,
        [only] => *only,
        _ => {
            let h = usize_to_f64(sorted.len() - 1) * p.clamp(0.0, 1.0);
            let lo = floor_f64_to_usize(h).min(sorted.len() - 1);
            let hi = (lo + 1).min(sorted.len() - 1);
            let frac = h - usize_to_f64(lo);
            sorted[lo] + frac * (sorted[hi] - sorted[lo])
        }
    }
}

/// The three internal quartile boundaries of one covariate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuartileCuts {
    pub q1: f64,
    pub q2: f64,
    pub q3: f64,
}

impl QuartileCuts {
    /// Compute cut points from the population's values (any order).
    #[must_use]
    pub fn from_values(values: impl IntoIterator<Item = f64>) -> Self {
        let mut sorted: Vec<f64> = values.into_iter().collect();
        sorted.sort_by(f64::total_cmp);
        Self {
            q1: quantile_sorted(&sorted, 0.25),
            q2: quantile_sorted(&sorted, 0.50),
            q3: quantile_sorted(&sorted, 0.75),
        }
    }

    /// Bucket 0..=3 over `(-inf, q1] (q1, q2] (q2, q3] (q3, inf)`.
    ///
    /// Tied cut points collapse buckets rather than failing.
    #[must_use]
    pub fn bucket(&self, value: f64) -> u8 {
        u8::from(value > self.q1) + u8::from(value > self.q2) + u8::from(value > self.q3)
    }
}

/// Risk stratum: the cross of age and SOFA quartile buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StratumKey {
    pub age_bucket: u8,
    pub sofa_bucket: u8,
}

/// Quartile cut points for both stratifying covariates, computed once per
/// population.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stratifier {
    pub age: QuartileCuts,
    pub sofa: QuartileCuts,
}

impl Stratifier {
    /// Fit cut points over `(age, sofa)` pairs.
    #[must_use]
    pub fn fit(covariates: &[(f64, f64)]) -> Self {
        Self {
            age: QuartileCuts::from_values(covariates.iter().map(|(age, _)| *age)),
            sofa: QuartileCuts::from_values(covariates.iter().map(|(_, sofa)| *sofa)),
        }
    }

    #[must_use]
    pub fn stratum(&self, age: f64, sofa: f64) -> StratumKey {
        StratumKey {
            age_bucket: self.age.bucket(age),
            sofa_bucket: self.sofa.bucket(sofa),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn type7_quantiles_interpolate() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert!(approx(quantile_sorted(&sorted, 0.25), 1.75));
        assert!(approx(quantile_sorted(&sorted, 0.5), 2.5));
        assert!(approx(quantile_sorted(&sorted, 0.75), 3.25));
        assert!(approx(quantile_sorted(&sorted, 0.0), 1.0));
        assert!(approx(quantile_sorted(&sorted, 1.0), 4.0));
        assert!(approx(quantile_sorted(&[9.0], 0.75), 9.0));
    }

    #[test]
    fn buckets_are_right_closed() {
        let cuts = QuartileCuts::from_values([1.0, 2.0, 3.0, 4.0, 5.0]);
        assert!(approx(cuts.q1, 2.0));
        assert!(approx(cuts.q2, 3.0));
        assert!(approx(cuts.q3, 4.0));
        assert_eq!(cuts.bucket(1.0), 0);
        assert_eq!(cuts.bucket(2.0), 0);
        assert_eq!(cuts.bucket(2.5), 1);
        assert_eq!(cuts.bucket(3.0), 1);
        assert_eq!(cuts.bucket(4.0), 2);
        assert_eq!(cuts.bucket(100.0), 3);
    }

    #[test]
    fn constant_population_collapses_to_one_bucket() {
        let cuts = QuartileCuts::from_values([5.0; 6]);
        assert_eq!(cuts.bucket(5.0), 0);
        let stratifier = Stratifier::fit(&[(5.0, 1.0), (5.0, 1.0)]);
        assert_eq!(
            stratifier.stratum(5.0, 1.0),
            StratumKey {
                age_bucket: 0,
                sofa_bucket: 0
            }
        );
    }
}
