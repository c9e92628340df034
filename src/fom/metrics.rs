//! Figure-of-merit metrics
//!
//! Each metric pairs a per-point discrepancy array with the reduction that
//! collapses the array to one scalar. The pairing is fixed: metric choice
//! changes both the array and how it is normalized, and the two are never
//! mixed. Masked points are zeroed in every array and excluded from the
//! normalization denominators.

use std::fmt;
use std::str::FromStr;

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::error::{FitError, Result};

/// Discrepancy metric between simulated and experimental data.
///
/// The serde/`FromStr` identifiers are the established ones: `diff`,
/// `diff_norm`, `diff_rangeNorm`, `log`, `log_rangeNorm`, `R1`, `R1_log`,
/// `R2`, `R2_log`, `chi`, `chi2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FomMetric {
    /// Plain difference `y - y_sim`.
    #[serde(rename = "diff")]
    Diff,
    /// Normalized difference, clamped at 1.5.
    #[serde(rename = "diff_norm")]
    DiffNorm,
    /// Difference normalized by the unmasked experimental range.
    #[serde(rename = "diff_rangeNorm")]
    DiffRangeNorm,
    /// Difference of decadic logarithms.
    #[serde(rename = "log")]
    Log,
    /// Log difference normalized by the experimental log range.
    #[serde(rename = "log_rangeNorm")]
    LogRangeNorm,
    /// Crystallographic R1 residual (amplitude-like).
    #[serde(rename = "R1")]
    R1,
    /// R1 residual on logarithmic amplitudes.
    #[serde(rename = "R1_log")]
    R1Log,
    /// Crystallographic R2 residual (intensity-like).
    #[serde(rename = "R2")]
    R2,
    /// R2 residual on logarithmic intensities.
    #[serde(rename = "R2_log")]
    R2Log,
    /// Error-weighted residual.
    #[serde(rename = "chi")]
    Chi,
    /// Squared error-weighted residual.
    #[serde(rename = "chi2")]
    Chi2,
}

impl FomMetric {
    /// Every supported metric, in identifier order.
    pub const ALL: [FomMetric; 11] = [
        FomMetric::Diff,
        FomMetric::DiffNorm,
        FomMetric::DiffRangeNorm,
        FomMetric::Log,
        FomMetric::LogRangeNorm,
        FomMetric::R1,
        FomMetric::R1Log,
        FomMetric::R2,
        FomMetric::R2Log,
        FomMetric::Chi,
        FomMetric::Chi2,
    ];

    /// The metric's string identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            FomMetric::Diff => "diff",
            FomMetric::DiffNorm => "diff_norm",
            FomMetric::DiffRangeNorm => "diff_rangeNorm",
            FomMetric::Log => "log",
            FomMetric::LogRangeNorm => "log_rangeNorm",
            FomMetric::R1 => "R1",
            FomMetric::R1Log => "R1_log",
            FomMetric::R2 => "R2",
            FomMetric::R2Log => "R2_log",
            FomMetric::Chi => "chi",
            FomMetric::Chi2 => "chi2",
        }
    }

    /// Compute the per-point discrepancy array, with masked points zeroed.
    ///
    /// `y_sim` must already be aligned with the dataset's experimental grid
    /// (the calculator guarantees this by simulating first). The chi metrics
    /// fail if the dataset carries no uncertainties.
    pub fn array(&self, y_sim: &Array1<f64>, dataset: &Dataset) -> Result<Array1<f64>> {
        let y = dataset.y();
        let mask = dataset.mask();
        let raw = match self {
            FomMetric::Diff => y - y_sim,
            FomMetric::DiffNorm => elementwise(y, y_sim, |ye, ys| {
                ((ye - ys) / ye.abs().max(1.0)).abs().min(1.5)
            }),
            FomMetric::DiffRangeNorm => {
                let (low, high) = unmasked_range(y, mask);
                elementwise(y, y_sim, |ye, ys| (ye - ys) / (high - low))
            }
            FomMetric::Log => elementwise(y, y_sim, |ye, ys| ye.log10() - ys.log10()),
            FomMetric::LogRangeNorm => {
                // Both series are shifted by 10 so the logarithms stay finite
                // near zero.
                let shifted = y.mapv(|v| v.abs() + 10.0);
                let denom = max_of(&shifted).log10() - min_of(&shifted).log10();
                elementwise(y, y_sim, |ye, ys| {
                    ((ys.abs() + 10.0).log10() - (ye.abs() + 10.0).log10()) / denom
                })
            }
            FomMetric::R1 => elementwise(y, y_sim, |ye, ys| {
                (ye.signum() * ye.abs().sqrt() - ys.signum() * ys.abs().sqrt()).abs()
            }),
            FomMetric::R1Log => elementwise(y, y_sim, |ye, ys| {
                (ye.sqrt().log10() - ys.sqrt().log10()).abs()
            }),
            FomMetric::R2 => elementwise(y, y_sim, |ye, ys| (ye - ys).powi(2)),
            FomMetric::R2Log => {
                elementwise(y, y_sim, |ye, ys| (ye.log10() - ys.log10()).powi(2))
            }
            FomMetric::Chi => {
                let error = self.require_error(dataset)?;
                Array1::from_iter(
                    y.iter()
                        .zip(y_sim.iter())
                        .zip(error.iter())
                        .map(|((ye, ys), err)| (ye - ys) / err),
                )
            }
            FomMetric::Chi2 => {
                let error = self.require_error(dataset)?;
                Array1::from_iter(
                    y.iter()
                        .zip(y_sim.iter())
                        .zip(error.iter())
                        .map(|((ye, ys), err)| ((ye - ys) / err).powi(2)),
                )
            }
        };
        Ok(zero_masked(raw, mask))
    }

    /// Collapse a per-point array (already masked-zeroed) to the scalar FOM.
    ///
    /// The difference family averages absolute values over the unmasked point
    /// count; the R1/R2 families normalize by a sum derived from the
    /// experimental `y` itself. Degenerate denominators (all points masked,
    /// zero experimental range) propagate as NaN or infinity.
    pub fn reduce(&self, array: &Array1<f64>, dataset: &Dataset) -> f64 {
        let y = dataset.y();
        let mask = dataset.mask();
        match self {
            FomMetric::Diff
            | FomMetric::DiffNorm
            | FomMetric::DiffRangeNorm
            | FomMetric::Log
            | FomMetric::LogRangeNorm
            | FomMetric::Chi
            | FomMetric::Chi2 => {
                let active = (array.len() - dataset.num_masked()) as f64;
                array.iter().map(|v| v.abs()).sum::<f64>() / active
            }
            FomMetric::R1 => array.sum() / unmasked_sum(y, mask, |v| v.sqrt()),
            FomMetric::R1Log => array.sum() / unmasked_sum(y, mask, |v| v.sqrt().log10()),
            FomMetric::R2 => array.sum() / unmasked_sum(y, mask, |v| v.powi(2)),
            FomMetric::R2Log => array.sum() / unmasked_sum(y, mask, |v| v.log10().powi(2)),
        }
    }

    fn require_error<'a>(&self, dataset: &'a Dataset) -> Result<&'a Array1<f64>> {
        dataset.error().ok_or_else(|| FitError::MissingUncertainties {
            metric: self.as_str().to_string(),
        })
    }
}

impl fmt::Display for FomMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FomMetric {
    type Err = FitError;

    fn from_str(s: &str) -> Result<Self> {
        FomMetric::ALL
            .iter()
            .find(|m| m.as_str() == s)
            .copied()
            .ok_or_else(|| FitError::UnknownMetric(s.to_string()))
    }
}

fn elementwise(
    y: &Array1<f64>,
    y_sim: &Array1<f64>,
    f: impl Fn(f64, f64) -> f64,
) -> Array1<f64> {
    Array1::from_iter(y.iter().zip(y_sim.iter()).map(|(&ye, &ys)| f(ye, ys)))
}

/// Zero out masked entries so they contribute nothing to any sum.
fn zero_masked(mut array: Array1<f64>, mask: &[bool]) -> Array1<f64> {
    for (value, &masked) in array.iter_mut().zip(mask.iter()) {
        if masked {
            *value = 0.0;
        }
    }
    array
}

fn unmasked_range(y: &Array1<f64>, mask: &[bool]) -> (f64, f64) {
    y.iter().zip(mask.iter()).filter(|(_, &m)| !m).fold(
        (f64::INFINITY, f64::NEG_INFINITY),
        |(low, high), (&v, _)| (low.min(v), high.max(v)),
    )
}

fn unmasked_sum(y: &Array1<f64>, mask: &[bool], f: impl Fn(f64) -> f64) -> f64 {
    y.iter()
        .zip(mask.iter())
        .filter(|(_, &m)| !m)
        .map(|(&v, _)| f(v))
        .sum()
}

fn min_of(a: &Array1<f64>) -> f64 {
    a.iter().copied().fold(f64::INFINITY, f64::min)
}

fn max_of(a: &Array1<f64>) -> f64 {
    a.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn dataset(x: Array1<f64>, y: Array1<f64>) -> Dataset {
        Dataset::new(x, y, || Ok((array![0.0], array![0.0]))).unwrap()
    }

    #[test]
    fn test_metric_identifiers_round_trip() {
        for metric in FomMetric::ALL {
            assert_eq!(metric.as_str().parse::<FomMetric>().unwrap(), metric);
        }
        assert!(matches!(
            "nope".parse::<FomMetric>(),
            Err(FitError::UnknownMetric(_))
        ));
    }

    #[test]
    fn test_diff_array_and_reduction() {
        let ds = dataset(array![1.0, 2.0, 3.0], array![1.0, 8.0, 27.0]);
        let y_sim = array![1.0, 4.0, 9.0];
        let arr = FomMetric::Diff.array(&y_sim, &ds).unwrap();
        assert_eq!(arr, array![0.0, 4.0, 18.0]);
        assert_relative_eq!(FomMetric::Diff.reduce(&arr, &ds), 22.0 / 3.0);
    }

    #[test]
    fn test_masked_points_are_zeroed_and_excluded() {
        let mut ds = dataset(array![1.0, 2.0, 3.0], array![1.0, 8.0, 27.0]);
        ds.mask_above(2.0);
        let y_sim = array![1.0, 4.0, 9.0];
        let arr = FomMetric::Diff.array(&y_sim, &ds).unwrap();
        assert_eq!(arr, array![0.0, 4.0, 0.0]);
        assert_relative_eq!(FomMetric::Diff.reduce(&arr, &ds), 4.0 / 2.0);
    }

    #[test]
    fn test_diff_norm_is_clamped() {
        let ds = dataset(array![0.0, 1.0], array![0.5, 100.0]);
        let y_sim = array![10.0, 100.0];
        let arr = FomMetric::DiffNorm.array(&y_sim, &ds).unwrap();
        assert_relative_eq!(arr[0], 1.5); // |(0.5 - 10) / 1| clamped
        assert_relative_eq!(arr[1], 0.0);
    }

    #[test]
    fn test_range_norm_uses_unmasked_range() {
        let mut ds = dataset(array![0.0, 1.0, 2.0], array![0.0, 2.0, 100.0]);
        ds.mask_above(1.5); // drop the 100.0 from the range
        let y_sim = array![1.0, 1.0, 1.0];
        let arr = FomMetric::DiffRangeNorm.array(&y_sim, &ds).unwrap();
        assert_relative_eq!(arr[0], (0.0 - 1.0) / 2.0);
        assert_relative_eq!(arr[1], (2.0 - 1.0) / 2.0);
        assert_relative_eq!(arr[2], 0.0);
    }

    #[test]
    fn test_r2_normalizes_by_experimental_intensity() {
        let ds = dataset(array![0.0, 1.0], array![2.0, 4.0]);
        let y_sim = array![1.0, 5.0];
        let arr = FomMetric::R2.array(&y_sim, &ds).unwrap();
        assert_eq!(arr, array![1.0, 1.0]);
        assert_relative_eq!(FomMetric::R2.reduce(&arr, &ds), 2.0 / 20.0);
    }

    #[test]
    fn test_r1_zero_for_exact_match() {
        let ds = dataset(array![0.0, 1.0], array![4.0, 9.0]);
        let y_sim = array![4.0, 9.0];
        let arr = FomMetric::R1.array(&y_sim, &ds).unwrap();
        assert_relative_eq!(FomMetric::R1.reduce(&arr, &ds), 0.0);
    }

    #[test]
    fn test_chi_requires_uncertainties() {
        let ds = dataset(array![0.0, 1.0], array![1.0, 2.0]);
        let y_sim = array![1.0, 2.0];
        assert!(matches!(
            FomMetric::Chi.array(&y_sim, &ds),
            Err(FitError::MissingUncertainties { .. })
        ));
        assert!(FomMetric::Chi2.array(&y_sim, &ds).is_err());
    }

    #[test]
    fn test_chi2_weights_by_error() {
        let ds = Dataset::new(array![0.0, 1.0], array![1.0, 2.0], || {
            Ok((array![0.0], array![0.0]))
        })
        .unwrap()
        .with_error(array![0.5, 1.0])
        .unwrap();
        let y_sim = array![2.0, 2.0];
        let arr = FomMetric::Chi2.array(&y_sim, &ds).unwrap();
        assert_relative_eq!(arr[0], 4.0); // ((1 - 2) / 0.5)^2
        assert_relative_eq!(arr[1], 0.0);
        assert_relative_eq!(FomMetric::Chi2.reduce(&arr, &ds), 2.0);
    }

    #[test]
    fn test_log_metric() {
        let ds = dataset(array![0.0, 1.0], array![10.0, 100.0]);
        let y_sim = array![100.0, 100.0];
        let arr = FomMetric::Log.array(&y_sim, &ds).unwrap();
        assert_relative_eq!(arr[0], -1.0, epsilon = 1e-12);
        assert_relative_eq!(arr[1], 0.0, epsilon = 1e-12);
        assert_relative_eq!(FomMetric::Log.reduce(&arr, &ds), 0.5, epsilon = 1e-12);
    }
}
