// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Baseline estimation and subtraction.
//!
//! A single-dish power series drifts slowly with receiver gain and sky
//! emission. This module fits a low-order polynomial to each scan's power
//! versus time, iteratively re-flagging outliers against the latest fit, and
//! stores the baseline-subtracted power alongside the raw column.

mod error;

pub use error::BaselineError;

use log::debug;
use vec1::Vec1;

use crate::constants::{
    DEFAULT_BASELINE_MAX_ITERATIONS, DEFAULT_BASELINE_ORDER, DEFAULT_EDGE_FRACTION,
    DEFAULT_MAD_THRESHOLD, DEFAULT_MIN_VALID_SAMPLES,
};
use crate::math::{median, median_absolute_deviation, polyfit, polyval, robust_sigma};
use crate::scan::{SampleFlag, Scan};

/// Configuration for baseline fitting.
#[derive(Debug, Clone)]
pub struct BaselineConfig {
    /// Order of the fitted polynomial.
    pub poly_order: usize,

    /// Samples deviating from the fit by more than this many MADs are flagged
    /// as outliers.
    pub mad_threshold: f64,

    /// Fraction of samples at either end of the scan that is always flagged
    /// [`SampleFlag::Edge`].
    pub edge_fraction: f64,

    /// Cap on the number of fits. Reaching the cap with outliers still being
    /// found marks the scan `baseline_unstable`.
    pub max_iterations: u32,

    /// Minimum number of valid samples needed to fit at all.
    pub min_valid_samples: usize,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        BaselineConfig {
            poly_order: DEFAULT_BASELINE_ORDER,
            mad_threshold: DEFAULT_MAD_THRESHOLD,
            edge_fraction: DEFAULT_EDGE_FRACTION,
            max_iterations: DEFAULT_BASELINE_MAX_ITERATIONS,
            min_valid_samples: DEFAULT_MIN_VALID_SAMPLES,
        }
    }
}

/// A fitted per-scan baseline: a polynomial over centred and scaled time.
///
/// Owned by the [`Scan`] it was fit to and replaced wholesale on refit.
#[derive(Debug, Clone)]
pub struct BaselineModel {
    /// Polynomial coefficients, lowest order first, over the scaled time
    /// coordinate.
    coeffs: Vec1<f64>,
    t_mid: f64,
    t_scale: f64,
}

impl BaselineModel {
    /// The modelled baseline power at timestamp `t` (seconds).
    pub fn evaluate(&self, t: f64) -> f64 {
        polyval(self.coeffs.as_slice(), (t - self.t_mid) / self.t_scale)
    }

    pub fn order(&self) -> usize {
        self.coeffs.len() - 1
    }

    pub(crate) fn coeffs(&self) -> &[f64] {
        self.coeffs.as_slice()
    }
}

/// Fit and subtract the baseline of one scan in place.
///
/// The first and last `edge_fraction` of samples are flagged
/// [`SampleFlag::Edge`] unconditionally. Outliers beyond `mad_threshold` MADs
/// (first against the median power, then against each successive fit's
/// residuals) are flagged [`SampleFlag::Rfi`]. The fit is repeated up to
/// `max_iterations` times; running out of iterations while still finding new
/// outliers is not an error, but is recorded as `baseline_unstable` in the
/// scan's quality record.
///
/// On success the scan carries a [`BaselineModel`], a `baseline_subtracted`
/// column covering every sample (flagged ones included, for inspection), and
/// a robust residual RMS in its quality record. `raw_power` is never
/// modified.
pub fn subtract_baseline(scan: &mut Scan, config: &BaselineConfig) -> Result<(), BaselineError> {
    let scan_id = scan.scan_id;
    let n = scan.len();

    // Edge flagging comes first: acceleration and deceleration artefacts are
    // not outliers, they are always there.
    let num_edge = ((n as f64 * config.edge_fraction) as usize).min(n / 2);
    for i in (0..num_edge).chain(n - num_edge..n) {
        if scan.flag(i).is_valid() {
            scan.set_flag(i, SampleFlag::Edge);
        }
    }

    // First outlier pass against the median of the remaining raw powers: the
    // fit has to start from something not skewed by strong sources or RFI.
    let powers: Vec<f64> = scan
        .valid_indices()
        .iter()
        .map(|&i| scan.raw_power()[i])
        .collect();
    check_enough(scan_id, powers.len(), config)?;
    let centre = median(&powers);
    let mad = median_absolute_deviation(&powers, centre);
    let mut num_outliers = 0;
    for i in scan.valid_indices() {
        if (scan.raw_power()[i] - centre).abs() > config.mad_threshold * mad {
            scan.set_flag(i, SampleFlag::Rfi);
            num_outliers += 1;
        }
    }
    if num_outliers > 0 {
        debug!("Scan {scan_id}: {num_outliers} outliers flagged against the median power");
    }

    // Scale time onto [-1, 1] to keep the normal equations well conditioned.
    let (t_first, t_last) = scan.time_range();
    let t_mid = 0.5 * (t_first + t_last);
    let half_range = 0.5 * (t_last - t_first);
    let t_scale = if half_range > 0.0 { half_range } else { 1.0 };

    // Iterative refinement: fit, re-flag against the fit residuals, refit.
    // At least one fit always happens, whatever the configured cap.
    let max_iterations = config.max_iterations.max(1);
    let mut model = None;
    let mut iterations = 0;
    let mut unstable = false;
    while iterations < max_iterations {
        let valid = scan.valid_indices();
        check_enough(scan_id, valid.len(), config)?;

        let ts: Vec<f64> = valid
            .iter()
            .map(|&i| (scan.time()[i] - t_mid) / t_scale)
            .collect();
        let ps: Vec<f64> = valid.iter().map(|&i| scan.raw_power()[i]).collect();
        let coeffs = polyfit(&ts, &ps, config.poly_order).ok_or(BaselineError::SingularFit {
            scan_id,
            order: config.poly_order,
        })?;
        iterations += 1;

        let residuals: Vec<f64> = ts
            .iter()
            .zip(ps.iter())
            .map(|(&t, &p)| p - polyval(&coeffs, t))
            .collect();
        let res_centre = median(&residuals);
        let res_mad = median_absolute_deviation(&residuals, res_centre);

        let new_outliers: Vec<usize> = valid
            .iter()
            .zip(residuals.iter())
            .filter(|&(_, &r)| (r - res_centre).abs() > config.mad_threshold * res_mad)
            .map(|(&i, _)| i)
            .collect();

        model = Some(BaselineModel {
            coeffs: Vec1::try_from_vec(coeffs).expect("polyfit returns order+1 >= 1 coefficients"),
            t_mid,
            t_scale,
        });

        if new_outliers.is_empty() {
            break;
        }
        debug!(
            "Scan {scan_id}: fit iteration {iterations} flagged {} new outliers",
            new_outliers.len()
        );
        for i in new_outliers {
            scan.set_flag(i, SampleFlag::Rfi);
        }
        if iterations == max_iterations {
            // Out of iterations with outliers still turning up: accept the
            // last fit and record the instability.
            unstable = true;
        }
    }
    let model = model.expect("the fit loop always runs at least once");

    // The subtracted column covers every sample, flagged or not; flagged
    // samples are retained for inspection.
    let subtracted = scan.time().mapv(|t| -model.evaluate(t)) + scan.raw_power();
    let valid_residuals: Vec<f64> = scan
        .valid_indices()
        .iter()
        .map(|&i| subtracted[i])
        .collect();
    check_enough(scan_id, valid_residuals.len(), config)?;
    let rms = robust_sigma(&valid_residuals);

    scan.quality.baseline_unstable = unstable;
    scan.quality.baseline_iterations = iterations;
    scan.quality.rms = Some(rms);
    scan.baseline = Some(model);
    scan.baseline_subtracted = Some(subtracted);
    Ok(())
}

fn check_enough(
    scan_id: usize,
    num_valid: usize,
    config: &BaselineConfig,
) -> Result<(), BaselineError> {
    // A fit also needs more points than coefficients, whatever the
    // configured minimum says.
    let min_valid = config.min_valid_samples.max(config.poly_order + 1);
    if num_valid < min_valid {
        Err(BaselineError::InsufficientData {
            scan_id,
            num_valid,
            min_valid,
        })
    } else {
        Ok(())
    }
}
