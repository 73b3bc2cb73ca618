// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Flux calibration.
//!
//! Converts baseline-subtracted instrument counts to physical flux density
//! \[Jy\], correcting for atmospheric opacity along the line of sight. The
//! gain and opacity values come from a [`CalibrationTable`] filled in by the
//! calibration-coefficient collaborator (typically a fitted light curve of a
//! standard calibrator source); this module consumes them as a pure lookup.

mod error;

pub use error::CalibrateError;

use indexmap::IndexMap;
use log::debug;
use ndarray::Array1;
use serde::Serialize;

use crate::math::median;
use crate::scan::{SampleFlag, Scan};

/// The airmass towards a given elevation (radians): the plane-parallel
/// (secant) approximation, 1 / sin(el).
///
/// Only meaningful for elevations in (0, pi/2]; the caller is responsible for
/// rejecting anything else.
pub fn airmass(elevation: f64) -> f64 {
    1.0 / elevation.sin()
}

/// The counts-to-Jy conversion for one feed at one calibration epoch.
///
/// Shared read-only across all scans of that feed/epoch; lives for the whole
/// reduction session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationCoefficient {
    pub feed: usize,
    pub epoch: u32,
    /// Gain \[Jy/count\].
    pub gain: f64,
    /// One-sigma uncertainty on the gain \[Jy/count\].
    pub gain_uncertainty: f64,
    /// Zenith atmospheric opacity at the epoch of observation.
    pub opacity_tau: f64,
}

/// Calibration coefficients looked up by (feed, epoch).
///
/// Insertion order is preserved so that provenance records list coefficients
/// deterministically.
#[derive(Debug, Clone, Default)]
pub struct CalibrationTable {
    coeffs: IndexMap<(usize, u32), CalibrationCoefficient>,
}

impl CalibrationTable {
    pub fn new() -> CalibrationTable {
        CalibrationTable::default()
    }

    /// Add a coefficient, replacing any previous entry for the same feed and
    /// epoch.
    pub fn insert(&mut self, coeff: CalibrationCoefficient) -> Option<CalibrationCoefficient> {
        self.coeffs.insert((coeff.feed, coeff.epoch), coeff)
    }

    pub fn get(&self, feed: usize, epoch: u32) -> Option<&CalibrationCoefficient> {
        self.coeffs.get(&(feed, epoch))
    }

    pub fn len(&self) -> usize {
        self.coeffs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coeffs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CalibrationCoefficient> {
        self.coeffs.values()
    }
}

/// Calibrate one baseline-subtracted scan in place.
///
/// Per sample, `flux = subtracted_power * gain * exp(tau * airmass)`, with
/// the uncertainty combining the gain uncertainty and the scan's statistical
/// noise:
///
/// ```text
/// flux_err^2 = (subtracted_power * gain_uncertainty * atm)^2
///            + (rms * gain * atm)^2,          atm = exp(tau * airmass)
/// ```
///
/// Samples whose elevation makes the airmass undefined (sin(el) <= 0, or a
/// non-finite elevation) are flagged [`SampleFlag::BadWeather`] and get NaN
/// flux. Fails with [`CalibrateError::MissingCalibration`] when the table has
/// no entry for the scan's feed at `epoch`; the caller excludes such a scan
/// rather than defaulting the coefficient.
///
/// On success the scan's quality RMS is rescaled from counts to Jy using the
/// median atmospheric correction over its valid samples.
pub fn apply_calibration(
    scan: &mut Scan,
    epoch: u32,
    table: &CalibrationTable,
) -> Result<(), CalibrateError> {
    let scan_id = scan.scan_id;
    let coeff = table
        .get(scan.feed, epoch)
        .ok_or(CalibrateError::MissingCalibration {
            scan_id,
            feed: scan.feed,
            epoch,
        })?;
    let (subtracted, rms) = match (scan.baseline_subtracted.as_ref(), scan.quality.rms) {
        (Some(s), Some(r)) => (s, r),
        _ => return Err(CalibrateError::NotBaselined { scan_id }),
    };

    let n = scan.len();
    let mut flux = Array1::zeros(n);
    let mut flux_uncertainty = Array1::zeros(n);
    let mut corrections = Vec::with_capacity(n);
    let mut bad_elevation = Vec::new();
    for i in 0..n {
        let sin_el = scan.elevation()[i].sin();
        if !(sin_el > 0.0) {
            bad_elevation.push(i);
            flux[i] = f64::NAN;
            flux_uncertainty[i] = f64::NAN;
            continue;
        }
        let atm = (coeff.opacity_tau * airmass(scan.elevation()[i])).exp();
        let gain_term = subtracted[i] * coeff.gain_uncertainty * atm;
        let noise_term = rms * coeff.gain * atm;
        flux[i] = subtracted[i] * coeff.gain * atm;
        flux_uncertainty[i] = (gain_term * gain_term + noise_term * noise_term).sqrt();
        if scan.flag(i).is_valid() {
            corrections.push(coeff.gain * atm);
        }
    }
    for &i in &bad_elevation {
        if scan.flag(i).is_valid() {
            scan.set_flag(i, SampleFlag::BadWeather);
        }
    }
    if !bad_elevation.is_empty() {
        debug!(
            "Scan {scan_id}: {} samples with unusable elevations flagged",
            bad_elevation.len()
        );
    }

    // The scan's RMS moves into map units with the flux column.
    if !corrections.is_empty() {
        scan.quality.rms = Some(rms * median(&corrections));
    }
    scan.flux = Some(flux);
    scan.flux_uncertainty = Some(flux_uncertainty);
    Ok(())
}
