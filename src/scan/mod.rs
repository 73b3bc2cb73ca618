// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Per-scan sample storage and stream validation.
//!
//! The ingestion collaborator hands over one time-ordered stream of samples
//! per telescope pass. [`SampleStream`] is the validated form of that stream;
//! [`Scan`] is its columnar representation, which the baseline and
//! calibration stages then mutate in place (flags and derived columns only;
//! raw power is never overwritten).

mod error;
#[cfg(test)]
mod tests;

pub use error::ScanError;

use ndarray::Array1;
use serde::Serialize;

use crate::baseline::BaselineModel;
use crate::constants::DEFAULT_MAX_MEDIAN_SPACING;
use crate::math::median;

/// The per-sample quality flag. Only [`SampleFlag::Valid`] samples take part
/// in fitting, calibration and gridding; everything else is retained for
/// inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SampleFlag {
    Valid,
    BadWeather,
    Saturated,
    Rfi,
    Edge,
}

impl SampleFlag {
    pub fn is_valid(self) -> bool {
        matches!(self, SampleFlag::Valid)
    }
}

/// One raw detector sample, as supplied by the ingestion collaborator.
///
/// Timestamps are UTC seconds; positions are sky offsets in the mapping frame
/// (e.g. cross-elevation/elevation offsets, or RA/Dec) in degrees; elevation
/// is in radians; power is in uncalibrated instrument counts.
#[derive(Debug, Clone, Copy)]
pub struct Sample {
    pub timestamp: f64,
    pub sky_x: f64,
    pub sky_y: f64,
    pub elevation: f64,
    pub raw_power: f64,
}

/// Configuration for stream validation.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Streams whose median sample spacing exceeds this many seconds are
    /// rejected.
    pub max_median_spacing: f64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        StreamConfig {
            max_median_spacing: DEFAULT_MAX_MEDIAN_SPACING,
        }
    }
}

/// A validated, time-ordered sequence of samples for one scan.
///
/// Construction performs the ordering and sparsity checks; a
/// [`SampleStream`] that exists is safe to turn into a [`Scan`].
#[derive(Debug, Clone)]
pub struct SampleStream {
    scan_id: usize,
    feed: usize,
    samples: Vec<Sample>,
}

impl SampleStream {
    /// Validate a raw sample stream.
    ///
    /// Fails with [`ScanError::Ordering`] if timestamps are not strictly
    /// increasing, and with [`ScanError::Sparsity`] if the median sample
    /// spacing exceeds the configured threshold. Construction has no side
    /// effects beyond the returned object.
    pub fn new(
        scan_id: usize,
        feed: usize,
        samples: Vec<Sample>,
        config: &StreamConfig,
    ) -> Result<SampleStream, ScanError> {
        if samples.is_empty() {
            return Err(ScanError::NoSamples { scan_id });
        }

        for (index, pair) in samples.windows(2).enumerate() {
            // `!(a < b)` rather than `a >= b` so NaN timestamps also trip the
            // ordering check.
            if !(pair[0].timestamp < pair[1].timestamp) {
                return Err(ScanError::Ordering {
                    scan_id,
                    index: index + 1,
                    previous: pair[0].timestamp,
                    current: pair[1].timestamp,
                });
            }
        }

        if samples.len() > 1 {
            let spacings: Vec<f64> = samples
                .windows(2)
                .map(|pair| pair[1].timestamp - pair[0].timestamp)
                .collect();
            let median_spacing = median(&spacings);
            if median_spacing > config.max_median_spacing {
                return Err(ScanError::Sparsity {
                    scan_id,
                    median_spacing,
                    max_spacing: config.max_median_spacing,
                });
            }
        }

        Ok(SampleStream {
            scan_id,
            feed,
            samples,
        })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Convert the stream into columnar [`Scan`] storage.
    ///
    /// Samples with a non-finite power reading are flagged
    /// [`SampleFlag::Saturated`]; samples with non-finite sky positions or
    /// elevations are flagged [`SampleFlag::Rfi`]. The samples themselves are
    /// kept.
    pub fn into_scan(self) -> Scan {
        let SampleStream {
            scan_id,
            feed,
            samples,
        } = self;

        let n = samples.len();
        let mut time = Vec::with_capacity(n);
        let mut sky_x = Vec::with_capacity(n);
        let mut sky_y = Vec::with_capacity(n);
        let mut elevation = Vec::with_capacity(n);
        let mut raw_power = Vec::with_capacity(n);
        let mut flags = Vec::with_capacity(n);
        for s in samples {
            time.push(s.timestamp);
            sky_x.push(s.sky_x);
            sky_y.push(s.sky_y);
            elevation.push(s.elevation);
            raw_power.push(s.raw_power);
            flags.push(if !s.raw_power.is_finite() {
                SampleFlag::Saturated
            } else if !s.sky_x.is_finite() || !s.sky_y.is_finite() || !s.elevation.is_finite() {
                SampleFlag::Rfi
            } else {
                SampleFlag::Valid
            });
        }

        Scan {
            scan_id,
            feed,
            time: Array1::from_vec(time),
            sky_x: Array1::from_vec(sky_x),
            sky_y: Array1::from_vec(sky_y),
            elevation: Array1::from_vec(elevation),
            raw_power: Array1::from_vec(raw_power),
            flags,
            baseline: None,
            baseline_subtracted: None,
            flux: None,
            flux_uncertainty: None,
            quality: ScanQuality::default(),
        }
    }
}

/// Per-scan data quality bookkeeping, filled in by the baseline stage.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanQuality {
    /// The iterative baseline refinement hit its iteration cap while still
    /// finding new outliers. The last fit was accepted regardless.
    pub baseline_unstable: bool,

    /// The number of baseline fits performed.
    pub baseline_iterations: u32,

    /// Robust RMS of the baseline-fit residuals over valid samples, in the
    /// same units as the power column at the time it was computed.
    pub rms: Option<f64>,
}

/// One scan in columnar storage: one `Array1` per sample field, plus derived
/// columns filled in by the pipeline stages.
#[derive(Debug, Clone)]
pub struct Scan {
    pub scan_id: usize,
    pub feed: usize,
    time: Array1<f64>,
    sky_x: Array1<f64>,
    sky_y: Array1<f64>,
    elevation: Array1<f64>,
    raw_power: Array1<f64>,
    flags: Vec<SampleFlag>,
    pub(crate) baseline: Option<BaselineModel>,
    pub(crate) baseline_subtracted: Option<Array1<f64>>,
    pub(crate) flux: Option<Array1<f64>>,
    pub(crate) flux_uncertainty: Option<Array1<f64>>,
    pub(crate) quality: ScanQuality,
}

impl Scan {
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn time(&self) -> &Array1<f64> {
        &self.time
    }

    pub fn sky_x(&self) -> &Array1<f64> {
        &self.sky_x
    }

    pub fn sky_y(&self) -> &Array1<f64> {
        &self.sky_y
    }

    pub fn elevation(&self) -> &Array1<f64> {
        &self.elevation
    }

    pub fn raw_power(&self) -> &Array1<f64> {
        &self.raw_power
    }

    pub fn flags(&self) -> &[SampleFlag] {
        &self.flags
    }

    pub fn flag(&self, index: usize) -> SampleFlag {
        self.flags[index]
    }

    pub(crate) fn set_flag(&mut self, index: usize, flag: SampleFlag) {
        self.flags[index] = flag;
    }

    /// Indices of samples still flagged valid.
    pub fn valid_indices(&self) -> Vec<usize> {
        self.flags
            .iter()
            .enumerate()
            .filter(|(_, f)| f.is_valid())
            .map(|(i, _)| i)
            .collect()
    }

    pub fn num_valid(&self) -> usize {
        self.flags.iter().filter(|f| f.is_valid()).count()
    }

    pub fn num_flagged(&self) -> usize {
        self.len() - self.num_valid()
    }

    /// The fitted baseline model, if the baseline stage has run.
    pub fn baseline(&self) -> Option<&BaselineModel> {
        self.baseline.as_ref()
    }

    /// Baseline-subtracted power, if the baseline stage has run.
    pub fn baseline_subtracted(&self) -> Option<&Array1<f64>> {
        self.baseline_subtracted.as_ref()
    }

    /// Calibrated flux density per sample \[Jy\], if the calibration stage
    /// has run.
    pub fn flux(&self) -> Option<&Array1<f64>> {
        self.flux.as_ref()
    }

    /// One-sigma uncertainty on [`Scan::flux`].
    pub fn flux_uncertainty(&self) -> Option<&Array1<f64>> {
        self.flux_uncertainty.as_ref()
    }

    pub fn quality(&self) -> &ScanQuality {
        &self.quality
    }

    /// First and last timestamps of the scan.
    pub fn time_range(&self) -> (f64, f64) {
        // A Scan always has at least one sample.
        (self.time[0], self.time[self.time.len() - 1])
    }

    /// Sky bounding box of the valid samples: ((min_x, max_x), (min_y,
    /// max_y)). `None` when no valid samples remain.
    pub fn sky_bounds(&self) -> Option<((f64, f64), (f64, f64))> {
        let mut bounds: Option<((f64, f64), (f64, f64))> = None;
        for (i, flag) in self.flags.iter().enumerate() {
            if !flag.is_valid() {
                continue;
            }
            let (x, y) = (self.sky_x[i], self.sky_y[i]);
            bounds = Some(match bounds {
                None => ((x, x), (y, y)),
                Some(((x0, x1), (y0, y1))) => {
                    ((x0.min(x), x1.max(x)), (y0.min(y), y1.max(y)))
                }
            });
        }
        bounds
    }
}
