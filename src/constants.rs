// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Useful constants.

All constants *must* be double precision. `sd_imager` should do as many
calculations as possible in double precision; nothing here is ever stored at a
lower precision.
 */

/// The default polynomial order used when fitting a scan's baseline. The
/// baseline drift over a single on-the-fly scan is slow; a straight line is
/// almost always enough.
pub const DEFAULT_BASELINE_ORDER: usize = 1;

/// Samples whose power deviates from the running baseline fit by more than
/// this many MADs are flagged as outliers and excluded from the fit.
pub const DEFAULT_MAD_THRESHOLD: f64 = 5.0;

/// The fraction of samples at either end of a scan that is always flagged as
/// edge; the telescope is accelerating or decelerating there.
pub const DEFAULT_EDGE_FRACTION: f64 = 0.05;

/// The maximum number of baseline refits. Hitting this cap is not an error;
/// the scan is marked `baseline_unstable` instead.
pub const DEFAULT_BASELINE_MAX_ITERATIONS: u32 = 3;

/// Scans with fewer valid samples than this after flagging cannot be
/// baseline-fitted and are excluded.
pub const DEFAULT_MIN_VALID_SAMPLES: usize = 10;

/// Streams whose median sample spacing exceeds this many seconds are too
/// sparse to baseline-fit reliably.
pub const DEFAULT_MAX_MEDIAN_SPACING: f64 = 1.0;

/// The gridding kernel is truncated at this multiple of its FWHM.
pub const DEFAULT_KERNEL_TRUNCATION_FWHM: f64 = 3.0;

/// The default grid cell size is the kernel FWHM divided by this factor
/// (Nyquist-adequate sampling of the beam).
pub const DEFAULT_CELLS_PER_FWHM: f64 = 3.0;

/// Conversion between the FWHM of a Gaussian and its standard deviation,
/// i.e. 2 sqrt(2 ln 2).
pub const FWHM_TO_SIGMA: f64 = 2.354820045030949;

/// Scale factor that turns the median absolute deviation of normally
/// distributed data into a standard deviation.
pub const MAD_TO_SIGMA: f64 = 1.4826;

/// Reductions whose mean per-scan RMS exceeds this value (in the flux unit of
/// the map) are flagged low quality.
pub const DEFAULT_MAX_MEAN_RMS: f64 = f64::INFINITY;

/// Reductions with fewer valid samples than this across all scans are flagged
/// low quality.
pub const DEFAULT_MIN_TOTAL_VALID_SAMPLES: usize = 100;

/// Reductions where more than this fraction of all samples is flagged are
/// flagged low quality.
pub const DEFAULT_MAX_FLAGGED_FRACTION: f64 = 0.5;
