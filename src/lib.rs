// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Scan calibration and map gridding for single-dish radio telescopes.

The crate turns streams of per-sample (time, sky-position, raw-power) tuples
from on-the-fly mapping observations into flux-calibrated sky maps: per-scan
baseline subtraction, gain/opacity calibration, and convolutional gridding
onto a uniform grid with weight and coverage bookkeeping.

The usual entry point is [`make_map`]; the individual stages
([`SampleStream`] validation, [`baseline::subtract_baseline`],
[`calibrate::apply_calibration`], [`scanset::reduce_scans`],
[`gridding::grid_scanset`]) are public for callers that need to step through
a reduction themselves.
 */

pub mod baseline;
pub mod calibrate;
pub mod constants;
mod error;
pub mod gridding;
pub mod map;
pub(crate) mod math;
pub mod scan;
pub mod scanset;

// Re-exports.
pub use baseline::BaselineConfig;
pub use calibrate::{CalibrationCoefficient, CalibrationTable};
pub use error::ReductionError;
pub use gridding::GridConfig;
pub use map::{make_map, MapProduct, Provenance};
pub use scan::{Sample, SampleFlag, SampleStream, Scan, StreamConfig};
pub use scanset::{QualityThresholds, ScanSet};
