// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Final map assembly.
//!
//! A [`MapProduct`] is the read-only output of a reduction run: the image
//! and its weight/coverage maps, the grid geometry, and the provenance
//! needed to audit which scans and calibration coefficients produced it.
//! Serialization to any particular image format is the output consumer's
//! business, not ours.

use hifitime::Epoch;
use itertools::Itertools;
use ndarray::Array2;
use serde::Serialize;

use crate::baseline::BaselineConfig;
use crate::calibrate::{CalibrationCoefficient, CalibrationTable};
use crate::error::ReductionError;
use crate::gridding::{grid_scanset, GridAccumulator, GridConfig};
use crate::scan::Scan;
use crate::scanset::{reduce_scans, Exclusion, QualityThresholds, ScanSet, ScanSetStatistics};

/// Everything that went into a map: contributing scans, the coefficients
/// they were calibrated with, and every scan that was excluded along with
/// the reason.
#[derive(Debug, Clone, Serialize)]
pub struct Provenance {
    /// Ids of the scans that contributed samples, in gridding order.
    pub scan_ids: Vec<usize>,

    /// The calibration epoch of the reduction.
    pub epoch: u32,

    /// Calibration coefficients actually used, one per contributing feed.
    pub coefficients: Vec<CalibrationCoefficient>,

    /// Scans dropped from the reduction, with reasons.
    pub excluded: Vec<Exclusion>,

    /// First and last sample timestamps over all contributing scans, UTC
    /// seconds.
    pub time_range: Option<(f64, f64)>,
}

impl Provenance {
    /// The observation time range as calendar epochs.
    pub fn time_range_epochs(&self) -> Option<(Epoch, Epoch)> {
        self.time_range.map(|(start, end)| {
            (
                Epoch::from_unix_seconds(start),
                Epoch::from_unix_seconds(end),
            )
        })
    }
}

/// The final output of a reduction run. Immutable once assembled.
#[derive(Debug)]
pub struct MapProduct {
    image: Array2<f64>,
    weight: Array2<f64>,
    coverage: Array2<u64>,
    grid_origin: (f64, f64),
    cell_size: f64,
    shape: (usize, usize),
    units: String,
    statistics: ScanSetStatistics,
    low_quality: bool,
    provenance: Provenance,
}

impl MapProduct {
    /// Package a gridded accumulation into the final product.
    pub fn assemble(
        grid: &GridAccumulator,
        scan_set: &ScanSet,
        config: &GridConfig,
        table: &CalibrationTable,
        thresholds: &QualityThresholds,
    ) -> MapProduct {
        let scan_ids = scan_set.scan_ids();

        // One coefficient per contributing feed; scans of the same feed
        // share theirs.
        let coefficients: Vec<CalibrationCoefficient> = scan_set
            .scans()
            .map(|scan| scan.feed)
            .unique()
            .filter_map(|feed| table.get(feed, scan_set.epoch()).cloned())
            .collect();

        let time_range = scan_set
            .scans()
            .map(Scan::time_range)
            .reduce(|(start, end), (s, e)| (start.min(s), end.max(e)));

        MapProduct {
            image: grid.image(),
            weight: grid.weight().clone(),
            coverage: grid.coverage().clone(),
            grid_origin: config.origin,
            cell_size: config.cell_size,
            shape: config.shape,
            units: "Jy/beam".to_string(),
            statistics: scan_set.statistics(),
            low_quality: scan_set.is_low_quality(thresholds),
            provenance: Provenance {
                scan_ids,
                epoch: scan_set.epoch(),
                coefficients,
                excluded: scan_set.exclusions().to_vec(),
                time_range,
            },
        }
    }

    /// The flux-calibrated image, `[iy, ix]`; NaN marks cells with no data.
    pub fn image(&self) -> &Array2<f64> {
        &self.image
    }

    /// Accumulated gridding weight per cell.
    pub fn weight(&self) -> &Array2<f64> {
        &self.weight
    }

    /// Number of samples contributing to each cell.
    pub fn coverage(&self) -> &Array2<u64> {
        &self.coverage
    }

    /// Sky position of the centre of cell (0, 0).
    pub fn grid_origin(&self) -> (f64, f64) {
        self.grid_origin
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// (num_x, num_y) of the grid.
    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    pub fn units(&self) -> &str {
        &self.units
    }

    pub fn statistics(&self) -> &ScanSetStatistics {
        &self.statistics
    }

    /// Whether the reduction fell below the configured quality thresholds.
    pub fn is_low_quality(&self) -> bool {
        self.low_quality
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }
}

/// The whole pipeline in one call: reduce, grid, assemble.
///
/// Per-scan failures are excluded and recorded in the product's provenance;
/// only run-level failures (no usable scans, an empty grid) are returned as
/// errors.
pub fn make_map(
    scans: Vec<Scan>,
    epoch: u32,
    table: &CalibrationTable,
    baseline_config: &BaselineConfig,
    grid_config: &GridConfig,
    thresholds: &QualityThresholds,
) -> Result<MapProduct, ReductionError> {
    let scan_set = reduce_scans(scans, epoch, table, baseline_config, grid_config)?;
    let grid = grid_scanset(&scan_set, grid_config)?;
    Ok(MapProduct::assemble(
        &grid, &scan_set, grid_config, table, thresholds,
    ))
}
