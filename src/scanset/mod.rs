// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Collecting calibrated scans into a coherent input set for gridding.
//!
//! [`ScanSet`] is the boundary where per-scan failures stop propagating:
//! [`reduce_scans`] runs the baseline and calibration stages over many scans
//! in parallel, and a scan that fails any stage is excluded and recorded, not
//! fatal. Only run-level failures (nothing survived at all) abort a
//! reduction.

mod error;
#[cfg(test)]
mod tests;

pub use error::ScanSetError;

use indexmap::IndexMap;
use log::{debug, warn};
use rayon::prelude::*;
use serde::Serialize;

use crate::baseline::{subtract_baseline, BaselineConfig};
use crate::calibrate::{apply_calibration, CalibrationTable};
use crate::constants::{
    DEFAULT_MAX_FLAGGED_FRACTION, DEFAULT_MAX_MEAN_RMS, DEFAULT_MIN_TOTAL_VALID_SAMPLES,
};
use crate::gridding::GridConfig;
use crate::scan::Scan;

/// One excluded scan and the reason it was dropped. These end up in the map
/// provenance so data loss is auditable.
#[derive(Debug, Clone, Serialize)]
pub struct Exclusion {
    pub scan_id: usize,
    pub reason: String,
}

/// Aggregate quality statistics over the member scans.
#[derive(Debug, Clone, Serialize)]
pub struct ScanSetStatistics {
    pub num_scans: usize,
    pub total_valid_samples: usize,
    /// Fraction of all samples (valid or not) carrying a flag.
    pub flagged_fraction: f64,
    /// Mean per-scan robust RMS, in map units.
    pub mean_rms: f64,
}

/// Thresholds below/above which a reduction is flagged low quality.
#[derive(Debug, Clone, Serialize)]
pub struct QualityThresholds {
    pub max_mean_rms: f64,
    pub min_total_valid_samples: usize,
    pub max_flagged_fraction: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        QualityThresholds {
            max_mean_rms: DEFAULT_MAX_MEAN_RMS,
            min_total_valid_samples: DEFAULT_MIN_TOTAL_VALID_SAMPLES,
            max_flagged_fraction: DEFAULT_MAX_FLAGGED_FRACTION,
        }
    }
}

/// The calibrated scans feeding one map, keyed by scan id.
///
/// Member scans share one calibration epoch and overlap the configured map
/// boundary. Iteration order is insertion order, which keeps everything
/// downstream (gridding merges, provenance lists) deterministic.
#[derive(Debug, Default)]
pub struct ScanSet {
    epoch: u32,
    scans: IndexMap<usize, Scan>,
    exclusions: Vec<Exclusion>,
}

impl ScanSet {
    pub fn new(epoch: u32) -> ScanSet {
        ScanSet {
            epoch,
            scans: IndexMap::new(),
            exclusions: vec![],
        }
    }

    /// The calibration epoch shared by all member scans.
    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    /// Add a calibrated scan.
    ///
    /// Fails with [`ScanSetError::OutOfBounds`] when the scan's valid
    /// samples lie entirely outside the map (padded by the kernel truncation
    /// radius); this is non-fatal, the caller logs and excludes. Scans that
    /// were never calibrated, have no valid samples left, or reuse an
    /// existing id are likewise rejected.
    pub fn add(&mut self, scan: Scan, grid: &GridConfig) -> Result<(), ScanSetError> {
        let scan_id = scan.scan_id;
        if scan.flux().is_none() {
            return Err(ScanSetError::NotCalibrated { scan_id });
        }
        if scan.sky_bounds().is_none() {
            return Err(ScanSetError::NoValidSamples { scan_id });
        }
        if !grid.overlaps(&scan) {
            return Err(ScanSetError::OutOfBounds { scan_id });
        }
        if self.scans.contains_key(&scan_id) {
            return Err(ScanSetError::DuplicateScan { scan_id });
        }
        debug!(
            "Scan {scan_id}: joined the scan set with {} valid samples",
            scan.num_valid()
        );
        self.scans.insert(scan_id, scan);
        Ok(())
    }

    /// Record a scan as excluded from the reduction.
    pub fn exclude(&mut self, scan_id: usize, reason: impl ToString) {
        self.exclusions.push(Exclusion {
            scan_id,
            reason: reason.to_string(),
        });
    }

    pub fn scans(&self) -> impl Iterator<Item = &Scan> {
        self.scans.values()
    }

    pub fn get(&self, scan_id: usize) -> Option<&Scan> {
        self.scans.get(&scan_id)
    }

    pub fn scan_ids(&self) -> Vec<usize> {
        self.scans.keys().copied().collect()
    }

    pub fn exclusions(&self) -> &[Exclusion] {
        &self.exclusions
    }

    pub fn len(&self) -> usize {
        self.scans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scans.is_empty()
    }

    pub fn statistics(&self) -> ScanSetStatistics {
        let num_scans = self.scans.len();
        let total_samples: usize = self.scans().map(Scan::len).sum();
        let total_valid_samples: usize = self.scans().map(Scan::num_valid).sum();
        let flagged_fraction = if total_samples > 0 {
            (total_samples - total_valid_samples) as f64 / total_samples as f64
        } else {
            0.0
        };
        let rmses: Vec<f64> = self.scans().filter_map(|s| s.quality().rms).collect();
        let mean_rms = if rmses.is_empty() {
            f64::NAN
        } else {
            rmses.iter().sum::<f64>() / rmses.len() as f64
        };
        ScanSetStatistics {
            num_scans,
            total_valid_samples,
            flagged_fraction,
            mean_rms,
        }
    }

    /// Whether the reduction falls below the configured quality thresholds.
    pub fn is_low_quality(&self, thresholds: &QualityThresholds) -> bool {
        let stats = self.statistics();
        stats.mean_rms > thresholds.max_mean_rms
            || stats.total_valid_samples < thresholds.min_total_valid_samples
            || stats.flagged_fraction > thresholds.max_flagged_fraction
    }
}

/// Run the per-scan reduction stages and collect the survivors.
///
/// Baseline subtraction and calibration run per scan on the rayon pool (the
/// stages are independent across scans; the calibration table is the only
/// shared state and it is read-only). A scan failing either stage, or the
/// bounds check, is excluded and recorded with its reason. Fails with
/// [`ScanSetError::NoUsableScans`] only when nothing survives.
pub fn reduce_scans(
    scans: Vec<Scan>,
    epoch: u32,
    table: &CalibrationTable,
    baseline_config: &BaselineConfig,
    grid_config: &GridConfig,
) -> Result<ScanSet, ScanSetError> {
    let num_input = scans.len();
    let processed: Vec<Result<Scan, (usize, String)>> = scans
        .into_par_iter()
        .map(|mut scan| {
            let scan_id = scan.scan_id;
            subtract_baseline(&mut scan, baseline_config)
                .map_err(|e| (scan_id, e.to_string()))?;
            apply_calibration(&mut scan, epoch, table).map_err(|e| (scan_id, e.to_string()))?;
            Ok(scan)
        })
        .collect();

    let mut scan_set = ScanSet::new(epoch);
    for result in processed {
        match result {
            Ok(scan) => {
                let scan_id = scan.scan_id;
                if let Err(e) = scan_set.add(scan, grid_config) {
                    warn!("Scan {scan_id} excluded: {e}");
                    scan_set.exclude(scan_id, e);
                }
            }
            Err((scan_id, reason)) => {
                warn!("Scan {scan_id} excluded: {reason}");
                scan_set.exclude(scan_id, reason);
            }
        }
    }

    if scan_set.is_empty() {
        return Err(ScanSetError::NoUsableScans {
            num_excluded: num_input,
        });
    }
    Ok(scan_set)
}
