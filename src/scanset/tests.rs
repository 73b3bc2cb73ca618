// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use approx::assert_abs_diff_eq;

use super::*;
use crate::calibrate::CalibrationCoefficient;
use crate::scan::{Sample, SampleStream, StreamConfig};

const EPOCH: u32 = 1;

/// A raw scan sweeping x over [x_start, x_start + 5) at constant y, with
/// smooth noise so the per-scan RMS is non-zero.
fn raw_scan(scan_id: usize, feed: usize, x_start: f64, y: f64) -> Scan {
    let samples: Vec<Sample> = (0..100)
        .map(|i| Sample {
            timestamp: 0.1 * i as f64,
            sky_x: x_start + 0.05 * i as f64,
            sky_y: y,
            elevation: 0.8,
            raw_power: 1000.0 + 0.5 * (0.9 * i as f64).sin(),
        })
        .collect();
    SampleStream::new(scan_id, feed, samples, &StreamConfig::default())
        .unwrap()
        .into_scan()
}

fn test_table() -> CalibrationTable {
    let mut table = CalibrationTable::new();
    table.insert(CalibrationCoefficient {
        feed: 0,
        epoch: EPOCH,
        gain: 2.0,
        gain_uncertainty: 0.02,
        opacity_tau: 0.05,
    });
    table
}

/// A 10x10-degree-ish map around the scans used in these tests.
fn test_grid() -> GridConfig {
    GridConfig::new((30, 30), (0.0, 0.0), 1.0)
}

#[test]
fn test_reduce_scans_happy_path() {
    let scans = vec![raw_scan(0, 0, 0.0, 2.0), raw_scan(1, 0, 0.0, 3.0)];
    let scan_set = reduce_scans(
        scans,
        EPOCH,
        &test_table(),
        &BaselineConfig::default(),
        &test_grid(),
    )
    .unwrap();

    assert_eq!(scan_set.len(), 2);
    assert_eq!(scan_set.scan_ids(), vec![0, 1]);
    assert!(scan_set.exclusions().is_empty());
    for scan in scan_set.scans() {
        assert!(scan.flux().is_some());
        assert!(scan.quality().rms.is_some());
    }
}

#[test]
fn test_missing_calibration_excludes_only_that_scan() {
    // Feed 7 has no coefficient; its scan must drop out, the other must
    // survive, and the exclusion must be on the record.
    let scans = vec![raw_scan(0, 0, 0.0, 2.0), raw_scan(1, 7, 0.0, 2.5)];
    let scan_set = reduce_scans(
        scans,
        EPOCH,
        &test_table(),
        &BaselineConfig::default(),
        &test_grid(),
    )
    .unwrap();

    assert_eq!(scan_set.len(), 1);
    assert!(scan_set.get(0).is_some());
    assert!(scan_set.get(1).is_none());
    assert_eq!(scan_set.exclusions().len(), 1);
    let exclusion = &scan_set.exclusions()[0];
    assert_eq!(exclusion.scan_id, 1);
    assert!(exclusion.reason.contains("feed 7"), "{}", exclusion.reason);
}

#[test]
fn test_out_of_bounds_scan_is_excluded_not_fatal() {
    // The second scan is far outside the 30x30 map.
    let scans = vec![raw_scan(0, 0, 0.0, 2.0), raw_scan(1, 0, 500.0, 500.0)];
    let scan_set = reduce_scans(
        scans,
        EPOCH,
        &test_table(),
        &BaselineConfig::default(),
        &test_grid(),
    )
    .unwrap();

    assert_eq!(scan_set.len(), 1);
    assert_eq!(scan_set.exclusions().len(), 1);
    assert_eq!(scan_set.exclusions()[0].scan_id, 1);
}

#[test]
fn test_nothing_usable_aborts_the_run() {
    let scans = vec![raw_scan(0, 0, 500.0, 500.0), raw_scan(1, 9, 0.0, 2.0)];
    let result = reduce_scans(
        scans,
        EPOCH,
        &test_table(),
        &BaselineConfig::default(),
        &test_grid(),
    );
    match result {
        Err(ScanSetError::NoUsableScans { num_excluded }) => assert_eq!(num_excluded, 2),
        other => panic!("expected NoUsableScans, got {other:?}"),
    }
}

#[test]
fn test_baseline_failure_is_recorded() {
    // Five samples cannot be baseline-fitted (minimum is ten).
    let samples: Vec<Sample> = (0..5)
        .map(|i| Sample {
            timestamp: 0.1 * i as f64,
            sky_x: 1.0,
            sky_y: 2.0,
            elevation: 0.8,
            raw_power: 10.0,
        })
        .collect();
    let tiny = SampleStream::new(5, 0, samples, &StreamConfig::default())
        .unwrap()
        .into_scan();

    let scans = vec![raw_scan(0, 0, 0.0, 2.0), tiny];
    let scan_set = reduce_scans(
        scans,
        EPOCH,
        &test_table(),
        &BaselineConfig::default(),
        &test_grid(),
    )
    .unwrap();

    assert_eq!(scan_set.len(), 1);
    assert_eq!(scan_set.exclusions().len(), 1);
    assert_eq!(scan_set.exclusions()[0].scan_id, 5);
    assert!(
        scan_set.exclusions()[0].reason.contains("valid samples"),
        "{}",
        scan_set.exclusions()[0].reason
    );
}

#[test]
fn test_add_rejects_uncalibrated_scan() {
    let mut scan_set = ScanSet::new(EPOCH);
    let scan = raw_scan(0, 0, 0.0, 2.0);
    assert!(matches!(
        scan_set.add(scan, &test_grid()),
        Err(ScanSetError::NotCalibrated { scan_id: 0 })
    ));
    assert!(scan_set.is_empty());
}

#[test]
fn test_add_rejects_duplicate_scan_id() {
    let scans = vec![raw_scan(3, 0, 0.0, 2.0)];
    let mut scan_set = reduce_scans(
        scans,
        EPOCH,
        &test_table(),
        &BaselineConfig::default(),
        &test_grid(),
    )
    .unwrap();

    // Reduce an identical scan again and try to add it under the same id.
    let twin_set = reduce_scans(
        vec![raw_scan(3, 0, 0.0, 2.5)],
        EPOCH,
        &test_table(),
        &BaselineConfig::default(),
        &test_grid(),
    )
    .unwrap();
    let twin = twin_set.scans().next().unwrap().clone();
    assert!(matches!(
        scan_set.add(twin, &test_grid()),
        Err(ScanSetError::DuplicateScan { scan_id: 3 })
    ));
}

#[test]
fn test_statistics_aggregate_over_scans() {
    let scans = vec![raw_scan(0, 0, 0.0, 2.0), raw_scan(1, 0, 0.0, 3.0)];
    let scan_set = reduce_scans(
        scans,
        EPOCH,
        &test_table(),
        &BaselineConfig::default(),
        &test_grid(),
    )
    .unwrap();

    let stats = scan_set.statistics();
    assert_eq!(stats.num_scans, 2);
    // 5% edge flagging at each end of each 100-sample scan.
    assert_eq!(stats.total_valid_samples, 180);
    assert_abs_diff_eq!(stats.flagged_fraction, 0.1, epsilon = 1e-12);
    assert!(stats.mean_rms > 0.0);
}

#[test]
fn test_low_quality_thresholds() {
    let scans = vec![raw_scan(0, 0, 0.0, 2.0)];
    let scan_set = reduce_scans(
        scans,
        EPOCH,
        &test_table(),
        &BaselineConfig::default(),
        &test_grid(),
    )
    .unwrap();

    assert!(!scan_set.is_low_quality(&QualityThresholds::default()));

    // 90 valid samples is below a 1000-sample floor.
    let strict = QualityThresholds {
        min_total_valid_samples: 1000,
        ..Default::default()
    };
    assert!(scan_set.is_low_quality(&strict));

    // An absurdly tight RMS ceiling trips too.
    let tight_rms = QualityThresholds {
        max_mean_rms: 1e-9,
        ..Default::default()
    };
    assert!(scan_set.is_low_quality(&tight_rms));
}
