// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use approx::assert_abs_diff_eq;

use super::*;

/// A well-behaved stream: constant 0.1 s cadence, a slow drift in power.
fn good_samples(n: usize) -> Vec<Sample> {
    (0..n)
        .map(|i| Sample {
            timestamp: 1000.0 + 0.1 * i as f64,
            sky_x: 0.01 * i as f64,
            sky_y: 0.0,
            elevation: 0.8,
            raw_power: 100.0 + 0.01 * i as f64,
        })
        .collect()
}

#[test]
fn test_stream_accepts_ordered_samples() {
    let stream = SampleStream::new(0, 0, good_samples(50), &StreamConfig::default()).unwrap();
    assert_eq!(stream.len(), 50);

    let scan = stream.into_scan();
    assert_eq!(scan.len(), 50);
    assert_eq!(scan.num_valid(), 50);
    assert_abs_diff_eq!(scan.time()[0], 1000.0);
    assert_abs_diff_eq!(scan.raw_power()[49], 100.49);
    assert!(scan.baseline_subtracted().is_none());
    assert!(scan.flux().is_none());
}

#[test]
fn test_stream_rejects_empty_input() {
    let result = SampleStream::new(3, 0, vec![], &StreamConfig::default());
    assert!(matches!(result, Err(ScanError::NoSamples { scan_id: 3 })));
}

#[test]
fn test_stream_rejects_nonmonotonic_timestamps() {
    let mut samples = good_samples(20);
    samples[7].timestamp = samples[6].timestamp - 0.05;
    let result = SampleStream::new(1, 0, samples, &StreamConfig::default());
    match result {
        Err(ScanError::Ordering { scan_id, index, .. }) => {
            assert_eq!(scan_id, 1);
            assert_eq!(index, 7);
        }
        other => panic!("expected an ordering error, got {other:?}"),
    }
}

#[test]
fn test_stream_rejects_duplicate_timestamps() {
    let mut samples = good_samples(20);
    samples[5].timestamp = samples[4].timestamp;
    assert!(matches!(
        SampleStream::new(0, 0, samples, &StreamConfig::default()),
        Err(ScanError::Ordering { index: 5, .. })
    ));
}

#[test]
fn test_stream_rejects_nan_timestamp() {
    let mut samples = good_samples(20);
    samples[10].timestamp = f64::NAN;
    assert!(matches!(
        SampleStream::new(0, 0, samples, &StreamConfig::default()),
        Err(ScanError::Ordering { .. })
    ));
}

#[test]
fn test_stream_rejects_sparse_cadence() {
    let samples: Vec<Sample> = (0..20)
        .map(|i| Sample {
            timestamp: 10.0 * i as f64,
            sky_x: 0.0,
            sky_y: 0.0,
            elevation: 0.8,
            raw_power: 1.0,
        })
        .collect();
    let result = SampleStream::new(2, 0, samples, &StreamConfig::default());
    match result {
        Err(ScanError::Sparsity {
            scan_id,
            median_spacing,
            max_spacing,
        }) => {
            assert_eq!(scan_id, 2);
            assert_abs_diff_eq!(median_spacing, 10.0);
            assert_abs_diff_eq!(max_spacing, 1.0);
        }
        other => panic!("expected a sparsity error, got {other:?}"),
    }
}

#[test]
fn test_sparsity_threshold_is_configurable() {
    let samples: Vec<Sample> = (0..20)
        .map(|i| Sample {
            timestamp: 10.0 * i as f64,
            sky_x: 0.0,
            sky_y: 0.0,
            elevation: 0.8,
            raw_power: 1.0,
        })
        .collect();
    let config = StreamConfig {
        max_median_spacing: 30.0,
    };
    assert!(SampleStream::new(2, 0, samples, &config).is_ok());
}

#[test]
fn test_nonfinite_samples_are_flagged_not_fatal() {
    let mut samples = good_samples(20);
    samples[3].raw_power = f64::NAN;
    samples[4].sky_x = f64::INFINITY;
    let scan = SampleStream::new(0, 0, samples, &StreamConfig::default())
        .unwrap()
        .into_scan();
    assert_eq!(scan.flag(3), SampleFlag::Saturated);
    assert_eq!(scan.flag(4), SampleFlag::Rfi);
    assert_eq!(scan.num_valid(), 18);
    assert_eq!(scan.num_flagged(), 2);
}

#[test]
fn test_sky_bounds_ignore_flagged_samples() {
    let mut samples = good_samples(10);
    // An absurd position that would inflate the bounding box...
    samples[9].sky_x = 360.0;
    let mut scan = SampleStream::new(0, 0, samples, &StreamConfig::default())
        .unwrap()
        .into_scan();
    // ...is excluded once the sample is flagged.
    scan.set_flag(9, SampleFlag::Rfi);
    let ((x0, x1), (y0, y1)) = scan.sky_bounds().unwrap();
    assert_abs_diff_eq!(x0, 0.0);
    assert_abs_diff_eq!(x1, 0.08, epsilon = 1e-12);
    assert_abs_diff_eq!(y0, 0.0);
    assert_abs_diff_eq!(y1, 0.0);
}

#[test]
fn test_single_sample_stream_is_accepted() {
    // The sparsity check needs two samples; a singleton stream passes
    // validation and is left for the baseline stage to reject.
    let stream = SampleStream::new(0, 0, good_samples(1), &StreamConfig::default()).unwrap();
    assert_eq!(stream.into_scan().len(), 1);
}
