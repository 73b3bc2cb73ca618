// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Scan {scan_id}: no samples were supplied")]
    NoSamples { scan_id: usize },

    #[error("Scan {scan_id}: timestamps are not strictly increasing at sample {index} ({previous} -> {current})")]
    Ordering {
        scan_id: usize,
        index: usize,
        previous: f64,
        current: f64,
    },

    #[error("Scan {scan_id}: median sample spacing {median_spacing} s exceeds the maximum {max_spacing} s; the stream is too sparse to baseline-fit")]
    Sparsity {
        scan_id: usize,
        median_spacing: f64,
        max_spacing: f64,
    },
}
