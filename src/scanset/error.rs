// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanSetError {
    #[error("Scan {scan_id}: sky coverage lies entirely outside the map boundary")]
    OutOfBounds { scan_id: usize },

    #[error("Scan {scan_id}: no valid samples remain")]
    NoValidSamples { scan_id: usize },

    #[error("Scan {scan_id}: not calibrated; only calibrated scans can join a scan set")]
    NotCalibrated { scan_id: usize },

    #[error("Scan {scan_id} is already part of this scan set")]
    DuplicateScan { scan_id: usize },

    #[error("No scans survived reduction ({num_excluded} excluded); there is nothing to grid")]
    NoUsableScans { num_excluded: usize },
}
