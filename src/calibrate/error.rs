// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CalibrateError {
    #[error("Scan {scan_id}: no calibration coefficient is available for feed {feed}, epoch {epoch}")]
    MissingCalibration {
        scan_id: usize,
        feed: usize,
        epoch: u32,
    },

    #[error("Scan {scan_id}: cannot calibrate a scan whose baseline has not been subtracted")]
    NotBaselined { scan_id: usize },
}
