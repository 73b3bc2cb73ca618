// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error type for all reduction-related errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReductionError {
    #[error(transparent)]
    Scan(#[from] crate::scan::ScanError),

    #[error(transparent)]
    Baseline(#[from] crate::baseline::BaselineError),

    #[error(transparent)]
    Calibrate(#[from] crate::calibrate::CalibrateError),

    #[error(transparent)]
    ScanSet(#[from] crate::scanset::ScanSetError),

    #[error(transparent)]
    Grid(#[from] crate::gridding::GridError),
}
