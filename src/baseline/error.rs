// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BaselineError {
    #[error("Scan {scan_id}: only {num_valid} valid samples remain after flagging; at least {min_valid} are needed for a baseline fit")]
    InsufficientData {
        scan_id: usize,
        num_valid: usize,
        min_valid: usize,
    },

    #[error("Scan {scan_id}: the order-{order} baseline fit was singular")]
    SingularFit { scan_id: usize, order: usize },
}
