// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SizeUpError {
    #[error("Spws with different selected channelizations cannot be combined: spw {spw} has {num_chans} parameter channels, but spw {label} has {label_num_chans}")]
    IncompatibleChannelization {
        spw: usize,
        num_chans: usize,
        label: usize,
        label_num_chans: usize,
    },
}
