// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

use crate::{solutions::CalTableReadError, vis_io::VisWriteError};

#[derive(Error, Debug)]
pub enum ApplyError {
    #[error(transparent)]
    Load(#[from] CalTableReadError),

    #[error("The cal table has {table} elements, but the dataset's {num_antennas} antennas need {expected}")]
    ElementMismatch {
        table: usize,
        expected: usize,
        num_antennas: usize,
    },

    #[error("The spw map sends data spw {data_spw} to table spw {table_spw}, but the table only has {num_table_spws} spws")]
    BadSpwMap {
        data_spw: usize,
        table_spw: usize,
        num_table_spws: usize,
    },

    #[error(transparent)]
    Write(#[from] VisWriteError),
}
