// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

use crate::{iteration::SizeUpError, params::SolveConfigError, solutions::CalTableWriteError};

#[derive(Error, Debug)]
pub enum SolveError {
    #[error(transparent)]
    Config(#[from] SolveConfigError),

    #[error(transparent)]
    SizeUp(#[from] SizeUpError),

    #[error(transparent)]
    Write(#[from] CalTableWriteError),
}
