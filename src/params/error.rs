// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

use crate::unit_parsing::UnitParseError;

/// Problems with solve configuration. These are all detected before any data
/// is read.
#[derive(Error, Debug)]
pub enum SolveConfigError {
    #[error("No output cal table name was given")]
    EmptyTableName,

    #[error("Couldn't parse solint '{input}': {err}")]
    BadSolint { input: String, err: UnitParseError },

    #[error("The solution interval must be positive; got '{0}'")]
    NonPositiveSolint(String),

    #[error("Unknown combine option '{0}'; valid options are 'scan', 'spw' and 'field'")]
    BadCombine(String),

    #[error("Unknown apmode '{0}'; valid modes are 'AP', 'P' and 'A'")]
    BadApmode(String),

    #[error("Reference antenna {refant} is not valid; there are only {num_antennas} antennas")]
    RefantOutOfRange { refant: usize, num_antennas: usize },

    #[error("The maximum number of solver iterations must be at least 1")]
    ZeroIterations,

    #[error("The solver stop threshold must be positive; got {0}")]
    BadStopThreshold(f64),

    #[error("The minimum SNR must be finite; got {0}")]
    BadMinSnr(f64),
}
