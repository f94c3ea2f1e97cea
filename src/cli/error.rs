// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error type for all viscal-related errors. This should be the *only* error
//! enum that is publicly visible.

use thiserror::Error;

use crate::{
    apply::ApplyError,
    iteration::SizeUpError,
    params::SolveConfigError,
    post_solve::FluxscaleError,
    solutions::{AccumulateError, CalTableReadError, CalTableWriteError},
    solve::SolveError,
    vis_io::{VisReadError, VisWriteError},
};

/// The *only* publicly visible error from viscal.
#[derive(Error, Debug)]
pub enum ViscalError {
    /// A bad solve configuration.
    #[error("{0}\n\nCheck the solve arguments (solint, combine, apmode, refant, ...)")]
    SolveConfig(String),

    /// An error while solving.
    #[error("{0}")]
    Solve(String),

    /// An error while applying solutions.
    #[error("{0}")]
    Apply(String),

    /// An error while transferring flux scales.
    #[error("{0}")]
    Fluxscale(String),

    /// An error while composing cal tables.
    #[error("{0}")]
    Accumulate(String),

    /// An error reading or writing a cal table.
    #[error("{0}")]
    CalTable(String),

    /// An error related to reading datasets.
    #[error("{0}")]
    VisRead(String),

    /// An error related to writing datasets.
    #[error("{0}")]
    VisWrite(String),

    /// An error related to argument files.
    #[error("{0}")]
    ArgFile(String),

    /// A generic error that can't be clarified further, e.g. IO errors.
    #[error("{0}")]
    Generic(String),
}

// When changing the error propagation below, ensure `Self::from(e)` uses the
// correct `e`!

impl From<SolveConfigError> for ViscalError {
    fn from(e: SolveConfigError) -> Self {
        Self::SolveConfig(e.to_string())
    }
}

impl From<SizeUpError> for ViscalError {
    fn from(e: SizeUpError) -> Self {
        Self::Solve(e.to_string())
    }
}

impl From<SolveError> for ViscalError {
    fn from(e: SolveError) -> Self {
        match e {
            SolveError::Config(e) => Self::from(e),
            SolveError::SizeUp(e) => Self::from(e),
            SolveError::Write(e) => Self::from(e),
        }
    }
}

impl From<ApplyError> for ViscalError {
    fn from(e: ApplyError) -> Self {
        match e {
            ApplyError::Load(e) => Self::from(e),
            ApplyError::Write(e) => Self::from(e),
            ApplyError::ElementMismatch { .. } | ApplyError::BadSpwMap { .. } => {
                Self::Apply(e.to_string())
            }
        }
    }
}

impl From<FluxscaleError> for ViscalError {
    fn from(e: FluxscaleError) -> Self {
        Self::Fluxscale(e.to_string())
    }
}

impl From<AccumulateError> for ViscalError {
    fn from(e: AccumulateError) -> Self {
        Self::Accumulate(e.to_string())
    }
}

impl From<CalTableReadError> for ViscalError {
    fn from(e: CalTableReadError) -> Self {
        let s = e.to_string();
        match e {
            CalTableReadError::IO(e) => Self::from(e),
            _ => Self::CalTable(s),
        }
    }
}

impl From<CalTableWriteError> for ViscalError {
    fn from(e: CalTableWriteError) -> Self {
        let s = e.to_string();
        match e {
            CalTableWriteError::IO(e) => Self::from(e),
            _ => Self::CalTable(s),
        }
    }
}

impl From<VisReadError> for ViscalError {
    fn from(e: VisReadError) -> Self {
        let s = e.to_string();
        match e {
            VisReadError::IO(e) => Self::from(e),
            _ => Self::VisRead(s),
        }
    }
}

impl From<VisWriteError> for ViscalError {
    fn from(e: VisWriteError) -> Self {
        let s = e.to_string();
        match e {
            VisWriteError::IO(e) => Self::from(e),
            _ => Self::VisWrite(s),
        }
    }
}

impl From<serde_json::Error> for ViscalError {
    fn from(e: serde_json::Error) -> Self {
        Self::Generic(e.to_string())
    }
}

impl From<std::io::Error> for ViscalError {
    fn from(e: std::io::Error) -> Self {
        Self::Generic(e.to_string())
    }
}
