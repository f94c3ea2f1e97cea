// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Parameters for solving, applying and flux-scaling.
//!
//! The code here is kind of "mirroring" the code within the `cli` module; the
//! idea is that `cli` is unparsed, user-facing code, whereas parameters have
//! been parsed and are ready to be used directly.

mod error;
#[cfg(test)]
mod tests;

pub use error::SolveConfigError;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use crate::{
    apply::ApplyMode,
    constants::{DEFAULT_MAX_ITERATIONS, DEFAULT_MIN_SNR, DEFAULT_STOP_THRESHOLD},
    iteration::{Combine, SolutionInterval},
    solutions::{FreqInterp, TimeInterp},
};

/// What to solve for: amplitude and phase, phase only or amplitude only.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumIter, EnumString, Serialize, Deserialize,
)]
#[strum(ascii_case_insensitive)]
pub enum Apmode {
    #[default]
    AP,
    P,
    A,
}

/// Everything needed to solve for a calibration type.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveParams {
    /// The cal table to write.
    pub table: PathBuf,

    pub solint: SolutionInterval,

    pub combine: Combine,

    /// The preferred reference antenna.
    pub refant: Option<usize>,

    pub apmode: Apmode,

    /// Normalise solution amplitudes per spw?
    pub solnorm: bool,

    /// Solutions with an SNR below this are flagged.
    pub min_snr: f64,

    /// Append to an existing cal table rather than overwriting it.
    pub append: bool,

    pub max_iterations: u32,

    /// The solver has converged when the largest parameter increment is below
    /// this.
    pub stop_threshold: f64,
}

impl SolveParams {
    /// Parameters with default values for everything other than the table.
    pub fn new(table: PathBuf) -> Result<SolveParams, SolveConfigError> {
        if table.as_os_str().is_empty() {
            return Err(SolveConfigError::EmptyTableName);
        }
        Ok(SolveParams {
            table,
            solint: SolutionInterval::Infinite,
            combine: Combine::default(),
            refant: None,
            apmode: Apmode::AP,
            solnorm: false,
            min_snr: DEFAULT_MIN_SNR,
            append: false,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            stop_threshold: DEFAULT_STOP_THRESHOLD,
        })
    }

    /// Check things that can be checked without a dataset.
    pub fn validate(&self) -> Result<(), SolveConfigError> {
        if self.table.as_os_str().is_empty() {
            return Err(SolveConfigError::EmptyTableName);
        }
        if self.max_iterations == 0 {
            return Err(SolveConfigError::ZeroIterations);
        }
        if self.stop_threshold.is_nan() || self.stop_threshold <= 0.0 {
            return Err(SolveConfigError::BadStopThreshold(self.stop_threshold));
        }
        if !self.min_snr.is_finite() {
            return Err(SolveConfigError::BadMinSnr(self.min_snr));
        }
        Ok(())
    }
}

/// Everything needed to apply a cal table.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyParams {
    pub table: PathBuf,

    /// Only use solutions from these fields. Empty means all fields.
    pub fields: Vec<usize>,

    /// The table spw to use for each data spw. Data spws beyond the end of
    /// this map use the same table spw.
    pub spw_map: Vec<usize>,

    pub time_interp: TimeInterp,
    pub freq_interp: FreqInterp,

    pub mode: ApplyMode,
}

impl ApplyParams {
    pub fn new(table: PathBuf) -> ApplyParams {
        ApplyParams {
            table,
            fields: vec![],
            spw_map: vec![],
            time_interp: TimeInterp::default(),
            freq_interp: FreqInterp::default(),
            mode: ApplyMode::default(),
        }
    }
}
