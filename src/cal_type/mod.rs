// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Calibration types, and the kernels that turn their parameters into
//! matrices (and matrix derivatives).
//!
//! Jones-form types have one matrix per antenna, applied to a visibility as
//! `J1 V J2^H`. Mueller-form types have one matrix per baseline, applied to the
//! four correlations of a visibility.

mod mueller;

pub use mueller::Mueller;

use marlu::{c64, Jones};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::{
    constants::{DELAY_UNIT, TAU},
    math::{cexp, num_baselines_with_autos},
};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumIter,
    EnumString,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(ascii_case_insensitive)]
pub enum CalType {
    /// Diagonal antenna gains; one complex gain per polarisation.
    G,

    /// Bandpass. Like `G`, but with a solution per channel.
    B,

    /// A full-polarisation (2x2) antenna Jones matrix.
    J,

    /// Antenna delays [ns] per polarisation.
    K,

    /// Baseline-based multiplicative gains per correlation.
    M,

    /// Baseline-based 4x4 matrices.
    #[strum(serialize = "MF")]
    #[serde(rename = "MF")]
    Mf,
}

/// Whether a calibration type's matrices belong to antennas or baselines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixForm {
    Jones,
    Mueller,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParType {
    Complex,
    Real,
}

/// A rendered calibration matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CalMatrix {
    Jones(Jones<f64>),
    Mueller(Mueller),
}

impl CalType {
    /// The type tag written into (and checked when reading) cal tables.
    pub fn type_name(self) -> &'static str {
        match self {
            CalType::G => "G Jones",
            CalType::B => "B Jones",
            CalType::J => "J Jones",
            CalType::K => "K Jones",
            CalType::M => "M Mueller",
            CalType::Mf => "MF Mueller",
        }
    }

    pub fn from_type_name(name: &str) -> Option<CalType> {
        CalType::iter().find(|t| t.type_name() == name)
    }

    pub fn form(self) -> MatrixForm {
        match self {
            CalType::G | CalType::B | CalType::J | CalType::K => MatrixForm::Jones,
            CalType::M | CalType::Mf => MatrixForm::Mueller,
        }
    }

    pub fn num_params(self) -> usize {
        match self {
            CalType::G | CalType::B | CalType::K => 2,
            CalType::J | CalType::M => 4,
            CalType::Mf => 16,
        }
    }

    pub fn par_type(self) -> ParType {
        match self {
            CalType::K => ParType::Real,
            _ => ParType::Complex,
        }
    }

    /// Are the parameters themselves frequency dependent (one solution per
    /// channel)?
    pub fn freq_dep_par(self) -> bool {
        matches!(self, CalType::B)
    }

    /// Are the matrices frequency dependent even though the parameters are
    /// not?
    pub fn freq_dep_mat(self) -> bool {
        matches!(self, CalType::K)
    }

    /// The number of elements (antennas or baselines) for an array.
    pub fn num_elements(self, num_antennas: usize) -> usize {
        match self.form() {
            MatrixForm::Jones => num_antennas,
            MatrixForm::Mueller => num_baselines_with_autos(num_antennas),
        }
    }

    /// Parameters that render an identity matrix.
    pub fn identity_params(self) -> Vec<c64> {
        let one = c64::new(1.0, 0.0);
        let zero = c64::default();
        match self {
            CalType::G | CalType::B => vec![one; 2],
            CalType::K => vec![zero; 2],
            CalType::J => vec![one, zero, zero, one],
            CalType::M => vec![one; 4],
            CalType::Mf => Mueller::identity().0.to_vec(),
        }
    }

    /// Do these parameters render an identity matrix?
    pub fn is_trivial(self, par: &[c64]) -> bool {
        par.iter()
            .zip(self.identity_params())
            .all(|(&p, i)| p == i)
    }

    pub fn render(self, par: &[c64], freq_hz: f64) -> CalMatrix {
        match self.form() {
            MatrixForm::Jones => CalMatrix::Jones(self.render_jones(par, freq_hz)),
            MatrixForm::Mueller => CalMatrix::Mueller(self.render_mueller(par)),
        }
    }

    /// One matrix per parameter; the derivative of the rendered matrix with
    /// respect to that parameter.
    pub fn differentiate(self, par: &[c64], freq_hz: f64) -> Vec<CalMatrix> {
        match self.form() {
            MatrixForm::Jones => self
                .diff_jones(par, freq_hz)
                .into_iter()
                .map(CalMatrix::Jones)
                .collect(),
            MatrixForm::Mueller => self
                .diff_mueller(par)
                .into_iter()
                .map(CalMatrix::Mueller)
                .collect(),
        }
    }

    pub(crate) fn render_jones(self, par: &[c64], freq_hz: f64) -> Jones<f64> {
        assert_eq!(par.len(), self.num_params());
        let zero = c64::default();
        match self {
            CalType::G | CalType::B => Jones::from([par[0], zero, zero, par[1]]),
            CalType::J => Jones::from([par[0], par[1], par[2], par[3]]),
            CalType::K => Jones::from([
                cexp(TAU * par[0].re * freq_hz * DELAY_UNIT),
                zero,
                zero,
                cexp(TAU * par[1].re * freq_hz * DELAY_UNIT),
            ]),
            CalType::M | CalType::Mf => {
                panic!("{} does not render Jones matrices", self.type_name())
            }
        }
    }

    pub(crate) fn diff_jones(self, par: &[c64], freq_hz: f64) -> Vec<Jones<f64>> {
        assert_eq!(par.len(), self.num_params());
        let one = c64::new(1.0, 0.0);
        let zero = c64::default();
        match self {
            CalType::G | CalType::B => vec![
                Jones::from([one, zero, zero, zero]),
                Jones::from([zero, zero, zero, one]),
            ],
            CalType::J => (0..4)
                .map(|i| {
                    let mut e = [zero; 4];
                    e[i] = one;
                    Jones::from(e)
                })
                .collect(),
            CalType::K => {
                let rate = TAU * freq_hz * DELAY_UNIT;
                let dx = c64::new(0.0, rate) * cexp(rate * par[0].re);
                let dy = c64::new(0.0, rate) * cexp(rate * par[1].re);
                vec![
                    Jones::from([dx, zero, zero, zero]),
                    Jones::from([zero, zero, zero, dy]),
                ]
            }
            CalType::M | CalType::Mf => {
                panic!("{} does not render Jones matrices", self.type_name())
            }
        }
    }

    pub(crate) fn render_mueller(self, par: &[c64]) -> Mueller {
        assert_eq!(par.len(), self.num_params());
        match self {
            CalType::M => Mueller::from_diagonal([par[0], par[1], par[2], par[3]]),
            CalType::Mf => {
                let mut m = Mueller::default();
                m.0.copy_from_slice(par);
                m
            }
            _ => panic!("{} does not render Mueller matrices", self.type_name()),
        }
    }

    pub(crate) fn diff_mueller(self, par: &[c64]) -> Vec<Mueller> {
        assert_eq!(par.len(), self.num_params());
        let one = c64::new(1.0, 0.0);
        match self {
            CalType::M => (0..4)
                .map(|i| {
                    let mut m = Mueller::default();
                    m[(i, i)] = one;
                    m
                })
                .collect(),
            CalType::Mf => (0..16)
                .map(|i| {
                    let mut m = Mueller::default();
                    m.0[i] = one;
                    m
                })
                .collect(),
            _ => panic!("{} does not render Mueller matrices", self.type_name()),
        }
    }

    /// Combine cumulative parameters with incremental ones, such that the
    /// rendered result is `cumulative * increment`.
    pub fn compose(self, cumulative: &[c64], increment: &[c64]) -> Vec<c64> {
        assert_eq!(cumulative.len(), self.num_params());
        assert_eq!(increment.len(), self.num_params());
        match self {
            CalType::G | CalType::B | CalType::M => cumulative
                .iter()
                .zip(increment)
                .map(|(&c, &i)| c * i)
                .collect(),
            CalType::K => cumulative
                .iter()
                .zip(increment)
                .map(|(&c, &i)| c64::new(c.re + i.re, 0.0))
                .collect(),
            CalType::J => {
                let c = self.render_jones(cumulative, 0.0);
                let i = self.render_jones(increment, 0.0);
                let product = c * i;
                (0..4).map(|k| product[k]).collect()
            }
            CalType::Mf => {
                let product = self.render_mueller(cumulative) * self.render_mueller(increment);
                product.0.to_vec()
            }
        }
    }
}
