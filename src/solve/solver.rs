// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The built-in solver: one Gauss-Newton step per parameter, treating every
//! other parameter as fixed (i.e. a Jacobi iteration).
//!
//! For Jones types and an element that is antenna 1 of a baseline, the
//! increment of a complex parameter is
//!
//! ```text
//! sum(w conj(dV1) R) / sum(w |dV1|^2)
//! ```
//!
//! where `R` is the residual (data - corrupted model) and `dV1` the derivative
//! of the corrupted model. Antenna 2's matrix appears Hermitian-conjugated, so
//! its increment is `sum(w dV2 conj(R)) / sum(w |dV2|^2)`. Real parameters
//! use `Re(sum(w conj(dV) R)) / sum(w |dV|^2)` for both antennas. When an
//! antenna is on many baselines, the numerators and denominators from all of
//! them are summed before dividing.
//!
//! With a single gain per antenna and every increment set to its full size,
//! this is the StEFCal update, and like StEFCal, it oscillates unless every
//! second increment is halved.

use marlu::{c64, Jones};
use ndarray::prelude::*;

use crate::{
    apply::{row_elements, Differentiated},
    cal_type::{CalType, MatrixForm, ParType},
};

/// The result of a single solver step.
pub(super) struct SolverStep {
    /// (parameter, element)
    pub(super) increment: Array2<c64>,

    /// (parameter, element). The summed weighted squared derivatives; the
    /// diagonal of the normal matrix.
    pub(super) hessian: Array2<f64>,
}

impl SolverStep {
    /// The largest increment magnitude over elements that are usable.
    pub(super) fn max_increment(&self, ok: ArrayView2<bool>) -> f64 {
        self.increment
            .iter()
            .zip(ok.iter())
            .filter(|(_, ok)| **ok)
            .map(|(inc, _)| inc.norm())
            .fold(0.0, f64::max)
    }
}

/// Calculate parameter increments from a differentiated buffer.
///
/// `data` is (row, chan) and `weight` is (row, chan, correlation), covering
/// the same channels as `diff`.
#[allow(clippy::too_many_arguments)]
pub(super) fn gauss_newton_step(
    cal_type: CalType,
    diff: &Differentiated,
    data: ArrayView2<Jones<f64>>,
    weight: ArrayView3<f64>,
    antenna1: &[usize],
    antenna2: &[usize],
    num_antennas: usize,
    num_elements: usize,
) -> SolverStep {
    let num_params = cal_type.num_params();
    let (num_rows, num_chans) = diff.valid.dim();
    assert_eq!(data.dim(), (num_rows, num_chans));
    assert_eq!(weight.dim(), (num_rows, num_chans, 4));

    let real = cal_type.par_type() == ParType::Real;
    let mut top: Array2<c64> = Array2::zeros((num_params, num_elements));
    let mut bot: Array2<f64> = Array2::zeros((num_params, num_elements));

    for i_row in 0..num_rows {
        let (e1, e2) = row_elements(cal_type, antenna1[i_row], antenna2[i_row], num_antennas);
        for i_chan in 0..num_chans {
            if !diff.valid[(i_row, i_chan)] {
                continue;
            }
            let residual = data[(i_row, i_chan)] - diff.corrected_model[(i_row, i_chan)];
            for i_par in 0..num_params {
                let dv1 = diff.d_model_1[(i_row, i_chan, i_par)];
                let dv2 = diff.d_model_2[(i_row, i_chan, i_par)];
                for k in 0..4 {
                    let w = weight[(i_row, i_chan, k)];
                    if w <= 0.0 {
                        continue;
                    }
                    let r = residual[k];
                    top[(i_par, e1)] += dv1[k].conj() * r * w;
                    bot[(i_par, e1)] += dv1[k].norm_sqr() * w;

                    if cal_type.form() == MatrixForm::Jones {
                        top[(i_par, e2)] += if real {
                            dv2[k].conj() * r * w
                        } else {
                            dv2[k] * r.conj() * w
                        };
                        bot[(i_par, e2)] += dv2[k].norm_sqr() * w;
                    }
                }
            }
        }
    }

    let increment = Array2::from_shape_fn((num_params, num_elements), |(p, e)| {
        let b = bot[(p, e)];
        if b > 0.0 {
            let inc = top[(p, e)] / b;
            if real {
                c64::new(inc.re, 0.0)
            } else {
                inc
            }
        } else {
            c64::default()
        }
    });

    SolverStep {
        increment,
        hessian: bot,
    }
}
