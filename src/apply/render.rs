// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Rendering parameter cubes into per-element matrices, and using them to
//! differentiate or correct visibilities.

use log::trace;
use marlu::{c64, Jones};
use ndarray::prelude::*;
use num_traits::Zero;

use crate::{
    cal_type::{CalMatrix, CalType, MatrixForm, Mueller},
    math::baseline_index,
    solutions::{FreqInterp, ParameterCube},
};

/// The model visibilities of a buffer corrupted by the current matrices, and
/// their derivatives with respect to each parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Differentiated {
    /// (row, chan)
    pub corrected_model: Array2<Jones<f64>>,

    /// (row, chan, parameter). Derivatives with respect to the parameters of
    /// each row's first element (antenna 1, or the baseline for Mueller
    /// types).
    pub d_model_1: Array3<Jones<f64>>,

    /// (row, chan, parameter). Derivatives with respect to the parameters of
    /// antenna 2. Always zero for Mueller types.
    pub d_model_2: Array3<Jones<f64>>,

    /// (row, chan). Rows and channels that are flagged, auto-correlations or
    /// have invalid solutions are `false`; their entries above are zero.
    pub valid: Array2<bool>,
}

impl Differentiated {
    pub fn zeros(num_rows: usize, num_chans: usize, num_params: usize) -> Differentiated {
        let zero = Jones::default();
        Differentiated {
            corrected_model: Array2::from_elem((num_rows, num_chans), zero),
            d_model_1: Array3::from_elem((num_rows, num_chans, num_params), zero),
            d_model_2: Array3::from_elem((num_rows, num_chans, num_params), zero),
            valid: Array2::from_elem((num_rows, num_chans), false),
        }
    }
}

/// The things that the rendered matrices depend on. If none of these change,
/// nothing is re-rendered. Matrices are functions of a slot's parameters and
/// the channel frequencies only, so timestamps sharing a slot share matrices.
#[derive(Debug, Clone, PartialEq)]
struct RenderKey {
    spw: usize,
    slot: Option<(usize, usize)>,
    chans: Vec<usize>,
    with_derivatives: bool,
}

/// Per-element, per-channel matrices rendered from a [`ParameterCube`].
#[derive(Debug, Clone)]
pub struct MatrixRenderer {
    cal_type: CalType,
    freq_interp: FreqInterp,

    key: Option<RenderKey>,

    /// (element, buffer channel)
    matrices: Array2<CalMatrix>,

    /// (element, buffer channel). Is the matrix from valid parameters?
    ok: Array2<bool>,

    /// (element, buffer channel, parameter). Empty unless differentiating.
    derivatives: Array3<CalMatrix>,

    num_syncs: usize,
}

impl MatrixRenderer {
    pub fn new(cal_type: CalType, freq_interp: FreqInterp) -> MatrixRenderer {
        MatrixRenderer {
            cal_type,
            freq_interp,
            key: None,
            matrices: Array2::from_elem((0, 0), identity_matrix(cal_type)),
            ok: Array2::from_elem((0, 0), false),
            derivatives: Array3::from_elem((0, 0, 0), identity_matrix(cal_type)),
            num_syncs: 0,
        }
    }

    /// The number of times matrices were actually rendered.
    pub fn num_syncs(&self) -> usize {
        self.num_syncs
    }

    /// Force the next sync to re-render.
    pub fn invalidate(&mut self) {
        self.key = None;
    }

    /// Render matrices for every element of `cube` at the given buffer
    /// channels, unless the spw, slot and channels are the same as last time. `start_chan` is the data channel of the cube's first parameter
    /// channel and `num_data_chans` the number of channels in the data spw.
    /// Returns `true` if anything was rendered.
    #[allow(clippy::too_many_arguments)]
    pub fn sync(
        &mut self,
        cube: &ParameterCube,
        start_chan: usize,
        spw: usize,
        slot: Option<(usize, usize)>,
        chans: &[usize],
        freqs: &[f64],
        num_data_chans: usize,
        with_derivatives: bool,
    ) -> bool {
        let key = RenderKey {
            spw,
            slot,
            chans: chans.to_vec(),
            with_derivatives,
        };
        if self.key.as_ref() == Some(&key) {
            return false;
        }

        let cal_type = self.cal_type;
        let num_params = cal_type.num_params();
        let num_elements = cube.num_elements();
        let num_chans = chans.len();
        self.matrices = Array2::from_elem((num_elements, num_chans), identity_matrix(cal_type));
        self.ok = Array2::from_elem((num_elements, num_chans), false);
        self.derivatives = if with_derivatives {
            Array3::from_elem(
                (num_elements, num_chans, num_params),
                identity_matrix(cal_type),
            )
        } else {
            Array3::from_elem((0, 0, 0), identity_matrix(cal_type))
        };

        let mut par = vec![c64::zero(); num_params];
        for (i_chan, (&chan, &freq)) in chans.iter().zip(freqs).enumerate() {
            let weights = param_chans(
                chan,
                start_chan,
                cube.num_chans(),
                num_data_chans,
                self.freq_interp,
            );
            for i_elem in 0..num_elements {
                let mut ok = true;
                for (i_par, p) in par.iter_mut().enumerate() {
                    *p = c64::zero();
                    for &(pc, w) in &weights {
                        if w == 0.0 {
                            continue;
                        }
                        *p += cube.par[(i_par, pc, i_elem)] * w;
                        ok &= cube.par_ok[(i_par, pc, i_elem)];
                    }
                }
                self.matrices[(i_elem, i_chan)] = cal_type.render(&par, freq);
                self.ok[(i_elem, i_chan)] = ok;
                if with_derivatives {
                    for (i_par, d) in cal_type.differentiate(&par, freq).into_iter().enumerate() {
                        self.derivatives[(i_elem, i_chan, i_par)] = d;
                    }
                }
            }
        }

        trace!(
            "Rendered {num_elements} x {num_chans} {} matrices for spw {spw}",
            cal_type
        );
        self.num_syncs += 1;
        self.key = Some(key);
        true
    }

    /// Corrupt the model visibilities of the given rows with the current
    /// matrices, and differentiate them, writing into `out`. Rows not listed
    /// are untouched.
    #[allow(clippy::too_many_arguments)]
    pub fn differentiate_rows(
        &self,
        rows: &[usize],
        antenna1: &[usize],
        antenna2: &[usize],
        num_antennas: usize,
        model: ArrayView2<Jones<f64>>,
        flags: ArrayView2<bool>,
        flag_row: &[bool],
        out: &mut Differentiated,
    ) {
        let num_chans = model.len_of(Axis(1));
        let num_params = if self.derivatives.is_empty() {
            0
        } else {
            self.cal_type.num_params()
        };
        let zero = Jones::default();

        for &i_row in rows {
            out.corrected_model.row_mut(i_row).fill(zero);
            out.d_model_1.slice_mut(s![i_row, .., ..]).fill(zero);
            out.d_model_2.slice_mut(s![i_row, .., ..]).fill(zero);
            out.valid.row_mut(i_row).fill(false);

            let (a1, a2) = (antenna1[i_row], antenna2[i_row]);
            if flag_row[i_row] || a1 == a2 {
                // Nothing is written, but the derivative arrays stay aligned
                // with the rows.
                continue;
            }
            let (e1, e2) = row_elements(self.cal_type, a1, a2, num_antennas);
            for i_chan in 0..num_chans {
                if flags[(i_row, i_chan)] || !self.ok[(e1, i_chan)] || !self.ok[(e2, i_chan)] {
                    continue;
                }
                let m = model[(i_row, i_chan)];
                match (self.matrices[(e1, i_chan)], self.matrices[(e2, i_chan)]) {
                    (CalMatrix::Jones(j1), CalMatrix::Jones(j2)) => {
                        let j2h = j2.h();
                        out.corrected_model[(i_row, i_chan)] = j1 * m * j2h;
                        for i_par in 0..num_params {
                            if let CalMatrix::Jones(d1) = self.derivatives[(e1, i_chan, i_par)] {
                                out.d_model_1[(i_row, i_chan, i_par)] = d1 * m * j2h;
                            }
                            if let CalMatrix::Jones(d2) = self.derivatives[(e2, i_chan, i_par)] {
                                out.d_model_2[(i_row, i_chan, i_par)] = j1 * m * d2.h();
                            }
                        }
                    }
                    (CalMatrix::Mueller(mu), _) => {
                        out.corrected_model[(i_row, i_chan)] = mu.apply(m);
                        for i_par in 0..num_params {
                            if let CalMatrix::Mueller(d) = self.derivatives[(e1, i_chan, i_par)] {
                                out.d_model_1[(i_row, i_chan, i_par)] = d.apply(m);
                            }
                        }
                    }
                    _ => unreachable!("Matrices of one renderer share a form"),
                }
                out.valid[(i_row, i_chan)] = true;
            }
        }
    }

    /// Apply the current matrices (or their inverses) to one visibility.
    /// Returns `None` if the solutions are invalid or a matrix is singular.
    pub fn apply_one(
        &self,
        e1: usize,
        e2: usize,
        i_chan: usize,
        vis: Jones<f64>,
        invert: bool,
    ) -> Option<Jones<f64>> {
        if !self.ok[(e1, i_chan)] || !self.ok[(e2, i_chan)] {
            return None;
        }
        match (self.matrices[(e1, i_chan)], self.matrices[(e2, i_chan)]) {
            (CalMatrix::Jones(j1), CalMatrix::Jones(j2)) => {
                if invert {
                    let (i1, i2) = (invert_jones(j1)?, invert_jones(j2)?);
                    Some(i1 * vis * i2.h())
                } else {
                    Some(j1 * vis * j2.h())
                }
            }
            (CalMatrix::Mueller(m), _) => {
                if invert {
                    Some(m.inv()?.apply(vis))
                } else {
                    Some(m.apply(vis))
                }
            }
            _ => unreachable!("Matrices of one renderer share a form"),
        }
    }
}

/// The elements of a baseline for a calibration type: the antennas for Jones
/// types, or the baseline (twice) for Mueller types.
pub(crate) fn row_elements(
    cal_type: CalType,
    antenna1: usize,
    antenna2: usize,
    num_antennas: usize,
) -> (usize, usize) {
    match cal_type.form() {
        MatrixForm::Jones => (antenna1, antenna2),
        MatrixForm::Mueller => {
            let bl = baseline_index(antenna1.min(antenna2), antenna1.max(antenna2), num_antennas);
            (bl, bl)
        }
    }
}

fn identity_matrix(cal_type: CalType) -> CalMatrix {
    match cal_type.form() {
        MatrixForm::Jones => CalMatrix::Jones(Jones::identity()),
        MatrixForm::Mueller => CalMatrix::Mueller(Mueller::identity()),
    }
}

fn invert_jones(j: Jones<f64>) -> Option<Jones<f64>> {
    let det = j[0] * j[3] - j[1] * j[2];
    if det.norm_sqr() == 0.0 || !det.is_finite() {
        None
    } else {
        Some(j.inv())
    }
}

/// The parameter channels (and their weights) to use for a data channel. If
/// the cube covers the data spw from `start_chan` to its end, parameter
/// channels map one-to-one onto data channels; otherwise the data channels
/// are spread proportionally over the parameter channels. Channels beyond
/// either edge use the edge channel.
pub(crate) fn param_chans(
    chan: usize,
    start_chan: usize,
    num_par_chans: usize,
    num_data_chans: usize,
    freq_interp: FreqInterp,
) -> [(usize, f64); 2] {
    if num_par_chans <= 1 {
        return [(0, 1.0), (0, 0.0)];
    }

    let offset = chan as f64 - start_chan as f64;
    let span = num_data_chans.saturating_sub(start_chan);
    let x = if span == num_par_chans || span <= 1 {
        offset
    } else {
        offset * (num_par_chans - 1) as f64 / (span - 1) as f64
    };
    let x = x.clamp(0.0, (num_par_chans - 1) as f64);

    match freq_interp {
        FreqInterp::Nearest => [(x.round() as usize, 1.0), (0, 0.0)],
        FreqInterp::Linear => {
            let lo = x.floor() as usize;
            let hi = (lo + 1).min(num_par_chans - 1);
            let frac = x - lo as f64;
            if hi == lo || frac == 0.0 {
                [(lo, 1.0), (0, 0.0)]
            } else {
                [(lo, 1.0 - frac), (hi, frac)]
            }
        }
    }
}
