// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Calibration parameters with (parameter, channel, element) axes.

use marlu::c64;
use ndarray::prelude::*;

/// Calibration parameters and their companions. All four arrays have
/// dimensions of (num_params, num_chans, num_elements), where an element is an
/// antenna (Jones types) or a baseline (Mueller types).
///
/// Real-valued parameter types keep their values in the real part of `par`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterCube {
    /// The parameters themselves.
    pub par: Array3<c64>,

    /// Is each parameter usable?
    pub par_ok: Array3<bool>,

    /// The error on each parameter.
    pub par_err: Array3<f64>,

    /// The signal-to-noise ratio of each parameter.
    pub par_snr: Array3<f64>,
}

/// A borrowed [`ParameterCube`], e.g. a single channel of one.
#[derive(Debug, Clone, Copy)]
pub struct ParameterCubeView<'a> {
    pub par: ArrayView3<'a, c64>,
    pub par_ok: ArrayView3<'a, bool>,
    pub par_err: ArrayView3<'a, f64>,
    pub par_snr: ArrayView3<'a, f64>,
}

/// A mutably-borrowed [`ParameterCube`].
#[derive(Debug)]
pub struct ParameterCubeViewMut<'a> {
    pub par: ArrayViewMut3<'a, c64>,
    pub par_ok: ArrayViewMut3<'a, bool>,
    pub par_err: ArrayViewMut3<'a, f64>,
    pub par_snr: ArrayViewMut3<'a, f64>,
}

impl ParameterCube {
    /// Make a new cube. `identity` has one value per parameter, and every
    /// channel and element gets these values.
    pub fn new(num_params: usize, num_chans: usize, num_elements: usize, identity: &[c64]) -> Self {
        let mut cube = ParameterCube {
            par: Array3::default((0, 0, 0)),
            par_ok: Array3::default((0, 0, 0)),
            par_err: Array3::default((0, 0, 0)),
            par_snr: Array3::default((0, 0, 0)),
        };
        cube.resize(num_params, num_chans, num_elements, identity);
        cube
    }

    /// Reallocate all four arrays. Everything is valid, with zero error and
    /// SNR, and all parameters are set to `identity`.
    pub fn resize(
        &mut self,
        num_params: usize,
        num_chans: usize,
        num_elements: usize,
        identity: &[c64],
    ) {
        assert_eq!(
            identity.len(),
            num_params,
            "One identity value is needed per parameter"
        );
        let shape = (num_params, num_chans, num_elements);
        self.par = Array3::from_shape_fn(shape, |(i_par, _, _)| identity[i_par]);
        self.par_ok = Array3::from_elem(shape, true);
        self.par_err = Array3::zeros(shape);
        self.par_snr = Array3::zeros(shape);
    }

    /// Set every parameter to its identity value without changing validity.
    pub fn reset_params(&mut self, identity: &[c64]) {
        assert_eq!(identity.len(), self.num_params());
        for (mut par, &identity) in self.par.outer_iter_mut().zip(identity) {
            par.fill(identity);
        }
    }

    /// Panic if the four arrays don't share a shape; this should never happen.
    pub fn check_shape(&self) {
        let dim = self.par.dim();
        assert_eq!(self.par_ok.dim(), dim, "par_ok has a different shape to par");
        assert_eq!(self.par_err.dim(), dim, "par_err has a different shape to par");
        assert_eq!(self.par_snr.dim(), dim, "par_snr has a different shape to par");
    }

    /// (num_params, num_chans, num_elements)
    pub fn dim(&self) -> (usize, usize, usize) {
        self.par.dim()
    }

    pub fn num_params(&self) -> usize {
        self.par.len_of(Axis(0))
    }

    pub fn num_chans(&self) -> usize {
        self.par.len_of(Axis(1))
    }

    pub fn num_elements(&self) -> usize {
        self.par.len_of(Axis(2))
    }

    /// Is anything in this cube valid?
    pub fn any_ok(&self) -> bool {
        self.par_ok.iter().any(|&ok| ok)
    }

    /// Are all of an element's parameters valid on this channel?
    pub fn element_ok(&self, chan: usize, element: usize) -> bool {
        self.par_ok.slice(s![.., chan, element]).iter().all(|&ok| ok)
    }

    /// A view with the channel axis collapsed to size 1.
    pub fn slice_per_channel(&self, chan: usize) -> ParameterCubeView {
        let sl = s![.., chan..chan + 1, ..];
        ParameterCubeView {
            par: self.par.slice(sl),
            par_ok: self.par_ok.slice(sl),
            par_err: self.par_err.slice(sl),
            par_snr: self.par_snr.slice(sl),
        }
    }

    /// A mutable view with the channel axis collapsed to size 1.
    pub fn slice_per_channel_mut(&mut self, chan: usize) -> ParameterCubeViewMut {
        let sl = s![.., chan..chan + 1, ..];
        ParameterCubeViewMut {
            par: self.par.slice_mut(sl),
            par_ok: self.par_ok.slice_mut(sl),
            par_err: self.par_err.slice_mut(sl),
            par_snr: self.par_snr.slice_mut(sl),
        }
    }

    pub fn view(&self) -> ParameterCubeView {
        ParameterCubeView {
            par: self.par.view(),
            par_ok: self.par_ok.view(),
            par_err: self.par_err.view(),
            par_snr: self.par_snr.view(),
        }
    }
}

impl ParameterCubeView<'_> {
    pub fn to_owned(&self) -> ParameterCube {
        ParameterCube {
            par: self.par.to_owned(),
            par_ok: self.par_ok.to_owned(),
            par_err: self.par_err.to_owned(),
            par_snr: self.par_snr.to_owned(),
        }
    }
}

impl ParameterCubeViewMut<'_> {
    /// Overwrite this view with another of the same shape.
    pub fn assign(&mut self, other: ParameterCubeView) {
        self.par.assign(&other.par);
        self.par_ok.assign(&other.par_ok);
        self.par_err.assign(&other.par_err);
        self.par_snr.assign(&other.par_snr);
    }
}
