// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FluxscaleError {
    #[error("Flux scales can only be transferred with complex antenna gains, not {0}")]
    UnsupportedType(&'static str),

    #[error("No reference fields were given")]
    NoReferenceFieldsGiven,

    #[error("Cannot find solutions for the reference field(s) {0:?}")]
    NoReferenceFields(Vec<usize>),

    #[error("Cannot find solutions for any transfer field")]
    NoTransferFields,

    #[error("The reference spw map sends spw {spw} to spw {ref_spw}, but there are only {num_spws} spws")]
    BadRefSpwMap {
        spw: usize,
        ref_spw: usize,
        num_spws: usize,
    },

    #[error("No flux scale factors could be determined")]
    NoScaleFactors,
}
