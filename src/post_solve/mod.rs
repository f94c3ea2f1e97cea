// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Things done to solutions after they have been solved for: re-referencing
//! phases, making solutions phase- or amplitude-only, normalising amplitudes,
//! and transferring flux scales between fields.

mod error;
mod fluxscale;
mod refant;
#[cfg(test)]
mod tests;

pub use error::FluxscaleError;
pub use fluxscale::{fluxscale, FluxscaleEntry, FluxscaleParams, FluxscaleResult};
pub use refant::apply_ref_ant;

use log::{debug, info};
use marlu::c64;

use crate::{cal_type::ParType, params::Apmode, solutions::CalSet};

/// Make every solution phase-only (`P`) or amplitude-only (`A`). Invalid and
/// zero-amplitude parameters are set to 1.
pub fn enforce_ap_on_solutions(cal_set: &mut CalSet, apmode: Apmode) {
    if apmode == Apmode::AP {
        return;
    }
    if cal_set.cal_type().par_type() == ParType::Real {
        debug!("Not enforcing apmode on real-valued parameters");
        return;
    }
    info!("Enforcing apmode {apmode} on solutions");

    let one = c64::new(1.0, 0.0);
    for spw in 0..cal_set.num_spws() {
        for i_slot in 0..cal_set.num_slots(spw) {
            let cube = &mut cal_set.slot_mut(spw, i_slot).cube;
            for (par, &ok) in cube.par.iter_mut().zip(cube.par_ok.iter()) {
                let amp = par.norm();
                if !ok || amp == 0.0 {
                    *par = one;
                    continue;
                }
                *par = match apmode {
                    Apmode::P => *par / amp,
                    Apmode::A => c64::new(amp, 0.0),
                    Apmode::AP => *par,
                };
            }
        }
    }
}

/// Divide every valid solution of each spw by the mean amplitude of its valid
/// solutions. A spw is only normalised if it has more than one valid
/// solution.
pub fn normalize(cal_set: &mut CalSet) {
    if cal_set.cal_type().par_type() == ParType::Real {
        debug!("Not normalising real-valued parameters");
        return;
    }
    info!("Normalising solution amplitudes per spw");

    for spw in 0..cal_set.num_spws() {
        let mut amp_sum = 0.0;
        let mut num_ok = 0;
        for slot in &cal_set.spw(spw).slots {
            for (par, &ok) in slot.cube.par.iter().zip(slot.cube.par_ok.iter()) {
                if ok {
                    amp_sum += par.norm();
                    num_ok += 1;
                }
            }
        }
        if num_ok < 2 {
            continue;
        }
        let factor = amp_sum / num_ok as f64;
        if factor <= 0.0 {
            debug!("Spw {spw}: mean amplitude is zero; not normalising");
            continue;
        }
        debug!("Spw {spw}: normalising by {factor}");

        for i_slot in 0..cal_set.num_slots(spw) {
            let cube = &mut cal_set.slot_mut(spw, i_slot).cube;
            cube.par
                .iter_mut()
                .zip(cube.par_ok.iter())
                .filter(|(_, ok)| **ok)
                .for_each(|(par, _)| *par /= factor);
        }
    }
}
