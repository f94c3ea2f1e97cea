// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Fold incremental solutions into cumulative ones.

use log::{debug, info, warn};
use marlu::c64;
use ndarray::prelude::*;
use num_traits::Zero;

use super::{AccumulateError, CalInterp, CalSet, TimeInterp};

/// For every slot of `cumulative` (restricted to `fields`, unless it's empty),
/// compose its parameters with those of the `increment` slot chosen by
/// `time_interp`, so that applying the result is the same as applying the
/// cumulative solutions and then the incremental ones. A parameter stays
/// valid only if the element was valid in both tables.
///
/// Returns the number of slots that were updated.
pub fn accumulate(
    cumulative: &mut CalSet,
    increment: &CalSet,
    fields: &[usize],
    time_interp: TimeInterp,
) -> Result<usize, AccumulateError> {
    let cal_type = cumulative.cal_type();
    if increment.cal_type() != cal_type {
        return Err(AccumulateError::TypeMismatch {
            cumulative: cal_type.type_name(),
            increment: increment.cal_type().type_name(),
        });
    }
    if increment.num_elements() != cumulative.num_elements() {
        return Err(AccumulateError::ElementMismatch {
            cumulative: cumulative.num_elements(),
            increment: increment.num_elements(),
        });
    }

    let mut interp = CalInterp::new(time_interp);
    let mut num_updated = 0;
    let num_params = cal_type.num_params();
    for i_spw in 0..cumulative.num_spws().min(increment.num_spws()) {
        let cum_chans = cumulative.spw(i_spw).num_chans;
        let inc_chans = increment.spw(i_spw).num_chans;
        if cumulative.num_slots(i_spw) == 0 {
            continue;
        }
        if increment.num_slots(i_spw) == 0 {
            warn!("Spw {i_spw} has no incremental solutions; its cumulative solutions are unchanged");
            continue;
        }
        if inc_chans != cum_chans && inc_chans != 1 {
            return Err(AccumulateError::ChannelMismatch {
                spw: i_spw,
                cumulative: cum_chans,
                increment: inc_chans,
            });
        }

        for i_slot in 0..cumulative.num_slots(i_spw) {
            let slot = cumulative.slot_mut(i_spw, i_slot);
            if !fields.is_empty() && !fields.contains(&slot.meta.field_id) {
                continue;
            }
            interp.interpolate(increment, slot.meta.time, i_spw);
            let inc = match interp.result(increment) {
                Some(inc) => inc,
                None => {
                    debug!("Spw {i_spw} slot {i_slot}: no valid incremental solution");
                    continue;
                }
            };

            let cube = &mut slot.cube;
            let mut cum_par = vec![c64::zero(); num_params];
            for i_chan in 0..cum_chans {
                let inc_chan = if inc_chans == 1 { 0 } else { i_chan };
                for i_elem in 0..cube.num_elements() {
                    cum_par
                        .iter_mut()
                        .zip(cube.par.slice(s![.., i_chan, i_elem]))
                        .for_each(|(dst, &src)| *dst = src);
                    let inc_par = inc.par.slice(s![.., inc_chan, i_elem]).to_vec();
                    let both_ok = cube.element_ok(i_chan, i_elem) && inc.element_ok(inc_chan, i_elem);

                    let composed = cal_type.compose(&cum_par, &inc_par);
                    cube.par
                        .slice_mut(s![.., i_chan, i_elem])
                        .iter_mut()
                        .zip(composed)
                        .for_each(|(dst, src)| *dst = src);
                    cube.par_ok.slice_mut(s![.., i_chan, i_elem]).fill(both_ok);
                }
            }
            slot.meta.solution_ok = slot.cube.any_ok();
            num_updated += 1;
        }
    }

    info!("Accumulated incremental solutions into {num_updated} slots");
    Ok(num_updated)
}
