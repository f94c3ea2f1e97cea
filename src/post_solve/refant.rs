// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Re-referencing solution phases to a reference antenna, keeping phases
//! continuous across time even when the reference antenna drops out.

use log::{debug, info};
use marlu::c64;

use crate::{
    diagnostics::Diagnostics,
    math::unit_phasor,
    solutions::{CalSet, CalSlot},
    vis_io::epoch_from_mjd_seconds,
};

/// For every spw, parameter channel and parameter independently, divide the
/// solutions of each slot by a unit-amplitude phasor so that the reference
/// antenna has zero phase in the first good slot, and the phase of a pivot
/// antenna doesn't jump between consecutive good slots.
///
/// The pivot is the first antenna valid in both slots from a priority list:
/// the requested reference antenna, then the most recently used pivot, then
/// every antenna by index. If no antenna is valid in both slots, phase
/// continuity is broken there; the slot is left as solved, but still serves
/// as the basis for the next slot.
pub fn apply_ref_ant(cal_set: &mut CalSet, refant: usize, diagnostics: &mut Diagnostics) {
    let num_elements = cal_set.num_elements();
    assert!(
        refant < num_elements,
        "Reference antenna {refant} is out of range ({num_elements} antennas)"
    );
    info!("Applying reference antenna {refant}");

    let num_params = cal_set.cal_type().num_params();
    for spw in 0..cal_set.num_spws() {
        if cal_set.num_slots(spw) == 0 {
            continue;
        }
        let order = cal_set.time_order(spw);
        let num_chans = cal_set.spw(spw).num_chans;
        for chan in 0..num_chans {
            for par in 0..num_params {
                let mut referencer = Referencer {
                    spw,
                    chan,
                    par,
                    // The second entry becomes the most recent continuity
                    // pivot.
                    priority: [refant, refant]
                        .into_iter()
                        .chain(0..num_elements)
                        .collect(),
                    last_used: None,
                };
                referencer.run(cal_set, &order, diagnostics);
            }
        }
    }

    if diagnostics.alternate_refants > 0 {
        debug!(
            "{} solutions were referenced to an alternate antenna",
            diagnostics.alternate_refants
        );
    }
}

/// The state of re-referencing a single (spw, channel, parameter).
struct Referencer {
    spw: usize,
    chan: usize,
    par: usize,
    priority: Vec<usize>,
    last_used: Option<usize>,
}

impl Referencer {
    fn ok(&self, slot: &CalSlot, ant: usize) -> bool {
        slot.cube.par_ok[(self.par, self.chan, ant)]
    }

    fn any_ok(&self, slot: &CalSlot) -> bool {
        (0..slot.cube.num_elements()).any(|ant| self.ok(slot, ant))
    }

    /// Divide every valid antenna of a slot by a phasor.
    fn rotate(&self, slot: &mut CalSlot, phasor: c64) {
        for ant in 0..slot.cube.num_elements() {
            if self.ok(slot, ant) {
                slot.cube.par[(self.par, self.chan, ant)] /= phasor;
            }
        }
    }

    /// Count and log the use of an antenna other than the requested one.
    fn note_pivot(&mut self, i_pref: usize, ant: usize, slot: &CalSlot, diagnostics: &mut Diagnostics) {
        if i_pref > 0 && ant != self.priority[0] {
            diagnostics.alternate_refants += 1;
            if self.last_used != Some(ant) {
                info!(
                    "At {} (spw {}, field {}, par {}, chan {}), using refant {ant} (alternate)",
                    epoch_from_mjd_seconds(slot.meta.time),
                    self.spw,
                    slot.meta.field_id,
                    self.par,
                    self.chan
                );
            }
        }
        self.last_used = Some(ant);
    }

    fn run(&mut self, cal_set: &mut CalSet, order: &[usize], diagnostics: &mut Diagnostics) {
        let spw = self.spw;

        // Find the first slot with anything good, and zero the reference
        // antenna's phase in it.
        let first = match order
            .iter()
            .position(|&i| self.any_ok(cal_set.slot(spw, i)))
        {
            Some(first) => first,
            None => return,
        };
        let mut prev = order[first];
        {
            let slot = cal_set.slot(spw, prev);
            let found = self
                .priority
                .iter()
                .enumerate()
                .find(|&(_, &ant)| self.ok(slot, ant))
                .map(|(i, &ant)| (i, ant));
            if let Some((i_pref, ant)) = found {
                self.note_pivot(i_pref, ant, cal_set.slot(spw, prev), diagnostics);
                let r = cal_set.slot(spw, prev).cube.par[(self.par, self.chan, ant)];
                match unit_phasor(r) {
                    Some(phasor) => self.rotate(cal_set.slot_mut(spw, prev), phasor),
                    None => diagnostics.warn(format!(
                        "Reference antenna {ant} has zero amplitude in spw {spw} (par {}, chan {}); not referencing the first slot",
                        self.par, self.chan
                    )),
                }
            }
        }

        // Carry phase continuity forward.
        for &curr in &order[first + 1..] {
            if !self.any_ok(cal_set.slot(spw, curr)) {
                continue;
            }
            let (prev_slot, curr_slot) = cal_set.slot_pair_mut(spw, prev, curr);
            let found = self
                .priority
                .iter()
                .enumerate()
                .find(|&(_, &ant)| self.ok(prev_slot, ant) && self.ok(curr_slot, ant))
                .map(|(i, &ant)| (i, ant));
            match found {
                Some((i_pref, ant)) => {
                    self.note_pivot(i_pref, ant, curr_slot, diagnostics);
                    self.priority[1] = ant;
                    let r0 = prev_slot.cube.par[(self.par, self.chan, ant)];
                    let r1 = curr_slot.cube.par[(self.par, self.chan, ant)];
                    let phasor = if r0.norm() > 0.0 {
                        unit_phasor(r1 / r0)
                    } else {
                        None
                    };
                    match phasor {
                        Some(phasor) => self.rotate(curr_slot, phasor),
                        None => {
                            diagnostics.broken_phase_continuity += 1;
                            diagnostics.warn(format!(
                                "Phase continuity broken at {} (spw {spw}, field {}, par {}): antenna {ant} has zero amplitude",
                                epoch_from_mjd_seconds(curr_slot.meta.time),
                                curr_slot.meta.field_id,
                                self.par
                            ));
                        }
                    }
                }
                None => {
                    diagnostics.broken_phase_continuity += 1;
                    diagnostics.warn(format!(
                        "Phase continuity broken at {} (spw {spw}, field {}, par {}) due to lack of overlapping antennas with the previous interval",
                        epoch_from_mjd_seconds(curr_slot.meta.time),
                        curr_slot.meta.field_id,
                        self.par
                    ));
                }
            }
            prev = curr;
        }
    }
}
