// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Find the solution slot to use for a time and spectral window.

use log::trace;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use super::{CalSet, ParameterCube};

/// How to pick a slot along the time axis.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumIter, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum TimeInterp {
    /// The slot nearest in time.
    #[default]
    Nearest,

    /// The latest slot at or before the time (or the first slot, if there
    /// isn't one).
    Preceding,
}

/// How to pick parameter channels for a data channel.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumIter, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum FreqInterp {
    /// The nearest parameter channel.
    #[default]
    Nearest,

    /// Blend the two bracketing parameter channels.
    Linear,
}

/// Tracks the slot currently being used for a [`CalSet`], so that callers
/// know when cached matrices need re-rendering.
#[derive(Debug, Clone, Default)]
pub struct CalInterp {
    time_interp: TimeInterp,

    /// (spw, slot) of the current result.
    current: Option<(usize, usize)>,
}

impl CalInterp {
    pub fn new(time_interp: TimeInterp) -> CalInterp {
        CalInterp {
            time_interp,
            current: None,
        }
    }

    /// Point this interpolator at the slot to use for `time` and `spw`.
    /// Returns `true` if that slot differs from the one previously used.
    ///
    /// If the spw has no good slots, the result becomes invalid (see
    /// [`CalInterp::result`]) and `false` is returned; callers must check the
    /// result rather than rely on the return value.
    pub fn interpolate(&mut self, cal_set: &CalSet, time: f64, spw: usize) -> bool {
        let new = if spw < cal_set.num_spws() {
            self.find_slot(cal_set, time, spw).map(|slot| (spw, slot))
        } else {
            None
        };

        match new {
            None => {
                trace!("No solutions for spw {spw} at time {time}");
                self.current = None;
                false
            }
            Some(new) => {
                let changed = self.current != Some(new);
                if changed {
                    trace!("Time {time}, spw {spw}: now using slot {}", new.1);
                }
                self.current = Some(new);
                changed
            }
        }
    }

    fn find_slot(&self, cal_set: &CalSet, time: f64, spw: usize) -> Option<usize> {
        let good = cal_set
            .spw(spw)
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.meta.solution_ok);

        match self.time_interp {
            TimeInterp::Nearest => good
                .fold(None, |best: Option<(usize, f64)>, (i, slot)| {
                    let dist = (slot.meta.time - time).abs();
                    match best {
                        // Ties go to the earlier slot.
                        Some((_, best_dist)) if best_dist <= dist => best,
                        _ => Some((i, dist)),
                    }
                })
                .map(|(i, _)| i),

            TimeInterp::Preceding => {
                let mut latest_before: Option<(usize, f64)> = None;
                let mut earliest: Option<(usize, f64)> = None;
                for (i, slot) in good {
                    let t = slot.meta.time;
                    if t <= time && latest_before.map(|(_, b)| t > b).unwrap_or(true) {
                        latest_before = Some((i, t));
                    }
                    if earliest.map(|(_, e)| t < e).unwrap_or(true) {
                        earliest = Some((i, t));
                    }
                }
                latest_before.or(earliest).map(|(i, _)| i)
            }
        }
    }

    /// The (spw, slot) currently in use.
    pub fn current(&self) -> Option<(usize, usize)> {
        self.current
    }

    /// The parameters of the current slot, or `None` if nothing is valid.
    pub fn result<'a>(&self, cal_set: &'a CalSet) -> Option<&'a ParameterCube> {
        self.current
            .map(|(spw, slot)| &cal_set.slot(spw, slot).cube)
    }
}
