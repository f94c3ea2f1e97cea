// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Counts of recoverable problems encountered during a run.
//!
//! Nothing in here stops a solve, apply or flux-scale pass; problems with
//! individual antennas, intervals or fields are recorded here (and logged as
//! they happen) so that a partial result can still be produced.

use log::warn;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    /// Antennas (or baselines) excluded from a solve for lack of baselines or
    /// weight, summed over intervals.
    pub rejected_elements: usize,

    /// Parameters marked invalid by the SNR threshold.
    pub snr_rejections: usize,

    /// Solution intervals skipped because they had no unflagged weight.
    pub skipped_intervals: usize,

    /// Solution intervals that didn't have enough antennas, or whose solver
    /// didn't converge.
    pub failed_intervals: usize,

    /// Slots referenced to an antenna other than the requested one.
    pub alternate_refants: usize,

    /// Slot boundaries across which phase continuity couldn't be kept.
    pub broken_phase_continuity: usize,

    /// (spw, transfer field) pairs without enough antennas for a flux scale.
    pub insufficient_fluxscale: usize,

    /// Spectral windows without any good solution.
    pub empty_spws: usize,

    /// Visibilities flagged when applying solutions.
    pub flagged_vis: usize,

    /// Every warning, in the order it was raised.
    pub warnings: Vec<String>,
}

impl Diagnostics {
    pub fn new() -> Diagnostics {
        Diagnostics::default()
    }

    /// Log a warning and remember it.
    pub fn warn<S: Into<String>>(&mut self, message: S) {
        let message = message.into();
        warn!("{message}");
        self.warnings.push(message);
    }

    /// Fold another set of diagnostics into this one.
    pub fn merge(&mut self, other: Diagnostics) {
        self.rejected_elements += other.rejected_elements;
        self.snr_rejections += other.snr_rejections;
        self.skipped_intervals += other.skipped_intervals;
        self.failed_intervals += other.failed_intervals;
        self.alternate_refants += other.alternate_refants;
        self.broken_phase_continuity += other.broken_phase_continuity;
        self.insufficient_fluxscale += other.insufficient_fluxscale;
        self.empty_spws += other.empty_spws;
        self.flagged_vis += other.flagged_vis;
        self.warnings.extend(other.warnings);
    }

    /// Did anything go wrong?
    pub fn is_clean(&self) -> bool {
        self == &Diagnostics::default()
    }
}
