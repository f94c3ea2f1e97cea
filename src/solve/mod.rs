// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Solving for calibration parameters.
//!
//! A [`SolvableVisCal`] walks through a fixed sequence of states:
//!
//! 1. `Uninitialized`: the configuration has been checked ([`SolvableVisCal::set_solve`]);
//! 2. `Channelized`: the number of parameter channels per spw is known
//!    ([`SolvableVisCal::set_solve_channelization`]);
//! 3. `Inflated`: the dataset has been sized up and the [`CalSet`] has one
//!    slot per solution interval ([`SolvableVisCal::size_up_solve`]);
//! 4. `Accumulating`: a solution interval is being solved
//!    ([`SolvableVisCal::solve`]; this state is left at the end of every
//!    interval);
//! 5. `Persisted`: the solutions have been written ([`SolvableVisCal::store`]).

mod error;
mod solve_buffer;
mod solver;

pub use error::SolveError;
pub use solve_buffer::SolveBuffer;

use std::ops::Range;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::{debug, info, trace};
use marlu::c64;
use ndarray::prelude::*;

use crate::{
    apply::{Differentiated, MatrixRenderer},
    cal_type::{CalType, MatrixForm, ParType},
    constants::{MIN_ANTENNAS_FOR_SOLVE, MIN_BASELINES_PER_ANTENNA},
    diagnostics::Diagnostics,
    iteration::{SolveLayout, VisIterationPolicy},
    math::baseline_index,
    params::{Apmode, SolveConfigError, SolveParams},
    post_solve,
    solutions::{CalSet, FreqInterp, ParameterCube},
    vis_io::{epoch_from_mjd_seconds, VisIterator, VisMetadata},
    PROGRESS_BARS,
};
use solver::gauss_newton_step;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveState {
    Uninitialized,
    Channelized,
    Inflated,
    Accumulating,
    Persisted,
}

/// Channelisation of a spw for solving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolveChannelization {
    /// The number of parameter channels.
    pub num_chans_par: usize,

    /// The data channel of the first parameter channel.
    pub start_chan: usize,

    /// The number of channels over which matrices vary with frequency, even
    /// though the parameters don't. Zero unless the matrices are frequency
    /// dependent.
    pub num_chans_mat: usize,
}

/// How a single focus channel's solve went.
#[derive(Debug, Clone, Copy, PartialEq)]
struct FocusOutcome {
    converged: bool,
    num_iterations: u32,
    max_increment: f64,
}

pub struct SolvableVisCal {
    cal_type: CalType,
    params: SolveParams,
    policy: VisIterationPolicy,
    state: SolveState,

    num_antennas: usize,
    metadata: VisMetadata,

    /// Per spw.
    channelization: Vec<SolveChannelization>,

    layout: Option<SolveLayout>,

    cal_set: CalSet,

    /// The parameters of the interval being solved.
    solve_par: ParameterCube,

    /// The parameter channel being solved.
    focus_chan: usize,

    diagnostics: Diagnostics,
}

impl SolvableVisCal {
    /// Check a solve configuration against a dataset and get ready to solve.
    pub fn set_solve(
        cal_type: CalType,
        params: SolveParams,
        metadata: &VisMetadata,
    ) -> Result<SolvableVisCal, SolveConfigError> {
        params.validate()?;
        let num_antennas = metadata.num_antennas();
        if let Some(refant) = params.refant {
            if refant >= num_antennas {
                return Err(SolveConfigError::RefantOutOfRange {
                    refant,
                    num_antennas,
                });
            }
        }

        info!(
            "Solving for {} (solint = {}, apmode = {}, combine = '{}')",
            cal_type.type_name(),
            params.solint,
            params.apmode,
            params.combine
        );
        match params.refant {
            Some(refant) => debug!(
                "Reference antenna: {refant} ({})",
                metadata.antenna_names[refant]
            ),
            None => debug!("No reference antenna"),
        }

        let num_elements = cal_type.num_elements(num_antennas);
        Ok(SolvableVisCal {
            policy: VisIterationPolicy::new(params.solint, params.combine),
            state: SolveState::Uninitialized,
            num_antennas,
            metadata: metadata.clone(),
            channelization: vec![],
            layout: None,
            cal_set: CalSet::new(cal_type, metadata.num_spws(), num_elements),
            solve_par: ParameterCube::new(
                cal_type.num_params(),
                1,
                num_elements,
                &cal_type.identity_params(),
            ),
            focus_chan: 0,
            diagnostics: Diagnostics::new(),
            cal_type,
            params,
        })
    }

    pub fn cal_type(&self) -> CalType {
        self.cal_type
    }

    pub fn state(&self) -> SolveState {
        self.state
    }

    pub fn cal_set(&self) -> &CalSet {
        &self.cal_set
    }

    pub fn into_cal_set(self) -> CalSet {
        self.cal_set
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn channelization(&self) -> &[SolveChannelization] {
        &self.channelization
    }

    pub fn layout(&self) -> Option<&SolveLayout> {
        self.layout.as_ref()
    }

    /// Work out the parameter channels of every spw from the channels the
    /// iterator delivers.
    pub fn set_solve_channelization(&mut self, vi: &dyn VisIterator) {
        let cal_type = self.cal_type;
        self.channelization = (0..vi.metadata().num_spws())
            .map(|spw| {
                let (start, count) = vi.channel_selection(spw);
                if cal_type.freq_dep_par() {
                    SolveChannelization {
                        num_chans_par: count,
                        start_chan: start,
                        num_chans_mat: 1,
                    }
                } else if cal_type.freq_dep_mat() {
                    SolveChannelization {
                        num_chans_par: 1,
                        start_chan: start,
                        num_chans_mat: count,
                    }
                } else {
                    SolveChannelization {
                        num_chans_par: 1,
                        start_chan: start,
                        num_chans_mat: 0,
                    }
                }
            })
            .collect();
        for (spw, c) in self.channelization.iter().enumerate() {
            trace!("Spw {spw}: {c:?}");
        }
        self.state = SolveState::Channelized;
    }

    /// Count the solution intervals of the dataset and shape the [`CalSet`]
    /// to hold them.
    pub fn size_up_solve(&mut self, vi: &mut dyn VisIterator) -> Result<(), SolveError> {
        assert_eq!(
            self.state,
            SolveState::Channelized,
            "The solve must be channelized before it is sized up"
        );
        let num_chans_par: Vec<usize> = self.channelization.iter().map(|c| c.num_chans_par).collect();
        let start_chans: Vec<usize> = self.channelization.iter().map(|c| c.start_chan).collect();
        let layout = self.policy.size_up_solve(vi, &num_chans_par)?;
        self.cal_set
            .resize(&num_chans_par, &start_chans, &layout.slots_per_spw);
        self.layout = Some(layout);
        self.state = SolveState::Inflated;
        Ok(())
    }

    /// Solve every solution interval of the dataset, then re-reference and
    /// normalise the solutions. If the solve hasn't been channelized and sized
    /// up yet, that is done first.
    pub fn solve(&mut self, vi: &mut dyn VisIterator) -> Result<(), SolveError> {
        if self.state == SolveState::Uninitialized {
            self.set_solve_channelization(vi);
        }
        if self.state == SolveState::Channelized {
            self.size_up_solve(vi)?;
        }
        assert_eq!(
            self.state,
            SolveState::Inflated,
            "The solve must be sized up before solving"
        );
        let layout = match self.layout.clone() {
            Some(l) => l,
            None => unreachable!("An inflated solve always has a layout"),
        };

        let progress = make_solve_progress_bar(
            layout.num_solutions(),
            format!("Solving {}", self.cal_type.type_name()),
        );
        let average_chans = !(self.cal_type.freq_dep_par() || self.cal_type.freq_dep_mat());
        let mut next_slot = vec![0; self.cal_set.num_spws()];
        vi.origin_chunks();
        for (i_solution, (&num_chunks, &spw)) in layout
            .chunks_per_solution
            .iter()
            .zip(layout.solution_spws.iter())
            .enumerate()
        {
            let i_slot = next_slot[spw];
            next_slot[spw] += 1;

            let mut sb = SolveBuffer::accumulate(vi, num_chunks, average_chans);
            let ref_time = match sb.sync_solve_meta() {
                Some(t) => t,
                None => {
                    debug!("Solution interval {i_solution} (spw {spw}) has no unflagged data; skipping");
                    self.diagnostics.skipped_intervals += 1;
                    progress.inc(1);
                    continue;
                }
            };

            let status = self.solve_interval(&mut sb, spw, i_slot, ref_time);
            if progress.is_hidden() {
                info!("{status}");
            } else {
                progress.println(status);
            }
            progress.inc(1);
        }
        vi.origin_chunks();
        progress.abandon_with_message(format!("Finished solving {}", self.cal_type.type_name()));

        self.global_post_solve_tinker();
        self.report_spws();
        Ok(())
    }

    /// Solve a single interval into a slot. Returns a summary line.
    fn solve_interval(&mut self, sb: &mut SolveBuffer, spw: usize, i_slot: usize, ref_time: f64) -> String {
        let num_focus_chans = self.cal_set.spw(spw).num_chans;
        self.begin_interval(num_focus_chans);
        sb.enforce_ap_on_data(self.params.apmode);

        let rejected_before = self.diagnostics.rejected_elements;
        let mut num_solved = 0;
        let mut num_failed_to_converge = 0;
        for focus in 0..num_focus_chans {
            self.focus_chan = focus;
            let chans = if self.cal_type.freq_dep_par() {
                focus..focus + 1
            } else {
                0..sb.num_chans()
            };
            if !self.verify_for_solve(sb, chans.clone()) {
                trace!("Spw {spw} slot {i_slot} chan {focus}: not enough antennas");
                self.invalidate_focus();
                continue;
            }
            let outcome = self.solve_focus(sb, chans);
            if outcome.converged {
                trace!(
                    "Spw {spw} slot {i_slot} chan {focus}: converged after {} iterations ({:e})",
                    outcome.num_iterations,
                    outcome.max_increment
                );
                num_solved += 1;
            } else {
                debug!(
                    "Spw {spw} slot {i_slot} chan {focus}: did not converge after {} iterations ({:e})",
                    outcome.num_iterations, outcome.max_increment
                );
                num_failed_to_converge += 1;
                self.invalidate_focus();
            }
        }
        if num_solved > 0 {
            self.form_solve_snr();
            self.apply_snr_threshold();
        } else {
            self.diagnostics.failed_intervals += 1;
        }
        self.keep(spw, i_slot, sb, ref_time);

        let num_rejected = self.diagnostics.rejected_elements - rejected_before;
        let mut status = format!(
            "Spw {spw:>2} field '{}' {}: {num_solved}/{num_focus_chans} channels solved",
            self.metadata.field_name(sb.field),
            epoch_from_mjd_seconds(ref_time),
        );
        if num_rejected > 0 {
            status.push_str(&format!(", {num_rejected} elements rejected"));
        }
        if num_failed_to_converge > 0 {
            status.push_str(&format!(", {num_failed_to_converge} did not converge"));
        }
        status
    }

    /// Enter the accumulating state with fresh identity parameters.
    fn begin_interval(&mut self, num_chans: usize) {
        let cal_type = self.cal_type;
        self.solve_par = ParameterCube::new(
            cal_type.num_params(),
            num_chans,
            self.cal_set.num_elements(),
            &cal_type.identity_params(),
        );
        self.focus_chan = 0;
        self.state = SolveState::Accumulating;
    }

    /// Mark everything at the focus channel invalid.
    fn invalidate_focus(&mut self) {
        let identity = self.cal_type.identity_params();
        let focus = self.focus_chan;
        for (i_par, &identity) in identity.iter().enumerate() {
            self.solve_par.par.slice_mut(s![i_par, focus, ..]).fill(identity);
        }
        self.solve_par.par_ok.slice_mut(s![.., focus, ..]).fill(false);
    }

    /// Check that there is enough data at the focus channel to solve. Jones
    /// types need antennas with more than [`MIN_BASELINES_PER_ANTENNA`]
    /// unflagged baselines and positive total weight; antennas that fail are removed, and
    /// because removing one can cause others to fail, this is repeated until
    /// nothing changes. The rows of removed antennas are flagged in `sb`, and
    /// their parameters are set to identity and marked invalid. Mueller types
    /// need a baseline to have unflagged data with positive weight.
    ///
    /// Returns `true` if a solve can go ahead.
    pub(crate) fn verify_for_solve(&mut self, sb: &mut SolveBuffer, chans: Range<usize>) -> bool {
        let num_elements = self.cal_set.num_elements();
        // The weight of a row's unflagged data, or `None` if all of it is
        // flagged.
        let row_weight = |sb: &SolveBuffer, i_row: usize| -> Option<f64> {
            if sb.flag_row[i_row] {
                return None;
            }
            chans
                .clone()
                .filter(|&c| !sb.flags[(i_row, c)])
                .map(|c| sb.weight.slice(s![i_row, c, ..]).sum())
                .reduce(|acc, w| acc + w)
        };

        let mut ok = vec![true; num_elements];
        match self.cal_type.form() {
            MatrixForm::Jones => loop {
                let mut num_baselines = vec![0; num_elements];
                let mut weight = vec![0.0; num_elements];
                for i_row in 0..sb.num_rows() {
                    let (a1, a2) = (sb.antenna1[i_row], sb.antenna2[i_row]);
                    if a1 == a2 || !ok[a1] || !ok[a2] {
                        continue;
                    }
                    if let Some(w) = row_weight(sb, i_row) {
                        num_baselines[a1] += 1;
                        num_baselines[a2] += 1;
                        weight[a1] += w;
                        weight[a2] += w;
                    }
                }

                let mut changed = false;
                for ant in 0..num_elements {
                    if ok[ant] && !(num_baselines[ant] > MIN_BASELINES_PER_ANTENNA && weight[ant] > 0.0) {
                        trace!(
                            "Antenna {ant} has {} baselines and weight {}; rejecting",
                            num_baselines[ant],
                            weight[ant]
                        );
                        ok[ant] = false;
                        changed = true;
                    }
                }
                if !changed {
                    break;
                }
            },

            MatrixForm::Mueller => {
                ok.fill(false);
                for i_row in 0..sb.num_rows() {
                    let (a1, a2) = (sb.antenna1[i_row], sb.antenna2[i_row]);
                    if a1 != a2 && row_weight(sb, i_row).map_or(false, |w| w > 0.0) {
                        ok[baseline_index(a1, a2, self.num_antennas)] = true;
                    }
                }
            }
        }

        // Flag the data of whatever was rejected.
        for i_row in 0..sb.num_rows() {
            let (a1, a2) = (sb.antenna1[i_row], sb.antenna2[i_row]);
            let bad = match self.cal_type.form() {
                MatrixForm::Jones => !ok[a1] || !ok[a2],
                MatrixForm::Mueller => !ok[baseline_index(a1, a2, self.num_antennas)],
            };
            if bad {
                for c in chans.clone() {
                    sb.flags[(i_row, c)] = true;
                }
            }
        }

        let identity = self.cal_type.identity_params();
        let focus = self.focus_chan;
        let mut num_rejected = 0;
        for (elem, &ok) in ok.iter().enumerate() {
            if ok {
                continue;
            }
            num_rejected += 1;
            for (i_par, &identity) in identity.iter().enumerate() {
                self.solve_par.par[(i_par, focus, elem)] = identity;
                self.solve_par.par_ok[(i_par, focus, elem)] = false;
            }
        }
        self.diagnostics.rejected_elements += num_rejected;

        let num_good = num_elements - num_rejected;
        match self.cal_type.form() {
            MatrixForm::Jones => num_good > MIN_ANTENNAS_FOR_SOLVE,
            MatrixForm::Mueller => num_good > 0,
        }
    }

    /// Iterate the solver on the focus channel until it converges or runs out
    /// of iterations. Parameter errors are set from the final iteration.
    fn solve_focus(&mut self, sb: &SolveBuffer, chans: Range<usize>) -> FocusOutcome {
        let cal_type = self.cal_type;
        let num_elements = self.cal_set.num_elements();
        let focus = self.focus_chan;
        let rows: Vec<usize> = (0..sb.num_rows()).collect();
        let buffer_chans = &sb.chans[chans.clone()];
        let freqs = &sb.freqs[chans.clone()];
        let model = sb.model.slice(s![.., chans.clone()]);
        let data = sb.data.slice(s![.., chans.clone()]);
        let flags = sb.flags.slice(s![.., chans.clone()]);
        let weight = sb.weight.slice(s![.., chans.clone(), ..]);

        let mut renderer = MatrixRenderer::new(cal_type, FreqInterp::Nearest);
        let mut diff = Differentiated::zeros(sb.num_rows(), chans.len(), cal_type.num_params());
        let mut outcome = FocusOutcome {
            converged: false,
            num_iterations: 0,
            max_increment: f64::INFINITY,
        };

        for iteration in 0..self.params.max_iterations {
            let cube = self.solve_par.slice_per_channel(focus).to_owned();
            renderer.invalidate();
            renderer.sync(
                &cube,
                0,
                sb.spw,
                None,
                buffer_chans,
                freqs,
                sb.num_chans(),
                true,
            );
            renderer.differentiate_rows(
                &rows,
                &sb.antenna1,
                &sb.antenna2,
                self.num_antennas,
                model,
                flags,
                &sb.flag_row,
                &mut diff,
            );
            let mut step = gauss_newton_step(
                cal_type,
                &diff,
                data,
                weight,
                &sb.antenna1,
                &sb.antenna2,
                self.num_antennas,
                num_elements,
            );
            if iteration % 2 == 0 {
                step.increment.mapv_inplace(|inc| inc * 0.5);
            }

            let ok = self.solve_par.par_ok.slice(s![.., focus, ..]);
            outcome.max_increment = step.max_increment(ok);
            outcome.num_iterations = iteration + 1;
            self.update_par(step.increment.view());

            for ((i_par, elem), &h) in step.hessian.indexed_iter() {
                self.solve_par.par_err[(i_par, focus, elem)] =
                    if h > 0.0 { (1.0 / h).sqrt() } else { 0.0 };
            }

            if outcome.max_increment < self.params.stop_threshold {
                outcome.converged = true;
                break;
            }
        }

        outcome
    }

    /// Add an increment (parameter, element) to the parameters of the focus
    /// channel. Increments of invalid parameters are ignored.
    ///
    /// # Panics
    ///
    /// Panics if an interval isn't being solved, or if the increment has the
    /// wrong shape.
    pub fn update_par(&mut self, increment: ArrayView2<c64>) {
        assert_eq!(
            self.state,
            SolveState::Accumulating,
            "Parameters can only be updated while accumulating"
        );
        assert_eq!(
            increment.dim(),
            (self.cal_type.num_params(), self.cal_set.num_elements()),
            "The increment must have one value per parameter and element"
        );
        let focus = self.focus_chan;
        let mut par = self.solve_par.par.slice_mut(s![.., focus, ..]);
        let ok = self.solve_par.par_ok.slice(s![.., focus, ..]);
        par.iter_mut()
            .zip(ok.iter())
            .zip(increment.iter())
            .for_each(|((par, &ok), &inc)| {
                if ok {
                    *par += inc;
                }
            });
    }

    /// Set the SNR of every valid parameter to `|parameter| / error`.
    /// Parameters without a positive error become invalid.
    pub(crate) fn form_solve_snr(&mut self) {
        let cube = &mut self.solve_par;
        for (((par, ok), &err), snr) in cube
            .par
            .iter()
            .zip(cube.par_ok.iter_mut())
            .zip(cube.par_err.iter())
            .zip(cube.par_snr.iter_mut())
        {
            if !*ok {
                *snr = 0.0;
                continue;
            }
            if err > 0.0 {
                *snr = par.norm() / err;
            } else {
                *ok = false;
                *snr = 0.0;
            }
        }
    }

    /// Invalidate parameters whose SNR is below the minimum. Returns the
    /// number that were invalidated.
    pub(crate) fn apply_snr_threshold(&mut self) -> usize {
        let min_snr = self.params.min_snr;
        let mut num_rejected = 0;
        let cube = &mut self.solve_par;
        for (ok, &snr) in cube.par_ok.iter_mut().zip(cube.par_snr.iter()) {
            if *ok && snr < min_snr {
                *ok = false;
                num_rejected += 1;
            }
        }
        if num_rejected > 0 {
            info!("{num_rejected} solutions had an SNR below {min_snr} and were flagged");
        }
        self.diagnostics.snr_rejections += num_rejected;
        num_rejected
    }

    /// Copy the live parameters into a slot, along with the interval's
    /// metadata, and leave the accumulating state.
    fn keep(&mut self, spw: usize, i_slot: usize, sb: &SolveBuffer, ref_time: f64) {
        let num_elements = self.cal_set.num_elements();
        let field = sb.field;
        let field_name = self.metadata.field_name(field).to_string();
        let source_name = self.metadata.source_name(field).to_string();
        let cube = self.solve_par.clone();

        let slot = self.cal_set.slot_mut(spw, i_slot);
        slot.meta.time = ref_time;
        slot.meta.start_time = sb.start_time;
        slot.meta.stop_time = sb.stop_time;
        slot.meta.field_id = field;
        slot.meta.field_name = field_name;
        slot.meta.source_name = source_name;
        slot.meta.fit = 1.0;
        slot.meta.fit_weight = 1.0;
        slot.meta.elem_fit_weight = vec![1.0; num_elements];
        slot.meta.solution_ok = cube.any_ok();
        slot.cube = cube;
        self.state = SolveState::Inflated;
    }

    /// Re-reference, enforce the apmode on, and normalise the solutions.
    pub(crate) fn global_post_solve_tinker(&mut self) {
        if let Some(refant) = self.params.refant {
            match self.cal_type.form() {
                MatrixForm::Jones if self.cal_type.par_type() == ParType::Real => {
                    self.diagnostics.warn(format!(
                        "Not applying the reference antenna to {}; its parameters are real",
                        self.cal_type.type_name()
                    ));
                }
                MatrixForm::Jones => {
                    post_solve::apply_ref_ant(&mut self.cal_set, refant, &mut self.diagnostics)
                }
                MatrixForm::Mueller => debug!("Reference antennas don't apply to Mueller types"),
            }
        }
        if self.params.apmode != Apmode::AP {
            post_solve::enforce_ap_on_solutions(&mut self.cal_set, self.params.apmode);
        }
        if self.params.solnorm {
            post_solve::normalize(&mut self.cal_set);
        }
    }

    fn report_spws(&mut self) {
        let mut num_used = 0;
        let mut num_solved = 0;
        for spw in 0..self.cal_set.num_spws() {
            if self.cal_set.num_slots(spw) == 0 {
                continue;
            }
            num_used += 1;
            if self.cal_set.spw(spw).slots.iter().any(|s| s.meta.solution_ok) {
                num_solved += 1;
            } else {
                self.diagnostics.empty_spws += 1;
                self.diagnostics
                    .warn(format!("Spw {spw} has no good solutions"));
            }
        }
        info!("{num_solved} of {num_used} spectral windows solved");
    }

    /// Write the solutions to the configured cal table.
    pub fn store(&mut self) -> Result<(), SolveError> {
        self.cal_set
            .store(&self.params.table, &self.metadata.name, self.params.append)?;
        self.state = SolveState::Persisted;
        Ok(())
    }
}

fn make_solve_progress_bar(num_solutions: usize, message: String) -> ProgressBar {
    ProgressBar::with_draw_target(
        Some(num_solutions as _),
        if PROGRESS_BARS.load() {
            // Use stdout, not stderr, because the messages printed by the
            // progress bar are valuable.
            ProgressDrawTarget::stdout()
        } else {
            ProgressDrawTarget::hidden()
        },
    )
    .with_style(
        ProgressStyle::default_bar()
            .template("{msg}: [{wide_bar:.blue}] {pos:3}/{len:3} intervals ({elapsed_precise}<{eta_precise})")
            .unwrap()
            .progress_chars("=> "),
    )
    .with_position(0)
    .with_message(message)
}
