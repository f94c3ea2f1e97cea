// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Applying calibration solutions to visibilities.
//!
//! An [`ApplyDriver`] owns a loaded [`CalSet`]. For every buffer it picks the
//! solution slot for the buffer's time and spw, renders matrices for each
//! antenna (or baseline), and either corrupts the model visibilities,
//! corrects the data visibilities, or differentiates the corrupted model with
//! respect to the parameters.

mod error;
mod render;

pub use error::ApplyError;
pub use render::{Differentiated, MatrixRenderer};
pub(crate) use render::row_elements;

use std::ops::AddAssign;

use log::{debug, info};
use marlu::Jones;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use crate::{
    cal_type::CalType,
    params::ApplyParams,
    solutions::{CalInterp, CalSet},
    vis_io::{compute_maps, VisBuffer, VisIterator, VisMetadata},
};

/// What applying solutions does to a buffer.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumIter, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum ApplyMode {
    /// Multiply the model visibilities by the solutions.
    Corrupt,

    /// Multiply the data visibilities by the inverse of the solutions, writing
    /// the corrected visibilities.
    #[default]
    Correct,
}

/// Counts of visibilities (one per row and channel) touched by an apply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyStats {
    pub num_applied: usize,

    /// Visibilities flagged because their solutions were invalid or singular.
    pub num_flagged: usize,
}

impl AddAssign for ApplyStats {
    fn add_assign(&mut self, rhs: ApplyStats) {
        self.num_applied += rhs.num_applied;
        self.num_flagged += rhs.num_flagged;
    }
}

pub struct ApplyDriver {
    cal_set: CalSet,
    mode: ApplyMode,

    /// Table spw per data spw.
    spw_map: Vec<usize>,

    num_antennas: usize,

    /// The number of channels in each data spw.
    spw_num_chans: Vec<usize>,

    interp: CalInterp,
    renderer: MatrixRenderer,

    /// The number of times the interpolator moved to a different slot.
    num_interpolations: usize,
}

impl ApplyDriver {
    /// Load a cal table and get ready to apply it to a dataset.
    pub fn set_apply(
        params: &ApplyParams,
        cal_type: Option<CalType>,
        metadata: &VisMetadata,
    ) -> Result<ApplyDriver, ApplyError> {
        let cal_set = CalSet::load(&params.table, cal_type, &params.fields, metadata.num_spws())?;
        ApplyDriver::new(cal_set, params, metadata)
    }

    /// Apply an already-loaded set of solutions. The table named in `params` is
    /// not read.
    pub fn new(
        cal_set: CalSet,
        params: &ApplyParams,
        metadata: &VisMetadata,
    ) -> Result<ApplyDriver, ApplyError> {
        let cal_type = cal_set.cal_type();
        let num_antennas = metadata.num_antennas();
        let expected = cal_type.num_elements(num_antennas);
        if cal_set.num_elements() != expected {
            return Err(ApplyError::ElementMismatch {
                table: cal_set.num_elements(),
                expected,
                num_antennas,
            });
        }

        let spw_map: Vec<usize> = (0..metadata.num_spws())
            .map(|data_spw| params.spw_map.get(data_spw).copied().unwrap_or(data_spw))
            .collect();
        for (data_spw, &table_spw) in spw_map.iter().enumerate() {
            if table_spw >= cal_set.num_spws() {
                return Err(ApplyError::BadSpwMap {
                    data_spw,
                    table_spw,
                    num_table_spws: cal_set.num_spws(),
                });
            }
        }
        if !params.spw_map.is_empty() {
            debug!("Applying with spw map {spw_map:?}");
        }
        info!(
            "Applying {} solutions ({}, time interpolation '{}', frequency interpolation '{}')",
            cal_type.type_name(),
            params.mode,
            params.time_interp,
            params.freq_interp
        );

        Ok(ApplyDriver {
            mode: params.mode,
            spw_map,
            num_antennas,
            spw_num_chans: (0..metadata.num_spws())
                .map(|spw| metadata.num_chans(spw))
                .collect(),
            interp: CalInterp::new(params.time_interp),
            renderer: MatrixRenderer::new(cal_type, params.freq_interp),
            num_interpolations: 0,
            cal_set,
        })
    }

    pub fn cal_set(&self) -> &CalSet {
        &self.cal_set
    }

    pub fn mode(&self) -> ApplyMode {
        self.mode
    }

    pub fn table_spw(&self, data_spw: usize) -> usize {
        self.spw_map.get(data_spw).copied().unwrap_or(data_spw)
    }

    /// The number of times a different solution slot was picked up.
    pub fn num_interpolations(&self) -> usize {
        self.num_interpolations
    }

    /// The number of times matrices were rendered.
    pub fn num_syncs(&self) -> usize {
        self.renderer.num_syncs()
    }

    /// Get the renderer's matrices up to date for a time on a buffer's spw.
    /// Returns `false` if there are no solutions to use.
    fn sync(&mut self, buffer: &VisBuffer, time: f64, with_derivatives: bool) -> bool {
        let data_spw = buffer.spw;
        let table_spw = self.table_spw(data_spw);
        if self.interp.interpolate(&self.cal_set, time, table_spw) {
            self.num_interpolations += 1;
        }
        match self.interp.result(&self.cal_set) {
            None => false,
            Some(cube) => {
                self.renderer.sync(
                    cube,
                    self.cal_set.spw(table_spw).start_chan,
                    data_spw,
                    self.interp.current(),
                    &buffer.chans,
                    &buffer.freqs,
                    self.spw_num_chans[data_spw],
                    with_derivatives,
                );
                true
            }
        }
    }

    /// Apply solutions to a buffer in place. Auto-correlations are left alone.
    /// Visibilities without usable solutions are flagged.
    pub fn apply(&mut self, buffer: &mut VisBuffer) -> ApplyStats {
        let cal_type = self.cal_set.cal_type();
        let mut stats = ApplyStats::default();
        let maps = compute_maps(buffer);
        let num_chans = buffer.num_chans();
        let invert = self.mode == ApplyMode::Correct;

        for (time, rows) in maps.times() {
            let have_solutions = self.sync(buffer, time, false);
            for &i_row in rows {
                if buffer.flag_row[i_row] || buffer.is_auto(i_row) {
                    continue;
                }
                let (e1, e2) = row_elements(
                    cal_type,
                    buffer.antenna1[i_row],
                    buffer.antenna2[i_row],
                    self.num_antennas,
                );
                for i_chan in 0..num_chans {
                    if buffer.flags[(i_row, i_chan)] {
                        continue;
                    }
                    let input = match self.mode {
                        ApplyMode::Corrupt => buffer.model[(i_row, i_chan)],
                        ApplyMode::Correct => buffer.data[(i_row, i_chan)],
                    };
                    let output = if have_solutions {
                        self.renderer.apply_one(e1, e2, i_chan, input, invert)
                    } else {
                        None
                    };
                    match output {
                        Some(v) => {
                            match self.mode {
                                ApplyMode::Corrupt => buffer.model[(i_row, i_chan)] = v,
                                ApplyMode::Correct => buffer.corrected[(i_row, i_chan)] = v,
                            }
                            stats.num_applied += 1;
                        }
                        None => {
                            buffer.flags[(i_row, i_chan)] = true;
                            if self.mode == ApplyMode::Correct {
                                buffer.corrected[(i_row, i_chan)] = Jones::default();
                            }
                            stats.num_flagged += 1;
                        }
                    }
                }
            }
        }

        stats
    }

    /// Corrupt a buffer's model with the solutions, and differentiate it with
    /// respect to the parameters. The buffer itself isn't changed.
    pub fn differentiate(&mut self, buffer: &VisBuffer) -> Differentiated {
        let num_params = self.cal_set.cal_type().num_params();
        let mut out = Differentiated::zeros(buffer.num_rows(), buffer.num_chans(), num_params);
        let maps = compute_maps(buffer);
        for (time, rows) in maps.times() {
            if !self.sync(buffer, time, true) {
                // No solutions; these rows stay invalid.
                continue;
            }
            self.renderer.differentiate_rows(
                rows,
                &buffer.antenna1,
                &buffer.antenna2,
                self.num_antennas,
                buffer.model.view(),
                buffer.flags.view(),
                &buffer.flag_row,
                &mut out,
            );
        }
        out
    }

    /// Apply solutions to every buffer of a dataset, writing the results back.
    pub fn apply_dataset(&mut self, vi: &mut dyn VisIterator) -> Result<ApplyStats, ApplyError> {
        let mut stats = ApplyStats::default();
        vi.origin_chunks();
        while vi.more_chunks() {
            vi.origin();
            while vi.more() {
                let mut buffer = vi.buffer();
                stats += self.apply(&mut buffer);
                vi.write_buffer(&buffer)?;
                vi.advance();
            }
            vi.next_chunk();
        }
        vi.origin_chunks();

        info!(
            "Applied solutions to {} visibilities; {} were flagged",
            stats.num_applied, stats.num_flagged
        );
        debug!(
            "{} slot changes, {} matrix renders",
            self.num_interpolations,
            self.renderer.num_syncs()
        );
        Ok(stats)
    }
}
