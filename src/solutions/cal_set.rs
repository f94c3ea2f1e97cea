// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! A collection of parameter cubes, indexed by spectral window and time slot.

use std::path::Path;

use itertools::Itertools;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::{
    table::{
        read_cal_table_file, write_cal_table_file, CalTableFile, CalTableSlot, CalTableSpw,
        CAL_TABLE_FORMAT,
    },
    CalTableReadError, CalTableWriteError, ParameterCube,
};
use crate::cal_type::CalType;

/// Metadata accompanying each solution slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotMeta {
    /// The reference time of the solution \[MJD seconds\].
    pub time: f64,

    /// The time of the first data used in the solution \[MJD seconds\].
    pub start_time: f64,

    /// The time of the last data used in the solution \[MJD seconds\].
    pub stop_time: f64,

    pub field_id: usize,
    pub field_name: String,
    pub source_name: String,

    /// Fit placeholders.
    pub fit: f64,
    pub fit_weight: f64,

    /// The weight of each element's solution. Used when transferring flux
    /// scales.
    pub elem_fit_weight: Vec<f64>,

    /// Is anything in this slot usable?
    pub solution_ok: bool,
}

impl SlotMeta {
    fn pristine(num_elements: usize) -> SlotMeta {
        SlotMeta {
            time: 0.0,
            start_time: 0.0,
            stop_time: 0.0,
            field_id: 0,
            field_name: String::new(),
            source_name: String::new(),
            fit: 0.0,
            fit_weight: 0.0,
            elem_fit_weight: vec![0.0; num_elements],
            solution_ok: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalSlot {
    pub cube: ParameterCube,
    pub meta: SlotMeta,
}

/// All of the solution slots for a single spectral window.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpwSolutions {
    /// The number of parameter channels.
    pub num_chans: usize,

    /// The data channel corresponding to the first parameter channel.
    pub start_chan: usize,

    pub slots: Vec<CalSlot>,
}

/// Calibration solutions for every spectral window, each with a sequence of
/// time slots. Slots are allocated up front (see [`CalSet::resize`]) and are
/// then addressed by index.
#[derive(Debug, Clone, PartialEq)]
pub struct CalSet {
    cal_type: CalType,
    num_elements: usize,
    spws: Vec<SpwSolutions>,
}

impl CalSet {
    /// A pristine set; no spw has any slots.
    pub fn new(cal_type: CalType, num_spws: usize, num_elements: usize) -> CalSet {
        CalSet {
            cal_type,
            num_elements,
            spws: vec![SpwSolutions::default(); num_spws],
        }
    }

    /// Read a cal table. If `expected_type` is given, the table's type tag must
    /// match it. If `fields` is not empty, only slots from those fields are
    /// kept. The set has at least `min_num_spws` spws.
    pub fn load(
        file: &Path,
        expected_type: Option<CalType>,
        fields: &[usize],
        min_num_spws: usize,
    ) -> Result<CalSet, CalTableReadError> {
        let table = read_cal_table_file(file)?;
        let cal_type = match CalType::from_type_name(&table.cal_type) {
            Some(t) if expected_type.map(|e| e == t).unwrap_or(true) => t,
            _ => {
                return Err(CalTableReadError::WrongType {
                    path: file.to_path_buf(),
                    expected: expected_type
                        .map(|t| t.type_name().to_string())
                        .unwrap_or_else(|| "a known calibration type".to_string()),
                    got: table.cal_type,
                })
            }
        };
        if table.num_params != cal_type.num_params() {
            return Err(CalTableReadError::BadShape {
                thing: "num_params",
                expected: cal_type.num_params(),
                actual: table.num_params,
            });
        }

        let num_spws = table
            .spws
            .iter()
            .map(|s| s.spw + 1)
            .chain([table.num_spws, min_num_spws])
            .max()
            .unwrap_or(0);
        let mut cal_set = CalSet::new(cal_type, num_spws, table.num_elements);
        let mut num_dropped = 0;
        for spw in table.spws {
            let spw_solutions = &mut cal_set.spws[spw.spw];
            spw_solutions.num_chans = spw.num_chans;
            spw_solutions.start_chan = spw.start_chan;
            for slot in spw.slots {
                if !fields.is_empty() && !fields.contains(&slot.meta.field_id) {
                    num_dropped += 1;
                    continue;
                }
                spw_solutions.slots.push(slot.into_slot(
                    table.num_params,
                    spw.num_chans,
                    table.num_elements,
                )?);
            }
        }
        info!(
            "Read {} solution slots of type '{}' from {}",
            cal_set.spws.iter().map(|s| s.slots.len()).sum::<usize>(),
            cal_type.type_name(),
            file.display()
        );
        if num_dropped > 0 {
            debug!("{num_dropped} slots were not from the selected fields");
        }

        Ok(cal_set)
    }

    /// Shape every spw. Each slot gets identity parameters, all marked invalid,
    /// until a solution is kept into it.
    pub fn resize(&mut self, num_chans: &[usize], start_chans: &[usize], num_slots: &[usize]) {
        let num_spws = self.spws.len();
        assert_eq!(num_chans.len(), num_spws);
        assert_eq!(start_chans.len(), num_spws);
        assert_eq!(num_slots.len(), num_spws);

        let num_params = self.cal_type.num_params();
        let num_elements = self.num_elements;
        let identity = self.cal_type.identity_params();
        for (i_spw, spw) in self.spws.iter_mut().enumerate() {
            let spw_num_chans = num_chans[i_spw];
            spw.num_chans = spw_num_chans;
            spw.start_chan = start_chans[i_spw];
            spw.slots = (0..num_slots[i_spw])
                .map(|_| {
                    let mut cube =
                        ParameterCube::new(num_params, spw_num_chans, num_elements, &identity);
                    cube.par_ok.fill(false);
                    CalSlot {
                        cube,
                        meta: SlotMeta::pristine(num_elements),
                    }
                })
                .collect();
        }
    }

    pub fn cal_type(&self) -> CalType {
        self.cal_type
    }

    pub fn num_spws(&self) -> usize {
        self.spws.len()
    }

    pub fn num_elements(&self) -> usize {
        self.num_elements
    }

    pub fn spw(&self, spw: usize) -> &SpwSolutions {
        &self.spws[spw]
    }

    pub fn num_slots(&self, spw: usize) -> usize {
        self.spws[spw].slots.len()
    }

    pub fn slot(&self, spw: usize, slot: usize) -> &CalSlot {
        &self.spws[spw].slots[slot]
    }

    pub fn slot_mut(&mut self, spw: usize, slot: usize) -> &mut CalSlot {
        &mut self.spws[spw].slots[slot]
    }

    /// Borrow one slot immutably and another mutably.
    pub fn slot_pair_mut(&mut self, spw: usize, prev: usize, curr: usize) -> (&CalSlot, &mut CalSlot) {
        assert_ne!(prev, curr, "Cannot borrow the same slot twice");
        let slots = &mut self.spws[spw].slots;
        if prev < curr {
            let (left, right) = slots.split_at_mut(curr);
            (&left[prev], &mut right[0])
        } else {
            let (left, right) = slots.split_at_mut(prev);
            (&right[0], &mut left[curr])
        }
    }

    /// Slot indices for a spw, ordered by time.
    pub fn time_order(&self, spw: usize) -> Vec<usize> {
        let slots = &self.spws[spw].slots;
        (0..slots.len())
            .sorted_by(|&a, &b| slots[a].meta.time.total_cmp(&slots[b].meta.time))
            .collect()
    }

    /// All field IDs present in good slots, ascending.
    pub fn field_ids(&self) -> Vec<usize> {
        self.spws
            .iter()
            .flat_map(|spw| spw.slots.iter())
            .filter(|slot| slot.meta.solution_ok)
            .map(|slot| slot.meta.field_id)
            .sorted()
            .dedup()
            .collect()
    }

    /// The name of a field, as recorded in the slots.
    pub fn field_name(&self, field_id: usize) -> Option<&str> {
        self.spws
            .iter()
            .flat_map(|spw| spw.slots.iter())
            .find(|slot| slot.meta.field_id == field_id)
            .map(|slot| slot.meta.field_name.as_str())
    }

    /// Write this set to a cal table. Only slots with a good solution are
    /// written. If `append` is true and the file exists, its slots are kept
    /// and the new ones are added after them.
    pub fn store(
        &self,
        file: &Path,
        source_dataset: &str,
        append: bool,
    ) -> Result<(), CalTableWriteError> {
        let mut table = if append && file.exists() {
            let existing = read_cal_table_file(file)
                .map_err(|e| CalTableWriteError::Append(file.to_path_buf(), Box::new(e)))?;
            if existing.cal_type != self.cal_type.type_name()
                || existing.num_elements != self.num_elements
            {
                return Err(CalTableWriteError::AppendMismatch {
                    path: file.to_path_buf(),
                    new: self.cal_type.type_name().to_string(),
                    existing: existing.cal_type,
                    existing_elements: existing.num_elements,
                });
            }
            existing
        } else {
            CalTableFile {
                format: CAL_TABLE_FORMAT.to_string(),
                cal_type: self.cal_type.type_name().to_string(),
                source_dataset: source_dataset.to_string(),
                software_version: env!("CARGO_PKG_VERSION").to_string(),
                num_spws: 0,
                num_params: self.cal_type.num_params(),
                num_elements: self.num_elements,
                spws: vec![],
            }
        };
        table.num_spws = table.num_spws.max(self.spws.len());

        let mut num_written = 0;
        for (i_spw, spw) in self.spws.iter().enumerate() {
            if spw.slots.is_empty() {
                continue;
            }
            let good_slots = spw
                .slots
                .iter()
                .filter(|slot| slot.meta.solution_ok)
                .map(CalTableSlot::from_slot);

            match table.spws.iter_mut().find(|s| s.spw == i_spw) {
                Some(existing) => {
                    // Appending requires that the channelisation agrees.
                    if existing.num_chans != spw.num_chans {
                        return Err(CalTableWriteError::AppendMismatch {
                            path: file.to_path_buf(),
                            new: format!("{} channels in spw {i_spw}", spw.num_chans),
                            existing: format!("{} channels", existing.num_chans),
                            existing_elements: self.num_elements,
                        });
                    }
                    let before = existing.slots.len();
                    existing.slots.extend(good_slots);
                    num_written += existing.slots.len() - before;
                }
                None => {
                    let slots: Vec<CalTableSlot> = good_slots.collect();
                    num_written += slots.len();
                    table.spws.push(CalTableSpw {
                        spw: i_spw,
                        num_chans: spw.num_chans,
                        start_chan: spw.start_chan,
                        slots,
                    });
                }
            }
        }
        table.spws.sort_unstable_by_key(|s| s.spw);

        write_cal_table_file(file, &table)?;
        info!(
            "{} {num_written} solution slots to {}",
            if append { "Appended" } else { "Wrote" },
            file.display()
        );
        Ok(())
    }
}
