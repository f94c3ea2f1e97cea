// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The on-disk layout of cal tables.
//!
//! A table is a single JSON or YAML document. Each spw lists its slots; each
//! slot carries its metadata and the four parameter-cube companions flattened
//! in (parameter, channel, element) order. Complex parameters are `[re, im]`
//! pairs.

use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

use log::debug;
use marlu::c64;
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};

use super::{
    CalSlot, CalTableReadError, CalTableType, CalTableWriteError, ParameterCube, SlotMeta,
};

/// Written into every table so that random JSON/YAML files are rejected.
pub(super) const CAL_TABLE_FORMAT: &str = "viscal cal table";

#[derive(Debug, Serialize, Deserialize)]
pub(super) struct CalTableFile {
    pub(super) format: String,

    /// The calibration type name, e.g. "G Jones".
    pub(super) cal_type: String,

    /// The name of the dataset that these solutions came from.
    pub(super) source_dataset: String,

    /// The version of the software that wrote this table.
    pub(super) software_version: String,

    pub(super) num_spws: usize,
    pub(super) num_params: usize,
    pub(super) num_elements: usize,
    pub(super) spws: Vec<CalTableSpw>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(super) struct CalTableSpw {
    pub(super) spw: usize,
    pub(super) num_chans: usize,
    pub(super) start_chan: usize,
    pub(super) slots: Vec<CalTableSlot>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(super) struct CalTableSlot {
    #[serde(flatten)]
    pub(super) meta: SlotMeta,
    pub(super) par: Vec<[f64; 2]>,
    pub(super) par_ok: Vec<bool>,
    pub(super) par_err: Vec<f64>,
    pub(super) par_snr: Vec<f64>,
}

impl CalTableSlot {
    pub(super) fn from_slot(slot: &CalSlot) -> CalTableSlot {
        let cube = &slot.cube;
        CalTableSlot {
            meta: slot.meta.clone(),
            par: cube.par.iter().map(|p| [p.re, p.im]).collect(),
            par_ok: cube.par_ok.iter().copied().collect(),
            par_err: cube.par_err.iter().copied().collect(),
            par_snr: cube.par_snr.iter().copied().collect(),
        }
    }

    pub(super) fn into_slot(
        self,
        num_params: usize,
        num_chans: usize,
        num_elements: usize,
    ) -> Result<CalSlot, CalTableReadError> {
        let shape = (num_params, num_chans, num_elements);
        let expected = num_params * num_chans * num_elements;
        let check = |thing: &'static str, actual: usize| {
            if actual == expected {
                Ok(())
            } else {
                Err(CalTableReadError::BadShape {
                    thing,
                    expected,
                    actual,
                })
            }
        };
        check("par", self.par.len())?;
        check("par_ok", self.par_ok.len())?;
        check("par_err", self.par_err.len())?;
        check("par_snr", self.par_snr.len())?;
        if self.meta.elem_fit_weight.len() != num_elements {
            return Err(CalTableReadError::BadShape {
                thing: "elem_fit_weight",
                expected: num_elements,
                actual: self.meta.elem_fit_weight.len(),
            });
        }

        // The lengths have been checked, so the reshapes can't fail.
        let reshape_err = |_| CalTableReadError::BadShape {
            thing: "cube",
            expected,
            actual: 0,
        };
        let par = self
            .par
            .into_iter()
            .map(|[re, im]| c64::new(re, im))
            .collect::<Vec<_>>();
        let cube = ParameterCube {
            par: Array3::from_shape_vec(shape, par).map_err(reshape_err)?,
            par_ok: Array3::from_shape_vec(shape, self.par_ok).map_err(reshape_err)?,
            par_err: Array3::from_shape_vec(shape, self.par_err).map_err(reshape_err)?,
            par_snr: Array3::from_shape_vec(shape, self.par_snr).map_err(reshape_err)?,
        };
        Ok(CalSlot {
            cube,
            meta: self.meta,
        })
    }
}

pub(super) fn read_cal_table_file(file: &Path) -> Result<CalTableFile, CalTableReadError> {
    if !file.exists() {
        return Err(CalTableReadError::DoesNotExist(file.to_path_buf()));
    }
    let table_type = CalTableType::from_path(file).ok_or_else(|| {
        CalTableReadError::UnsupportedExt {
            ext: file
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("<no extension>")
                .to_string(),
        }
    })?;

    debug!("Reading {table_type} cal table {}", file.display());
    let reader = BufReader::new(File::open(file)?);
    let not_cal_table = |reason: String| CalTableReadError::NotCalTable {
        path: file.to_path_buf(),
        reason,
    };
    let table: CalTableFile = match table_type {
        CalTableType::Json => {
            serde_json::from_reader(reader).map_err(|e| not_cal_table(e.to_string()))?
        }
        CalTableType::Yaml => {
            serde_yaml::from_reader(reader).map_err(|e| not_cal_table(e.to_string()))?
        }
    };
    if table.format != CAL_TABLE_FORMAT {
        return Err(not_cal_table(format!(
            "expected format '{CAL_TABLE_FORMAT}', got '{}'",
            table.format
        )));
    }
    Ok(table)
}

pub(super) fn write_cal_table_file(
    file: &Path,
    table: &CalTableFile,
) -> Result<(), CalTableWriteError> {
    let table_type =
        CalTableType::from_path(file).ok_or_else(|| CalTableWriteError::UnsupportedExt {
            ext: file
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("<no extension>")
                .to_string(),
        })?;

    debug!("Writing {table_type} cal table {}", file.display());
    let writer = BufWriter::new(File::create(file)?);
    match table_type {
        CalTableType::Json => serde_json::to_writer_pretty(writer, table)?,
        CalTableType::Yaml => serde_yaml::to_writer(writer, table)?,
    }
    Ok(())
}
