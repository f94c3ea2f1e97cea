// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Common arguments for command-line interfaces. Here, we abstract many aspects
//! of `viscal`, e.g. the `solve` and `apply` subcommands both read a dataset,
//! and every subcommand parses calibration types and interpolation modes the
//! same way.

mod printers;
#[cfg(test)]
mod tests;

pub(super) use printers::{display_warnings, report_diagnostics, InfoPrinter, Warn};

use std::{
    path::{Path, PathBuf},
    str::FromStr,
};

use itertools::Itertools;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

use super::ViscalError;
use crate::{
    apply::ApplyMode,
    solutions::{FreqInterp, TimeInterp, CAL_TABLE_EXTENSIONS},
    vis_io::{read_vis_dataset, MemoryVisSet, VIS_FILE_EXTENSIONS},
    CalType,
};

lazy_static::lazy_static! {
    pub(super) static ref ARG_FILE_TYPES_COMMA_SEPARATED: String = ArgFileTypes::iter().join(", ");

    pub(super) static ref ARG_FILE_HELP: String =
        format!("All arguments may be specified in a file. Any CLI arguments override arguments set in the file. Supported formats: {}", *ARG_FILE_TYPES_COMMA_SEPARATED);

    pub(super) static ref CAL_TYPES_COMMA_SEPARATED: String = CalType::iter().join(", ");

    pub(super) static ref CAL_TYPE_HELP: String =
        format!("The calibration type. Supported types: {}", *CAL_TYPES_COMMA_SEPARATED);

    pub(super) static ref DATA_HELP: String =
        format!("Path to the dataset. Supported formats: {}", *VIS_FILE_EXTENSIONS);

    pub(super) static ref CAL_TABLE_HELP: String =
        format!("Path to the cal table. Supported formats: {}", *CAL_TABLE_EXTENSIONS);

    pub(super) static ref TIME_INTERP_HELP: String =
        format!("How to pick solutions in time. Supported: {}. Default: {}", TimeInterp::iter().join(", "), TimeInterp::default());

    pub(super) static ref FREQ_INTERP_HELP: String =
        format!("How to pick solutions in frequency. Supported: {}. Default: {}", FreqInterp::iter().join(", "), FreqInterp::default());

    pub(super) static ref APPLY_MODE_HELP: String =
        format!("What to do with the solutions. Supported: {}. Default: {}", ApplyMode::iter().join(", "), ApplyMode::default());
}

#[derive(Debug, Display, EnumIter, EnumString)]
pub(super) enum ArgFileTypes {
    #[strum(serialize = "toml")]
    Toml,
    #[strum(serialize = "json")]
    Json,
}

macro_rules! unpack_arg_file {
    ($arg_file:expr) => ({
        use std::{fs::File, io::Read, str::FromStr};

        use crate::cli::common::{ArgFileTypes, ARG_FILE_TYPES_COMMA_SEPARATED};

        debug!("Attempting to parse argument file {}", $arg_file.display());

        let mut contents = String::new();
        let arg_file_type = $arg_file
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .and_then(|e| ArgFileTypes::from_str(&e).ok());

        match arg_file_type {
            Some(ArgFileTypes::Toml) => {
                debug!("Parsing toml file...");
                let mut fh = File::open(&$arg_file)?;
                fh.read_to_string(&mut contents)?;
                match toml::from_str(&contents) {
                    Ok(p) => p,
                    Err(err) => {
                        return Err(ViscalError::ArgFile(format!(
                            "Couldn't decode toml structure from {:?}:\n{err}",
                            $arg_file
                        )))
                    }
                }
            }
            Some(ArgFileTypes::Json) => {
                debug!("Parsing json file...");
                let mut fh = File::open(&$arg_file)?;
                fh.read_to_string(&mut contents)?;
                match serde_json::from_str(&contents) {
                    Ok(p) => p,
                    Err(err) => {
                        return Err(ViscalError::ArgFile(format!(
                            "Couldn't decode json structure from {:?}:\n{err}",
                            $arg_file
                        )))
                    }
                }
            }

            _ => {
                return Err(ViscalError::ArgFile(format!(
                    "Argument file '{:?}' doesn't have a recognised file extension! Valid extensions are: {}", $arg_file, *ARG_FILE_TYPES_COMMA_SEPARATED)
                ))
            }
        }
    });
}

/// Parse a strum enum from a user string, complaining with the valid values.
pub(super) fn parse_enum<T>(value: Option<&str>, what: &str) -> Result<Option<T>, ViscalError>
where
    T: FromStr + IntoEnumIterator + std::fmt::Display,
{
    match value {
        None => Ok(None),
        Some(s) => T::from_str(s.trim()).map(Some).map_err(|_| {
            ViscalError::Generic(format!(
                "Unrecognised {what} '{s}'; supported values: {}",
                T::iter().join(", ")
            ))
        }),
    }
}

/// Parse a calibration type, which must be given.
pub(super) fn parse_cal_type(value: Option<&str>) -> Result<CalType, ViscalError> {
    parse_enum(value, "calibration type")?.ok_or_else(|| {
        ViscalError::Generic(format!(
            "No calibration type was given; supported types: {}",
            *CAL_TYPES_COMMA_SEPARATED
        ))
    })
}

/// Get a path that must have been given.
pub(super) fn require_path(path: Option<PathBuf>, what: &str) -> Result<PathBuf, ViscalError> {
    match path {
        Some(p) if !p.as_os_str().is_empty() => Ok(p),
        _ => Err(ViscalError::Generic(format!("No {what} was given"))),
    }
}

/// Read a dataset, with optional channel selections of the form
/// `SPW:START:COUNT`.
pub(super) fn read_dataset(
    data: &Path,
    channel_selections: &[String],
) -> Result<MemoryVisSet, ViscalError> {
    use crate::vis_io::VisIterator;

    let mut vis = read_vis_dataset(data)?;
    for selection in channel_selections {
        let (spw, start, count) = parse_channel_selection(selection)?;
        vis.select_channels(spw, start, count)?;
    }
    Ok(vis)
}

pub(super) fn parse_channel_selection(s: &str) -> Result<(usize, usize, usize), ViscalError> {
    let bad = || {
        ViscalError::Generic(format!(
            "Couldn't parse channel selection '{s}'; expected SPW:START:COUNT"
        ))
    };
    let parts: Vec<usize> = s
        .split(':')
        .map(|p| p.trim().parse::<usize>())
        .collect::<Result<_, _>>()
        .map_err(|_| bad())?;
    match parts.as_slice() {
        [spw, start, count] => Ok((*spw, *start, *count)),
        _ => Err(bad()),
    }
}
