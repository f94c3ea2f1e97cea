// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with reading, writing or combining cal tables.

use std::path::PathBuf;

use thiserror::Error;

use super::CAL_TABLE_EXTENSIONS;

#[derive(Error, Debug)]
pub enum CalTableReadError {
    #[error("Cal table '{0}' does not exist")]
    DoesNotExist(PathBuf),

    #[error("Tried to read a cal table with an unsupported extension '{ext}'! Supported types are: {}", *CAL_TABLE_EXTENSIONS)]
    UnsupportedExt { ext: String },

    #[error("'{path}' is not a calibration table: {reason}")]
    NotCalTable { path: PathBuf, reason: String },

    #[error("Cal table '{path}' has type '{got}', but '{expected}' was expected")]
    WrongType {
        path: PathBuf,
        expected: String,
        got: String,
    },

    #[error("Based on the dimensions of the cal table, expected {thing} to have {expected} elements, but it had {actual} instead!")]
    BadShape {
        /// What was it that wasn't sensible? Parameters, validity flags, etc.
        thing: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error(transparent)]
    IO(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum CalTableWriteError {
    #[error("Tried to write a cal table with an unsupported extension '{ext}'! Supported types are: {}", *CAL_TABLE_EXTENSIONS)]
    UnsupportedExt { ext: String },

    #[error("Cannot append to '{0}': {1}")]
    Append(PathBuf, Box<CalTableReadError>),

    #[error("Cannot append {new} solutions to '{path}', which holds {existing} solutions with {existing_elements} elements")]
    AppendMismatch {
        path: PathBuf,
        new: String,
        existing: String,
        existing_elements: usize,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    IO(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum AccumulateError {
    #[error("Cannot accumulate {increment} solutions onto {cumulative} solutions")]
    TypeMismatch {
        cumulative: &'static str,
        increment: &'static str,
    },

    #[error("The cumulative table has {cumulative} elements, but the incremental table has {increment}")]
    ElementMismatch { cumulative: usize, increment: usize },

    #[error("Spw {spw}: the cumulative table has {cumulative} channels, but the incremental table has {increment}")]
    ChannelMismatch {
        spw: usize,
        cumulative: usize,
        increment: usize,
    },
}
