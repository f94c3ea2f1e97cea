// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors from reading and writing visibility datasets.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VisReadError {
    #[error("Dataset '{0}' does not exist")]
    DoesNotExist(PathBuf),

    #[error("Dataset extension '{ext}' isn't supported; supported extensions: {}", *super::file::VIS_FILE_EXTENSIONS)]
    UnsupportedExt { ext: String },

    #[error("Couldn't parse dataset '{path}': {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Dataset row {row} is invalid: {reason}")]
    BadRow { row: usize, reason: String },

    #[error("Cannot select channels {start}..{} of spw {spw}; it has {num_chans} channels", start + count)]
    ChannelSelection {
        spw: usize,
        start: usize,
        count: usize,
        num_chans: usize,
    },

    #[error(transparent)]
    IO(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum VisWriteError {
    #[error("Dataset extension '{ext}' isn't supported; supported extensions: {}", *super::file::VIS_FILE_EXTENSIONS)]
    UnsupportedExt { ext: String },

    #[error("Buffer row {buffer_row} refers to dataset row {row_id}, but the dataset only has {num_rows} rows")]
    BadRowId {
        buffer_row: usize,
        row_id: usize,
        num_rows: usize,
    },

    #[error("Buffer has {got} channels, but channel {chan} isn't in dataset row {row_id} ({num_chans} channels)")]
    BadChannel {
        got: usize,
        chan: usize,
        row_id: usize,
        num_chans: usize,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    IO(#[from] std::io::Error),
}
