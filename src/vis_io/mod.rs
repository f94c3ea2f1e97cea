// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Visibility datasets, and iterating over them in chunks and buffers.
//!
//! A dataset is a table of rows; each row is one baseline at one time in one
//! spectral window. An iterator sorts the rows, groups them into chunks
//! (contiguous rows sharing every non-time sort key, spanning less than the
//! iteration interval), and steps through each chunk one timestamp (buffer)
//! at a time.

mod error;
mod file;
mod maps;
mod memory;
#[cfg(test)]
mod tests;

pub use error::{VisReadError, VisWriteError};
pub use file::{read_vis_dataset, write_vis_dataset, VisDatasetFile, VisFileType};
pub(crate) use file::VIS_FILE_EXTENSIONS;
pub use maps::{compute_maps, BufferMaps};
pub use memory::MemoryVisSet;

use std::cmp::Ordering;

use hifitime::Epoch;
use marlu::Jones;
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};

/// Information on a dataset that doesn't change per row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisMetadata {
    /// The name of the dataset. This is recorded in cal tables.
    pub name: String,

    pub antenna_names: Vec<String>,

    pub field_names: Vec<String>,

    /// The source observed in each field. May be empty, in which case field
    /// names are used.
    #[serde(default)]
    pub source_names: Vec<String>,

    pub spws: Vec<SpwInfo>,
}

/// A spectral window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpwInfo {
    /// The centre frequency of each channel \[Hz\].
    pub chan_freqs: Vec<f64>,
}

impl VisMetadata {
    pub fn num_antennas(&self) -> usize {
        self.antenna_names.len()
    }

    pub fn num_spws(&self) -> usize {
        self.spws.len()
    }

    pub fn num_chans(&self, spw: usize) -> usize {
        self.spws[spw].chan_freqs.len()
    }

    pub fn field_name(&self, field: usize) -> &str {
        self.field_names
            .get(field)
            .map(|s| s.as_str())
            .unwrap_or("")
    }

    pub fn source_name(&self, field: usize) -> &str {
        self.source_names
            .get(field)
            .map(|s| s.as_str())
            .unwrap_or_else(|| self.field_name(field))
    }
}

/// A single dataset row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisRow {
    /// The centroid time of this row \[MJD seconds\].
    pub time: f64,

    /// \[seconds\]
    #[serde(default)]
    pub exposure: f64,

    #[serde(default)]
    pub observation: usize,
    #[serde(default)]
    pub array: usize,
    pub scan: usize,
    pub field: usize,
    pub spw: usize,
    pub antenna1: usize,
    pub antenna2: usize,

    #[serde(default)]
    pub flag_row: bool,

    /// One weight per correlation (XX, XY, YX, YY).
    pub weight: [f64; 4],

    /// Observed visibilities, one per channel.
    #[serde(with = "jones_serde")]
    pub data: Vec<Jones<f64>>,

    /// Model visibilities. If not given, a unit point source is assumed.
    #[serde(with = "jones_serde", default)]
    pub model: Vec<Jones<f64>>,

    /// Corrected visibilities. If not given, these start as a copy of `data`.
    #[serde(with = "jones_serde", default)]
    pub corrected: Vec<Jones<f64>>,

    /// Per-channel flags. If not given, nothing is flagged.
    #[serde(default)]
    pub flags: Vec<bool>,
}

/// The keys of a row that determine how it is grouped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisRecord {
    /// \[MJD seconds\]
    pub time: f64,
    pub observation: usize,
    pub array: usize,
    pub scan: usize,
    pub field: usize,
    pub spw: usize,
}

impl From<&VisRow> for VisRecord {
    fn from(row: &VisRow) -> VisRecord {
        VisRecord {
            time: row.time,
            observation: row.observation,
            array: row.array,
            scan: row.scan,
            field: row.field,
            spw: row.spw,
        }
    }
}

/// Columns rows may be sorted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortColumn {
    Observation,
    Array,
    Scan,
    Field,
    Spw,
    Time,
}

impl SortColumn {
    pub(crate) fn compare(self, a: &VisRow, b: &VisRow) -> Ordering {
        match self {
            SortColumn::Observation => a.observation.cmp(&b.observation),
            SortColumn::Array => a.array.cmp(&b.array),
            SortColumn::Scan => a.scan.cmp(&b.scan),
            SortColumn::Field => a.field.cmp(&b.field),
            SortColumn::Spw => a.spw.cmp(&b.spw),
            SortColumn::Time => a.time.total_cmp(&b.time),
        }
    }
}

/// The rows of a single timestamp within a chunk. All rows share a spw and a
/// field. Cubes are (row, channel), where only selected channels are present.
#[derive(Debug, Clone, PartialEq)]
pub struct VisBuffer {
    /// The dataset row that each buffer row came from.
    pub row_ids: Vec<usize>,

    pub spw: usize,
    pub field: usize,

    /// The spw channel index of each buffer channel.
    pub chans: Vec<usize>,

    /// \[Hz\]
    pub freqs: Vec<f64>,

    pub time: Vec<f64>,
    pub exposure: Vec<f64>,
    pub observation: Vec<usize>,
    pub array: Vec<usize>,
    pub scan: Vec<usize>,
    pub antenna1: Vec<usize>,
    pub antenna2: Vec<usize>,
    pub flag_row: Vec<bool>,
    pub weight: Vec<[f64; 4]>,

    pub data: Array2<Jones<f64>>,
    pub model: Array2<Jones<f64>>,
    pub corrected: Array2<Jones<f64>>,
    pub flags: Array2<bool>,
}

impl VisBuffer {
    pub fn num_rows(&self) -> usize {
        self.row_ids.len()
    }

    pub fn num_chans(&self) -> usize {
        self.chans.len()
    }

    /// The grouping keys of a buffer row.
    pub fn record(&self, row: usize) -> VisRecord {
        VisRecord {
            time: self.time[row],
            observation: self.observation[row],
            array: self.array[row],
            scan: self.scan[row],
            field: self.field,
            spw: self.spw,
        }
    }

    /// Is this row an auto-correlation?
    pub fn is_auto(&self, row: usize) -> bool {
        self.antenna1[row] == self.antenna2[row]
    }
}

/// An iterator over a dataset. Chunks are walked with
/// `origin_chunks`/`more_chunks`/`next_chunk` and the buffers of the current
/// chunk with `origin`/`more`/`advance`.
pub trait VisIterator {
    fn metadata(&self) -> &VisMetadata;

    /// Re-sort the dataset. `columns` are the primary sort keys (time is
    /// always the last key, even if not listed). Chunks break whenever a
    /// listed non-time column, the spw or the field changes, and otherwise
    /// span at most `interval` seconds from their first timestamp. An
    /// interval of 0 means no time breaks. The iterator is left at its first chunk.
    fn set_sort(&mut self, columns: &[SortColumn], interval: f64);

    /// Deliver only channels `start..start+count` of a spw.
    fn select_channels(&mut self, spw: usize, start: usize, count: usize)
        -> Result<(), VisReadError>;

    /// (start, count) of the delivered channels of a spw.
    fn channel_selection(&self, spw: usize) -> (usize, usize);

    fn origin_chunks(&mut self);
    fn more_chunks(&self) -> bool;
    fn next_chunk(&mut self);

    /// The keys of the first row of the current chunk.
    fn chunk_record(&self) -> Option<VisRecord>;

    fn origin(&mut self);
    fn more(&self) -> bool;
    fn advance(&mut self);

    /// The current buffer. Panics if there isn't one (i.e. `more` is false).
    fn buffer(&self) -> VisBuffer;

    /// Write a buffer's data, model, corrected visibilities and flags back
    /// into the dataset.
    fn write_buffer(&mut self, buffer: &VisBuffer) -> Result<(), VisWriteError>;
}

/// Render an MJD-seconds time for humans.
pub(crate) fn epoch_from_mjd_seconds(time: f64) -> Epoch {
    Epoch::from_mjd_utc(time / 86400.0)
}

/// (De)serialise Jones matrices as `[xx_re, xx_im, xy_re, xy_im, yx_re, yx_im,
/// yy_re, yy_im]`.
mod jones_serde {
    use marlu::{c64, Jones};
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(v: &[Jones<f64>], s: S) -> Result<S::Ok, S::Error> {
        s.collect_seq(v.iter().map(|j| {
            [
                j[0].re, j[0].im, j[1].re, j[1].im, j[2].re, j[2].im, j[3].re, j[3].im,
            ]
        }))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Jones<f64>>, D::Error> {
        let v: Vec<[f64; 8]> = Vec::deserialize(d)?;
        Ok(v.into_iter()
            .map(|a| {
                Jones::from([
                    c64::new(a[0], a[1]),
                    c64::new(a[2], a[3]),
                    c64::new(a[4], a[5]),
                    c64::new(a[6], a[7]),
                ])
            })
            .collect())
    }
}
