// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! A dataset held entirely in memory.

use std::ops::Range;

use log::trace;
use marlu::{c64, Jones};
use ndarray::prelude::*;

use super::{
    SortColumn, VisBuffer, VisIterator, VisMetadata, VisReadError, VisRecord, VisRow,
    VisWriteError,
};

/// A column store of [`VisRow`]s with an iterator over them.
#[derive(Debug, Clone)]
pub struct MemoryVisSet {
    metadata: VisMetadata,
    rows: Vec<VisRow>,

    /// (start, count) per spw.
    chan_selection: Vec<(usize, usize)>,

    sort_columns: Vec<SortColumn>,
    interval: f64,

    /// Row indices in sorted order.
    order: Vec<usize>,

    /// Ranges into `order`.
    chunks: Vec<Range<usize>>,
    i_chunk: usize,

    /// Ranges into `order` for the timestamps of the current chunk.
    sub_chunks: Vec<Range<usize>>,
    i_sub: usize,
}

impl MemoryVisSet {
    /// Check the rows against the metadata and fill in any missing model,
    /// corrected or flag columns. The iterator starts sorted by observation,
    /// array, scan, field, spw and time, with no time breaks.
    pub fn new(metadata: VisMetadata, mut rows: Vec<VisRow>) -> Result<MemoryVisSet, VisReadError> {
        let num_antennas = metadata.num_antennas();
        let one = c64::new(1.0, 0.0);
        let zero = c64::default();
        let unit_model = Jones::from([one, zero, zero, one]);

        for (i_row, row) in rows.iter_mut().enumerate() {
            let bad = |reason: String| VisReadError::BadRow { row: i_row, reason };
            if row.spw >= metadata.num_spws() {
                return Err(bad(format!(
                    "spw {} doesn't exist ({} spws)",
                    row.spw,
                    metadata.num_spws()
                )));
            }
            if row.antenna1 >= num_antennas || row.antenna2 >= num_antennas {
                return Err(bad(format!(
                    "antennas ({}, {}) aren't all less than {num_antennas}",
                    row.antenna1, row.antenna2
                )));
            }
            if row.field >= metadata.field_names.len() {
                return Err(bad(format!("field {} doesn't exist", row.field)));
            }
            if !row.time.is_finite() {
                return Err(bad("the time is not finite".to_string()));
            }
            let num_chans = metadata.num_chans(row.spw);
            if row.data.len() != num_chans {
                return Err(bad(format!(
                    "has {} data channels, but spw {} has {num_chans}",
                    row.data.len(),
                    row.spw
                )));
            }
            if row.model.is_empty() {
                row.model = vec![unit_model; num_chans];
            }
            if row.corrected.is_empty() {
                row.corrected = row.data.clone();
            }
            if row.flags.is_empty() {
                row.flags = vec![false; num_chans];
            }
            if row.model.len() != num_chans
                || row.corrected.len() != num_chans
                || row.flags.len() != num_chans
            {
                return Err(bad(
                    "model, corrected and flag columns must match the data channels".to_string(),
                ));
            }
        }

        let chan_selection = metadata
            .spws
            .iter()
            .map(|spw| (0, spw.chan_freqs.len()))
            .collect();
        let mut vis_set = MemoryVisSet {
            metadata,
            rows,
            chan_selection,
            sort_columns: vec![],
            interval: 0.0,
            order: vec![],
            chunks: vec![],
            i_chunk: 0,
            sub_chunks: vec![],
            i_sub: 0,
        };
        vis_set.set_sort(
            &[
                SortColumn::Observation,
                SortColumn::Array,
                SortColumn::Scan,
                SortColumn::Field,
                SortColumn::Spw,
                SortColumn::Time,
            ],
            0.0,
        );
        Ok(vis_set)
    }

    pub fn rows(&self) -> &[VisRow] {
        &self.rows
    }

    /// The number of chunks for the current sort.
    pub fn num_chunks(&self) -> usize {
        self.chunks.len()
    }

    fn same_chunk_keys(&self, a: &VisRow, b: &VisRow) -> bool {
        a.spw == b.spw
            && a.field == b.field
            && self
                .sort_columns
                .iter()
                .filter(|&&c| c != SortColumn::Time)
                .all(|c| c.compare(a, b).is_eq())
    }

    fn make_sub_chunks(&mut self) {
        self.sub_chunks.clear();
        self.i_sub = 0;
        let chunk = match self.chunks.get(self.i_chunk) {
            Some(c) => c.clone(),
            None => return,
        };
        let mut start = chunk.start;
        for i in chunk.start + 1..chunk.end {
            if self.rows[self.order[i]].time != self.rows[self.order[start]].time {
                self.sub_chunks.push(start..i);
                start = i;
            }
        }
        self.sub_chunks.push(start..chunk.end);
    }
}

impl VisIterator for MemoryVisSet {
    fn metadata(&self) -> &VisMetadata {
        &self.metadata
    }

    fn set_sort(&mut self, columns: &[SortColumn], interval: f64) {
        self.sort_columns = columns.to_vec();
        self.interval = interval;

        let rows = &self.rows;
        let mut order: Vec<usize> = (0..rows.len()).collect();
        order.sort_by(|&i, &j| {
            let (a, b) = (&rows[i], &rows[j]);
            columns
                .iter()
                .fold(std::cmp::Ordering::Equal, |ord, c| {
                    ord.then_with(|| c.compare(a, b))
                })
                .then_with(|| a.time.total_cmp(&b.time))
                .then_with(|| a.spw.cmp(&b.spw))
                .then_with(|| a.field.cmp(&b.field))
                .then_with(|| a.antenna1.cmp(&b.antenna1))
                .then_with(|| a.antenna2.cmp(&b.antenna2))
        });
        self.order = order;

        let mut chunks = vec![];
        if !self.order.is_empty() {
            let mut start = 0;
            for i in 1..self.order.len() {
                let first = &self.rows[self.order[start]];
                let this = &self.rows[self.order[i]];
                let new_chunk = !self.same_chunk_keys(first, this)
                    || (interval > 0.0 && this.time - first.time > interval);
                if new_chunk {
                    chunks.push(start..i);
                    start = i;
                }
            }
            chunks.push(start..self.order.len());
        }
        trace!(
            "Sorted on {:?} with interval {}: {} chunks",
            self.sort_columns,
            self.interval,
            chunks.len()
        );
        self.chunks = chunks;
        self.origin_chunks();
    }

    fn select_channels(
        &mut self,
        spw: usize,
        start: usize,
        count: usize,
    ) -> Result<(), VisReadError> {
        let num_chans = if spw < self.metadata.num_spws() {
            self.metadata.num_chans(spw)
        } else {
            0
        };
        if count == 0 || start + count > num_chans {
            return Err(VisReadError::ChannelSelection {
                spw,
                start,
                count,
                num_chans,
            });
        }
        self.chan_selection[spw] = (start, count);
        Ok(())
    }

    fn channel_selection(&self, spw: usize) -> (usize, usize) {
        self.chan_selection[spw]
    }

    fn origin_chunks(&mut self) {
        self.i_chunk = 0;
        self.make_sub_chunks();
    }

    fn more_chunks(&self) -> bool {
        self.i_chunk < self.chunks.len()
    }

    fn next_chunk(&mut self) {
        self.i_chunk += 1;
        self.make_sub_chunks();
    }

    fn chunk_record(&self) -> Option<VisRecord> {
        self.chunks
            .get(self.i_chunk)
            .map(|c| VisRecord::from(&self.rows[self.order[c.start]]))
    }

    fn origin(&mut self) {
        self.i_sub = 0;
    }

    fn more(&self) -> bool {
        self.i_sub < self.sub_chunks.len()
    }

    fn advance(&mut self) {
        self.i_sub += 1;
    }

    fn buffer(&self) -> VisBuffer {
        assert!(self.more(), "There is no current buffer");
        let row_ids: Vec<usize> = self.order[self.sub_chunks[self.i_sub].clone()].to_vec();
        let first = &self.rows[row_ids[0]];
        let spw = first.spw;
        let (start, count) = self.chan_selection[spw];
        let chans: Vec<usize> = (start..start + count).collect();
        let freqs = chans
            .iter()
            .map(|&c| self.metadata.spws[spw].chan_freqs[c])
            .collect();

        let rows: Vec<&VisRow> = row_ids.iter().map(|&i| &self.rows[i]).collect();
        let shape = (rows.len(), count);
        let cube = |f: fn(&VisRow) -> &[Jones<f64>]| {
            Array2::from_shape_fn(shape, |(r, c)| f(rows[r])[start + c])
        };
        VisBuffer {
            spw,
            field: first.field,
            chans,
            freqs,
            time: rows.iter().map(|r| r.time).collect(),
            exposure: rows.iter().map(|r| r.exposure).collect(),
            observation: rows.iter().map(|r| r.observation).collect(),
            array: rows.iter().map(|r| r.array).collect(),
            scan: rows.iter().map(|r| r.scan).collect(),
            antenna1: rows.iter().map(|r| r.antenna1).collect(),
            antenna2: rows.iter().map(|r| r.antenna2).collect(),
            flag_row: rows.iter().map(|r| r.flag_row).collect(),
            weight: rows.iter().map(|r| r.weight).collect(),
            data: cube(|r| r.data.as_slice()),
            model: cube(|r| r.model.as_slice()),
            corrected: cube(|r| r.corrected.as_slice()),
            flags: Array2::from_shape_fn(shape, |(r, c)| rows[r].flags[start + c]),
            row_ids,
        }
    }

    fn write_buffer(&mut self, buffer: &VisBuffer) -> Result<(), VisWriteError> {
        let num_rows = self.rows.len();
        for (buffer_row, &row_id) in buffer.row_ids.iter().enumerate() {
            let row = self.rows.get_mut(row_id).ok_or(VisWriteError::BadRowId {
                buffer_row,
                row_id,
                num_rows,
            })?;
            row.flag_row = buffer.flag_row[buffer_row];
            for (i_chan, &chan) in buffer.chans.iter().enumerate() {
                if chan >= row.data.len() {
                    return Err(VisWriteError::BadChannel {
                        got: buffer.num_chans(),
                        chan,
                        row_id,
                        num_chans: row.data.len(),
                    });
                }
                row.data[chan] = buffer.data[(buffer_row, i_chan)];
                row.model[chan] = buffer.model[(buffer_row, i_chan)];
                row.corrected[chan] = buffer.corrected[(buffer_row, i_chan)];
                row.flags[chan] = buffer.flags[(buffer_row, i_chan)];
            }
        }
        Ok(())
    }
}
