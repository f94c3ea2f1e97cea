// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! All of the data of one solution interval, averaged per baseline.

use indexmap::IndexMap;
use log::trace;
use marlu::{c64, Jones};
use ndarray::prelude::*;

use crate::{
    params::Apmode,
    vis_io::{compute_maps, VisBuffer, VisIterator},
};

/// The visibilities of a solution interval, with one row per baseline. Data and
/// model are weighted averages over time (and over channels too, if the
/// calibration type isn't frequency dependent). Auto-correlations are never
/// included.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveBuffer {
    /// The spw of the first data to arrive.
    pub spw: usize,

    /// The field of the first data to arrive.
    pub field: usize,

    pub antenna1: Vec<usize>,
    pub antenna2: Vec<usize>,

    /// The data channel of each buffer channel.
    pub chans: Vec<usize>,

    /// \[Hz\]
    pub freqs: Vec<f64>,

    /// (row, chan)
    pub data: Array2<Jones<f64>>,

    /// (row, chan)
    pub model: Array2<Jones<f64>>,

    /// (row, chan, correlation). The summed weights of the averaged data.
    pub weight: Array3<f64>,

    /// (row, chan). Set where no correlation has any weight.
    pub flags: Array2<bool>,

    pub flag_row: Vec<bool>,

    /// The times of the first and last data used \[MJD seconds\].
    pub start_time: f64,
    pub stop_time: f64,

    /// Row weights multiplied by times, and row weights, for the mean time.
    time_weight_sum: f64,
    weight_sum: f64,
}

/// Weighted sums over one interval, before averaging.
struct Sums {
    data: Array3<c64>,
    model: Array3<c64>,
    weight: Array3<f64>,
}

impl SolveBuffer {
    /// Read `num_chunks` chunks from the iterator, starting at its current
    /// chunk, and average them per baseline. If `average_chans` is true, all
    /// channels are averaged together too. The iterator is left at the chunk
    /// after the last one read.
    pub fn accumulate(
        vi: &mut dyn VisIterator,
        num_chunks: usize,
        average_chans: bool,
    ) -> SolveBuffer {
        let mut pairs: IndexMap<(usize, usize), usize> = IndexMap::new();
        let mut sums: Option<Sums> = None;
        let mut sb = SolveBuffer::empty();
        let mut num_buffers = 0;

        for _ in 0..num_chunks {
            if !vi.more_chunks() {
                break;
            }
            vi.origin();
            while vi.more() {
                let buffer = vi.buffer();
                if num_buffers == 0 {
                    sb.spw = buffer.spw;
                    sb.field = buffer.field;
                    if average_chans {
                        sb.chans = buffer.chans.iter().take(1).copied().collect();
                        sb.freqs = vec![buffer.freqs.iter().sum::<f64>() / buffer.freqs.len() as f64];
                    } else {
                        sb.chans = buffer.chans.clone();
                        sb.freqs = buffer.freqs.clone();
                    }
                }
                num_buffers += 1;
                sb.add_buffer(&buffer, &mut pairs, &mut sums);
                vi.advance();
            }
            vi.next_chunk();
        }

        let num_rows = pairs.len();
        let num_chans = sb.chans.len();
        sb.antenna1 = pairs.keys().map(|&(a1, _)| a1).collect();
        sb.antenna2 = pairs.keys().map(|&(_, a2)| a2).collect();
        match sums {
            None => {
                sb.data = Array2::from_elem((0, num_chans), Jones::default());
                sb.model = Array2::from_elem((0, num_chans), Jones::default());
                sb.weight = Array3::zeros((0, num_chans, 4));
                sb.flags = Array2::from_elem((0, num_chans), true);
            }
            Some(sums) => {
                let avg = |sum: &Array3<c64>| {
                    Array2::from_shape_fn((num_rows, num_chans), |(r, c)| {
                        let mut v = [c64::default(); 4];
                        for (k, v) in v.iter_mut().enumerate() {
                            let w = sums.weight[(r, c, k)];
                            if w > 0.0 {
                                *v = sum[(r, c, k)] / w;
                            }
                        }
                        Jones::from(v)
                    })
                };
                sb.data = avg(&sums.data);
                sb.model = avg(&sums.model);
                sb.flags = Array2::from_shape_fn((num_rows, num_chans), |(r, c)| {
                    (0..4).all(|k| sums.weight[(r, c, k)] <= 0.0)
                });
                sb.weight = sums.weight;
            }
        }
        sb.flag_row = sb
            .flags
            .outer_iter()
            .map(|row| row.iter().all(|&f| f))
            .collect();

        trace!(
            "Accumulated {num_buffers} buffers into {num_rows} baselines x {num_chans} channels"
        );
        sb
    }

    fn empty() -> SolveBuffer {
        SolveBuffer {
            spw: 0,
            field: 0,
            antenna1: vec![],
            antenna2: vec![],
            chans: vec![],
            freqs: vec![],
            data: Array2::from_elem((0, 0), Jones::default()),
            model: Array2::from_elem((0, 0), Jones::default()),
            weight: Array3::zeros((0, 0, 4)),
            flags: Array2::from_elem((0, 0), true),
            flag_row: vec![],
            start_time: f64::INFINITY,
            stop_time: f64::NEG_INFINITY,
            time_weight_sum: 0.0,
            weight_sum: 0.0,
        }
    }

    fn add_buffer(
        &mut self,
        buffer: &VisBuffer,
        pairs: &mut IndexMap<(usize, usize), usize>,
        sums: &mut Option<Sums>,
    ) {
        let num_out_chans = self.chans.len();
        let average_chans = num_out_chans == 1 && buffer.num_chans() > 1;
        let maps = compute_maps(buffer);

        for (&(a1, a2), rows) in maps.antenna_pairs.iter() {
            if a1 == a2 {
                continue;
            }
            let next = pairs.len();
            let i_out = *pairs.entry((a1, a2)).or_insert(next);
            let sums = sums.get_or_insert_with(|| Sums {
                data: Array3::zeros((0, num_out_chans, 4)),
                model: Array3::zeros((0, num_out_chans, 4)),
                weight: Array3::zeros((0, num_out_chans, 4)),
            });
            while sums.weight.len_of(Axis(0)) <= i_out {
                let zeros_c = Array2::<c64>::zeros((num_out_chans, 4));
                let zeros_w = Array2::<f64>::zeros((num_out_chans, 4));
                // Appending along the outer axis of a standard-layout array
                // can't fail.
                let _ = sums.data.push(Axis(0), zeros_c.view());
                let _ = sums.model.push(Axis(0), zeros_c.view());
                let _ = sums.weight.push(Axis(0), zeros_w.view());
            }

            for &r in rows {
                if buffer.flag_row[r] {
                    continue;
                }
                let mut used = false;
                for c in 0..buffer.num_chans() {
                    if buffer.flags[(r, c)] {
                        continue;
                    }
                    let c_out = if average_chans { 0 } else { c };
                    if c_out >= num_out_chans {
                        continue;
                    }
                    let d = buffer.data[(r, c)];
                    let m = buffer.model[(r, c)];
                    for k in 0..4 {
                        let w = buffer.weight[r][k];
                        if w <= 0.0 {
                            continue;
                        }
                        sums.data[(i_out, c_out, k)] += d[k] * w;
                        sums.model[(i_out, c_out, k)] += m[k] * w;
                        sums.weight[(i_out, c_out, k)] += w;
                        used = true;
                    }
                }
                if used {
                    let time = buffer.time[r];
                    let w: f64 = buffer.weight[r].iter().filter(|&&w| w > 0.0).sum();
                    self.time_weight_sum += w * time;
                    self.weight_sum += w;
                    self.start_time = self.start_time.min(time);
                    self.stop_time = self.stop_time.max(time);
                }
            }
        }
    }

    pub fn num_rows(&self) -> usize {
        self.antenna1.len()
    }

    pub fn num_chans(&self) -> usize {
        self.chans.len()
    }

    /// The weighted mean time of the data, or `None` if there is no weight.
    pub fn sync_solve_meta(&self) -> Option<f64> {
        if self.weight_sum > 0.0 {
            Some(self.time_weight_sum / self.weight_sum)
        } else {
            None
        }
    }

    /// Make the data phase-only (`P`) or amplitude-only (`A`). Weights are
    /// scaled by the square of each correlation's mean amplitude, or zeroed if
    /// a correlation has no data.
    pub fn enforce_ap_on_data(&mut self, apmode: Apmode) {
        if apmode == Apmode::AP {
            return;
        }
        let num_chans = self.num_chans();
        for r in 0..self.num_rows() {
            if self.flag_row[r] {
                continue;
            }
            let mut amp_sum = [0.0; 4];
            let mut n = [0usize; 4];
            for c in 0..num_chans {
                if self.flags[(r, c)] {
                    continue;
                }
                let d = self.data[(r, c)];
                let mut v = [d[0], d[1], d[2], d[3]];
                for (k, v) in v.iter_mut().enumerate() {
                    let amp = v.norm();
                    if amp > 0.0 {
                        match apmode {
                            Apmode::P => *v /= amp,
                            Apmode::A => *v = c64::new(amp, 0.0),
                            Apmode::AP => (),
                        }
                        amp_sum[k] += amp;
                        n[k] += 1;
                    }
                }
                self.data[(r, c)] = Jones::from(v);
            }
            for k in 0..4 {
                let scale = if n[k] > 0 {
                    let mean = amp_sum[k] / n[k] as f64;
                    mean * mean
                } else {
                    0.0
                };
                self.weight.slice_mut(s![r, .., k]).mapv_inplace(|w| w * scale);
            }
        }
    }
}
