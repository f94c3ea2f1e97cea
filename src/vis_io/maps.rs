// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Row groupings over a single buffer.

use indexmap::IndexMap;

use super::VisBuffer;

/// Which rows of a buffer share an antenna pair, and which share a timestamp.
/// These are only meaningful for the buffer they were computed from; compute
/// new maps for every buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferMaps {
    /// (antenna1, antenna2) to row indices, in order of first appearance.
    pub antenna_pairs: IndexMap<(usize, usize), Vec<usize>>,

    /// Timestamps (as the bits of their `f64` value, so that only exactly
    /// equal times are grouped) to row indices, in order of first appearance.
    pub sub_integrations: IndexMap<u64, Vec<usize>>,
}

impl BufferMaps {
    /// The rows of an antenna pair. The order of the antennas matters.
    pub fn rows_for_pair(&self, ant1: usize, ant2: usize) -> &[usize] {
        self.antenna_pairs
            .get(&(ant1, ant2))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Each distinct time with its rows.
    pub fn times(&self) -> impl Iterator<Item = (f64, &[usize])> {
        self.sub_integrations
            .iter()
            .map(|(&bits, rows)| (f64::from_bits(bits), rows.as_slice()))
    }
}

pub fn compute_maps(buffer: &VisBuffer) -> BufferMaps {
    let mut antenna_pairs: IndexMap<(usize, usize), Vec<usize>> = IndexMap::new();
    let mut sub_integrations: IndexMap<u64, Vec<usize>> = IndexMap::new();
    for row in 0..buffer.num_rows() {
        antenna_pairs
            .entry((buffer.antenna1[row], buffer.antenna2[row]))
            .or_default()
            .push(row);
        sub_integrations
            .entry(buffer.time[row].to_bits())
            .or_default()
            .push(row);
    }
    BufferMaps {
        antenna_pairs,
        sub_integrations,
    }
}
