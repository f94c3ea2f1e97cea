// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Helpful functions for tests.

use marlu::{c64, Jones};

use crate::vis_io::{MemoryVisSet, SpwInfo, VisMetadata, VisRow};

/// \[MJD seconds\]
pub(crate) const START_TIME: f64 = 4.9e9;
/// \[seconds\]
pub(crate) const INT_TIME: f64 = 10.0;
/// The gap between scans \[seconds\].
pub(crate) const SCAN_GAP: f64 = 100.0;

/// A description of a synthetic observation of unit point sources.
pub(crate) struct SyntheticObs {
    pub(crate) num_antennas: usize,

    /// Per spw.
    pub(crate) num_chans: Vec<usize>,

    /// One entry per scan: (field, number of integrations).
    pub(crate) scans: Vec<(usize, usize)>,
}

impl SyntheticObs {
    pub(crate) fn new(
        num_antennas: usize,
        num_spws: usize,
        num_chans: usize,
        scans: &[(usize, usize)],
    ) -> SyntheticObs {
        SyntheticObs {
            num_antennas,
            num_chans: vec![num_chans; num_spws],
            scans: scans.to_vec(),
        }
    }

    pub(crate) fn metadata(&self) -> VisMetadata {
        let num_fields = self.scans.iter().map(|(f, _)| f + 1).max().unwrap_or(1);
        VisMetadata {
            name: "synthetic".to_string(),
            antenna_names: (0..self.num_antennas).map(|i| format!("ant{i:02}")).collect(),
            field_names: (0..num_fields).map(|i| format!("field{i}")).collect(),
            source_names: (0..num_fields).map(|i| format!("source{i}")).collect(),
            spws: self
                .num_chans
                .iter()
                .enumerate()
                .map(|(i_spw, &n)| SpwInfo {
                    chan_freqs: (0..n)
                        .map(|c| 150e6 + 10e6 * i_spw as f64 + 1e6 * c as f64)
                        .collect(),
                })
                .collect(),
        }
    }

    /// The times of each scan's integrations.
    pub(crate) fn scan_times(&self) -> Vec<Vec<f64>> {
        let mut t0 = START_TIME;
        self.scans
            .iter()
            .map(|&(_, num_ints)| {
                let times = (0..num_ints).map(|i| t0 + INT_TIME * i as f64).collect();
                t0 += INT_TIME * num_ints as f64 + SCAN_GAP;
                times
            })
            .collect()
    }

    /// Make data from antenna gains `gain(antenna, spw, freq_hz, time)`.
    /// Auto-correlations are included. The model is a unit point source, and
    /// every weight is 1.
    pub(crate) fn build<F>(&self, gain: F) -> MemoryVisSet
    where
        F: Fn(usize, usize, f64, f64) -> Jones<f64>,
    {
        let metadata = self.metadata();
        let mut rows = vec![];
        for (i_scan, (&(field, _), times)) in self.scans.iter().zip(self.scan_times()).enumerate() {
            for time in times {
                for (spw, info) in metadata.spws.iter().enumerate() {
                    for ant1 in 0..self.num_antennas {
                        for ant2 in ant1..self.num_antennas {
                            let data = info
                                .chan_freqs
                                .iter()
                                .map(|&freq| {
                                    gain(ant1, spw, freq, time) * gain(ant2, spw, freq, time).h()
                                })
                                .collect();
                            rows.push(VisRow {
                                time,
                                exposure: INT_TIME,
                                observation: 0,
                                array: 0,
                                scan: i_scan + 1,
                                field,
                                spw,
                                antenna1: ant1,
                                antenna2: ant2,
                                flag_row: false,
                                weight: [1.0; 4],
                                data,
                                model: vec![],
                                corrected: vec![],
                                flags: vec![],
                            });
                        }
                    }
                }
            }
        }
        MemoryVisSet::new(metadata, rows).unwrap()
    }
}

/// Diagonal gains.
pub(crate) fn diag(x: c64, y: c64) -> Jones<f64> {
    Jones::from([x, c64::default(), c64::default(), y])
}

/// A smooth, antenna-dependent complex gain.
pub(crate) fn antenna_gain(ant: usize) -> c64 {
    let amp = 1.0 + 0.1 * ant as f64;
    let phase = 0.3 * ant as f64 - 0.5;
    c64::from_polar(amp, phase)
}
