// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! How a dataset is walked when solving: sort order, chunking and solution
//! interval boundaries.

mod error;

pub use error::SizeUpError;

use std::fmt::Display;

use itertools::Itertools;
use log::{debug, info};

use crate::{
    params::SolveConfigError,
    unit_parsing::parse_seconds,
    vis_io::{SortColumn, VisIterator, VisRecord},
};

/// The time span of one solution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SolutionInterval {
    /// One solution per scan (or per combined group).
    Infinite,

    /// One solution per integration.
    PerIntegration,

    /// \[seconds\]
    Seconds(f64),
}

impl SolutionInterval {
    /// Parse a solint string: "" or "inf", "int", or a duration with a unit
    /// of s, ms, min or h (bare numbers are seconds).
    pub fn parse(s: &str) -> Result<SolutionInterval, SolveConfigError> {
        let trimmed = s.trim();
        match trimmed.to_lowercase().as_str() {
            "" | "inf" => return Ok(SolutionInterval::Infinite),
            "int" => return Ok(SolutionInterval::PerIntegration),
            _ => (),
        }

        let seconds = parse_seconds(trimmed).map_err(|err| SolveConfigError::BadSolint {
            input: s.to_string(),
            err,
        })?;
        if seconds.is_finite() && seconds > 0.0 {
            Ok(SolutionInterval::Seconds(seconds))
        } else {
            Err(SolveConfigError::NonPositiveSolint(s.to_string()))
        }
    }

    /// The elapsed time beyond which a new interval starts.
    pub fn threshold(self) -> f64 {
        match self {
            SolutionInterval::Infinite => f64::INFINITY,
            SolutionInterval::PerIntegration => 0.0,
            SolutionInterval::Seconds(s) => s,
        }
    }
}

impl Display for SolutionInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SolutionInterval::Infinite => write!(f, "inf"),
            SolutionInterval::PerIntegration => write!(f, "int"),
            SolutionInterval::Seconds(s) => write!(f, "{s}s"),
        }
    }
}

/// Which boundaries a solution may span.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Combine {
    pub scan: bool,
    pub spw: bool,
    pub field: bool,
}

impl Combine {
    /// Parse a comma- or space-separated list of "scan", "spw" and "field".
    pub fn parse(s: &str) -> Result<Combine, SolveConfigError> {
        let mut combine = Combine::default();
        for word in s
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|w| !w.is_empty())
        {
            match word.to_lowercase().as_str() {
                "scan" => combine.scan = true,
                "spw" => combine.spw = true,
                "field" => combine.field = true,
                _ => return Err(SolveConfigError::BadCombine(word.to_string())),
            }
        }
        Ok(combine)
    }

    pub fn is_empty(&self) -> bool {
        !(self.scan || self.spw || self.field)
    }
}

impl Display for Combine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let words = [
            (self.scan, "scan"),
            (self.spw, "spw"),
            (self.field, "field"),
        ];
        write!(
            f,
            "{}",
            words.iter().filter(|(b, _)| *b).map(|(_, w)| w).join(",")
        )
    }
}

/// The result of sizing up a solve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolveLayout {
    /// The number of iterator chunks in each solution interval.
    pub chunks_per_solution: Vec<usize>,

    /// The spw that each solution is labelled with (and stored under).
    pub solution_spws: Vec<usize>,

    /// For each data spw, the spw its solutions are labelled with, or `None`
    /// if the spw has no data.
    pub spw_map: Vec<Option<usize>>,

    /// The number of solution slots needed per (label) spw.
    pub slots_per_spw: Vec<usize>,
}

impl SolveLayout {
    pub fn num_solutions(&self) -> usize {
        self.chunks_per_solution.len()
    }
}

/// Decides how a dataset is sorted and chunked, and where solution intervals
/// start.
#[derive(Debug, Clone)]
pub struct VisIterationPolicy {
    solint: SolutionInterval,
    combine: Combine,

    /// The record that started the current interval, with the ids of the most
    /// recently classified record.
    anchor: Option<VisRecord>,
}

impl VisIterationPolicy {
    pub fn new(solint: SolutionInterval, combine: Combine) -> VisIterationPolicy {
        VisIterationPolicy {
            solint,
            combine,
            anchor: None,
        }
    }

    pub fn solint(&self) -> SolutionInterval {
        self.solint
    }

    pub fn combine(&self) -> Combine {
        self.combine
    }

    /// Observation, array, then scan, field and spw unless they're combined,
    /// then time.
    pub fn sort_columns(&self) -> Vec<SortColumn> {
        let mut columns = vec![SortColumn::Observation, SortColumn::Array];
        if !self.combine.scan {
            columns.push(SortColumn::Scan);
        }
        if !self.combine.field {
            columns.push(SortColumn::Field);
        }
        if !self.combine.spw {
            columns.push(SortColumn::Spw);
        }
        columns.push(SortColumn::Time);
        columns
    }

    /// The time interval given to the dataset iterator. Combining fields or
    /// spws forces single-timestamp chunks.
    pub fn iteration_interval(&self) -> f64 {
        if self.combine.field || self.combine.spw {
            return f64::MIN_POSITIVE;
        }
        match self.solint {
            SolutionInterval::Infinite => 0.0,
            SolutionInterval::PerIntegration => f64::MIN_POSITIVE,
            SolutionInterval::Seconds(s) => s,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.solint.threshold()
    }

    /// Forget the current interval.
    pub fn reset(&mut self) {
        self.anchor = None;
    }

    /// Does this record continue the current interval? If not, it becomes the
    /// anchor of a new one.
    pub fn classify(&mut self, record: &VisRecord) -> bool {
        let continues = match &self.anchor {
            None => false,
            Some(anchor) => {
                let elapsed = record.time - anchor.time;
                let new_interval = elapsed > self.threshold()
                    || elapsed < 0.0
                    || record.observation != anchor.observation
                    || record.array != anchor.array
                    || (!self.combine.scan && record.scan != anchor.scan)
                    || (!self.combine.spw && record.spw != anchor.spw)
                    || (!self.combine.field && record.field != anchor.field);
                !new_interval
            }
        };
        self.update_anchor(record, continues);
        continues
    }

    fn update_anchor(&mut self, record: &VisRecord, continues: bool) {
        match (&mut self.anchor, continues) {
            (Some(anchor), true) => {
                anchor.scan = record.scan;
                anchor.field = record.field;
                anchor.spw = record.spw;
            }
            _ => self.anchor = Some(*record),
        }
    }

    /// Walk the dataset once, counting the solution intervals and the chunks
    /// that make up each of them. `num_chans_par` is the number of parameter
    /// channels of each data spw; spws being combined must agree.
    ///
    /// The iterator is left sorted for the solve.
    pub fn size_up_solve(
        &mut self,
        vi: &mut dyn VisIterator,
        num_chans_par: &[usize],
    ) -> Result<SolveLayout, SizeUpError> {
        let num_spws = vi.metadata().num_spws();
        vi.set_sort(&self.sort_columns(), self.iteration_interval());
        self.reset();

        // Without combining fields or spws, every chunk is its own interval.
        let chunks_are_intervals = !(self.combine.field || self.combine.spw);
        let mut chunks_per_solution: Vec<usize> = vec![];
        let mut solution_spws = vec![];
        let mut chunks_per_spw = vec![0; num_spws];
        vi.origin_chunks();
        while vi.more_chunks() {
            if let Some(record) = vi.chunk_record() {
                let continues = self.classify(&record);
                if chunks_per_solution.is_empty() || chunks_are_intervals || !continues {
                    if continues {
                        self.anchor = Some(record);
                    }
                    chunks_per_solution.push(0);
                    solution_spws.push(record.spw);
                }
                if let Some(n) = chunks_per_solution.last_mut() {
                    *n += 1;
                }
                chunks_per_spw[record.spw] += 1;
            }
            vi.next_chunk();
        }
        vi.origin_chunks();

        let mut spw_map: Vec<Option<usize>> = chunks_per_spw
            .iter()
            .enumerate()
            .map(|(spw, &n)| if n > 0 { Some(spw) } else { None })
            .collect();
        if self.combine.spw {
            if let Some(label) = spw_map.iter().flatten().next().copied() {
                for (spw, mapped) in spw_map.iter_mut().enumerate() {
                    if mapped.is_none() {
                        continue;
                    }
                    if num_chans_par[spw] != num_chans_par[label] {
                        return Err(SizeUpError::IncompatibleChannelization {
                            spw,
                            num_chans: num_chans_par[spw],
                            label,
                            label_num_chans: num_chans_par[label],
                        });
                    }
                    *mapped = Some(label);
                }
                info!(
                    "Combining spws: [{}] -> {label}",
                    chunks_per_spw
                        .iter()
                        .positions(|&n| n > 0)
                        .join(", ")
                );
            }
        }
        for spw in solution_spws.iter_mut() {
            if let Some(label) = spw_map[*spw] {
                *spw = label;
            }
        }
        let mut slots_per_spw = vec![0; num_spws];
        for &spw in &solution_spws {
            slots_per_spw[spw] += 1;
        }

        if self.combine.scan {
            info!("Combining scans");
        }
        if self.combine.field {
            info!("Combining fields");
        }
        info!(
            "For solint = {}, found {} solution intervals",
            self.solint,
            chunks_per_solution.len()
        );
        debug!("Chunks per solution: {chunks_per_solution:?}");
        self.reset();

        Ok(SolveLayout {
            chunks_per_solution,
            solution_spws,
            spw_map,
            slots_per_spw,
        })
    }
}
