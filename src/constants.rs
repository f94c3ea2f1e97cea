// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Useful constants.

All constants *must* be double precision.
 */

pub use std::f64::consts::{PI, TAU};

/// The default solution interval. One solution per scan/combine group.
pub const DEFAULT_SOLINT: &str = "inf";

/// The default amplitude/phase solve mode.
pub const DEFAULT_APMODE: &str = "AP";

/// Solutions with a signal-to-noise ratio below this are discarded.
pub const DEFAULT_MIN_SNR: f64 = 0.0;

/// The maximum number of solver iterations per solution interval.
pub const DEFAULT_MAX_ITERATIONS: u32 = 50;

/// The solver stops when the largest parameter increment falls below this.
pub const DEFAULT_STOP_THRESHOLD: f64 = 1e-8;

/// An antenna needs more than this many baselines in a solution interval to
/// be solved for.
pub const MIN_BASELINES_PER_ANTENNA: usize = 3;

/// A solve needs more than this many antennas.
pub const MIN_ANTENNAS_FOR_SOLVE: usize = 3;

/// Delays are specified in nanoseconds.
pub const DELAY_UNIT: f64 = 1e-9;
