// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Solve for, apply and transfer radio-interferometric calibration solutions.

The engine walks a visibility dataset in solution intervals, solves for
per-antenna (Jones) or per-baseline (Mueller) parameters, keeps them in a
[`CalSet`], and re-references, normalises or flux-scales them afterwards.
 */

pub mod apply;
pub mod cal_type;
mod cli;
pub mod constants;
mod diagnostics;
pub mod iteration;
pub(crate) mod math;
pub mod params;
pub mod post_solve;
pub mod solutions;
pub mod solve;
#[cfg(test)]
mod tests;
pub(crate) mod unit_parsing;
pub mod vis_io;

use crossbeam_utils::atomic::AtomicCell;

// Re-exports.
pub use apply::{ApplyDriver, ApplyMode};
pub use cal_type::{CalType, MatrixForm, Mueller};
pub use cli::{Viscal, ViscalError};
pub use diagnostics::Diagnostics;
pub use solutions::{CalInterp, CalSet, ParameterCube};
pub use solve::SolvableVisCal;

/// Complex double-precision numbers, as used by all parameter cubes.
pub use marlu::{c64, Jones};

/// Are progress bars being drawn? This should only ever be enabled by CLI code.
static PROGRESS_BARS: AtomicCell<bool> = AtomicCell::new(false);
