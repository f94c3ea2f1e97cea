// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Calibration solutions: parameter cubes, the per-spw/per-time collection of
//! them ([`CalSet`]), lookups into that collection ([`CalInterp`]) and
//! reading/writing cal tables.

mod accumulate;
mod cal_set;
mod cube;
mod error;
mod interp;
mod table;

pub use accumulate::accumulate;
pub use cal_set::{CalSet, CalSlot, SlotMeta, SpwSolutions};
pub use cube::{ParameterCube, ParameterCubeView, ParameterCubeViewMut};
pub use error::*;
pub use interp::{CalInterp, FreqInterp, TimeInterp};

use std::path::Path;

use itertools::Itertools;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

lazy_static::lazy_static! {
    pub(crate) static ref CAL_TABLE_EXTENSIONS: String = CalTableType::iter().join(", ");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, EnumString)]
pub enum CalTableType {
    #[strum(serialize = "json")]
    Json,

    #[strum(serialize = "yaml")]
    Yaml,
}

impl CalTableType {
    /// Determine the type of a cal table from its extension.
    pub fn from_path(path: &Path) -> Option<CalTableType> {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .and_then(|e| match e.as_str() {
                "yml" => Some(CalTableType::Yaml),
                e => e.parse().ok(),
            })
    }
}
