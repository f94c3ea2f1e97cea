// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Code to parse strings into plain numbers or some quantity with a unit.

mod error;
#[cfg(test)]
mod tests;

pub use error::*;

use strum::IntoEnumIterator;
use strum_macros::{EnumIter, EnumString, IntoStaticStr};

#[derive(Debug, Clone, Copy, PartialEq, EnumIter, EnumString, IntoStaticStr)]
pub(crate) enum TimeFormat {
    /// Milliseconds
    Ms,

    /// Seconds
    S,

    /// Minutes
    Min,

    /// Hours
    H,
}

impl TimeFormat {
    /// The number of seconds in one of this unit.
    pub(crate) fn to_seconds(self) -> f64 {
        match self {
            TimeFormat::Ms => 1e-3,
            TimeFormat::S => 1.0,
            TimeFormat::Min => 60.0,
            TimeFormat::H => 3600.0,
        }
    }
}

/// Parse a string that may have a unit of time attached to it. A naked number
/// comes back with `None` as its unit.
pub(crate) fn parse_time(s: &str) -> Result<(f64, Option<TimeFormat>), UnitParseError> {
    // Try to parse a naked number.
    let maybe_number: Option<f64> = s.trim().parse().ok();
    if let Some(number) = maybe_number {
        return Ok((number, None));
    };

    // That didn't work; let's search over our supported formats.
    let suffix = s
        .trim()
        .trim_start_matches(|c: char| c.is_numeric() || c == '.' || c == '-' || c == '+')
        .trim();
    for time_format in TimeFormat::iter() {
        let time_format_str: &'static str = time_format.into();
        if suffix.to_uppercase() == time_format_str.to_uppercase() {
            let prefix = s.trim().trim_end_matches(char::is_alphabetic).trim();
            let number: f64 = match prefix.parse() {
                Ok(n) => n,
                Err(_) => {
                    return Err(UnitParseError::GotTimeUnitButCantParse {
                        input: s.to_string(),
                        unit: time_format_str,
                    })
                }
            };
            return Ok((number, Some(time_format)));
        }
    }

    // If we made it this far, we don't know how to parse the string.
    Err(UnitParseError::Unknown {
        input: s.to_string(),
        unit_type: "time",
    })
}

/// Parse a duration into seconds. Naked numbers are seconds.
pub(crate) fn parse_seconds(s: &str) -> Result<f64, UnitParseError> {
    let (number, unit) = parse_time(s)?;
    Ok(number * unit.map(|u| u.to_seconds()).unwrap_or(1.0))
}
