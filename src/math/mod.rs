// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Some helper mathematics.

#[cfg(test)]
mod tests;

use crate::c64;

/// Complex exponential. The argument is assumed to be purely imaginary.
///
/// This function doesn't actually use complex numbers; it just returns the real
/// and imag components from Euler's formula (i.e. e^{ix} = cos{x} + i sin{x}).
///
/// # Examples
///
/// `assert_abs_diff_eq!(cexp(PI), c64::new(-1.0, 0.0));`
#[inline]
pub(crate) fn cexp(x: f64) -> c64 {
    let (im, re) = x.sin_cos();
    c64::new(re, im)
}

/// The unit-amplitude phasor of a complex number, or `None` if its amplitude
/// is zero (or not finite).
#[inline]
pub(crate) fn unit_phasor(z: c64) -> Option<c64> {
    let amp = z.norm();
    if amp > 0.0 && amp.is_finite() {
        Some(z / amp)
    } else {
        None
    }
}

/// The number of baselines, including auto-correlations, formed by this many
/// antennas.
#[inline]
pub(crate) fn num_baselines_with_autos(num_antennas: usize) -> usize {
    num_antennas * (num_antennas + 1) / 2
}

/// Convert a pair of antenna indices into a baseline index (auto-correlations
/// included). The order of the antennas doesn't matter.
///
/// # Examples
///
/// `assert_eq!(baseline_index(0, 0, 4), 0);`
/// `assert_eq!(baseline_index(0, 3, 4), 3);`
/// `assert_eq!(baseline_index(1, 1, 4), 4);`
#[inline]
pub(crate) fn baseline_index(ant1: usize, ant2: usize, num_antennas: usize) -> usize {
    let (a1, a2) = if ant1 <= ant2 {
        (ant1, ant2)
    } else {
        (ant2, ant1)
    };
    debug_assert!(a2 < num_antennas);
    a1 * num_antennas - a1 * (a1 + 1) / 2 + a2
}

/// The inverse of [`baseline_index`].
pub(crate) fn baseline_to_antennas(baseline: usize, num_antennas: usize) -> (usize, usize) {
    let mut offset = 0;
    for a1 in 0..num_antennas {
        let row_len = num_antennas - a1;
        if baseline < offset + row_len {
            return (a1, a1 + baseline - offset);
        }
        offset += row_len;
    }
    panic!("Baseline index {baseline} is out of range for {num_antennas} antennas");
}
