// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::f64::consts::{FRAC_PI_2, PI};

use approx::assert_abs_diff_eq;

use super::*;

#[test]
fn test_cexp() {
    assert_abs_diff_eq!(cexp(PI), c64::new(-1.0, 0.0), epsilon = 1e-15);
    assert_abs_diff_eq!(cexp(FRAC_PI_2), c64::new(0.0, 1.0), epsilon = 1e-15);
    assert_abs_diff_eq!(cexp(0.0), c64::new(1.0, 0.0));
}

#[test]
fn test_unit_phasor() {
    let z = c64::new(3.0, 4.0);
    let p = unit_phasor(z).unwrap();
    assert_abs_diff_eq!(p.norm(), 1.0, epsilon = 1e-15);
    assert_abs_diff_eq!(p.arg(), z.arg(), epsilon = 1e-15);

    assert!(unit_phasor(c64::new(0.0, 0.0)).is_none());
    assert!(unit_phasor(c64::new(f64::NAN, 0.0)).is_none());
}

#[test]
fn test_baseline_indices() {
    let num_antennas = 5;
    let mut expected = 0;
    for a1 in 0..num_antennas {
        for a2 in a1..num_antennas {
            assert_eq!(baseline_index(a1, a2, num_antennas), expected);
            assert_eq!(baseline_index(a2, a1, num_antennas), expected);
            assert_eq!(baseline_to_antennas(expected, num_antennas), (a1, a2));
            expected += 1;
        }
    }
    assert_eq!(expected, num_baselines_with_autos(num_antennas));
}
