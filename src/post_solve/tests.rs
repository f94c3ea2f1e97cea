// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use approx::assert_abs_diff_eq;
use marlu::c64;

use super::*;
use crate::{
    cal_type::CalType, diagnostics::Diagnostics, params::Apmode, solutions::CalSet,
    tests::antenna_gain,
};

/// A set with one spw, where slot `i` has field `fields[i]` and time `i`
/// minutes after the first. Every parameter is good and is set by
/// `gain(slot, par, chan, element)`.
fn make_cal_set<F>(
    cal_type: CalType,
    num_elements: usize,
    num_chans: usize,
    fields: &[usize],
    gain: F,
) -> CalSet
where
    F: Fn(usize, usize, usize, usize) -> c64,
{
    let mut cal_set = CalSet::new(cal_type, 1, num_elements);
    cal_set.resize(&[num_chans], &[0], &[fields.len()]);
    for (i_slot, &field) in fields.iter().enumerate() {
        let slot = cal_set.slot_mut(0, i_slot);
        slot.cube.par_ok.fill(true);
        for ((par, chan, elem), p) in slot.cube.par.indexed_iter_mut() {
            *p = gain(i_slot, par, chan, elem);
        }
        slot.meta.time = 5e9 + 60.0 * i_slot as f64;
        slot.meta.field_id = field;
        slot.meta.field_name = format!("field{field}");
        slot.meta.elem_fit_weight = vec![1.0; num_elements];
        slot.meta.solution_ok = true;
    }
    cal_set
}

/// A gain that changes phase from slot to slot.
fn drifting_gain(slot: usize, par: usize, _chan: usize, ant: usize) -> c64 {
    antenna_gain(ant) * c64::from_polar(1.0 + 0.5 * par as f64, 0.4 * slot as f64 - 0.2)
}

#[test]
fn test_refant_zeroes_phase_in_every_slot() {
    let mut cal_set = make_cal_set(CalType::G, 4, 1, &[0, 0, 0], drifting_gain);
    let before = cal_set.clone();
    let mut diagnostics = Diagnostics::new();
    apply_ref_ant(&mut cal_set, 2, &mut diagnostics);

    for i_slot in 0..3 {
        let cube = &cal_set.slot(0, i_slot).cube;
        let old = &before.slot(0, i_slot).cube;
        for par in 0..2 {
            assert_abs_diff_eq!(cube.par[(par, 0, 2)].im, 0.0, epsilon = 1e-12);
            assert!(cube.par[(par, 0, 2)].re > 0.0);
            for ant in 0..4 {
                // Amplitudes and relative phases are untouched.
                assert_abs_diff_eq!(
                    cube.par[(par, 0, ant)].norm(),
                    old.par[(par, 0, ant)].norm(),
                    epsilon = 1e-12
                );
                let new_ratio = cube.par[(par, 0, ant)] / cube.par[(par, 0, 2)];
                let old_ratio = old.par[(par, 0, ant)] / old.par[(par, 0, 2)];
                assert_abs_diff_eq!(new_ratio, old_ratio, epsilon = 1e-12);
            }
        }
    }
    assert_eq!(diagnostics.alternate_refants, 0);
    assert_eq!(diagnostics.broken_phase_continuity, 0);
}

#[test]
fn test_refant_dropout_keeps_phase_continuity() {
    let mut cal_set = make_cal_set(CalType::G, 4, 1, &[0, 0, 0], drifting_gain);
    // The reference antenna is missing from the middle slot.
    for par in 0..2 {
        cal_set.slot_mut(0, 1).cube.par_ok[(par, 0, 0)] = false;
    }
    let mut diagnostics = Diagnostics::new();
    apply_ref_ant(&mut cal_set, 0, &mut diagnostics);

    // Antenna 1 carries the phase across the dropout, so every slot ends up
    // with the same solutions for the antennas present.
    let first = cal_set.slot(0, 0).cube.clone();
    for i_slot in 1..3 {
        let cube = &cal_set.slot(0, i_slot).cube;
        for par in 0..2 {
            for ant in 0..4 {
                if cube.par_ok[(par, 0, ant)] {
                    assert_abs_diff_eq!(
                        cube.par[(par, 0, ant)],
                        first.par[(par, 0, ant)],
                        epsilon = 1e-12
                    );
                }
            }
        }
    }
    // Antenna 1 is used for slots 1 and 2 (it was the last pivot, and
    // antenna 0 isn't in slot 1), for both parameters.
    assert_eq!(diagnostics.alternate_refants, 4);
    assert_eq!(diagnostics.broken_phase_continuity, 0);
}

#[test]
fn test_refant_missing_from_first_slot() {
    let mut cal_set = make_cal_set(CalType::G, 4, 1, &[0, 0, 0], drifting_gain);
    for par in 0..2 {
        cal_set.slot_mut(0, 0).cube.par_ok[(par, 0, 0)] = false;
    }
    let mut diagnostics = Diagnostics::new();
    apply_ref_ant(&mut cal_set, 0, &mut diagnostics);

    // Antenna 1 is zeroed in the first slot and carries the phase into the
    // second; from then on the reference antenna is present in both slots.
    let cube = |i_slot: usize| cal_set.slot(0, i_slot).cube.clone();
    for par in 0..2 {
        assert_abs_diff_eq!(cube(0).par[(par, 0, 1)].im, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(cube(1).par[(par, 0, 1)], cube(0).par[(par, 0, 1)], epsilon = 1e-12);
        assert_abs_diff_eq!(cube(2).par[(par, 0, 0)], cube(1).par[(par, 0, 0)], epsilon = 1e-12);
    }
    assert_eq!(diagnostics.alternate_refants, 4);
    assert_eq!(diagnostics.broken_phase_continuity, 0);
}

#[test]
fn test_refant_without_overlap_breaks_continuity() {
    let mut cal_set = make_cal_set(CalType::G, 4, 1, &[0, 0], drifting_gain);
    for par in 0..2 {
        for ant in [2, 3] {
            cal_set.slot_mut(0, 0).cube.par_ok[(par, 0, ant)] = false;
        }
        for ant in [0, 1] {
            cal_set.slot_mut(0, 1).cube.par_ok[(par, 0, ant)] = false;
        }
    }
    let untouched = cal_set.slot(0, 1).cube.par.clone();
    let mut diagnostics = Diagnostics::new();
    apply_ref_ant(&mut cal_set, 0, &mut diagnostics);

    assert_eq!(diagnostics.broken_phase_continuity, 2);
    assert_eq!(diagnostics.warnings.len(), 2);
    assert!(diagnostics.warnings[0].contains("Phase continuity broken"));
    assert_eq!(cal_set.slot(0, 1).cube.par, untouched);
    // The first slot is still referenced.
    assert_abs_diff_eq!(cal_set.slot(0, 0).cube.par[(0, 0, 0)].im, 0.0, epsilon = 1e-12);
}

#[test]
fn test_refant_uses_time_order() {
    // Slots stored out of time order; the earliest one is the basis.
    let mut cal_set = make_cal_set(CalType::G, 3, 1, &[0, 0], drifting_gain);
    cal_set.slot_mut(0, 0).meta.time = 5e9 + 600.0;
    for par in 0..2 {
        cal_set.slot_mut(0, 1).cube.par_ok[(par, 0, 0)] = false;
    }
    let mut diagnostics = Diagnostics::new();
    apply_ref_ant(&mut cal_set, 0, &mut diagnostics);

    // Slot 1 has no refant, so antenna 1 is zeroed in it instead.
    assert_abs_diff_eq!(cal_set.slot(0, 1).cube.par[(0, 0, 1)].im, 0.0, epsilon = 1e-12);
    // Slot 0 was then referenced to slot 1 through antenna 1.
    let ratio = cal_set.slot(0, 0).cube.par[(0, 0, 1)] / cal_set.slot(0, 1).cube.par[(0, 0, 1)];
    assert_abs_diff_eq!(ratio.arg(), 0.0, epsilon = 1e-12);
}

#[test]
fn test_enforce_ap_on_solutions() {
    let mut cal_set = make_cal_set(CalType::G, 3, 1, &[0], drifting_gain);
    cal_set.slot_mut(0, 0).cube.par_ok[(1, 0, 2)] = false;
    let before = cal_set.clone();

    let mut phase_only = cal_set.clone();
    enforce_ap_on_solutions(&mut phase_only, Apmode::P);
    let mut amp_only = cal_set.clone();
    enforce_ap_on_solutions(&mut amp_only, Apmode::A);
    enforce_ap_on_solutions(&mut cal_set, Apmode::AP);
    assert_eq!(cal_set, before);

    let old = &before.slot(0, 0).cube;
    let p = &phase_only.slot(0, 0).cube;
    let a = &amp_only.slot(0, 0).cube;
    for ((idx, &ok), old_par) in old.par_ok.indexed_iter().zip(old.par.iter()) {
        if ok {
            assert_abs_diff_eq!(p.par[idx].norm(), 1.0, epsilon = 1e-12);
            assert_abs_diff_eq!(p.par[idx].arg(), old_par.arg(), epsilon = 1e-12);
            assert_abs_diff_eq!(a.par[idx], c64::new(old_par.norm(), 0.0), epsilon = 1e-12);
        } else {
            assert_eq!(p.par[idx], c64::new(1.0, 0.0));
            assert_eq!(a.par[idx], c64::new(1.0, 0.0));
        }
    }

    // Delays are left alone.
    let mut delays = make_cal_set(CalType::K, 3, 1, &[0], |_, _, _, ant| {
        c64::new(ant as f64, 0.0)
    });
    let before = delays.clone();
    enforce_ap_on_solutions(&mut delays, Apmode::P);
    assert_eq!(delays, before);
}

#[test]
fn test_normalize() {
    let mut cal_set = make_cal_set(CalType::G, 3, 1, &[0, 0], |slot, _, _, ant| {
        c64::from_polar(2.0 + slot as f64 + ant as f64, 0.1 * ant as f64)
    });
    // This one shouldn't count toward the mean.
    cal_set.slot_mut(0, 1).cube.par[(0, 0, 0)] = c64::new(1000.0, 0.0);
    cal_set.slot_mut(0, 1).cube.par_ok[(0, 0, 0)] = false;
    normalize(&mut cal_set);

    let mut sum = 0.0;
    let mut num = 0;
    for i_slot in 0..2 {
        let cube = &cal_set.slot(0, i_slot).cube;
        for (par, &ok) in cube.par.iter().zip(cube.par_ok.iter()) {
            if ok {
                sum += par.norm();
                num += 1;
            }
        }
    }
    assert_abs_diff_eq!(sum / num as f64, 1.0, epsilon = 1e-12);
    assert_eq!(cal_set.slot(0, 1).cube.par[(0, 0, 0)], c64::new(1000.0, 0.0));

    // A single good parameter isn't normalised.
    let mut cal_set = make_cal_set(CalType::G, 1, 1, &[0], |_, _, _, _| c64::new(3.0, 0.0));
    cal_set.slot_mut(0, 0).cube.par_ok[(1, 0, 0)] = false;
    normalize(&mut cal_set);
    assert_eq!(cal_set.slot(0, 0).cube.par[(0, 0, 0)], c64::new(3.0, 0.0));
}

/// Field 0 is the reference, with gains of modulus `antenna_gain`. Field 1
/// sees a source `flux` times as bright, so its gains (solved against a unit
/// model) are `sqrt(flux)` times larger.
fn fluxscale_cal_set(flux: f64) -> CalSet {
    make_cal_set(CalType::B, 5, 4, &[0, 1, 0, 1], move |slot, par, chan, ant| {
        let g = antenna_gain(ant) * c64::from_polar(1.0 + 0.01 * chan as f64, 0.2 * (slot + par) as f64);
        if slot % 2 == 1 {
            g * flux.sqrt()
        } else {
            g
        }
    })
}

#[test]
fn test_fluxscale_identical_fields() {
    let mut cal_set = fluxscale_cal_set(1.0);
    let before = cal_set.clone();
    let params = FluxscaleParams {
        reference_fields: vec![0],
        ..Default::default()
    };
    let mut diagnostics = Diagnostics::new();
    let result = fluxscale(&mut cal_set, &params, &mut diagnostics);
    assert!(result.is_ok(), "{:?}", result.err());
    let result = result.unwrap();

    assert_eq!(result.entries.len(), 1);
    let entry = result.get(0, 1).unwrap();
    assert!(entry.ok);
    assert_eq!(entry.num_antennas, 5);
    assert_eq!(entry.ref_spw, 0);
    assert_abs_diff_eq!(entry.scale_factor, 1.0, epsilon = 1e-10);
    assert_abs_diff_eq!(entry.ratio_mean, 1.0, epsilon = 1e-10);
    for i_slot in 0..4 {
        assert_abs_diff_eq!(
            cal_set.slot(0, i_slot).cube.par,
            before.slot(0, i_slot).cube.par,
            epsilon = 1e-10
        );
    }
    assert!(diagnostics.is_clean());
}

#[test]
fn test_fluxscale_scales_transfer_gains() {
    let mut cal_set = fluxscale_cal_set(2.5);
    let reference = fluxscale_cal_set(1.0);
    let params = FluxscaleParams {
        reference_fields: vec![0],
        transfer_fields: vec![1],
        refspwmap: vec![None],
        field_names: vec![],
    };
    let mut diagnostics = Diagnostics::new();
    let result = fluxscale(&mut cal_set, &params, &mut diagnostics).unwrap();

    let entry = result.get(0, 1).unwrap();
    assert_abs_diff_eq!(entry.scale_factor, 2.5, epsilon = 1e-10);
    assert_abs_diff_eq!(entry.ratio_mean, 2.5, epsilon = 1e-10);
    assert_eq!(entry.field_name, "field1");
    assert!(entry.error >= 0.0);

    // After scaling, the transfer field looks like the reference.
    for i_slot in 0..4 {
        assert_abs_diff_eq!(
            cal_set.slot(0, i_slot).cube.par,
            reference.slot(0, i_slot).cube.par,
            epsilon = 1e-10
        );
    }
}

#[test]
fn test_fluxscale_errors() {
    let mut cal_set = fluxscale_cal_set(2.0);
    let mut diagnostics = Diagnostics::new();

    let result = fluxscale(&mut cal_set, &FluxscaleParams::default(), &mut diagnostics);
    assert!(matches!(result, Err(FluxscaleError::NoReferenceFieldsGiven)));

    let params = FluxscaleParams {
        reference_fields: vec![7],
        ..Default::default()
    };
    let result = fluxscale(&mut cal_set, &params, &mut diagnostics);
    assert!(matches!(result, Err(FluxscaleError::NoReferenceFields(_))));

    // Every field is a reference field.
    let params = FluxscaleParams {
        reference_fields: vec![0, 1],
        ..Default::default()
    };
    let result = fluxscale(&mut cal_set, &params, &mut diagnostics);
    assert!(matches!(result, Err(FluxscaleError::NoTransferFields)));

    let params = FluxscaleParams {
        reference_fields: vec![0],
        refspwmap: vec![Some(3)],
        ..Default::default()
    };
    let result = fluxscale(&mut cal_set, &params, &mut diagnostics);
    assert!(matches!(
        result,
        Err(FluxscaleError::BadRefSpwMap { ref_spw: 3, .. })
    ));

    let mut delays = make_cal_set(CalType::K, 3, 1, &[0, 1], |_, _, _, _| c64::default());
    let params = FluxscaleParams {
        reference_fields: vec![0],
        ..Default::default()
    };
    let result = fluxscale(&mut delays, &params, &mut diagnostics);
    assert!(matches!(result, Err(FluxscaleError::UnsupportedType("K Jones"))));
}

#[test]
fn test_fluxscale_missing_fields_warn() {
    let mut cal_set = fluxscale_cal_set(2.0);
    let params = FluxscaleParams {
        reference_fields: vec![0, 5],
        transfer_fields: vec![1, 6],
        ..Default::default()
    };
    let mut diagnostics = Diagnostics::new();
    let result = fluxscale(&mut cal_set, &params, &mut diagnostics).unwrap();
    assert_eq!(result.num_ok(), 1);
    assert_eq!(diagnostics.warnings.len(), 2);
    assert!(diagnostics.warnings[0].contains("reference fields"));
    assert!(diagnostics.warnings[1].contains("transfer fields"));
}

#[test]
fn test_fluxscale_without_common_antennas() {
    let mut cal_set = fluxscale_cal_set(2.0);
    // The transfer field only has antennas that the reference field lacks.
    for i_slot in 0..4 {
        let cube = &mut cal_set.slot_mut(0, i_slot).cube;
        for ant in 0..5 {
            let keep = if i_slot % 2 == 0 { ant < 2 } else { ant >= 2 };
            if !keep {
                cube.par_ok.slice_mut(ndarray::s![.., .., ant]).fill(false);
            }
        }
    }
    let params = FluxscaleParams {
        reference_fields: vec![0],
        ..Default::default()
    };
    let mut diagnostics = Diagnostics::new();
    let result = fluxscale(&mut cal_set, &params, &mut diagnostics);
    assert!(matches!(result, Err(FluxscaleError::NoScaleFactors)));
    assert_eq!(diagnostics.insufficient_fluxscale, 1);
}
