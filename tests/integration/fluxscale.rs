// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::fs::File;

use approx::assert_abs_diff_eq;
use tempfile::TempDir;

use viscal::{post_solve::FluxscaleResult, CalSet};

use crate::*;

#[test]
fn test_fluxscale_recovers_flux_density() {
    let tmp_dir = TempDir::new().unwrap();
    let data = make_dataset(tmp_dir.path(), 4.0);
    let caltable = tmp_dir.path().join("gains.json");
    solve_gains(&data, &caltable);

    let scaled = tmp_dir.path().join("scaled.json");
    let results = tmp_dir.path().join("fluxes.json");
    let cmd = viscal()
        .args([
            "fluxscale",
            "--no-progress-bars",
            "-c",
            &format!("{}", caltable.display()),
            "--reference",
            "0",
            "--transfer",
            "1",
            "-o",
            &format!("{}", scaled.display()),
            "--results",
            &format!("{}", results.display()),
        ])
        .ok();
    assert!(cmd.is_ok(), "fluxscale failed: {:?}", get_cmd_output(cmd));

    let result: FluxscaleResult = serde_json::from_reader(File::open(&results).unwrap()).unwrap();
    let entry = result.get(0, 1).unwrap();
    assert!(entry.ok);
    assert_eq!(entry.num_antennas, NUM_ANTENNAS);
    assert_abs_diff_eq!(entry.scale_factor, 4.0, epsilon = 1e-3);
    assert_abs_diff_eq!(entry.ratio_mean, 4.0, epsilon = 1e-3);

    // The target's gains are now on the flux calibrator's scale.
    let cal_set = CalSet::load(&scaled, None, &[1], 0).unwrap();
    assert_eq!(cal_set.num_slots(0), 1);
    let cube = &cal_set.slot(0, 0).cube;
    for ant in 0..NUM_ANTENNAS {
        assert_abs_diff_eq!(cube.par[(0, 0, ant)], antenna_gain(ant), epsilon = 1e-3);
    }
}

#[test]
fn test_fluxscale_without_reference_fails() {
    let tmp_dir = TempDir::new().unwrap();
    let data = make_dataset(tmp_dir.path(), 4.0);
    let caltable = tmp_dir.path().join("gains.json");
    solve_gains(&data, &caltable);

    let scaled = tmp_dir.path().join("scaled.json");
    let cmd = viscal()
        .args([
            "fluxscale",
            "-c",
            &format!("{}", caltable.display()),
            "--reference",
            "7",
            "-o",
            &format!("{}", scaled.display()),
        ])
        .ok();
    assert!(cmd.is_err());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.contains("reference field"), "{stderr}");
    assert!(!scaled.exists());
}
