// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use approx::assert_abs_diff_eq;
use tempfile::TempDir;

use viscal::vis_io::read_vis_dataset;

use crate::*;

#[test]
fn test_apply_corrects_data() {
    let tmp_dir = TempDir::new().unwrap();
    let data = make_dataset(tmp_dir.path(), 1.0);
    let caltable = tmp_dir.path().join("gains.json");
    solve_gains(&data, &caltable);

    let output = tmp_dir.path().join("corrected.json");
    let cmd = viscal()
        .args([
            "apply",
            "--no-progress-bars",
            "-d",
            &format!("{}", data.display()),
            "-c",
            &format!("{}", caltable.display()),
            "-o",
            &format!("{}", output.display()),
        ])
        .ok();
    assert!(cmd.is_ok(), "apply failed: {:?}", get_cmd_output(cmd));

    // The corrected data should now look like the 1 Jy model.
    let corrected = read_vis_dataset(&output).unwrap();
    let identity = Jones::identity();
    for row in corrected.rows() {
        for (vis, flag) in row.corrected.iter().zip(row.flags.iter()) {
            assert!(!flag);
            assert_abs_diff_eq!(*vis, identity, epsilon = 1e-4);
        }
    }

    // The input wasn't touched.
    let input = read_vis_dataset(&data).unwrap();
    assert_eq!(input.rows()[0].corrected, input.rows()[0].data);
}

#[test]
fn test_apply_corrupts_model() {
    let tmp_dir = TempDir::new().unwrap();
    let data = make_dataset(tmp_dir.path(), 1.0);
    let caltable = tmp_dir.path().join("gains.json");
    solve_gains(&data, &caltable);

    // Without an output, the dataset is overwritten.
    let cmd = viscal()
        .args([
            "apply",
            "--no-progress-bars",
            "-d",
            &format!("{}", data.display()),
            "-c",
            &format!("{}", caltable.display()),
            "--mode",
            "corrupt",
            "--time-interp",
            "preceding",
        ])
        .ok();
    assert!(cmd.is_ok(), "apply failed: {:?}", get_cmd_output(cmd));

    let corrupted = read_vis_dataset(&data).unwrap();
    for row in corrupted.rows() {
        for (model, vis) in row.model.iter().zip(row.data.iter()) {
            assert_abs_diff_eq!(*model, *vis, epsilon = 1e-4);
        }
    }
}

#[test]
fn test_apply_wrong_type_fails() {
    let tmp_dir = TempDir::new().unwrap();
    let data = make_dataset(tmp_dir.path(), 1.0);
    let caltable = tmp_dir.path().join("gains.json");
    solve_gains(&data, &caltable);

    let cmd = viscal()
        .args([
            "apply",
            "-d",
            &format!("{}", data.display()),
            "-c",
            &format!("{}", caltable.display()),
            "-t",
            "B",
        ])
        .ok();
    assert!(cmd.is_err());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.contains("'B Jones' was expected"), "{stderr}");
}

#[test]
fn test_accumulate_then_apply() {
    let tmp_dir = TempDir::new().unwrap();
    let data = make_dataset(tmp_dir.path(), 1.0);
    let caltable = tmp_dir.path().join("gains.json");
    solve_gains(&data, &caltable);

    // Composing a table with itself squares the gains; applying the result
    // over-corrects by the gains once more.
    let composed = tmp_dir.path().join("composed.json");
    let cmd = viscal()
        .args([
            "accumulate",
            "--cumulative",
            &format!("{}", caltable.display()),
            "--increment",
            &format!("{}", caltable.display()),
            "-o",
            &format!("{}", composed.display()),
        ])
        .ok();
    assert!(cmd.is_ok(), "accumulate failed: {:?}", get_cmd_output(cmd));

    let cal_set = viscal::CalSet::load(&composed, None, &[], 0).unwrap();
    let cube = &cal_set.slot(0, 0).cube;
    for ant in 0..NUM_ANTENNAS {
        let g = antenna_gain(ant);
        assert_abs_diff_eq!(cube.par[(0, 0, ant)], g * g, epsilon = 1e-4);
    }
}
