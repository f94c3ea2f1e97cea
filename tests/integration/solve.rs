// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::io::Write;

use approx::assert_abs_diff_eq;
use indoc::formatdoc;
use tempfile::TempDir;

use viscal::{CalSet, CalType};

use crate::*;

/// Check a slot of a G table against the true gains, scaled by `scale`.
fn check_gains(cal_set: &CalSet, slot: usize, scale: f64) {
    let cube = &cal_set.slot(0, slot).cube;
    for ant in 0..NUM_ANTENNAS {
        for pol in 0..2 {
            assert!(cube.par_ok[(pol, 0, ant)]);
            let expected = antenna_gain(ant) * scale;
            assert_abs_diff_eq!(cube.par[(pol, 0, ant)], expected, epsilon = 1e-4);
        }
    }
}

#[test]
fn test_solve_writes_gains() {
    let tmp_dir = TempDir::new().unwrap();
    let data = make_dataset(tmp_dir.path(), 1.0);
    let caltable = tmp_dir.path().join("gains.json");
    solve_gains(&data, &caltable);

    let cal_set = CalSet::load(&caltable, Some(CalType::G), &[], 0).unwrap();
    assert_eq!(cal_set.num_elements(), NUM_ANTENNAS);
    // One solution per scan.
    assert_eq!(cal_set.num_slots(0), 2);
    assert_eq!(cal_set.field_ids(), vec![0, 1]);
    for slot in 0..2 {
        check_gains(&cal_set, slot, 1.0);
    }
}

#[test]
fn test_solve_combine_field_scan() {
    let tmp_dir = TempDir::new().unwrap();
    let data = make_dataset(tmp_dir.path(), 1.0);
    let caltable = tmp_dir.path().join("gains.yaml");
    let cmd = viscal()
        .args([
            "solve",
            "--no-progress-bars",
            "-d",
            &format!("{}", data.display()),
            "-t",
            "G",
            "--refant",
            "0",
            "--combine",
            "scan,field",
            "-o",
            &format!("{}", caltable.display()),
        ])
        .ok();
    assert!(cmd.is_ok(), "solve failed: {:?}", get_cmd_output(cmd));

    let cal_set = CalSet::load(&caltable, None, &[], 0).unwrap();
    assert_eq!(cal_set.num_slots(0), 1);
    check_gains(&cal_set, 0, 1.0);
}

#[test]
fn test_solve_with_arg_file() {
    let tmp_dir = TempDir::new().unwrap();
    let data = make_dataset(tmp_dir.path(), 1.0);
    let caltable = tmp_dir.path().join("bandpass.json");
    let arg_file_path = tmp_dir.path().join("solve.toml");
    let mut arg_file = std::fs::File::create(&arg_file_path).unwrap();
    write!(
        arg_file,
        "{}",
        formatdoc! {r#"
            data = "{data}"
            cal_type = "B"
            caltable = "{caltable}"
            refant = 0
            solint = "inf"
            "#,
            data = data.display(),
            caltable = caltable.display(),
        }
    )
    .unwrap();
    drop(arg_file);

    let cmd = viscal()
        .args([
            "solve",
            "--no-progress-bars",
            &format!("{}", arg_file_path.display()),
        ])
        .ok();
    assert!(cmd.is_ok(), "solve failed: {:?}", get_cmd_output(cmd));

    let cal_set = CalSet::load(&caltable, Some(CalType::B), &[], 0).unwrap();
    // A bandpass has a solution per channel.
    assert_eq!(cal_set.spw(0).num_chans, NUM_CHANS);
    let cube = &cal_set.slot(0, 0).cube;
    for chan in 0..NUM_CHANS {
        assert_abs_diff_eq!(cube.par[(0, chan, 3)], antenna_gain(3), epsilon = 1e-4);
    }
}

#[test]
fn test_solve_dry_run_writes_nothing() {
    let tmp_dir = TempDir::new().unwrap();
    let data = make_dataset(tmp_dir.path(), 1.0);
    let caltable = tmp_dir.path().join("gains.json");
    let cmd = viscal()
        .args([
            "solve",
            "--dry-run",
            "-d",
            &format!("{}", data.display()),
            "-t",
            "G",
            "-o",
            &format!("{}", caltable.display()),
        ])
        .ok();
    let failed = cmd.is_err();
    let (stdout, stderr) = get_cmd_output(cmd);
    assert!(!failed, "dry run failed: {stderr}");
    assert!(stdout.contains("Dry run"), "{stdout}");
    assert!(!caltable.exists());
}

#[test]
fn test_solve_bad_arguments() {
    let tmp_dir = TempDir::new().unwrap();
    let data = make_dataset(tmp_dir.path(), 1.0);
    let caltable = tmp_dir.path().join("gains.json");

    // The reference antenna doesn't exist.
    let cmd = viscal()
        .args([
            "solve",
            "-d",
            &format!("{}", data.display()),
            "-t",
            "G",
            "--refant",
            "99",
            "-o",
            &format!("{}", caltable.display()),
        ])
        .ok();
    assert!(cmd.is_err());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.contains("Reference antenna 99"), "{stderr}");

    // An unknown calibration type.
    let cmd = viscal()
        .args([
            "solve",
            "-d",
            &format!("{}", data.display()),
            "-t",
            "Z",
            "-o",
            &format!("{}", caltable.display()),
        ])
        .ok();
    assert!(cmd.is_err());
    assert!(!caltable.exists());
}

#[test]
fn test_solve_without_refant() {
    let tmp_dir = TempDir::new().unwrap();
    let data = make_dataset(tmp_dir.path(), 1.0);
    let caltable = tmp_dir.path().join("gains.json");

    let cmd = viscal()
        .args([
            "solve",
            "--no-progress-bars",
            "-d",
            &format!("{}", data.display()),
            "-t",
            "G",
            "--refant",
            "-1",
            "-o",
            &format!("{}", caltable.display()),
        ])
        .ok();
    assert!(cmd.is_ok(), "solve failed: {:?}", get_cmd_output(cmd));
    assert!(caltable.exists());
}

#[test]
fn test_solutions_list() {
    let tmp_dir = TempDir::new().unwrap();
    let data = make_dataset(tmp_dir.path(), 1.0);
    let caltable = tmp_dir.path().join("gains.json");
    solve_gains(&data, &caltable);

    let cmd = viscal()
        .args(["solutions-list", &format!("{}", caltable.display())])
        .ok();
    let failed = cmd.is_err();
    let (stdout, stderr) = get_cmd_output(cmd);
    assert!(!failed, "solutions-list failed: {stderr}");
    assert!(stdout.contains("G Jones solutions for 5 elements"), "{stdout}");
    assert!(stdout.contains("'flux_cal'"), "{stdout}");
    assert!(stdout.contains("'target'"), "{stdout}");
}
