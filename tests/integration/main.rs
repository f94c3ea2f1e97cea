// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Integration tests.
//!
//! Some help for laying out these tests was taken from:
//! https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html

mod apply;
mod fluxscale;
mod solve;

use std::path::{Path, PathBuf};
use std::process::Output;
use std::str::from_utf8;

use assert_cmd::{output::OutputError, Command};
use marlu::{c64, Jones};

use viscal::vis_io::{write_vis_dataset, MemoryVisSet, SpwInfo, VisMetadata, VisRow};

/// \[MJD seconds\]
const START_TIME: f64 = 5.0e9;
/// \[seconds\]
const INT_TIME: f64 = 8.0;
const NUM_ANTENNAS: usize = 5;
const NUM_CHANS: usize = 4;

fn viscal() -> Command {
    Command::cargo_bin("viscal").unwrap()
}

fn get_cmd_output(result: Result<Output, OutputError>) -> (String, String) {
    let output = match result {
        Ok(o) => o,
        Err(o) => o.as_output().unwrap().clone(),
    };
    (
        from_utf8(&output.stdout).unwrap().to_string(),
        from_utf8(&output.stderr).unwrap().to_string(),
    )
}

/// The gain of an antenna. The first antenna has no phase, so that solutions
/// referenced to it match these exactly.
fn antenna_gain(ant: usize) -> c64 {
    c64::from_polar(1.0 + 0.05 * ant as f64, 0.2 * ant as f64)
}

fn diag(g: c64) -> Jones<f64> {
    Jones::from([g, c64::default(), c64::default(), g])
}

/// Write a dataset with two fields, each observed in one scan of 3
/// integrations. The model of both fields is a 1 Jy point source, but field 1
/// is really `field1_flux` Jy. The data is corrupted by [`antenna_gain`].
fn make_dataset(dir: &Path, field1_flux: f64) -> PathBuf {
    let metadata = VisMetadata {
        name: "two_fields".to_string(),
        antenna_names: (0..NUM_ANTENNAS).map(|i| format!("ant{i}")).collect(),
        field_names: vec!["flux_cal".to_string(), "target".to_string()],
        source_names: vec![],
        spws: vec![SpwInfo {
            chan_freqs: (0..NUM_CHANS).map(|c| 180e6 + 1e6 * c as f64).collect(),
        }],
    };

    let mut rows = vec![];
    for (scan, field) in [(1, 0), (2, 1)] {
        let flux = if field == 0 { 1.0 } else { field1_flux };
        for i_int in 0..3 {
            let time = START_TIME + (scan as f64 - 1.0) * 300.0 + INT_TIME * i_int as f64;
            for ant1 in 0..NUM_ANTENNAS {
                for ant2 in ant1 + 1..NUM_ANTENNAS {
                    let vis = diag(antenna_gain(ant1)) * diag(antenna_gain(ant2)).h() * flux;
                    rows.push(VisRow {
                        time,
                        exposure: INT_TIME,
                        observation: 0,
                        array: 0,
                        scan,
                        field,
                        spw: 0,
                        antenna1: ant1,
                        antenna2: ant2,
                        flag_row: false,
                        weight: [1.0; 4],
                        data: vec![vis; NUM_CHANS],
                        model: vec![],
                        corrected: vec![],
                        flags: vec![],
                    });
                }
            }
        }
    }

    let path = dir.join("two_fields.json");
    let vis_set = MemoryVisSet::new(metadata, rows).unwrap();
    write_vis_dataset(&path, &vis_set).unwrap();
    path
}

/// Solve for gains with the CLI.
fn solve_gains(data: &Path, caltable: &Path) {
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
            "-o",
            &format!("{}", caltable.display()),
        ])
        .ok();
    assert!(cmd.is_ok(), "solve failed on simple arguments: {:?}", get_cmd_output(cmd));
}
