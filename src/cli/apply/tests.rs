// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use super::*;

fn minimal_args() -> ApplyArgs {
    ApplyArgs {
        data: Some(PathBuf::from("obs.json")),
        caltable: Some(PathBuf::from("gains.json")),
        ..Default::default()
    }
}

#[test]
fn test_parse_defaults() {
    let job = minimal_args().parse().unwrap();
    // Without an output, the input is overwritten.
    assert_eq!(job.output, job.data);
    assert!(job.cal_type.is_none());
    assert_eq!(job.params.mode, ApplyMode::Correct);
    assert_eq!(job.params.time_interp, TimeInterp::Nearest);
    assert_eq!(job.params.freq_interp, FreqInterp::Nearest);
    assert!(job.params.fields.is_empty());
    assert!(job.params.spw_map.is_empty());
}

#[test]
fn test_parse_options() {
    let args = ApplyArgs {
        cal_type: Some("B".to_string()),
        fields: Some(vec![1, 2]),
        spw_map: Some(vec![0, 0]),
        time_interp: Some("Preceding".to_string()),
        freq_interp: Some("linear".to_string()),
        mode: Some("corrupt".to_string()),
        output: Some(PathBuf::from("out.json")),
        ..minimal_args()
    };
    let job = args.parse().unwrap();
    assert_eq!(job.cal_type, Some(CalType::B));
    assert_eq!(job.params.fields, vec![1, 2]);
    assert_eq!(job.params.spw_map, vec![0, 0]);
    assert_eq!(job.params.time_interp, TimeInterp::Preceding);
    assert_eq!(job.params.freq_interp, FreqInterp::Linear);
    assert_eq!(job.params.mode, ApplyMode::Corrupt);
    assert_eq!(job.output, PathBuf::from("out.json"));
}

#[test]
fn test_parse_bad_values() {
    let args = ApplyArgs {
        mode: Some("invert".to_string()),
        ..minimal_args()
    };
    match args.parse() {
        Err(ViscalError::Generic(s)) => {
            assert!(s.contains("corrupt"));
            assert!(s.contains("correct"));
        }
        Err(e) => panic!("Unexpected error: {e}"),
        Ok(_) => panic!("An unknown mode was accepted"),
    }

    let args = ApplyArgs {
        caltable: None,
        ..minimal_args()
    };
    assert!(args.parse().is_err());
}
