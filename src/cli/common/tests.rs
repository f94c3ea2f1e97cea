// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Tests against command-line interfaces that aren't big enough to go in their
//! own modules.

use std::path::PathBuf;

use super::*;
use crate::solutions::TimeInterp;

#[test]
fn test_parse_channel_selection() {
    assert_eq!(parse_channel_selection("0:4:56").unwrap(), (0, 4, 56));
    assert_eq!(parse_channel_selection(" 2 : 0 : 1 ").unwrap(), (2, 0, 1));

    for bad in ["", "0:4", "0:4:56:1", "a:b:c", "-1:0:2"] {
        assert!(
            matches!(parse_channel_selection(bad), Err(ViscalError::Generic(_))),
            "'{bad}' was accepted"
        );
    }
}

#[test]
fn test_parse_enum() {
    let t: Option<TimeInterp> = parse_enum(Some("PRECEDING"), "time interpolation").unwrap();
    assert_eq!(t, Some(TimeInterp::Preceding));

    let t: Option<TimeInterp> = parse_enum(None, "time interpolation").unwrap();
    assert!(t.is_none());

    match parse_enum::<TimeInterp>(Some("cubic"), "time interpolation") {
        Err(ViscalError::Generic(s)) => {
            assert!(s.contains("cubic"));
            assert!(s.contains("nearest"));
            assert!(s.contains("preceding"));
        }
        other => panic!("Unexpected result: {other:?}"),
    }
}

#[test]
fn test_parse_cal_type() {
    assert_eq!(parse_cal_type(Some("K")).unwrap(), CalType::K);
    assert_eq!(parse_cal_type(Some("MF")).unwrap(), CalType::Mf);
    assert!(parse_cal_type(None).is_err());
    assert!(parse_cal_type(Some("X")).is_err());
}

#[test]
fn test_require_path() {
    assert_eq!(
        require_path(Some(PathBuf::from("a.json")), "thing").unwrap(),
        PathBuf::from("a.json")
    );
    assert!(require_path(Some(PathBuf::new()), "thing").is_err());
    assert!(require_path(None, "thing").is_err());
}

#[test]
fn test_read_missing_dataset() {
    let dir = tempfile::tempdir().unwrap();
    let result = read_dataset(&dir.path().join("nothing.json"), &[]);
    assert!(matches!(result, Err(ViscalError::VisRead(_))));
}
