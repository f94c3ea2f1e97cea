// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use super::*;

use approx::assert_abs_diff_eq;

#[test]
fn test_parse_time_str_without_units() {
    for s in ["1", "1.0", " 1.0 "] {
        let result = parse_time(s);
        assert!(result.is_ok(), "{:?}", result.unwrap_err());
        let pair = result.unwrap();
        assert_abs_diff_eq!(pair.0, 1.0);
        assert_eq!(pair.1, None);
    }
}

#[test]
fn test_parse_time_str_with_units() {
    // Iterate over all possible units.
    for time_format in TimeFormat::iter() {
        let time_format_str: &'static str = time_format.into();
        for time_format_str in [
            time_format_str.to_lowercase(),
            time_format_str.to_uppercase(),
        ] {
            for template in ["1{}", "1.0{}", " 1.0{} ", " 1.0 {} "] {
                let s = template.replace("{}", &time_format_str);
                let result = parse_time(&s);
                assert!(result.is_ok(), "{:?}", result.unwrap_err());
                let pair = result.unwrap();
                assert_abs_diff_eq!(pair.0, 1.0);
                assert_eq!(pair.1, Some(time_format));
            }
        }
    }
}

#[test]
fn test_parse_seconds() {
    assert_abs_diff_eq!(parse_seconds("30").unwrap(), 30.0);
    assert_abs_diff_eq!(parse_seconds("30s").unwrap(), 30.0);
    assert_abs_diff_eq!(parse_seconds("500ms").unwrap(), 0.5);
    assert_abs_diff_eq!(parse_seconds("2min").unwrap(), 120.0);
    assert_abs_diff_eq!(parse_seconds("1.5h").unwrap(), 5400.0);
}

#[test]
fn test_parse_time_garbage() {
    let result = parse_time("ten seconds");
    assert!(matches!(result, Err(UnitParseError::Unknown { .. })));

    let result = parse_time("1.2.3s");
    assert!(matches!(
        result,
        Err(UnitParseError::GotTimeUnitButCantParse { .. })
    ));
}
