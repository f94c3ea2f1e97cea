// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::{path::PathBuf, str::FromStr};

use super::*;

#[test]
fn test_defaults() {
    let params = SolveParams::new(PathBuf::from("cal.json")).unwrap();
    assert_eq!(params.solint, SolutionInterval::Infinite);
    assert_eq!(params.combine, Combine::default());
    assert_eq!(params.refant, None);
    assert_eq!(params.apmode, Apmode::AP);
    assert!(!params.solnorm);
    assert!(!params.append);
    assert_eq!(params.min_snr, 0.0);
    assert_eq!(params.max_iterations, 50);
    assert!(params.validate().is_ok());
}

#[test]
fn test_empty_table_name() {
    assert!(matches!(
        SolveParams::new(PathBuf::new()),
        Err(SolveConfigError::EmptyTableName)
    ));
}

#[test]
fn test_validate() {
    let mut params = SolveParams::new(PathBuf::from("cal.yaml")).unwrap();
    params.max_iterations = 0;
    assert!(matches!(
        params.validate(),
        Err(SolveConfigError::ZeroIterations)
    ));

    params.max_iterations = 1;
    params.stop_threshold = 0.0;
    assert!(matches!(
        params.validate(),
        Err(SolveConfigError::BadStopThreshold(_))
    ));

    params.stop_threshold = f64::NAN;
    assert!(params.validate().is_err());

    params.stop_threshold = 1e-6;
    params.min_snr = f64::INFINITY;
    assert!(matches!(params.validate(), Err(SolveConfigError::BadMinSnr(_))));
}

#[test]
fn test_apmode_parsing() {
    assert_eq!(Apmode::from_str("ap").unwrap(), Apmode::AP);
    assert_eq!(Apmode::from_str("P").unwrap(), Apmode::P);
    assert_eq!(Apmode::from_str("a").unwrap(), Apmode::A);
    assert!(Apmode::from_str("PA").is_err());
}
