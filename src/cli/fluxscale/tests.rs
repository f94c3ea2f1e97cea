// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use super::*;

#[test]
fn test_refspwmap_negative_means_self() {
    let args = FluxscaleArgs {
        caltable: Some(PathBuf::from("gains.json")),
        output: Some(PathBuf::from("scaled.json")),
        reference: Some(vec![0]),
        refspwmap: Some(vec![-1, 0, 0, -1]),
        ..Default::default()
    };
    let job = args.parse().unwrap();
    assert_eq!(job.params.reference_fields, vec![0]);
    assert!(job.params.transfer_fields.is_empty());
    assert_eq!(job.params.refspwmap, vec![None, Some(0), Some(0), None]);
    assert!(job.results.is_none());
}

#[test]
fn test_output_required() {
    let args = FluxscaleArgs {
        caltable: Some(PathBuf::from("gains.json")),
        reference: Some(vec![0]),
        ..Default::default()
    };
    assert!(matches!(args.parse(), Err(ViscalError::Generic(_))));
}

#[test]
fn test_missing_caltable_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let args = FluxscaleArgs {
        caltable: Some(dir.path().join("missing.json")),
        output: Some(dir.path().join("scaled.json")),
        reference: Some(vec![0]),
        ..Default::default()
    };
    assert!(matches!(args.run(false), Err(ViscalError::CalTable(_))));
}
