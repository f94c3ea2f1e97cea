// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use approx::assert_abs_diff_eq;
use marlu::{c64, Jones};
use tempfile::Builder;

use super::*;
use crate::tests::{SyntheticObs, INT_TIME, START_TIME};

fn unit_gains(_: usize, _: usize, _: f64, _: f64) -> Jones<f64> {
    Jones::identity()
}

fn count_chunks_and_buffers(vi: &mut dyn VisIterator) -> Vec<usize> {
    let mut buffers_per_chunk = vec![];
    vi.origin_chunks();
    while vi.more_chunks() {
        let mut n = 0;
        vi.origin();
        while vi.more() {
            n += 1;
            vi.advance();
        }
        buffers_per_chunk.push(n);
        vi.next_chunk();
    }
    buffers_per_chunk
}

#[test]
fn test_default_sort_chunks_per_scan() {
    let obs = SyntheticObs::new(3, 1, 2, &[(0, 2), (1, 3)]);
    let mut vis_set = obs.build(unit_gains);
    assert_eq!(vis_set.rows().len(), 5 * 6);
    assert_eq!(count_chunks_and_buffers(&mut vis_set), vec![2, 3]);

    vis_set.origin_chunks();
    let record = vis_set.chunk_record().unwrap();
    assert_eq!(record.scan, 1);
    assert_eq!(record.field, 0);
    assert_abs_diff_eq!(record.time, START_TIME);

    vis_set.origin();
    let buffer = vis_set.buffer();
    // 3 autos and 3 crosses.
    assert_eq!(buffer.num_rows(), 6);
    assert_eq!(buffer.num_chans(), 2);
    assert!(buffer.time.iter().all(|&t| t == START_TIME));
    assert_eq!(buffer.freqs, vec![150e6, 151e6]);
    // Default model is a unit point source.
    assert_eq!(buffer.model[(0, 0)], Jones::identity());
    assert_eq!(buffer.corrected, buffer.data);
}

#[test]
fn test_interval_splits_chunks() {
    let obs = SyntheticObs::new(3, 1, 1, &[(0, 3)]);
    let mut vis_set = obs.build(unit_gains);
    let columns = [
        SortColumn::Observation,
        SortColumn::Array,
        SortColumn::Scan,
        SortColumn::Field,
        SortColumn::Spw,
        SortColumn::Time,
    ];

    vis_set.set_sort(&columns, f64::MIN_POSITIVE);
    assert_eq!(count_chunks_and_buffers(&mut vis_set), vec![1, 1, 1]);

    // Chunks span less than the interval.
    vis_set.set_sort(&columns, 1.5 * INT_TIME);
    assert_eq!(count_chunks_and_buffers(&mut vis_set), vec![2, 1]);

    // A timestamp exactly one interval after the first stays in the chunk.
    vis_set.set_sort(&columns, 2.0 * INT_TIME);
    assert_eq!(count_chunks_and_buffers(&mut vis_set), vec![3]);

    vis_set.set_sort(&columns, 0.0);
    assert_eq!(count_chunks_and_buffers(&mut vis_set), vec![3]);
}

#[test]
fn test_chunks_ignore_unsorted_scans() {
    // Two scans of the same field.
    let obs = SyntheticObs::new(3, 1, 1, &[(0, 2), (0, 2)]);
    let mut vis_set = obs.build(unit_gains);
    vis_set.set_sort(
        &[
            SortColumn::Observation,
            SortColumn::Array,
            SortColumn::Field,
            SortColumn::Spw,
            SortColumn::Time,
        ],
        0.0,
    );
    assert_eq!(count_chunks_and_buffers(&mut vis_set), vec![4]);

    // Fields always break chunks.
    let obs = SyntheticObs::new(3, 1, 1, &[(0, 2), (1, 2)]);
    let mut vis_set = obs.build(unit_gains);
    vis_set.set_sort(&[SortColumn::Observation, SortColumn::Time], 0.0);
    assert_eq!(count_chunks_and_buffers(&mut vis_set), vec![2, 2]);
}

#[test]
fn test_spws_interleave_when_not_sorted() {
    let obs = SyntheticObs::new(3, 2, 1, &[(0, 2)]);
    let mut vis_set = obs.build(unit_gains);
    vis_set.set_sort(
        &[
            SortColumn::Observation,
            SortColumn::Array,
            SortColumn::Scan,
            SortColumn::Field,
            SortColumn::Time,
        ],
        f64::MIN_POSITIVE,
    );
    let mut spws = vec![];
    vis_set.origin_chunks();
    while vis_set.more_chunks() {
        spws.push(vis_set.chunk_record().unwrap().spw);
        vis_set.next_chunk();
    }
    assert_eq!(spws, vec![0, 1, 0, 1]);
}

#[test]
fn test_channel_selection() {
    let obs = SyntheticObs::new(2, 1, 4, &[(0, 1)]);
    let mut vis_set = obs.build(unit_gains);
    assert_eq!(vis_set.channel_selection(0), (0, 4));

    let result = vis_set.select_channels(0, 1, 2);
    assert!(result.is_ok(), "{:?}", result.err());
    assert_eq!(vis_set.channel_selection(0), (1, 2));
    vis_set.origin_chunks();
    vis_set.origin();
    let buffer = vis_set.buffer();
    assert_eq!(buffer.chans, vec![1, 2]);
    assert_eq!(buffer.freqs, vec![151e6, 152e6]);

    assert!(matches!(
        vis_set.select_channels(0, 3, 2),
        Err(VisReadError::ChannelSelection { num_chans: 4, .. })
    ));
    assert!(vis_set.select_channels(0, 0, 0).is_err());
    assert!(vis_set.select_channels(1, 0, 1).is_err());
}

#[test]
fn test_write_buffer() {
    let obs = SyntheticObs::new(2, 1, 3, &[(0, 2)]);
    let mut vis_set = obs.build(unit_gains);
    vis_set.select_channels(0, 1, 1).unwrap();
    vis_set.origin_chunks();
    vis_set.origin();
    vis_set.advance();
    let mut buffer = vis_set.buffer();
    let new = Jones::identity() * 7.0;
    buffer.corrected.fill(new);
    buffer.flags[(1, 0)] = true;
    let result = vis_set.write_buffer(&buffer);
    assert!(result.is_ok(), "{:?}", result.err());

    for (buffer_row, &row_id) in buffer.row_ids.iter().enumerate() {
        let row = &vis_set.rows()[row_id];
        assert_eq!(row.time, START_TIME + INT_TIME);
        // Only the selected channel changed.
        assert_eq!(row.corrected[1], new);
        assert_eq!(row.corrected[0], row.data[0]);
        assert_eq!(row.flags[1], buffer_row == 1);
        assert!(!row.flags[0]);
    }

    buffer.row_ids[0] = 1000;
    assert!(matches!(
        vis_set.write_buffer(&buffer),
        Err(VisWriteError::BadRowId { row_id: 1000, .. })
    ));
}

#[test]
fn test_compute_maps() {
    let obs = SyntheticObs::new(3, 1, 1, &[(0, 1)]);
    let mut vis_set = obs.build(unit_gains);
    vis_set.origin_chunks();
    vis_set.origin();
    let mut buffer = vis_set.buffer();
    // Pretend the last two rows come from a second timestamp.
    buffer.time[4] += 1.0;
    buffer.time[5] += 1.0;
    let maps = compute_maps(&buffer);

    assert_eq!(maps.antenna_pairs.len(), 6);
    assert_eq!(maps.rows_for_pair(0, 1), &[1]);
    assert_eq!(maps.rows_for_pair(2, 2), &[5]);
    assert!(maps.rows_for_pair(1, 0).is_empty());

    let times: Vec<(f64, Vec<usize>)> = maps.times().map(|(t, r)| (t, r.to_vec())).collect();
    assert_eq!(
        times,
        vec![
            (START_TIME, vec![0, 1, 2, 3]),
            (START_TIME + 1.0, vec![4, 5])
        ]
    );
}

#[test]
fn test_bad_rows_are_rejected() {
    let obs = SyntheticObs::new(2, 1, 2, &[(0, 1)]);
    let vis_set = obs.build(unit_gains);
    let metadata = vis_set.metadata().clone();

    let mut rows = vis_set.rows().to_vec();
    rows[1].spw = 3;
    assert!(matches!(
        MemoryVisSet::new(metadata.clone(), rows),
        Err(VisReadError::BadRow { row: 1, .. })
    ));

    let mut rows = vis_set.rows().to_vec();
    rows[2].antenna2 = 2;
    assert!(matches!(
        MemoryVisSet::new(metadata.clone(), rows),
        Err(VisReadError::BadRow { row: 2, .. })
    ));

    let mut rows = vis_set.rows().to_vec();
    rows[0].data.pop();
    assert!(MemoryVisSet::new(metadata, rows).is_err());
}

#[test]
fn test_dataset_files() {
    let obs = SyntheticObs::new(3, 2, 2, &[(0, 2)]);
    let vis_set = obs.build(|ant, _, _, _| {
        Jones::from([
            c64::new(1.0 + ant as f64, 0.5),
            c64::default(),
            c64::default(),
            c64::new(0.25, -1.0 / 3.0),
        ])
    });

    for ext in ["json", "yaml"] {
        let tmp = Builder::new().suffix(&format!(".{ext}")).tempfile().unwrap();
        let result = write_vis_dataset(tmp.path(), &vis_set);
        assert!(result.is_ok(), "{:?}", result.err());
        let result = read_vis_dataset(tmp.path());
        assert!(result.is_ok(), "{:?}", result.err());
        let read = result.unwrap();
        assert_eq!(read.metadata(), vis_set.metadata());
        assert_eq!(read.rows(), vis_set.rows());
    }

    let tmp = Builder::new().suffix(".ms").tempfile().unwrap();
    assert!(matches!(
        read_vis_dataset(tmp.path()),
        Err(VisReadError::UnsupportedExt { .. })
    ));
    assert!(matches!(
        write_vis_dataset(tmp.path(), &vis_set),
        Err(VisWriteError::UnsupportedExt { .. })
    ));
}
