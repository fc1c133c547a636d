//! Repeat-field expansion tests.

mod common;

use std::sync::Arc;

use common::{MockBackend, PROGRAM_HEADER, decode_count, index_document, program_index, reopen_count};
use d2vsource::{
    D2vIndex, D2vSource, DecodeSession, FieldKind, FieldOrder, RffField, RffSchedule, RffSession,
    SessionOptions, VideoInfo,
};

/// 3:2 pulldown starting top field first: `T0 B0 T0 | B1 T1 | B2 T2 B2 | T3 B3`.
fn telecined() -> D2vIndex {
    program_index(&["500 5 0 0 0 0 0 03 00 01 02 ff"])
}

fn markers(schedule: &RffSchedule) -> Vec<(usize, FieldKind)> {
    schedule
        .fields()
        .iter()
        .map(|field| (field.frame, field.kind))
        .collect()
}

#[test]
fn progressive_sequence_marker_counts() {
    let index = program_index(&["700 5 0 0 0 0 0 00 01 03 ff"]);
    let schedule = RffSchedule::build(&index, index.frame_count());

    let per_frame: Vec<usize> = (0..3)
        .map(|frame| {
            schedule
                .fields()
                .iter()
                .filter(|field| field.frame == frame)
                .count()
        })
        .collect();
    assert_eq!(per_frame, [2, 4, 6]);
    assert!(
        schedule
            .fields()
            .iter()
            .all(|field| field.kind == FieldKind::Progressive)
    );
    assert_eq!(schedule.output_count(), 6);
}

#[test]
fn progressive_h264_frames_repeat_whole() {
    let header = PROGRAM_HEADER
        .replace("Stream_Type=1", "Stream_Type=0")
        .replace("MPEG_Type=2", "MPEG_Type=264");
    let text = index_document(&header, &["500 1 0 0 0 0 0 c1 80 ff"]);
    let index = D2vIndex::parse_str(&text, std::path::Path::new(common::INDEX_PATH)).unwrap();
    let schedule = RffSchedule::build(&index, index.frame_count());

    assert_eq!(
        markers(&schedule),
        [
            (0, FieldKind::Progressive),
            (0, FieldKind::Progressive),
            (0, FieldKind::Progressive),
            (0, FieldKind::Progressive),
            (1, FieldKind::Bottom),
            (1, FieldKind::Top),
        ]
    );
}

#[test]
fn interlaced_rff_adds_one_field() {
    let index = program_index(&["500 5 0 0 0 0 0 02 03 ff"]);
    let schedule = RffSchedule::build(&index, index.frame_count());

    assert_eq!(
        markers(&schedule),
        [
            (0, FieldKind::Top),
            (0, FieldKind::Bottom),
            (1, FieldKind::Top),
            (1, FieldKind::Bottom),
            (1, FieldKind::Top),
        ]
    );
    // The unpaired trailing field is dropped.
    assert_eq!(schedule.output_count(), 2);
    assert!(schedule.pair(2).is_none());
}

#[test]
fn telecine_pairs() {
    let index = telecined();
    let schedule = RffSchedule::build(&index, index.frame_count());
    assert_eq!(schedule.fields().len(), 10);
    assert_eq!(schedule.output_count(), 5);

    let sources: Vec<(usize, usize)> = (0..5)
        .map(|n| {
            let pair = schedule.pair(n).unwrap();
            (pair.top_source(), pair.bottom_source())
        })
        .collect();
    assert_eq!(sources, [(0, 0), (0, 1), (1, 2), (2, 2), (3, 3)]);

    let mixed = schedule.pair(1).unwrap();
    assert!(!mixed.is_same_source());
    assert_eq!(
        mixed.first,
        RffField {
            frame: 0,
            kind: FieldKind::Top
        }
    );
    assert_eq!(mixed.field_order(), FieldOrder::TopFieldFirst);
}

#[test]
fn bottom_first_composite() {
    // B0 T0 B0 | T1 B1
    let index = program_index(&["500 5 0 0 0 0 0 01 02 ff"]);
    let schedule = RffSchedule::build(&index, index.frame_count());

    let pair = schedule.pair(1).unwrap();
    assert_eq!(pair.first.kind, FieldKind::Bottom);
    assert_eq!(pair.top_source(), 1);
    assert_eq!(pair.bottom_source(), 0);
    assert_eq!(pair.field_order(), FieldOrder::BottomFieldFirst);
}

#[test]
fn partial_schedule() {
    let index = telecined();
    let schedule = RffSchedule::build(&index, 2);
    assert_eq!(schedule.fields().len(), 5);
    assert_eq!(RffSchedule::build(&index, 100).fields().len(), 10);
}

#[test]
fn session_weaves_mixed_pairs() {
    let index = telecined();
    let backend = MockBackend::new(&index);
    let session = DecodeSession::new(Arc::new(index), backend, SessionOptions::new());
    let mut rff = RffSession::new(session);
    assert_eq!(rff.frame_count(), 5);

    let woven = rff.frame(1).unwrap();
    let luma = &woven.picture.planes[0];
    assert_eq!((woven.picture.width, woven.picture.height), (24, 20));
    assert!(luma.row(0).iter().all(|&value| value == 0));
    assert!(luma.row(1).iter().all(|&value| value == 1));
    assert!(luma.row(18).iter().all(|&value| value == 0));
    assert!(luma.row(19).iter().all(|&value| value == 1));
    assert_eq!(woven.properties.field_order, FieldOrder::TopFieldFirst);
    assert_eq!(woven.properties.absolute_time, 0.0);
}

#[test]
fn session_copies_same_source_pairs() {
    let index = telecined();
    let backend = MockBackend::new(&index);
    let session = DecodeSession::new(Arc::new(index), backend, SessionOptions::new());
    let mut rff = RffSession::new(session);

    // Frame 2 is flagged bottom field first, but this pair shows its top
    // field first.
    let copy = rff.frame(3).unwrap();
    assert!(copy.picture.planes[0].data.iter().all(|&value| value == 2));
    assert_eq!(copy.properties.field_order, FieldOrder::TopFieldFirst);
}

#[test]
fn progressive_sequence_copies_are_progressive() {
    // Flag bytes without the progressive-frame bit.
    let index = program_index(&["700 5 0 0 0 0 0 00 00 ff"]);
    let schedule = RffSchedule::build(&index, index.frame_count());
    assert_eq!(schedule.pair(0).unwrap().field_order(), FieldOrder::Progressive);

    let backend = MockBackend::new(&index);
    let session = DecodeSession::new(Arc::new(index), backend, SessionOptions::new());
    let mut rff = RffSession::new(session);

    for n in 0..2 {
        let frame = rff.frame(n).unwrap();
        assert_eq!(frame.properties.field_order, FieldOrder::Progressive);
    }
}

#[test]
fn composite_led_by_progressive_field() {
    // T0 B0 T0 | P1 P1 P2 P2
    let index = program_index(&[
        "400 5 0 0 0 0 0 03 ff",
        "600 5 0 2048 0 0 0 40 40 ff",
    ]);
    let schedule = RffSchedule::build(&index, index.frame_count());
    let pair = schedule.pair(2).unwrap();
    assert_eq!(
        pair.first,
        RffField {
            frame: 1,
            kind: FieldKind::Progressive
        }
    );
    assert_eq!(pair.second.frame, 2);
    assert_eq!(pair.field_order(), FieldOrder::Progressive);

    let backend = MockBackend::new(&index);
    let session = DecodeSession::new(Arc::new(index), backend, SessionOptions::new());
    let mut rff = RffSession::new(session);

    let woven = rff.frame(2).unwrap();
    let luma = &woven.picture.planes[0];
    assert!(luma.row(0).iter().all(|&value| value == 1));
    assert!(luma.row(1).iter().all(|&value| value == 2));
    assert_eq!(woven.properties.field_order, FieldOrder::Progressive);
}

#[test]
fn sequential_output_decodes_each_source_once() {
    let index = telecined();
    let backend = MockBackend::new(&index);
    let calls = backend.call_log();
    let session = DecodeSession::new(Arc::new(index), backend, SessionOptions::new());
    let mut rff = RffSession::new(session);

    for n in 0..rff.frame_count() {
        rff.frame(n).unwrap();
    }

    let calls = calls.borrow();
    assert_eq!(reopen_count(&calls), 1);
    assert_eq!(decode_count(&calls), 4);
}

#[test]
fn output_past_end_is_out_of_range() {
    let index = telecined();
    let backend = MockBackend::new(&index);
    let session = DecodeSession::new(Arc::new(index), backend, SessionOptions::new());
    let mut rff = RffSession::new(session);

    let error = rff.frame(5).unwrap_err();
    assert!(matches!(
        error,
        d2vsource::D2vError::FrameOutOfRange {
            frame_number: 5,
            total_frames: 5
        }
    ));
}

#[test]
fn source_toggles_expansion() {
    let index = Arc::new(telecined());

    let expanded = D2vSource::new(
        Arc::clone(&index),
        MockBackend::new(&index),
        SessionOptions::new(),
    );
    assert_eq!(expanded.frame_count(), 5);

    let mut coded = D2vSource::new(
        Arc::clone(&index),
        MockBackend::new(&index),
        SessionOptions::new().with_apply_rff(false),
    );
    assert_eq!(coded.frame_count(), 4);
    let frame = coded.frame(3).unwrap();
    assert!(frame.picture.planes[0].data.iter().all(|&value| value == 3));
    assert_eq!(frame.properties.field_order, FieldOrder::TopFieldFirst);

    let info = VideoInfo::from_index(&index);
    assert_eq!(info.frame_count, 4);
    assert_eq!(info.rff_frame_count, 5);
    assert_eq!(expanded.info(), &info);
}
