//! Seek planner integration tests.

mod common;

use std::path::Path;

use common::{INDEX_PATH, PROGRAM_HEADER, program_index, worked_example};
use d2vsource::{D2vError, D2vIndex, SeekTarget, gop_frame_count, plan_seek};

#[test]
fn closed_gop_skip_equals_offset() {
    let index = program_index(&[
        "500 5 0 0 0 0 0 00 00 00",
        "500 5 0 2048 0 0 0 00 00 00 ff",
    ]);

    for frame_number in 0..index.frame_count() {
        let plan = plan_seek(&index, frame_number).expect("frame should plan");
        let frame = index.frames()[frame_number];
        assert_eq!(plan.skip, frame.offset, "frame {frame_number}");
        assert_eq!(plan.anchor_gop, frame.gop);
        assert!(plan.allow_linear);
    }

    let plan = plan_seek(&index, 4).unwrap();
    assert_eq!(
        plan.target,
        SeekTarget {
            file: 0,
            position: 2048
        }
    );
}

#[test]
fn open_gop_skip_exceeds_offset() {
    let index = program_index(&[
        "500 5 0 0 0 0 0 00 00 00",
        "100 5 0 2048 0 0 0 00 80 00",
        "100 5 0 4096 0 0 0 80 00 00 00 ff",
    ]);

    for frame_number in 3..index.frame_count() {
        let plan = plan_seek(&index, frame_number).unwrap();
        let frame = index.frames()[frame_number];
        assert!(
            plan.skip > frame.offset,
            "frame {frame_number}: skip {} should exceed offset {}",
            plan.skip,
            frame.offset
        );
        assert_eq!(plan.anchor_gop, frame.gop - 1);
    }
}

#[test]
fn worked_example_anchors_at_previous_gop() {
    let index = worked_example();
    let plan = plan_seek(&index, 2).unwrap();

    assert_eq!(plan.gop, 1);
    assert_eq!(plan.anchor_gop, 0);
    assert_eq!(plan.skip, 3);
    assert_eq!(
        plan.target,
        SeekTarget {
            file: 0,
            position: 0
        }
    );
}

#[test]
fn open_anchor_discounts_its_leading_frames() {
    let index = program_index(&[
        "100 5 0 0 0 0 0 00 80 00",
        "100 5 0 2048 0 0 0 80 00 ff",
    ]);

    // GOP 0 has 3 frames, its first decodable one at offset 1.
    assert_eq!(plan_seek(&index, 3).unwrap().skip, 3 + 1 - 1);
    assert_eq!(plan_seek(&index, 4).unwrap().skip, 3 + 1 - 1 + 1);
}

#[test]
fn open_first_gop_is_approximated() {
    let index = program_index(&["100 5 0 0 0 0 0 00 00 80 00 ff"]);

    // Frames before the first decodable picture fall back to the GOP start
    // and cannot be continued linearly. This is a known approximation.
    for frame_number in 0..2 {
        let plan = plan_seek(&index, frame_number).unwrap();
        assert_eq!(plan.skip, 0);
        assert!(!plan.allow_linear);
    }

    let plan = plan_seek(&index, 2).unwrap();
    assert_eq!(plan.skip, 0);
    assert!(!plan.allow_linear);

    let plan = plan_seek(&index, 3).unwrap();
    assert_eq!(plan.skip, 1);
    assert!(plan.allow_linear);
}

#[test]
fn out_of_range_frame() {
    let index = worked_example();
    match plan_seek(&index, 3) {
        Err(D2vError::FrameOutOfRange {
            frame_number,
            total_frames,
        }) => {
            assert_eq!(frame_number, 3);
            assert_eq!(total_frames, 3);
        }
        other => panic!("expected FrameOutOfRange, got {other:?}"),
    }
}

#[test]
fn anchor_may_live_in_previous_file() {
    let text = format!(
        "DGIndexProjectFile16\n2\npart1.vob\npart2.vob\n\n{PROGRAM_HEADER}\n\n\
         500 5 0 1024 0 0 0 00 00\n100 5 1 0 0 0 0 80 00 ff\n"
    );
    let index = D2vIndex::parse_str(&text, Path::new(INDEX_PATH)).unwrap();

    let plan = plan_seek(&index, 3).unwrap();
    assert_eq!(
        plan.target,
        SeekTarget {
            file: 0,
            position: 1024
        }
    );
    assert_eq!(plan.skip, 2 + 1 + 1);
}

#[test]
fn previous_gop_count_from_frame_list() {
    let index = program_index(&[
        "500 5 0 0 0 0 0 00 00 00 00",
        "100 5 0 2048 0 0 0 80 00",
        "100 5 0 4096 0 0 0 80 ff",
    ]);

    assert_eq!(gop_frame_count(index.frames(), 4, 0), 4);
    assert_eq!(gop_frame_count(index.frames(), 6, 1), 2);
    assert_eq!(gop_frame_count(index.frames(), 0, 0), 0);
}
