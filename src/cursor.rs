//! Linear-decode tracking.
//!
//! Re-opening the demuxer and decoding from a GOP start is expensive. When a
//! request is for the frame right after the one produced last, the decoder
//! is already positioned correctly and a single further picture is enough.
//! [`DecodeCursor`] remembers what was produced last and turns a
//! [`SeekPlan`] into the [`DecodePlan`] actually executed.

use crate::{seek::SeekPlan, stream::SeekTarget};

/// What the decoder has to do for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodePlan {
    /// Where to reopen the demuxer. `None` continues from the current
    /// decoder state.
    pub seek: Option<SeekTarget>,
    /// Pictures to decode and discard before the one that is returned.
    pub skip: usize,
}

impl DecodePlan {
    /// Total pictures pulled from the decoder, the returned one included.
    pub fn pictures_to_decode(&self) -> usize {
        self.skip + 1
    }
}

/// Decode position of one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeCursor {
    last_frame: Option<usize>,
    last_gop: Option<usize>,
}

impl DecodeCursor {
    /// A cursor that has produced nothing yet, so the first request seeks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Last coding-order frame produced.
    pub fn last_frame(&self) -> Option<usize> {
        self.last_frame
    }

    /// GOP of the last frame produced.
    pub fn last_gop(&self) -> Option<usize> {
        self.last_gop
    }

    /// Returns `true` when the next request must reopen the demuxer
    /// whatever frame it asks for.
    pub fn is_seek_pending(&self) -> bool {
        self.last_frame.is_none()
    }

    /// Returns `true` if `plan` can be served by decoding exactly one more
    /// picture from the current state.
    pub fn is_linear(&self, plan: &SeekPlan) -> bool {
        let (Some(last_frame), Some(last_gop)) = (self.last_frame, self.last_gop) else {
            return false;
        };

        plan.allow_linear
            && (last_gop == plan.gop || last_gop + 1 == plan.gop)
            && last_frame + 1 == plan.frame_number
    }

    /// Resolve a seek plan against the current position.
    pub fn decode_plan(&self, plan: &SeekPlan) -> DecodePlan {
        if self.is_linear(plan) {
            DecodePlan {
                seek: None,
                skip: 0,
            }
        } else {
            DecodePlan {
                seek: Some(plan.target),
                skip: plan.skip,
            }
        }
    }

    /// Record a successfully produced frame.
    pub fn record(&mut self, frame_number: usize, gop: usize) {
        self.last_frame = Some(frame_number);
        self.last_gop = Some(gop);
    }

    /// Forget the position, forcing the next request to seek. Used after a
    /// failed decode left the decoder in an unknown state.
    pub fn invalidate(&mut self) {
        self.last_frame = None;
        self.last_gop = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(frame_number: usize, gop: usize, skip: usize, allow_linear: bool) -> SeekPlan {
        SeekPlan {
            frame_number,
            gop,
            anchor_gop: gop,
            target: SeekTarget {
                file: 0,
                position: gop as u64 * 1024,
            },
            skip,
            allow_linear,
        }
    }

    #[test]
    fn fresh_cursor_seeks() {
        let cursor = DecodeCursor::new();
        assert!(cursor.is_seek_pending());
        let decode = cursor.decode_plan(&plan(0, 0, 0, true));
        assert_eq!(decode.seek, Some(SeekTarget { file: 0, position: 0 }));
        assert_eq!(decode.pictures_to_decode(), 1);
    }

    #[test]
    fn next_frame_is_linear_within_and_across_gops() {
        let mut cursor = DecodeCursor::new();
        cursor.record(4, 1);
        assert!(cursor.is_linear(&plan(5, 1, 3, true)));
        assert!(cursor.is_linear(&plan(5, 2, 3, true)));
        assert_eq!(
            cursor.decode_plan(&plan(5, 2, 3, true)),
            DecodePlan { seek: None, skip: 0 }
        );
    }

    #[test]
    fn gaps_and_disallowed_plans_seek() {
        let mut cursor = DecodeCursor::new();
        cursor.record(4, 1);
        assert!(!cursor.is_linear(&plan(6, 1, 2, true)));
        assert!(!cursor.is_linear(&plan(4, 1, 1, true)));
        assert!(!cursor.is_linear(&plan(5, 3, 0, true)));
        assert!(!cursor.is_linear(&plan(5, 1, 0, false)));

        let decode = cursor.decode_plan(&plan(6, 1, 2, true));
        assert_eq!(decode.skip, 2);
        assert_eq!(decode.pictures_to_decode(), 3);
    }

    #[test]
    fn invalidate_forces_seek() {
        let mut cursor = DecodeCursor::new();
        cursor.record(0, 0);
        cursor.invalidate();
        assert!(cursor.is_seek_pending());
        assert!(!cursor.is_linear(&plan(1, 0, 1, true)));
    }
}
