//! Seek planning.
//!
//! Given a coding-order frame number, [`plan_seek`] works out which GOP the
//! decoder has to start from and how many pictures it must decode and throw
//! away before the requested one comes out.
//!
//! Closed GOPs are self-contained, so decoding starts at the frame's own GOP
//! and the skip count is simply the frame's offset inside it. Open GOPs
//! reference the tail of the previous GOP, so decoding has to start one GOP
//! earlier and additionally run through every picture of that GOP.
//!
//! # Example
//!
//! ```no_run
//! use d2vsource::{D2vError, D2vIndex, plan_seek};
//!
//! let index = D2vIndex::open("movie.d2v")?;
//! let plan = plan_seek(&index, 1234)?;
//! println!(
//!     "seek to file {} @ {}, decode {} picture(s) first",
//!     plan.target.file, plan.target.position, plan.skip
//! );
//! # Ok::<(), D2vError>(())
//! ```

use crate::{
    error::D2vError,
    index::{D2vIndex, Frame},
    stream::SeekTarget,
};

/// Where and how to start decoding a requested frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeekPlan {
    /// The requested coding-order frame.
    pub frame_number: usize,
    /// GOP that owns the requested frame.
    pub gop: usize,
    /// GOP decoding starts from. Either `gop` or `gop - 1`.
    pub anchor_gop: usize,
    /// First packet of the anchor GOP.
    pub target: SeekTarget,
    /// Pictures to decode and discard after seeking, before the requested
    /// one is produced.
    pub skip: usize,
    /// Whether the linear fast path may be used for this request.
    pub allow_linear: bool,
}

/// Plan the decode of `frame_number`.
///
/// # Errors
///
/// Returns [`D2vError::FrameOutOfRange`] if the frame is not in the index.
pub fn plan_seek(index: &D2vIndex, frame_number: usize) -> Result<SeekPlan, D2vError> {
    let (frame, gop) = index
        .frame(frame_number)
        .ok_or(D2vError::FrameOutOfRange {
            frame_number,
            total_frames: index.frame_count(),
        })?;

    let mut plan = SeekPlan {
        frame_number,
        gop: frame.gop,
        anchor_gop: frame.gop,
        target: SeekTarget {
            file: gop.file,
            position: gop.position,
        },
        skip: frame.offset,
        allow_linear: true,
    };

    if gop.is_closed() {
        return Ok(plan);
    }

    if frame.gop == 0 {
        // Nothing precedes the first GOP, so the leading pictures that need
        // it are dropped by the decoder instead of being output.
        let independent = gop.first_independent_offset();
        if independent > frame.offset {
            // No usable anchor: restart at the GOP. This returns a nearby
            // picture rather than the exact one.
            log::debug!(
                "Frame {frame_number} precedes the first decodable picture of open GOP 0"
            );
            plan.skip = 0;
        } else {
            plan.skip = frame.offset - independent;
        }
        plan.allow_linear = plan.skip != 0;
        return Ok(plan);
    }

    let anchor_index = frame.gop - 1;
    let anchor = &index.gops()[anchor_index];
    let anchor_frames = gop_frame_count(index.frames(), frame_number, anchor_index);

    // Leading pictures of an open anchor are dropped by the decoder.
    let dropped = if anchor.is_closed() {
        0
    } else {
        anchor.first_independent_offset().min(anchor_frames)
    };

    plan.anchor_gop = anchor_index;
    plan.target = SeekTarget {
        file: anchor.file,
        position: anchor.position,
    };
    plan.skip = anchor_frames + 1 - dropped + frame.offset;

    log::trace!(
        "Frame {frame_number} in open GOP {}: anchored at GOP {anchor_index}, skip {}",
        frame.gop,
        plan.skip
    );

    Ok(plan)
}

/// Number of coded frames in `gop`, found by walking the frame list
/// backwards from `from` to the last frame belonging to that GOP.
///
/// `from` must not precede the GOP. Returns 0 when the GOP has no frames.
pub fn gop_frame_count(frames: &[Frame], from: usize, gop: usize) -> usize {
    let mut position = from.min(frames.len());
    while position > 0 {
        position -= 1;
        let frame = frames[position];
        if frame.gop == gop {
            return frame.offset + 1;
        }
        if frame.gop < gop {
            break;
        }
    }
    0
}
