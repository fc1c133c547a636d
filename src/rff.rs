//! Repeat-field (pulldown) expansion.
//!
//! Film sources stored as 24 fps MPEG-2 are displayed at 29.97 fps by
//! repeating fields, signalled per frame by the RFF flag. [`RffSchedule`]
//! turns the coded frame list into the displayed field sequence; each
//! consecutive pair of fields is one output frame. [`RffSession`] decodes
//! the source frames a pair needs and copies or weaves them.
//!
//! Field markers per coded frame:
//!
//! | frame kind                                  | RFF | markers |
//! |---------------------------------------------|-----|---------|
//! | progressive sequence (or progressive H.264) | no  | 2 × P   |
//! | progressive sequence (or progressive H.264) | yes | 4 × P, 6 × P with TFF |
//! | interlaced                                  | no  | first, second |
//! | interlaced                                  | yes | first, second, first |

use crate::{
    backend::DecoderBackend,
    error::D2vError,
    index::{CodecType, D2vIndex, FrameFlags},
    picture::{FieldOrder, weave_fields},
    session::{DecodeSession, VideoFrame},
};

/// What a field marker stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// Top field of the source frame.
    Top,
    /// Bottom field of the source frame.
    Bottom,
    /// Half of a repeated progressive frame.
    Progressive,
}

/// One displayed field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RffField {
    /// Coded source frame.
    pub frame: usize,
    /// Which part of it is shown.
    pub kind: FieldKind,
}

/// The two fields making up one output frame, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldPair {
    /// Field shown first.
    pub first: RffField,
    /// Field shown second.
    pub second: RffField,
}

impl FieldPair {
    /// Source frame supplying the even lines.
    pub fn top_source(&self) -> usize {
        if self.first.kind == FieldKind::Bottom {
            self.second.frame
        } else {
            self.first.frame
        }
    }

    /// Source frame supplying the odd lines.
    pub fn bottom_source(&self) -> usize {
        if self.first.kind == FieldKind::Bottom {
            self.first.frame
        } else {
            self.second.frame
        }
    }

    /// Returns `true` if both fields come from the same coded frame.
    pub fn is_same_source(&self) -> bool {
        self.first.frame == self.second.frame
    }

    /// Field order of the output frame, taken from the first field.
    pub fn field_order(&self) -> FieldOrder {
        match self.first.kind {
            FieldKind::Progressive => FieldOrder::Progressive,
            FieldKind::Top => FieldOrder::TopFieldFirst,
            FieldKind::Bottom => FieldOrder::BottomFieldFirst,
        }
    }
}

/// The displayed field sequence of an index.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RffSchedule {
    fields: Vec<RffField>,
}

impl RffSchedule {
    /// Expand the first `num_frames` coded frames of `index`.
    pub fn build(index: &D2vIndex, num_frames: usize) -> Self {
        let num_frames = num_frames.min(index.frame_count());
        let mut fields = Vec::with_capacity(num_frames * 5 / 2);

        for frame in 0..num_frames {
            let Some((coded, gop)) = index.frame(frame) else {
                break;
            };
            let flags = gop.frame_flags(coded.offset).unwrap_or(FrameFlags::empty());
            let rff = flags.contains(FrameFlags::RFF);
            let tff = flags.contains(FrameFlags::TFF);
            let progressive_frame = flags.contains(FrameFlags::PROGRESSIVE);

            if gop.is_progressive_sequence()
                || (progressive_frame && index.codec() == CodecType::H264)
            {
                let copies = match (rff, tff) {
                    (false, _) => 2,
                    (true, false) => 4,
                    (true, true) => 6,
                };
                fields.extend(std::iter::repeat_n(
                    RffField {
                        frame,
                        kind: FieldKind::Progressive,
                    },
                    copies,
                ));
            } else {
                let (first, second) = if tff {
                    (FieldKind::Top, FieldKind::Bottom)
                } else {
                    (FieldKind::Bottom, FieldKind::Top)
                };
                fields.push(RffField { frame, kind: first });
                fields.push(RffField {
                    frame,
                    kind: second,
                });
                if rff {
                    fields.push(RffField { frame, kind: first });
                }
            }
        }

        Self { fields }
    }

    /// Every displayed field in order.
    pub fn fields(&self) -> &[RffField] {
        &self.fields
    }

    /// Number of output frames. A trailing unpaired field is dropped.
    pub fn output_count(&self) -> usize {
        self.fields.len() / 2
    }

    /// Fields of output frame `n`.
    pub fn pair(&self, n: usize) -> Option<FieldPair> {
        let first = *self.fields.get(n * 2)?;
        let second = *self.fields.get(n * 2 + 1)?;
        Some(FieldPair { first, second })
    }
}

/// Serves output frames with repeat-field flags applied.
pub struct RffSession<B> {
    session: DecodeSession<B>,
    schedule: RffSchedule,
    /// Most recently decoded source frames, newest last.
    cache: Vec<(usize, VideoFrame)>,
}

const CACHED_SOURCES: usize = 2;

impl<B: DecoderBackend> RffSession<B> {
    /// Wrap a decode session, expanding every coded frame of its index.
    pub fn new(session: DecodeSession<B>) -> Self {
        let schedule = RffSchedule::build(session.index(), session.frame_count());
        log::debug!(
            "Repeat-field expansion: {} coded frames -> {} output frames",
            session.frame_count(),
            schedule.output_count()
        );
        Self {
            session,
            schedule,
            cache: Vec::with_capacity(CACHED_SOURCES),
        }
    }

    /// The field schedule.
    pub fn schedule(&self) -> &RffSchedule {
        &self.schedule
    }

    /// The wrapped session.
    pub fn session(&self) -> &DecodeSession<B> {
        &self.session
    }

    /// Unwrap into the decode session.
    pub fn into_session(self) -> DecodeSession<B> {
        self.session
    }

    /// Number of output frames.
    pub fn frame_count(&self) -> usize {
        self.schedule.output_count()
    }

    /// Produce output frame `n`.
    ///
    /// # Errors
    ///
    /// Returns [`D2vError::FrameOutOfRange`] past the last output frame,
    /// or any error from decoding the source frames.
    pub fn frame(&mut self, n: usize) -> Result<VideoFrame, D2vError> {
        let pair = self.schedule.pair(n).ok_or(D2vError::FrameOutOfRange {
            frame_number: n,
            total_frames: self.schedule.output_count(),
        })?;

        let top = pair.top_source();
        let bottom = pair.bottom_source();

        if pair.is_same_source() {
            let mut frame = self.source(top)?;
            frame.properties.field_order = pair.field_order();
            return Ok(frame);
        }

        // Fetch in coding order so the second request stays linear.
        let (earlier, later) = (top.min(bottom), top.max(bottom));
        let earlier_frame = self.source(earlier)?;
        let later_frame = self.source(later)?;
        let (top_frame, bottom_frame) = if top == earlier {
            (earlier_frame, later_frame)
        } else {
            (later_frame, earlier_frame)
        };

        let picture = weave_fields(&top_frame.picture, &bottom_frame.picture)?;
        let mut properties = if pair.first.frame == top {
            top_frame.properties
        } else {
            bottom_frame.properties
        };
        properties.field_order = pair.field_order();

        log::trace!("Output frame {n}: woven from {top} (top) and {bottom} (bottom)");
        Ok(VideoFrame {
            picture,
            properties,
        })
    }

    fn source(&mut self, frame_number: usize) -> Result<VideoFrame, D2vError> {
        if let Some((_, cached)) = self.cache.iter().find(|(n, _)| *n == frame_number) {
            return Ok(cached.clone());
        }

        let frame = self.session.frame(frame_number)?;
        if self.cache.len() == CACHED_SOURCES {
            self.cache.remove(0);
        }
        self.cache.push((frame_number, frame.clone()));
        Ok(frame)
    }
}
