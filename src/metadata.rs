//! Stream and per-frame metadata.
//!
//! [`VideoInfo`] summarises an opened index. [`FrameProperties`] travels
//! with every returned [`VideoFrame`](crate::VideoFrame) and describes how
//! the picture should be interpreted downstream.

use std::time::Duration;

use crate::{
    index::{ChromaLocation, CodecType, D2vIndex, FrameFlags, FrameRate, StreamType},
    picture::{FieldOrder, PictureType},
    rff::RffSchedule,
};

/// Summary of an indexed video stream.
///
/// # Example
///
/// ```no_run
/// use d2vsource::{D2vIndex, VideoInfo};
///
/// let index = D2vIndex::open("movie.d2v").unwrap();
/// let info = VideoInfo::from_index(&index);
/// println!("{}x{} @ {} fps", info.width, info.height, info.frame_rate);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct VideoInfo {
    /// Declared picture width in pixels.
    pub width: u32,
    /// Declared picture height in pixels.
    pub height: u32,
    /// Width the decoder works at (aligned to 16).
    pub aligned_width: u32,
    /// Height the decoder works at (aligned to 32).
    pub aligned_height: u32,
    /// Frame rate.
    pub frame_rate: FrameRate,
    /// Number of coded frames.
    pub frame_count: usize,
    /// Number of output frames once repeat-field flags are honoured.
    pub rff_frame_count: usize,
    /// Number of GOPs.
    pub gop_count: usize,
    /// Number of source files.
    pub file_count: usize,
    /// Video codec.
    pub codec: CodecType,
    /// Container type.
    pub stream_type: StreamType,
}

impl VideoInfo {
    /// Collect the summary of an index.
    pub fn from_index(index: &D2vIndex) -> Self {
        Self {
            width: index.width(),
            height: index.height(),
            aligned_width: index.aligned_width(),
            aligned_height: index.aligned_height(),
            frame_rate: index.frame_rate(),
            frame_count: index.frame_count(),
            rff_frame_count: RffSchedule::build(index, index.frame_count()).output_count(),
            gop_count: index.gops().len(),
            file_count: index.files().len(),
            codec: index.codec(),
            stream_type: index.stream_type(),
        }
    }

    /// Play time of the coded frames at the declared rate.
    pub fn duration(&self) -> Duration {
        let rate = self.frame_rate.as_f64();
        if rate <= 0.0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frame_count as f64 / rate)
    }
}

/// Properties attached to an output frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameProperties {
    /// `matrix_coefficients` of the owning GOP.
    pub matrix: u32,
    /// Frame duration numerator (the frame rate denominator).
    pub duration_num: u32,
    /// Frame duration denominator (the frame rate numerator).
    pub duration_den: u32,
    /// Presentation time in seconds at the declared rate.
    pub absolute_time: f64,
    /// Coding type, when the decoder reported one.
    pub picture_type: Option<PictureType>,
    /// Field structure.
    pub field_order: FieldOrder,
    /// Chroma siting.
    pub chroma_location: ChromaLocation,
}

impl FrameProperties {
    /// Properties of coded frame `frame_number`.
    ///
    /// Returns `None` for frames outside the index.
    pub(crate) fn for_frame(
        index: &D2vIndex,
        frame_number: usize,
        picture_type: Option<PictureType>,
    ) -> Option<Self> {
        let (frame, gop) = index.frame(frame_number)?;
        let flags = gop.frame_flags(frame.offset)?;
        let rate = index.frame_rate();

        Some(Self {
            matrix: gop.matrix,
            duration_num: rate.denominator,
            duration_den: rate.numerator,
            absolute_time: rate.denominator as f64 * frame_number as f64 / rate.numerator as f64,
            picture_type,
            field_order: field_order_of(flags),
            chroma_location: index.codec().chroma_location(),
        })
    }
}

/// Field order implied by a frame's flag byte.
pub fn field_order_of(flags: FrameFlags) -> FieldOrder {
    if flags.contains(FrameFlags::PROGRESSIVE) {
        FieldOrder::Progressive
    } else if flags.contains(FrameFlags::TFF) {
        FieldOrder::TopFieldFirst
    } else {
        FieldOrder::BottomFieldFirst
    }
}
