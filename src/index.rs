//! The parsed D2V index.
//!
//! A [`D2vIndex`] is built once by the parser (see [`D2vIndex::open`]) and is
//! immutable afterwards. It records the stream layout ([`StreamType`],
//! [`CodecType`], picture size, frame rate), the source files making up the
//! logical byte stream, every [`Gop`] with its per-frame flag bytes, and the
//! index-wide coding-order [`Frame`] list that the seek planner walks.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::PathBuf;

use bitflags::bitflags;

bitflags! {
    /// GOP-level `info` bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct GopFlags: u16 {
        /// The GOP begins with an I picture that starts a new GOP.
        const I_PICTURE_STARTS_NEW_GOP = 0x100;
        /// The sequence carrying this GOP is progressive.
        const PROGRESSIVE_SEQUENCE = 0x200;
        /// The GOP does not reference pictures of the previous GOP.
        const CLOSED = 0x400;
    }
}

bitflags! {
    /// Per-frame flag bits, one byte per coded frame.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FrameFlags: u8 {
        /// Repeat first field.
        const RFF = 0x01;
        /// Top field first.
        const TFF = 0x02;
        /// The frame is progressive.
        const PROGRESSIVE = 0x40;
        /// The frame can be reconstructed without the previous GOP.
        const DECODABLE_WITHOUT_PREVIOUS_GOP = 0x80;
    }
}

/// Trailing flag value that terminates the last GOP of a stream.
pub const END_OF_STREAM_FLAG: u8 = 0xFF;

/// Container type of the indexed stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamType {
    /// Raw video elementary stream (`.m2v`, `.264`).
    Elementary,
    /// MPEG program stream (`.vob`, `.mpg`).
    Program,
    /// MPEG transport stream (`.ts`, `.m2ts`).
    Transport,
    /// PVA stream.
    Pva,
}

impl StreamType {
    /// Map the `Stream_Type` header value. Values outside `0..=3` are
    /// rejected.
    pub fn from_index(value: i64) -> Option<Self> {
        match value {
            0 => Some(StreamType::Elementary),
            1 => Some(StreamType::Program),
            2 => Some(StreamType::Transport),
            3 => Some(StreamType::Pva),
            _ => None,
        }
    }

    /// Short lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            StreamType::Elementary => "elementary",
            StreamType::Program => "program",
            StreamType::Transport => "transport",
            StreamType::Pva => "pva",
        }
    }
}

impl Display for StreamType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.name())
    }
}

/// Video codec of the indexed stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecType {
    /// MPEG-1 video.
    Mpeg1,
    /// MPEG-2 video.
    Mpeg2,
    /// H.264 / AVC.
    H264,
}

impl CodecType {
    /// Map the `MPEG_Type` header value (`1`, `2` or `264`).
    pub fn from_mpeg_type(value: i64) -> Option<Self> {
        match value {
            1 => Some(CodecType::Mpeg1),
            2 => Some(CodecType::Mpeg2),
            264 => Some(CodecType::H264),
            _ => None,
        }
    }

    /// The `MPEG_Type` header value for this codec.
    pub fn mpeg_type(self) -> u32 {
        match self {
            CodecType::Mpeg1 => 1,
            CodecType::Mpeg2 => 2,
            CodecType::H264 => 264,
        }
    }

    /// Chroma siting used by this codec's 4:2:0 sampling.
    pub fn chroma_location(self) -> ChromaLocation {
        match self {
            CodecType::Mpeg1 => ChromaLocation::Center,
            CodecType::Mpeg2 | CodecType::H264 => ChromaLocation::Left,
        }
    }
}

impl Display for CodecType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            CodecType::Mpeg1 => f.write_str("mpeg1"),
            CodecType::Mpeg2 => f.write_str("mpeg2"),
            CodecType::H264 => f.write_str("h264"),
        }
    }
}

/// Horizontal siting of chroma samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChromaLocation {
    /// Co-sited with the left luma sample (MPEG-2, H.264).
    Left,
    /// Centered between luma samples (MPEG-1).
    Center,
}

/// IDCT implementation hint recorded by the indexer.
///
/// The header stores a small selector (`0..=7`); several selectors collapse
/// onto the same decoder-side algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IdctAlgorithm {
    /// Let the decoder pick.
    #[default]
    Auto,
    /// libmpeg2-style MMX IDCT (selectors 1-3).
    LibMpeg2Mmx,
    /// Xvid MMX IDCT (selector 6).
    XvidMmx,
    /// Simple MMX IDCT (selector 7).
    SimpleMmx,
}

impl IdctAlgorithm {
    /// Map the `iDCT_Algorithm` selector. Values outside `0..=7` are
    /// rejected.
    pub fn from_index(value: i64) -> Option<Self> {
        match value {
            0 | 4 | 5 => Some(IdctAlgorithm::Auto),
            1..=3 => Some(IdctAlgorithm::LibMpeg2Mmx),
            6 => Some(IdctAlgorithm::XvidMmx),
            7 => Some(IdctAlgorithm::SimpleMmx),
            _ => None,
        }
    }
}

/// YUV to RGB scaling range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColorRange {
    /// Limited (16-235) range.
    #[default]
    Tv,
    /// Full (0-255) range.
    Pc,
}

impl ColorRange {
    /// Map the `YUVRGB_Scale` header value (`0` = TV, `1` = PC).
    pub fn from_index(value: i64) -> Option<Self> {
        match value {
            0 => Some(ColorRange::Tv),
            1 => Some(ColorRange::Pc),
            _ => None,
        }
    }
}

/// The span of the logical stream covered by the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Location {
    /// File index the indexed region starts in.
    pub start_file: u64,
    /// Offset within `start_file`.
    pub start_offset: u64,
    /// File index the indexed region ends in.
    pub end_file: u64,
    /// Offset within `end_file`.
    pub end_offset: u64,
}

impl Location {
    /// Returns `true` when the end does not precede the start.
    pub fn is_consistent(&self) -> bool {
        self.end_file > self.start_file
            || (self.end_file == self.start_file && self.end_offset >= self.start_offset)
    }
}

/// A frame rate expressed as a rational number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameRate {
    /// Numerator (e.g. `30000`).
    pub numerator: u32,
    /// Denominator (e.g. `1001`).
    pub denominator: u32,
}

impl FrameRate {
    /// Frames per second as a float.
    pub fn as_f64(self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }
}

impl Display for FrameRate {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// One Group of Pictures record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gop {
    /// GOP-level flags.
    pub info: GopFlags,
    /// `matrix_coefficients` in effect for this GOP.
    pub matrix: u32,
    /// Source file holding the first packet of this GOP.
    pub file: usize,
    /// Byte position of the first packet within `file`.
    pub position: u64,
    /// Container bookkeeping, passed through untouched.
    pub skip: u64,
    /// DVD VOB id, passed through untouched.
    pub vob: u64,
    /// DVD cell id, passed through untouched.
    pub cell: u64,
    /// Per-frame flag bytes in coding order.
    pub flags: Vec<u8>,
}

impl Gop {
    /// Returns `true` if the GOP does not depend on its predecessor.
    pub fn is_closed(&self) -> bool {
        self.info.contains(GopFlags::CLOSED)
    }

    /// Returns `true` if the GOP belongs to a progressive sequence.
    pub fn is_progressive_sequence(&self) -> bool {
        self.info.contains(GopFlags::PROGRESSIVE_SEQUENCE)
    }

    /// Number of coded frames in this GOP.
    pub fn frame_count(&self) -> usize {
        self.flags.len()
    }

    /// Flags of the frame at `offset`, or `None` past the end of the GOP.
    pub fn frame_flags(&self, offset: usize) -> Option<FrameFlags> {
        self.flags
            .get(offset)
            .map(|&bits| FrameFlags::from_bits_retain(bits))
    }

    /// Offset of the first frame that can be decoded without the previous
    /// GOP. Returns [`frame_count`](Gop::frame_count) when no frame
    /// qualifies.
    pub fn first_independent_offset(&self) -> usize {
        self.flags
            .iter()
            .position(|&bits| {
                FrameFlags::from_bits_retain(bits)
                    .contains(FrameFlags::DECODABLE_WITHOUT_PREVIOUS_GOP)
            })
            .unwrap_or(self.flags.len())
    }
}

/// A coded frame, addressed by its GOP and position inside that GOP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Frame {
    /// Index into [`D2vIndex::gops`].
    pub gop: usize,
    /// Position within the GOP's flag list.
    pub offset: usize,
}

/// A fully parsed and validated D2V index.
///
/// Instances are only produced by the parser, so every invariant of the
/// format holds: at least one GOP and one frame, a consistent
/// [`Location`], positive dimensions and frame rate, and a PID for
/// transport streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct D2vIndex {
    pub(crate) files: Vec<PathBuf>,
    pub(crate) stream_type: StreamType,
    pub(crate) transport_pid: Option<u32>,
    pub(crate) codec: CodecType,
    pub(crate) idct_algorithm: IdctAlgorithm,
    pub(crate) color_range: ColorRange,
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) frame_rate: FrameRate,
    pub(crate) location: Location,
    pub(crate) gops: Vec<Gop>,
    pub(crate) frames: Vec<Frame>,
}

impl D2vIndex {
    /// Resolved paths of the source files, in stream order.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Container type.
    pub fn stream_type(&self) -> StreamType {
        self.stream_type
    }

    /// Transport stream PID of the video stream, if one was recorded.
    pub fn transport_pid(&self) -> Option<u32> {
        self.transport_pid
    }

    /// Video codec.
    pub fn codec(&self) -> CodecType {
        self.codec
    }

    /// IDCT hint.
    pub fn idct_algorithm(&self) -> IdctAlgorithm {
        self.idct_algorithm
    }

    /// YUV to RGB range hint.
    pub fn color_range(&self) -> ColorRange {
        self.color_range
    }

    /// Declared picture width.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Declared picture height.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Width rounded up to the macroblock alignment the decoder works at.
    pub fn aligned_width(&self) -> u32 {
        self.width.next_multiple_of(16)
    }

    /// Height rounded up to the alignment needed for field pictures.
    pub fn aligned_height(&self) -> u32 {
        self.height.next_multiple_of(32)
    }

    /// Frame rate.
    pub fn frame_rate(&self) -> FrameRate {
        self.frame_rate
    }

    /// Indexed span of the logical stream.
    pub fn location(&self) -> Location {
        self.location
    }

    /// All GOPs in stream order.
    pub fn gops(&self) -> &[Gop] {
        &self.gops
    }

    /// All coded frames in coding order.
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Number of coded frames.
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Look up a frame together with its GOP.
    pub fn frame(&self, frame_number: usize) -> Option<(Frame, &Gop)> {
        let frame = *self.frames.get(frame_number)?;
        let gop = self.gops.get(frame.gop)?;
        Some((frame, gop))
    }

    /// Flags of a coding-order frame.
    pub fn frame_flags(&self, frame_number: usize) -> Option<FrameFlags> {
        let (frame, gop) = self.frame(frame_number)?;
        gop.frame_flags(frame.offset)
    }
}
