//! # d2vsource
//!
//! Frame-accurate random access into MPEG-1, MPEG-2 and H.264 streams
//! through D2V index files.
//!
//! A D2V index (written by DGIndex or D2VWitch) records where every Group
//! of Pictures starts in the source files and carries one flag byte per
//! coded frame. `d2vsource` parses that index, plans the cheapest decode
//! that yields an exact frame (accounting for open GOPs that depend on their
//! predecessor), keeps sequential requests linear, and optionally expands
//! repeat-field (pulldown) flags into the displayed frame sequence.
//!
//! ## Quick Start
//!
//! ### Inspect an Index
//!
//! ```no_run
//! use d2vsource::{D2vIndex, VideoInfo};
//!
//! let index = D2vIndex::open("movie.d2v").unwrap();
//! let info = VideoInfo::from_index(&index);
//! println!("{} coded frames, {} after pulldown", info.frame_count, info.rff_frame_count);
//! ```
//!
//! ### Plan a Seek
//!
//! ```no_run
//! use d2vsource::{D2vIndex, plan_seek};
//!
//! let index = D2vIndex::open("movie.d2v").unwrap();
//! let plan = plan_seek(&index, 500).unwrap();
//! println!("start at GOP {}, discard {} picture(s)", plan.anchor_gop, plan.skip);
//! ```
//!
//! ### Decode Frames
//!
//! ```no_run
//! # #[cfg(feature = "ffmpeg")]
//! # fn demo() -> Result<(), d2vsource::D2vError> {
//! use d2vsource::{D2vSource, SessionOptions};
//!
//! let mut source = D2vSource::open_ffmpeg("movie.d2v", SessionOptions::new())?;
//! for n in 0..source.frame_count().min(10) {
//!     let frame = source.frame(n)?;
//!     println!("{n}: {:?}", frame.properties.field_order);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - **Index parsing**: versions 16 and 42, multi-file sources, CRLF input
//! - **Seek planning**: closed and open GOP handling
//! - **Linear decoding**: sequential requests decode a single picture
//! - **Pulldown**: repeat-field expansion with line-woven composites
//! - **Validation**: report index oddities before decoding
//!
//! ### Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `ffmpeg` | `FfmpegBackend` decoding through FFmpeg |
//! | `full` | Enables all of the above |
//!
//! ## Requirements
//!
//! The `ffmpeg` feature needs the FFmpeg development libraries installed on
//! your system. Everything else is pure Rust.

pub mod backend;
pub mod configuration;
pub mod cursor;
pub mod d2vsource;
pub mod error;
#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;
pub mod index;
pub mod metadata;
mod parser;
pub mod picture;
pub mod rff;
pub mod seek;
pub mod session;
pub mod stream;
pub mod validation;

pub use backend::{DecodedPicture, DecoderBackend};
pub use configuration::SessionOptions;
pub use cursor::{DecodeCursor, DecodePlan};
pub use d2vsource::D2vSource;
pub use error::D2vError;
#[cfg(feature = "ffmpeg")]
pub use ffmpeg::{FfmpegBackend, FfmpegLogLevel, set_ffmpeg_log_level};
pub use index::{
    ChromaLocation, CodecType, ColorRange, D2vIndex, Frame, FrameFlags, FrameRate, Gop, GopFlags,
    IdctAlgorithm, Location, StreamType,
};
pub use metadata::{FrameProperties, VideoInfo};
pub use parser::{D2V_LEGACY_VERSION, D2V_VERSION, resolve_source_path};
pub use picture::{FieldOrder, Picture, PictureType, Plane, weave_fields};
pub use rff::{FieldKind, FieldPair, RffField, RffSchedule, RffSession};
pub use seek::{SeekPlan, gop_frame_count, plan_seek};
pub use session::{DecodeSession, VideoFrame};
pub use stream::{MultiFileReader, SeekTarget, SourceFile, global_to_local, local_to_global};
pub use validation::ValidationReport;
