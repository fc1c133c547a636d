//! Error types for the `d2vsource` crate.
//!
//! This module defines [`D2vError`], the unified error type returned by all
//! fallible operations in the crate. Parse failures are terminal: a
//! [`D2vIndex`](crate::D2vIndex) is either fully built or not returned at
//! all.

use std::{io::Error as IoError, path::PathBuf};

use thiserror::Error;

/// The unified error type for all `d2vsource` operations.
///
/// Every public method that can fail returns `Result<T, D2vError>`.
/// Variants carry enough context to diagnose the problem without needing
/// additional logging at the call site.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum D2vError {
    /// The index document or one of its source files could not be opened.
    #[error("Cannot open {path}: {reason}")]
    CannotOpen {
        /// Path that failed to open.
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The index declares a project-file version this crate does not read.
    #[error("D2V version is unsupported: {0:?}")]
    UnsupportedVersion(String),

    /// The index is missing a required structural element (file count,
    /// file entry, or blank separator line).
    #[error("Invalid D2V structure: {0}")]
    MalformedStructure(String),

    /// A header field is missing, out of range, or inconsistent.
    #[error("Invalid {0} in D2V header")]
    InvalidHeaderField(String),

    /// A GOP record could not be parsed.
    #[error("Malformed GOP record on line {line}: {reason}")]
    MalformedGopRecord {
        /// 1-based line number in the index document.
        line: usize,
        /// What was wrong with the record.
        reason: String,
    },

    /// The index parsed cleanly but describes no frames or no GOPs.
    #[error("No frames in D2V file")]
    EmptyIndex,

    /// The requested frame number exceeds the total frame count.
    #[error("Frame {frame_number} is out of range (index has {total_frames} frames)")]
    FrameOutOfRange {
        /// The frame number that was requested.
        frame_number: usize,
        /// The total number of frames available.
        total_frames: usize,
    },

    /// The decoder collaborator reported a failure.
    #[error("Decoder error: {0}")]
    DecodeBackend(String),

    /// The decoder ran out of pictures before the requested frame was
    /// produced.
    #[error("Stream ended before frame {frame_number} was decoded")]
    UnexpectedEndOfStream {
        /// The frame that was being decoded.
        frame_number: usize,
    },

    /// The seek or decode order produced a state that should be
    /// impossible. Never retried.
    #[error("Structural inconsistency: {0}")]
    StructuralInconsistency(String),

    /// An I/O error occurred while reading source files.
    #[error("I/O error: {0}")]
    Io(#[from] IoError),
}

impl D2vError {
    /// Returns `true` for errors produced while parsing an index document.
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            D2vError::CannotOpen { .. }
                | D2vError::UnsupportedVersion(_)
                | D2vError::MalformedStructure(_)
                | D2vError::InvalidHeaderField(_)
                | D2vError::MalformedGopRecord { .. }
                | D2vError::EmptyIndex
        )
    }
}

#[cfg(feature = "ffmpeg")]
impl From<ffmpeg_next::Error> for D2vError {
    fn from(error: ffmpeg_next::Error) -> Self {
        D2vError::DecodeBackend(error.to_string())
    }
}
