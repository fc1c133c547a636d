//! Frame-accurate decode sessions.
//!
//! A [`DecodeSession`] pairs a shared [`D2vIndex`] with one
//! [`DecoderBackend`] and answers random-access frame requests. Each
//! request is planned with [`plan_seek`], shortened to a single picture by
//! the [`DecodeCursor`] when it continues the previous one, and executed
//! against the backend.
//!
//! # Example
//!
//! ```no_run
//! # #[cfg(feature = "ffmpeg")]
//! # fn demo() -> Result<(), d2vsource::D2vError> {
//! use std::sync::Arc;
//!
//! use d2vsource::{D2vIndex, DecodeSession, FfmpegBackend, SessionOptions};
//!
//! let index = Arc::new(D2vIndex::open("movie.d2v")?);
//! let options = SessionOptions::new();
//! let backend = FfmpegBackend::open(&index, &options)?;
//! let mut session = DecodeSession::new(index, backend, options);
//! let frame = session.frame(100)?;
//! println!("{}x{}", frame.picture.width, frame.picture.height);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use crate::{
    backend::{DecodedPicture, DecoderBackend},
    configuration::SessionOptions,
    cursor::DecodeCursor,
    error::D2vError,
    index::D2vIndex,
    metadata::FrameProperties,
    picture::Picture,
    seek::{SeekPlan, plan_seek},
};

/// A decoded output frame with its properties.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    /// Picture at the output size.
    pub picture: Picture,
    /// Interpretation hints.
    pub properties: FrameProperties,
}

/// Random access into one indexed stream.
///
/// Requests take `&mut self`: a session serves one request at a time.
/// Independent sessions over the same index share nothing mutable.
pub struct DecodeSession<B> {
    index: Arc<D2vIndex>,
    backend: B,
    cursor: DecodeCursor,
    options: SessionOptions,
}

impl<B: DecoderBackend> DecodeSession<B> {
    /// Create a session. The first request always seeks.
    pub fn new(index: Arc<D2vIndex>, backend: B, options: SessionOptions) -> Self {
        Self {
            index,
            backend,
            cursor: DecodeCursor::new(),
            options,
        }
    }

    /// The index this session decodes.
    pub fn index(&self) -> &D2vIndex {
        &self.index
    }

    /// A shared handle to the index.
    pub fn shared_index(&self) -> Arc<D2vIndex> {
        Arc::clone(&self.index)
    }

    /// Session options.
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Current decode position.
    pub fn cursor(&self) -> &DecodeCursor {
        &self.cursor
    }

    /// The backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Consume the session and return its backend.
    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Number of coded frames.
    pub fn frame_count(&self) -> usize {
        self.index.frame_count()
    }

    /// Width and height of returned pictures.
    pub fn output_dimensions(&self) -> (u32, u32) {
        if self.options.no_crop {
            (self.index.aligned_width(), self.index.aligned_height())
        } else {
            (self.index.width(), self.index.height())
        }
    }

    /// Decode coded frame `frame_number`.
    ///
    /// # Errors
    ///
    /// Returns [`D2vError::FrameOutOfRange`] for frames outside the index,
    /// [`D2vError::UnexpectedEndOfStream`] when the backend runs out of
    /// pictures, or any backend error. After a failure the next request
    /// seeks again.
    pub fn frame(&mut self, frame_number: usize) -> Result<VideoFrame, D2vError> {
        let total_frames = self.index.frame_count();
        if frame_number >= total_frames {
            return Err(D2vError::FrameOutOfRange {
                frame_number,
                total_frames,
            });
        }

        self.read_ahead(frame_number)?;
        let decoded = self.decode_frame(frame_number)?;

        let properties =
            FrameProperties::for_frame(&self.index, frame_number, decoded.picture_type).ok_or(
                D2vError::FrameOutOfRange {
                    frame_number,
                    total_frames,
                },
            )?;
        let (width, height) = self.output_dimensions();

        Ok(VideoFrame {
            picture: decoded.picture.fit(width, height),
            properties,
        })
    }

    /// Decode through a short forward gap so the request stays linear.
    fn read_ahead(&mut self, frame_number: usize) -> Result<(), D2vError> {
        let threshold = self.options.linear_threshold;
        let Some(last) = self.cursor.last_frame() else {
            return Ok(());
        };
        if threshold == 0 || frame_number <= last + 1 || frame_number - last >= threshold {
            return Ok(());
        }

        log::trace!("Reading ahead frames {}..{frame_number}", last + 1);
        for intermediate in last + 1..frame_number {
            self.decode_frame(intermediate)?;
        }
        Ok(())
    }

    fn decode_frame(&mut self, frame_number: usize) -> Result<DecodedPicture, D2vError> {
        let plan = plan_seek(&self.index, frame_number)?;
        match self.execute(&plan) {
            Ok(decoded) => {
                self.cursor.record(frame_number, plan.gop);
                Ok(decoded)
            }
            Err(error) => {
                self.cursor.invalidate();
                Err(error)
            }
        }
    }

    fn execute(&mut self, plan: &SeekPlan) -> Result<DecodedPicture, D2vError> {
        let decode = self.cursor.decode_plan(plan);

        if let Some(target) = decode.seek {
            log::debug!(
                "Seeking to file {} @ {} for frame {} (skip {})",
                target.file,
                target.position,
                plan.frame_number,
                decode.skip
            );
            self.backend.reopen(&target)?;
            self.backend.flush()?;
        }

        let mut last = None;
        for _ in 0..decode.pictures_to_decode() {
            let decoded = self.backend.decode_next()?.ok_or(
                D2vError::UnexpectedEndOfStream {
                    frame_number: plan.frame_number,
                },
            )?;
            last = Some(decoded);
        }

        let decoded = last.ok_or(D2vError::UnexpectedEndOfStream {
            frame_number: plan.frame_number,
        })?;
        if decoded.picture.is_empty() {
            return Err(D2vError::StructuralInconsistency(
                "Seek pattern broke d2vsource".to_string(),
            ));
        }

        log::trace!("Decoded frame {}", plan.frame_number);
        Ok(decoded)
    }
}
