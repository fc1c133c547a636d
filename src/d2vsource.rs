//! Core [`D2vSource`] implementation.
//!
//! `D2vSource` is the main entry point: it parses an index, opens a
//! backend and serves frames either in coded order or with repeat-field
//! flags applied, depending on
//! [`SessionOptions::with_apply_rff`](crate::SessionOptions::with_apply_rff).

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    sync::Arc,
};

use crate::{
    backend::DecoderBackend,
    configuration::SessionOptions,
    error::D2vError,
    index::D2vIndex,
    metadata::VideoInfo,
    rff::RffSession,
    session::{DecodeSession, VideoFrame},
};

enum Output<B> {
    Coded(DecodeSession<B>),
    Rff(RffSession<B>),
}

/// Frame source over an indexed MPEG stream.
///
/// # Example
///
/// ```no_run
/// # #[cfg(feature = "ffmpeg")]
/// # fn demo() -> Result<(), d2vsource::D2vError> {
/// use d2vsource::{D2vSource, SessionOptions};
///
/// let mut source = D2vSource::open_ffmpeg("movie.d2v", SessionOptions::new())?;
/// println!("{} frames", source.frame_count());
/// let frame = source.frame(0)?;
/// # Ok(())
/// # }
/// ```
pub struct D2vSource<B> {
    info: VideoInfo,
    output: Output<B>,
}

impl<B> Debug for D2vSource<B> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("D2vSource")
            .field("info", &self.info)
            .field("apply_rff", &matches!(self.output, Output::Rff(_)))
            .finish()
    }
}

impl<B: DecoderBackend> D2vSource<B> {
    /// Build a source from an index and an already opened backend.
    pub fn new(index: Arc<D2vIndex>, backend: B, options: SessionOptions) -> Self {
        let info = VideoInfo::from_index(&index);
        let apply_rff = options.apply_rff();
        let session = DecodeSession::new(index, backend, options);
        let output = if apply_rff {
            Output::Rff(RffSession::new(session))
        } else {
            Output::Coded(session)
        };
        Self { info, output }
    }

    /// Stream summary.
    pub fn info(&self) -> &VideoInfo {
        &self.info
    }

    /// The index.
    pub fn index(&self) -> &D2vIndex {
        match &self.output {
            Output::Coded(session) => session.index(),
            Output::Rff(rff) => rff.session().index(),
        }
    }

    /// Number of frames this source returns.
    pub fn frame_count(&self) -> usize {
        match &self.output {
            Output::Coded(session) => session.frame_count(),
            Output::Rff(rff) => rff.frame_count(),
        }
    }

    /// Fetch output frame `n`.
    ///
    /// # Errors
    ///
    /// See [`DecodeSession::frame`] and [`RffSession::frame`].
    pub fn frame(&mut self, n: usize) -> Result<VideoFrame, D2vError> {
        match &mut self.output {
            Output::Coded(session) => session.frame(n),
            Output::Rff(rff) => rff.frame(n),
        }
    }
}

#[cfg(feature = "ffmpeg")]
impl D2vSource<crate::ffmpeg::FfmpegBackend> {
    /// Parse `path` and open it with the FFmpeg backend.
    ///
    /// # Errors
    ///
    /// Returns any parse error, or a backend error if the stream cannot be
    /// opened for decoding.
    pub fn open_ffmpeg<P: AsRef<std::path::Path>>(
        path: P,
        options: SessionOptions,
    ) -> Result<Self, D2vError> {
        let index = Arc::new(D2vIndex::open(path)?);
        let backend = crate::ffmpeg::FfmpegBackend::open(&index, &options)?;
        Ok(Self::new(index, backend, options))
    }
}
