//! The decoder seam.
//!
//! Sessions drive any type implementing [`DecoderBackend`]. The FFmpeg
//! implementation lives in [`crate::ffmpeg`] behind the `ffmpeg` feature;
//! tests drive sessions with a scripted backend instead.

use crate::{
    error::D2vError,
    picture::{Picture, PictureType},
    stream::SeekTarget,
};

/// A picture produced by a backend, owned by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPicture {
    /// Decoded planes at the decoder's working size.
    pub picture: Picture,
    /// Coding type, if the decoder reported one.
    pub picture_type: Option<PictureType>,
}

/// Demux and decode one video stream.
///
/// Constructing a backend opens the decoder for the index's codec; the
/// session then repositions it with [`reopen`](DecoderBackend::reopen) and
/// pulls pictures one at a time in output order.
pub trait DecoderBackend {
    /// Tear down the demux state and restart reading at `target`.
    fn reopen(&mut self, target: &SeekTarget) -> Result<(), D2vError>;

    /// Drop any pictures buffered inside the decoder.
    fn flush(&mut self) -> Result<(), D2vError>;

    /// Decode the next picture. `Ok(None)` means the stream ran out.
    fn decode_next(&mut self) -> Result<Option<DecodedPicture>, D2vError>;
}

impl<B: DecoderBackend + ?Sized> DecoderBackend for Box<B> {
    fn reopen(&mut self, target: &SeekTarget) -> Result<(), D2vError> {
        (**self).reopen(target)
    }

    fn flush(&mut self) -> Result<(), D2vError> {
        (**self).flush()
    }

    fn decode_next(&mut self) -> Result<Option<DecodedPicture>, D2vError> {
        (**self).decode_next()
    }
}
