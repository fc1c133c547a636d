//! FFmpeg decoder backend.
//!
//! [`FfmpegBackend`] feeds libavformat from a [`MultiFileReader`] through a
//! custom AVIO context, so the demuxer sees one continuous stream starting
//! at the requested GOP regardless of how the source is split across files.
//! The demuxer is forced by stream type rather than probed, since a stream
//! that starts mid-file has no usable header to probe.
//!
//! FFmpeg's own console output is silenced the first time a backend is
//! opened. Use [`set_ffmpeg_log_level`] afterwards to change that.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use d2vsource::{D2vIndex, DecodeSession, FfmpegBackend, SessionOptions};
//!
//! let index = Arc::new(D2vIndex::open("movie.d2v")?);
//! let options = SessionOptions::new().with_threads(2);
//! let backend = FfmpegBackend::open(&index, &options)?;
//! let mut session = DecodeSession::new(index, backend, options);
//! let frame = session.frame(0)?;
//! # Ok::<(), d2vsource::D2vError>(())
//! ```

use std::{
    ffi::{CStr, c_int, c_void},
    io::{Read, Seek, SeekFrom},
    ptr,
    sync::Once,
};

use ffmpeg_next::{
    Error as FfmpegError, Packet,
    codec::{Id as CodecId, context::Context as CodecContext},
    decoder::Video as VideoDecoder,
    format::context::Input,
    frame::Video as RawFrame,
    media::Type as MediaType,
    picture::Type as RawPictureType,
    util::{error::EAGAIN, log::Level},
};
use ffmpeg_sys_next::{AVFormatContext, AVIOContext};

use crate::{
    backend::{DecodedPicture, DecoderBackend},
    configuration::SessionOptions,
    error::D2vError,
    index::{CodecType, D2vIndex, IdctAlgorithm, StreamType},
    picture::{Picture, PictureType, Plane},
    stream::{MultiFileReader, SeekTarget},
};

/// Size of the buffer handed to the AVIO context.
const AVIO_BUFFER_SIZE: usize = 32 * 1024;

const SEEK_SET: c_int = 0;
const SEEK_CUR: c_int = 1;
const SEEK_END: c_int = 2;
const AVSEEK_SIZE: c_int = 0x10000;
const AVSEEK_FORCE: c_int = 0x20000;
const AVERROR_IO: c_int = -5;

const FF_IDCT_AUTO: c_int = 0;
const FF_IDCT_SIMPLEMMX: c_int = 3;
const FF_IDCT_XVID: c_int = 14;

static SILENCE_FFMPEG: Once = Once::new();

/// FFmpeg internal log verbosity level.
///
/// Maps directly to FFmpeg's `AV_LOG_*` constants. This controls FFmpeg's
/// console output only, not messages emitted through the `log` crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FfmpegLogLevel {
    /// Print no output at all.
    Quiet,
    /// Only unrecoverable conditions that abort the process.
    Panic,
    /// Only unrecoverable errors.
    Fatal,
    /// Recoverable errors.
    Error,
    /// Warnings (FFmpeg's default).
    Warning,
    /// Informational messages.
    Info,
    /// Verbose informational messages.
    Verbose,
    /// Debugging messages.
    Debug,
    /// Extremely verbose tracing output.
    Trace,
}

impl FfmpegLogLevel {
    fn to_ffmpeg_level(self) -> Level {
        match self {
            FfmpegLogLevel::Quiet => Level::Quiet,
            FfmpegLogLevel::Panic => Level::Panic,
            FfmpegLogLevel::Fatal => Level::Fatal,
            FfmpegLogLevel::Error => Level::Error,
            FfmpegLogLevel::Warning => Level::Warning,
            FfmpegLogLevel::Info => Level::Info,
            FfmpegLogLevel::Verbose => Level::Verbose,
            FfmpegLogLevel::Debug => Level::Debug,
            FfmpegLogLevel::Trace => Level::Trace,
        }
    }
}

/// Set the FFmpeg internal log verbosity level.
pub fn set_ffmpeg_log_level(level: FfmpegLogLevel) {
    ffmpeg_next::util::log::set_level(level.to_ffmpeg_level());
}

/// Decoder selector value for the recorded IDCT hint.
///
/// The libmpeg2 MMX IDCT is not available in current FFmpeg releases and
/// falls back to automatic selection.
fn idct_selector(algorithm: IdctAlgorithm) -> c_int {
    match algorithm {
        IdctAlgorithm::Auto | IdctAlgorithm::LibMpeg2Mmx => FF_IDCT_AUTO,
        IdctAlgorithm::XvidMmx => FF_IDCT_XVID,
        IdctAlgorithm::SimpleMmx => FF_IDCT_SIMPLEMMX,
    }
}

/// Demuxer name and placeholder URL for a stream layout.
/// Transport PID to select the stream by. The indexer writes 0 for "none".
fn selected_pid(transport_pid: Option<u32>) -> Option<u32> {
    transport_pid.filter(|&pid| pid > 0)
}

fn demuxer_for(
    stream_type: StreamType,
    codec: CodecType,
) -> Result<(&'static CStr, &'static CStr), D2vError> {
    match (stream_type, codec) {
        (StreamType::Elementary, CodecType::H264) => Ok((c"h264", c"fakevideo.h264")),
        (StreamType::Elementary, _) => Ok((c"mpegvideo", c"fakevideo.m2v")),
        (StreamType::Program, _) => Ok((c"mpeg", c"fakevideo.vob")),
        (StreamType::Transport, _) => Ok((c"mpegts", c"fakevideo.ts")),
        (StreamType::Pva, _) => Err(D2vError::DecodeBackend(
            "Unsupported format.".to_string(),
        )),
    }
}

fn codec_id(codec: CodecType) -> CodecId {
    match codec {
        CodecType::Mpeg1 => CodecId::MPEG1VIDEO,
        CodecType::Mpeg2 => CodecId::MPEG2VIDEO,
        CodecType::H264 => CodecId::H264,
    }
}

unsafe extern "C" fn read_packet(opaque: *mut c_void, buffer: *mut u8, size: c_int) -> c_int {
    if size <= 0 {
        return 0;
    }
    // SAFETY: `opaque` is the boxed reader owned by the backend, which
    // outlives every demuxer it creates; `buffer` holds `size` bytes.
    let (reader, buffer) = unsafe {
        (
            &mut *opaque.cast::<MultiFileReader>(),
            std::slice::from_raw_parts_mut(buffer, size as usize),
        )
    };

    match reader.read(buffer) {
        Ok(0) => ffmpeg_sys_next::AVERROR_EOF,
        Ok(count) => count as c_int,
        Err(error) => {
            log::debug!("Source read failed: {error}");
            AVERROR_IO
        }
    }
}

unsafe extern "C" fn seek_packet(opaque: *mut c_void, offset: i64, whence: c_int) -> i64 {
    // SAFETY: see `read_packet`.
    let reader = unsafe { &mut *opaque.cast::<MultiFileReader>() };

    if whence & AVSEEK_SIZE != 0 {
        return reader.len() as i64;
    }

    let position = match whence & !AVSEEK_FORCE {
        SEEK_SET if offset >= 0 => SeekFrom::Start(offset as u64),
        SEEK_CUR => SeekFrom::Current(offset),
        SEEK_END => SeekFrom::End(offset),
        _ => return -1,
    };

    reader
        .seek(position)
        .map_or(-1, |position| position as i64)
}

/// Custom AVIO context and its buffer.
struct AvioContext {
    context: *mut AVIOContext,
}

impl AvioContext {
    fn new(reader: &mut MultiFileReader) -> Result<Self, D2vError> {
        // SAFETY: the buffer is handed to the AVIO context, which owns it
        // from then on; both are released in `drop`.
        unsafe {
            let buffer = ffmpeg_sys_next::av_malloc(AVIO_BUFFER_SIZE).cast::<u8>();
            if buffer.is_null() {
                return Err(D2vError::DecodeBackend(
                    "Cannot allocate AVIO buffer.".to_string(),
                ));
            }

            let context = ffmpeg_sys_next::avio_alloc_context(
                buffer,
                AVIO_BUFFER_SIZE as c_int,
                0,
                (reader as *mut MultiFileReader).cast::<c_void>(),
                Some(read_packet),
                None,
                Some(seek_packet),
            );
            if context.is_null() {
                ffmpeg_sys_next::av_free(buffer.cast::<c_void>());
                return Err(D2vError::DecodeBackend(
                    "Cannot allocate AVIO context.".to_string(),
                ));
            }

            Ok(Self { context })
        }
    }
}

impl Drop for AvioContext {
    fn drop(&mut self) {
        // SAFETY: `context` came from `avio_alloc_context` and is freed once.
        unsafe {
            let buffer = ptr::addr_of_mut!((*self.context).buffer);
            if !(*buffer).is_null() {
                ffmpeg_sys_next::av_freep(buffer.cast::<c_void>());
            }
            ffmpeg_sys_next::avio_context_free(&mut self.context);
        }
    }
}

/// An opened demuxer reading through a custom AVIO context.
struct Demuxer {
    // Declared first: the demuxer must close before its I/O context.
    input: Input,
    _avio: AvioContext,
    stream_index: usize,
}

impl Demuxer {
    fn open(
        reader: &mut MultiFileReader,
        stream_type: StreamType,
        codec: CodecType,
        transport_pid: Option<u32>,
    ) -> Result<Self, D2vError> {
        let (format_name, url) = demuxer_for(stream_type, codec)?;
        let avio = AvioContext::new(reader)?;

        // SAFETY: the format context is handed to `avformat_open_input`,
        // which frees it on failure; on success ownership moves into
        // `Input`, whose drop closes it without touching the custom `pb`.
        let input = unsafe {
            let format = ffmpeg_sys_next::av_find_input_format(format_name.as_ptr());
            if format.is_null() {
                return Err(D2vError::DecodeBackend(format!(
                    "Demuxer {} is not available.",
                    format_name.to_string_lossy()
                )));
            }

            let mut context: *mut AVFormatContext = ffmpeg_sys_next::avformat_alloc_context();
            if context.is_null() {
                return Err(D2vError::DecodeBackend(
                    "Cannot allocate AVFormatContext.".to_string(),
                ));
            }
            (*context).pb = avio.context;

            let result = ffmpeg_sys_next::avformat_open_input(
                &mut context,
                url.as_ptr(),
                format,
                ptr::null_mut(),
            );
            if result < 0 {
                return Err(D2vError::DecodeBackend(
                    "Cannot open buffer in libavformat.".to_string(),
                ));
            }

            if ffmpeg_sys_next::avformat_find_stream_info(context, ptr::null_mut()) < 0 {
                log::debug!("Stream info probing failed, continuing with what was found");
            }

            Input::wrap(context)
        };

        let stream_index = match selected_pid(transport_pid) {
            Some(pid) => input
                .streams()
                .find(|stream| stream.id() as i64 == pid as i64)
                .map(|stream| stream.index())
                .ok_or_else(|| {
                    D2vError::DecodeBackend("PID does not exist in source file.".to_string())
                })?,
            None => input
                .streams()
                .find(|stream| stream.parameters().medium() == MediaType::Video)
                .map(|stream| stream.index())
                .ok_or_else(|| D2vError::DecodeBackend("No video stream found.".to_string()))?,
        };

        Ok(Self {
            input,
            _avio: avio,
            stream_index,
        })
    }

    /// Next packet of the selected stream, or `None` at end of stream.
    fn next_packet(&mut self) -> Result<Option<Packet>, D2vError> {
        let mut packet = Packet::empty();
        loop {
            match packet.read(&mut self.input) {
                Ok(()) if packet.stream() == self.stream_index => return Ok(Some(packet)),
                Ok(()) => continue,
                Err(FfmpegError::Eof) => return Ok(None),
                Err(error) => return Err(error.into()),
            }
        }
    }
}

/// [`DecoderBackend`] built on FFmpeg.
pub struct FfmpegBackend {
    demuxer: Option<Demuxer>,
    decoder: VideoDecoder,
    reader: Box<MultiFileReader>,
    stream_type: StreamType,
    codec: CodecType,
    transport_pid: Option<u32>,
    frame: RawFrame,
    eof_sent: bool,
}

impl FfmpegBackend {
    /// Open the source files of `index` and a decoder for its codec.
    ///
    /// # Errors
    ///
    /// Returns [`D2vError::CannotOpen`] for unreadable source files and
    /// [`D2vError::DecodeBackend`] if FFmpeg cannot provide a decoder or the
    /// stream type is unsupported.
    pub fn open(index: &D2vIndex, options: &SessionOptions) -> Result<Self, D2vError> {
        ffmpeg_next::init()?;
        SILENCE_FFMPEG.call_once(|| set_ffmpeg_log_level(FfmpegLogLevel::Panic));

        demuxer_for(index.stream_type(), index.codec())?;
        let reader = Box::new(MultiFileReader::open(index.files())?);

        let codec = ffmpeg_next::decoder::find(codec_id(index.codec())).ok_or_else(|| {
            D2vError::DecodeBackend(format!("No {} decoder available.", index.codec()))
        })?;
        let mut context = CodecContext::new_with_codec(codec);
        // SAFETY: plain field writes on an unopened codec context.
        unsafe {
            let raw = context.as_mut_ptr();
            (*raw).idct_algo = idct_selector(index.idct_algorithm());
            (*raw).thread_count = options.threads() as c_int;
        }
        let decoder = context.decoder().open_as(codec)?.video()?;

        log::debug!(
            "Opened {} decoder for {} stream ({} source file(s), {} thread(s))",
            index.codec(),
            index.stream_type(),
            index.files().len(),
            options.threads()
        );

        Ok(Self {
            demuxer: None,
            decoder,
            reader,
            stream_type: index.stream_type(),
            codec: index.codec(),
            transport_pid: index.transport_pid(),
            frame: RawFrame::empty(),
            eof_sent: false,
        })
    }

    fn picture_from_frame(frame: &RawFrame) -> DecodedPicture {
        let planes = (0..frame.planes())
            .map(|plane| {
                Plane::from_strided(
                    frame.data(plane),
                    frame.stride(plane),
                    frame.plane_width(plane) as usize,
                    frame.plane_height(plane) as usize,
                )
            })
            .collect();

        let picture_type = match frame.kind() {
            RawPictureType::I => Some(PictureType::I),
            RawPictureType::P => Some(PictureType::P),
            RawPictureType::B => Some(PictureType::B),
            _ => None,
        };

        DecodedPicture {
            picture: Picture {
                width: frame.width(),
                height: frame.height(),
                planes,
            },
            picture_type,
        }
    }
}

impl DecoderBackend for FfmpegBackend {
    fn reopen(&mut self, target: &SeekTarget) -> Result<(), D2vError> {
        self.demuxer = None;
        self.reader.seek_to_target(*target)?;
        self.demuxer = Some(Demuxer::open(
            &mut self.reader,
            self.stream_type,
            self.codec,
            self.transport_pid,
        )?);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), D2vError> {
        self.decoder.flush();
        self.eof_sent = false;
        Ok(())
    }

    fn decode_next(&mut self) -> Result<Option<DecodedPicture>, D2vError> {
        let Some(demuxer) = self.demuxer.as_mut() else {
            return Err(D2vError::StructuralInconsistency(
                "decode requested before the demuxer was positioned".to_string(),
            ));
        };

        loop {
            match self.decoder.receive_frame(&mut self.frame) {
                Ok(()) => return Ok(Some(Self::picture_from_frame(&self.frame))),
                Err(FfmpegError::Other { errno }) if errno == EAGAIN => {}
                Err(FfmpegError::Eof) => return Ok(None),
                Err(error) => return Err(error.into()),
            }

            if self.eof_sent {
                return Ok(None);
            }

            match demuxer.next_packet()? {
                Some(packet) => self.decoder.send_packet(&packet)?,
                None => {
                    self.decoder.send_eof()?;
                    self.eof_sent = true;
                }
            }
        }
    }
}
