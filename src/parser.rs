//! D2V text parser.
//!
//! The document is line oriented. After a version line and the list of
//! source files comes a blank separator, a `key=value` header block closed
//! by a blank line, and finally one whitespace-separated record per GOP:
//!
//! ```text
//! DGIndexProjectFile16
//! 1
//! /video/movie.m2v
//!
//! Stream_Type=0
//! MPEG_Type=2
//! iDCT_Algorithm=5
//! YUVRGB_Scale=1
//! Picture_Size=720x480
//! Frame_Rate=29970 (30000/1001)
//! Location=0,0,0,3a1c
//!
//! 900 5 0 0 0 0 0 d2 b2 b2 d2 b2 b2
//! 800 5 0 18432 0 0 0 52 32 32 52 32 32 ff
//!
//! FINISHED  100.00% VIDEO
//! ```
//!
//! Numeric fields follow the indexer's conventions exactly: GOP `info`,
//! frame flags, the transport PID and the `Location` offsets are
//! hexadecimal, everything else is decimal.

use std::{
    fs::File,
    io::{BufRead, BufReader, Cursor},
    path::{Path, PathBuf},
};

use crate::{
    error::D2vError,
    index::{
        CodecType, ColorRange, D2vIndex, END_OF_STREAM_FLAG, Frame, FrameRate, Gop, GopFlags,
        IdctAlgorithm, Location, StreamType,
    },
};

/// Project-file version written by current indexers.
pub const D2V_VERSION: &str = "16";
/// Alternate version tag accepted for older index files.
pub const D2V_LEGACY_VERSION: &str = "42";

/// Byte offset of the version digits in `DGIndexProjectFileNN`.
const VERSION_OFFSET: usize = 18;

impl D2vIndex {
    /// Open and parse an index document.
    ///
    /// Relative source file paths inside the index are resolved against the
    /// index's own directory.
    ///
    /// # Errors
    ///
    /// Returns [`D2vError::CannotOpen`] if the file cannot be read, or any
    /// of the parse errors described on [`D2vIndex::from_reader`].
    ///
    /// # Example
    ///
    /// ```no_run
    /// use d2vsource::{D2vError, D2vIndex};
    ///
    /// let index = D2vIndex::open("movie.d2v")?;
    /// println!("{} frames, {} GOPs", index.frame_count(), index.gops().len());
    /// # Ok::<(), D2vError>(())
    /// ```
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, D2vError> {
        let path = path.as_ref();
        log::debug!("Opening D2V index: {}", path.display());

        let file = File::open(path).map_err(|error| D2vError::CannotOpen {
            path: path.to_path_buf(),
            reason: error.to_string(),
        })?;

        Self::from_reader(BufReader::new(file), path)
    }

    /// Parse an index document from a buffered reader.
    ///
    /// `index_path` is only used to resolve relative source file paths.
    ///
    /// # Errors
    ///
    /// - [`D2vError::UnsupportedVersion`] for an unknown version line.
    /// - [`D2vError::MalformedStructure`] for a bad file count, an empty file
    ///   entry or a missing blank separator.
    /// - [`D2vError::InvalidHeaderField`] when header validation fails.
    /// - [`D2vError::MalformedGopRecord`] for an unparsable GOP line.
    /// - [`D2vError::EmptyIndex`] when no frames were found.
    pub fn from_reader<R: BufRead>(reader: R, index_path: &Path) -> Result<Self, D2vError> {
        let mut lines = LineReader::new(reader);
        let index = parse_index(&mut lines, index_path)?;

        log::debug!(
            "Parsed D2V index: {} file(s), {} GOP(s), {} frame(s), {}x{} @ {}",
            index.files.len(),
            index.gops.len(),
            index.frames.len(),
            index.width,
            index.height,
            index.frame_rate,
        );

        Ok(index)
    }

    /// Parse an index document held in memory.
    pub fn parse_str(text: &str, index_path: &Path) -> Result<Self, D2vError> {
        Self::from_reader(Cursor::new(text.as_bytes()), index_path)
    }
}

/// Line source that strips trailing carriage returns and reports an empty
/// line once the input is exhausted.
struct LineReader<R> {
    reader: R,
    buffer: Vec<u8>,
    line_number: usize,
    exhausted: bool,
}

impl<R: BufRead> LineReader<R> {
    fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: Vec::new(),
            line_number: 0,
            exhausted: false,
        }
    }

    fn next_line(&mut self) -> Result<String, D2vError> {
        self.buffer.clear();
        if !self.exhausted && self.reader.read_until(b'\n', &mut self.buffer)? == 0 {
            self.exhausted = true;
        }
        self.line_number += 1;

        if self.buffer.last() == Some(&b'\n') {
            self.buffer.pop();
        }
        if self.buffer.last() == Some(&b'\r') {
            self.buffer.pop();
        }

        Ok(String::from_utf8_lossy(&self.buffer).into_owned())
    }
}

fn parse_index<R: BufRead>(
    lines: &mut LineReader<R>,
    index_path: &Path,
) -> Result<D2vIndex, D2vError> {
    let version_line = lines.next_line()?;
    let version = version_line
        .get(VERSION_OFFSET..version_line.len().min(VERSION_OFFSET + 2))
        .unwrap_or_default();
    if version != D2V_VERSION && version != D2V_LEGACY_VERSION {
        return Err(D2vError::UnsupportedVersion(version_line));
    }

    let file_count = parse_decimal(&lines.next_line()?)
        .filter(|&count| count > 0)
        .ok_or_else(|| D2vError::MalformedStructure("invalid file count".to_string()))?;

    let mut files = Vec::with_capacity(file_count.min(64) as usize);
    for _ in 0..file_count {
        let entry = lines.next_line()?;
        if entry.is_empty() {
            return Err(D2vError::MalformedStructure(
                "invalid file entry".to_string(),
            ));
        }
        files.push(resolve_source_path(index_path, &entry));
    }

    if !lines.next_line()?.is_empty() {
        return Err(D2vError::MalformedStructure(
            "missing blank line after the file list".to_string(),
        ));
    }

    let mut header = HeaderFields::default();
    loop {
        let line = lines.next_line()?;
        if line.is_empty() {
            break;
        }
        header.apply(&line)?;
    }
    let header = header.validate()?;

    let (gops, frames) = parse_gops(lines, files.len())?;
    if frames.is_empty() || gops.is_empty() {
        return Err(D2vError::EmptyIndex);
    }

    Ok(D2vIndex {
        files,
        stream_type: header.stream_type,
        transport_pid: header.transport_pid,
        codec: header.codec,
        idct_algorithm: header.idct_algorithm,
        color_range: header.color_range,
        width: header.width,
        height: header.height,
        frame_rate: header.frame_rate,
        location: header.location,
        gops,
        frames,
    })
}

/// Header values as they are read, before validation.
#[derive(Debug, Default)]
struct HeaderFields {
    stream_type: Option<StreamType>,
    transport_pid: Option<u32>,
    mpeg_type: i64,
    idct_algorithm: IdctAlgorithm,
    color_range: ColorRange,
    width: i64,
    height: i64,
    fps_numerator: i64,
    fps_denominator: i64,
    location: Option<Location>,
}

/// Header values after validation.
#[derive(Debug)]
struct Header {
    stream_type: StreamType,
    transport_pid: Option<u32>,
    codec: CodecType,
    idct_algorithm: IdctAlgorithm,
    color_range: ColorRange,
    width: u32,
    height: u32,
    frame_rate: FrameRate,
    location: Location,
}

impl HeaderFields {
    fn apply(&mut self, line: &str) -> Result<(), D2vError> {
        let (key, value) = line.split_once('=').unwrap_or((line, ""));

        match key {
            "Stream_Type" => {
                let stream_type = parse_decimal(value)
                    .and_then(StreamType::from_index)
                    .ok_or_else(|| invalid_field("stream type"))?;
                self.stream_type = Some(stream_type);
            }
            "MPEG2_Transport_PID" => {
                let first = value.split(',').next().unwrap_or_default().trim();
                self.transport_pid = u32::from_str_radix(first, 16).ok();
            }
            "MPEG_Type" => {
                self.mpeg_type = parse_decimal(value).unwrap_or(0);
            }
            "iDCT_Algorithm" => {
                self.idct_algorithm = parse_decimal(value)
                    .and_then(IdctAlgorithm::from_index)
                    .ok_or_else(|| invalid_field("iDCT algorithm"))?;
            }
            "YUVRGB_Scale" => {
                self.color_range = parse_decimal(value)
                    .and_then(ColorRange::from_index)
                    .ok_or_else(|| invalid_field("YUVRGB scale"))?;
            }
            "Picture_Size" => {
                let (width, height) = value.split_once('x').unwrap_or((value, ""));
                self.width = parse_decimal(width).unwrap_or(0);
                self.height = parse_decimal(height).unwrap_or(0);
            }
            "Frame_Rate" => {
                let inner = match value.find('(') {
                    Some(start) => &value[start + 1..],
                    None => value,
                };
                let inner = inner.split(')').next().unwrap_or_default();
                let (numerator, denominator) = inner.split_once('/').unwrap_or((inner, ""));
                self.fps_numerator = parse_decimal(numerator).unwrap_or(0);
                self.fps_denominator = parse_decimal(denominator).unwrap_or(0);
            }
            "Location" => {
                self.location = parse_location(value);
            }
            _ => {}
        }

        Ok(())
    }

    fn validate(self) -> Result<Header, D2vError> {
        if self.fps_numerator <= 0 || self.fps_denominator <= 0 {
            return Err(invalid_field("framerate"));
        }
        let codec = CodecType::from_mpeg_type(self.mpeg_type)
            .ok_or_else(|| invalid_field("MPEG type"))?;
        if self.width <= 0 || self.height <= 0 {
            return Err(invalid_field("dimensions"));
        }
        let stream_type = self
            .stream_type
            .ok_or_else(|| invalid_field("stream type"))?;
        if stream_type == StreamType::Transport && self.transport_pid.is_none() {
            return Err(invalid_field("PID"));
        }
        let location = self
            .location
            .filter(Location::is_consistent)
            .ok_or_else(|| invalid_field("location"))?;

        // The decoder works at 16x32-aligned sizes, which must stay in range.
        let width = u32::try_from(self.width)
            .ok()
            .filter(|width| width.checked_next_multiple_of(16).is_some())
            .ok_or_else(|| invalid_field("dimensions"))?;
        let height = u32::try_from(self.height)
            .ok()
            .filter(|height| height.checked_next_multiple_of(32).is_some())
            .ok_or_else(|| invalid_field("dimensions"))?;

        Ok(Header {
            stream_type,
            transport_pid: self.transport_pid,
            codec,
            idct_algorithm: self.idct_algorithm,
            color_range: self.color_range,
            width,
            height,
            frame_rate: FrameRate {
                numerator: u32::try_from(self.fps_numerator)
                    .map_err(|_| invalid_field("framerate"))?,
                denominator: u32::try_from(self.fps_denominator)
                    .map_err(|_| invalid_field("framerate"))?,
            },
            location,
        })
    }
}

fn invalid_field(name: &str) -> D2vError {
    D2vError::InvalidHeaderField(name.to_string())
}

/// `startFile,startOffset,endFile,endOffset` with hexadecimal offsets.
fn parse_location(value: &str) -> Option<Location> {
    let mut fields = value.split(',').map(str::trim);
    let start_file = fields.next()?.parse().ok()?;
    let start_offset = u64::from_str_radix(fields.next()?, 16).ok()?;
    let end_file = fields.next()?.parse().ok()?;
    let end_offset = u64::from_str_radix(fields.next()?, 16).ok()?;

    Some(Location {
        start_file,
        start_offset,
        end_file,
        end_offset,
    })
}

/// Read GOP records up to the first blank line.
fn parse_gops<R: BufRead>(
    lines: &mut LineReader<R>,
    file_count: usize,
) -> Result<(Vec<Gop>, Vec<Frame>), D2vError> {
    let mut gops: Vec<Gop> = Vec::new();
    let mut frames: Vec<Frame> = Vec::new();

    loop {
        let line = lines.next_line()?;
        if line.trim().is_empty() {
            break;
        }
        let line_number = lines.line_number;

        let gop_index = gops.len();
        let mut gop = parse_gop_record(&line, line_number)?;

        frames.extend((0..gop.flags.len()).map(|offset| Frame {
            gop: gop_index,
            offset,
        }));

        // The sentinel terminates the stream; it is not a coded frame.
        if gop.flags.last() == Some(&END_OF_STREAM_FLAG) {
            gop.flags.pop();
            frames.pop();
        }

        if gop.file >= file_count {
            log::warn!(
                "GOP {gop_index} on line {line_number} references file {} but the index lists {file_count}",
                gop.file,
            );
        }

        gops.push(gop);
    }

    Ok((gops, frames))
}

fn parse_gop_record(line: &str, line_number: usize) -> Result<Gop, D2vError> {
    let mut tokens = line.split_whitespace();
    let mut field = |name: &str| {
        tokens.next().ok_or_else(|| D2vError::MalformedGopRecord {
            line: line_number,
            reason: format!("missing {name} field"),
        })
    };
    let malformed = |name: &str, token: &str| D2vError::MalformedGopRecord {
        line: line_number,
        reason: format!("invalid {name} field {token:?}"),
    };

    let info = field("info")?;
    let info = u16::from_str_radix(info, 16).map_err(|_| malformed("info", info))?;
    let matrix = field("matrix")?;
    let matrix = matrix.parse().map_err(|_| malformed("matrix", matrix))?;
    let file = field("file")?;
    let file = file.parse().map_err(|_| malformed("file", file))?;
    let position = field("position")?;
    let position = position.parse().map_err(|_| malformed("position", position))?;
    let skip = field("skip")?;
    let skip = skip.parse().map_err(|_| malformed("skip", skip))?;
    let vob = field("vob")?;
    let vob = vob.parse().map_err(|_| malformed("vob", vob))?;
    let cell = field("cell")?;
    let cell = cell.parse().map_err(|_| malformed("cell", cell))?;

    let flags = tokens
        .map(|token| {
            // Parsed wider than a byte so oversized values are caught.
            let value = u16::from_str_radix(token, 16).map_err(|_| malformed("flag", token))?;
            u8::try_from(value).map_err(|_| D2vError::MalformedGopRecord {
                line: line_number,
                reason: format!("flag {token:?} is wider than one byte"),
            })
        })
        .collect::<Result<Vec<u8>, D2vError>>()?;

    Ok(Gop {
        info: GopFlags::from_bits_retain(info),
        matrix,
        file,
        position,
        skip,
        vob,
        cell,
        flags,
    })
}

/// Parse a leading decimal integer the way `atoi` does: leading whitespace
/// and trailing garbage are ignored, but at least one digit is required.
fn parse_decimal(value: &str) -> Option<i64> {
    let value = value.trim_start();
    let (negative, digits) = match value.as_bytes().first() {
        Some(b'-') => (true, &value[1..]),
        Some(b'+') => (false, &value[1..]),
        _ => (false, value),
    };
    let end = digits
        .bytes()
        .position(|byte| !byte.is_ascii_digit())
        .unwrap_or(digits.len());
    let magnitude: i64 = digits[..end].parse().ok()?;

    Some(if negative { -magnitude } else { magnitude })
}

/// Returns `true` for `/path`, `\path` and `C:...` style entries.
fn is_absolute_entry(entry: &str) -> bool {
    let bytes = entry.as_bytes();
    matches!(bytes.first(), Some(b'/') | Some(b'\\')) || bytes.get(1) == Some(&b':')
}

/// Resolve a source file entry against the directory holding the index.
pub fn resolve_source_path(index_path: &Path, entry: &str) -> PathBuf {
    if is_absolute_entry(entry) {
        return PathBuf::from(entry);
    }

    match index_path.parent() {
        Some(directory) if !directory.as_os_str().is_empty() => directory.join(entry),
        _ => PathBuf::from(entry),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_parsing_matches_atoi() {
        assert_eq!(parse_decimal("42"), Some(42));
        assert_eq!(parse_decimal("  7 trailing"), Some(7));
        assert_eq!(parse_decimal("-3"), Some(-3));
        assert_eq!(parse_decimal("29970 (30000/1001)"), Some(29970));
        assert_eq!(parse_decimal("abc"), None);
        assert_eq!(parse_decimal(""), None);
    }

    #[test]
    fn absolute_entries_are_kept() {
        let index = Path::new("/videos/index/movie.d2v");
        assert_eq!(
            resolve_source_path(index, "/mnt/a.m2v"),
            PathBuf::from("/mnt/a.m2v")
        );
        assert_eq!(
            resolve_source_path(index, "D:\\rips\\a.vob"),
            PathBuf::from("D:\\rips\\a.vob")
        );
    }

    #[test]
    fn relative_entries_join_the_index_directory() {
        assert_eq!(
            resolve_source_path(Path::new("/videos/index/movie.d2v"), "a.m2v"),
            PathBuf::from("/videos/index/a.m2v")
        );
        assert_eq!(
            resolve_source_path(Path::new("movie.d2v"), "a.m2v"),
            PathBuf::from("a.m2v")
        );
    }

    #[test]
    fn location_requires_four_fields() {
        let location = parse_location("0,800,1,1a").unwrap();
        assert_eq!(location.start_offset, 0x800);
        assert_eq!(location.end_file, 1);
        assert_eq!(location.end_offset, 0x1a);
        assert!(parse_location("0,800,1").is_none());
    }

    #[test]
    fn gop_record_fields() {
        let gop = parse_gop_record("f00 5 1 18432 0 2 3 d2 b2 ff", 9).unwrap();
        assert!(gop.is_closed());
        assert!(gop.is_progressive_sequence());
        assert_eq!(gop.matrix, 5);
        assert_eq!(gop.file, 1);
        assert_eq!(gop.position, 18432);
        assert_eq!(gop.vob, 2);
        assert_eq!(gop.cell, 3);
        assert_eq!(gop.flags, vec![0xd2, 0xb2, 0xff]);
    }

    #[test]
    fn gop_record_rejects_missing_fields() {
        let error = parse_gop_record("400 5 0", 12).unwrap_err();
        assert!(matches!(error, D2vError::MalformedGopRecord { line: 12, .. }));
    }
}
