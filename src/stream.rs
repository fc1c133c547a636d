//! The logical byte stream formed by concatenating the source files.
//!
//! Index GOP positions are `(file, offset)` pairs. Demuxers, however, read a
//! single continuous stream that may cross file boundaries (a DVD split into
//! `VTS_01_1.VOB`, `VTS_01_2.VOB`, ...). [`global_to_local`] and
//! [`local_to_global`] translate between the two address spaces, and
//! [`MultiFileReader`] presents the files as one `Read + Seek` stream
//! starting at a chosen GOP.

use std::{
    fs::File,
    io::{Error as IoError, ErrorKind, Read, Seek, SeekFrom},
    path::{Path, PathBuf},
};

use crate::error::D2vError;

/// One physical file of the logical stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path on disk.
    pub path: PathBuf,
    /// Length in bytes. Never zero.
    pub length: u64,
}

impl SourceFile {
    /// Stat a file and record its length.
    ///
    /// # Errors
    ///
    /// Returns [`D2vError::CannotOpen`] if the file cannot be inspected or is
    /// empty.
    pub fn stat<P: AsRef<Path>>(path: P) -> Result<Self, D2vError> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path).map_err(|error| D2vError::CannotOpen {
            path: path.to_path_buf(),
            reason: error.to_string(),
        })?;

        if metadata.len() == 0 {
            return Err(D2vError::CannotOpen {
                path: path.to_path_buf(),
                reason: "file is empty".to_string(),
            });
        }

        Ok(Self {
            path: path.to_path_buf(),
            length: metadata.len(),
        })
    }
}

/// A seek destination: a GOP's first packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SeekTarget {
    /// Index of the source file.
    pub file: usize,
    /// Byte offset within that file.
    pub position: u64,
}

/// Total length of the logical stream.
pub fn total_length(files: &[SourceFile]) -> u64 {
    files.iter().map(|file| file.length).sum()
}

/// Map a logical offset to `(file index, offset within file)`.
///
/// An offset that falls exactly on a file boundary maps to the start of the
/// following file. Returns `None` for offsets at or past the end.
pub fn global_to_local(files: &[SourceFile], global_offset: u64) -> Option<(usize, u64)> {
    let mut remaining = global_offset;
    for (index, file) in files.iter().enumerate() {
        if remaining < file.length {
            return Some((index, remaining));
        }
        remaining -= file.length;
    }
    None
}

/// Map `(file index, offset within file)` to a logical offset.
///
/// Returns `None` if the file index is out of range or the local offset
/// lies past the end of that file.
pub fn local_to_global(files: &[SourceFile], file: usize, local_offset: u64) -> Option<u64> {
    let length = files.get(file)?.length;
    if local_offset > length {
        return None;
    }
    Some(files[..file].iter().map(|f| f.length).sum::<u64>() + local_offset)
}

/// Reads the concatenated source files as one stream.
///
/// Stream position 0 is the current origin, set by
/// [`seek_to_target`](MultiFileReader::seek_to_target); the reader never
/// exposes bytes before it. Reads that hit the end of one file continue
/// transparently in the next.
#[derive(Debug)]
pub struct MultiFileReader {
    files: Vec<SourceFile>,
    handles: Vec<File>,
    /// Logical offset of stream position 0.
    origin: u64,
    /// Current position relative to `origin`.
    position: u64,
    /// File the OS handle cursor currently sits in, if positioned.
    current_file: Option<usize>,
}

impl MultiFileReader {
    /// Open every source file and record its length.
    ///
    /// # Errors
    ///
    /// Returns [`D2vError::CannotOpen`] for a missing, unreadable or empty
    /// file.
    pub fn open<P: AsRef<Path>>(paths: &[P]) -> Result<Self, D2vError> {
        let mut files = Vec::with_capacity(paths.len());
        let mut handles = Vec::with_capacity(paths.len());

        for path in paths {
            let source = SourceFile::stat(path)?;
            let handle = File::open(&source.path).map_err(|error| D2vError::CannotOpen {
                path: source.path.clone(),
                reason: error.to_string(),
            })?;
            log::debug!(
                "Opened source file {} ({} bytes)",
                source.path.display(),
                source.length
            );
            files.push(source);
            handles.push(handle);
        }

        Ok(Self {
            files,
            handles,
            origin: 0,
            position: 0,
            current_file: None,
        })
    }

    /// Source files in stream order.
    pub fn files(&self) -> &[SourceFile] {
        &self.files
    }

    /// Move the origin to a GOP's first packet and rewind to it.
    ///
    /// # Errors
    ///
    /// Returns [`D2vError::StructuralInconsistency`] if the target lies
    /// outside the source files.
    pub fn seek_to_target(&mut self, target: SeekTarget) -> Result<(), D2vError> {
        let origin = local_to_global(&self.files, target.file, target.position).ok_or_else(
            || {
                D2vError::StructuralInconsistency(format!(
                    "seek target {}:{} lies outside the source files",
                    target.file, target.position
                ))
            },
        )?;

        self.origin = origin;
        self.position = 0;
        self.current_file = None;
        Ok(())
    }

    /// Bytes available from the origin to the end of the last file.
    pub fn len(&self) -> u64 {
        total_length(&self.files).saturating_sub(self.origin)
    }

    /// Returns `true` when nothing remains past the origin.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Position the OS handle for the current logical position.
    fn sync_handle(&mut self) -> std::io::Result<Option<usize>> {
        let Some((file, local)) = global_to_local(&self.files, self.origin + self.position) else {
            return Ok(None);
        };
        self.handles[file].seek(SeekFrom::Start(local))?;
        self.current_file = Some(file);
        Ok(Some(file))
    }
}

impl Read for MultiFileReader {
    fn read(&mut self, buffer: &mut [u8]) -> std::io::Result<usize> {
        let mut filled = 0;

        while filled < buffer.len() {
            let file = match self.current_file {
                Some(file) => file,
                None => match self.sync_handle()? {
                    Some(file) => file,
                    None => break,
                },
            };

            let count = self.handles[file].read(&mut buffer[filled..])?;
            if count == 0 {
                if file + 1 >= self.handles.len() {
                    break;
                }
                // Continue at the start of the next file.
                self.handles[file + 1].seek(SeekFrom::Start(0))?;
                self.current_file = Some(file + 1);
                continue;
            }

            filled += count;
            self.position += count as u64;
        }

        Ok(filled)
    }
}

impl Seek for MultiFileReader {
    fn seek(&mut self, position: SeekFrom) -> std::io::Result<u64> {
        let target = match position {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => self.len().checked_add_signed(delta),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
        }
        .ok_or_else(|| {
            IoError::new(
                ErrorKind::InvalidInput,
                "seek before the start of the stream",
            )
        })?;

        self.position = target;
        self.current_file = None;
        Ok(target)
    }
}
