//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::{
    cell::RefCell,
    collections::HashMap,
    path::Path,
    rc::Rc,
};

use d2vsource::{
    D2vError, D2vIndex, DecodedPicture, DecoderBackend, Picture, PictureType, Plane, SeekTarget,
};

/// Index path used when parsing from memory.
pub const INDEX_PATH: &str = "/fixtures/movie.d2v";

/// Default header for a small MPEG-2 program stream.
pub const PROGRAM_HEADER: &str = "Stream_Type=1
MPEG_Type=2
iDCT_Algorithm=5
YUVRGB_Scale=1
Picture_Size=24x20
Field_Operation=0
Frame_Rate=29970 (30000/1001)
Location=0,0,0,3a1c";

/// Build an index document with one source file.
pub fn index_document(header: &str, gops: &[&str]) -> String {
    format!(
        "DGIndexProjectFile16\n1\nmovie.vob\n\n{header}\n\n{}\n\nFINISHED  100.00% VIDEO\n",
        gops.join("\n")
    )
}

/// Parse a program-stream index made of `gops`.
pub fn program_index(gops: &[&str]) -> D2vIndex {
    D2vIndex::parse_str(&index_document(PROGRAM_HEADER, gops), Path::new(INDEX_PATH))
        .expect("fixture index should parse")
}

/// Two GOPs: closed `[00 00]`, then open `[80]`.
pub fn worked_example() -> D2vIndex {
    program_index(&["500 5 0 0 0 0 0 00 00 ff", "100 5 0 4096 0 0 0 80 ff"])
}

/// Backend calls in the order they were made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Reopen(SeekTarget),
    Flush,
    Decode,
}

/// Scripted decoder.
///
/// After a reopen it emits pictures tagged with consecutive frame numbers,
/// starting at the first frame of the GOP the target points at. Each
/// picture's luma plane is filled with the low byte of its tag.
pub struct MockBackend {
    gop_starts: HashMap<SeekTarget, usize>,
    width: u32,
    height: u32,
    next_tag: Option<usize>,
    stream_end: Option<usize>,
    empty_pictures: bool,
    calls: Rc<RefCell<Vec<Call>>>,
}

impl MockBackend {
    pub fn new(index: &D2vIndex) -> Self {
        let mut gop_starts = HashMap::new();
        let mut first_frame = 0;
        for gop in index.gops() {
            gop_starts
                .entry(SeekTarget {
                    file: gop.file,
                    position: gop.position,
                })
                .or_insert(first_frame);
            first_frame += gop.frame_count();
        }

        Self {
            gop_starts,
            width: index.aligned_width(),
            height: index.aligned_height(),
            next_tag: None,
            stream_end: None,
            empty_pictures: false,
            calls: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Stop producing pictures once `frames` tags have been emitted.
    pub fn with_stream_end(mut self, frames: usize) -> Self {
        self.stream_end = Some(frames);
        self
    }

    /// Produce pictures without planes.
    pub fn with_empty_pictures(mut self) -> Self {
        self.empty_pictures = true;
        self
    }

    /// Shared handle to the call log, usable after the backend moves.
    pub fn call_log(&self) -> Rc<RefCell<Vec<Call>>> {
        Rc::clone(&self.calls)
    }

    fn picture(&self, tag: usize) -> Picture {
        if self.empty_pictures {
            return Picture {
                width: self.width,
                height: self.height,
                planes: Vec::new(),
            };
        }

        let luma = tag as u8;
        let (width, height) = (self.width as usize, self.height as usize);
        Picture {
            width: self.width,
            height: self.height,
            planes: vec![
                Plane {
                    data: vec![luma; width * height],
                    stride: width,
                    width,
                    height,
                },
                Plane::new(width / 2, height / 2),
                Plane::new(width / 2, height / 2),
            ],
        }
    }
}

impl DecoderBackend for MockBackend {
    fn reopen(&mut self, target: &SeekTarget) -> Result<(), D2vError> {
        self.calls.borrow_mut().push(Call::Reopen(*target));
        let start = self.gop_starts.get(target).copied().ok_or_else(|| {
            D2vError::DecodeBackend(format!("no GOP at {}:{}", target.file, target.position))
        })?;
        self.next_tag = Some(start);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), D2vError> {
        self.calls.borrow_mut().push(Call::Flush);
        Ok(())
    }

    fn decode_next(&mut self) -> Result<Option<DecodedPicture>, D2vError> {
        self.calls.borrow_mut().push(Call::Decode);
        let Some(tag) = self.next_tag else {
            return Err(D2vError::DecodeBackend("decoder not positioned".to_string()));
        };
        if self.stream_end.is_some_and(|end| tag >= end) {
            return Ok(None);
        }

        self.next_tag = Some(tag + 1);
        Ok(Some(DecodedPicture {
            picture: self.picture(tag),
            picture_type: Some(if tag % 3 == 0 {
                PictureType::I
            } else {
                PictureType::B
            }),
        }))
    }
}

/// Number of `Reopen` calls in a log.
pub fn reopen_count(calls: &[Call]) -> usize {
    calls
        .iter()
        .filter(|call| matches!(call, Call::Reopen(_)))
        .count()
}

/// Number of `Decode` calls in a log.
pub fn decode_count(calls: &[Call]) -> usize {
    calls.iter().filter(|call| **call == Call::Decode).count()
}
