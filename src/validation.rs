//! Index validation.
//!
//! Provides [`D2vIndex::validate`], which inspects a parsed index for
//! conditions the parser tolerates but that will affect decoding, and
//! returns a [`ValidationReport`].
//!
//! # Example
//!
//! ```no_run
//! use d2vsource::D2vIndex;
//!
//! let index = D2vIndex::open("movie.d2v")?;
//! let report = index.validate();
//! if report.is_valid() {
//!     println!("Index is usable");
//! } else {
//!     for error in &report.errors {
//!         println!("Error: {error}");
//!     }
//! }
//! # Ok::<(), d2vsource::D2vError>(())
//! ```

use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::index::{D2vIndex, FrameFlags};

/// Frame rates above this are reported as suspicious.
const MAX_PLAUSIBLE_FPS: f64 = 240.0;

/// Summary of index validation.
///
/// Contains lists of informational notices, warnings, and errors.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// Informational notices (not problems).
    pub info: Vec<String>,
    /// Issues that make some frames inexact or unusual.
    pub warnings: Vec<String>,
    /// Issues that will make decoding fail.
    pub errors: Vec<String>,
}

impl ValidationReport {
    /// Returns `true` if no errors were found. Warnings do not count.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Total number of issues (info + warnings + errors).
    pub fn issue_count(&self) -> usize {
        self.info.len() + self.warnings.len() + self.errors.len()
    }
}

impl Display for ValidationReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        for item in &self.info {
            writeln!(f, "[INFO] {item}")?;
        }
        for item in &self.warnings {
            writeln!(f, "[WARN] {item}")?;
        }
        for item in &self.errors {
            writeln!(f, "[ERROR] {item}")?;
        }
        if self.issue_count() == 0 {
            writeln!(f, "No issues found.")?;
        }
        Ok(())
    }
}

impl D2vIndex {
    /// Run validation checks on this index.
    ///
    /// Checks that need the filesystem are limited to whether each source
    /// file exists.
    pub fn validate(&self) -> ValidationReport {
        validate_index(self)
    }
}

/// Returns `true` for `matrix_coefficients` values outside the ones
/// MPEG-2 and H.264 streams carry in practice.
fn is_unusual_matrix(matrix: u32) -> bool {
    matches!(matrix, 0 | 3) || matrix > 10
}

pub(crate) fn validate_index(index: &D2vIndex) -> ValidationReport {
    let mut report = ValidationReport::default();
    let file_count = index.files().len();

    // Source files
    for path in index.files() {
        if !path.exists() {
            report
                .errors
                .push(format!("Source file {} does not exist", path.display()));
        }
    }

    let location = index.location();
    if location.start_file as usize >= file_count || location.end_file as usize >= file_count {
        report.errors.push(format!(
            "Location refers to file {} of {file_count}",
            location.start_file.max(location.end_file),
        ));
    }

    // GOPs
    for (number, gop) in index.gops().iter().enumerate() {
        if gop.file >= file_count {
            report.errors.push(format!(
                "GOP {number} refers to file {} of {file_count}",
                gop.file,
            ));
        }
        if gop.frame_count() == 0 {
            report
                .warnings
                .push(format!("GOP {number} contains no frames"));
        }
        if is_unusual_matrix(gop.matrix) {
            report.warnings.push(format!(
                "GOP {number} has unusual matrix coefficients ({})",
                gop.matrix,
            ));
        }
    }

    if let Some(first) = index.gops().first() {
        if !first.is_closed() && first.first_independent_offset() > 0 {
            report.warnings.push(format!(
                "First GOP is open: its leading {} frame(s) cannot be decoded exactly",
                first.first_independent_offset().min(first.frame_count()),
            ));
        }
    }

    // Frame rate
    let fps = index.frame_rate().as_f64();
    if fps > MAX_PLAUSIBLE_FPS {
        report
            .warnings
            .push(format!("Unusually high frame rate ({fps:.1} fps)"));
    }

    // Summary
    let closed = index.gops().iter().filter(|gop| gop.is_closed()).count();
    let repeated = index
        .frames()
        .iter()
        .enumerate()
        .filter(|(number, _)| {
            index
                .frame_flags(*number)
                .is_some_and(|flags| flags.contains(FrameFlags::RFF))
        })
        .count();

    report.info.push(format!(
        "Video: {} {} {}x{} @ {} fps, {} frames in {} GOPs ({closed} closed)",
        index.codec(),
        index.stream_type(),
        index.width(),
        index.height(),
        index.frame_rate(),
        index.frame_count(),
        index.gops().len(),
    ));
    if repeated > 0 {
        report
            .info
            .push(format!("{repeated} frame(s) carry the repeat-field flag"));
    }

    report
}
