//! Session configuration.
//!
//! [`SessionOptions`] is a builder carrying the decode settings shared by
//! [`DecodeSession`](crate::DecodeSession) and
//! [`RffSession`](crate::RffSession).
//!
//! # Example
//!
//! ```
//! use d2vsource::SessionOptions;
//!
//! let options = SessionOptions::new()
//!     .with_threads(4)
//!     .with_no_crop(true)
//!     .with_linear_threshold(8);
//! assert_eq!(options.threads(), 4);
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};

/// Options for a decode session.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Decoder threads. 0 lets the decoder choose.
    pub(crate) threads: usize,
    /// Keep the aligned decode size instead of cropping.
    pub(crate) no_crop: bool,
    /// Honour repeat-field flags.
    pub(crate) apply_rff: bool,
    /// Forward gap served by decoding through instead of seeking.
    pub(crate) linear_threshold: usize,
}

impl Debug for SessionOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("SessionOptions")
            .field("threads", &self.threads)
            .field("no_crop", &self.no_crop)
            .field("apply_rff", &self.apply_rff)
            .field("linear_threshold", &self.linear_threshold)
            .finish()
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionOptions {
    /// Create options with default settings.
    ///
    /// Defaults: automatic threading, cropping to the declared size,
    /// repeat-field flags honoured, no read-ahead.
    pub fn new() -> Self {
        Self {
            threads: 0,
            no_crop: false,
            apply_rff: true,
            linear_threshold: 0,
        }
    }

    /// Set the number of decoder threads. 0 means automatic.
    #[must_use]
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Return pictures at the aligned decode size rather than cropping them
    /// to the declared picture size.
    #[must_use]
    pub fn with_no_crop(mut self, no_crop: bool) -> Self {
        self.no_crop = no_crop;
        self
    }

    /// Choose whether repeat-field flags are applied. Defaults to `true`.
    #[must_use]
    pub fn with_apply_rff(mut self, apply_rff: bool) -> Self {
        self.apply_rff = apply_rff;
        self
    }

    /// Set the read-ahead window.
    ///
    /// When a request lands fewer than `frames` past the last decoded
    /// frame, the intermediate frames are decoded in order instead of
    /// seeking. A gap of exactly `frames` seeks.
    #[must_use]
    pub fn with_linear_threshold(mut self, frames: usize) -> Self {
        self.linear_threshold = frames;
        self
    }

    /// Decoder threads.
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Whether pictures keep the aligned decode size.
    pub fn no_crop(&self) -> bool {
        self.no_crop
    }

    /// Whether repeat-field flags are applied.
    pub fn apply_rff(&self) -> bool {
        self.apply_rff
    }

    /// Read-ahead window in frames.
    pub fn linear_threshold(&self) -> usize {
        self.linear_threshold
    }
}
