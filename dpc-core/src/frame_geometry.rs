//! Detector frame geometry for raw exposure files.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Layout of one raw detector exposure on disk.
///
/// Pixels are little-endian `u16`, row-major. Uses usize for direct
/// compatibility with ndarray indexing; `rows` is the slow axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameGeometry {
    /// Number of pixel rows
    pub rows: usize,
    /// Number of pixel columns
    pub cols: usize,
    /// Bytes to skip before the first pixel (detector header)
    #[serde(default)]
    pub header_bytes: usize,
    /// Bytes from the start of one row to the next, if rows are padded
    #[serde(default)]
    pub stride: Option<usize>,
}

impl FrameGeometry {
    /// Geometry of a headerless, unpadded frame.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            header_bytes: 0,
            stride: None,
        }
    }

    pub fn with_header_bytes(mut self, header_bytes: usize) -> Self {
        self.header_bytes = header_bytes;
        self
    }

    pub fn with_stride(mut self, stride: usize) -> Self {
        self.stride = Some(stride);
        self
    }

    /// Get total number of pixels
    pub fn pixel_count(&self) -> usize {
        self.rows * self.cols
    }

    /// Bytes of pixel data in one row
    pub fn row_bytes(&self) -> usize {
        self.cols * std::mem::size_of::<u16>()
    }

    /// Bytes from one row start to the next
    pub fn row_stride(&self) -> usize {
        self.stride.unwrap_or_else(|| self.row_bytes())
    }

    /// Minimum file size that holds the header and every pixel
    pub fn required_bytes(&self) -> usize {
        if self.rows == 0 {
            return self.header_bytes;
        }
        self.header_bytes + (self.rows - 1) * self.row_stride() + self.row_bytes()
    }

    /// Shape as used by ndarray, (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }
}

impl fmt::Display for FrameGeometry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}x{}", self.rows, self.cols)
    }
}
