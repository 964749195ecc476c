//! Raw detector frame reader.
//!
//! Reads exposures stored as a fixed-size header followed by row-major
//! little-endian `u16` pixels, optionally with padding at the end of each
//! row.

use std::path::Path;

use ndarray::{Array2, ShapeError};
use thiserror::Error;
use tracing::debug;

use super::IoError;
use crate::frame_geometry::FrameGeometry;

/// Reasons a byte buffer cannot be unpacked into a frame.
#[derive(Error, Debug)]
pub enum UnpackFrameError {
    #[error("buffer holds {actual} bytes but {needed} are required")]
    TooShort { needed: usize, actual: usize },
    #[error("row stride {stride} is smaller than a row of {row_bytes} bytes")]
    InvalidStride { stride: usize, row_bytes: usize },
    #[error(transparent)]
    Shape(#[from] ShapeError),
}

/// Convert a raw frame buffer of little-endian `u16` pixels into an array.
///
/// Skips `geometry.header_bytes` and honors row padding when
/// `geometry.stride` exceeds the row size. Bytes after the last pixel are
/// ignored.
pub fn unpack_u16_frame(
    data: &[u8],
    geometry: &FrameGeometry,
) -> Result<Array2<u16>, UnpackFrameError> {
    let row_bytes = geometry.row_bytes();
    let stride = geometry.row_stride();
    if stride < row_bytes {
        return Err(UnpackFrameError::InvalidStride { stride, row_bytes });
    }

    let needed = geometry.required_bytes();
    if data.len() < needed {
        return Err(UnpackFrameError::TooShort {
            needed,
            actual: data.len(),
        });
    }

    let mut pixels = vec![0u16; geometry.pixel_count()];
    {
        // Copy into the u16 buffer so alignment of `data` does not matter
        let dst = bytemuck::cast_slice_mut::<u16, u8>(&mut pixels);
        let body = &data[geometry.header_bytes..];

        if stride == row_bytes {
            dst.copy_from_slice(&body[..dst.len()]);
        } else {
            for (row, dst_row) in dst.chunks_exact_mut(row_bytes).enumerate() {
                let start = row * stride;
                dst_row.copy_from_slice(&body[start..start + row_bytes]);
            }
        }
    }

    for pixel in pixels.iter_mut() {
        *pixel = u16::from_le(*pixel);
    }

    Ok(Array2::from_shape_vec(geometry.shape(), pixels)?)
}

/// Read one raw exposure from disk.
pub fn read_raw_frame(path: &Path, geometry: &FrameGeometry) -> Result<Array2<u16>, IoError> {
    let data = std::fs::read(path).map_err(|e| IoError::file(path, e))?;

    let frame = unpack_u16_frame(&data, geometry).map_err(|source| IoError::Frame {
        path: path.to_path_buf(),
        geometry: *geometry,
        source,
    })?;

    debug!("read {} frame from {}", geometry, path.display());
    Ok(frame)
}
