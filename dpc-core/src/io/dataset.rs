//! On-disk datasets: n-dimensional `f64` arrays with JSON metadata.
//!
//! A dataset `name` inside an output group directory is stored as two
//! files:
//!
//! - `name.bin`: the values as little-endian `f64` in row-major order
//! - `name.json`: `{"shape": [...], "dtype": "<f8", "attributes": {...}}`

use std::path::{Path, PathBuf};

use ndarray::{Array, ArrayD, Dimension, IxDyn};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::IoError;
use crate::reconstruction::Attributes;

/// Element type tag stored in the header.
pub const DTYPE_F64_LE: &str = "<f8";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetHeader {
    pub shape: Vec<usize>,
    pub dtype: String,
    #[serde(default)]
    pub attributes: Attributes,
}

/// A named array ready to be stored in an output group.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub name: String,
    pub data: ArrayD<f64>,
    pub attributes: Attributes,
}

impl Dataset {
    pub fn new<D: Dimension>(name: impl Into<String>, data: Array<f64, D>) -> Self {
        Self {
            name: name.into(),
            data: data.into_dyn(),
            attributes: Attributes::new(),
        }
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Paths of the data and header files of dataset `name` in `directory`.
    pub fn paths(directory: &Path, name: &str) -> (PathBuf, PathBuf) {
        (
            directory.join(format!("{name}.bin")),
            directory.join(format!("{name}.json")),
        )
    }

    /// Store the dataset in `directory`, creating the directory if needed.
    ///
    /// Both files are first written under temporary names and only renamed
    /// into place once both writes succeeded, so an existing pair is never
    /// left half replaced.
    ///
    /// # Returns
    /// * `Ok(PathBuf)` - Path of the written data file
    /// * `Err(IoError::DatasetExists)` - If the dataset exists and `overwrite` is false
    pub fn write(&self, directory: &Path, overwrite: bool) -> Result<PathBuf, IoError> {
        let (data_path, header_path) = Self::paths(directory, &self.name);
        if !overwrite && (data_path.exists() || header_path.exists()) {
            return Err(IoError::DatasetExists(data_path));
        }

        std::fs::create_dir_all(directory).map_err(|e| IoError::file(directory, e))?;

        let mut bytes = Vec::with_capacity(self.data.len() * std::mem::size_of::<f64>());
        for value in self.data.iter() {
            bytes.extend_from_slice(&value.to_le_bytes());
        }

        let header = DatasetHeader {
            shape: self.data.shape().to_vec(),
            dtype: DTYPE_F64_LE.to_string(),
            attributes: self.attributes.clone(),
        };
        let json = serde_json::to_string_pretty(&header)
            .map_err(|e| IoError::json(&header_path, e))?;

        let staged_data = staging_path(&data_path);
        let staged_header = staging_path(&header_path);
        let staged = std::fs::write(&staged_data, bytes)
            .map_err(|e| IoError::file(&staged_data, e))
            .and_then(|_| {
                std::fs::write(&staged_header, json).map_err(|e| IoError::file(&staged_header, e))
            })
            .and_then(|_| {
                std::fs::rename(&staged_data, &data_path).map_err(|e| IoError::file(&data_path, e))
            })
            .and_then(|_| {
                std::fs::rename(&staged_header, &header_path)
                    .map_err(|e| IoError::file(&header_path, e))
            });

        if let Err(e) = staged {
            let _ = std::fs::remove_file(&staged_data);
            let _ = std::fs::remove_file(&staged_header);
            return Err(e);
        }

        debug!("wrote dataset {} {:?}", data_path.display(), header.shape);
        Ok(data_path)
    }

    /// Load dataset `name` from `directory`.
    pub fn read(directory: &Path, name: &str) -> Result<Self, IoError> {
        let (data_path, header_path) = Self::paths(directory, name);

        let content =
            std::fs::read_to_string(&header_path).map_err(|e| IoError::file(&header_path, e))?;
        let header: DatasetHeader =
            serde_json::from_str(&content).map_err(|e| IoError::json(&header_path, e))?;

        if header.dtype != DTYPE_F64_LE {
            return Err(IoError::CorruptDataset {
                path: header_path,
                reason: format!("unsupported dtype {}", header.dtype),
            });
        }

        let bytes = std::fs::read(&data_path).map_err(|e| IoError::file(&data_path, e))?;
        let expected = header
            .shape
            .iter()
            .try_fold(std::mem::size_of::<f64>(), |acc, &len| acc.checked_mul(len))
            .ok_or_else(|| IoError::CorruptDataset {
                path: header_path.clone(),
                reason: format!("shape {:?} overflows the address space", header.shape),
            })?;
        if bytes.len() != expected {
            return Err(IoError::CorruptDataset {
                path: data_path,
                reason: format!("expected {} bytes, found {}", expected, bytes.len()),
            });
        }

        let values: Vec<f64> = bytes
            .chunks_exact(std::mem::size_of::<f64>())
            .map(|chunk| {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(chunk);
                f64::from_le_bytes(raw)
            })
            .collect();

        let data = ArrayD::from_shape_vec(IxDyn(&header.shape), values).map_err(|e| {
            IoError::CorruptDataset {
                path: data_path.clone(),
                reason: e.to_string(),
            }
        })?;

        Ok(Self {
            name: name.to_string(),
            data,
            attributes: header.attributes,
        })
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut staged = path.as_os_str().to_owned();
    staged.push(".tmp");
    PathBuf::from(staged)
}
