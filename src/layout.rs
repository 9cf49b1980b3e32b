//! On-disk layout of chunked datasets.
//!
//! Each dataset lives in its own directory below the data root:
//!
//! ```text
//! {root}/mesh/metadata.json
//! {root}/mesh/coords_0000.bin
//! {root}/{field}/metadata.json
//! {root}/{field}/{field}_c0_0000.bin
//! ```

use crate::error::MeshChunkError;

use std::path::{Path, PathBuf};

/// Name of the mesh dataset directory.
pub const MESH_DATASET: &str = "mesh";

/// Name of the metadata descriptor within a dataset directory.
pub const METADATA_FILE: &str = "metadata.json";

/// Extension of chunk files.
pub const CHUNK_EXTENSION: &str = "bin";

/// A dataset addressable below the data root.
#[derive(Clone, Debug, PartialEq)]
pub enum Dataset {
    /// Mesh node coordinates
    Mesh,
    /// A single-component field
    Field(String),
}

impl Dataset {
    /// Returns a field dataset after checking that its name is safe to use as a directory name.
    pub fn field(name: &str) -> Result<Self, MeshChunkError> {
        validate_name(name)?;
        if name == MESH_DATASET {
            return Err(MeshChunkError::InvalidDatasetName {
                name: name.to_string(),
            });
        }
        Ok(Self::Field(name.to_string()))
    }

    /// Dataset name, which is also the directory name.
    pub fn name(&self) -> &str {
        match self {
            Self::Mesh => MESH_DATASET,
            Self::Field(name) => name,
        }
    }

    /// Prefix shared by all chunk files of the dataset.
    fn chunk_prefix(&self) -> String {
        match self {
            Self::Mesh => "coords_".to_string(),
            // Single-component datasets always use component index 0.
            Self::Field(name) => format!("{}_c0_", name),
        }
    }

    /// Returns the chunk file name for a chunk index.
    pub fn chunk_file_name(&self, chunk_index: usize) -> String {
        format!(
            "{}{:04}.{}",
            self.chunk_prefix(),
            chunk_index,
            CHUNK_EXTENSION
        )
    }

    /// Returns whether a file name is a chunk file of this dataset.
    pub fn is_chunk_file_name(&self, file_name: &str) -> bool {
        file_name
            .strip_prefix(&self.chunk_prefix())
            .and_then(|rest| rest.strip_suffix(&format!(".{}", CHUNK_EXTENSION)))
            .map(|index| !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()))
            .unwrap_or(false)
    }

    /// Directory of the dataset below `root`.
    pub fn dir(&self, root: &Path) -> PathBuf {
        root.join(self.name())
    }

    /// Path of the metadata descriptor below `root`.
    pub fn metadata_path(&self, root: &Path) -> PathBuf {
        self.dir(root).join(METADATA_FILE)
    }

    /// Path of a chunk file below `root`.
    pub fn chunk_path(&self, root: &Path, chunk_index: usize) -> PathBuf {
        self.dir(root).join(self.chunk_file_name(chunk_index))
    }
}

/// Check that a dataset name maps onto a single directory below the data root.
fn validate_name(name: &str) -> Result<(), MeshChunkError> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-' || b == b'.');
    if valid {
        Ok(())
    } else {
        Err(MeshChunkError::InvalidDatasetName {
            name: name.to_string(),
        })
    }
}
