//! Chunk writer.
//!
//! Converts a mesh coordinate array or one component of a field into a directory of
//! independently compressed chunk files plus a `metadata.json` descriptor. The descriptor is
//! removed before any chunk is touched and written last, through a rename, so a reader never sees
//! metadata that refers to chunks from a different run.

use crate::array;
use crate::compression;
use crate::error::MeshChunkError;
use crate::layout::{Dataset, METADATA_FILE};
use crate::models::{
    chunk_count, DType, DatasetDetails, DatasetMetadata, FieldKind, Unit, MESH_DIMENSIONS,
};

use ndarray::prelude::*;
use std::borrow::Cow;
use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Writes chunked datasets below a data root.
#[derive(Clone, Debug)]
pub struct ChunkWriter {
    /// Data root containing one directory per dataset.
    root: PathBuf,
    /// zlib level, or `None` to store chunks uncompressed.
    compression_level: Option<u32>,
}

impl ChunkWriter {
    /// Returns a new ChunkWriter.
    ///
    /// # Arguments
    ///
    /// * `root`: Data root directory
    /// * `compress`: Whether to zlib compress each chunk
    pub fn new(root: impl Into<PathBuf>, compress: bool) -> Self {
        Self {
            root: root.into(),
            compression_level: compress.then_some(compression::DEFAULT_LEVEL),
        }
    }

    /// Set the zlib compression level. Has no effect when compression is disabled.
    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.compression_level = self.compression_level.map(|_| level);
        self
    }

    /// Data root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write mesh node coordinates as the `mesh` dataset.
    ///
    /// Chunks hold `chunk_size` nodes, each node being 3 interleaved coordinates.
    ///
    /// # Arguments
    ///
    /// * `coords`: N×3 array of node coordinates
    /// * `chunk_size`: Number of nodes per chunk
    pub fn write_mesh(
        &self,
        coords: ArrayView2<f32>,
        chunk_size: usize,
    ) -> Result<DatasetMetadata, MeshChunkError> {
        validate_chunk_size(chunk_size)?;
        if coords.ncols() != MESH_DIMENSIONS {
            return Err(MeshChunkError::InvalidShape {
                shape: coords.shape().to_vec(),
                reason: "mesh coordinates must have 3 columns",
            });
        }
        let total_points = coords.nrows();
        let metadata = DatasetMetadata {
            total_points,
            chunk_size,
            total_chunks: chunk_count(total_points, chunk_size),
            dtype: DType::Float32,
            compressed: self.compression_level.is_some(),
            details: DatasetDetails::Mesh {
                dimensions: MESH_DIMENSIONS,
            },
        };
        let values = array::flatten(coords);
        self.write_dataset(&Dataset::Mesh, &values, metadata)
    }

    /// Write one component of a field.
    ///
    /// A 1-D array is a scalar field and `vector_dimension` must be 0. For a 2-D array, column
    /// `vector_dimension` is selected and the dataset is named `{field_name}_{axis}`, which
    /// requires `field_name` to be a known vector or tensor field.
    ///
    /// # Arguments
    ///
    /// * `field`: 1-D scalar field or 2-D points × components array
    /// * `field_name`: Name of the field
    /// * `vector_dimension`: Column to select from a multi-component field
    /// * `chunk_size`: Number of points per chunk
    pub fn write_field(
        &self,
        field: ArrayViewD<f32>,
        field_name: &str,
        vector_dimension: usize,
        chunk_size: usize,
    ) -> Result<DatasetMetadata, MeshChunkError> {
        validate_chunk_size(chunk_size)?;
        let invalid_dimension = || MeshChunkError::InvalidDimension {
            field_name: field_name.to_string(),
            dimension: vector_dimension,
        };
        let (dataset_name, component) = match field.ndim() {
            1 => {
                if vector_dimension != 0 {
                    return Err(invalid_dimension());
                }
                (field_name.to_string(), field.view())
            }
            2 => {
                let kind = FieldKind::from_name(field_name);
                if kind == FieldKind::Scalar {
                    return Err(MeshChunkError::UnknownField {
                        field_name: field_name.to_string(),
                    });
                }
                let suffix = kind
                    .axis_suffix(vector_dimension)
                    .filter(|_| vector_dimension < field.shape()[1])
                    .ok_or_else(invalid_dimension)?;
                let component = field.index_axis(Axis(1), vector_dimension);
                (format!("{}_{}", field_name, suffix), component)
            }
            _ => {
                return Err(MeshChunkError::InvalidShape {
                    shape: field.shape().to_vec(),
                    reason: "fields must have 1 or 2 dimensions",
                })
            }
        };
        let dataset = Dataset::field(&dataset_name)?;
        let component = component.into_dimensionality::<Ix1>()?;

        let total_points = component.len();
        let (min, max) = array::nan_min_max(component.view());
        let metadata = DatasetMetadata {
            total_points,
            chunk_size,
            total_chunks: chunk_count(total_points, chunk_size),
            dtype: DType::Float32,
            compressed: self.compression_level.is_some(),
            details: DatasetDetails::Field {
                unit: Unit::for_dataset(&dataset_name),
                field_name: dataset_name,
                min,
                max,
            },
        };
        let values = array::flatten(component);
        self.write_dataset(&dataset, &values, metadata)
    }

    /// Replace the chunk files and metadata of a dataset.
    fn write_dataset(
        &self,
        dataset: &Dataset,
        values: &[f32],
        metadata: DatasetMetadata,
    ) -> Result<DatasetMetadata, MeshChunkError> {
        self.prepare_dir(dataset)?;
        let elements_per_chunk = metadata
            .chunk_size
            .checked_mul(metadata.components())
            .ok_or(MeshChunkError::InvalidChunkSize)?;
        let mut written = 0;
        for (index, chunk) in values.chunks(elements_per_chunk).enumerate() {
            let raw = array::to_le_bytes(chunk);
            let payload = match self.compression_level {
                Some(level) => Cow::Owned(compression::compress(&raw, level)?),
                None => raw,
            };
            fs::write(dataset.chunk_path(&self.root, index), &payload)?;
            debug!(
                dataset = dataset.name(),
                chunk = index,
                raw_bytes = chunk.len() * std::mem::size_of::<f32>(),
                stored_bytes = payload.len(),
                "wrote chunk"
            );
            written += 1;
        }
        debug_assert_eq!(metadata.total_chunks, written);
        self.write_metadata(dataset, &metadata)?;
        info!(
            dataset = dataset.name(),
            total_points = metadata.total_points,
            total_chunks = metadata.total_chunks,
            compressed = metadata.compressed,
            "wrote dataset"
        );
        Ok(metadata)
    }

    /// Create the dataset directory, then remove its metadata and any existing chunk files.
    fn prepare_dir(&self, dataset: &Dataset) -> Result<(), MeshChunkError> {
        let dir = dataset.dir(&self.root);
        fs::create_dir_all(&dir)?;
        match fs::remove_file(dataset.metadata_path(&self.root)) {
            Ok(()) => debug!(dataset = dataset.name(), "removed previous metadata"),
            Err(err) if err.kind() == ErrorKind::NotFound => (),
            Err(err) => return Err(err.into()),
        }
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let stale = entry
                .file_name()
                .to_str()
                .map(|name| dataset.is_chunk_file_name(name))
                .unwrap_or(false);
            if stale {
                fs::remove_file(entry.path())?;
            }
        }
        Ok(())
    }

    /// Write the metadata descriptor to a temporary file and rename it into place.
    fn write_metadata(
        &self,
        dataset: &Dataset,
        metadata: &DatasetMetadata,
    ) -> Result<(), MeshChunkError> {
        let path = dataset.metadata_path(&self.root);
        let tmp_path = dataset.dir(&self.root).join(format!("{}.tmp", METADATA_FILE));
        let mut writer = BufWriter::new(File::create(&tmp_path)?);
        serde_json::to_writer_pretty(&mut writer, metadata).map_err(std::io::Error::from)?;
        writer.flush()?;
        drop(writer);
        fs::rename(&tmp_path, &path)?;
        Ok(())
    }
}

fn validate_chunk_size(chunk_size: usize) -> Result<(), MeshChunkError> {
    if chunk_size == 0 {
        Err(MeshChunkError::InvalidChunkSize)
    } else {
        Ok(())
    }
}
