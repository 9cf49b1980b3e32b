//! Chunk reader.
//!
//! Resolves datasets and chunks below the data root and returns the exact uncompressed bytes the
//! writer produced. The reader holds no state between calls; every call reads the files as they
//! are at that moment.

use crate::compression;
use crate::error::MeshChunkError;
use crate::layout::Dataset;
use crate::models::DatasetMetadata;

use bytes::Bytes;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Reads chunked datasets below a data root.
#[derive(Clone, Debug)]
pub struct ChunkReader {
    /// Data root containing one directory per dataset.
    root: PathBuf,
}

impl ChunkReader {
    /// Returns a new ChunkReader.
    ///
    /// # Arguments
    ///
    /// * `root`: Data root directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Data root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Read and parse the metadata descriptor of a dataset.
    #[tracing::instrument(level = "DEBUG", skip(self), fields(dataset = dataset.name()))]
    pub fn get_metadata(&self, dataset: &Dataset) -> Result<DatasetMetadata, MeshChunkError> {
        let data = match fs::read(dataset.metadata_path(&self.root)) {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(if dataset.dir(&self.root).is_dir() {
                    MeshChunkError::MetadataNotFound {
                        dataset: dataset.name().to_string(),
                    }
                } else {
                    MeshChunkError::DatasetNotFound {
                        dataset: dataset.name().to_string(),
                    }
                });
            }
            Err(err) => return Err(err.into()),
        };
        let metadata: DatasetMetadata =
            serde_json::from_slice(&data).map_err(|source| MeshChunkError::MetadataCorrupt {
                dataset: dataset.name().to_string(),
                source,
            })?;
        metadata.validate(dataset.name())?;
        Ok(metadata)
    }

    /// Read one chunk and return its uncompressed bytes.
    ///
    /// # Arguments
    ///
    /// * `dataset`: Dataset to read from
    /// * `chunk_index`: Index of the chunk
    pub fn get_chunk(
        &self,
        dataset: &Dataset,
        chunk_index: usize,
    ) -> Result<Bytes, MeshChunkError> {
        let metadata = self.get_metadata(dataset)?;
        self.read_chunk(dataset, &metadata, chunk_index)
    }

    /// Read one chunk using metadata already obtained from [ChunkReader::get_metadata].
    ///
    /// Whether the chunk is decompressed is decided by the metadata only.
    ///
    /// # Arguments
    ///
    /// * `dataset`: Dataset to read from
    /// * `metadata`: Metadata descriptor of the dataset
    /// * `chunk_index`: Index of the chunk
    #[tracing::instrument(level = "DEBUG", skip(self, metadata), fields(dataset = dataset.name()))]
    pub fn read_chunk(
        &self,
        dataset: &Dataset,
        metadata: &DatasetMetadata,
        chunk_index: usize,
    ) -> Result<Bytes, MeshChunkError> {
        let not_found = || MeshChunkError::ChunkNotFound {
            dataset: dataset.name().to_string(),
            chunk: chunk_index.to_string(),
        };
        let expected = metadata.chunk_byte_len(chunk_index).ok_or_else(not_found)?;
        let stored = match fs::read(dataset.chunk_path(&self.root, chunk_index)) {
            Ok(stored) => stored,
            Err(err) if err.kind() == ErrorKind::NotFound => return Err(not_found()),
            Err(err) => return Err(err.into()),
        };
        let data = if metadata.compressed {
            compression::decompress(&stored, expected)?
        } else {
            Bytes::from(stored)
        };
        if data.len() != expected {
            return Err(MeshChunkError::ChunkSizeMismatch {
                dataset: dataset.name().to_string(),
                chunk: chunk_index,
                expected,
                actual: data.len(),
            });
        }
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DatasetDetails;
    use crate::test_utils;
    use crate::writer::ChunkWriter;

    use ndarray::prelude::*;

    #[test]
    fn read_written_field() {
        for compress in [true, false] {
            let dir = tempfile::tempdir().unwrap();
            let values = test_utils::sequence(130);
            let field = Array1::from(values.clone()).into_dyn();
            let written = ChunkWriter::new(dir.path(), compress)
                .write_field(field.view(), "temperature", 0, 50)
                .unwrap();

            let reader = ChunkReader::new(dir.path());
            let dataset = Dataset::field("temperature").unwrap();
            let metadata = reader.get_metadata(&dataset).unwrap();
            assert_eq!(written, metadata);
            let chunks: Vec<Bytes> = (0..metadata.total_chunks)
                .map(|i| reader.get_chunk(&dataset, i).unwrap())
                .collect();
            assert_eq!(30 * 4, chunks[2].len());
            assert_eq!(test_utils::le_bytes(&values), chunks.concat());
        }
    }

    #[test]
    fn read_written_mesh() {
        let dir = tempfile::tempdir().unwrap();
        let values = test_utils::sequence(10 * 3);
        let coords = Array2::from_shape_vec((10, 3), values.clone()).unwrap();
        ChunkWriter::new(dir.path(), true)
            .write_mesh(coords.view(), 4)
            .unwrap();
        let reader = ChunkReader::new(dir.path());
        let metadata = reader.get_metadata(&Dataset::Mesh).unwrap();
        assert_eq!(DatasetDetails::Mesh { dimensions: 3 }, metadata.details);
        assert_eq!(3, metadata.total_chunks);
        let chunk = reader.get_chunk(&Dataset::Mesh, 2).unwrap();
        assert_eq!(test_utils::le_bytes(&values[24..]), chunk);
    }

    #[test]
    fn chunk_beyond_total_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let field = Array1::from(test_utils::sequence(130)).into_dyn();
        ChunkWriter::new(dir.path(), true)
            .write_field(field.view(), "temperature", 0, 50)
            .unwrap();
        let dataset = Dataset::field("temperature").unwrap();
        // A stray file past the end must not be served.
        fs::copy(
            dataset.chunk_path(dir.path(), 0),
            dataset.chunk_path(dir.path(), 3),
        )
        .unwrap();
        let err = ChunkReader::new(dir.path())
            .get_chunk(&dataset, 3)
            .unwrap_err();
        assert!(err.is_not_found());
        match err {
            MeshChunkError::ChunkNotFound { dataset, chunk } => {
                assert_eq!("temperature", dataset);
                assert_eq!("3", chunk);
            }
            err => panic!("unexpected error {}", err),
        }
    }

    #[test]
    fn empty_dataset_has_no_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let field = Array1::<f32>::zeros(0).into_dyn();
        ChunkWriter::new(dir.path(), true)
            .write_field(field.view(), "temperature", 0, 50)
            .unwrap();
        let reader = ChunkReader::new(dir.path());
        let dataset = Dataset::field("temperature").unwrap();
        assert_eq!(0, reader.get_metadata(&dataset).unwrap().total_chunks);
        let err = reader.get_chunk(&dataset, 0).unwrap_err();
        assert!(matches!(err, MeshChunkError::ChunkNotFound { .. }));
    }

    #[test]
    fn missing_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let reader = ChunkReader::new(dir.path());
        let err = reader.get_metadata(&Dataset::Mesh).unwrap_err();
        assert!(matches!(err, MeshChunkError::DatasetNotFound { .. }));
        let err = reader.get_chunk(&Dataset::Mesh, 0).unwrap_err();
        assert!(matches!(err, MeshChunkError::DatasetNotFound { .. }));
    }

    #[test]
    fn missing_metadata() {
        // Left behind by a failed or in-progress write.
        let dir = tempfile::tempdir().unwrap();
        let dataset = Dataset::field("temperature").unwrap();
        fs::create_dir_all(dataset.dir(dir.path())).unwrap();
        fs::write(dataset.chunk_path(dir.path(), 0), [0_u8; 4]).unwrap();
        let reader = ChunkReader::new(dir.path());
        let err = reader.get_chunk(&dataset, 0).unwrap_err();
        assert!(err.is_not_found());
        assert!(matches!(err, MeshChunkError::MetadataNotFound { .. }));
    }

    #[test]
    fn missing_chunk_file() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = Dataset::field("temperature").unwrap();
        let metadata = test_utils::field_metadata("temperature", 4, 2, false);
        test_utils::write_dataset(dir.path(), &dataset, &metadata, &[vec![0; 8]]);
        let reader = ChunkReader::new(dir.path());
        reader.get_chunk(&dataset, 0).unwrap();
        let err = reader.get_chunk(&dataset, 1).unwrap_err();
        assert!(matches!(err, MeshChunkError::ChunkNotFound { .. }));
    }

    #[test]
    fn corrupt_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = Dataset::Mesh;
        fs::create_dir_all(dataset.dir(dir.path())).unwrap();
        fs::write(dataset.metadata_path(dir.path()), "{\"total_points\": ").unwrap();
        let err = ChunkReader::new(dir.path())
            .get_metadata(&dataset)
            .unwrap_err();
        assert!(!err.is_not_found());
        assert!(matches!(err, MeshChunkError::MetadataCorrupt { .. }));
    }

    #[test]
    fn inconsistent_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = Dataset::field("temperature").unwrap();
        let mut metadata = test_utils::field_metadata("temperature", 130, 50, false);
        metadata.total_chunks = 4;
        test_utils::write_dataset(dir.path(), &dataset, &metadata, &[]);
        let err = ChunkReader::new(dir.path())
            .get_metadata(&dataset)
            .unwrap_err();
        assert!(matches!(err, MeshChunkError::MetadataInconsistent { .. }));
    }

    #[test]
    fn mesh_dimensions_not_three() {
        let dir = tempfile::tempdir().unwrap();
        let mut metadata = test_utils::field_metadata("mesh", 2, 2, false);
        metadata.details = DatasetDetails::Mesh {
            dimensions: usize::MAX / 2,
        };
        test_utils::write_dataset(dir.path(), &Dataset::Mesh, &metadata, &[vec![0; 24]]);
        let reader = ChunkReader::new(dir.path());
        let err = reader.get_metadata(&Dataset::Mesh).unwrap_err();
        assert!(matches!(err, MeshChunkError::MetadataInconsistent { .. }));
        let err = reader.get_chunk(&Dataset::Mesh, 0).unwrap_err();
        assert!(!err.is_not_found());
        assert!(matches!(err, MeshChunkError::MetadataInconsistent { .. }));
    }

    #[test]
    fn chunk_byte_length_overflow() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = Dataset::field("temperature").unwrap();
        let metadata = test_utils::field_metadata("temperature", 2, usize::MAX / 2, false);
        test_utils::write_dataset(dir.path(), &dataset, &metadata, &[vec![0; 8]]);
        let err = ChunkReader::new(dir.path())
            .get_chunk(&dataset, 0)
            .unwrap_err();
        assert!(matches!(err, MeshChunkError::MetadataInconsistent { .. }));
    }

    #[test]
    fn invalid_compressed_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = Dataset::field("temperature").unwrap();
        let metadata = test_utils::field_metadata("temperature", 2, 2, true);
        let chunks = [b"invalid format".to_vec()];
        test_utils::write_dataset(dir.path(), &dataset, &metadata, &chunks);
        let err = ChunkReader::new(dir.path())
            .get_chunk(&dataset, 0)
            .unwrap_err();
        assert!(matches!(err, MeshChunkError::Decompression(_)));
    }

    #[test]
    fn chunk_size_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = Dataset::field("temperature").unwrap();
        let metadata = test_utils::field_metadata("temperature", 3, 2, true);
        let long = compression::compress(&[0; 8], compression::DEFAULT_LEVEL).unwrap();
        test_utils::write_dataset(dir.path(), &dataset, &metadata, &[vec![], long]);
        let err = ChunkReader::new(dir.path())
            .get_chunk(&dataset, 1)
            .unwrap_err();
        match err {
            MeshChunkError::ChunkSizeMismatch {
                chunk,
                expected,
                actual,
                ..
            } => {
                assert_eq!(1, chunk);
                assert_eq!(4, expected);
                assert_eq!(8, actual);
            }
            err => panic!("unexpected error {}", err),
        }
    }

    #[test]
    fn uncompressed_chunk_size_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = Dataset::Mesh;
        let mut metadata = test_utils::field_metadata("mesh", 2, 2, false);
        metadata.details = DatasetDetails::Mesh { dimensions: 3 };
        test_utils::write_dataset(dir.path(), &dataset, &metadata, &[vec![0; 12]]);
        let err = ChunkReader::new(dir.path())
            .get_chunk(&dataset, 0)
            .unwrap_err();
        assert!(matches!(
            err,
            MeshChunkError::ChunkSizeMismatch {
                expected: 24,
                actual: 12,
                ..
            }
        ));
    }
}
