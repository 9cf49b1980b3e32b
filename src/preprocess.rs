//! Offline preprocessing of source arrays into chunked datasets.

use crate::array;
use crate::cli::{DataType, PreprocessArgs};
use crate::error::MeshChunkError;
use crate::layout::Dataset;
use crate::models::{DatasetDetails, DatasetMetadata};
use crate::reader::ChunkReader;
use crate::writer::ChunkWriter;

use ndarray::prelude::*;
use std::path::Path;
use tracing::{event, Level};

/// Name of the mesh coordinates array in a `.npz` archive.
pub const MESH_ARRAY: &str = "node_coords";

/// Load the input array, write it as a chunked dataset and optionally verify the result.
///
/// Returns the metadata descriptor that was written.
///
/// # Arguments
///
/// * `args`: Preprocessor command line arguments
pub fn run(args: &PreprocessArgs) -> Result<DatasetMetadata, MeshChunkError> {
    let writer = ChunkWriter::new(&args.output, !args.no_compress)
        .with_compression_level(args.compression_level);
    let chunk_size = args.chunk_size();
    match args.data_type {
        DataType::Mesh => {
            let name = args.array.as_deref().unwrap_or(MESH_ARRAY);
            let coords = array::load_array(&args.input, name)?;
            let shape = coords.shape().to_vec();
            let coords = coords.into_dimensionality::<Ix2>().map_err(|_| {
                MeshChunkError::InvalidShape {
                    shape,
                    reason: "mesh coordinates must be a 2-D array",
                }
            })?;
            let metadata = writer.write_mesh(coords.view(), chunk_size)?;
            if args.verify {
                verify(writer.root(), &Dataset::Mesh, &array::flatten(coords.view()))?;
            }
            Ok(metadata)
        }
        DataType::Field => {
            let field_name = args.field.as_deref().ok_or_else(|| {
                MeshChunkError::InvalidDatasetName {
                    name: String::new(),
                }
            })?;
            let name = args.array.as_deref().unwrap_or(field_name);
            let field = array::load_array(&args.input, name)?;
            let metadata =
                writer.write_field(field.view(), field_name, args.vector_dimension, chunk_size)?;
            if args.verify {
                let source = if field.ndim() == 1 {
                    array::flatten(field.view())
                } else {
                    array::flatten(field.index_axis(Axis(1), args.vector_dimension))
                };
                if let DatasetDetails::Field { field_name, .. } = &metadata.details {
                    verify(writer.root(), &Dataset::field(field_name)?, &source)?;
                }
            }
            Ok(metadata)
        }
    }
}

/// Process exit status for a failed run.
///
/// Invalid input exits with 2, the same status clap uses for usage errors. Other failures exit
/// with 1.
pub fn exit_status(err: &MeshChunkError) -> u8 {
    if err.is_invalid_input() {
        2
    } else {
        1
    }
}

/// Read every chunk of a dataset back and compare it bit for bit with the source values.
///
/// # Arguments
///
/// * `root`: Data root directory
/// * `dataset`: Dataset to verify
/// * `source`: Flattened source values, point-major
pub fn verify(root: &Path, dataset: &Dataset, source: &[f32]) -> Result<(), MeshChunkError> {
    let reader = ChunkReader::new(root);
    let metadata = reader.get_metadata(dataset)?;
    let components = metadata.components();
    let failed = |chunk| MeshChunkError::VerificationFailed {
        dataset: dataset.name().to_string(),
        chunk,
    };
    if metadata.total_points * components != source.len() {
        return Err(failed(0));
    }
    for chunk_index in 0..metadata.total_chunks {
        let data = reader.read_chunk(dataset, &metadata, chunk_index)?;
        let values = array::from_le_bytes(&data)?;
        let expected = metadata
            .chunk_range(chunk_index)
            .and_then(|range| source.get(range.start * components..range.end * components))
            .ok_or_else(|| failed(chunk_index))?;
        let identical = values.len() == expected.len()
            && values
                .iter()
                .zip(expected)
                .all(|(a, b)| a.to_bits() == b.to_bits());
        if !identical {
            return Err(failed(chunk_index));
        }
    }
    event!(
        Level::INFO,
        "verified {} chunks of {}",
        metadata.total_chunks,
        dataset.name()
    );
    Ok(())
}
