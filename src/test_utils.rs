use crate::layout::Dataset;
use crate::models::*;

use npyz::WriterBuilder;
use std::path::Path;

/// Write an NPY file with the given shape and row-major data.
pub(crate) fn write_npy<T>(path: &Path, shape: &[u64], data: &[T])
where
    T: npyz::AutoSerialize,
{
    let mut buf = Vec::new();
    let mut writer = npyz::WriteOptions::new()
        .default_dtype()
        .shape(shape)
        .writer(&mut buf)
        .begin_nd()
        .unwrap();
    for value in data {
        writer.push(value).unwrap();
    }
    writer.finish().unwrap();
    std::fs::write(path, buf).unwrap();
}

/// Returns `n` distinct float32 values.
pub(crate) fn sequence(n: usize) -> Vec<f32> {
    (0..n).map(|i| i as f32 * 0.5 - 7.0).collect()
}

/// Returns the little-endian bytes of the values.
pub(crate) fn le_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Create a field metadata object with consistent chunking attributes.
pub(crate) fn field_metadata(
    name: &str,
    total_points: usize,
    chunk_size: usize,
    compressed: bool,
) -> DatasetMetadata {
    DatasetMetadata {
        total_points,
        chunk_size,
        total_chunks: chunk_count(total_points, chunk_size),
        dtype: DType::Float32,
        compressed,
        details: DatasetDetails::Field {
            field_name: name.to_string(),
            min: None,
            max: None,
            unit: Unit::for_dataset(name),
        },
    }
}

/// Write a metadata descriptor and raw chunk files directly, bypassing the writer.
pub(crate) fn write_dataset(
    root: &Path,
    dataset: &Dataset,
    metadata: &DatasetMetadata,
    chunks: &[Vec<u8>],
) {
    std::fs::create_dir_all(dataset.dir(root)).unwrap();
    std::fs::write(
        dataset.metadata_path(root),
        serde_json::to_vec_pretty(metadata).unwrap(),
    )
    .unwrap();
    for (index, chunk) in chunks.iter().enumerate() {
        std::fs::write(dataset.chunk_path(root, index), chunk).unwrap();
    }
}
