//! Functions and utilities for working with [ndarray] objects.
//!
//! Source arrays are read from NumPy `.npy` files or `.npz` archives and cast to float32.
//! Chunk payloads are float32 in little-endian byte order regardless of the host.

use crate::error::MeshChunkError;

use ndarray::prelude::*;
use ndarray_stats::QuantileExt;
use npyz::npz::NpzArchive;
use npyz::NpyFile;
use std::borrow::Cow;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
// Bring trait into scope to use as_bytes method.
use zerocopy::AsBytes;

/// Load a named array from a `.npz` archive, or the array stored in a `.npy` file.
///
/// For `.npy` files `name` is only used in error messages.
///
/// # Arguments
///
/// * `path`: Path to the `.npz` or `.npy` file
/// * `name`: Name of the array within the archive
pub fn load_array(path: &Path, name: &str) -> Result<ArrayD<f32>, MeshChunkError> {
    let is_npz = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("npz"))
        .unwrap_or(false);
    if is_npz {
        let mut archive = NpzArchive::open(path)?;
        let npy = archive
            .by_name(name)?
            .ok_or_else(|| MeshChunkError::ArrayNotFound {
                name: name.to_string(),
                path: path.display().to_string(),
            })?;
        npy_to_array(npy)
    } else {
        let file = File::open(path)?;
        npy_to_array(NpyFile::new(BufReader::new(file))?)
    }
}

/// Read the data of an NPY stream into a float32 array with the stored shape and order.
pub fn npy_to_array<R: Read>(npy: NpyFile<R>) -> Result<ArrayD<f32>, MeshChunkError> {
    let shape = npy
        .shape()
        .iter()
        .map(|&len| usize::try_from(len))
        .collect::<Result<Vec<usize>, _>>()?;
    let fortran = matches!(npy.order(), npyz::Order::Fortran);
    let descr = match npy.dtype() {
        npyz::DType::Plain(type_str) => type_str.to_string(),
        dtype => {
            return Err(MeshChunkError::UnsupportedDType {
                dtype: format!("{:?}", dtype),
            })
        }
    };
    // The first character of the type string is the byte order, which npyz handles.
    let data: Vec<f32> = match descr.get(1..) {
        Some("f4") => npy.into_vec::<f32>()?,
        Some("f8") => npy.into_vec::<f64>()?.into_iter().map(|v| v as f32).collect(),
        Some("i4") => npy.into_vec::<i32>()?.into_iter().map(|v| v as f32).collect(),
        Some("i8") => npy.into_vec::<i64>()?.into_iter().map(|v| v as f32).collect(),
        Some("u4") => npy.into_vec::<u32>()?.into_iter().map(|v| v as f32).collect(),
        Some("u8") => npy.into_vec::<u64>()?.into_iter().map(|v| v as f32).collect(),
        _ => return Err(MeshChunkError::UnsupportedDType { dtype: descr }),
    };
    let shape = shape.into_shape();
    let shape = if fortran { shape.f() } else { shape };
    Ok(ArrayD::from_shape_vec(shape, data)?)
}

/// Returns the elements of an array in logical (row-major) order.
pub fn flatten<D: Dimension>(array: ArrayView<f32, D>) -> Vec<f32> {
    array.iter().copied().collect()
}

/// Serialise float32 values as little-endian bytes.
///
/// Borrows the values on little-endian hosts.
pub fn to_le_bytes(values: &[f32]) -> Cow<'_, [u8]> {
    if cfg!(target_endian = "little") {
        Cow::Borrowed(values.as_bytes())
    } else {
        Cow::Owned(values.iter().flat_map(|v| v.to_le_bytes()).collect())
    }
}

/// Decode little-endian float32 bytes.
///
/// # Arguments
///
/// * `data`: Bytes whose length is a multiple of 4
pub fn from_le_bytes(data: &[u8]) -> Result<Vec<f32>, MeshChunkError> {
    if data.len() % std::mem::size_of::<f32>() != 0 {
        return Err(MeshChunkError::FromBytes {
            type_name: std::any::type_name::<f32>(),
        });
    }
    Ok(data
        .chunks_exact(std::mem::size_of::<f32>())
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

/// Returns the minimum and maximum of the values, ignoring NaN.
///
/// Both are `None` when the values are empty or all NaN.
pub fn nan_min_max(values: ArrayView1<f32>) -> (Option<f32>, Option<f32>) {
    let not_nan = |v: f32| if v.is_nan() { None } else { Some(v) };
    (
        not_nan(*values.min_skipnan()),
        not_nan(*values.max_skipnan()),
    )
}
