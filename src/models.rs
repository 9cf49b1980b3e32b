//! Data types and associated functions and methods

use crate::error::MeshChunkError;

use serde::{Deserialize, Serialize};
use strum_macros::Display;

/// Supported numerical data types
///
/// Chunks are always stored as little-endian float32.
#[derive(Clone, Copy, Debug, Deserialize, Display, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DType {
    /// [f32]
    Float32,
}

impl DType {
    /// Returns the size of the associated type in bytes.
    pub fn size_of(self) -> usize {
        match self {
            Self::Float32 => std::mem::size_of::<f32>(),
        }
    }
}

/// Physical unit reported for a field
#[derive(Clone, Copy, Debug, Deserialize, Display, PartialEq, Serialize)]
pub enum Unit {
    /// Megapascal, used for stress fields
    #[serde(rename = "MPa")]
    #[strum(serialize = "MPa")]
    MPa,
    /// Millimetre, used for everything else
    #[serde(rename = "mm")]
    #[strum(serialize = "mm")]
    Mm,
}

impl Unit {
    /// Returns the unit for a dataset name.
    pub fn for_dataset(dataset_name: &str) -> Self {
        if dataset_name.contains("stress") {
            Self::MPa
        } else {
            Self::Mm
        }
    }
}

/// Number of columns per point of a named field
///
/// Multi-column fields are split into one dataset per column at write time. The set of names is
/// closed: a multi-column array whose name is not listed here is rejected.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FieldKind {
    /// One value per point
    Scalar,
    /// Three-component vector
    Vector3,
    /// Six-component symmetric tensor
    Tensor6,
}

const VECTOR3_FIELDS: [&str; 1] = ["displace_vector"];
const TENSOR6_FIELDS: [&str; 2] = ["stress_tensor", "strain_tensor"];

const VECTOR3_AXES: [&str; 3] = ["x", "y", "z"];
const TENSOR6_AXES: [&str; 6] = ["xx", "yy", "zz", "xy", "yz", "xz"];

impl FieldKind {
    /// Returns the kind of a field from its name.
    pub fn from_name(field_name: &str) -> Self {
        if VECTOR3_FIELDS.contains(&field_name) {
            Self::Vector3
        } else if TENSOR6_FIELDS.contains(&field_name) {
            Self::Tensor6
        } else {
            Self::Scalar
        }
    }

    /// Returns the number of components of the field.
    pub fn components(self) -> usize {
        match self {
            Self::Scalar => 1,
            Self::Vector3 => VECTOR3_AXES.len(),
            Self::Tensor6 => TENSOR6_AXES.len(),
        }
    }

    /// Returns the dataset name suffix for a component, or `None` if out of range.
    ///
    /// Scalar fields have no suffix.
    pub fn axis_suffix(self, dimension: usize) -> Option<&'static str> {
        match self {
            Self::Scalar => None,
            Self::Vector3 => VECTOR3_AXES.get(dimension).copied(),
            Self::Tensor6 => TENSOR6_AXES.get(dimension).copied(),
        }
    }
}

/// Dataset-kind specific part of the metadata descriptor
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DatasetDetails {
    /// Mesh node coordinates
    Mesh {
        /// Number of coordinates per point
        dimensions: usize,
    },
    /// Single-component field
    Field {
        /// Dataset name of the field, including any component suffix
        field_name: String,
        /// Smallest non-NaN value, `None` if there is none
        min: Option<f32>,
        /// Largest non-NaN value, `None` if there is none
        max: Option<f32>,
        /// Physical unit
        unit: Unit,
    },
}

/// Metadata descriptor, stored as `metadata.json` next to the chunk files of a dataset
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct DatasetMetadata {
    /// Number of points in the dataset
    pub total_points: usize,
    /// Number of points per chunk
    pub chunk_size: usize,
    /// Number of chunk files
    pub total_chunks: usize,
    /// Element data type
    pub dtype: DType,
    /// Whether each chunk file is zlib compressed
    pub compressed: bool,
    /// Mesh or field specific attributes
    #[serde(flatten)]
    pub details: DatasetDetails,
}

/// Number of coordinates per mesh node.
pub const MESH_DIMENSIONS: usize = 3;

/// Returns the number of chunks needed for `total_points` points.
pub fn chunk_count(total_points: usize, chunk_size: usize) -> usize {
    total_points.div_ceil(chunk_size)
}

impl DatasetMetadata {
    /// Number of elements stored per point.
    pub fn components(&self) -> usize {
        match self.details {
            DatasetDetails::Mesh { dimensions } => dimensions,
            DatasetDetails::Field { .. } => 1,
        }
    }

    /// Returns the `[start, end)` point range of a chunk, or `None` if out of range.
    pub fn chunk_range(&self, chunk_index: usize) -> Option<std::ops::Range<usize>> {
        if chunk_index >= self.total_chunks {
            return None;
        }
        let start = chunk_index.checked_mul(self.chunk_size)?;
        let end = std::cmp::min(start.saturating_add(self.chunk_size), self.total_points);
        Some(start..end)
    }

    /// Returns the uncompressed length of a chunk in bytes, or `None` if out of range.
    ///
    /// Also `None` if the length overflows, which [DatasetMetadata::validate] rules out.
    pub fn chunk_byte_len(&self, chunk_index: usize) -> Option<usize> {
        self.chunk_range(chunk_index)?
            .len()
            .checked_mul(self.components())?
            .checked_mul(self.dtype.size_of())
    }

    /// Check that the chunking attributes agree with each other.
    ///
    /// # Arguments
    ///
    /// * `dataset`: Dataset name, used in the error
    pub fn validate(&self, dataset: &str) -> Result<(), MeshChunkError> {
        let inconsistent = |reason| MeshChunkError::MetadataInconsistent {
            dataset: dataset.to_string(),
            reason,
        };
        if self.chunk_size == 0 {
            return Err(inconsistent("chunk_size must be greater than 0"));
        }
        if self.total_chunks != chunk_count(self.total_points, self.chunk_size) {
            return Err(inconsistent(
                "total_chunks does not match total_points and chunk_size",
            ));
        }
        if let DatasetDetails::Mesh { dimensions } = self.details {
            if dimensions != MESH_DIMENSIONS {
                return Err(inconsistent("mesh dimensions must be 3"));
            }
        }
        let max_chunk_bytes = self
            .chunk_size
            .checked_mul(self.components())
            .and_then(|n| n.checked_mul(self.dtype.size_of()));
        if max_chunk_bytes.is_none() {
            return Err(inconsistent("chunk_size is too large"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_metadata(total_points: usize, chunk_size: usize) -> DatasetMetadata {
        DatasetMetadata {
            total_points,
            chunk_size,
            total_chunks: chunk_count(total_points, chunk_size),
            dtype: DType::Float32,
            compressed: true,
            details: DatasetDetails::Field {
                field_name: "temperature".to_string(),
                min: Some(-5.0),
                max: Some(3.0),
                unit: Unit::Mm,
            },
        }
    }

    #[test]
    fn dtype_size_of() {
        assert_eq!(4, DType::Float32.size_of());
        assert_eq!("float32", DType::Float32.to_string());
    }

    #[test]
    fn chunk_count_rounds_up() {
        assert_eq!(0, chunk_count(0, 50));
        assert_eq!(1, chunk_count(1, 50));
        assert_eq!(1, chunk_count(50, 50));
        assert_eq!(2, chunk_count(51, 50));
        assert_eq!(3, chunk_count(130, 50));
    }

    #[test]
    fn chunk_ranges_last_chunk_short() {
        let metadata = field_metadata(130, 50);
        assert_eq!(Some(0..50), metadata.chunk_range(0));
        assert_eq!(Some(50..100), metadata.chunk_range(1));
        assert_eq!(Some(100..130), metadata.chunk_range(2));
        assert_eq!(None, metadata.chunk_range(3));
        assert_eq!(Some(30 * 4), metadata.chunk_byte_len(2));
    }

    #[test]
    fn chunk_byte_len_mesh() {
        let metadata = DatasetMetadata {
            total_points: 7,
            chunk_size: 4,
            total_chunks: 2,
            dtype: DType::Float32,
            compressed: false,
            details: DatasetDetails::Mesh { dimensions: 3 },
        };
        assert_eq!(Some(4 * 3 * 4), metadata.chunk_byte_len(0));
        assert_eq!(Some(3 * 3 * 4), metadata.chunk_byte_len(1));
        assert_eq!(None, metadata.chunk_byte_len(2));
    }

    #[test]
    fn empty_dataset_has_no_chunks() {
        let metadata = field_metadata(0, 50);
        assert_eq!(0, metadata.total_chunks);
        assert_eq!(None, metadata.chunk_range(0));
        metadata.validate("temperature").unwrap();
    }

    #[test]
    fn validate_inconsistent() {
        let mut metadata = field_metadata(130, 50);
        metadata.total_chunks = 2;
        match metadata.validate("temperature").unwrap_err() {
            MeshChunkError::MetadataInconsistent { dataset, reason: _ } => {
                assert_eq!("temperature", dataset)
            }
            err => panic!("unexpected error {}", err),
        }
        metadata.chunk_size = 0;
        assert!(metadata.validate("temperature").is_err());
    }

    #[test]
    fn validate_mesh_dimensions() {
        let mut metadata = field_metadata(10, 4);
        metadata.details = DatasetDetails::Mesh { dimensions: 3 };
        metadata.validate("mesh").unwrap();
        for dimensions in [0, 2, usize::MAX] {
            metadata.details = DatasetDetails::Mesh { dimensions };
            assert!(matches!(
                metadata.validate("mesh").unwrap_err(),
                MeshChunkError::MetadataInconsistent {
                    reason: "mesh dimensions must be 3",
                    ..
                }
            ));
        }
    }

    #[test]
    fn validate_chunk_size_overflow() {
        let mut metadata = field_metadata(10, usize::MAX / 2);
        assert_eq!(1, metadata.total_chunks);
        assert_eq!(Some(40), metadata.chunk_byte_len(0));
        assert!(matches!(
            metadata.validate("temperature").unwrap_err(),
            MeshChunkError::MetadataInconsistent {
                reason: "chunk_size is too large",
                ..
            }
        ));
        metadata.details = DatasetDetails::Mesh {
            dimensions: usize::MAX,
        };
        assert_eq!(None, metadata.chunk_byte_len(0));
    }

    #[test]
    fn field_kind_lookup() {
        assert_eq!(FieldKind::Vector3, FieldKind::from_name("displace_vector"));
        assert_eq!(FieldKind::Tensor6, FieldKind::from_name("stress_tensor"));
        assert_eq!(FieldKind::Tensor6, FieldKind::from_name("strain_tensor"));
        assert_eq!(FieldKind::Scalar, FieldKind::from_name("temperature"));
        assert_eq!(Some("xy"), FieldKind::Tensor6.axis_suffix(3));
        assert_eq!(Some("xz"), FieldKind::Tensor6.axis_suffix(5));
        assert_eq!(None, FieldKind::Tensor6.axis_suffix(6));
        assert_eq!(Some("z"), FieldKind::Vector3.axis_suffix(2));
        assert_eq!(None, FieldKind::Vector3.axis_suffix(3));
        assert_eq!(None, FieldKind::Scalar.axis_suffix(0));
    }

    #[test]
    fn unit_from_name() {
        assert_eq!(Unit::MPa, Unit::for_dataset("stress_tensor_xy"));
        assert_eq!(Unit::Mm, Unit::for_dataset("strain_tensor_xx"));
        assert_eq!("MPa", Unit::MPa.to_string());
    }

    #[test]
    fn serialise_field_metadata() {
        let value = serde_json::to_value(field_metadata(130, 50)).unwrap();
        assert_eq!(
            serde_json::json!({
                "total_points": 130,
                "chunk_size": 50,
                "total_chunks": 3,
                "dtype": "float32",
                "compressed": true,
                "field_name": "temperature",
                "min": -5.0,
                "max": 3.0,
                "unit": "mm",
            }),
            value
        );
    }

    #[test]
    fn deserialise_mesh_metadata() {
        let json = r#"{
            "total_points": 100,
            "chunk_size": 50000,
            "total_chunks": 1,
            "dtype": "float32",
            "compressed": true,
            "dimensions": 3
        }"#;
        let metadata: DatasetMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(DatasetDetails::Mesh { dimensions: 3 }, metadata.details);
        assert_eq!(3, metadata.components());
    }

    #[test]
    fn deserialise_field_metadata_without_range() {
        let json = r#"{
            "field_name": "temperature",
            "total_points": 0,
            "chunk_size": 10,
            "total_chunks": 0,
            "dtype": "float32",
            "compressed": false,
            "min": null,
            "max": null,
            "unit": "mm"
        }"#;
        let metadata: DatasetMetadata = serde_json::from_str(json).unwrap();
        match metadata.details {
            DatasetDetails::Field { min, max, .. } => {
                assert_eq!(None, min);
                assert_eq!(None, max);
            }
            details => panic!("unexpected details {:?}", details),
        }
    }

    #[test]
    fn deserialise_unknown_dtype() {
        let json = r#"{
            "total_points": 1, "chunk_size": 1, "total_chunks": 1,
            "dtype": "float64", "compressed": true, "dimensions": 3
        }"#;
        assert!(serde_json::from_str::<DatasetMetadata>(json).is_err());
    }
}
