//! Error handling.

use axum::{
    http::header,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use ndarray::ShapeError;
use serde::Serialize;
use std::error::Error;
use thiserror::Error;
use tokio::sync::AcquireError;
use tracing::{event, Level};
use zune_inflate::errors::InflateDecodeErrors;

/// Mesh chunk error type
///
/// This type encapsulates the errors raised by the chunk writer, the chunk reader and the HTTP
/// layer. Each variant belongs to one of three classes: not found, corrupt data (or another
/// unexpected server failure), and invalid writer input.
#[derive(Debug, Error)]
pub enum MeshChunkError {
    /// Source array not present in the input file
    #[error("array {name} not found in {path}")]
    ArrayNotFound { name: String, path: String },

    /// Chunk index outside the dataset, or chunk file missing
    #[error("chunk {chunk} of dataset {dataset} not found")]
    ChunkNotFound { dataset: String, chunk: String },

    /// Decompressed chunk length disagrees with the metadata descriptor
    #[error("chunk {chunk} of dataset {dataset} has {actual} bytes, expected {expected}")]
    ChunkSizeMismatch {
        dataset: String,
        chunk: usize,
        expected: usize,
        actual: usize,
    },

    /// Dataset directory missing
    #[error("dataset {dataset} not found")]
    DatasetNotFound { dataset: String },

    /// Stored chunk bytes are not valid zlib data
    #[error("failed to decompress chunk")]
    Decompression(#[from] InflateDecodeErrors),

    /// Error converting from bytes to a type
    #[error("failed to convert from bytes to {type_name}")]
    FromBytes { type_name: &'static str },

    /// Chunk size of zero
    #[error("chunk size must be greater than 0")]
    InvalidChunkSize,

    /// Dataset name that cannot be mapped onto the data root
    #[error("invalid dataset name {name}")]
    InvalidDatasetName { name: String },

    /// Vector dimension not applicable to the source array
    #[error("invalid vector dimension {dimension} for {field_name}")]
    InvalidDimension {
        field_name: String,
        dimension: usize,
    },

    /// Source array has an unsupported shape
    #[error("invalid array shape {shape:?}: {reason}")]
    InvalidShape {
        shape: Vec<usize>,
        reason: &'static str,
    },

    /// Filesystem error
    #[error("I/O error")]
    Io(#[from] std::io::Error),

    /// Metadata descriptor is not valid JSON for the metadata contract
    #[error("failed to parse metadata for dataset {dataset}")]
    MetadataCorrupt {
        dataset: String,
        #[source]
        source: serde_json::Error,
    },

    /// Metadata descriptor parsed but disagrees with itself
    #[error("inconsistent metadata for dataset {dataset}: {reason}")]
    MetadataInconsistent {
        dataset: String,
        reason: &'static str,
    },

    /// Metadata descriptor missing from an existing dataset directory
    #[error("metadata for dataset {dataset} not found")]
    MetadataNotFound { dataset: String },

    /// Error registering or encoding Prometheus metrics
    #[error("metrics error")]
    Metrics(#[from] prometheus::Error),

    /// Requested decode does not fit in the memory budget
    #[error("insufficient memory to process request ({requested} > {total})")]
    InsufficientMemory { requested: usize, total: usize },

    /// Error acquiring a semaphore
    #[error("error acquiring resources")]
    SemaphoreAcquireError(#[from] AcquireError),

    /// Error creating ndarray Array from shape
    #[error("failed to create array from shape")]
    ShapeInvalid(#[from] ShapeError),

    /// Blocking task failed to complete
    #[error("chunk decoding task failed")]
    TaskJoin(#[from] tokio::task::JoinError),

    /// Error converting between integer types
    #[error(transparent)]
    TryFromInt(#[from] std::num::TryFromIntError),

    /// Multi-column array with a field name outside the vector/tensor tables
    #[error("unknown vector or tensor field {field_name}")]
    UnknownField { field_name: String },

    /// Route not served
    #[error("no route for {path}")]
    UnknownRoute { path: String },

    /// Source array dtype that cannot be cast to float32
    #[error("unsupported source dtype {dtype}")]
    UnsupportedDType { dtype: String },

    /// Chunk read back after writing differs from the source array
    #[error("chunk {chunk} of dataset {dataset} differs from the source array")]
    VerificationFailed { dataset: String, chunk: usize },
}

impl MeshChunkError {
    /// Returns whether the error is a "not found" condition.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            MeshChunkError::ArrayNotFound { .. }
                | MeshChunkError::ChunkNotFound { .. }
                | MeshChunkError::DatasetNotFound { .. }
                | MeshChunkError::InvalidDatasetName { .. }
                | MeshChunkError::MetadataNotFound { .. }
                | MeshChunkError::UnknownRoute { .. }
        )
    }

    /// Returns whether the error was caused by invalid writer input.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            MeshChunkError::InvalidChunkSize
                | MeshChunkError::InvalidDimension { .. }
                | MeshChunkError::InvalidShape { .. }
                | MeshChunkError::UnknownField { .. }
                | MeshChunkError::UnsupportedDType { .. }
        )
    }
}

impl IntoResponse for MeshChunkError {
    /// Convert from a `MeshChunkError` into an [axum::response::Response].
    fn into_response(self) -> Response {
        ErrorResponse::from(self).into_response()
    }
}

/// A response to send in error cases
///
/// The body is a single JSON object `{"error": "<message>"}`.
#[derive(Serialize)]
struct ErrorResponse {
    /// HTTP status of the response
    #[serde(skip)]
    status: StatusCode,

    /// Error message
    error: String,
}

impl ErrorResponse {
    fn new<E>(status: StatusCode, error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        ErrorResponse {
            status,
            error: error.to_string(),
        }
    }

    /// Return a 404 not found ErrorResponse
    fn not_found<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        Self::new(StatusCode::NOT_FOUND, error)
    }

    /// Return a 500 internal server error ErrorResponse
    fn internal_server_error<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error)
    }
}

impl From<MeshChunkError> for ErrorResponse {
    /// Convert from a `MeshChunkError` into an `ErrorResponse`.
    ///
    /// Only 404 and 500 are used. Invalid writer input never reaches the HTTP layer in normal
    /// operation, so it is reported as a server failure.
    fn from(error: MeshChunkError) -> Self {
        let response = if error.is_not_found() {
            Self::not_found(&error)
        } else {
            Self::internal_server_error(&error)
        };

        // Log server errors.
        if response.status.is_server_error() {
            event!(Level::ERROR, "{}", error.to_string());
            let mut current = error.source();
            while let Some(source) = current {
                event!(Level::ERROR, "Caused by: {}", source.to_string());
                current = source.source();
            }
        }

        response
    }
}

impl IntoResponse for ErrorResponse {
    /// Convert from an `ErrorResponse` into an `axum::response::Response`.
    ///
    /// Renders the response as JSON.
    fn into_response(self) -> Response {
        let json_body = serde_json::to_string(&self);
        match json_body {
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to serialise error response: {}", err),
            )
                .into_response(),
            Ok(json_body) => (
                self.status,
                [(&header::CONTENT_TYPE, mime::APPLICATION_JSON.to_string())],
                json_body,
            )
                .into_response(),
        }
    }
}
