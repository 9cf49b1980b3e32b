//! HTTP routes and request handlers.

use crate::app_state::{AppState, SharedAppState};
use crate::cli::CommandLineArgs;
use crate::error::MeshChunkError;
use crate::layout::Dataset;
use crate::metrics::{self, metrics_handler, record_response_metrics, request_counter};
use crate::models::DatasetMetadata;

use axum::{
    extract::{rejection::PathRejection, Path, State},
    http::{header, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use bytes::Bytes;
use std::sync::Arc;
use tower::Layer;
use tower_http::cors::CorsLayer;
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};
use tower_http::trace::TraceLayer;
use tracing::{event, Level};

/// `Service` is a type alias for the router wrapped in trailing slash normalisation.
pub type Service = NormalizePath<Router>;

/// Application initialisation.
///
/// Sizes the global Rayon thread pool from the thread limit, if set.
///
/// # Arguments
///
/// * `args`: Command line arguments
pub fn init(args: &CommandLineArgs) {
    if let Some(thread_limit) = args.thread_limit {
        if let Err(err) = rayon::ThreadPoolBuilder::new()
            .num_threads(thread_limit)
            .build_global()
        {
            event!(Level::WARN, "failed to configure Rayon thread pool: {}", err);
        }
    }
}

/// Returns a [axum::Router] serving the mesh and field datasets of the data root.
///
/// Unknown paths and methods are answered with a JSON 404.
///
/// # Arguments
///
/// * `state`: Shared application state
pub fn router(state: SharedAppState) -> Router {
    let cors = state.args.cors;
    let router = Router::new()
        .route(
            "/api/mesh/metadata",
            get(mesh_metadata).fallback(unknown_route),
        )
        .route(
            "/api/mesh/chunk/:chunk_id",
            get(mesh_chunk).fallback(unknown_route),
        )
        .route(
            "/api/field/:field_name/metadata",
            get(field_metadata).fallback(unknown_route),
        )
        .route(
            "/api/field/:field_name/chunk/:chunk_id",
            get(field_chunk).fallback(unknown_route),
        )
        .route("/metrics", get(metrics_handler).fallback(unknown_route))
        .fallback(unknown_route)
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .on_request(request_counter)
                .on_response(record_response_metrics),
        );
    if cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

/// Returns a [crate::app::Service] with trailing slashes trimmed before routing.
///
/// # Arguments
///
/// * `args`: Command line arguments
pub fn service(args: &CommandLineArgs) -> Service {
    let state = Arc::new(AppState::new(args));
    NormalizePathLayer::trim_trailing_slash().layer(router(state))
}

/// Uncompressed chunk bytes, sent as a binary attachment.
struct ChunkResponse {
    chunk_index: usize,
    data: Bytes,
}

impl IntoResponse for ChunkResponse {
    fn into_response(self) -> Response {
        (
            [
                (
                    header::CONTENT_TYPE,
                    mime::APPLICATION_OCTET_STREAM.to_string(),
                ),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"chunk_{}.bin\"", self.chunk_index),
                ),
            ],
            self.data,
        )
            .into_response()
    }
}

async fn unknown_route(uri: Uri) -> MeshChunkError {
    MeshChunkError::UnknownRoute {
        path: uri.path().to_string(),
    }
}

async fn mesh_metadata(
    State(state): State<SharedAppState>,
) -> Result<Json<DatasetMetadata>, MeshChunkError> {
    get_metadata(&state, Dataset::Mesh).await.map(Json)
}

async fn mesh_chunk(
    State(state): State<SharedAppState>,
    path: Result<Path<String>, PathRejection>,
) -> Result<ChunkResponse, MeshChunkError> {
    let Path(chunk_id) = path.map_err(rejected)?;
    get_chunk(&state, Dataset::Mesh, &chunk_id).await
}

async fn field_metadata(
    State(state): State<SharedAppState>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<DatasetMetadata>, MeshChunkError> {
    let Path(field_name) = path.map_err(rejected)?;
    get_metadata(&state, Dataset::field(&field_name)?)
        .await
        .map(Json)
}

async fn field_chunk(
    State(state): State<SharedAppState>,
    path: Result<Path<(String, String)>, PathRejection>,
) -> Result<ChunkResponse, MeshChunkError> {
    let Path((field_name, chunk_id)) = path.map_err(rejected)?;
    get_chunk(&state, Dataset::field(&field_name)?, &chunk_id).await
}

/// Path parameters that cannot be extracted do not name a resource.
fn rejected(rejection: PathRejection) -> MeshChunkError {
    MeshChunkError::UnknownRoute {
        path: rejection.body_text(),
    }
}

/// Read the metadata descriptor of a dataset on the blocking pool.
async fn get_metadata(
    state: &SharedAppState,
    dataset: Dataset,
) -> Result<DatasetMetadata, MeshChunkError> {
    let reader = state.reader.clone();
    tokio::task::spawn_blocking(move || reader.get_metadata(&dataset)).await?
}

/// Handler for chunk requests
///
/// The chunk id must be a decimal integer, otherwise the chunk does not exist. Memory for the
/// uncompressed chunk is reserved before the chunk is read. Decompression runs on Rayon if
/// enabled, or on the blocking pool bounded by the task limit.
///
/// # Arguments
///
/// * `state`: Shared application state
/// * `dataset`: Dataset to read from
/// * `chunk_id`: Chunk id as it appears in the request path
#[tracing::instrument(level = "DEBUG", skip(state, dataset), fields(dataset = dataset.name()))]
async fn get_chunk(
    state: &SharedAppState,
    dataset: Dataset,
    chunk_id: &str,
) -> Result<ChunkResponse, MeshChunkError> {
    let not_found = || MeshChunkError::ChunkNotFound {
        dataset: dataset.name().to_string(),
        chunk: chunk_id.to_string(),
    };
    if chunk_id.is_empty() || !chunk_id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(not_found());
    }
    let chunk_index: usize = chunk_id.parse().map_err(|_| not_found())?;

    let metadata = get_metadata(state, dataset.clone()).await?;
    let chunk_bytes = metadata.chunk_byte_len(chunk_index).ok_or_else(not_found)?;
    let _memory_permit = state.resource_manager.memory(chunk_bytes).await?;

    let dataset_kind = match dataset {
        Dataset::Mesh => "mesh",
        Dataset::Field(_) => "field",
    };
    let reader = state.reader.clone();
    let data = if state.args.use_rayon {
        tokio_rayon::spawn(move || reader.read_chunk(&dataset, &metadata, chunk_index)).await?
    } else {
        let _task_permit = state.resource_manager.task().await?;
        tokio::task::spawn_blocking(move || reader.read_chunk(&dataset, &metadata, chunk_index))
            .await??
    };
    metrics::record_chunk_bytes(dataset_kind, data.len());
    Ok(ChunkResponse { chunk_index, data })
}
