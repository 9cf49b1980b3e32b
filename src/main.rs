//! This file defines the meshchunk server binary entry point.

use meshchunk::app;
use meshchunk::cli;
use meshchunk::metrics;
use meshchunk::server;
use meshchunk::tracing;

use std::process::ExitCode;

/// Application entry point
#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::parse();
    tracing::init_tracing();
    ::tracing::debug!("{:?}", args);
    if let Err(err) = metrics::register_metrics() {
        ::tracing::warn!("failed to register metrics: {}", err);
    }
    app::init(&args);
    let service = app::service(&args);
    match server::serve(&args, service).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            ::tracing::error!("server error: {}", err);
            ExitCode::FAILURE
        }
    }
}
