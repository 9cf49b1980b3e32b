//! This file defines the preprocess binary entry point.

use meshchunk::cli::PreprocessArgs;
use meshchunk::preprocess;
use meshchunk::tracing;

use clap::Parser;
use std::error::Error;
use std::process::ExitCode;

/// Preprocessor entry point
fn main() -> ExitCode {
    let args = PreprocessArgs::parse();
    tracing::init_tracing();
    match preprocess::run(&args) {
        Ok(metadata) => {
            ::tracing::info!(
                total_points = metadata.total_points,
                total_chunks = metadata.total_chunks,
                "preprocessing complete"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            ::tracing::error!("{}", err);
            let mut current = err.source();
            while let Some(source) = current {
                ::tracing::error!("Caused by: {}", source);
                current = source.source();
            }
            ExitCode::from(preprocess::exit_status(&err))
        }
    }
}
