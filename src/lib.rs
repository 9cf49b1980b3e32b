//! This crate re-packages large simulation arrays into a chunked, compressed and randomly
//! addressable binary layout, and serves the chunks over HTTP to a visualisation client.
//!
//! A dataset is either the mesh (node coordinates, three float32 values per node) or one
//! component of a physical field (one float32 value per node). Each dataset lives in its own
//! directory below a data root:
//!
//! ```text
//! {root}/mesh/metadata.json
//! {root}/mesh/coords_0000.bin
//! {root}/{field}/metadata.json
//! {root}/{field}/{field}_c0_0000.bin
//! ```
//!
//! Chunk files hold little-endian float32 values, optionally zlib compressed as a whole. The
//! `metadata.json` descriptor records how many points there are, how they are split into chunks
//! and whether the chunks are compressed. It is written last, so a dataset is only visible to
//! readers once all of its chunks are in place.
//!
//! The crate is built on a number of open source components.
//!
//! * [Tokio](tokio), the most popular asynchronous Rust runtime.
//! * [Axum](axum) web framework, built by the Tokio team, on top of the [hyper] HTTP library.
//! * [Serde](serde) performs (de)serialisation of the JSON metadata descriptors.
//! * [ndarray] provides [NumPy](https://numpy.org)-like n-dimensional arrays, and [npyz] reads
//!   the `.npy`/`.npz` source files.
//! * [flate2] and [zune_inflate] implement zlib compression and decompression.

pub mod app;
pub mod app_state;
pub mod array;
pub mod cli;
pub mod compression;
pub mod error;
pub mod layout;
pub mod metrics;
pub mod models;
pub mod preprocess;
pub mod reader;
pub mod resource_manager;
pub mod server;
#[cfg(test)]
pub mod test_utils;
pub mod tracing;
pub mod writer;
