//! Command Line Interface (CLI) arguments.

use byte_unit::Byte;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Default chunk size, in points, for field datasets.
pub const DEFAULT_FIELD_CHUNK_SIZE: usize = 10_240_000;

/// Default chunk size, in points, for the mesh dataset.
pub const DEFAULT_MESH_CHUNK_SIZE: usize = 50_000;

/// Mesh chunk server command line interface
#[derive(Clone, Debug, Parser)]
pub struct CommandLineArgs {
    /// The IP address on which the server should listen
    #[arg(long, default_value = "0.0.0.0", env = "MESHCHUNK_HOST")]
    pub host: String,
    /// The port to which the server should bind
    #[arg(long, default_value_t = 5000, env = "MESHCHUNK_PORT")]
    pub port: u16,
    /// Directory containing one sub-directory per dataset
    #[arg(long, default_value = "data/processed", env = "MESHCHUNK_DATA_ROOT")]
    pub data_root: PathBuf,
    /// Flag indicating whether HTTPS should be used
    #[arg(long, default_value_t = false, env = "MESHCHUNK_HTTPS")]
    pub https: bool,
    /// Path to the certificate file to be used for HTTPS encryption
    #[arg(
        long,
        default_value = "~/.config/meshchunk/certs/cert.pem",
        env = "MESHCHUNK_CERT_FILE"
    )]
    pub cert_file: String,
    /// Path to the key file to be used for HTTPS encryption
    #[arg(
        long,
        default_value = "~/.config/meshchunk/certs/key.pem",
        env = "MESHCHUNK_KEY_FILE"
    )]
    pub key_file: String,
    /// Maximum time in seconds to wait for requests to complete upon receiving `ctrl+c` signal.
    #[arg(long, default_value_t = 60, env = "MESHCHUNK_SHUTDOWN_TIMEOUT")]
    pub graceful_shutdown_timeout: u64,
    /// Whether to use Rayon for chunk decompression.
    #[arg(long, default_value_t = false, env = "MESHCHUNK_USE_RAYON")]
    pub use_rayon: bool,
    /// Maximum number of chunks decompressed concurrently. Also sizes the Rayon thread pool.
    /// Defaults to the number of CPUs minus one.
    #[arg(long, env = "MESHCHUNK_THREAD_LIMIT")]
    pub thread_limit: Option<usize>,
    /// Memory limit for decompressed chunks held concurrently, e.g. "512MiB".
    #[arg(long, value_parser = parse_byte_size, env = "MESHCHUNK_MEMORY_LIMIT")]
    pub memory_limit: Option<usize>,
    /// Whether to allow cross-origin requests from any origin.
    #[arg(long, default_value_t = true, env = "MESHCHUNK_CORS", action = clap::ArgAction::Set)]
    pub cors: bool,
}

/// Returns parsed command line arguments.
pub fn parse() -> CommandLineArgs {
    CommandLineArgs::parse()
}

/// Parse a human readable byte size such as "1GiB" or "1000".
fn parse_byte_size(value: &str) -> Result<usize, String> {
    let bytes = Byte::parse_str(value, /* ignore case */ true)
        .map_err(|err| err.to_string())?
        .as_u64();
    usize::try_from(bytes).map_err(|err| err.to_string())
}

/// Kind of source array to preprocess.
#[derive(Clone, Copy, Debug, PartialEq, ValueEnum)]
pub enum DataType {
    /// Mesh node coordinates
    Mesh,
    /// Physical field
    Field,
}

/// Preprocessor command line interface
#[derive(Clone, Debug, Parser)]
#[command(name = "preprocess", about = "Split a mesh or field array into compressed chunks")]
pub struct PreprocessArgs {
    /// Input .npz archive or .npy file
    pub input: PathBuf,
    /// Kind of array to process
    #[arg(short = 't', long = "type", value_enum)]
    pub data_type: DataType,
    /// Field name, required for field processing
    #[arg(short, long, required_if_eq("data_type", "field"))]
    pub field: Option<String>,
    /// Data root directory; the dataset is written to a sub-directory named after it
    #[arg(short, long)]
    pub output: PathBuf,
    /// Chunk size in points [default: 10240000 for fields, 50000 for the mesh]
    #[arg(short, long)]
    pub chunk: Option<usize>,
    /// Column to extract from a vector or tensor field
    #[arg(short = 'd', long = "vector_dimension", default_value_t = 0)]
    pub vector_dimension: usize,
    /// Store chunks uncompressed
    #[arg(long = "no-compress", default_value_t = false)]
    pub no_compress: bool,
    /// zlib compression level
    #[arg(
        short = 'l',
        long,
        default_value_t = crate::compression::DEFAULT_LEVEL,
        value_parser = clap::value_parser!(u32).range(0..=9)
    )]
    pub compression_level: u32,
    /// Name of the array within a .npz archive [default: node_coords for the mesh, the field name
    /// for fields]
    #[arg(long)]
    pub array: Option<String>,
    /// Read every chunk back and compare it with the source array
    #[arg(long, default_value_t = false)]
    pub verify: bool,
}

impl PreprocessArgs {
    /// Chunk size, falling back to the default for the data type.
    pub fn chunk_size(&self) -> usize {
        self.chunk.unwrap_or(match self.data_type {
            DataType::Mesh => DEFAULT_MESH_CHUNK_SIZE,
            DataType::Field => DEFAULT_FIELD_CHUNK_SIZE,
        })
    }
}
