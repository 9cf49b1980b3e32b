//! (De)compression support.
//!
//! Chunks are compressed whole with zlib. Compression uses [flate2]; decompression uses
//! [zune_inflate], which is faster for the read-heavy serving path.

use crate::error::MeshChunkError;

use bytes::Bytes;
use flate2::write::ZlibEncoder;
use std::io::Write;
use zune_inflate::{DeflateDecoder, DeflateOptions};

/// Default zlib compression level.
pub const DEFAULT_LEVEL: u32 = 6;

/// Smallest output limit applied when decompressing, in bytes.
const MIN_OUTPUT_LIMIT: usize = 1 << 30;

/// Compresses a chunk and returns the zlib stream.
///
/// # Arguments
///
/// * `data`: Uncompressed chunk bytes
/// * `level`: zlib compression level, 0-9
pub fn compress(data: &[u8], level: u32) -> Result<Vec<u8>, MeshChunkError> {
    let mut encoder = ZlibEncoder::new(
        Vec::with_capacity(data.len() / 2),
        flate2::Compression::new(level),
    );
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Decompresses a zlib stream and returns the uncompressed data.
///
/// # Arguments
///
/// * `data`: Compressed chunk bytes
/// * `size_hint`: Expected uncompressed length in bytes
pub fn decompress(data: &[u8], size_hint: usize) -> Result<Bytes, MeshChunkError> {
    let options = DeflateOptions::default()
        .set_size_hint(size_hint)
        .set_limit(output_limit(size_hint));
    let mut decoder = DeflateDecoder::new_with_options(data, options);
    let data = decoder.decode_zlib()?;
    Ok(data.into())
}

/// Output limit for a chunk of `size_hint` bytes.
///
/// Never below [MIN_OUTPUT_LIMIT], so that an oversized chunk is still decoded in full and its
/// length can be reported.
fn output_limit(size_hint: usize) -> usize {
    std::cmp::max(size_hint, MIN_OUTPUT_LIMIT)
}
