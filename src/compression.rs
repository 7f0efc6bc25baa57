//! Zlib compression and decompression.
//!
//! The container and invitation formats are produced by Python's `zlib` and
//! consumed by `pako`, so the stream format is zlib (RFC 1950), not raw deflate.

use std::io::{Read, Write};

use flate2::Compression as FlateCompression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;

use crate::config::MAX_INFLATED_SIZE;
use crate::error::{Error, Result};

/// Zlib compressor/decompressor at the default level, matching `zlib.compress`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Compressor;

impl Compressor {
    /// Compresses data into a zlib stream.
    ///
    /// Empty input is valid and yields a minimal stream.
    pub fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 2 + 16), FlateCompression::default());
        encoder.write_all(data).map_err(|e| Error::Compression(format!("compression failed: {e}")))?;

        encoder.finish().map_err(|e| Error::Compression(format!("compression finalization failed: {e}")))
    }

    /// Inflates a zlib stream of at most [`MAX_INFLATED_SIZE`] bytes.
    pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
        Self::decompress_limited(data, MAX_INFLATED_SIZE)
    }

    /// Inflates a zlib stream, failing once the output would exceed `limit`.
    pub fn decompress_limited(data: &[u8], limit: usize) -> Result<Vec<u8>> {
        if data.is_empty() {
            return Err(Error::Compression("data cannot be empty".into()));
        }

        // One byte past the limit is enough to tell "at the limit" from "over it".
        let mut decoder = ZlibDecoder::new(data).take(limit as u64 + 1);
        let mut decompressed = Vec::new();
        decoder.read_to_end(&mut decompressed).map_err(|e| Error::Compression(format!("decompression failed: {e}")))?;

        if decompressed.len() > limit {
            return Err(Error::Compression(format!("inflated data exceeds {limit} bytes")));
        }

        Ok(decompressed)
    }
}
