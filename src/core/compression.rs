//! Payload compression.
//!
//! Array payloads sent to the client may be zlib-compressed. Compression is
//! only kept when it actually makes the payload smaller.

use std::io::{Read, Write};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::util::Result;

/// Compress data using zlib.
///
/// # Arguments
/// * `data` - Data to compress
/// * `level` - Compression level (0-9, where 0 disables compression)
///
/// Returns `None` when compression is disabled or would not save space.
pub fn compress(data: &[u8], level: u32) -> Result<Option<Vec<u8>>> {
    if level == 0 || data.is_empty() {
        return Ok(None);
    }

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(level.min(9)));
    encoder.write_all(data)?;
    let compressed = encoder.finish()?;

    if compressed.len() >= data.len() {
        return Ok(None);
    }
    Ok(Some(compressed))
}

/// Decompress a zlib stream produced by [`compress`].
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::with_capacity(data.len() * 2);
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compress_decompress() {
        let original = b"points points points points points points ".repeat(100);

        let compressed = compress(&original, 6).unwrap().expect("should compress");
        assert!(compressed.len() < original.len());

        assert_eq!(decompress(&compressed).unwrap(), original);
    }

    #[test]
    fn test_level_zero_disables() {
        assert!(compress(b"Short data", 0).unwrap().is_none());
    }

    #[test]
    fn test_incompressible_is_skipped() {
        assert!(compress(b"Hi", 9).unwrap().is_none());
    }

    #[test]
    fn test_decompress_garbage_fails() {
        assert!(decompress(b"definitely not zlib").is_err());
    }
}
