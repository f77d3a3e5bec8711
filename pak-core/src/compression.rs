/*!
Compression adapters for archive payloads.

The default implementation uses gzip. Compressed payloads are recognised by their
leading magic bytes, so an archive written without compression still loads through
a compressing codec and vice versa.
*/

use std::io::{Read, Write};

use flate2::{read::GzDecoder, write::GzEncoder, Compression};

use crate::{PakError, Result};

/// Leading bytes of every gzip stream
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Compression abstraction for archive payloads
///
/// This trait defines the interface for all compression implementations.
/// It allows the codec to work with different compression algorithms
/// without being coupled to any specific implementation.
pub trait CompressionAdapter {
    /// Compress the input data
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Decompress the input data
    fn decompress(&self, compressed_data: &[u8]) -> Result<Vec<u8>>;

    /// Whether `data` looks like the output of [`CompressionAdapter::compress`]
    fn detect(&self, data: &[u8]) -> bool;

    /// Get the name of the compression algorithm
    fn algorithm_name(&self) -> &str;
}

impl<C: CompressionAdapter + ?Sized> CompressionAdapter for Box<C> {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        (**self).compress(data)
    }

    fn decompress(&self, compressed_data: &[u8]) -> Result<Vec<u8>> {
        (**self).decompress(compressed_data)
    }

    fn detect(&self, data: &[u8]) -> bool {
        (**self).detect(data)
    }

    fn algorithm_name(&self) -> &str {
        (**self).algorithm_name()
    }
}

/// Gzip compression adapter
///
/// This implementation uses the DEFLATE algorithm (gzip) to compress archive data.
///
/// # Example
/// ```rust
/// use pak_core::{CompressionAdapter, GzipCompressor};
///
/// let compressor = GzipCompressor::new();
/// let data = b"some archive data to compress";
/// let compressed = compressor.compress(data)?;
/// assert!(compressor.detect(&compressed));
/// let decompressed = compressor.decompress(&compressed)?;
/// assert_eq!(data, &decompressed[..]);
/// # Ok::<(), pak_core::PakError>(())
/// ```
#[derive(Debug, Clone)]
pub struct GzipCompressor {
    compression_level: Compression,
}

impl GzipCompressor {
    /// Create a new gzip compressor with default compression level (6)
    pub fn new() -> Self {
        Self {
            compression_level: Compression::default(),
        }
    }

    /// Create a new gzip compressor with the specified compression level
    ///
    /// # Arguments
    /// * `level` - Compression level (0-9, where 0 is no compression and 9 is maximum)
    pub fn with_level(level: u32) -> Self {
        Self {
            compression_level: Compression::new(level),
        }
    }

    /// Create a compressor for fast compression (level 1)
    pub fn fast() -> Self {
        Self::with_level(1)
    }

    /// Create a compressor for maximum compression (level 9)
    pub fn max() -> Self {
        Self::with_level(9)
    }

    /// Check for the gzip magic without needing an instance
    pub fn sniff(data: &[u8]) -> bool {
        data.starts_with(&GZIP_MAGIC)
    }
}

impl Default for GzipCompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl CompressionAdapter for GzipCompressor {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(Vec::new(), self.compression_level);

        encoder.write_all(data).map_err(|e| {
            PakError::compression(format!("Failed to write data for compression: {e}"))
        })?;

        encoder
            .finish()
            .map_err(|e| PakError::compression(format!("Failed to finish compression: {e}")))
    }

    fn decompress(&self, compressed_data: &[u8]) -> Result<Vec<u8>> {
        let mut decoder = GzDecoder::new(compressed_data);
        let mut decompressed = Vec::new();

        decoder
            .read_to_end(&mut decompressed)
            .map_err(|e| PakError::compression(format!("Failed to decompress data: {e}")))?;

        Ok(decompressed)
    }

    fn detect(&self, data: &[u8]) -> bool {
        Self::sniff(data)
    }

    fn algorithm_name(&self) -> &str {
        "gzip"
    }
}

/// No-compression adapter
///
/// Passes data through untouched. It never claims incoming data, so gzip
/// archives are still recognised by the codec's fallback sniff.
#[derive(Debug, Clone)]
pub struct NoCompression;

impl NoCompression {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NoCompression {
    fn default() -> Self {
        Self::new()
    }
}

impl CompressionAdapter for NoCompression {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decompress(&self, compressed_data: &[u8]) -> Result<Vec<u8>> {
        Ok(compressed_data.to_vec())
    }

    fn detect(&self, _data: &[u8]) -> bool {
        false
    }

    fn algorithm_name(&self) -> &str {
        "none"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gzip_compression_roundtrip() {
        let compressor = GzipCompressor::new();
        let original_data = b"player.inventory.gold = 100; player.inventory.items = []; ".repeat(10);

        let compressed = compressor.compress(&original_data).unwrap();

        // Compressed data should be smaller for repetitive content
        assert!(compressed.len() < original_data.len());

        let decompressed = compressor.decompress(&compressed).unwrap();
        assert_eq!(original_data, decompressed);
    }

    #[test]
    fn test_gzip_compression_levels() {
        let test_data = b"Some archive data to compress with different levels".repeat(20);

        let fast_compressor = GzipCompressor::fast();
        let default_compressor = GzipCompressor::new();
        let max_compressor = GzipCompressor::max();

        let fast_compressed = fast_compressor.compress(&test_data).unwrap();
        let default_compressed = default_compressor.compress(&test_data).unwrap();
        let max_compressed = max_compressor.compress(&test_data).unwrap();

        assert!(max_compressed.len() <= default_compressed.len());

        assert_eq!(fast_compressor.decompress(&fast_compressed).unwrap(), test_data);
        assert_eq!(default_compressor.decompress(&default_compressed).unwrap(), test_data);
        assert_eq!(max_compressor.decompress(&max_compressed).unwrap(), test_data);
    }

    #[test]
    fn test_gzip_output_starts_with_magic() {
        let compressed = GzipCompressor::new().compress(b"abc").unwrap();
        assert_eq!(&compressed[..2], &GZIP_MAGIC);
        assert!(GzipCompressor::sniff(&compressed));
        assert!(!GzipCompressor::sniff(b"PAK\x01"));
        assert!(!GzipCompressor::sniff(b""));
    }

    #[test]
    fn test_no_compression() {
        let compressor = NoCompression::new();
        let test_data = b"test data";

        let compressed = compressor.compress(test_data).unwrap();
        assert_eq!(compressed, test_data);

        let decompressed = compressor.decompress(&compressed).unwrap();
        assert_eq!(decompressed, test_data);

        assert_eq!(compressor.algorithm_name(), "none");
        assert!(!compressor.detect(&GZIP_MAGIC));
    }

    #[test]
    fn test_boxed_adapter_delegates() {
        let boxed: Box<dyn CompressionAdapter> = Box::new(GzipCompressor::max());
        assert_eq!(boxed.algorithm_name(), "gzip");
        let compressed = boxed.compress(b"boxed").unwrap();
        assert!(boxed.detect(&compressed));
        assert_eq!(boxed.decompress(&compressed).unwrap(), b"boxed");
    }

    #[test]
    fn test_gzip_empty_data() {
        let compressor = GzipCompressor::new();
        let empty_data = b"";

        let compressed = compressor.compress(empty_data).unwrap();
        let decompressed = compressor.decompress(&compressed).unwrap();

        assert_eq!(decompressed, empty_data);
    }

    #[test]
    fn test_gzip_invalid_compressed_data() {
        let compressor = GzipCompressor::new();
        let invalid_data = b"this is not compressed gzip data";

        let result = compressor.decompress(invalid_data);
        assert!(result.is_err());
    }
}
