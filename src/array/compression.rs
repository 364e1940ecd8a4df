//! Chunk compression.
//!
//! The compressor of an array is recorded in its metadata, e.g. `"compressor": {"name": "gzip", "level": 5}`.

use serde::{Deserialize, Serialize};

use super::ArrayError;

/// A chunk compressor.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "name", rename_all = "lowercase")]
pub enum Compressor {
    /// `gzip` compression.
    Gzip {
        /// The compression level, 0 to 9.
        level: u32,
    },
}

impl Compressor {
    /// Create a new gzip compressor. `level` is clamped to 9.
    #[must_use]
    pub fn gzip(level: u32) -> Self {
        Self::Gzip {
            level: level.min(9),
        }
    }

    /// Compress chunk bytes.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if compression fails or the compressor is not enabled.
    pub fn encode(&self, decoded: &[u8]) -> Result<Vec<u8>, ArrayError> {
        match self {
            #[cfg(feature = "gzip")]
            Self::Gzip { level } => {
                use std::io::Read;
                let mut encoder =
                    flate2::bufread::GzEncoder::new(decoded, flate2::Compression::new(*level));
                let mut out: Vec<u8> = Vec::new();
                encoder.read_to_end(&mut out)?;
                Ok(out)
            }
            #[cfg(not(feature = "gzip"))]
            Self::Gzip { .. } => {
                let _ = decoded;
                Err(ArrayError::UnsupportedCompressor("gzip".to_string()))
            }
        }
    }

    /// Decompress chunk bytes.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the bytes are not valid or the compressor is not enabled.
    pub fn decode(&self, encoded: &[u8]) -> Result<Vec<u8>, ArrayError> {
        match self {
            #[cfg(feature = "gzip")]
            Self::Gzip { .. } => {
                use std::io::Read;
                let mut decoder = flate2::bufread::GzDecoder::new(encoded);
                let mut out: Vec<u8> = Vec::new();
                decoder.read_to_end(&mut out)?;
                Ok(out)
            }
            #[cfg(not(feature = "gzip"))]
            Self::Gzip { .. } => {
                let _ = encoded;
                Err(ArrayError::UnsupportedCompressor("gzip".to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compressor_metadata() {
        let compressor: Compressor = serde_json::from_str(r#"{"name":"gzip","level":1}"#).unwrap();
        assert_eq!(compressor, Compressor::gzip(1));
        assert_eq!(Compressor::gzip(12), Compressor::Gzip { level: 9 });
        assert!(serde_json::from_str::<Compressor>(r#"{"name":"zstd","level":1}"#).is_err());
    }

    #[cfg(feature = "gzip")]
    #[test]
    fn compressor_gzip() {
        let bytes: Vec<u8> = (0..255u8).cycle().take(4096).collect();
        let compressor = Compressor::gzip(5);
        let encoded = compressor.encode(&bytes).unwrap();
        assert!(encoded.len() < bytes.len());
        assert_eq!(compressor.decode(&encoded).unwrap(), bytes);
        assert!(compressor.decode(&bytes).is_err());
    }
}
