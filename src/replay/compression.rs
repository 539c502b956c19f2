//! Content-encoding codecs for replayed bodies

use std::io::{Read, Write};

use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;

use crate::{Result, SnapError};

/// Brotli quality used when re-encoding bodies
const BROTLI_QUALITY: u32 = 9;
/// Brotli window size (log2)
const BROTLI_WINDOW: u32 = 22;
/// Buffer size for brotli streams
const BROTLI_BUFFER: usize = 4096;

/// A single `content-encoding` token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// No transformation
    Identity,
    /// gzip (RFC 1952)
    Gzip,
    /// zlib-wrapped deflate (RFC 1950)
    Deflate,
    /// brotli (RFC 7932)
    Brotli,
}

impl Encoding {
    /// Parse one encoding token
    ///
    /// # Errors
    ///
    /// Returns [`SnapError::UnsupportedEncoding`] for `compress`, `zstd` and
    /// anything unrecognized
    pub fn parse(token: &str) -> Result<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "" | "identity" => Ok(Encoding::Identity),
            "gzip" | "x-gzip" => Ok(Encoding::Gzip),
            "deflate" => Ok(Encoding::Deflate),
            "br" => Ok(Encoding::Brotli),
            other => Err(SnapError::UnsupportedEncoding(other.to_string())),
        }
    }

    /// Parse a full header value; encodings are listed in application order
    ///
    /// # Errors
    ///
    /// Returns error if any listed encoding is unsupported
    pub fn parse_header(value: &str) -> Result<Vec<Self>> {
        value.split(',').map(Self::parse).collect()
    }
}

/// Apply one encoding
///
/// # Errors
///
/// Returns error if the codec fails
pub fn encode(body: &[u8], encoding: Encoding) -> Result<Vec<u8>> {
    match encoding {
        Encoding::Identity => Ok(body.to_vec()),
        Encoding::Gzip => {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(body).map_err(codec_error)?;
            encoder.finish().map_err(codec_error)
        }
        Encoding::Deflate => {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(body).map_err(codec_error)?;
            encoder.finish().map_err(codec_error)
        }
        Encoding::Brotli => {
            let mut writer = brotli::CompressorWriter::new(
                Vec::new(),
                BROTLI_BUFFER,
                BROTLI_QUALITY,
                BROTLI_WINDOW,
            );
            writer.write_all(body).map_err(codec_error)?;
            Ok(writer.into_inner())
        }
    }
}

/// Reverse one encoding
///
/// # Errors
///
/// Returns error if the body is not valid for the encoding
pub fn decode(body: &[u8], encoding: Encoding) -> Result<Vec<u8>> {
    let mut decoded = Vec::new();
    match encoding {
        Encoding::Identity => decoded.extend_from_slice(body),
        Encoding::Gzip => {
            GzDecoder::new(body)
                .read_to_end(&mut decoded)
                .map_err(codec_error)?;
        }
        Encoding::Deflate => {
            ZlibDecoder::new(body)
                .read_to_end(&mut decoded)
                .map_err(codec_error)?;
        }
        Encoding::Brotli => {
            brotli::Decompressor::new(body, BROTLI_BUFFER)
                .read_to_end(&mut decoded)
                .map_err(codec_error)?;
        }
    }
    Ok(decoded)
}

/// Apply every encoding of a `content-encoding` header value, in order
///
/// # Errors
///
/// Returns error if an encoding is unsupported or a codec fails
pub fn encode_header(body: &[u8], header_value: &str) -> Result<Vec<u8>> {
    Encoding::parse_header(header_value)?
        .into_iter()
        .try_fold(body.to_vec(), |data, encoding| encode(&data, encoding))
}

/// Undo every encoding of a `content-encoding` header value
///
/// # Errors
///
/// Returns error if an encoding is unsupported or the body is malformed
pub fn decode_header(body: &[u8], header_value: &str) -> Result<Vec<u8>> {
    Encoding::parse_header(header_value)?
        .into_iter()
        .rev()
        .try_fold(body.to_vec(), |data, encoding| decode(&data, encoding))
}

fn codec_error(e: std::io::Error) -> SnapError {
    SnapError::Compression(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &[u8] = b"{\"num\":614,\"title\":\"Woodpecker\",\"safe_title\":\"Woodpecker\"}";

    #[test]
    fn test_supported_codecs_restore_input() {
        for encoding in [
            Encoding::Identity,
            Encoding::Gzip,
            Encoding::Deflate,
            Encoding::Brotli,
        ] {
            let encoded = encode(SAMPLE, encoding).unwrap();
            assert_eq!(decode(&encoded, encoding).unwrap(), SAMPLE, "{encoding:?}");
        }
    }

    #[test]
    fn test_gzip_magic() {
        let encoded = encode(SAMPLE, Encoding::Gzip).unwrap();
        assert_eq!(&encoded[..2], &[0x1f, 0x8b]);
    }

    #[test]
    fn test_unsupported_encodings() {
        for token in ["compress", "zstd", "lz4"] {
            assert!(matches!(
                Encoding::parse(token),
                Err(SnapError::UnsupportedEncoding(_))
            ));
        }
    }

    #[test]
    fn test_header_parsing() {
        assert_eq!(
            Encoding::parse_header("gzip, br").unwrap(),
            vec![Encoding::Gzip, Encoding::Brotli]
        );
        assert_eq!(Encoding::parse_header("X-GZIP").unwrap(), vec![Encoding::Gzip]);
        assert!(Encoding::parse_header("gzip, zstd").is_err());
    }

    #[test]
    fn test_stacked_encodings() {
        let encoded = encode_header(SAMPLE, "deflate, gzip").unwrap();
        assert_eq!(&encoded[..2], &[0x1f, 0x8b]);
        assert_eq!(decode_header(&encoded, "deflate, gzip").unwrap(), SAMPLE);
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(decode(b"definitely not gzip", Encoding::Gzip).is_err());
    }
}
