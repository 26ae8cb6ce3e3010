//! Content-Encoding decoding for rewritable bodies.

use flate2::read::{DeflateDecoder, MultiGzDecoder, ZlibDecoder};
use std::io::Read;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("unsupported content encoding: {0}")]
    Unsupported(String),

    #[error("failed to decode {encoding} body: {source}")]
    Decode {
        encoding: String,
        #[source]
        source: std::io::Error,
    },

    #[error("decoded body exceeds {0} bytes")]
    TooLarge(usize),
}

/// Undo every coding listed in a `Content-Encoding` value.
///
/// Codings are listed in the order they were applied, so they're removed
/// last to first. `limit` caps the decoded size of each step.
pub fn decode_body(
    body: &[u8],
    content_encoding: Option<&str>,
    limit: usize,
) -> Result<Vec<u8>, CodecError> {
    let codings: Vec<String> = content_encoding
        .unwrap_or_default()
        .split(',')
        .map(|c| c.trim().to_ascii_lowercase())
        .filter(|c| !c.is_empty())
        .collect();

    let mut data = body.to_vec();
    for coding in codings.iter().rev() {
        data = match coding.as_str() {
            "identity" => data,
            "gzip" | "x-gzip" => read_limited(MultiGzDecoder::new(data.as_slice()), coding, limit)?,
            "deflate" => match read_limited(ZlibDecoder::new(data.as_slice()), coding, limit) {
                Ok(decoded) => decoded,
                // Some servers send raw deflate without the zlib wrapper.
                Err(CodecError::Decode { .. }) => {
                    read_limited(DeflateDecoder::new(data.as_slice()), coding, limit)?
                }
                Err(e) => return Err(e),
            },
            "br" => read_limited(brotli::Decompressor::new(data.as_slice(), 4096), coding, limit)?,
            other => return Err(CodecError::Unsupported(other.to_string())),
        };
    }
    Ok(data)
}

fn read_limited<R: Read>(reader: R, encoding: &str, limit: usize) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::new();
    reader
        .take(limit as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|source| CodecError::Decode {
            encoding: encoding.to_string(),
            source,
        })?;
    if out.len() > limit {
        return Err(CodecError::TooLarge(limit));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::{DeflateEncoder, GzEncoder, ZlibEncoder};
    use flate2::Compression;
    use std::io::Write;

    const TEXT: &[u8] = b"<rss><item><title>Golden Kamuy</title></item></rss>";
    const LIMIT: usize = 1024 * 1024;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    fn brotli(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        {
            let mut enc = brotli::CompressorWriter::new(&mut out, 4096, 9, 22);
            enc.write_all(data).unwrap();
        }
        out
    }

    #[test]
    fn test_plain_and_identity() {
        assert_eq!(decode_body(TEXT, None, LIMIT).unwrap(), TEXT);
        assert_eq!(decode_body(TEXT, Some("identity"), LIMIT).unwrap(), TEXT);
    }

    #[test]
    fn test_gzip_and_brotli() {
        assert_eq!(decode_body(&gzip(TEXT), Some("gzip"), LIMIT).unwrap(), TEXT);
        assert_eq!(decode_body(&gzip(TEXT), Some("X-GZIP"), LIMIT).unwrap(), TEXT);
        assert_eq!(decode_body(&brotli(TEXT), Some("br"), LIMIT).unwrap(), TEXT);
    }

    #[test]
    fn test_deflate_zlib_and_raw() {
        let mut zlib = ZlibEncoder::new(Vec::new(), Compression::default());
        zlib.write_all(TEXT).unwrap();
        assert_eq!(decode_body(&zlib.finish().unwrap(), Some("deflate"), LIMIT).unwrap(), TEXT);

        let mut raw = DeflateEncoder::new(Vec::new(), Compression::default());
        raw.write_all(TEXT).unwrap();
        assert_eq!(decode_body(&raw.finish().unwrap(), Some("deflate"), LIMIT).unwrap(), TEXT);
    }

    #[test]
    fn test_stacked_codings_decode_in_reverse() {
        let stacked = brotli(&gzip(TEXT));
        assert_eq!(decode_body(&stacked, Some("gzip, br"), LIMIT).unwrap(), TEXT);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            decode_body(TEXT, Some("zstd"), LIMIT),
            Err(CodecError::Unsupported(c)) if c == "zstd"
        ));
        assert!(matches!(
            decode_body(b"not gzip at all", Some("gzip"), LIMIT),
            Err(CodecError::Decode { .. })
        ));
        assert!(matches!(
            decode_body(&gzip(TEXT), Some("gzip"), 8),
            Err(CodecError::TooLarge(8))
        ));
    }
}
