use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::{Error, Result};

/// Compress a resource payload with standard zlib framing (2-byte header,
/// 4-byte Adler32 trailer).
pub fn deflate(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    Ok(encoder.finish()?)
}

/// Inflate a zlib stream to exactly `expected_size` bytes.
///
/// `expected_size` is authoritative: it pre-allocates the output and any
/// stream that is malformed, falls short, or keeps producing past it is
/// rejected as corrupted.
pub fn inflate(bytes: &[u8], expected_size: usize) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(bytes);
    let mut output = vec![0u8; expected_size];
    decoder
        .read_exact(&mut output)
        .map_err(|e| Error::corrupted(format!("zlib stream ended early: {e}")))?;

    let mut overflow = [0u8; 1];
    match decoder.read(&mut overflow) {
        Ok(0) => Ok(output),
        Ok(_) => Err(Error::corrupted(format!(
            "zlib stream produced more than the declared {expected_size} bytes"
        ))),
        Err(e) => Err(Error::corrupted(format!("malformed zlib stream: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let payload: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();
        let packed = deflate(&payload).unwrap();
        assert!(packed.len() < payload.len());
        assert_eq!(inflate(&packed, payload.len()).unwrap(), payload);
    }

    #[test]
    fn zlib_framing_present() {
        let packed = deflate(b"hello").unwrap();
        // 0x78 is the zlib CMF byte for deflate with a 32K window.
        assert_eq!(packed[0], 0x78);
    }

    #[test]
    fn wrong_expected_size_is_corrupted() {
        let packed = deflate(b"hello").unwrap();
        assert!(matches!(
            inflate(&packed, 4),
            Err(Error::CorruptedData(_))
        ));
        assert!(matches!(
            inflate(&packed, 6),
            Err(Error::CorruptedData(_))
        ));
    }

    #[test]
    fn garbage_is_corrupted() {
        assert!(matches!(
            inflate(&[0xDE, 0xAD, 0xBE, 0xEF], 10),
            Err(Error::CorruptedData(_))
        ));
    }
}
