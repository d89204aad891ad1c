use super::dds::{
    DdsHeader, DDS_FOURCC_OFFSET, DDS_HEADER_SIZE, FOURCC_DST1, FOURCC_DST5, FOURCC_DXT1,
    FOURCC_DXT5,
};
use crate::{Error, Result};

/// DST textures are DXT surfaces whose block bytes have been regrouped by
/// kind so that an outer compressor sees long runs of similar data. The
/// transforms below convert between the two layouts; both directions keep
/// the 128-byte DDS header and only rewrite the FourCC.
///
/// DST1 splits every 8-byte DXT1 block into two 4-byte halves (color
/// endpoints, then indices) and stores all first halves followed by all
/// second halves.
///
/// DST5 splits every 16-byte DXT5 block into four sections placed at
/// payload offsets `[0, S/8, 3S/8, 3S/8 + 6S/16]`, carrying per block:
///
/// | Section | Bytes | Content |
/// | ------- | ----- | ------- |
/// | 0       | 2     | alpha endpoints |
/// | 1       | 4     | color endpoints |
/// | 2       | 6     | alpha indices |
/// | 3       | 4     | color indices |
///
/// Reconstruction writes them back in DDS block order: alpha endpoints,
/// alpha indices, color endpoints, color indices.

fn split_header(data: &[u8]) -> Result<(DdsHeader, &[u8], &[u8])> {
    if data.len() < DDS_HEADER_SIZE {
        return Err(Error::UnexpectedEnd {
            needed: DDS_HEADER_SIZE,
            available: data.len(),
        });
    }
    let header = DdsHeader::parse(data)?;
    Ok((header, &data[..DDS_HEADER_SIZE], &data[DDS_HEADER_SIZE..]))
}

fn with_fourcc(header: &[u8], fourcc: [u8; 4], payload_len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(DDS_HEADER_SIZE + payload_len);
    out.extend_from_slice(header);
    out[DDS_FOURCC_OFFSET..DDS_FOURCC_OFFSET + 4].copy_from_slice(&fourcc);
    out
}

/// Convert a DST1/DST5 texture back to a standard DXT1/DXT5 DDS.
pub fn unshuffle(data: &[u8]) -> Result<Vec<u8>> {
    let (header, raw_header, payload) = split_header(data)?;
    match header.fourcc {
        FOURCC_DST1 => {
            let mut out = with_fourcc(raw_header, FOURCC_DXT1, payload.len());
            unshuffle_dst1(payload, &mut out)?;
            Ok(out)
        }
        FOURCC_DST5 => {
            let mut out = with_fourcc(raw_header, FOURCC_DXT5, payload.len());
            unshuffle_dst5(payload, &mut out)?;
            Ok(out)
        }
        other => Err(Error::invalid(
            "DST FourCC",
            u32::from_le_bytes(other),
            DDS_FOURCC_OFFSET as u64,
        )),
    }
}

/// Convert a standard DXT1/DXT5 DDS into the shuffled DST layout.
pub fn shuffle(data: &[u8]) -> Result<Vec<u8>> {
    let (header, raw_header, payload) = split_header(data)?;
    match header.fourcc {
        FOURCC_DXT1 => {
            let mut out = with_fourcc(raw_header, FOURCC_DST1, payload.len());
            shuffle_dst1(payload, &mut out)?;
            Ok(out)
        }
        FOURCC_DXT5 => {
            let mut out = with_fourcc(raw_header, FOURCC_DST5, payload.len());
            shuffle_dst5(payload, &mut out)?;
            Ok(out)
        }
        other => Err(Error::invalid(
            "DXT FourCC",
            u32::from_le_bytes(other),
            DDS_FOURCC_OFFSET as u64,
        )),
    }
}

fn check_multiple(payload: &[u8], block: usize) -> Result<usize> {
    if payload.len() % block != 0 {
        return Err(Error::corrupted(format!(
            "DST payload of {} bytes is not a multiple of the {block}-byte block size",
            payload.len()
        )));
    }
    Ok(payload.len() / block)
}

fn unshuffle_dst1(payload: &[u8], out: &mut Vec<u8>) -> Result<()> {
    let blocks = check_multiple(payload, 8)?;
    let half = payload.len() / 2;
    for i in 0..blocks {
        out.extend_from_slice(&payload[i * 4..i * 4 + 4]);
        out.extend_from_slice(&payload[half + i * 4..half + i * 4 + 4]);
    }
    Ok(())
}

fn shuffle_dst1(payload: &[u8], out: &mut Vec<u8>) -> Result<()> {
    let blocks = check_multiple(payload, 8)?;
    for i in 0..blocks {
        out.extend_from_slice(&payload[i * 8..i * 8 + 4]);
    }
    for i in 0..blocks {
        out.extend_from_slice(&payload[i * 8 + 4..i * 8 + 8]);
    }
    Ok(())
}

/// Section start offsets within a DST5 payload of `len` bytes.
fn dst5_sections(len: usize) -> [usize; 4] {
    [0, len / 8, 3 * len / 8, 3 * len / 8 + 6 * len / 16]
}

fn unshuffle_dst5(payload: &[u8], out: &mut Vec<u8>) -> Result<()> {
    let blocks = check_multiple(payload, 16)?;
    let [s0, s1, s2, s3] = dst5_sections(payload.len());
    for i in 0..blocks {
        out.extend_from_slice(&payload[s0 + i * 2..s0 + i * 2 + 2]);
        out.extend_from_slice(&payload[s2 + i * 6..s2 + i * 6 + 6]);
        out.extend_from_slice(&payload[s1 + i * 4..s1 + i * 4 + 4]);
        out.extend_from_slice(&payload[s3 + i * 4..s3 + i * 4 + 4]);
    }
    Ok(())
}

fn shuffle_dst5(payload: &[u8], out: &mut Vec<u8>) -> Result<()> {
    let blocks = check_multiple(payload, 16)?;
    for i in 0..blocks {
        out.extend_from_slice(&payload[i * 16..i * 16 + 2]);
    }
    for i in 0..blocks {
        out.extend_from_slice(&payload[i * 16 + 8..i * 16 + 12]);
    }
    for i in 0..blocks {
        out.extend_from_slice(&payload[i * 16 + 2..i * 16 + 8]);
    }
    for i in 0..blocks {
        out.extend_from_slice(&payload[i * 16 + 12..i * 16 + 16]);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::ByteWriter;

    fn dds(fourcc: [u8; 4], blocks: usize, block_size: usize) -> Vec<u8> {
        let mut writer = ByteWriter::new();
        DdsHeader::new(4 * blocks as u32, 4, 1, fourcc).write(&mut writer);
        let mut data = writer.into_bytes();
        for i in 0..blocks * block_size {
            data.push((i % 251) as u8);
        }
        data
    }

    #[test]
    fn dst1_shuffle_unshuffle_is_identity() {
        let original = dds(FOURCC_DXT1, 7, 8);
        let shuffled = shuffle(&original).unwrap();
        assert_eq!(&shuffled[DDS_FOURCC_OFFSET..DDS_FOURCC_OFFSET + 4], b"DST1");
        assert_eq!(unshuffle(&shuffled).unwrap(), original);
    }

    #[test]
    fn dst5_shuffle_unshuffle_is_identity() {
        let original = dds(FOURCC_DXT5, 6, 16);
        let shuffled = shuffle(&original).unwrap();
        assert_eq!(&shuffled[DDS_FOURCC_OFFSET..DDS_FOURCC_OFFSET + 4], b"DST5");
        assert_eq!(unshuffle(&shuffled).unwrap(), original);
    }

    #[test]
    fn dst5_sections_partition_the_payload() {
        // One 16-byte block: sections at 0, 2, 6, 12.
        assert_eq!(dst5_sections(16), [0, 2, 6, 12]);
    }

    #[test]
    fn ragged_payload_rejected() {
        let mut data = dds(FOURCC_DST1, 1, 8);
        data.pop();
        assert!(matches!(unshuffle(&data), Err(Error::CorruptedData(_))));
    }

    #[test]
    fn unexpected_fourcc_rejected() {
        let data = dds(FOURCC_DXT1, 1, 8);
        assert!(matches!(
            unshuffle(&data),
            Err(Error::InvalidFormat { field: "DST FourCC", .. })
        ));
    }
}
