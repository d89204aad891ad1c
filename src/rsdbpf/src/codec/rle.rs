use super::dds::{DdsHeader, FOURCC_DXT5};
use crate::binary::{ByteReader, ByteWriter};
use crate::{CancelToken, Error, Result};

/// # RLE stream header (16 bytes)
///
/// | Offset | Size | Field |
/// | ------ | ---- | ----- |
/// | 0      | 4    | FourCC, always "DXT5" |
/// | 4      | 4    | sub-FourCC, "RLE2" or "RLES" |
/// | 8      | 2    | width |
/// | 10     | 2    | height |
/// | 12     | 2    | mip count |
/// | 14     | 2    | reserved |
///
/// Mip headers follow immediately, one per mip, five u32 fields for RLE2
/// and six for RLES, stored in the order {command, off2, off3, off0, off1,
/// [off4]}. The named streams carry, per emitted DXT5 block: off0 alpha
/// endpoints (2 bytes), off1 alpha indices (6), off2 color endpoints (4),
/// off3 color indices (4); off4 is the RLES specular stream (16), tracked
/// while decoding but never written into the reconstructed DDS.
pub const RLE_HEADER_SIZE: usize = 16;

const RLE_FOURCC: [u8; 4] = *b"DXT5";
const RLE2_SUB_FOURCC: [u8; 4] = *b"RLE2";
const RLES_SUB_FOURCC: [u8; 4] = *b"RLES";

/// Alpha half emitted for op-0 (fully transparent) blocks: endpoints 0 and
/// 5 select the four-interpolant mode and every index decodes to alpha 0.
const TRANSPARENT_ALPHA: [u8; 8] = [0x00, 0x05, 0, 0, 0, 0, 0, 0];
/// Alpha half emitted for RLE2 op-2 (opaque) blocks: collapsed 0xFF
/// endpoints decode to alpha 255 for every index.
const OPAQUE_ALPHA: [u8; 8] = [0xFF, 0xFF, 0, 0, 0, 0, 0, 0];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RleVersion {
    Rle2,
    Rles,
}

impl RleVersion {
    pub fn sub_fourcc(self) -> [u8; 4] {
        match self {
            RleVersion::Rle2 => RLE2_SUB_FOURCC,
            RleVersion::Rles => RLES_SUB_FOURCC,
        }
    }

    /// Size of one stored mip header.
    pub fn mip_header_size(self) -> usize {
        match self {
            RleVersion::Rle2 => 20,
            RleVersion::Rles => 24,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RleInfo {
    pub version: RleVersion,
    pub width: u16,
    pub height: u16,
    pub mip_count: u16,
    pub reserved: u16,
}

/// One mip's stream cursors. Field order here matches the decode streams,
/// not the stored order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MipHeader {
    pub command_offset: u32,
    pub offset0: u32,
    pub offset1: u32,
    pub offset2: u32,
    pub offset3: u32,
    pub offset4: u32,
}

impl MipHeader {
    fn read(reader: &mut ByteReader<'_>, version: RleVersion) -> Result<MipHeader> {
        let command_offset = reader.read_u32()?;
        let offset2 = reader.read_u32()?;
        let offset3 = reader.read_u32()?;
        let offset0 = reader.read_u32()?;
        let offset1 = reader.read_u32()?;
        let offset4 = match version {
            RleVersion::Rle2 => 0,
            RleVersion::Rles => reader.read_u32()?,
        };
        Ok(MipHeader {
            command_offset,
            offset0,
            offset1,
            offset2,
            offset3,
            offset4,
        })
    }
}

/// Parse the stream header and mip headers, and append the synthesized
/// sentinel header that caps the final mip's reads. Without the sentinel
/// the last mip would have no stopping condition.
pub fn parse_headers(data: &[u8]) -> Result<(RleInfo, Vec<MipHeader>)> {
    let mut reader = ByteReader::new(data);
    let fourcc: [u8; 4] = reader.take(4)?.try_into().unwrap();
    if fourcc != RLE_FOURCC {
        return Err(Error::invalid("RLE FourCC", u32::from_le_bytes(fourcc), 0));
    }
    let sub: [u8; 4] = reader.take(4)?.try_into().unwrap();
    let version = match sub {
        RLE2_SUB_FOURCC => RleVersion::Rle2,
        RLES_SUB_FOURCC => RleVersion::Rles,
        _ => return Err(Error::invalid("RLE sub-FourCC", u32::from_le_bytes(sub), 4)),
    };
    let width = reader.read_u16()?;
    let height = reader.read_u16()?;
    let mip_count = reader.read_u16()?;
    let reserved = reader.read_u16()?;
    if mip_count == 0 {
        return Err(Error::invalid("RLE mip count", 0u32, 12));
    }

    let mut headers = Vec::with_capacity(mip_count as usize + 1);
    for _ in 0..mip_count {
        headers.push(MipHeader::read(&mut reader, version)?);
    }

    let first = headers[0];
    let data_len = data.len() as u32;
    headers.push(match version {
        RleVersion::Rle2 => MipHeader {
            command_offset: first.offset2,
            offset2: first.offset3,
            offset3: first.offset0,
            offset0: first.offset1,
            offset1: data_len,
            offset4: 0,
        },
        RleVersion::Rles => MipHeader {
            command_offset: first.offset2,
            offset2: first.offset3,
            offset3: first.offset0,
            offset0: first.offset1,
            offset1: first.offset4,
            offset4: data_len,
        },
    });

    Ok((
        RleInfo {
            version,
            width,
            height,
            mip_count,
            reserved,
        },
        headers,
    ))
}

fn stream_copy<'a>(data: &'a [u8], cursor: &mut u32, count: usize) -> Result<&'a [u8]> {
    let start = *cursor as usize;
    let end = start + count;
    let slice = data.get(start..end).ok_or(Error::UnexpectedEnd {
        needed: end,
        available: data.len(),
    })?;
    *cursor += count as u32;
    Ok(slice)
}

/// Expand an RLE2/RLES stream into a standard DXT5 DDS.
///
/// Every mip level must decode to exactly `ceil(w/4) * ceil(h/4)` blocks
/// for its dimensions; a command stream that stops short or overruns is
/// corrupted. The cancellation token is checked before each mip level.
pub fn expand(data: &[u8], token: &CancelToken) -> Result<Vec<u8>> {
    let (info, headers) = parse_headers(data)?;

    let mut writer = ByteWriter::new();
    DdsHeader::new(
        info.width as u32,
        info.height as u32,
        info.mip_count as u32,
        FOURCC_DXT5,
    )
    .write(&mut writer);

    for mip in 0..info.mip_count as usize {
        token.check()?;
        let width = (info.width as usize >> mip).max(1);
        let height = (info.height as usize >> mip).max(1);
        let expected_blocks = width.div_ceil(4) * height.div_ceil(4);
        let emitted = expand_mip(data, info.version, headers[mip], headers[mip + 1], &mut writer)?;
        if emitted != expected_blocks {
            return Err(Error::corrupted(format!(
                "mip {mip} decoded to {emitted} blocks, expected {expected_blocks}"
            )));
        }
    }

    Ok(writer.into_bytes())
}

fn expand_mip(
    data: &[u8],
    version: RleVersion,
    mip: MipHeader,
    next: MipHeader,
    writer: &mut ByteWriter,
) -> Result<usize> {
    let mut command = mip.command_offset;
    let mut off0 = mip.offset0;
    let mut off1 = mip.offset1;
    let mut off2 = mip.offset2;
    let mut off3 = mip.offset3;
    let mut off4 = mip.offset4;
    let mut blocks = 0usize;

    while command < next.command_offset {
        let word = stream_copy(data, &mut command, 2)?;
        let word = u16::from_le_bytes([word[0], word[1]]);
        let op = word & 0x3;
        let count = (word >> 2) as usize;

        match op {
            0 => {
                for _ in 0..count {
                    writer.write_bytes(&TRANSPARENT_ALPHA);
                    writer.write_bytes(&[0u8; 8]);
                }
            }
            1 => {
                for _ in 0..count {
                    writer.write_bytes(stream_copy(data, &mut off0, 2)?);
                    writer.write_bytes(stream_copy(data, &mut off1, 6)?);
                    writer.write_bytes(stream_copy(data, &mut off2, 4)?);
                    writer.write_bytes(stream_copy(data, &mut off3, 4)?);
                    if version == RleVersion::Rles {
                        // Specular data rides along but is not part of the
                        // reconstructed DDS.
                        off4 += 16;
                    }
                }
            }
            2 => match version {
                RleVersion::Rle2 => {
                    for _ in 0..count {
                        writer.write_bytes(&OPAQUE_ALPHA);
                        writer.write_bytes(stream_copy(data, &mut off2, 4)?);
                        writer.write_bytes(stream_copy(data, &mut off3, 4)?);
                    }
                }
                RleVersion::Rles => {
                    for _ in 0..count {
                        writer.write_bytes(stream_copy(data, &mut off0, 2)?);
                        writer.write_bytes(stream_copy(data, &mut off1, 6)?);
                        writer.write_bytes(stream_copy(data, &mut off2, 4)?);
                        writer.write_bytes(stream_copy(data, &mut off3, 4)?);
                    }
                }
            },
            _ => {
                return Err(Error::corrupted(format!(
                    "unknown RLE opcode {op} at command offset {}",
                    command - 2
                )))
            }
        }
        blocks += count;
    }

    Ok(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::dds::DDS_HEADER_SIZE;
    use crate::codec::dxt::decode_dxt5_block;

    /// Build a tiny single-mip RLE2 stream: 4x4, one block.
    fn rle2_stream(op: u16, streams: &[&[u8]]) -> Vec<u8> {
        let mut writer = ByteWriter::new();
        writer.write_bytes(b"DXT5");
        writer.write_bytes(b"RLE2");
        writer.write_u16(4);
        writer.write_u16(4);
        writer.write_u16(1);
        writer.write_u16(0);

        // Stored order: command, off2, off3, off0, off1.
        let command_offset = (RLE_HEADER_SIZE + 20) as u32;
        let command_size = 2u32;
        let mut cursor = command_offset + command_size;
        writer.write_u32(command_offset);
        let mut offsets = [0u32; 4];
        // Streams land in file order 2, 3, 0, 1 after the command words.
        for (slot, stream) in offsets.iter_mut().zip(streams) {
            *slot = cursor;
            cursor += stream.len() as u32;
        }
        writer.write_u32(offsets[0]);
        writer.write_u32(offsets[1]);
        writer.write_u32(offsets[2]);
        writer.write_u32(offsets[3]);

        writer.write_u16(0); // command word, patched below
        let mut data = writer.into_bytes();
        let word = (1u16 << 2) | op;
        let at = command_offset as usize;
        data[at..at + 2].copy_from_slice(&word.to_le_bytes());
        for stream in streams {
            data.extend_from_slice(stream);
        }
        data
    }

    #[test]
    fn transparent_fill_decodes_to_invisible_pixels() {
        let data = rle2_stream(0, &[&[], &[], &[], &[]]);
        let dds = expand(&data, &CancelToken::new()).unwrap();
        assert_eq!(dds.len(), DDS_HEADER_SIZE + 16);
        let block: &[u8; 16] = dds[DDS_HEADER_SIZE..].try_into().unwrap();
        for texel in decode_dxt5_block(block) {
            assert_eq!(texel, [0, 0, 0, 0]);
        }
    }

    #[test]
    fn translucent_copy_reassembles_the_block() {
        // Stored stream order is off2, off3, off0, off1.
        let color_endpoints = [0xAA, 0xBB, 0xCC, 0xDD];
        let color_indices = [0x11, 0x22, 0x33, 0x44];
        let alpha_endpoints = [0x80, 0x40];
        let alpha_indices = [1, 2, 3, 4, 5, 6];
        let data = rle2_stream(
            1,
            &[&color_endpoints, &color_indices, &alpha_endpoints, &alpha_indices],
        );
        let dds = expand(&data, &CancelToken::new()).unwrap();
        let block = &dds[DDS_HEADER_SIZE..];
        assert_eq!(&block[0..2], &alpha_endpoints);
        assert_eq!(&block[2..8], &alpha_indices);
        assert_eq!(&block[8..12], &color_endpoints);
        assert_eq!(&block[12..16], &color_indices);
    }

    #[test]
    fn opaque_blocks_decode_fully_opaque() {
        let color_endpoints = [0xFF, 0xFF, 0xFF, 0xFF];
        let color_indices = [0, 0, 0, 0];
        let data = rle2_stream(2, &[&color_endpoints, &color_indices, &[], &[]]);
        let dds = expand(&data, &CancelToken::new()).unwrap();
        let block: &[u8; 16] = dds[DDS_HEADER_SIZE..].try_into().unwrap();
        for texel in decode_dxt5_block(block) {
            assert_eq!(texel[3], 255);
        }
    }

    #[test]
    fn unknown_opcode_is_corrupted() {
        let data = rle2_stream(3, &[&[], &[], &[], &[]]);
        assert!(matches!(
            expand(&data, &CancelToken::new()),
            Err(Error::CorruptedData(_))
        ));
    }

    #[test]
    fn cancellation_observed_before_first_mip() {
        let data = rle2_stream(0, &[&[], &[], &[], &[]]);
        let token = CancelToken::new();
        token.cancel();
        assert!(matches!(expand(&data, &token), Err(Error::Cancelled)));
    }

    #[test]
    fn bad_magic_rejected() {
        assert!(matches!(
            parse_headers(b"XXXXRLE2\0\0\0\0\0\0\0\0"),
            Err(Error::InvalidFormat { field: "RLE FourCC", .. })
        ));
    }
}
