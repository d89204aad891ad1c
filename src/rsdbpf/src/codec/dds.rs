use crate::binary::{ByteReader, ByteWriter};
use crate::{Error, Result};

/// # DDS file header (128 bytes)
///
/// | Offset | Size | Field |
/// | ------ | ---- | ----- |
/// | 0      | 4    | magic "DDS " |
/// | 4      | 4    | header size, always 124 |
/// | 8      | 4    | flags |
/// | 12     | 4    | height |
/// | 16     | 4    | width |
/// | 20     | 4    | pitch or linear size |
/// | 24     | 4    | depth |
/// | 28     | 4    | mipmap count |
/// | 32     | 44   | reserved |
/// | 76     | 4    | pixel format size, always 32 |
/// | 80     | 4    | pixel format flags |
/// | 84     | 4    | FourCC |
/// | 88     | 4    | RGB bit count |
/// | 92     | 16   | RGBA channel masks |
/// | 108    | 4    | caps |
/// | 112    | 16   | caps2..4, reserved |
pub const DDS_HEADER_SIZE: usize = 128;

/// Byte offset of the FourCC field within the header.
pub const DDS_FOURCC_OFFSET: usize = 84;

pub const FOURCC_DXT1: [u8; 4] = *b"DXT1";
pub const FOURCC_DXT5: [u8; 4] = *b"DXT5";
pub const FOURCC_DST1: [u8; 4] = *b"DST1";
pub const FOURCC_DST5: [u8; 4] = *b"DST5";

const DDS_MAGIC: u32 = 0x2053_4444; // "DDS "

const DDSD_CAPS: u32 = 0x1;
const DDSD_HEIGHT: u32 = 0x2;
const DDSD_WIDTH: u32 = 0x4;
const DDSD_PIXELFORMAT: u32 = 0x1000;
const DDSD_MIPMAPCOUNT: u32 = 0x2_0000;
const DDSD_LINEARSIZE: u32 = 0x8_0000;

const DDPF_FOURCC: u32 = 0x4;

const DDSCAPS_COMPLEX: u32 = 0x8;
const DDSCAPS_TEXTURE: u32 = 0x1000;
const DDSCAPS_MIPMAP: u32 = 0x40_0000;

/// The header fields the codecs care about. Everything else is carried
/// through untouched when a header is being rewritten in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DdsHeader {
    pub width: u32,
    pub height: u32,
    pub mip_count: u32,
    pub fourcc: [u8; 4],
}

impl DdsHeader {
    pub fn new(width: u32, height: u32, mip_count: u32, fourcc: [u8; 4]) -> DdsHeader {
        DdsHeader {
            width,
            height,
            mip_count,
            fourcc,
        }
    }

    pub fn parse(data: &[u8]) -> Result<DdsHeader> {
        let mut reader = ByteReader::new(data);
        let magic = reader.read_u32()?;
        if magic != DDS_MAGIC {
            return Err(Error::invalid("DDS magic", magic, 0));
        }
        let size = reader.read_u32()?;
        if size != 124 {
            return Err(Error::invalid("DDS header size", size, 4));
        }
        reader.skip(4)?; // flags
        let height = reader.read_u32()?;
        let width = reader.read_u32()?;
        reader.skip(8)?; // pitch, depth
        let mip_count = reader.read_u32()?;
        reader.seek(DDS_FOURCC_OFFSET)?;
        let fourcc: [u8; 4] = reader.take(4)?.try_into().unwrap();
        Ok(DdsHeader {
            width,
            height,
            mip_count,
            fourcc,
        })
    }

    /// Emit a complete 128-byte header for a FourCC-compressed surface.
    pub fn write(&self, writer: &mut ByteWriter) {
        let block_size = if self.fourcc == FOURCC_DXT1 { 8 } else { 16 };
        let linear_size =
            (self.width.div_ceil(4)) * (self.height.div_ceil(4)) * block_size;

        let mut flags =
            DDSD_CAPS | DDSD_HEIGHT | DDSD_WIDTH | DDSD_PIXELFORMAT | DDSD_LINEARSIZE;
        let mut caps = DDSCAPS_TEXTURE;
        if self.mip_count > 1 {
            flags |= DDSD_MIPMAPCOUNT;
            caps |= DDSCAPS_COMPLEX | DDSCAPS_MIPMAP;
        }

        writer.write_u32(DDS_MAGIC);
        writer.write_u32(124);
        writer.write_u32(flags);
        writer.write_u32(self.height);
        writer.write_u32(self.width);
        writer.write_u32(linear_size);
        writer.write_u32(0); // depth
        writer.write_u32(self.mip_count);
        for _ in 0..11 {
            writer.write_u32(0);
        }
        writer.write_u32(32);
        writer.write_u32(DDPF_FOURCC);
        writer.write_bytes(&self.fourcc);
        for _ in 0..5 {
            writer.write_u32(0); // bit count, channel masks
        }
        writer.write_u32(caps);
        for _ in 0..4 {
            writer.write_u32(0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trip() {
        let header = DdsHeader::new(256, 128, 9, FOURCC_DXT5);
        let mut writer = ByteWriter::new();
        header.write(&mut writer);
        let bytes = writer.into_bytes();
        assert_eq!(bytes.len(), DDS_HEADER_SIZE);
        assert_eq!(DdsHeader::parse(&bytes).unwrap(), header);
    }

    #[test]
    fn fourcc_sits_at_its_documented_offset() {
        let mut writer = ByteWriter::new();
        DdsHeader::new(4, 4, 1, FOURCC_DXT1).write(&mut writer);
        let bytes = writer.into_bytes();
        assert_eq!(&bytes[DDS_FOURCC_OFFSET..DDS_FOURCC_OFFSET + 4], b"DXT1");
    }

    #[test]
    fn bad_magic_rejected() {
        assert!(matches!(
            DdsHeader::parse(&[0u8; 128]),
            Err(Error::InvalidFormat { field: "DDS magic", .. })
        ));
    }
}
