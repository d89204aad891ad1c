use std::any::Any;

use super::{BoxResource, Resource, ResourceFactory, ResourceKey};
use crate::codec::{rle_expand, rle_parse_headers, MipHeader, RleInfo};
use crate::{CancelToken, Result};

/// # RLE texture resources : 0x3453CF95 (RLE2), 0xBA856C78 (RLES)
///
/// Run-length-coded DXT5 surfaces. The wrapper validates the stream and
/// mip headers up front, keeps the payload verbatim, and reconstructs a
/// standard DDS on demand through the codec.
#[derive(Debug, Clone)]
pub struct RleResource {
    key: ResourceKey,
    info: Option<RleInfo>,
    mip_headers: Vec<MipHeader>,
    bytes: Vec<u8>,
    dirty: bool,
}

impl RleResource {
    pub const TYPE_IDS: &'static [u32] = &[0x3453_CF95, 0xBA85_6C78];

    pub const FACTORY: ResourceFactory = ResourceFactory {
        name: "Rle",
        create: |key, bytes| Ok(Box::new(RleResource::from_bytes(key, bytes)?) as BoxResource),
        create_empty: |key| Box::new(RleResource::new_empty(key)) as BoxResource,
    };

    pub fn new_empty(key: ResourceKey) -> RleResource {
        RleResource {
            key,
            info: None,
            mip_headers: Vec::new(),
            bytes: Vec::new(),
            dirty: false,
        }
    }

    pub fn from_bytes(key: ResourceKey, bytes: &[u8]) -> Result<RleResource> {
        if bytes.is_empty() {
            return Ok(RleResource::new_empty(key));
        }
        let (info, mip_headers) = rle_parse_headers(bytes)?;
        Ok(RleResource {
            key,
            info: Some(info),
            mip_headers,
            bytes: bytes.to_vec(),
            dirty: false,
        })
    }

    pub fn info(&self) -> Option<&RleInfo> {
        self.info.as_ref()
    }

    /// Parsed mip headers, including the synthesized sentinel that caps
    /// the final mip.
    pub fn mip_headers(&self) -> &[MipHeader] {
        &self.mip_headers
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn set_bytes(&mut self, bytes: Vec<u8>) -> Result<()> {
        let (info, mip_headers) = rle_parse_headers(&bytes)?;
        self.info = Some(info);
        self.mip_headers = mip_headers;
        self.bytes = bytes;
        self.dirty = true;
        Ok(())
    }

    /// Expand the run-length stream into a standard DXT5 DDS.
    pub fn to_dds(&self, token: &CancelToken) -> Result<Vec<u8>> {
        rle_expand(&self.bytes, token)
    }
}

impl Resource for RleResource {
    fn key(&self) -> ResourceKey {
        self.key
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        Ok(self.bytes.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::ByteWriter;
    use crate::codec::{RleVersion, DDS_HEADER_SIZE, RLE_HEADER_SIZE};

    /// Minimal 4x4 single-mip RLE2 stream holding one transparent block.
    fn tiny_rle2() -> Vec<u8> {
        let mut writer = ByteWriter::new();
        writer.write_bytes(b"DXT5");
        writer.write_bytes(b"RLE2");
        writer.write_u16(4);
        writer.write_u16(4);
        writer.write_u16(1);
        writer.write_u16(0);
        let command_offset = (RLE_HEADER_SIZE + 20) as u32;
        writer.write_u32(command_offset);
        let end = command_offset + 2;
        for _ in 0..4 {
            writer.write_u32(end);
        }
        writer.write_u16(1 << 2); // one op-0 block
        writer.into_bytes()
    }

    #[test]
    fn parses_headers_with_sentinel() {
        let key = ResourceKey::new(0x3453_CF95, 0, 9);
        let resource = RleResource::from_bytes(key, &tiny_rle2()).unwrap();
        let info = resource.info().unwrap();
        assert_eq!(info.version, RleVersion::Rle2);
        assert_eq!((info.width, info.height, info.mip_count), (4, 4, 1));
        // One real header plus the sentinel.
        assert_eq!(resource.mip_headers().len(), 2);
    }

    #[test]
    fn reconstructs_dds() {
        let key = ResourceKey::new(0x3453_CF95, 0, 9);
        let resource = RleResource::from_bytes(key, &tiny_rle2()).unwrap();
        let dds = resource.to_dds(&CancelToken::new()).unwrap();
        assert_eq!(dds.len(), DDS_HEADER_SIZE + 16);
    }

    #[test]
    fn payload_round_trips_unchanged() {
        let key = ResourceKey::new(0xBA85_6C78, 0, 9);
        let bytes = tiny_rle2();
        let resource = RleResource::from_bytes(key, &bytes).unwrap();
        assert!(!resource.is_dirty());
        assert_eq!(resource.serialize().unwrap(), bytes);
    }
}
