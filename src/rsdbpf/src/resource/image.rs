use std::any::Any;

use super::{BoxResource, Resource, ResourceFactory, ResourceKey};
use crate::codec::{
    self, DdsHeader, DDS_HEADER_SIZE, FOURCC_DST1, FOURCC_DST5, FOURCC_DXT1, FOURCC_DXT5,
};
use crate::{Error, Result};

const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// Detected payload format of an [`ImageResource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Dds,
    /// A DDS whose payload is block-shuffled (FourCC DST1/DST5).
    Dst,
}

/// # Image resources : 0x00B00000 (PNG), 0x00B2D882 (DDS/DST)
///
/// The payload is kept verbatim; the wrapper probes the magic to expose
/// the format and pixel dimensions, and offers an RGBA8888 decode for the
/// DXT-compressed variants. PNG dimensions come from the IHDR chunk
/// (big-endian), DDS dimensions from the little-endian header fields at
/// offsets 12 and 16.
#[derive(Debug, Clone)]
pub struct ImageResource {
    key: ResourceKey,
    format: Option<ImageFormat>,
    width: u32,
    height: u32,
    bytes: Vec<u8>,
    dirty: bool,
}

impl ImageResource {
    pub const TYPE_IDS: &'static [u32] = &[0x00B0_0000, 0x00B2_D882];

    pub const FACTORY: ResourceFactory = ResourceFactory {
        name: "Image",
        create: |key, bytes| Ok(Box::new(ImageResource::from_bytes(key, bytes)?) as BoxResource),
        create_empty: |key| Box::new(ImageResource::new_empty(key)) as BoxResource,
    };

    pub fn new_empty(key: ResourceKey) -> ImageResource {
        ImageResource {
            key,
            format: None,
            width: 0,
            height: 0,
            bytes: Vec::new(),
            dirty: false,
        }
    }

    pub fn from_bytes(key: ResourceKey, bytes: &[u8]) -> Result<ImageResource> {
        if bytes.is_empty() {
            return Ok(ImageResource::new_empty(key));
        }
        let (format, width, height) = probe(bytes)?;
        Ok(ImageResource {
            key,
            format: Some(format),
            width,
            height,
            bytes: bytes.to_vec(),
            dirty: false,
        })
    }

    pub fn format(&self) -> Option<ImageFormat> {
        self.format
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Replace the payload, re-probing format and dimensions.
    pub fn set_bytes(&mut self, bytes: Vec<u8>) -> Result<()> {
        let (format, width, height) = probe(&bytes)?;
        self.format = Some(format);
        self.width = width;
        self.height = height;
        self.bytes = bytes;
        self.dirty = true;
        Ok(())
    }

    /// Decode the top mip to tightly packed RGBA8888.
    ///
    /// Available for DXT1/DXT5 surfaces (DST payloads are unshuffled
    /// first); PNG payloads decode elsewhere and return `None` here.
    pub fn decode_rgba(&self) -> Result<Option<Vec<u8>>> {
        let unshuffled;
        let dds = match self.format {
            Some(ImageFormat::Dds) => &self.bytes,
            Some(ImageFormat::Dst) => {
                unshuffled = codec::unshuffle(&self.bytes)?;
                &unshuffled
            }
            _ => return Ok(None),
        };

        let header = DdsHeader::parse(dds)?;
        let payload = &dds[DDS_HEADER_SIZE..];
        let pixels = match header.fourcc {
            FOURCC_DXT1 => {
                codec::decode_dxt1(payload, header.width as usize, header.height as usize)?
            }
            FOURCC_DXT5 => {
                codec::decode_dxt5(payload, header.width as usize, header.height as usize)?
            }
            _ => return Ok(None),
        };
        Ok(Some(pixels))
    }
}

fn probe(bytes: &[u8]) -> Result<(ImageFormat, u32, u32)> {
    if bytes.starts_with(&PNG_SIGNATURE) {
        // Signature, IHDR length + tag, then big-endian width and height.
        if bytes.len() < 24 {
            return Err(Error::UnexpectedEnd {
                needed: 24,
                available: bytes.len(),
            });
        }
        if &bytes[12..16] != b"IHDR" {
            return Err(Error::invalid(
                "PNG IHDR tag",
                u32::from_be_bytes(bytes[12..16].try_into().unwrap()),
                12,
            ));
        }
        let width = u32::from_be_bytes(bytes[16..20].try_into().unwrap());
        let height = u32::from_be_bytes(bytes[20..24].try_into().unwrap());
        return Ok((ImageFormat::Png, width, height));
    }

    let header = DdsHeader::parse(bytes)?;
    let format = match header.fourcc {
        FOURCC_DST1 | FOURCC_DST5 => ImageFormat::Dst,
        _ => ImageFormat::Dds,
    };
    Ok((format, header.width, header.height))
}

impl Resource for ImageResource {
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
