mod dds;
mod dst;
mod dxt;
mod rle;

pub use dds::{DdsHeader, DDS_FOURCC_OFFSET, DDS_HEADER_SIZE};
pub use dds::{FOURCC_DST1, FOURCC_DST5, FOURCC_DXT1, FOURCC_DXT5};
pub use dst::{shuffle, unshuffle};
pub use dxt::{
    decode_dxt1, decode_dxt1_block, decode_dxt5, decode_dxt5_block, expand_565, DXT1_BLOCK_SIZE,
    DXT5_BLOCK_SIZE,
};
pub use rle::{expand as rle_expand, parse_headers as rle_parse_headers, MipHeader, RleInfo, RleVersion, RLE_HEADER_SIZE};
