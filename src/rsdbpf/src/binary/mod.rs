mod fnv;
mod reader;
mod writer;

pub use fnv::{fnv32, fnv64};
pub use reader::ByteReader;
pub use writer::ByteWriter;

/// Distinguished value meaning "no target" wherever a 32-bit relative
/// offset is stored.
pub const NULL_OFFSET: u32 = 0x8000_0000;
