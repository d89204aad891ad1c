mod binary;
mod cancel;
mod codec;
mod error;
mod package;
mod resource;

pub use binary::{fnv32, fnv64, ByteReader, ByteWriter, NULL_OFFSET};
pub use cancel::CancelToken;
pub use codec::*;
pub use error::{Error, Result};
pub use package::*;
pub use resource::*;
