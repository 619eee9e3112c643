//! MIME helpers: transfer decoding of part bodies and parameter decoding.

pub mod decode;
pub mod header;

pub use self::decode::decode_body;
