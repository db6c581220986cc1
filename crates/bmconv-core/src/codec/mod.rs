//! Binary codecs for the output stream.

pub mod header;

pub use header::{
    HeaderGeneration, MAX_HEADER, MIN_DETECTABLE_HEADER, decode_header, decode_header_as,
    encode_header, read_header, write_header,
};
