//! Wire-level plumbing: framing ([`framer`]) and canonical encoding
//! ([`serializer`]). Neither module knows anything about protocol semantics.

pub mod framer;
pub mod serializer;

pub use framer::{WireError, WireFramer};
pub use serializer::{decode, encode, encode_with_padding, generate_padding, SerializerError};
