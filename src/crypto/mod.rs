//! Public-key cryptography: the raw RSA collaborator ([`primitive`]) and the
//! chunked cipher built on top of it ([`cipher`]).

pub mod cipher;
pub mod primitive;

pub use cipher::{CipherError, CipherWrap, ExportKind, Exported};
pub use primitive::{KeyHandle, PrimitiveError, RsaCryptoPrimitive, RsaKeyHandle, RsaPrimitive};
