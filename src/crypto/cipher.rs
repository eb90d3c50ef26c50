//! Chunked encrypt/decrypt and key export over an [`RsaPrimitive`].
//!
//! This is the part of the cipher design the specification actually pins
//! down: splitting an arbitrary-length payload into RSA-sized blocks,
//! concatenating the per-block ciphertext/plaintext, and gating export/
//! decrypt on whether a private key is held. The single-block RSA math
//! itself is delegated to the injected primitive.

use thiserror::Error;

use super::primitive::{KeyHandle, PrimitiveError, RsaPrimitive};

/// PKCS#1 v1.5 encryption overhead in bytes (11 bytes of padding structure).
/// The original design used textbook (unpadded) RSA and chunked plaintext on
/// a flat `CFG_CRYPT_CHUNK_SIZE` (the modulus size itself); this crate uses
/// the standard padded scheme instead (see DESIGN.md), which leaves at most
/// `modulus_size - PKCS1V15_OVERHEAD` usable bytes per block. `CipherWrap`
/// still honors the configured chunk size, clamped to that padded ceiling —
/// see `max_plaintext_chunk`.
const PKCS1V15_OVERHEAD: usize = 11;

#[derive(Error, Debug)]
pub enum CipherError {
    #[error("{0}")]
    Primitive(#[from] PrimitiveError),
    #[error("can't decrypt, no private key held")]
    NoPrivateKey,
    #[error("requested non-existent private key for export")]
    NoPrivateKeyExport,
    #[error("invalid export discriminator")]
    InvalidExportKind,
    #[error("ciphertext is not a multiple of the block size")]
    MisalignedCiphertext,
}

/// Which key(s) to export from a [`CipherWrap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Public,
    Private,
    Both,
}

/// Output of an export: either one encoded key, or a (public, private) pair.
pub enum Exported {
    Single(Vec<u8>),
    Text(String),
    Pair(Vec<u8>, Vec<u8>),
    TextPair(String, String),
}

/// Wraps an RSA keypair or public-key-only handle and performs chunked
/// encrypt/decrypt and key export against it.
pub struct CipherWrap<P: RsaPrimitive> {
    primitive: P,
    handle: P::Handle,
    crypt_chunk_size: usize,
}

impl<P: RsaPrimitive> CipherWrap<P> {
    pub fn from_handle(primitive: P, handle: P::Handle, crypt_chunk_size: usize) -> Self {
        Self {
            primitive,
            handle,
            crypt_chunk_size,
        }
    }

    pub fn generate(primitive: P, bits: usize, crypt_chunk_size: usize) -> Result<Self, CipherError> {
        let handle = primitive.generate_keypair(bits)?;
        Ok(Self {
            primitive,
            handle,
            crypt_chunk_size,
        })
    }

    pub fn from_public_der(
        primitive: P,
        der: &[u8],
        crypt_chunk_size: usize,
    ) -> Result<Self, CipherError> {
        let handle = primitive.import_public_der(der)?;
        Ok(Self {
            primitive,
            handle,
            crypt_chunk_size,
        })
    }

    pub fn has_private(&self) -> bool {
        self.handle.has_private()
    }

    /// DER-encoded public key, suitable for embedding in a `Finger`.
    pub fn public_der(&self) -> Result<Vec<u8>, CipherError> {
        Ok(self.handle.public_der()?)
    }

    pub fn export(&self, text: bool, which: ExportKind) -> Result<Exported, CipherError> {
        match (which, text) {
            (ExportKind::Public, false) => Ok(Exported::Single(self.handle.public_der()?)),
            (ExportKind::Public, true) => Ok(Exported::Text(self.handle.public_pem()?)),
            (ExportKind::Private, false) => {
                if !self.handle.has_private() {
                    return Err(CipherError::NoPrivateKeyExport);
                }
                Ok(Exported::Single(self.handle.private_der()?))
            }
            (ExportKind::Private, true) => {
                if !self.handle.has_private() {
                    return Err(CipherError::NoPrivateKeyExport);
                }
                Ok(Exported::Text(self.handle.private_pem()?))
            }
            (ExportKind::Both, false) => {
                if !self.handle.has_private() {
                    return Err(CipherError::NoPrivateKeyExport);
                }
                Ok(Exported::Pair(
                    self.handle.public_der()?,
                    self.handle.private_der()?,
                ))
            }
            (ExportKind::Both, true) => {
                if !self.handle.has_private() {
                    return Err(CipherError::NoPrivateKeyExport);
                }
                Ok(Exported::TextPair(
                    self.handle.public_pem()?,
                    self.handle.private_pem()?,
                ))
            }
        }
    }

    /// Byte width of one ciphertext block for this key (the wire chunk size).
    pub fn block_size(&self) -> usize {
        self.primitive.block_size(&self.handle)
    }

    /// The configured chunk size, bounded by what actually fits in one
    /// padded block. Never trusts the configured value blindly: a
    /// misconfigured `crypt_chunk_size` larger than `block_size() -
    /// PKCS1V15_OVERHEAD` would otherwise produce ciphertext blocks PKCS#1
    /// v1.5 refuses to encode.
    fn max_plaintext_chunk(&self) -> usize {
        self.crypt_chunk_size
            .min(self.block_size().saturating_sub(PKCS1V15_OVERHEAD))
    }

    /// Encrypt a payload of any length, chunking it into RSA-sized blocks.
    pub fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>, CipherError> {
        let chunk_len = self.max_plaintext_chunk().max(1);
        let mut out = Vec::with_capacity(
            data.len().div_ceil(chunk_len).max(1) * self.block_size(),
        );
        if data.is_empty() {
            let block = self.primitive.encrypt_block(&self.handle, &[])?;
            out.extend_from_slice(&block);
            return Ok(out);
        }
        for chunk in data.chunks(chunk_len) {
            let block = self.primitive.encrypt_block(&self.handle, chunk)?;
            out.extend_from_slice(&block);
        }
        Ok(out)
    }

    /// Decrypt a payload produced by [`encrypt`](Self::encrypt). Requires a
    /// private key.
    pub fn decrypt(&self, cryptic: &[u8]) -> Result<Vec<u8>, CipherError> {
        if !self.handle.has_private() {
            return Err(CipherError::NoPrivateKey);
        }
        let block = self.block_size();
        if block == 0 || cryptic.len() % block != 0 {
            return Err(CipherError::MisalignedCiphertext);
        }
        let mut out = Vec::with_capacity(cryptic.len());
        for chunk in cryptic.chunks(block) {
            let plain = self.primitive.decrypt_block(&self.handle, chunk)?;
            out.extend_from_slice(&plain);
        }
        Ok(out)
    }
}
