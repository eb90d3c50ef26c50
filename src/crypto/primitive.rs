//! The raw RSA collaborator: key generation and single-block encrypt/decrypt.
//!
//! Per the scope note in the design doc, RSA key generation and the primitive
//! encrypt/decrypt calls are an external collaborator — uninteresting glue the
//! core protocol engine depends on but does not specify the design of. This
//! trait is the seam: [`CipherWrap`](super::cipher::CipherWrap) is built purely
//! in terms of it, and can be exercised in tests against a fake implementation
//! that never touches real RSA math.

use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePublicKey, EncodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PrimitiveError {
    #[error("key generation failed: {0}")]
    KeyGen(String),
    #[error("encrypt failed: {0}")]
    Encrypt(String),
    #[error("decrypt failed: {0}")]
    Decrypt(String),
    #[error("key import failed: {0}")]
    Import(String),
    #[error("key export failed: {0}")]
    Export(String),
}

/// A keypair (or public-key-only) handle produced by an [`RsaPrimitive`].
pub trait KeyHandle: Send + Sync {
    /// Whether this handle carries the private half.
    fn has_private(&self) -> bool;
    /// DER encoding of the public half.
    fn public_der(&self) -> Result<Vec<u8>, PrimitiveError>;
    /// PEM encoding of the public half.
    fn public_pem(&self) -> Result<String, PrimitiveError>;
    /// DER encoding of the private half. Errors if `has_private()` is false.
    fn private_der(&self) -> Result<Vec<u8>, PrimitiveError>;
    /// PEM encoding of the private half. Errors if `has_private()` is false.
    fn private_pem(&self) -> Result<String, PrimitiveError>;
}

/// Single-block RSA primitive: generate keys, import a public key from DER,
/// encrypt a block with a public key, decrypt a block with a private key.
///
/// One "block" here means one RSA-sized chunk — chunking an arbitrary-length
/// payload into blocks is [`CipherWrap`](super::cipher::CipherWrap)'s job, not
/// this trait's.
pub trait RsaPrimitive: Send + Sync {
    type Handle: KeyHandle;

    fn generate_keypair(&self, bits: usize) -> Result<Self::Handle, PrimitiveError>;
    fn import_public_der(&self, der: &[u8]) -> Result<Self::Handle, PrimitiveError>;
    fn encrypt_block(&self, handle: &Self::Handle, block: &[u8]) -> Result<Vec<u8>, PrimitiveError>;
    fn decrypt_block(&self, handle: &Self::Handle, block: &[u8]) -> Result<Vec<u8>, PrimitiveError>;
    /// Byte width of a ciphertext block produced by `encrypt_block` for this key.
    fn block_size(&self, handle: &Self::Handle) -> usize;
}

/// Concrete RSA handle: either a public key alone, or a full keypair.
pub enum RsaKeyHandle {
    Public(RsaPublicKey),
    Pair(RsaPrivateKey, RsaPublicKey),
}

impl RsaKeyHandle {
    fn public(&self) -> &RsaPublicKey {
        match self {
            RsaKeyHandle::Public(p) => p,
            RsaKeyHandle::Pair(_, p) => p,
        }
    }
}

impl KeyHandle for RsaKeyHandle {
    fn has_private(&self) -> bool {
        matches!(self, RsaKeyHandle::Pair(_, _))
    }

    fn public_der(&self) -> Result<Vec<u8>, PrimitiveError> {
        self.public()
            .to_public_key_der()
            .map(|doc| doc.as_bytes().to_vec())
            .map_err(|e| PrimitiveError::Export(e.to_string()))
    }

    fn public_pem(&self) -> Result<String, PrimitiveError> {
        use rsa::pkcs8::EncodePublicKey as _;
        self.public()
            .to_public_key_pem(Default::default())
            .map_err(|e| PrimitiveError::Export(e.to_string()))
    }

    fn private_der(&self) -> Result<Vec<u8>, PrimitiveError> {
        use rsa::pkcs8::EncodePrivateKey;
        match self {
            RsaKeyHandle::Pair(sk, _) => sk
                .to_pkcs8_der()
                .map(|doc| doc.as_bytes().to_vec())
                .map_err(|e| PrimitiveError::Export(e.to_string())),
            RsaKeyHandle::Public(_) => {
                Err(PrimitiveError::Export("no private key held".into()))
            }
        }
    }

    fn private_pem(&self) -> Result<String, PrimitiveError> {
        use rsa::pkcs8::{EncodePrivateKey, LineEnding};
        match self {
            RsaKeyHandle::Pair(sk, _) => sk
                .to_pkcs8_pem(LineEnding::LF)
                .map(|z| z.to_string())
                .map_err(|e| PrimitiveError::Export(e.to_string())),
            RsaKeyHandle::Public(_) => {
                Err(PrimitiveError::Export("no private key held".into()))
            }
        }
    }
}

/// Default [`RsaPrimitive`] backed by the `rsa` crate with PKCS#1 v1.5 padding.
#[derive(Debug, Default, Clone, Copy)]
pub struct RsaCryptoPrimitive;

impl RsaPrimitive for RsaCryptoPrimitive {
    type Handle = RsaKeyHandle;

    fn generate_keypair(&self, bits: usize) -> Result<Self::Handle, PrimitiveError> {
        let mut rng = OsRng;
        let private_key = RsaPrivateKey::new(&mut rng, bits)
            .map_err(|e| PrimitiveError::KeyGen(e.to_string()))?;
        let public_key = private_key.to_public_key();
        Ok(RsaKeyHandle::Pair(private_key, public_key))
    }

    fn import_public_der(&self, der: &[u8]) -> Result<Self::Handle, PrimitiveError> {
        let public_key = RsaPublicKey::from_public_key_der(der)
            .map_err(|e| PrimitiveError::Import(e.to_string()))?;
        Ok(RsaKeyHandle::Public(public_key))
    }

    fn encrypt_block(&self, handle: &Self::Handle, block: &[u8]) -> Result<Vec<u8>, PrimitiveError> {
        let mut rng = OsRng;
        handle
            .public()
            .encrypt(&mut rng, Pkcs1v15Encrypt, block)
            .map_err(|e| PrimitiveError::Encrypt(e.to_string()))
    }

    fn decrypt_block(&self, handle: &Self::Handle, block: &[u8]) -> Result<Vec<u8>, PrimitiveError> {
        match handle {
            RsaKeyHandle::Pair(sk, _) => sk
                .decrypt(Pkcs1v15Encrypt, block)
                .map_err(|e| PrimitiveError::Decrypt(e.to_string())),
            RsaKeyHandle::Public(_) => {
                Err(PrimitiveError::Decrypt("no private key held".into()))
            }
        }
    }

    fn block_size(&self, handle: &Self::Handle) -> usize {
        handle.public().size()
    }
}
