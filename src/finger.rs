//! A `Finger` identifies one node in the overlay: its address, its listening
//! port, and its public key, plus the short ident hash derived from them.

use md5::{Digest, Md5};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Four-hex-char (2-byte) identity hash, truncated for the overlay's small
/// demonstration keyspace rather than for any security property.
pub fn generate_hash(addr: &str, port: u16, public_key_der: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(addr.as_bytes());
    hasher.update(port.to_string().as_bytes());
    hasher.update(public_key_der);
    let digest = hasher.finalize();
    hex::encode(digest)[..4].to_string()
}

/// Reject anything that isn't a DER-encoded RSA *public* key: empty input,
/// a PEM-wrapped key (human-readable header, not the binary wire format),
/// unparseable garbage, or a private key mistakenly passed as the public one.
fn validate_public_key_der(der: &[u8]) -> Result<(), FingerError> {
    if der.is_empty() {
        return Err(FingerError::Invalid("public key must not be empty".into()));
    }
    if der.starts_with(b"-----BEGIN") {
        return Err(FingerError::Invalid(
            "public key must be in binary (DER) format, not PEM".into(),
        ));
    }
    if RsaPublicKey::from_public_key_der(der).is_err() {
        return Err(FingerError::Invalid(
            "public key is not a valid RSA public key".into(),
        ));
    }
    if RsaPrivateKey::from_pkcs8_der(der).is_ok() {
        return Err(FingerError::Invalid(
            "public key field holds a private key".into(),
        ));
    }
    Ok(())
}

/// Parse a 4-hex-char ident into its `u16` keyspace slot.
pub fn ident_to_key(ident: &str) -> Result<u16, FingerError> {
    u16::from_str_radix(ident, 16)
        .map_err(|_| FingerError::Invalid(format!("ident '{ident}' is not 4 hex characters")))
}

#[derive(Error, Debug)]
pub enum FingerError {
    #[error("invalid finger data: {0}")]
    Invalid(String),
    #[error("identity mismatch for {addr}:{port}: computed {computed}, given {given}")]
    IdentityMismatch {
        addr: String,
        port: u16,
        computed: String,
        given: String,
    },
}

/// Identifying record for one node: address, port, public key (DER), and the
/// ident hash derived from them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finger {
    pub addr: String,
    pub port: u16,
    #[serde(with = "serde_bytes")]
    pub public_key_der: Vec<u8>,
    pub ident: String,
}

impl PartialEq for Finger {
    fn eq(&self, other: &Self) -> bool {
        self.addr == other.addr
            && self.port == other.port
            && self.public_key_der == other.public_key_der
            && self.ident == other.ident
    }
}
impl Eq for Finger {}

impl Finger {
    /// Build a `Finger` for the given address/port/key, computing its ident.
    ///
    /// If `existing_ident` is non-empty, it must match the computed ident or
    /// this returns [`FingerError::IdentityMismatch`] — the caller asked us
    /// to validate a claim, not just trust it.
    pub fn new(
        addr: impl Into<String>,
        port: u16,
        public_key_der: Vec<u8>,
        existing_ident: &str,
    ) -> Result<Self, FingerError> {
        let addr = addr.into();
        validate_addr(&addr)?;
        if port == 0 {
            return Err(FingerError::Invalid("port must be between 1 and 65535".into()));
        }
        validate_public_key_der(&public_key_der)?;

        let computed = generate_hash(&addr, port, &public_key_der);
        if !existing_ident.is_empty() && existing_ident != computed {
            return Err(FingerError::IdentityMismatch {
                addr,
                port,
                computed,
                given: existing_ident.to_string(),
            });
        }

        Ok(Self {
            addr,
            port,
            public_key_der,
            ident: computed,
        })
    }

    /// `(addr, port, public_key_der)`, the data used to compute the ident.
    pub fn values(&self) -> (String, u16, Vec<u8>) {
        (self.addr.clone(), self.port, self.public_key_der.clone())
    }

    /// `(addr, port, public_key_der, ident)`, the over-the-wire export form.
    pub fn all(&self) -> (String, u16, Vec<u8>, String) {
        (
            self.addr.clone(),
            self.port,
            self.public_key_der.clone(),
            self.ident.clone(),
        )
    }
}

fn validate_addr(addr: &str) -> Result<(), FingerError> {
    if addr.split('.').count() != 4 {
        return Err(FingerError::Invalid(format!("invalid IPv4 address: '{addr}'")));
    }
    Ok(())
}

/// One real, small (512-bit) RSA keypair, fixed for test determinism and
/// reused across modules so every test that needs "a" valid key doesn't have
/// to pay for generating one. Different `(addr, port)` pairs still produce
/// different idents even when the key bytes are identical.
#[cfg(test)]
pub(crate) mod fixtures {
    pub const SAMPLE_PUBLIC_KEY_DER: &[u8] = &[
        48, 92, 48, 13, 6, 9, 42, 134, 72, 134, 247, 13, 1, 1, 1, 5, 0, 3, 75, 0, 48, 72, 2, 65,
        0, 178, 148, 241, 51, 165, 96, 224, 187, 123, 114, 100, 118, 26, 153, 6, 162, 33, 107,
        15, 56, 223, 108, 79, 121, 227, 42, 31, 140, 98, 141, 23, 167, 166, 242, 8, 206, 219, 99,
        77, 23, 192, 153, 248, 37, 199, 247, 100, 13, 223, 28, 178, 39, 48, 158, 243, 237, 66,
        128, 218, 100, 181, 44, 221, 253, 2, 3, 1, 0, 1,
    ];

    pub const SAMPLE_PRIVATE_KEY_DER: &[u8] = &[
        48, 130, 1, 84, 2, 1, 0, 48, 13, 6, 9, 42, 134, 72, 134, 247, 13, 1, 1, 1, 5, 0, 4, 130,
        1, 62, 48, 130, 1, 58, 2, 1, 0, 2, 65, 0, 178, 148, 241, 51, 165, 96, 224, 187, 123, 114,
        100, 118, 26, 153, 6, 162, 33, 107, 15, 56, 223, 108, 79, 121, 227, 42, 31, 140, 98, 141,
        23, 167, 166, 242, 8, 206, 219, 99, 77, 23, 192, 153, 248, 37, 199, 247, 100, 13, 223,
        28, 178, 39, 48, 158, 243, 237, 66, 128, 218, 100, 181, 44, 221, 253, 2, 3, 1, 0, 1, 2,
        64, 55, 181, 233, 77, 64, 81, 105, 170, 115, 71, 107, 121, 192, 176, 110, 118, 83, 208,
        143, 78, 33, 189, 43, 74, 14, 9, 13, 16, 129, 138, 28, 143, 133, 212, 232, 111, 213, 11,
        205, 3, 92, 106, 112, 155, 64, 239, 71, 102, 202, 46, 187, 169, 207, 195, 145, 194, 14,
        33, 178, 254, 238, 140, 27, 141, 2, 33, 0, 232, 33, 119, 167, 141, 32, 27, 232, 130, 45,
        240, 234, 173, 163, 232, 180, 58, 30, 156, 233, 191, 88, 160, 151, 248, 105, 51, 128,
        191, 78, 61, 63, 2, 33, 0, 196, 241, 222, 221, 85, 244, 136, 46, 99, 19, 25, 218, 161,
        150, 142, 4, 202, 204, 243, 112, 28, 121, 155, 76, 96, 37, 73, 63, 95, 83, 9, 195, 2, 33,
        0, 138, 36, 8, 138, 12, 129, 20, 58, 172, 229, 220, 30, 60, 145, 115, 149, 117, 148, 236,
        58, 106, 165, 186, 132, 85, 207, 125, 87, 220, 1, 26, 143, 2, 32, 96, 54, 8, 185, 248,
        19, 205, 179, 91, 147, 41, 62, 53, 82, 103, 110, 207, 227, 239, 201, 5, 32, 35, 77, 220,
        106, 90, 174, 42, 211, 86, 33, 2, 32, 57, 242, 13, 126, 216, 91, 160, 75, 27, 206, 42,
        12, 90, 169, 84, 187, 223, 98, 122, 164, 206, 58, 133, 20, 237, 132, 24, 108, 238, 100,
        84, 117,
    ];

    pub fn sample_key() -> Vec<u8> {
        SAMPLE_PUBLIC_KEY_DER.to_vec()
    }
}
