//! Crate-wide error taxonomy.
//!
//! Every fallible boundary in this crate returns `Result<_, DistrimError>` (or a
//! narrower per-module error that converts into it via `From`). The seven
//! variants are semantic categories, not module boundaries — several modules
//! can raise the same kind.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DistrimError {
    /// Malformed frame body, wrong shape, unknown message type, non-uppercase key.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Well-formed message of unexpected type for the current phase.
    #[error("procedure error: expected {expected}, got {actual}")]
    Procedure { expected: String, actual: String },

    /// Recomputed Finger of a sender doesn't match a previously recorded one.
    #[error("authentication error: {0}")]
    Authentication(String),

    /// Supplied ident disagrees with the computed one on Finger construction.
    #[error("identity mismatch for {addr}:{port}: computed {computed}, given {given}")]
    IdentityMismatch {
        addr: String,
        port: u16,
        computed: String,
        given: String,
    },

    /// Empty directory when one is required, or invalid Finger field types.
    #[error("finger-space error: {0}")]
    FingerSpace(String),

    /// Bad key import, decrypt without private key, oversized unchunked input.
    #[error("cipher error: {0}")]
    Cipher(String),

    /// I/O failure, timeout, connect to unset address, use before connect.
    #[error("socket error: {0}")]
    SocketWrapper(String),
}

impl From<crate::crypto::cipher::CipherError> for DistrimError {
    fn from(err: crate::crypto::cipher::CipherError) -> Self {
        match err {
            // Ciphertext that isn't a multiple of the block size never came
            // from this crate's own `encrypt`; it's a malformed frame body,
            // not a cryptographic fault like a missing key.
            crate::crypto::cipher::CipherError::MisalignedCiphertext => {
                DistrimError::Protocol(err.to_string())
            }
            other => DistrimError::Cipher(other.to_string()),
        }
    }
}

impl From<crate::wire::framer::WireError> for DistrimError {
    fn from(err: crate::wire::framer::WireError) -> Self {
        DistrimError::SocketWrapper(err.to_string())
    }
}

impl From<crate::finger::FingerError> for DistrimError {
    fn from(err: crate::finger::FingerError) -> Self {
        match err {
            crate::finger::FingerError::IdentityMismatch {
                addr,
                port,
                computed,
                given,
            } => DistrimError::IdentityMismatch {
                addr,
                port,
                computed,
                given,
            },
            other => DistrimError::FingerSpace(other.to_string()),
        }
    }
}

impl From<std::io::Error> for DistrimError {
    fn from(err: std::io::Error) -> Self {
        DistrimError::SocketWrapper(err.to_string())
    }
}

impl From<bincode::Error> for DistrimError {
    fn from(err: bincode::Error) -> Self {
        DistrimError::Protocol(err.to_string())
    }
}

impl From<crate::wire::serializer::SerializerError> for DistrimError {
    fn from(err: crate::wire::serializer::SerializerError) -> Self {
        DistrimError::Protocol(err.to_string())
    }
}

impl From<crate::protocol::ProtocolError> for DistrimError {
    fn from(err: crate::protocol::ProtocolError) -> Self {
        DistrimError::Protocol(err.to_string())
    }
}

impl From<crate::protocol::ProcedureError> for DistrimError {
    fn from(err: crate::protocol::ProcedureError) -> Self {
        DistrimError::Procedure {
            expected: err.expected,
            actual: err.actual,
        }
    }
}

impl From<crate::finger_space::FingerSpaceError> for DistrimError {
    fn from(err: crate::finger_space::FingerSpaceError) -> Self {
        DistrimError::FingerSpace(err.to_string())
    }
}
