//! Shared encrypt/decrypt envelope for every protocol message sent over the
//! wire: `encrypt_with_foreign_public( serialize(message) || random_padding )`.

use crate::crypto::{CipherWrap, RsaPrimitive};
use crate::error::DistrimError;
use crate::finger::Finger;
use crate::wire;

use super::{MessageType, Params, ProtocolMessage};

pub struct EnvelopeConfig {
    pub salt_len_min: usize,
    pub salt_len_max: usize,
}

/// Serialize, pad, and encrypt a message for the peer `cipher` is keyed to.
pub fn encrypt_envelope<P: RsaPrimitive>(
    cipher: &CipherWrap<P>,
    local_finger: &Finger,
    message_type: MessageType,
    parameters: Params,
    config: &EnvelopeConfig,
) -> Result<Vec<u8>, DistrimError> {
    let message = ProtocolMessage::new(local_finger.all(), message_type, parameters);
    let padded = wire::encode_with_padding(&message, config.salt_len_min, config.salt_len_max)?;
    Ok(cipher.encrypt(&padded)?)
}

/// Decrypt and decode a message with our own (private-key-holding) cipher.
pub fn decrypt_envelope<P: RsaPrimitive>(
    local_cipher: &CipherWrap<P>,
    cryptic: &[u8],
) -> Result<ProtocolMessage, DistrimError> {
    let plain = local_cipher.decrypt(cryptic)?;
    Ok(wire::decode(&plain)?)
}
