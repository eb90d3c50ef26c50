//! Protocol message shapes and onion construction.
//!
//! This module is deliberately socket-free: everything here is a pure
//! transformation over owned data, so the onion-wrapping/peeling logic is
//! unit-testable without a connection. The state machines that drive it
//! live in [`incoming`] and [`outgoing`].

pub mod envelope;
pub mod incoming;
pub mod outgoing;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::finger::{Finger, FingerError};

pub type FingerFields = (String, u16, Vec<u8>, String);

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("invalid protocol message type '{0}'")]
    InvalidMessageType(String),
    #[error("parameter key '{0}' is not all-uppercase")]
    NonUppercaseKey(String),
    #[error("missing required parameter '{0}'")]
    MissingParameter(&'static str),
    #[error("parameter '{0}' had the wrong shape")]
    MalformedParameter(&'static str),
    #[error("{0}")]
    BadSender(#[from] FingerError),
}

/// One of the seven 4-uppercase-letter protocol message tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    Announce,
    Message,
    Ping,
    Pong,
    Quit,
    Relay,
    Welcome,
}

impl MessageType {
    pub const ALL: [MessageType; 7] = [
        MessageType::Announce,
        MessageType::Message,
        MessageType::Ping,
        MessageType::Pong,
        MessageType::Quit,
        MessageType::Relay,
        MessageType::Welcome,
    ];

    pub fn as_tag(self) -> &'static str {
        match self {
            MessageType::Announce => "ANNO",
            MessageType::Message => "MESG",
            MessageType::Ping => "PING",
            MessageType::Pong => "PONG",
            MessageType::Quit => "QUIT",
            MessageType::Relay => "RELY",
            MessageType::Welcome => "WELC",
        }
    }

    pub fn from_tag(tag: &str) -> Result<Self, ProtocolError> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_tag() == tag)
            .ok_or_else(|| ProtocolError::InvalidMessageType(tag.to_string()))
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

/// A single protocol message parameter value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ParamValue {
    Text(String),
    #[serde(with = "serde_bytes")]
    Bytes(Vec<u8>),
    Finger(FingerFields),
    FingerList(Vec<FingerFields>),
}

/// Parameters of a protocol message. Keys must be ALL-UPPERCASE.
pub type Params = BTreeMap<String, ParamValue>;

pub fn params_with(entries: Vec<(&str, ParamValue)>) -> Result<Params, ProtocolError> {
    let mut map = Params::new();
    for (key, value) in entries {
        if key.chars().any(|c| c.is_ascii_lowercase()) {
            return Err(ProtocolError::NonUppercaseKey(key.to_string()));
        }
        map.insert(key.to_string(), value);
    }
    Ok(map)
}

pub fn expect_text(params: &Params, key: &'static str) -> Result<String, ProtocolError> {
    match params.get(key) {
        Some(ParamValue::Text(s)) => Ok(s.clone()),
        Some(_) => Err(ProtocolError::MalformedParameter(key)),
        None => Err(ProtocolError::MissingParameter(key)),
    }
}

pub fn expect_bytes(params: &Params, key: &'static str) -> Result<Vec<u8>, ProtocolError> {
    match params.get(key) {
        Some(ParamValue::Bytes(b)) => Ok(b.clone()),
        Some(_) => Err(ProtocolError::MalformedParameter(key)),
        None => Err(ProtocolError::MissingParameter(key)),
    }
}

pub fn expect_finger(params: &Params, key: &'static str) -> Result<FingerFields, ProtocolError> {
    match params.get(key) {
        Some(ParamValue::Finger(f)) => Ok(f.clone()),
        Some(_) => Err(ProtocolError::MalformedParameter(key)),
        None => Err(ProtocolError::MissingParameter(key)),
    }
}

pub fn expect_finger_list(
    params: &Params,
    key: &'static str,
) -> Result<Vec<FingerFields>, ProtocolError> {
    match params.get(key) {
        Some(ParamValue::FingerList(list)) => Ok(list.clone()),
        Some(_) => Err(ProtocolError::MalformedParameter(key)),
        None => Err(ProtocolError::MissingParameter(key)),
    }
}

/// The full message triple sent over the wire (plus padding, appended by the
/// caller at encode time and stripped automatically at decode time).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolMessage {
    pub sender: FingerFields,
    pub message_type: MessageType,
    pub parameters: Params,
}

impl ProtocolMessage {
    pub fn new(sender: FingerFields, message_type: MessageType, parameters: Params) -> Self {
        Self {
            sender,
            message_type,
            parameters,
        }
    }

    /// Recompute the sender's `Finger`, checking the embedded ident.
    pub fn sender_finger(&self) -> Result<Finger, ProtocolError> {
        let (addr, port, key, ident) = self.sender.clone();
        Ok(Finger::new(addr, port, key, &ident)?)
    }

    /// Verify message shape against an optional expected type.
    pub fn verify(&self, expected: Option<MessageType>) -> Result<(), ProcedureError> {
        if let Some(expected) = expected {
            if expected != self.message_type {
                return Err(ProcedureError {
                    expected: expected.to_string(),
                    actual: self.message_type.to_string(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Error, Debug)]
#[error("expected message type '{expected}' but got '{actual}'")]
pub struct ProcedureError {
    pub expected: String,
    pub actual: String,
}

/// One onion layer: where to forward, and the still-encrypted remainder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnionLayer {
    pub next: FingerFields,
    #[serde(with = "serde_bytes")]
    pub package: Vec<u8>,
}

/// The innermost onion layer: the plaintext message for its recipient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalPacket {
    pub message: String,
    pub recipient: String,
    pub sender: FingerFields,
}

/// What a relay finds after decrypting one layer of `PACKAGE`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OnionPeel {
    Layer(OnionLayer),
    Final(FinalPacket),
}

/// Build a fully-wrapped onion payload addressed to `recipient`, routed
/// through `path` (outermost hop last). `encrypt_fn(finger, plaintext)`
/// encrypts one layer's serialized bytes under that finger's public key.
///
/// Returns the outermost ciphertext, ready to hand to `path`'s last hop in
/// a `RELY` message's `PACKAGE` parameter.
pub fn build_onion<F, E>(
    recipient: &Finger,
    path: &[Finger],
    final_packet: &FinalPacket,
    mut encrypt_fn: F,
) -> Result<Vec<u8>, E>
where
    F: FnMut(&Finger, &[u8]) -> Result<Vec<u8>, E>,
{
    let final_bytes = crate::wire::encode(final_packet).expect("FinalPacket always encodes");
    let mut current = encrypt_fn(recipient, &final_bytes)?;

    let mut previous_target = recipient.clone();
    for hop in path {
        let layer = OnionLayer {
            next: previous_target.all(),
            package: current,
        };
        let layer_bytes = crate::wire::encode(&layer).expect("OnionLayer always encodes");
        current = encrypt_fn(hop, &layer_bytes)?;
        previous_target = hop.clone();
    }

    Ok(current)
}
