//! Per-connection state machine for accepted sockets.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::crypto::{CipherWrap, RsaPrimitive};
use crate::error::DistrimError;
use crate::finger::Finger;
use crate::finger_space::FingerSpace;
use crate::wire::{self, WireFramer};

use super::envelope::{decrypt_envelope, encrypt_envelope, EnvelopeConfig};
use super::{
    expect_finger, expect_finger_list, expect_text, params_with, FingerFields, MessageType,
    OnionPeel, ParamValue, ProtocolMessage,
};

/// Stands in for the excluded "interactive terminal command loop" — the
/// core only needs to know a message arrived and who it's from.
pub trait DeliveryHook: Send + Sync {
    fn deliver(&self, message: String, recipient_ident: String, sender: FingerFields);
}

/// Default hook used outside tests: logs the delivery.
pub struct LoggingDeliveryHook;

impl DeliveryHook for LoggingDeliveryHook {
    fn deliver(&self, message: String, recipient_ident: String, sender: FingerFields) {
        log::info!("delivered to {recipient_ident} from {}: {message}", sender.3);
    }
}

pub struct IncomingHandler<P: RsaPrimitive + Clone> {
    primitive: P,
    local_finger: Finger,
    local_cipher: Arc<CipherWrap<P>>,
    finger_space: Arc<FingerSpace>,
    framer: Arc<WireFramer>,
    delivery_hook: Arc<dyn DeliveryHook>,
    envelope: EnvelopeConfig,
    crypt_chunk_size: usize,
}

impl<P: RsaPrimitive + Clone> IncomingHandler<P> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        primitive: P,
        local_finger: Finger,
        local_cipher: Arc<CipherWrap<P>>,
        finger_space: Arc<FingerSpace>,
        framer: Arc<WireFramer>,
        delivery_hook: Arc<dyn DeliveryHook>,
        salt_len_min: usize,
        salt_len_max: usize,
        crypt_chunk_size: usize,
    ) -> Self {
        Self {
            primitive,
            local_finger,
            local_cipher,
            finger_space,
            framer,
            delivery_hook,
            envelope: EnvelopeConfig {
                salt_len_min,
                salt_len_max,
            },
            crypt_chunk_size,
        }
    }

    /// Handle one accepted connection: read exactly one frame, classify it as
    /// a bootstrap request or an encrypted message, and act on it.
    pub async fn handle<S: AsyncRead + AsyncWrite + Unpin>(
        &self,
        stream: &mut S,
    ) -> Result<(), DistrimError> {
        let frame = self.framer.recv_frame(stream).await?;

        if let Ok(fields) = wire::decode::<FingerFields>(&frame) {
            if let Ok(new_peer) = Finger::new(fields.0, fields.1, fields.2, &fields.3) {
                log::info!("new node joining network with ident {}", new_peer.ident);
                return self.handle_bootstrap(stream, new_peer).await;
            }
        }

        let message = decrypt_envelope(&self.local_cipher, &frame)?;
        let sender = message.sender_finger()?;
        self.dispatch(message, sender).await
    }

    async fn handle_bootstrap<S: AsyncRead + AsyncWrite + Unpin>(
        &self,
        stream: &mut S,
        new_peer: Finger,
    ) -> Result<(), DistrimError> {
        let peer_cipher = CipherWrap::from_public_der(
            self.primitive.clone(),
            &new_peer.public_key_der,
            self.crypt_chunk_size,
        )?;
        let nodes: Vec<FingerFields> = self.finger_space.export_all();
        let params = params_with(vec![("NODES", ParamValue::FingerList(nodes))])?;
        let reply = encrypt_envelope(
            &peer_cipher,
            &self.local_finger,
            MessageType::Welcome,
            params,
            &self.envelope,
        )?;
        self.framer.send_frame(stream, &reply).await?;

        // Insert only after the welcome was sent: the welcome's NODES list
        // should reflect the directory before this peer was in it.
        self.finger_space
            .put(new_peer.addr, new_peer.port, new_peer.public_key_der, &new_peer.ident)?;
        Ok(())
    }

    async fn dispatch(&self, message: ProtocolMessage, sender: Finger) -> Result<(), DistrimError> {
        match message.message_type {
            MessageType::Announce => {
                let (addr, port, key, ident) = expect_finger(&message.parameters, "NODE")?;
                self.finger_space.put(addr, port, key, &ident)?;
            }
            MessageType::Quit => {
                let ident = expect_text(&message.parameters, "IDENT")?;
                self.finger_space.remove(&ident);
            }
            MessageType::Relay => {
                self.handle_relay(&message).await?;
            }
            MessageType::Welcome => {
                return Err(DistrimError::Procedure {
                    expected: "a request phase expecting WELC".into(),
                    actual: MessageType::Welcome.to_string(),
                });
            }
            MessageType::Message | MessageType::Ping | MessageType::Pong => {
                log::debug!("received reserved message type {} from {}", message.message_type, sender.ident);
            }
        }
        Ok(())
    }

    async fn handle_relay(&self, message: &ProtocolMessage) -> Result<(), DistrimError> {
        let package = super::expect_bytes(&message.parameters, "PACKAGE")?;
        let plain = self.local_cipher.decrypt(&package)?;
        let peeled: OnionPeel = wire::decode(&plain)?;

        match peeled {
            OnionPeel::Final(packet) => {
                let (addr, port, key, ident) = packet.sender.clone();
                self.finger_space.put(addr, port, key, &ident)?;
                self.delivery_hook
                    .deliver(packet.message, packet.recipient, packet.sender);
            }
            OnionPeel::Layer(layer) => {
                let (addr, port, key, ident) = layer.next.clone();
                self.finger_space.put(addr.clone(), port, key, &ident)?;
                let next_finger = self
                    .finger_space
                    .get(&ident)
                    .ok_or_else(|| DistrimError::FingerSpace(format!("unknown next hop {ident}")))?;

                let next_cipher = CipherWrap::from_public_der(
                    self.primitive.clone(),
                    &next_finger.public_key_der,
                    self.crypt_chunk_size,
                )?;
                let params = params_with(vec![("PACKAGE", ParamValue::Bytes(layer.package))])?;
                let envelope = encrypt_envelope(
                    &next_cipher,
                    &self.local_finger,
                    MessageType::Relay,
                    params,
                    &self.envelope,
                )?;

                let mut conn = TcpStream::connect((next_finger.addr.as_str(), next_finger.port))
                    .await
                    .map_err(DistrimError::from)?;
                self.framer.send_frame(&mut conn, &envelope).await?;
            }
        }
        Ok(())
    }
}

/// Consumed only to keep `expect_finger_list` referenced; the Bootstrapper
/// (outgoing) is the actual caller of list-shaped parameters like `NODES`.
#[allow(dead_code)]
fn _unused(params: &super::Params) -> Result<Vec<FingerFields>, super::ProtocolError> {
    expect_finger_list(params, "NODES")
}
