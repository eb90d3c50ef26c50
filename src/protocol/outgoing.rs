//! Handlers for connections this node initiates: bootstrap rendezvous,
//! announce, leave, and sending a message down an onion path.

use std::sync::Arc;

use tokio::net::TcpStream;

use crate::crypto::{CipherWrap, RsaPrimitive};
use crate::error::DistrimError;
use crate::finger::Finger;
use crate::finger_space::FingerSpace;
use crate::wire::{self, WireFramer};

use super::envelope::{decrypt_envelope, encrypt_envelope, EnvelopeConfig};
use super::{build_onion, expect_finger_list, params_with, FinalPacket, MessageType, ParamValue};

pub struct OutgoingContext<P: RsaPrimitive + Clone> {
    pub primitive: P,
    pub local_finger: Finger,
    pub local_cipher: Arc<CipherWrap<P>>,
    pub finger_space: Arc<FingerSpace>,
    pub framer: Arc<WireFramer>,
    pub envelope: EnvelopeConfig,
    pub path_length: usize,
    pub crypt_chunk_size: usize,
}

impl<P: RsaPrimitive + Clone> OutgoingContext<P> {
    fn cipher_for(&self, finger: &Finger) -> Result<CipherWrap<P>, DistrimError> {
        Ok(CipherWrap::from_public_der(
            self.primitive.clone(),
            &finger.public_key_der,
            self.crypt_chunk_size,
        )?)
    }

    /// Rendezvous with an existing node in the network: send our own finger
    /// unencrypted, receive a `WELC` with the current directory, import it,
    /// then announce ourselves to every peer other than the bootstrap node.
    pub async fn bootstrap(&self, addr: &str, port: u16) -> Result<(), DistrimError> {
        let mut conn = TcpStream::connect((addr, port)).await?;
        let request = wire::encode(&self.local_finger.all())?;
        self.framer.send_frame(&mut conn, &request).await?;

        let reply = self.framer.recv_frame(&mut conn).await?;
        let message = decrypt_envelope(&self.local_cipher, &reply)?;
        message.verify(Some(MessageType::Welcome))?;

        let bootstrap_node = message.sender_finger()?;
        self.finger_space.put(
            bootstrap_node.addr.clone(),
            bootstrap_node.port,
            bootstrap_node.public_key_der.clone(),
            &bootstrap_node.ident,
        )?;

        let nodes = expect_finger_list(&message.parameters, "NODES")?;
        self.finger_space.import_nodes(nodes);

        for peer in self.finger_space.get_all() {
            if peer.ident == bootstrap_node.ident {
                continue;
            }
            if let Err(err) = self.announce(&peer).await {
                log::warn!("announce to {} failed: {err}", peer.ident);
            }
        }
        Ok(())
    }

    /// Make this node's presence known to one peer.
    pub async fn announce(&self, peer: &Finger) -> Result<(), DistrimError> {
        let mut conn = TcpStream::connect((peer.addr.as_str(), peer.port)).await?;
        let cipher = self.cipher_for(peer)?;
        let params = params_with(vec![("NODE", ParamValue::Finger(self.local_finger.all()))])?;
        let envelope = encrypt_envelope(
            &cipher,
            &self.local_finger,
            MessageType::Announce,
            params,
            &self.envelope,
        )?;
        self.framer.send_frame(&mut conn, &envelope).await?;
        Ok(())
    }

    /// Tell one peer this node is leaving the network.
    pub async fn leave(&self, peer: &Finger) -> Result<(), DistrimError> {
        let mut conn = TcpStream::connect((peer.addr.as_str(), peer.port)).await?;
        let cipher = self.cipher_for(peer)?;
        let params = params_with(vec![(
            "IDENT",
            ParamValue::Text(self.local_finger.ident.clone()),
        )])?;
        let envelope = encrypt_envelope(
            &cipher,
            &self.local_finger,
            MessageType::Quit,
            params,
            &self.envelope,
        )?;
        self.framer.send_frame(&mut conn, &envelope).await?;
        Ok(())
    }

    /// Tell every currently-known peer this node is leaving.
    pub async fn leave_all(&self) {
        for peer in self.finger_space.get_all() {
            if let Err(err) = self.leave(&peer).await {
                log::warn!("quit notice to {} failed: {err}", peer.ident);
            }
        }
    }

    /// Send one message to `recipient_ident`, onion-routed through up to
    /// `path_length` random relays.
    pub async fn send_message(&self, recipient_ident: &str, text: &str) -> Result<(), DistrimError> {
        let recipient = self
            .finger_space
            .get(recipient_ident)
            .ok_or_else(|| DistrimError::FingerSpace(format!("unknown recipient {recipient_ident}")))?;

        let final_packet = FinalPacket {
            message: text.to_string(),
            recipient: recipient_ident.to_string(),
            sender: self.local_finger.all(),
        };

        let drawn = self.finger_space.get_random_fingers(self.path_length)?;
        let path: Vec<Finger> = drawn.into_iter().filter(|f| f.ident != recipient.ident).collect();

        let primitive = self.primitive.clone();
        let crypt_chunk_size = self.crypt_chunk_size;
        let outermost = build_onion(&recipient, &path, &final_packet, move |target, bytes| {
            let cipher = CipherWrap::from_public_der(
                primitive.clone(),
                &target.public_key_der,
                crypt_chunk_size,
            )?;
            cipher.encrypt(bytes).map_err(DistrimError::from)
        })?;

        let first_hop = path.last().cloned().unwrap_or_else(|| recipient.clone());
        let mut conn = TcpStream::connect((first_hop.addr.as_str(), first_hop.port)).await?;
        let cipher = self.cipher_for(&first_hop)?;
        let params = params_with(vec![("PACKAGE", ParamValue::Bytes(outermost))])?;
        let envelope = encrypt_envelope(
            &cipher,
            &self.local_finger,
            MessageType::Relay,
            params,
            &self.envelope,
        )?;
        self.framer.send_frame(&mut conn, &envelope).await?;
        Ok(())
    }
}
