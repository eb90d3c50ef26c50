//! Composition root: wires up keys, the local finger, the finger-space, and
//! the connection manager into one handle.

use std::sync::Arc;

use crate::config::Config;
use crate::connection::ConnectionManager;
use crate::crypto::{CipherWrap, RsaPrimitive};
use crate::error::DistrimError;
use crate::finger::Finger;
use crate::finger_space::FingerSpace;
use crate::protocol::incoming::{DeliveryHook, LoggingDeliveryHook};

/// One running (or not-yet-started) node in the overlay.
pub struct Node<P: RsaPrimitive + Clone + 'static> {
    finger: Finger,
    finger_space: Arc<FingerSpace>,
    connections: Arc<ConnectionManager<P>>,
}

impl<P: RsaPrimitive + Clone + 'static> Node<P> {
    /// Generate a fresh keypair, build the local finger for `advertise_addr`,
    /// and wire up an (unstarted) connection manager.
    pub fn new(config: Config, primitive: P, advertise_addr: &str) -> Result<Self, DistrimError> {
        Self::with_delivery_hook(config, primitive, advertise_addr, Arc::new(LoggingDeliveryHook))
    }

    pub fn with_delivery_hook(
        config: Config,
        primitive: P,
        advertise_addr: &str,
        delivery_hook: Arc<dyn DeliveryHook>,
    ) -> Result<Self, DistrimError> {
        let cipher = Arc::new(CipherWrap::generate(
            primitive.clone(),
            config.key_length,
            config.crypt_chunk_size,
        )?);
        let public_der = cipher.public_der()?;
        let finger = Finger::new(advertise_addr, config.listening_port, public_der, "")?;

        let finger_space = FingerSpace::new(finger.clone());
        let connections = ConnectionManager::new(
            config,
            primitive,
            finger.clone(),
            cipher,
            finger_space.clone(),
            delivery_hook,
        );

        Ok(Self {
            finger,
            finger_space,
            connections,
        })
    }

    pub fn finger(&self) -> &Finger {
        &self.finger
    }

    pub fn finger_space_size(&self) -> usize {
        self.finger_space.len()
    }

    pub fn finger_space(&self) -> &Arc<FingerSpace> {
        &self.finger_space
    }

    pub async fn start(&self) -> Result<(), DistrimError> {
        self.connections.start().await
    }

    pub async fn stop(&self) {
        self.connections.stop().await
    }

    pub async fn bootstrap(&self, addr: &str, port: u16) -> Result<(), DistrimError> {
        self.connections.bootstrap(addr, port).await
    }

    pub async fn send_message(&self, recipient_ident: &str, text: &str) -> Result<(), DistrimError> {
        self.connections.send_message(recipient_ident, text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::RsaCryptoPrimitive;

    #[tokio::test]
    async fn new_node_seeds_finger_space_with_nothing_but_rejects_self() {
        let config = Config {
            key_length: 512,
            ..Config::default()
        };
        let node = Node::new(config, RsaCryptoPrimitive, "127.0.0.1").unwrap();
        assert_eq!(node.finger_space_size(), 0);

        let finger = node.finger().clone();
        node.finger_space
            .put(finger.addr, finger.port, finger.public_key_der, &finger.ident)
            .unwrap();
        assert_eq!(node.finger_space_size(), 0);
    }

    #[tokio::test]
    async fn start_then_stop_round_trips_cleanly() {
        let config = Config {
            key_length: 512,
            listening_port: 19482,
            ..Config::default()
        };
        let node = Node::new(config, RsaCryptoPrimitive, "127.0.0.1").unwrap();
        node.start().await.unwrap();
        assert!(node.connections.is_running());
        node.stop().await;
    }
}
