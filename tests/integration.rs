//! End-to-end scenarios driven entirely through the public API: real loopback
//! TCP listeners, freshly generated RSA keypairs, no mocking of the network
//! or crypto layers.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use distrim::config::Config;
use distrim::crypto::RsaCryptoPrimitive;
use distrim::protocol::incoming::DeliveryHook;
use distrim::protocol::FingerFields;
use distrim::Node;

type SharedNode = Node<RsaCryptoPrimitive>;

/// Records every delivered message, for asserting who did (and didn't) see
/// a given `MESG` payload.
#[derive(Default)]
struct RecordingHook {
    deliveries: Mutex<Vec<(String, String, FingerFields)>>,
}

impl DeliveryHook for RecordingHook {
    fn deliver(&self, message: String, recipient_ident: String, sender: FingerFields) {
        self.deliveries
            .lock()
            .unwrap()
            .push((message, recipient_ident, sender));
    }
}

fn test_config(port: u16, path_length: usize) -> Config {
    Config {
        listening_port: port,
        key_length: 512,
        path_length,
        ..Config::default()
    }
}

async fn spawn_node(port: u16, path_length: usize) -> (Arc<SharedNode>, Arc<RecordingHook>) {
    let hook = Arc::new(RecordingHook::default());
    let node = Node::with_delivery_hook(
        test_config(port, path_length),
        RsaCryptoPrimitive,
        "127.0.0.1",
        hook.clone(),
    )
    .expect("node construction should succeed");
    let node = Arc::new(node);
    node.start().await.expect("listener should bind");
    (node, hook)
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(150)).await;
}

#[tokio::test]
async fn s1_bootstrap_both_sides_learn_each_other() {
    let (b, _b_hook) = spawn_node(19601, 3).await;
    let (a, _a_hook) = spawn_node(19602, 3).await;

    a.bootstrap("127.0.0.1", 19601).await.unwrap();
    settle().await;

    assert!(a.finger_space().get(&b.finger().ident).is_some());
    assert!(b.finger_space().get(&a.finger().ident).is_some());

    a.stop().await;
    b.stop().await;
}

#[tokio::test]
async fn s2_three_node_mesh_settles_by_announce() {
    let (b, _) = spawn_node(19611, 3).await;
    let (a, _) = spawn_node(19612, 3).await;
    let (c, _) = spawn_node(19613, 3).await;

    a.bootstrap("127.0.0.1", 19611).await.unwrap();
    settle().await;
    c.bootstrap("127.0.0.1", 19611).await.unwrap();
    settle().await;

    for (name, node) in [("a", &a), ("b", &b), ("c", &c)] {
        for (other_name, other) in [("a", &a), ("b", &b), ("c", &c)] {
            if name == other_name {
                continue;
            }
            assert!(
                node.finger_space().get(&other.finger().ident).is_some(),
                "{name} should know about {other_name}"
            );
        }
    }

    a.stop().await;
    b.stop().await;
    c.stop().await;
}

#[tokio::test]
async fn s3_direct_message_short_path_reaches_recipient() {
    let (b, _) = spawn_node(19621, 1).await;
    let (a, _) = spawn_node(19622, 1).await;
    let (c, c_hook) = spawn_node(19623, 1).await;

    a.bootstrap("127.0.0.1", 19621).await.unwrap();
    settle().await;
    c.bootstrap("127.0.0.1", 19621).await.unwrap();
    settle().await;

    a.send_message(&c.finger().ident, "hello").await.unwrap();
    settle().await;

    let deliveries = c_hook.deliveries.lock().unwrap();
    assert_eq!(deliveries.len(), 1);
    let (message, recipient_ident, sender) = &deliveries[0];
    assert_eq!(message, "hello");
    assert_eq!(recipient_ident, &c.finger().ident);
    assert_eq!(sender.3, a.finger().ident);

    drop(deliveries);
    a.stop().await;
    b.stop().await;
    c.stop().await;
}

#[tokio::test]
async fn s4_full_path_only_recipient_delivers() {
    let base = 19630u16;
    let (hub, _) = spawn_node(base, 3).await;
    let (a, a_hook) = spawn_node(base + 1, 3).await;
    let (relay1, relay1_hook) = spawn_node(base + 2, 3).await;
    let (relay2, relay2_hook) = spawn_node(base + 3, 3).await;
    let (e, e_hook) = spawn_node(base + 4, 3).await;

    for node in [&a, &relay1, &relay2, &e] {
        node.bootstrap("127.0.0.1", base).await.unwrap();
        settle().await;
    }
    // one extra settling pass for announces to finish fanning out
    settle().await;

    a.send_message(&e.finger().ident, "full path message")
        .await
        .unwrap();
    settle().await;

    assert_eq!(e_hook.deliveries.lock().unwrap().len(), 1);
    assert_eq!(a_hook.deliveries.lock().unwrap().len(), 0);
    assert_eq!(relay1_hook.deliveries.lock().unwrap().len(), 0);
    assert_eq!(relay2_hook.deliveries.lock().unwrap().len(), 0);

    let deliveries = e_hook.deliveries.lock().unwrap();
    let (message, _, sender) = &deliveries[0];
    assert_eq!(message, "full path message");
    assert_eq!(sender.3, a.finger().ident);

    drop(deliveries);
    for node in [&hub, &a, &relay1, &relay2, &e] {
        node.stop().await;
    }
}

#[tokio::test]
async fn s5_quit_removes_peer_from_neighbors() {
    let (b, _) = spawn_node(19641, 3).await;
    let (a, _) = spawn_node(19642, 3).await;
    let (c, _) = spawn_node(19643, 3).await;

    a.bootstrap("127.0.0.1", 19641).await.unwrap();
    settle().await;
    c.bootstrap("127.0.0.1", 19641).await.unwrap();
    settle().await;

    assert!(a.finger_space().get(&c.finger().ident).is_some());
    assert!(b.finger_space().get(&c.finger().ident).is_some());

    let c_ident = c.finger().ident.clone();
    c.stop().await;
    settle().await;

    assert!(a.finger_space().get(&c_ident).is_none());
    assert!(b.finger_space().get(&c_ident).is_none());

    a.stop().await;
    b.stop().await;
}

#[tokio::test]
async fn s6_malformed_frame_is_rejected_without_downing_the_listener() {
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpStream;

    let (node, _) = spawn_node(19651, 3).await;

    // `IncomingHandler::handle`'s classification of this exact 4-byte body
    // (misaligned ciphertext -> DistrimError::Protocol, not a cipher fault)
    // is asserted directly in protocol::incoming's own unit tests; here we
    // only check the black-box behavior the listener must preserve.
    let mut bad = TcpStream::connect(("127.0.0.1", 19651)).await.unwrap();
    bad.write_all(&4u32.to_be_bytes()).await.unwrap();
    bad.write_all(&[0u8; 4]).await.unwrap();
    bad.flush().await.unwrap();
    drop(bad);
    settle().await;

    assert!(node.finger_space_size() == 0);

    // the listener must still be accepting connections after a bad frame
    let (other, _) = spawn_node(19652, 3).await;
    other.bootstrap("127.0.0.1", 19651).await.unwrap();
    settle().await;
    assert!(node.finger_space().get(&other.finger().ident).is_some());

    node.stop().await;
    other.stop().await;
}
