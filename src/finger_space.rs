//! The FingerSpace: this node's directory of known peers.

use std::collections::HashMap;
use std::sync::Arc;

use rand::seq::IteratorRandom;
use thiserror::Error;

use crate::error::DistrimError;
use crate::finger::{generate_hash, ident_to_key, Finger};

#[derive(Error, Debug)]
pub enum FingerSpaceError {
    #[error("finger-space is empty")]
    Empty,
    #[error("number of fingers requested must be positive")]
    NonPositiveCount,
}

/// The directory of known peers, keyed by their ident.
///
/// Shared between the connection manager's tasks behind an `Arc<Mutex<_>>`;
/// the lock is only ever held for the duration of a single map operation,
/// never across an `.await`.
pub struct FingerSpace {
    local_finger: Finger,
    inner: std::sync::Mutex<Inner>,
}

struct Inner {
    keyspace: HashMap<u16, Finger>,
    count_added: u64,
    count_removed: u64,
}

impl FingerSpace {
    pub fn new(local_finger: Finger) -> Arc<Self> {
        Arc::new(Self {
            local_finger,
            inner: std::sync::Mutex::new(Inner {
                keyspace: HashMap::new(),
                count_added: 0,
                count_removed: 0,
            }),
        })
    }

    pub fn local_finger(&self) -> &Finger {
        &self.local_finger
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().keyspace.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn count_added(&self) -> u64 {
        self.inner.lock().unwrap().count_added
    }

    pub fn count_removed(&self) -> u64 {
        self.inner.lock().unwrap().count_removed
    }

    /// Place a new node into the FingerSpace.
    ///
    /// Rejects (silently, with a log) a finger equal to the local node. An
    /// ident collision with a previously recorded finger for different
    /// `(addr, port, key)` data is an authentication failure: the incoming
    /// claim doesn't match what this node already knows for that ident, and
    /// is rejected rather than silently dropped — callers that treat a bad
    /// batch entry as non-fatal (e.g. [`import_nodes`](Self::import_nodes))
    /// catch and log it themselves.
    pub fn put(
        &self,
        addr: impl Into<String>,
        port: u16,
        public_key_der: Vec<u8>,
        existing_ident: &str,
    ) -> Result<(), DistrimError> {
        let finger = Finger::new(addr, port, public_key_der, existing_ident)?;

        if &finger == &self.local_finger {
            log::warn!("refusing to place local finger into its own finger-space");
            return Ok(());
        }

        let key = ident_to_key(&finger.ident)?;
        let mut inner = self.inner.lock().unwrap();
        match inner.keyspace.get(&key) {
            None => {
                inner.keyspace.insert(key, finger);
                inner.count_added += 1;
            }
            Some(existing) if existing == &finger => {}
            Some(_) => {
                return Err(DistrimError::Authentication(format!(
                    "finger {key:04x}: incoming data doesn't match what's stored"
                )));
            }
        }
        Ok(())
    }

    pub fn get(&self, ident: &str) -> Option<Finger> {
        let key = ident_to_key(ident).ok()?;
        self.inner.lock().unwrap().keyspace.get(&key).cloned()
    }

    /// Remove a finger by ident. Returns `true` if something was removed.
    pub fn remove(&self, ident: &str) -> bool {
        let Some(key) = ident_to_key(ident).ok() else {
            return false;
        };
        let mut inner = self.inner.lock().unwrap();
        if inner.keyspace.remove(&key).is_some() {
            inner.count_removed += 1;
            true
        } else {
            false
        }
    }

    pub fn get_all(&self) -> Vec<Finger> {
        self.inner.lock().unwrap().keyspace.values().cloned().collect()
    }

    /// `(addr, port, public_key_der, ident)` for every stored finger, ready
    /// to hand to a peer asking for our view of the network.
    pub fn export_all(&self) -> Vec<(String, u16, Vec<u8>, String)> {
        self.inner
            .lock()
            .unwrap()
            .keyspace
            .values()
            .map(Finger::all)
            .collect()
    }

    /// Import a batch of `(addr, port, public_key_der, ident)` tuples,
    /// logging (and skipping) any that fail validation rather than aborting
    /// the whole import.
    pub fn import_nodes(&self, nodes: Vec<(String, u16, Vec<u8>, String)>) {
        for (addr, port, key, ident) in nodes {
            if let Err(err) = self.put(addr, port, key, &ident) {
                log::error!("error importing finger: {err}");
            }
        }
    }

    /// `number` distinct random fingers, for selecting an onion path. Caps at
    /// however many are actually stored.
    pub fn get_random_fingers(&self, number: usize) -> Result<Vec<Finger>, FingerSpaceError> {
        if number == 0 {
            return Err(FingerSpaceError::NonPositiveCount);
        }
        let inner = self.inner.lock().unwrap();
        if inner.keyspace.is_empty() {
            return Err(FingerSpaceError::Empty);
        }
        let mut rng = rand::thread_rng();
        let chosen = inner
            .keyspace
            .values()
            .cloned()
            .choose_multiple(&mut rng, number);
        Ok(chosen)
    }
}

/// Recompute an ident the way [`Finger::new`] would, without constructing a
/// full finger — used by callers that just need to check a claim.
pub fn check_hash(addr: &str, port: u16, public_key_der: &[u8], claimed_ident: &str) -> bool {
    generate_hash(addr, port, public_key_der) == claimed_ident
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finger::fixtures::sample_key;

    fn local() -> Finger {
        Finger::new("127.0.0.1", 1000, sample_key(), "").unwrap()
    }

    #[test]
    fn put_and_get_round_trip() {
        let space = FingerSpace::new(local());
        space.put("10.0.0.1", 2000, sample_key(), "").unwrap();
        assert_eq!(space.len(), 1);
        assert_eq!(space.count_added(), 1);

        let ident = generate_hash("10.0.0.1", 2000, &sample_key());
        let fetched = space.get(&ident).unwrap();
        assert_eq!(fetched.addr, "10.0.0.1");
    }

    #[test]
    fn put_rejects_local_finger() {
        let space = FingerSpace::new(local());
        space.put("127.0.0.1", 1000, sample_key(), "").unwrap();
        assert_eq!(space.len(), 0);
        assert_eq!(space.count_added(), 0);
    }

    #[test]
    fn put_same_finger_twice_is_idempotent() {
        let space = FingerSpace::new(local());
        space.put("10.0.0.1", 2000, sample_key(), "").unwrap();
        // Identical data re-inserted under the same ident is a no-op, not a
        // collision.
        space.put("10.0.0.1", 2000, sample_key(), "").unwrap();
        assert_eq!(space.len(), 1);
        assert_eq!(space.count_added(), 1);
    }

    #[test]
    fn put_ident_collision_with_mismatched_data_is_an_authentication_error() {
        // Ports 261 and 345 on this addr/key happen to truncate to the same
        // 4-hex-char ident ("3091"), which is exactly the scenario the
        // truncated keyspace is meant to handle: a later, different claim
        // for an already-occupied slot is rejected, not silently dropped.
        let space = FingerSpace::new(local());
        space.put("10.0.0.1", 261, sample_key(), "").unwrap();
        assert_eq!(space.len(), 1);

        let err = space.put("10.0.0.1", 345, sample_key(), "").unwrap_err();
        assert!(matches!(err, DistrimError::Authentication(_)));
        assert_eq!(space.len(), 1);
    }

    #[test]
    fn remove_reports_success_and_updates_counters() {
        let space = FingerSpace::new(local());
        space.put("10.0.0.1", 2000, sample_key(), "").unwrap();
        let ident = generate_hash("10.0.0.1", 2000, &sample_key());

        assert!(space.remove(&ident));
        assert_eq!(space.len(), 0);
        assert_eq!(space.count_removed(), 1);
        assert!(!space.remove(&ident));
    }

    #[test]
    fn get_random_fingers_errors_on_empty_space() {
        let space = FingerSpace::new(local());
        let err = space.get_random_fingers(3).unwrap_err();
        assert!(matches!(err, FingerSpaceError::Empty));
    }

    #[test]
    fn get_random_fingers_caps_at_stored_count() {
        let space = FingerSpace::new(local());
        space.put("10.0.0.1", 2000, sample_key(), "").unwrap();
        space.put("10.0.0.2", 2000, sample_key(), "").unwrap();

        let fingers = space.get_random_fingers(10).unwrap();
        assert_eq!(fingers.len(), 2);
    }

    #[test]
    fn export_then_import_round_trips_into_a_fresh_space() {
        let source = FingerSpace::new(local());
        source.put("10.0.0.1", 2000, sample_key(), "").unwrap();
        source.put("10.0.0.2", 2001, sample_key(), "").unwrap();
        let exported = source.export_all();

        let other_local = Finger::new("127.0.0.1", 9999, sample_key(), "").unwrap();
        let dest = FingerSpace::new(other_local);
        dest.import_nodes(exported);
        assert_eq!(dest.len(), 2);
    }
}
