//! A peer of the key/value store: an identifier, a routing table and local values.

use std::{
    collections::{HashMap, HashSet},
    fmt::{self, Debug, Formatter},
    sync::Arc,
};

use bytes::Bytes;
use parking_lot::Mutex;
use rand::{rngs::StdRng, SeedableRng};
use tracing::{debug, trace};

use crate::{
    common::{check_immutable, probe_walk, Contact, Id, RoutingTable},
    query::Traversal,
    Config, Result,
};

/// Outcome of a successful [Peer::store].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    /// The value was stored locally and replicated to `replicas` other peers.
    Stored { replicas: usize },
    /// This peer already held the key, nothing was replicated.
    AlreadyPresent,
}

/// Handle to a peer.
///
/// Cloning is cheap and every clone refers to the same peer.
#[derive(Clone)]
pub struct Peer(pub(crate) Arc<PeerInner>);

pub(crate) struct PeerInner {
    id: Bytes,
    config: Config,
    /// Routing table, values and random source are mutated together.
    state: Mutex<PeerState>,
}

struct PeerState {
    routing_table: RoutingTable,
    values: HashMap<Id, Bytes>,
    rng: StdRng,
}

impl Peer {
    /// Create a new peer with the default [Config].
    pub fn new<T: Into<Bytes>>(id: T) -> Peer {
        Self::with_config(id, Config::default())
    }

    pub fn with_config<T: Into<Bytes>>(id: T, config: Config) -> Peer {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Peer(Arc::new(PeerInner {
            id: id.into(),
            config,
            state: Mutex::new(PeerState {
                routing_table: RoutingTable::new(),
                values: HashMap::new(),
                rng,
            }),
        }))
    }

    // === Getters ===

    pub fn id(&self) -> &Bytes {
        &self.0.id
    }

    pub fn config(&self) -> &Config {
        &self.0.config
    }

    /// Returns a snapshot of this peer's routing table.
    pub fn routing_table(&self) -> RoutingTable {
        self.0.state.lock().routing_table.clone()
    }

    /// Returns `true` if this peer holds a value for `key` locally.
    pub fn contains_key(&self, key: &Id) -> bool {
        self.0.state.lock().values.contains_key(key)
    }

    /// Returns the locally held value for `key`, without asking other peers.
    pub fn get_local(&self, key: &Id) -> Option<Bytes> {
        self.0.state.lock().values.get(key).cloned()
    }

    /// Number of values held locally.
    pub fn values_len(&self) -> usize {
        self.0.state.lock().values.len()
    }

    // === Public Methods ===

    /// Add `peer` to this peer's routing table, and return `true` if it was added.
    ///
    /// A peer never adds itself.
    pub fn bootstrap(&self, peer: &Peer) -> bool {
        self.bootstrap_contact(Contact::new(peer))
    }

    /// Add a contact to this peer's routing table, and return `true` if it was added.
    pub fn bootstrap_contact(&self, contact: Contact) -> bool {
        if contact.id() == self.id() {
            return false;
        }

        self.0.state.lock().routing_table.insert(contact)
    }

    /// Look up the contact with identifier `id`, starting from this peer's routing table.
    ///
    /// See [RoutingTable::find_node]. This peer is never probed again, and its
    /// lock is released before other peers are asked.
    pub fn find_node(&self, id: &[u8]) -> (Vec<Contact>, bool) {
        let max_depth = self.0.config.probe_depth;

        let probes = {
            let mut state = self.0.state.lock();

            if let Some(contact) = state.routing_table.get(id) {
                return (vec![contact.clone()], true);
            }

            if max_depth == 0 {
                return (Vec::new(), false);
            }

            let PeerState {
                routing_table, rng, ..
            } = &mut *state;

            routing_table.probe(rng)
        };

        let mut seen = HashSet::new();
        seen.insert(self.id().clone());

        probe_walk(id, probes, max_depth, seen)
    }

    /// Return up to `count` peers closest to `id` in this peer's routing table.
    ///
    /// See [RoutingTable::closest].
    pub fn find_closest_peers(&self, id: &[u8], count: usize) -> Vec<Contact> {
        self.0.state.lock().routing_table.closest(id, count)
    }

    /// Store `value` under `key` here, and replicate it to the closest known peers.
    ///
    /// Fails with [crate::Error::InvalidValue] if `key` is not the digest of `value`.
    /// Replication is best effort and never fails the store.
    pub fn store<T: Into<Bytes>>(&self, key: Id, value: T) -> Result<StoreOutcome> {
        let value = value.into();

        if let Err(error) = check_immutable(&value, &key) {
            debug!(peer = ?self, ?key, "Rejected store of mismatched value");
            return Err(error);
        }

        if !self.store_local(key, value.clone()) {
            trace!(peer = ?self, ?key, "Key already stored");
            return Ok(StoreOutcome::AlreadyPresent);
        }

        let mut traversal = Traversal::new(self);
        traversal.extend(self.replication_targets(&key), self.0.config.max_hops);

        let mut replicas = 0;

        while let Some((peer, hops)) = traversal.next() {
            if peer.store_local(key, value.clone()) {
                replicas += 1;
                traversal.extend(peer.replication_targets(&key), hops);
            }
        }

        debug!(
            peer = ?self,
            ?key,
            replicas,
            visited = traversal.visited(),
            "Stored value"
        );

        Ok(StoreOutcome::Stored { replicas })
    }

    /// Return the value stored under `key`, here or at any peer reachable
    /// within the hop budget.
    pub fn fetch(&self, key: &Id) -> Option<Bytes> {
        if let Some(value) = self.get_local(key) {
            return Some(value);
        }

        let mut traversal = Traversal::new(self);
        traversal.extend(self.lookup_candidates(key), self.0.config.max_hops);

        while let Some((peer, hops)) = traversal.next() {
            if let Some(value) = peer.get_local(key) {
                debug!(peer = ?self, ?key, from = ?peer, "Found value");
                return Some(value);
            }

            traversal.extend(peer.lookup_candidates(key), hops);
        }

        debug!(
            peer = ?self,
            ?key,
            visited = traversal.visited(),
            budget_exhausted = traversal.budget_exhausted(),
            "Lookup exhausted"
        );

        None
    }

    // === Private Methods ===

    /// Store the value and its pseudo-contact, returns `false` if the key was already here.
    fn store_local(&self, key: Id, value: Bytes) -> bool {
        let mut state = self.0.state.lock();

        if state.values.contains_key(&key) {
            return false;
        }

        state.values.insert(key, value);
        state.routing_table.insert(Contact::key(key.to_vec()));

        true
    }

    /// Answer one level of a probe: the contact for `id` if this peer knows it,
    /// or the random peers to ask next.
    pub(crate) fn probe_step(&self, id: &[u8]) -> std::result::Result<Contact, Vec<Contact>> {
        let mut state = self.0.state.lock();

        if let Some(contact) = state.routing_table.get(id) {
            return Ok(contact.clone());
        }

        let PeerState {
            routing_table, rng, ..
        } = &mut *state;

        Err(routing_table.probe(rng))
    }

    fn replication_targets(&self, key: &Id) -> Vec<Peer> {
        self.find_closest_peers(key.as_bytes(), self.0.config.replication_factor)
            .iter()
            .filter_map(Contact::peer)
            .collect()
    }

    fn lookup_candidates(&self, key: &Id) -> Vec<Peer> {
        let (contacts, _) = self.find_node(key.as_bytes());

        contacts.iter().filter_map(Contact::peer).collect()
    }
}

impl Debug for Peer {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Peer({})", String::from_utf8_lossy(&self.0.id))
    }
}
