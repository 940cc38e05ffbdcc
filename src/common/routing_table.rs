//! Simplified Kademlia routing table

use std::{collections::HashSet, slice::Iter};

use bytes::Bytes;
use rand::{
    seq::{IteratorRandom, SliceRandom},
    Rng,
};
use tracing::trace;

use crate::common::{bucket_index, Contact, NUM_BUCKETS};

/// K = the maximum size of a k-bucket.
pub const MAX_BUCKET_SIZE_K: usize = 100;
/// Number of random contacts probed at every level of [RoutingTable::find_node].
pub const PROBE_COUNT: usize = 2;

#[derive(Debug, Clone)]
/// Simplified Kademlia routing table.
///
/// Exactly [NUM_BUCKETS] buckets. The bucket a contact lands in is decided by
/// [bucket_index] of its identifier alone.
pub struct RoutingTable {
    buckets: Vec<KBucket>,
}

impl RoutingTable {
    /// Create a new empty [RoutingTable].
    pub fn new() -> Self {
        RoutingTable {
            buckets: vec![KBucket::new(); NUM_BUCKETS],
        }
    }

    // === Getters ===

    /// Returns the bucket at `index`, if `index` is in `[0, NUM_BUCKETS)`.
    pub fn bucket(&self, index: usize) -> Option<&KBucket> {
        self.buckets.get(index)
    }

    /// Returns the contact with exactly this identifier, if any.
    pub fn get(&self, id: &[u8]) -> Option<&Contact> {
        self.buckets[bucket_index(id)].get(id)
    }

    pub fn contains(&self, id: &[u8]) -> bool {
        self.get(id).is_some()
    }

    // === Public Methods ===

    /// Attempts to add a contact to this routing table, and return `true` if it did.
    ///
    /// Returns `false` if a contact with the same identifier is already in its bucket.
    pub fn insert(&mut self, contact: Contact) -> bool {
        let index = bucket_index(contact.id());

        self.buckets[index].add(contact)
    }

    /// Look up the contact with identifier `id`.
    ///
    /// On an exact match returns `([contact], true)`. Otherwise performs a
    /// randomized probe: [PROBE_COUNT] times pick a random bucket holding peers
    /// and a random peer in it, then ask that peer's own routing table for `id`,
    /// descending through the peers it probes in turn, at most `max_depth` levels.
    ///
    /// Returns every peer the probe reached, plus the matching contact if some
    /// probed peer knew it, and whether such a match was found.
    pub fn find_node<R: Rng + ?Sized>(
        &self,
        id: &[u8],
        rng: &mut R,
        max_depth: u8,
    ) -> (Vec<Contact>, bool) {
        if let Some(contact) = self.get(id) {
            return (vec![contact.clone()], true);
        }

        if max_depth == 0 {
            return (Vec::new(), false);
        }

        probe_walk(id, self.probe(rng), max_depth, HashSet::new())
    }

    /// Return up to `count` peers, starting from the bucket `id` belongs to and
    /// expanding outward to `index-1, index+1, index-2, index+2, ..` (modulo [NUM_BUCKETS]).
    ///
    /// Contacts are returned in collection order, bucket by bucket. Pseudo-contacts
    /// for stored keys are never selected. If the table holds fewer than `count`
    /// peers, all of them are returned.
    pub fn closest(&self, id: &[u8], count: usize) -> Vec<Contact> {
        let mut closest = Vec::with_capacity(count);

        if count == 0 {
            return closest;
        }

        let index = bucket_index(id);
        closest.extend(self.buckets[index].peers().cloned());

        let mut offset = 1;

        while closest.len() < count && offset <= NUM_BUCKETS / 2 {
            let prev = (index + NUM_BUCKETS - offset) % NUM_BUCKETS;
            let next = (index + offset) % NUM_BUCKETS;

            closest.extend(self.buckets[prev].peers().cloned());

            if next != prev {
                closest.extend(self.buckets[next].peers().cloned());
            }

            offset += 1;
        }

        closest.truncate(count);
        closest
    }

    /// Returns `true` if this routing table is empty.
    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(|bucket| bucket.is_empty())
    }

    /// Return the number of contacts in this routing table.
    pub fn size(&self) -> usize {
        self.buckets
            .iter()
            .fold(0, |acc, bucket| acc + bucket.contacts.len())
    }

    /// Returns an iterator over the contacts in this routing table, bucket by bucket.
    pub fn nodes(&self) -> impl Iterator<Item = &Contact> {
        self.buckets.iter().flat_map(|bucket| bucket.iter())
    }

    /// Pick [PROBE_COUNT] random peers, each from a random bucket holding peers.
    ///
    /// The same peer may be picked more than once.
    pub fn probe<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<Contact> {
        let candidates: Vec<&KBucket> = self
            .buckets
            .iter()
            .filter(|bucket| bucket.peers().next().is_some())
            .collect();

        (0..PROBE_COUNT)
            .filter_map(|_| {
                candidates
                    .choose(rng)
                    .and_then(|bucket| bucket.peers().choose(rng))
                    .cloned()
            })
            .collect()
    }
}

/// Depth first walk from `probes` (depth 1) through the routing tables of the
/// probed peers, looking for `id`.
///
/// Every peer is expanded at most once, identifiers in `seen` are never
/// expanded, and peers at `max_depth` are collected but not asked. Each probed
/// peer's state is locked only while it answers, so callers must not hold a
/// peer lock.
pub(crate) fn probe_walk(
    id: &[u8],
    probes: Vec<Contact>,
    max_depth: u8,
    mut seen: HashSet<Bytes>,
) -> (Vec<Contact>, bool) {
    let mut found: Vec<Contact> = Vec::new();
    let mut matched = false;
    let mut pending: Vec<(Contact, u8)> = probes.into_iter().rev().map(|c| (c, 1)).collect();

    while let Some((contact, depth)) = pending.pop() {
        if !seen.insert(contact.id().clone()) {
            continue;
        }

        let peer = contact.peer();
        found.push(contact);

        if depth >= max_depth {
            trace!(depth, "Probe depth exhausted");
            continue;
        }

        let Some(peer) = peer else {
            continue;
        };

        match peer.probe_step(id) {
            Ok(exact) => {
                if seen.insert(exact.id().clone()) {
                    found.push(exact);
                }
                matched = true;
            }
            Err(next) => {
                for contact in next.into_iter().rev() {
                    pending.push((contact, depth + 1));
                }
            }
        }
    }

    (found, matched)
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Capacity bounded, insertion ordered bucket of contacts.
///
/// When full, the oldest contact is dropped to make room for the new one.
#[derive(Debug, Clone)]
pub struct KBucket {
    /// Contacts in the k-bucket, oldest first.
    contacts: Vec<Contact>,
}

impl KBucket {
    pub fn new() -> Self {
        KBucket {
            contacts: Vec::new(),
        }
    }

    // === Public Methods ===

    pub fn add(&mut self, incoming: Contact) -> bool {
        if self.get(incoming.id()).is_some() {
            return false;
        }

        if self.contacts.len() >= MAX_BUCKET_SIZE_K {
            let evicted = self.contacts.remove(0);
            trace!(evicted = ?evicted.id(), "Bucket full, evicting oldest contact");
        }

        self.contacts.push(incoming);

        true
    }

    pub fn get(&self, id: &[u8]) -> Option<&Contact> {
        self.contacts.iter().find(|contact| contact.id() == id)
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    pub fn iter(&self) -> Iter<'_, Contact> {
        self.contacts.iter()
    }

    /// Iterate over the contacts naming live peers.
    pub fn peers(&self) -> impl Iterator<Item = &Contact> {
        self.contacts.iter().filter(|contact| contact.is_peer())
    }
}

impl Default for KBucket {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;
    use crate::Peer;

    /// Identifiers that all land in bucket `index`.
    fn ids_in_bucket(index: usize, count: usize) -> Vec<String> {
        (0..)
            .map(|i| format!("key-{i}"))
            .filter(|id| bucket_index(id) == index)
            .take(count)
            .collect()
    }

    #[test]
    fn table_is_empty() {
        let mut table = RoutingTable::new();
        assert!(table.is_empty());

        table.insert(Contact::key("foo"));
        assert!(!table.is_empty());
    }

    #[test]
    fn has_all_buckets() {
        let table = RoutingTable::new();

        assert!(table.bucket(NUM_BUCKETS - 1).is_some());
        assert!(table.bucket(NUM_BUCKETS).is_none());
    }

    #[test]
    fn insert_lands_in_bucket_index() {
        let mut table = RoutingTable::new();
        table.insert(Contact::key("Peer1"));

        let bucket = table.bucket(bucket_index("Peer1")).unwrap();

        assert_eq!(bucket.len(), 1);
        assert!(table.contains(b"Peer1"));
    }

    #[test]
    fn buckets_are_sets() {
        let mut table = RoutingTable::new();

        assert!(table.insert(Contact::key("Peer1")));
        assert!(!table.insert(Contact::key("Peer1")));

        assert_eq!(table.size(), 1);
    }

    #[test]
    fn full_bucket_evicts_oldest() {
        let index = 42;
        let ids = ids_in_bucket(index, MAX_BUCKET_SIZE_K + 1);
        let mut table = RoutingTable::new();

        for id in &ids[..MAX_BUCKET_SIZE_K] {
            assert!(table.insert(Contact::key(id.clone())));
        }
        assert_eq!(table.bucket(index).unwrap().len(), MAX_BUCKET_SIZE_K);

        table.insert(Contact::key(ids[MAX_BUCKET_SIZE_K].clone()));

        let bucket = table.bucket(index).unwrap();
        assert_eq!(bucket.len(), MAX_BUCKET_SIZE_K);
        assert!(!table.contains(ids[0].as_bytes()));
        assert!(table.contains(ids[1].as_bytes()));
        assert_eq!(
            bucket.iter().last().unwrap().id(),
            ids[MAX_BUCKET_SIZE_K].as_bytes()
        );
    }

    #[test]
    fn reinserting_into_full_bucket_does_not_evict() {
        let index = 7;
        let ids = ids_in_bucket(index, MAX_BUCKET_SIZE_K);
        let mut table = RoutingTable::new();

        for id in &ids {
            table.insert(Contact::key(id.clone()));
        }

        assert!(!table.insert(Contact::key(ids[0].clone())));
        assert!(table.contains(ids[0].as_bytes()));
        assert_eq!(table.size(), MAX_BUCKET_SIZE_K);
    }

    #[test]
    fn find_node_exact_match() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut table = RoutingTable::new();
        let peer = Peer::new("Peer2");
        table.insert(Contact::new(&peer));

        let (contacts, found) = table.find_node(b"Peer2", &mut rng, 3);

        assert!(found);
        assert_eq!(contacts, vec![Contact::new(&peer)]);
    }

    #[test]
    fn find_node_probes_known_peers() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut table = RoutingTable::new();
        let peers: Vec<Peer> = (0..5).map(|i| Peer::new(format!("Peer{i}"))).collect();

        for peer in &peers {
            table.insert(Contact::new(peer));
        }

        let (contacts, found) = table.find_node(b"missing", &mut rng, 3);

        assert!(!found);
        assert!(!contacts.is_empty());
        assert!(contacts.len() <= PROBE_COUNT);
        assert!(contacts.iter().all(|c| table.contains(c.id())));
    }

    #[test]
    fn find_node_without_depth_does_not_probe() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut table = RoutingTable::new();
        let peer = Peer::new("Peer1");
        table.insert(Contact::new(&peer));

        let (contacts, found) = table.find_node(b"missing", &mut rng, 0);

        assert!(!found);
        assert!(contacts.is_empty());
    }

    #[test]
    fn find_node_on_empty_table_terminates() {
        let mut rng = StdRng::seed_from_u64(4);
        let table = RoutingTable::new();

        let (contacts, found) = table.find_node(b"missing", &mut rng, u8::MAX);

        assert!(!found);
        assert!(contacts.is_empty());
    }

    #[test]
    fn find_node_ignores_stored_keys_when_probing() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut table = RoutingTable::new();

        for i in 0..10 {
            table.insert(Contact::key(format!("key-{i}")));
        }

        let (contacts, found) = table.find_node(b"missing", &mut rng, 3);

        assert!(!found);
        assert!(contacts.is_empty());
    }

    #[test]
    fn find_node_descends_into_probed_peers() {
        // table -> B -> C -> D, each peer knowing only the next one.
        let b = Peer::new("B");
        let c = Peer::new("C");
        let d = Peer::new("D");
        b.bootstrap(&c);
        c.bootstrap(&d);

        let mut table = RoutingTable::new();
        table.insert(Contact::new(&b));

        let ids = |depth: u8| -> Vec<Bytes> {
            let mut rng = StdRng::seed_from_u64(6);
            let (contacts, found) = table.find_node(b"missing", &mut rng, depth);
            assert!(!found);
            contacts.iter().map(|c| c.id().clone()).collect()
        };

        assert_eq!(ids(1), vec!["B"]);
        assert_eq!(ids(2), vec!["B", "C"]);
        assert_eq!(ids(3), vec!["B", "C", "D"]);
        assert_eq!(ids(u8::MAX), vec!["B", "C", "D"]);
    }

    #[test]
    fn find_node_matches_in_probed_peer() {
        let b = Peer::new("B");
        let c = Peer::new("C");
        b.bootstrap(&c);

        let mut table = RoutingTable::new();
        table.insert(Contact::new(&b));

        let mut rng = StdRng::seed_from_u64(7);

        let (contacts, found) = table.find_node(b"C", &mut rng, 1);
        assert!(!found);
        assert_eq!(contacts, vec![Contact::new(&b)]);

        let (contacts, found) = table.find_node(b"C", &mut rng, 2);
        assert!(found);
        assert_eq!(contacts, vec![Contact::new(&b), Contact::new(&c)]);
    }

    #[test]
    fn find_node_terminates_on_cycles() {
        let b = Peer::new("B");
        let c = Peer::new("C");
        b.bootstrap(&c);
        c.bootstrap(&b);

        let mut table = RoutingTable::new();
        table.insert(Contact::new(&b));

        let mut rng = StdRng::seed_from_u64(8);
        let (contacts, found) = table.find_node(b"missing", &mut rng, u8::MAX);

        assert!(!found);
        assert_eq!(contacts.len(), 2);
    }

    #[test]
    fn closest_returns_all_when_short() {
        let mut table = RoutingTable::new();
        let peers: Vec<Peer> = (0..3).map(|i| Peer::new(format!("Peer{i}"))).collect();

        for peer in &peers {
            table.insert(Contact::new(peer));
        }

        assert_eq!(table.closest(b"anything", 10).len(), 3);
        assert_eq!(table.closest(b"anything", 2).len(), 2);
        assert!(table.closest(b"anything", 0).is_empty());
        assert!(RoutingTable::new().closest(b"anything", 2).is_empty());
    }

    #[test]
    fn closest_starts_at_target_bucket() {
        let target = "target";
        let index = bucket_index(target);

        let near = ids_in_bucket(index, 1).remove(0);
        let next = ids_in_bucket((index + 1) % NUM_BUCKETS, 1).remove(0);
        let prev = ids_in_bucket((index + NUM_BUCKETS - 1) % NUM_BUCKETS, 1).remove(0);
        let far = ids_in_bucket((index + 50) % NUM_BUCKETS, 1).remove(0);

        let peers: Vec<Peer> = [&far, &next, &prev, &near]
            .iter()
            .map(|id| Peer::new(id.to_string()))
            .collect();

        let mut table = RoutingTable::new();
        for peer in &peers {
            table.insert(Contact::new(peer));
        }

        let ids = |contacts: Vec<Contact>| -> Vec<String> {
            contacts
                .iter()
                .map(|c| String::from_utf8_lossy(c.id()).to_string())
                .collect()
        };

        assert_eq!(ids(table.closest(target.as_bytes(), 1)), vec![near.clone()]);
        assert_eq!(
            ids(table.closest(target.as_bytes(), 3)),
            vec![near.clone(), prev.clone(), next.clone()]
        );
        assert_eq!(
            ids(table.closest(target.as_bytes(), 4)),
            vec![near, prev, next, far]
        );
    }

    #[test]
    fn closest_skips_stored_keys() {
        let mut table = RoutingTable::new();
        let peer = Peer::new("Peer1");

        table.insert(Contact::key("key"));
        table.insert(Contact::new(&peer));

        let closest = table.closest(b"key", 2);

        assert_eq!(closest, vec![Contact::new(&peer)]);
    }

    #[test]
    fn dropped_peers_are_not_selected() {
        let mut table = RoutingTable::new();

        {
            let peer = Peer::new("Peer1");
            table.insert(Contact::new(&peer));
        }

        assert_eq!(table.size(), 1);
        assert!(table.closest(b"Peer1", 1).is_empty());
    }
}
