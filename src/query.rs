//! Hop bounded traversal of peers, shared by store replication and fetch.

use std::collections::HashSet;

use bytes::Bytes;
use tracing::trace;

use crate::Peer;

/// Pending `(peer, remaining hops)` tasks of a single request.
///
/// Every peer is visited at most once, and peers are only enqueued while the
/// delegating peer has hops left, so a traversal always terminates.
#[derive(Debug)]
pub(crate) struct Traversal {
    pending: Vec<(Peer, u8)>,
    visited: HashSet<Bytes>,
    budget_exhausted: bool,
}

impl Traversal {
    /// Start a traversal from `origin`, which counts as visited.
    pub fn new(origin: &Peer) -> Self {
        let mut visited = HashSet::new();
        visited.insert(origin.id().clone());

        Self {
            pending: Vec::new(),
            visited,
            budget_exhausted: false,
        }
    }

    // === Getters ===

    /// Number of peers visited so far, including the origin.
    pub fn visited(&self) -> usize {
        self.visited.len()
    }

    /// Returns `true` if some candidates were dropped for lack of hops.
    pub fn budget_exhausted(&self) -> bool {
        self.budget_exhausted
    }

    // === Public Methods ===

    /// Enqueue `peers` found by a peer with `hops` remaining.
    ///
    /// The first peer of `peers` is the next one returned by [Self::next].
    pub fn extend(&mut self, peers: Vec<Peer>, hops: u8) {
        if peers.is_empty() {
            return;
        }

        if hops == 0 {
            trace!(dropped = peers.len(), "Hop budget exhausted");
            self.budget_exhausted = true;
            return;
        }

        for peer in peers.into_iter().rev() {
            if !self.visited.contains(peer.id()) {
                self.pending.push((peer, hops - 1));
            }
        }
    }

    /// Pop the next unvisited peer and its remaining hops.
    pub fn next(&mut self) -> Option<(Peer, u8)> {
        while let Some((peer, hops)) = self.pending.pop() {
            if self.visited.insert(peer.id().clone()) {
                return Some((peer, hops));
            }
        }

        None
    }
}
