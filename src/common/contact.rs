//! Struct and implementation of the Contact entry in the routing table
use std::{
    fmt::{self, Debug, Formatter},
    sync::{Arc, Weak},
};

use bytes::Bytes;

use crate::peer::{Peer, PeerInner};

#[derive(Clone)]
/// Contact entry in a routing table.
///
/// Either names a live peer, or is a pseudo-contact standing for a key the
/// owning peer stores.
pub struct Contact {
    id: Bytes,
    peer: Option<Weak<PeerInner>>,
}

impl Contact {
    /// Creates a contact naming `peer`.
    pub fn new(peer: &Peer) -> Contact {
        Contact {
            id: peer.id().clone(),
            peer: Some(Arc::downgrade(&peer.0)),
        }
    }

    /// Creates a pseudo-contact with no peer behind it.
    pub fn key<T: Into<Bytes>>(id: T) -> Contact {
        Contact {
            id: id.into(),
            peer: None,
        }
    }

    // === Getters ===

    /// Returns the opaque identifier of this contact.
    pub fn id(&self) -> &Bytes {
        &self.id
    }

    /// Returns the peer this contact names, if it is still alive.
    pub fn peer(&self) -> Option<Peer> {
        self.peer.as_ref().and_then(Weak::upgrade).map(Peer)
    }

    /// Returns `true` if this contact may name a peer.
    pub fn is_peer(&self) -> bool {
        self.peer
            .as_ref()
            .map(|weak| weak.strong_count() > 0)
            .unwrap_or(false)
    }
}

impl PartialEq for Contact {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Contact {}

impl Debug for Contact {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Contact")
            .field("id", &String::from_utf8_lossy(&self.id))
            .field("peer", &self.is_peer())
            .finish()
    }
}
