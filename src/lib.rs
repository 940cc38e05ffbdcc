//! Kademlia-style content-addressed key/value store.
//!
//! A population of [Peer]s, each holding a partial [RoutingTable] of other
//! peers, used to locate peers responsible for a key and to store and
//! retrieve values by replicating them to the peers closest to the key.
//!
//! Values are content addressed: the key of a value is its SHA-1 [Id].
//!
//! ```
//! use kadstore::{Id, Peer};
//!
//! let a = Peer::new("A");
//! let b = Peer::new("B");
//! a.bootstrap(&b);
//!
//! let key = Id::hash(b"hello");
//! a.store(key, &b"hello"[..]).unwrap();
//!
//! assert_eq!(b.fetch(&key).unwrap(), &b"hello"[..]);
//! ```
//!
//! ## Differences with Kademlia
//!
//! 1. The bucket of an identifier is a hash fold of the identifier alone
//!    (see [bucket_index]), not the shared prefix length with the owner's id.
//! 2. Lookups probe random known peers instead of iterating over XOR-closer ones.
//! 3. Peers talk through direct in-process calls, every store and fetch
//!    carries a hop budget and a visited set so it always terminates.

mod common;
mod config;
mod error;
mod peer;
mod query;
mod testnet;

pub use crate::common::{
    bucket_index, validate_immutable, Contact, Id, KBucket, RoutingTable, ID_SIZE,
    MAX_BUCKET_SIZE_K, NUM_BUCKETS, PROBE_COUNT,
};
pub use bytes::Bytes;
pub use config::{Config, DEFAULT_MAX_HOPS, DEFAULT_PROBE_DEPTH, DEFAULT_REPLICATION_FACTOR};
pub use error::{Error, Result};
pub use peer::{Peer, StoreOutcome};
pub use testnet::{Testnet, TestnetBuilder, DEFAULT_CONTACTS_PER_PEER};
