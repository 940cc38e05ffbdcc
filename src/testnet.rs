//! In-process population of peers, for tests and simulations.

use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use tracing::debug;

use crate::{Config, Peer};

/// Default number of random contacts every peer is seeded with.
pub const DEFAULT_CONTACTS_PER_PEER: usize = 100;

/// Create a testnet of in-process peers named `Peer1..PeerN`, each
/// seeded with random contacts from the same population.
#[derive(Debug)]
pub struct Testnet {
    pub peers: Vec<Peer>,
}

impl Testnet {
    /// Create a testnet of `size` peers with default settings.
    pub fn new(size: usize) -> Testnet {
        Testnet::builder().size(size).build()
    }

    pub fn builder() -> TestnetBuilder {
        TestnetBuilder::default()
    }

    // === Getters ===

    pub fn peers(&self) -> &[Peer] {
        &self.peers
    }

    pub fn peer(&self, index: usize) -> Option<&Peer> {
        self.peers.get(index)
    }

    pub fn random_peer<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&Peer> {
        self.peers.choose(rng)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct TestnetBuilder {
    size: usize,
    contacts_per_peer: usize,
    config: Config,
    seed: Option<u64>,
}

impl TestnetBuilder {
    // === Options ===

    pub fn size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    /// Number of random picks from the population inserted into every
    /// peer's routing table. Picks may repeat, and a peer never adds itself.
    pub fn contacts_per_peer(mut self, contacts_per_peer: usize) -> Self {
        self.contacts_per_peer = contacts_per_peer;
        self
    }

    /// Config shared by all peers. Its seed is ignored in favor of [Self::seed].
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Seed both the contact selection and every peer's random source.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn build(self) -> Testnet {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let peers: Vec<Peer> = (1..=self.size)
            .map(|i| {
                let mut config = self.config.clone();
                config.seed = Some(rng.gen());

                Peer::with_config(format!("Peer{i}"), config)
            })
            .collect();

        for peer in &peers {
            for _ in 0..self.contacts_per_peer {
                if let Some(contact) = peers.choose(&mut rng) {
                    peer.bootstrap(contact);
                }
            }
        }

        debug!(
            size = peers.len(),
            contacts_per_peer = self.contacts_per_peer,
            "Built testnet"
        );

        Testnet { peers }
    }
}

impl Default for TestnetBuilder {
    fn default() -> Self {
        Self {
            size: 0,
            contacts_per_peer: DEFAULT_CONTACTS_PER_PEER,
            config: Config::default(),
            seed: None,
        }
    }
}
