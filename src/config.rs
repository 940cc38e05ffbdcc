//! Peer configurations

/// Number of closest peers a stored value is forwarded to.
pub const DEFAULT_REPLICATION_FACTOR: usize = 2;
/// Maximum number of peer-to-peer delegations in a single store or fetch.
pub const DEFAULT_MAX_HOPS: u8 = 20;
/// Maximum recursion of the randomized probe in [crate::RoutingTable::find_node].
pub const DEFAULT_PROBE_DEPTH: u8 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Peer Configurations
pub struct Config {
    /// Number of closest known peers every storing peer forwards a value to.
    ///
    /// Defaults to [DEFAULT_REPLICATION_FACTOR]
    pub replication_factor: usize,
    /// Hop budget of every store and fetch.
    ///
    /// Each delegation to another peer consumes one hop, once the budget is
    /// spent the request stops spreading and a fetch reports not found.
    ///
    /// Defaults to [DEFAULT_MAX_HOPS]
    pub max_hops: u8,
    /// Depth bound of the randomized probe used to find lookup candidates.
    ///
    /// Defaults to [DEFAULT_PROBE_DEPTH]
    pub probe_depth: u8,
    /// Seed for the peer's random source.
    ///
    /// Defaults to None, where the random source is seeded from entropy.
    pub seed: Option<u64>,
}

impl Config {
    // === Options ===

    pub fn with_replication_factor(mut self, replication_factor: usize) -> Self {
        self.replication_factor = replication_factor;
        self
    }

    pub fn with_max_hops(mut self, max_hops: u8) -> Self {
        self.max_hops = max_hops;
        self
    }

    pub fn with_probe_depth(mut self, probe_depth: u8) -> Self {
        self.probe_depth = probe_depth;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            replication_factor: DEFAULT_REPLICATION_FACTOR,
            max_hops: DEFAULT_MAX_HOPS,
            probe_depth: DEFAULT_PROBE_DEPTH,
            seed: None,
        }
    }
}
