//! Simulate a population of peers storing and fetching random values.
//!
//! Run: `cargo run --example simulate -- --peers 100 --values 200 --lookups 100`

use clap::Parser;
use kadstore::{Config, Id, Testnet};
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Number of peers in the testnet.
    #[arg(long, default_value_t = 100)]
    peers: usize,
    /// Random contacts inserted into every peer's routing table.
    #[arg(long, default_value_t = 100)]
    contacts: usize,
    /// Number of values stored at random peers.
    #[arg(long, default_value_t = 200)]
    values: usize,
    /// Number of stored values looked up from random peers.
    #[arg(long, default_value_t = 100)]
    lookups: usize,
    /// Hop budget of every store and fetch.
    #[arg(long, default_value_t = kadstore::DEFAULT_MAX_HOPS)]
    max_hops: u8,
    /// Seed for a reproducible run.
    #[arg(long)]
    seed: Option<u64>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let mut rng = match cli.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let testnet = Testnet::builder()
        .size(cli.peers)
        .contacts_per_peer(cli.contacts)
        .config(Config::default().with_max_hops(cli.max_hops))
        .seed(rng.gen())
        .build();

    if testnet.is_empty() {
        println!("No peers to simulate.");
        return;
    }

    let mut keys = Vec::with_capacity(cli.values);

    for i in 0..cli.values {
        let value = format!("Value {i}");
        let key = Id::hash(&value);

        if let Some(peer) = testnet.random_peer(&mut rng) {
            match peer.store(key, value) {
                Ok(outcome) => info!(?peer, ?key, ?outcome, "Stored"),
                Err(error) => println!("Failed to store {key} at {peer:?}: {error}"),
            }
        }

        keys.push(key);
    }

    keys.shuffle(&mut rng);

    let mut found = 0;

    for key in keys.iter().take(cli.lookups) {
        let Some(peer) = testnet.random_peer(&mut rng) else {
            continue;
        };

        match peer.fetch(key) {
            Some(value) => {
                found += 1;
                println!(
                    "Value for Key {key} found in {peer:?}: {}",
                    String::from_utf8_lossy(&value)
                );
            }
            None => println!("Value for Key {key} not found in {peer:?}"),
        }
    }

    println!(
        "\nFound {found} of {} lookups",
        cli.lookups.min(keys.len())
    );
}
