//! Workload generation: a stream of signed random transactions.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use snowglobe_types::{Keypair, ShardId, Transaction};
use std::time::Duration;

/// Configuration for a generated transaction stream.
#[derive(Debug, Clone)]
pub struct WorkloadConfig {
    /// Interval between consecutive submissions.
    pub tx_interval: Duration,
    /// Total number of transactions to submit.
    pub count: usize,
    /// Fraction of transactions whose payload is corrupted after signing,
    /// so verification fails (0.0 - 1.0).
    pub invalid_fraction: f64,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            tx_interval: Duration::from_millis(50),
            count: 100,
            invalid_fraction: 0.0,
        }
    }
}

impl WorkloadConfig {
    /// Set the interval between submissions.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.tx_interval = interval;
        self
    }

    /// Set the total submission count.
    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    /// Set the fraction of transactions that fail verification.
    pub fn with_invalid_fraction(mut self, fraction: f64) -> Self {
        self.invalid_fraction = fraction.clamp(0.0, 1.0);
        self
    }
}

/// Seeded generator of signed random transactions.
///
/// Each transaction gets a fresh P-256 keypair, a random (nonce, data)
/// payload, and a uniformly drawn shard. A configurable fraction has its
/// payload corrupted after signing so the signature no longer verifies.
pub struct TransactionGenerator {
    rng: ChaCha8Rng,
    num_shards: u32,
    invalid_fraction: f64,
}

impl TransactionGenerator {
    /// Create a generator for a network with `num_shards` shards.
    pub fn new(seed: u64, num_shards: u32, invalid_fraction: f64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            num_shards: num_shards.max(1),
            invalid_fraction: invalid_fraction.clamp(0.0, 1.0),
        }
    }

    /// Produce the next transaction in the stream.
    pub fn next_transaction(&mut self) -> Transaction {
        let keypair = Keypair::generate(&mut self.rng);
        let nonce = self.rng.gen();
        let data = self.rng.gen();
        let shard = ShardId(self.rng.gen_range(0..self.num_shards));

        let mut tx = keypair.sign_transaction(nonce, data, shard);
        if self.invalid_fraction > 0.0 && self.rng.gen::<f64>() < self.invalid_fraction {
            // Breaks the signature without touching the key material.
            tx.data = tx.data.wrapping_add(1);
        }
        tx
    }
}
