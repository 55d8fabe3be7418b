//! Snowglobe Simulator CLI
//!
//! Run deterministic gossip-consensus simulations with configurable
//! parameters.
//!
//! # Example
//!
//! ```bash
//! # Run a deterministic simulation with a fixed seed
//! snowglobe-sim --seed 42 -n 10 -s 2 -d 30
//!
//! # Run with a random seed and a lossier network
//! snowglobe-sim -n 20 -s 2 -d 60 --loss 0.05 --invalid-fraction 0.1
//! ```

use clap::Parser;
use snowglobe_consensus::ConsensusConfig;
use snowglobe_simulation::{NetworkConfig, NetworkSimulation, WorkloadConfig};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Snowglobe Simulator
///
/// Runs deterministic gossip-consensus simulations. Single-threaded,
/// reproducible when the same seed is used.
#[derive(Parser, Debug)]
#[command(name = "snowglobe-sim")]
#[command(version, about, long_about = None)]
struct Args {
    /// Number of engines
    #[arg(short = 'n', long, default_value = "10")]
    engines: usize,

    /// Number of shards
    #[arg(short = 's', long, default_value = "2")]
    shards: u32,

    /// Simulation duration in virtual seconds
    #[arg(short = 'd', long, default_value = "30")]
    duration: u64,

    /// Base one-way delivery latency in milliseconds
    #[arg(short = 'l', long, default_value = "150")]
    latency_ms: u64,

    /// Latency jitter as a fraction of the base latency (0.0-1.0)
    #[arg(long, default_value = "0.1")]
    jitter: f64,

    /// Packet loss rate (0.0-1.0)
    #[arg(long, default_value = "0.0")]
    loss: f64,

    /// Random seed for reproducible results. When omitted, a random seed is used.
    #[arg(long)]
    seed: Option<u64>,

    /// Milliseconds between transaction submissions
    #[arg(long, default_value = "50")]
    tx_interval_ms: u64,

    /// Number of transactions to submit
    #[arg(short = 'c', long, default_value = "100")]
    count: usize,

    /// Fraction of transactions with broken signatures (0.0-1.0)
    #[arg(long, default_value = "0.0")]
    invalid_fraction: f64,
}

fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,snowglobe_simulation=info")),
        )
        .init();

    let args = Args::parse();
    let seed = args.seed.unwrap_or_else(rand::random);

    info!(
        engines = args.engines,
        shards = args.shards,
        duration_secs = args.duration,
        latency_ms = args.latency_ms,
        seed,
        count = args.count,
        invalid_fraction = args.invalid_fraction,
        "Starting simulation"
    );

    let network = NetworkConfig {
        num_engines: args.engines,
        num_shards: args.shards,
        latency: Duration::from_millis(args.latency_ms),
        jitter_fraction: args.jitter,
        packet_loss_rate: args.loss,
        seed,
    };

    let workload = WorkloadConfig::default()
        .with_interval(Duration::from_millis(args.tx_interval_ms))
        .with_count(args.count)
        .with_invalid_fraction(args.invalid_fraction);

    let mut sim = NetworkSimulation::new(network, ConsensusConfig::default())
        .expect("Failed to create simulation");

    sim.schedule_workload(&workload);
    sim.run_until(Duration::from_secs(args.duration))
        .expect("Simulation failed");

    let stats = sim.stats();
    println!("\n=== Simulation Summary ===");
    println!("Virtual time:     {:.1}s", sim.now().as_secs_f64());
    println!("Events processed: {}", stats.events_processed);
    println!("Messages sent:    {}", stats.messages_sent);
    println!("  queries:        {}", stats.queries_routed);
    println!("  responses:      {}", stats.responses_routed);
    println!("  relays:         {}", stats.relays_routed);
    println!("Dropped (loss):   {}", stats.messages_dropped_loss);
    println!("Deduplicated:     {}", stats.messages_deduplicated);
    println!("Delivery rate:    {:.3}", stats.delivery_rate());
    println!("Confirmations:    {}", stats.confirmations);
}
