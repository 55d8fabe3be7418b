//! End-to-end simulation tests.
//!
//! The driver is deterministic, so these tests assert exact outcomes for
//! fixed seeds. Convergence assertions use a population equal to the
//! sample size: every query then necessarily reaches an engine that
//! already knows the transaction (either the sender itself is drawn, or
//! some engine is drawn twice), so the originator keeps receiving
//! responses until it finalizes.

use snowglobe_consensus::ConsensusConfig;
use snowglobe_simulation::{NetworkConfig, NetworkSimulation, SimulationError, WorkloadConfig};
use snowglobe_types::{EngineId, Keypair, ShardId, Transaction, TxStatus};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::time::Duration;

fn signed_tx(seed: u64, shard: u32) -> Transaction {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    Keypair::generate(&mut rng).sign_transaction(seed, seed.wrapping_mul(97), ShardId(shard))
}

fn small_network(num_engines: usize, num_shards: u32, seed: u64) -> NetworkConfig {
    NetworkConfig {
        num_engines,
        num_shards,
        latency: Duration::from_millis(10),
        jitter_fraction: 0.0,
        packet_loss_rate: 0.0,
        seed,
    }
}

#[test]
fn test_sample_size_exceeding_population_is_rejected() {
    let result = NetworkSimulation::new(small_network(2, 1, 0), ConsensusConfig::default());
    assert!(matches!(
        result,
        Err(SimulationError::SampleExceedsPopulation {
            sample_size: 4,
            num_engines: 2,
        })
    ));
}

#[test]
fn test_shardless_network_is_rejected() {
    let result = NetworkSimulation::new(small_network(4, 0, 0), ConsensusConfig::default());
    assert!(matches!(result, Err(SimulationError::NoShards)));
}

#[test]
fn test_malformed_tuning_is_rejected() {
    let consensus = ConsensusConfig {
        quorum_threshold: 2.0,
        ..Default::default()
    };
    let result = NetworkSimulation::new(small_network(4, 1, 0), consensus);
    assert!(matches!(result, Err(SimulationError::Config(_))));
}

#[test]
fn test_valid_transaction_confirms_at_origin() {
    let mut sim =
        NetworkSimulation::new(small_network(4, 1, 42), ConsensusConfig::default()).unwrap();

    let tx = signed_tx(1, 0);
    let hash = tx.hash();
    sim.submit_transaction(EngineId(0), tx).unwrap();
    sim.run_until(Duration::from_secs(60)).unwrap();

    // Every preference in an all-honest run is Valid, so the origin must
    // classify the transaction Valid.
    assert_eq!(sim.status_of(EngineId(0), &hash), Some(TxStatus::Valid));
    assert!(sim.stats().confirmations >= 1);
    assert!(!sim.confirmations().is_empty());
    for ((_, finalized_hash), status) in sim.finalizations() {
        assert_eq!(*finalized_hash, hash);
        assert_eq!(*status, TxStatus::Valid);
    }
}

#[test]
fn test_invalid_transaction_never_confirms() {
    let mut sim =
        NetworkSimulation::new(small_network(4, 1, 42), ConsensusConfig::default()).unwrap();

    let mut tx = signed_tx(2, 0);
    tx.data ^= 1;
    let hash = tx.hash();
    sim.submit_transaction(EngineId(0), tx).unwrap();
    sim.run_until(Duration::from_secs(60)).unwrap();

    assert_eq!(sim.status_of(EngineId(0), &hash), Some(TxStatus::Invalid));
    assert!(sim.confirmations().is_empty());
    assert_eq!(sim.stats().confirmations, 0);

    // Invalid outcomes stay in the origin's mempool, frozen.
    assert!(sim.engine(EngineId(0)).unwrap().contains(&hash));
}

#[test]
fn test_cross_shard_submission_relays() {
    let mut sim =
        NetworkSimulation::new(small_network(8, 2, 9), ConsensusConfig::default()).unwrap();

    // Engine 0 serves shard 0; hand it a shard-1 transaction.
    let tx = signed_tx(3, 1);
    sim.submit_transaction(EngineId(0), tx).unwrap();
    sim.run_until(Duration::from_secs(5)).unwrap();

    let stats = sim.stats();
    assert!(stats.relays_routed >= 1);
    assert!(stats.events_processed >= 1);

    // Whatever classifications were reached, an honest network only ever
    // finalizes this transaction Valid.
    for (_, status) in sim.finalizations() {
        assert_eq!(*status, TxStatus::Valid);
    }
}

#[test]
fn test_identical_seeds_reproduce_runs() {
    let run = || {
        let network = NetworkConfig {
            num_engines: 10,
            num_shards: 2,
            latency: Duration::from_millis(50),
            jitter_fraction: 0.1,
            packet_loss_rate: 0.05,
            seed: 1234,
        };
        let mut sim = NetworkSimulation::new(network, ConsensusConfig::default()).unwrap();
        let workload = WorkloadConfig::default()
            .with_count(20)
            .with_interval(Duration::from_millis(50))
            .with_invalid_fraction(0.25);
        sim.schedule_workload(&workload);
        sim.run_until(Duration::from_secs(10)).unwrap();
        (sim.finalizations().clone(), sim.stats().clone(), sim.now())
    };

    let (finalized_a, stats_a, now_a) = run();
    let (finalized_b, stats_b, now_b) = run();

    assert_eq!(finalized_a, finalized_b);
    assert_eq!(stats_a, stats_b);
    assert_eq!(now_a, now_b);
}

#[test]
fn test_submission_to_unknown_engine_is_rejected() {
    let mut sim =
        NetworkSimulation::new(small_network(4, 1, 0), ConsensusConfig::default()).unwrap();
    let result = sim.submit_transaction(EngineId(99), signed_tx(4, 0));
    assert!(matches!(
        result,
        Err(SimulationError::UnknownRecipient(EngineId(99)))
    ));
}
