//! Deterministic simulation driver.
//!
//! Hosts the engine population, routes their outbound messages, and
//! controls virtual time. Given the same seed and configuration, a run
//! produces identical results every time.

use crate::event_queue::{EventKey, SimEvent};
use crate::workload::{TransactionGenerator, WorkloadConfig};
use crossbeam::channel::{unbounded, Receiver};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use snowglobe_consensus::{
    ConfigError, ConsensusConfig, Engine, EngineError, Finalization, Message, Payload,
};
use snowglobe_types::{EngineId, Hash, ShardId, Transaction, TxStatus};
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;
use tracing::{debug, info, trace};

/// Engine that prints confirmations in the reference harness.
const CONFIRMATION_LOGGER: EngineId = EngineId(0);

/// Configuration for the simulated network.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Number of hosted engines.
    pub num_engines: usize,
    /// Number of shards; engines are assigned round-robin.
    pub num_shards: u32,
    /// Base one-way delivery latency.
    pub latency: Duration,
    /// Jitter as a fraction of base latency (0.0 - 1.0).
    pub jitter_fraction: f64,
    /// Packet loss rate (0.0 - 1.0). Deliveries are dropped with this
    /// probability.
    pub packet_loss_rate: f64,
    /// Seed for the driver RNG (sampling, latency, loss, workload).
    pub seed: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            num_engines: 10,
            num_shards: 2,
            latency: Duration::from_millis(150),
            jitter_fraction: 0.1,
            packet_loss_rate: 0.0,
            seed: 0,
        }
    }
}

/// Errors from driver construction and message routing.
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    /// The consensus tuning constants are malformed.
    #[error("invalid consensus tuning: {0}")]
    Config(#[from] ConfigError),

    /// Cannot sample more engines than the network hosts.
    #[error("cannot sample {sample_size} engines from a population of {num_engines}")]
    SampleExceedsPopulation {
        /// Configured sample size.
        sample_size: usize,
        /// Configured engine population.
        num_engines: usize,
    },

    /// The network must host at least one shard.
    #[error("network must host at least one shard")]
    NoShards,

    /// A directed message named an engine outside the population.
    #[error("message addressed to unknown {0}")]
    UnknownRecipient(EngineId),

    /// A response carried no recipient.
    #[error("response with no recipient")]
    UnroutableResponse,

    /// An engine failed while handling a delivery.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Statistics collected during simulation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SimulationStats {
    /// Total events processed.
    pub events_processed: u64,
    /// Deliveries scheduled (after loss and dedup).
    pub messages_sent: u64,
    /// Deliveries dropped by packet loss.
    pub messages_dropped_loss: u64,
    /// Relay deliveries suppressed because the engine already received
    /// the transaction.
    pub messages_deduplicated: u64,
    /// Queries routed through the bus.
    pub queries_routed: u64,
    /// Responses routed through the bus.
    pub responses_routed: u64,
    /// Relays routed through the bus.
    pub relays_routed: u64,
    /// Valid finalizations observed across all engines.
    pub confirmations: u64,
}

impl SimulationStats {
    /// Delivery rate: scheduled / (scheduled + dropped).
    pub fn delivery_rate(&self) -> f64 {
        let total = self.messages_sent + self.messages_dropped_loss;
        if total == 0 {
            1.0
        } else {
            self.messages_sent as f64 / total as f64
        }
    }
}

/// Deterministic network simulation.
///
/// Hosts N engines on a single shared outbound bus and plays the network
/// between them: broadcasts fan out to a uniform random sample (with
/// replacement, origin included), responses go to their named recipient,
/// and every delivery lands one sampled latency later on the virtual
/// clock. Engines run inline; the driver drains the bus after each
/// dispatch so outbound traffic becomes scheduled deliveries immediately.
pub struct NetworkSimulation {
    config: NetworkConfig,
    consensus: ConsensusConfig,

    /// Hosted engines, indexed by engine id.
    engines: Vec<Engine>,

    /// Shared outbound bus; every engine holds a sender handle.
    bus: Receiver<Message>,

    /// Global event queue, ordered deterministically.
    event_queue: BTreeMap<EventKey, SimEvent>,

    /// Admission ticket counter; breaks ties among simultaneous events.
    next_ticket: u64,

    /// Current virtual time.
    now: Duration,

    /// RNG for sampling, latency, loss, and workload (seeded).
    rng: ChaCha8Rng,

    /// Relay deliveries already made, per (engine, tx hash). Gossip-style
    /// dedup: without it, wrong-shard recipients re-relay and the fan-out
    /// amplifies without bound.
    relays_seen: HashSet<(EngineId, Hash)>,

    /// Terminal classifications observed, per (engine, tx hash).
    finalized: BTreeMap<(EngineId, Hash), TxStatus>,

    /// Statistics.
    stats: SimulationStats,
}

impl NetworkSimulation {
    /// Create a simulation hosting `config.num_engines` engines.
    ///
    /// Fails fast on malformed tuning constants, an empty shard set, or a
    /// sample size exceeding the population.
    pub fn new(
        config: NetworkConfig,
        consensus: ConsensusConfig,
    ) -> Result<Self, SimulationError> {
        consensus.validate()?;
        if consensus.sample_size > config.num_engines {
            return Err(SimulationError::SampleExceedsPopulation {
                sample_size: consensus.sample_size,
                num_engines: config.num_engines,
            });
        }
        if config.num_shards == 0 {
            return Err(SimulationError::NoShards);
        }

        let (bus_tx, bus_rx) = unbounded();
        let engines = (0..config.num_engines)
            .map(|i| {
                let shard = ShardId(i as u32 % config.num_shards);
                Engine::new(EngineId(i as u64), shard, consensus, bus_tx.clone())
            })
            .collect();

        info!(
            num_engines = config.num_engines,
            num_shards = config.num_shards,
            latency_ms = config.latency.as_millis() as u64,
            seed = config.seed,
            "Created network simulation"
        );

        Ok(Self {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            config,
            consensus,
            engines,
            bus: bus_rx,
            event_queue: BTreeMap::new(),
            next_ticket: 0,
            now: Duration::ZERO,
            relays_seen: HashSet::new(),
            finalized: BTreeMap::new(),
            stats: SimulationStats::default(),
        })
    }

    // ─── Accessors ───

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Simulation statistics.
    pub fn stats(&self) -> &SimulationStats {
        &self.stats
    }

    /// Network configuration.
    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// A hosted engine, by id.
    pub fn engine(&self, id: EngineId) -> Option<&Engine> {
        self.engines.get(id.0 as usize)
    }

    /// The terminal classification an engine reached for a hash, if any.
    pub fn status_of(&self, engine: EngineId, hash: &Hash) -> Option<TxStatus> {
        self.finalized.get(&(engine, *hash)).copied()
    }

    /// All terminal classifications observed so far.
    pub fn finalizations(&self) -> &BTreeMap<(EngineId, Hash), TxStatus> {
        &self.finalized
    }

    /// Hashes confirmed Valid, with the engine that finalized them.
    pub fn confirmations(&self) -> Vec<(EngineId, Hash)> {
        self.finalized
            .iter()
            .filter(|(_, status)| **status == TxStatus::Valid)
            .map(|((engine, hash), _)| (*engine, *hash))
            .collect()
    }

    // ─── Scheduling ───

    /// Hand a transaction to an engine at the current virtual time.
    pub fn submit_transaction(
        &mut self,
        engine: EngineId,
        tx: Transaction,
    ) -> Result<(), SimulationError> {
        self.submit_transaction_at(engine, tx, self.now)
    }

    /// Hand a transaction to an engine at a future virtual time.
    pub fn submit_transaction_at(
        &mut self,
        engine: EngineId,
        tx: Transaction,
        at: Duration,
    ) -> Result<(), SimulationError> {
        if engine.0 as usize >= self.engines.len() {
            return Err(SimulationError::UnknownRecipient(engine));
        }
        let at = at.max(self.now);
        self.schedule_event(engine, at, SimEvent::Submit { tx });
        Ok(())
    }

    /// Schedule a stream of generated transactions: one submission per
    /// interval, each to a uniformly sampled engine.
    pub fn schedule_workload(&mut self, workload: &WorkloadConfig) {
        let seed = self.config.seed.wrapping_mul(0x517cc1b727220a95).wrapping_add(1);
        let mut generator =
            TransactionGenerator::new(seed, self.config.num_shards, workload.invalid_fraction);

        let population = self.engines.len() as u64;
        for i in 0..workload.count {
            let at = self.now + workload.tx_interval.saturating_mul(i as u32 + 1);
            let engine = EngineId(self.rng.gen_range(0..population));
            let tx = generator.next_transaction();
            self.schedule_event(engine, at, SimEvent::Submit { tx });
        }

        debug!(
            count = workload.count,
            interval_ms = workload.tx_interval.as_millis() as u64,
            "Scheduled workload"
        );
    }

    // ─── Main loop ───

    /// Run until the queue drains or virtual time reaches `end_time`.
    ///
    /// Deliveries scheduled past the cutoff stay in the queue undelivered;
    /// this is the driver's only termination mechanism.
    pub fn run_until(&mut self, end_time: Duration) -> Result<(), SimulationError> {
        while let Some(entry) = self.event_queue.first_entry() {
            if entry.key().time > end_time {
                break;
            }
            let slot = *entry.key();
            let event = entry.remove();

            self.now = slot.time;
            self.stats.events_processed += 1;

            let index = slot.engine.0 as usize;
            match event {
                SimEvent::Submit { tx } => {
                    trace!(engine = %slot.engine, tx_hash = %tx.hash(), "submitting transaction");
                    self.engines[index].submit(tx)?;
                }
                SimEvent::Deliver { from, payload } => {
                    if let Some(finalization) = self.engines[index].handle_message(from, payload)? {
                        self.record_finalization(slot.engine, finalization);
                    }
                }
            }

            self.drain_bus()?;
        }

        if !self.event_queue.is_empty() {
            debug!(
                undelivered = self.event_queue.len(),
                "virtual clock hit the cutoff, leaving queued deliveries unprocessed"
            );
        }
        if self.now < end_time {
            self.now = end_time;
        }
        Ok(())
    }

    // ─── Routing ───

    /// Turn every queued outbound message into scheduled deliveries.
    fn drain_bus(&mut self) -> Result<(), SimulationError> {
        while let Ok(message) = self.bus.try_recv() {
            self.route(message)?;
        }
        Ok(())
    }

    /// Route one outbound message per the network contract: broadcasts fan
    /// out to a sample of the population, responses go to their named
    /// recipient.
    fn route(&mut self, message: Message) -> Result<(), SimulationError> {
        let Message { origin, to, payload } = message;

        match payload {
            Payload::Query { .. } => {
                self.stats.queries_routed += 1;
                self.fan_out(origin, payload);
                Ok(())
            }
            Payload::Relay { ref tx } => {
                self.stats.relays_routed += 1;
                // The relaying engine has seen the transaction; never hand
                // it straight back.
                let hash = tx.hash();
                self.relays_seen.insert((origin, hash));
                self.fan_out(origin, payload);
                Ok(())
            }
            Payload::Response { .. } => {
                self.stats.responses_routed += 1;
                let to = to.ok_or(SimulationError::UnroutableResponse)?;
                if to.0 as usize >= self.engines.len() {
                    return Err(SimulationError::UnknownRecipient(to));
                }
                self.deliver(origin, to, payload);
                Ok(())
            }
        }
    }

    /// Deliver a payload to `sample_size` uniformly sampled engines, with
    /// replacement, origin included.
    fn fan_out(&mut self, origin: EngineId, payload: Payload) {
        let relay_hash = match &payload {
            Payload::Relay { tx } => Some(tx.hash()),
            _ => None,
        };

        for target in self.sample_engines() {
            // Relays are deduplicated per (engine, transaction) the way
            // gossip layers dedup by message id; otherwise wrong-shard
            // recipients re-relay and the fan-out never dies down.
            if let Some(hash) = relay_hash {
                if !self.relays_seen.insert((target, hash)) {
                    self.stats.messages_deduplicated += 1;
                    continue;
                }
            }
            self.deliver(origin, target, payload.clone());
        }
    }

    /// Schedule one delivery, subject to packet loss and sampled latency.
    fn deliver(&mut self, from: EngineId, to: EngineId, payload: Payload) {
        if self.config.packet_loss_rate > 0.0
            && self.rng.gen::<f64>() < self.config.packet_loss_rate
        {
            self.stats.messages_dropped_loss += 1;
            return;
        }

        let latency = self.sample_latency();
        let deliver_at = self.now + latency;
        self.stats.messages_sent += 1;
        self.schedule_event(to, deliver_at, SimEvent::Deliver { from, payload });
    }

    /// Sample a one-way latency: base latency plus jitter, clamped to at
    /// least 1 ms so virtual time always advances.
    fn sample_latency(&mut self) -> Duration {
        let base = self.config.latency.as_secs_f64();
        let jitter_range = base * self.config.jitter_fraction;
        let jitter = if jitter_range > 0.0 {
            self.rng.gen_range(-jitter_range..jitter_range)
        } else {
            0.0
        };

        Duration::from_secs_f64((base + jitter).max(0.001))
    }

    /// Sample `sample_size` engine ids uniformly, with replacement.
    fn sample_engines(&mut self) -> Vec<EngineId> {
        let population = self.engines.len() as u64;
        (0..self.consensus.sample_size)
            .map(|_| EngineId(self.rng.gen_range(0..population)))
            .collect()
    }

    // ─── Bookkeeping ───

    fn record_finalization(&mut self, engine: EngineId, finalization: Finalization) {
        let Finalization { hash, status } = finalization;
        let shard = self.engines[engine.0 as usize].shard();
        self.finalized.insert((engine, hash), status);

        if status == TxStatus::Valid {
            self.stats.confirmations += 1;
            if engine == CONFIRMATION_LOGGER {
                info!(%engine, %shard, tx_hash = %hash, "transaction confirmed");
            } else {
                debug!(%engine, %shard, tx_hash = %hash, "transaction confirmed");
            }
        } else {
            debug!(%engine, %shard, tx_hash = %hash, "transaction finalized invalid");
        }
    }

    /// Schedule a [`SimEvent`] for processing at the given time.
    fn schedule_event(&mut self, engine: EngineId, time: Duration, event: SimEvent) {
        self.next_ticket += 1;
        let slot = EventKey::new(time, &event, engine, self.next_ticket);
        self.event_queue.insert(slot, event);
    }
}
