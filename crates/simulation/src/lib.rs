//! Deterministic network driver for Snowglobe consensus.
//!
//! Hosts a population of engines and plays the network between them:
//! queries and relays fan out to a uniform random sample, responses go to
//! their named recipient, and every delivery is delayed by a configured
//! latency. Time is virtual and the RNG is seeded, so a run is a pure
//! function of its configuration: same seed, same result, every time.

mod driver;
mod event_queue;
mod workload;

pub use driver::{NetworkConfig, NetworkSimulation, SimulationError, SimulationStats};
pub use workload::{TransactionGenerator, WorkloadConfig};
