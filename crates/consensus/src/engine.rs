//! Per-node consensus engine.

use crate::{ConsensusConfig, Message, Payload, StepOutcome, TxState};
use crossbeam::channel::Sender;
use parking_lot::RwLock;
use snowglobe_types::{EngineId, Hash, ShardId, Transaction, TxStatus};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tracing::{debug, trace};

/// A terminal classification reached by an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Finalization {
    /// Content hash of the classified transaction.
    pub hash: Hash,
    /// The terminal status.
    pub status: TxStatus,
}

/// Errors surfaced by engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The outbound bus receiver went away; the driver is shutting down.
    #[error("outbound bus closed")]
    BusClosed,
}

/// Per-node consensus state machine.
///
/// Owns a mempool of [`TxState`] keyed by transaction hash and reacts to
/// three inputs: a locally submitted transaction, an inbound query, and an
/// inbound response. Outbound traffic goes onto the shared bus; the engine
/// never talks to peers directly.
///
/// The mempool is guarded by a single reader-writer lock. Handlers follow
/// lookup, mutate, release, emit: the lock is never held across a bus send.
pub struct Engine {
    id: EngineId,
    shard: ShardId,
    config: ConsensusConfig,
    outbound: Sender<Message>,

    mempool: RwLock<HashMap<Hash, TxState>>,
}

impl Engine {
    /// Create an engine with its network identity, shard assignment, and a
    /// handle to the shared outbound bus.
    pub fn new(id: EngineId, shard: ShardId, config: ConsensusConfig, outbound: Sender<Message>) -> Self {
        Self {
            id,
            shard,
            config,
            outbound,
            mempool: RwLock::new(HashMap::new()),
        }
    }

    /// This engine's network identity.
    pub fn id(&self) -> EngineId {
        self.id
    }

    /// The shard this engine serves.
    pub fn shard(&self) -> ShardId {
        self.shard
    }

    /// Whether the mempool holds state for a hash.
    pub fn contains(&self, hash: &Hash) -> bool {
        self.mempool.read().contains_key(hash)
    }

    /// Current preference for a hash, if any state exists.
    pub fn preference(&self, hash: &Hash) -> Option<TxStatus> {
        self.mempool.read().get(hash).map(|state| state.status())
    }

    /// Accept a locally generated transaction.
    ///
    /// Transactions for another shard are relayed toward their home shard
    /// without touching the mempool. A transaction already in the mempool
    /// is a no-op. Otherwise the signature verdict becomes the initial
    /// preference and a first query seeds the gossip.
    pub fn submit(&self, tx: Transaction) -> Result<(), EngineError> {
        if tx.shard != self.shard {
            debug!(
                engine = %self.id,
                shard = %self.shard,
                tx_shard = %tx.shard,
                tx_hash = %tx.hash(),
                "relaying cross-shard transaction"
            );
            return self.send(Message::relay(self.id, tx));
        }

        let hash = tx.hash();
        if self.mempool.read().contains_key(&hash) {
            return Ok(());
        }

        let status = tx.verify();

        let inserted = match self.mempool.write().entry(hash) {
            Entry::Occupied(_) => false,
            Entry::Vacant(vacant) => {
                vacant.insert(TxState::new(tx.clone(), status, true));
                true
            }
        };

        if inserted {
            debug!(engine = %self.id, tx_hash = %hash, %status, "accepted local transaction");
            self.send(Message::query(self.id, tx, status))?;
        }
        Ok(())
    }

    /// React to an inbound message from another engine.
    ///
    /// Returns a [`Finalization`] when this message drove a transaction to
    /// its terminal classification.
    pub fn handle_message(
        &self,
        from: EngineId,
        payload: Payload,
    ) -> Result<Option<Finalization>, EngineError> {
        match payload {
            Payload::Query { tx, status } => {
                self.handle_query(from, tx, status)?;
                Ok(None)
            }
            Payload::Response { hash, status } => self.handle_response(hash, status),
            // Relayed transactions arrive exactly like local submissions.
            Payload::Relay { tx } => {
                self.submit(tx)?;
                Ok(None)
            }
        }
    }

    /// First sight of a hash adopts the inquirer's preference and seeds
    /// further gossip without answering; a known hash gets a directed
    /// response with our current preference.
    fn handle_query(
        &self,
        from: EngineId,
        tx: Transaction,
        status: TxStatus,
    ) -> Result<(), EngineError> {
        let hash = tx.hash();

        let mut ours = self.mempool.read().get(&hash).map(|state| state.status());
        if ours.is_none() {
            ours = match self.mempool.write().entry(hash) {
                Entry::Occupied(occupied) => Some(occupied.get().status()),
                Entry::Vacant(vacant) => {
                    vacant.insert(TxState::new(tx.clone(), status, false));
                    None
                }
            };
        }

        match ours {
            Some(our_status) => self.send(Message::response(self.id, from, hash, our_status)),
            None => {
                trace!(engine = %self.id, tx_hash = %hash, %status, "adopted preference from query");
                self.send(Message::query(self.id, tx, status))
            }
        }
    }

    /// Fold a peer's response into the transaction's consensus state.
    fn handle_response(
        &self,
        hash: Hash,
        status: TxStatus,
    ) -> Result<Option<Finalization>, EngineError> {
        let mut mempool = self.mempool.write();

        let Some(state) = mempool.get_mut(&hash) else {
            trace!(engine = %self.id, tx_hash = %hash, "response for unknown transaction, dropping");
            return Ok(None);
        };
        if state.is_final(&self.config) {
            trace!(engine = %self.id, tx_hash = %hash, "response after finalization, dropping");
            return Ok(None);
        }

        match state.on_response(status, &self.config) {
            StepOutcome::Continue => {
                let follow_up = Message::query(self.id, state.tx().clone(), state.status());
                drop(mempool);
                self.send(follow_up)?;
                Ok(None)
            }
            StepOutcome::Finalized(final_status) => {
                // Only the origin forgets a confirmed transaction; every
                // other engine keeps the frozen state to answer late
                // queries. Invalid outcomes are kept everywhere.
                if state.submitted_locally() && final_status == TxStatus::Valid {
                    mempool.remove(&hash);
                }
                drop(mempool);
                debug!(
                    engine = %self.id,
                    tx_hash = %hash,
                    status = %final_status,
                    "transaction finalized"
                );
                Ok(Some(Finalization {
                    hash,
                    status: final_status,
                }))
            }
        }
    }

    fn send(&self, message: Message) -> Result<(), EngineError> {
        self.outbound.send(message).map_err(|_| EngineError::BusClosed)
    }
}
