//! Outbound message types for the gossip protocol.

use snowglobe_types::{EngineId, Hash, Transaction, TxStatus};

/// Payload carried by a [`Message`].
#[derive(Debug, Clone)]
pub enum Payload {
    /// Ask a sample of the network for its preference on a transaction,
    /// carrying the sender's own preference.
    Query {
        /// The transaction being voted on.
        tx: Transaction,
        /// The sender's current preference.
        status: TxStatus,
    },

    /// Answer to a Query with the responder's current preference.
    Response {
        /// Content hash of the transaction.
        hash: Hash,
        /// The responder's current preference.
        status: TxStatus,
    },

    /// A transaction forwarded toward its home shard.
    Relay {
        /// The transaction being relayed.
        tx: Transaction,
    },
}

impl Payload {
    /// Get a human-readable name for this payload type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Payload::Query { .. } => "Query",
            Payload::Response { .. } => "Response",
            Payload::Relay { .. } => "Relay",
        }
    }
}

/// Top-level message emitted on the outbound bus.
#[derive(Debug, Clone)]
pub struct Message {
    /// Id of the sender.
    pub origin: EngineId,
    /// Id of the receiver. `None` means the message is broadcast to a
    /// sample of the network.
    pub to: Option<EngineId>,
    /// Payload carried with the message.
    pub payload: Payload,
}

impl Message {
    /// A broadcast-to-sample query.
    pub fn query(origin: EngineId, tx: Transaction, status: TxStatus) -> Self {
        Self {
            origin,
            to: None,
            payload: Payload::Query { tx, status },
        }
    }

    /// A response directed at the engine that asked.
    pub fn response(origin: EngineId, to: EngineId, hash: Hash, status: TxStatus) -> Self {
        Self {
            origin,
            to: Some(to),
            payload: Payload::Response { hash, status },
        }
    }

    /// A broadcast-to-sample cross-shard relay.
    pub fn relay(origin: EngineId, tx: Transaction) -> Self {
        Self {
            origin,
            to: None,
            payload: Payload::Relay { tx },
        }
    }

    /// Whether this message fans out to a sample instead of a single
    /// recipient.
    pub fn is_broadcast(&self) -> bool {
        self.to.is_none()
    }
}
