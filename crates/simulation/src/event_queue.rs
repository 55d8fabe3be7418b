//! Ordering for the virtual-time event queue.

use snowglobe_consensus::Payload;
use snowglobe_types::{EngineId, Transaction};
use std::cmp::Ordering;
use std::time::Duration;

/// Priority classes for events due on the same virtual instant.
///
/// The driver is single threaded, so simultaneous events need a fixed
/// service order: wire traffic is handed to its engine before any fresh
/// client submission on the same instant, the way a node drains its
/// socket before taking on new local work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub(crate) enum EventPriority {
    /// A payload coming off the simulated wire.
    Network = 0,

    /// A locally generated transaction entering the system.
    Client = 1,
}

/// An event scheduled for an engine.
#[derive(Debug, Clone)]
pub(crate) enum SimEvent {
    /// Network delivery of a payload, as if it arrived off the wire.
    Deliver {
        /// Originating engine.
        from: EngineId,
        /// Delivered payload.
        payload: Payload,
    },

    /// A client handing a transaction to this engine.
    Submit {
        /// The freshly generated transaction.
        tx: Transaction,
    },
}

impl SimEvent {
    /// Service class for this event.
    pub(crate) fn priority(&self) -> EventPriority {
        match self {
            SimEvent::Deliver { .. } => EventPriority::Network,
            SimEvent::Submit { .. } => EventPriority::Client,
        }
    }
}

/// Queue position of a scheduled event.
///
/// The queue is a total order over (time, priority, engine, ticket).
/// Virtual time drives the clock; everything after it exists only to
/// break ties. A whole gossip wave can land on a single instant, and a
/// seeded run must always pick the same next event, so simultaneous
/// events settle by service class, then by the receiving engine's id,
/// and finally by admission ticket, which preserves scheduling order
/// among one engine's own events.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) struct EventKey {
    /// Virtual instant the event is due.
    pub time: Duration,
    /// Service class within the instant.
    pub priority: EventPriority,
    /// Receiving engine.
    pub engine: EngineId,
    /// Admission ticket, assigned monotonically at scheduling time.
    pub ticket: u64,
}

impl EventKey {
    /// Key a [`SimEvent`] for the queue.
    pub(crate) fn new(time: Duration, event: &SimEvent, engine: EngineId, ticket: u64) -> Self {
        Self {
            time,
            priority: event.priority(),
            engine,
            ticket,
        }
    }
}

impl Ord for EventKey {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.time, self.priority, self.engine, self.ticket).cmp(&(
            other.time,
            other.priority,
            other.engine,
            other.ticket,
        ))
    }
}

impl PartialOrd for EventKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
