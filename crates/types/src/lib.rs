//! Core types for Snowglobe consensus.
//!
//! This crate provides the foundational types used throughout the consensus
//! implementation:
//!
//! - **Primitives**: content hashes, P-256 keys and signatures
//! - **Identifiers**: EngineId, ShardId
//! - **Transactions**: canonical serialization, identity, verification
//!
//! # Design Philosophy
//!
//! This crate is self-contained with minimal dependencies. It does not depend
//! on any other workspace crates, making it the foundation layer.

mod hash;
mod identifiers;
mod keys;
mod status;
mod transaction;

pub use hash::{Hash, HexError};
pub use identifiers::{EngineId, ShardId};
pub use keys::Keypair;
pub use status::TxStatus;
pub use transaction::Transaction;
