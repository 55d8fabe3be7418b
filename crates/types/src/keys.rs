//! P-256 key handling for transaction production.
//!
//! Only signature verification feeds the consensus core; signing exists for
//! workload generation and tests.

use crate::{ShardId, Transaction};
use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use rand::{CryptoRng, RngCore};

/// An ECDSA P-256 keypair.
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Generate a fresh keypair from the given RNG.
    ///
    /// Takes an explicit RNG so callers control seeding; there is no
    /// process-global randomness anywhere in the workspace.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self {
            signing_key: SigningKey::random(rng),
        }
    }

    /// The public half of this keypair.
    pub fn public_key(&self) -> VerifyingKey {
        *self.signing_key.verifying_key()
    }

    /// Build a signed transaction over (nonce, data).
    ///
    /// The signature covers the canonical 16-byte serialization, so the
    /// shard id can change in flight without invalidating it.
    pub fn sign_transaction(&self, nonce: u64, data: u64, shard: ShardId) -> Transaction {
        let mut buf = [0u8; 16];
        buf[..8].copy_from_slice(&nonce.to_le_bytes());
        buf[8..].copy_from_slice(&data.to_le_bytes());
        let signature: Signature = self.signing_key.sign(&buf);

        Transaction {
            nonce,
            data,
            shard,
            public_key: self.public_key(),
            signature,
        }
    }
}
