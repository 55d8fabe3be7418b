//! Transactions and signature verification.

use crate::{Hash, ShardId, TxStatus};
use p256::ecdsa::signature::Verifier;
use p256::ecdsa::{Signature, VerifyingKey};
use std::fmt;

/// An opaque payload driven to a terminal classification by consensus.
///
/// Identity is the SHA-256 hash of the canonical serialization of
/// (nonce, data). The shard id and key material are not part of the hash;
/// the embedded ECDSA P-256 signature covers the canonical form.
#[derive(Clone)]
pub struct Transaction {
    /// Uniqueness nonce.
    pub nonce: u64,
    /// Opaque payload word.
    pub data: u64,
    /// Shard this transaction belongs to.
    pub shard: ShardId,
    /// P-256 public key of the signer.
    pub public_key: VerifyingKey,
    /// ECDSA (r, s) signature over the canonical serialization.
    pub signature: Signature,
}

impl Transaction {
    /// Canonical serialization: 16 bytes little-endian, first 8 = nonce,
    /// next 8 = data.
    pub fn serialize(&self) -> [u8; 16] {
        let mut buf = [0u8; 16];
        buf[..8].copy_from_slice(&self.nonce.to_le_bytes());
        buf[8..].copy_from_slice(&self.data.to_le_bytes());
        buf
    }

    /// Content hash: SHA-256 of the canonical serialization.
    pub fn hash(&self) -> Hash {
        Hash::from_bytes(&self.serialize())
    }

    /// Verify the embedded signature against the content hash.
    ///
    /// Pure function of the transaction; never retried. A failed
    /// verification is not an error, it is the `Invalid` preference.
    pub fn verify(&self) -> TxStatus {
        match self.public_key.verify(&self.serialize(), &self.signature) {
            Ok(()) => TxStatus::Valid,
            Err(_) => TxStatus::Invalid,
        }
    }
}

/// Two transactions are equal iff their content hashes are equal.
impl PartialEq for Transaction {
    fn eq(&self, other: &Self) -> bool {
        self.hash() == other.hash()
    }
}

impl Eq for Transaction {}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("nonce", &self.nonce)
            .field("data", &self.data)
            .field("shard", &self.shard)
            .field("hash", &self.hash())
            .finish()
    }
}
