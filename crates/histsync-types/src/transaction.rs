use std::fmt;

use serde::{Deserialize, Serialize};

use crate::change::ChangeSet;
use crate::error::TypeError;
use crate::originator::{ContextName, OriginatorId};
use crate::timestamp::Timestamp;

/// Content-addressed identifier of a transaction.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionId([u8; 32]);

impl TransactionId {
    /// Create a `TransactionId` from a pre-computed hash.
    pub fn from_hash(hash: [u8; 32]) -> Self {
        Self(hash)
    }

    /// The raw 32-byte hash.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex-encoded string representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Parse from a hex string.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(TypeError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransactionId({})", self.short_hex())
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx:{}", self.short_hex())
    }
}

/// One entry in the shared history log.
///
/// Produced whenever a writer saves; immutable once written and destroyed
/// only by pruning. The `id` is a BLAKE3 hash over author, context,
/// timestamp and payload, so the same entry read twice carries the same id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Content-addressed identifier.
    pub id: TransactionId,
    /// Writer that produced this entry.
    pub author: OriginatorId,
    /// Execution surface that produced this entry.
    pub context_name: ContextName,
    /// Position in the log; non-decreasing per author.
    pub timestamp: Timestamp,
    /// What changed.
    pub changes: ChangeSet,
}

impl Transaction {
    /// Build a transaction, computing its id.
    pub fn new(
        author: OriginatorId,
        context_name: ContextName,
        timestamp: Timestamp,
        changes: ChangeSet,
    ) -> Self {
        let id = Self::compute_id(&author, &context_name, &timestamp, &changes);
        Self {
            id,
            author,
            context_name,
            timestamp,
            changes,
        }
    }

    /// Verify the id still matches the content.
    pub fn verify_integrity(&self) -> bool {
        self.id
            == Self::compute_id(
                &self.author,
                &self.context_name,
                &self.timestamp,
                &self.changes,
            )
    }

    fn compute_id(
        author: &OriginatorId,
        context_name: &ContextName,
        timestamp: &Timestamp,
        changes: &ChangeSet,
    ) -> TransactionId {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"histsync-transaction-v1:");

        hasher.update(&(author.as_str().len() as u64).to_le_bytes());
        hasher.update(author.as_str().as_bytes());
        hasher.update(&(context_name.as_str().len() as u64).to_le_bytes());
        hasher.update(context_name.as_str().as_bytes());

        hasher.update(&timestamp.physical_ms.to_le_bytes());
        hasher.update(&timestamp.logical.to_le_bytes());

        // Record values are JSON, so hash the JSON encoding of the payload.
        if let Ok(payload) = serde_json::to_vec(changes) {
            hasher.update(&payload);
        }

        TransactionId::from_hash(*hasher.finalize().as_bytes())
    }
}
