//! Signed transaction ready for submission
//!
//! Holds the signed `VersionedTransaction` together with its serialized wire
//! bytes. Nothing here exposes a way to change the transaction, so every
//! resubmission sends exactly the bytes that were signed.

use solana_sdk::{signature::Signature, transaction::VersionedTransaction};

use crate::errors::{SmartTxError, SmartTxResult};
use crate::rpc::LifetimeAnchor;

#[derive(Debug, Clone)]
pub struct SignedTransaction {
    tx: VersionedTransaction,
    wire: Vec<u8>,
    anchor: LifetimeAnchor,
}

impl SignedTransaction {
    pub(crate) fn new(tx: VersionedTransaction, anchor: LifetimeAnchor) -> SmartTxResult<Self> {
        if tx.signatures.is_empty() {
            return Err(SmartTxError::Signing("transaction has no signatures".to_string()));
        }
        let wire = bincode::serialize(&tx)
            .map_err(|e| SmartTxError::Signing(format!("serialization failed: {}", e)))?;
        Ok(Self { tx, wire, anchor })
    }

    /// First signature, which identifies the transaction on chain
    pub fn signature(&self) -> Signature {
        self.tx.signatures[0]
    }

    pub fn transaction(&self) -> &VersionedTransaction {
        &self.tx
    }

    pub fn wire_bytes(&self) -> &[u8] {
        &self.wire
    }

    pub fn anchor(&self) -> &LifetimeAnchor {
        &self.anchor
    }
}
