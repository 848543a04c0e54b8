//! Receipt Handler
//!
//! Applies an asset pushed to this ledger by the counterpart.

use tracing::{debug, info, warn};

use crate::ledger::StateStore;

use super::error::TransferError;
use super::rollback::RollbackCoordinator;
use super::status::CrossChainStatus;
use super::store::{AssetStore, StatusTracker};
use super::types::{AssetRecord, CallbackOutcome, TransferKey};

#[derive(Debug, Default, Clone, Copy)]
pub struct ReceiptHandler {
    rollbacks: RollbackCoordinator,
}

impl ReceiptHandler {
    pub fn new() -> Self {
        Self {
            rollbacks: RollbackCoordinator::new(),
        }
    }

    /// Store an inbound record under its transfer key with status
    /// `ReceiptSent`.
    ///
    /// A key that exists locally with any other status belongs to a local
    /// asset and is never overwritten. Redelivery of the same epoch is a
    /// no-op. A record naming an `originalTransferKey` also releases that
    /// original, once, and only while the original is still on the attempt
    /// named by `originalTransferEpoch` (when given).
    pub fn receive<S: StateStore + ?Sized>(
        &self,
        stub: &mut S,
        mut inbound: AssetRecord,
    ) -> Result<CallbackOutcome, TransferError> {
        let key = inbound.key()?;
        let original = match inbound.original_transfer_key.as_deref() {
            Some(original) => {
                let original = TransferKey::new(original)?;
                if original == key {
                    return Err(TransferError::InvalidArgument(format!(
                        "crossChainID {key} can not return itself"
                    )));
                }
                Some(original)
            }
            None => None,
        };

        let existing = AssetStore::get(stub, &key)?;
        let status = StatusTracker::get(stub, &key)?;
        // The sender's freeze has no meaning on this ledger
        inbound.unfreeze();

        let outcome = match existing {
            Some(_) if status != Some(CrossChainStatus::ReceiptSent) => {
                warn!(
                    key = %key,
                    status = CrossChainStatus::label(status),
                    "Inbound record would overwrite a local asset"
                );
                return Err(TransferError::KeyAlreadyExists(key.to_string()));
            }
            Some(existing) if existing.same_epoch(&inbound) || existing == inbound => {
                debug!(key = %key, "Inbound record redelivered");
                CallbackOutcome::Duplicate
            }
            _ => {
                StatusTracker::check_transition(&key, status, CrossChainStatus::ReceiptSent)?;
                AssetStore::put(stub, &inbound)?;
                StatusTracker::put(stub, &key, CrossChainStatus::ReceiptSent)?;
                info!(key = %key, "Inbound record stored");
                CallbackOutcome::Applied
            }
        };

        if let Some(original) = original {
            if outcome == CallbackOutcome::Duplicate {
                debug!(key = %key, original = %original, "Bounce-back already processed");
            } else {
                let released = self.rollbacks.release_original(
                    stub,
                    &original,
                    inbound.original_transfer_epoch.as_deref(),
                )?;
                info!(key = %key, original = %original, outcome = %released, "Bounce-back processed");
            }
        }

        Ok(outcome)
    }
}
