//! Rollback Coordinator
//!
//! Reverses the local effect of a forward the remote side rejected or never
//! received. Two paths lead here:
//! - the relay's failure callback (`rollback`)
//! - a bounce-back record arriving through `receive` that names the original
//!   transfer key
//!
//! Both converge on the same state (unfrozen, `Rollback`) and either may
//! arrive first or be redelivered.

use tracing::{debug, info, warn};

use crate::ledger::StateStore;

use super::error::TransferError;
use super::status::CrossChainStatus;
use super::store::{AssetStore, StatusTracker};
use super::types::{AssetRecord, CallbackOutcome, TransferKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReleaseSource {
    Callback,
    BounceBack,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RollbackCoordinator;

impl RollbackCoordinator {
    pub fn new() -> Self {
        Self
    }

    /// Failure callback from the relay.
    ///
    /// Idempotent: an asset that is no longer frozen is left alone and the
    /// call succeeds. A callback for an earlier epoch is ignored.
    pub fn rollback<S: StateStore + ?Sized>(
        &self,
        stub: &mut S,
        key: &TransferKey,
        epoch_id: Option<&str>,
    ) -> Result<CallbackOutcome, TransferError> {
        let record = AssetStore::get(stub, key)?
            .ok_or_else(|| TransferError::AssetNotFound(key.to_string()))?;

        if record.is_stale_epoch(epoch_id) {
            warn!(key = %key, epoch = ?epoch_id, "Rollback for an earlier attempt ignored");
            return Ok(CallbackOutcome::Stale);
        }

        self.release(stub, key, record, ReleaseSource::Callback)
    }

    /// Bounce-back path: unfreeze the original of a returned asset.
    ///
    /// `epoch_id` names the attempt being returned; a bounce-back for an
    /// earlier attempt leaves the current one in flight.
    pub fn release_original<S: StateStore + ?Sized>(
        &self,
        stub: &mut S,
        original: &TransferKey,
        epoch_id: Option<&str>,
    ) -> Result<CallbackOutcome, TransferError> {
        match AssetStore::get(stub, original)? {
            Some(record) if record.is_stale_epoch(epoch_id) => {
                warn!(original = %original, epoch = ?epoch_id, "Bounce-back for an earlier attempt ignored");
                Ok(CallbackOutcome::Stale)
            }
            Some(record) => self.release(stub, original, record, ReleaseSource::BounceBack),
            None => {
                debug!(original = %original, "Bounce-back for unknown original");
                Ok(CallbackOutcome::Ignored)
            }
        }
    }

    fn release<S: StateStore + ?Sized>(
        &self,
        stub: &mut S,
        key: &TransferKey,
        mut record: AssetRecord,
        source: ReleaseSource,
    ) -> Result<CallbackOutcome, TransferError> {
        if !record.frozen {
            debug!(key = %key, source = ?source, "Already released");
            return Ok(CallbackOutcome::Duplicate);
        }

        let status = StatusTracker::get(stub, key)?;
        record.unfreeze();

        // An acknowledged record stays spent; the returned copy only lifts the flag
        if source == ReleaseSource::BounceBack && status == Some(CrossChainStatus::ReceiptReceived) {
            AssetStore::put(stub, &record)?;
            info!(key = %key, "Acknowledged asset returned, freeze cleared");
            return Ok(CallbackOutcome::Applied);
        }

        StatusTracker::check_transition(key, status, CrossChainStatus::Rollback)?;
        AssetStore::put(stub, &record)?;
        StatusTracker::put(stub, key, CrossChainStatus::Rollback)?;

        info!(
            key = %key,
            source = ?source,
            epoch = ?record.epoch.as_ref().map(|e| e.id.as_str()),
            "Transfer rolled back"
        );
        Ok(CallbackOutcome::Applied)
    }
}
