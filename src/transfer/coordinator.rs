//! Transfer Coordinator
//!
//! Sending side of the protocol: issue, forward and the success callback.
//!
//! `forward` is the only operation with an outbound side effect. Its ledger
//! writes (freeze + `Forwarded`) are staged only after the relay accepted the
//! event, so a rejected emission leaves the asset exactly as it was.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::ContractConfig;
use crate::ledger::StateStore;

use super::error::TransferError;
use super::relay::{InterchainEvent, Relay, encode_callback_args, encode_typed_args};
use super::status::CrossChainStatus;
use super::store::{AssetStore, StatusTracker};
use super::types::{AssetRecord, CallbackOutcome, EpochGenerator, TransferEpoch, TransferKey};

/// Transfer Coordinator - owns the sending-side transitions
pub struct TransferCoordinator {
    relay: Arc<dyn Relay>,
    config: ContractConfig,
    epochs: EpochGenerator,
}

impl TransferCoordinator {
    pub fn new(relay: Arc<dyn Relay>, config: ContractConfig) -> Self {
        Self {
            relay,
            config,
            epochs: EpochGenerator::new(),
        }
    }

    /// Create or edit an asset. The only entry point that writes business
    /// content.
    ///
    /// Rejected when the key is frozen, already acknowledged by the remote
    /// side, or was received from the counterpart.
    pub fn issue<S: StateStore + ?Sized>(
        &self,
        stub: &mut S,
        mut record: AssetRecord,
    ) -> Result<TransferKey, TransferError> {
        let key = record.key()?;
        let existing = AssetStore::get(stub, &key)?;
        let status = StatusTracker::get(stub, &key)?;

        if let Some(existing) = &existing {
            if let Some(locked) = status.filter(CrossChainStatus::is_locked_for_issue) {
                warn!(key = %key, status = %locked, "Issue rejected: record locked");
                return Err(match locked {
                    CrossChainStatus::ReceiptSent => TransferError::ReceivedFromPartner(key.to_string()),
                    _ => TransferError::AlreadyForwarded(key.to_string()),
                });
            }
            if existing.frozen {
                warn!(key = %key, "Issue rejected: asset frozen");
                return Err(TransferError::AssetFrozen(key.to_string()));
            }
        }
        StatusTracker::check_transition(&key, status, CrossChainStatus::OnChain)?;

        // A freshly issued record has no outstanding attempt
        record.frozen = false;
        record.epoch = None;

        StatusTracker::put(stub, &key, CrossChainStatus::OnChain)?;
        AssetStore::put(stub, &record)?;

        info!(key = %key, updated = existing.is_some(), "Asset issued");
        Ok(key)
    }

    pub fn query<S: StateStore + ?Sized>(
        &self,
        stub: &mut S,
        key: &TransferKey,
    ) -> Result<Option<AssetRecord>, TransferError> {
        AssetStore::get(stub, key)
    }

    pub fn query_status<S: StateStore + ?Sized>(
        &self,
        stub: &mut S,
        key: &TransferKey,
    ) -> Result<Option<CrossChainStatus>, TransferError> {
        StatusTracker::get(stub, key)
    }

    /// Freeze the asset under a fresh epoch and hand it to the relay.
    ///
    /// A frozen asset is always rejected: at most one forward per key may be
    /// outstanding.
    pub async fn forward<S: StateStore + Send + ?Sized>(
        &self,
        stub: &mut S,
        dest_service: &str,
        key: &TransferKey,
    ) -> Result<TransferEpoch, TransferError> {
        if dest_service.trim().is_empty() {
            return Err(TransferError::InvalidArgument(
                "destination service can not be empty".to_string(),
            ));
        }

        let mut record = AssetStore::get(stub, key)?
            .ok_or_else(|| TransferError::AssetNotFound(key.to_string()))?;

        if record.frozen {
            warn!(
                key = %key,
                epoch = ?record.epoch.as_ref().map(|e| e.id.as_str()),
                "Forward rejected: transfer already in flight"
            );
            return Err(TransferError::AssetFrozen(key.to_string()));
        }

        let status = StatusTracker::get(stub, key)?;
        StatusTracker::check_transition(key, status, CrossChainStatus::Forwarded)?;

        let epoch = self.epochs.next_epoch()?;
        record.freeze(epoch.clone());
        let event = self.forward_event(dest_service, &record, &epoch)?;

        // Emission first: a rejection must leave no trace on the ledger
        if let Err(e) = self.relay.emit_interchain_event(&event).await {
            error!(
                key = %key,
                dest = %dest_service,
                relay = self.relay.name(),
                error = %e,
                "Relay rejected forward, nothing persisted"
            );
            return Err(e.into());
        }

        AssetStore::put(stub, &record)?;
        StatusTracker::put(stub, key, CrossChainStatus::Forwarded)?;

        info!(key = %key, dest = %dest_service, epoch = %epoch, "Asset forwarded");
        Ok(epoch)
    }

    fn forward_event(
        &self,
        dest_service: &str,
        record: &AssetRecord,
        epoch: &TransferEpoch,
    ) -> Result<InterchainEvent, TransferError> {
        let args = encode_typed_args(&self.config.remote_type_tag, &[record.to_json()?])?;
        let callback_args =
            encode_callback_args(&[record.transfer_key.as_str(), epoch.id.as_str()])?;

        Ok(InterchainEvent {
            dest_service: dest_service.to_string(),
            func: self.config.forward_func.clone(),
            args,
            callback_func: self.config.callback_func.clone(),
            callback_args: callback_args.clone(),
            rollback_func: self.config.rollback_func.clone(),
            rollback_args: callback_args,
            is_sync: false,
        })
    }

    /// Success callback: the remote side confirmed the transfer.
    ///
    /// Leaves `frozen` untouched; the record stays spent on this side.
    pub fn ack<S: StateStore + ?Sized>(
        &self,
        stub: &mut S,
        key: &TransferKey,
        epoch_id: Option<&str>,
    ) -> Result<CallbackOutcome, TransferError> {
        let record = AssetStore::get(stub, key)?
            .ok_or_else(|| TransferError::AssetNotFound(key.to_string()))?;

        if record.is_stale_epoch(epoch_id) {
            warn!(key = %key, epoch = ?epoch_id, "Ack for an earlier attempt ignored");
            return Ok(CallbackOutcome::Stale);
        }

        let status = StatusTracker::get(stub, key)?;
        if status == Some(CrossChainStatus::ReceiptReceived) {
            debug!(key = %key, "Ack redelivered");
            return Ok(CallbackOutcome::Duplicate);
        }

        StatusTracker::transition(stub, key, CrossChainStatus::ReceiptReceived)?;

        info!(key = %key, "Receipt received");
        Ok(CallbackOutcome::Applied)
    }

    /// Register this contract with the broker
    pub async fn register(&self, service_id: &str) -> Result<Vec<u8>, TransferError> {
        if service_id.trim().is_empty() {
            return Err(TransferError::InvalidArgument(
                "service id can not be empty".to_string(),
            ));
        }

        let response = self.relay.register(service_id).await.map_err(|e| {
            error!(service_id = %service_id, error = %e, "Broker registration failed");
            TransferError::from(e)
        })?;

        info!(service_id = %service_id, "Registered with broker");
        Ok(response)
    }
}
