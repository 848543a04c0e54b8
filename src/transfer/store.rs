//! Asset and status persistence
//!
//! Every transfer key owns its own ledger slots (`asset/<key>`,
//! `status/<key>`), so operations on different keys never touch a shared
//! ledger entry. The asset and status slots of one key are written in the
//! same invocation but are separate entries.

use tracing::debug;

use crate::ledger::StateStore;

use super::error::TransferError;
use super::status::CrossChainStatus;
use super::types::{AssetRecord, TransferKey};

pub const ASSET_PREFIX: &str = "asset/";
pub const STATUS_PREFIX: &str = "status/";

/// Asset records by transfer key
pub struct AssetStore;

impl AssetStore {
    pub fn slot(key: &TransferKey) -> String {
        format!("{ASSET_PREFIX}{key}")
    }

    pub fn get<S: StateStore + ?Sized>(
        stub: &mut S,
        key: &TransferKey,
    ) -> Result<Option<AssetRecord>, TransferError> {
        match stub.get_state(&Self::slot(key))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Store `record` under its own transfer key
    pub fn put<S: StateStore + ?Sized>(
        stub: &mut S,
        record: &AssetRecord,
    ) -> Result<(), TransferError> {
        let key = record.key()?;
        let bytes = serde_json::to_vec(record)?;
        stub.put_state(&Self::slot(&key), bytes)?;
        Ok(())
    }
}

/// Cross-chain status by transfer key
pub struct StatusTracker;

impl StatusTracker {
    pub fn slot(key: &TransferKey) -> String {
        format!("{STATUS_PREFIX}{key}")
    }

    pub fn get<S: StateStore + ?Sized>(
        stub: &mut S,
        key: &TransferKey,
    ) -> Result<Option<CrossChainStatus>, TransferError> {
        match stub.get_state(&Self::slot(key))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Unchecked write; callers go through [`StatusTracker::transition`]
    /// unless the transition was validated earlier in the same invocation.
    pub fn put<S: StateStore + ?Sized>(
        stub: &mut S,
        key: &TransferKey,
        status: CrossChainStatus,
    ) -> Result<(), TransferError> {
        let bytes = serde_json::to_vec(&status)?;
        stub.put_state(&Self::slot(key), bytes)?;
        Ok(())
    }

    pub fn delete<S: StateStore + ?Sized>(
        stub: &mut S,
        key: &TransferKey,
    ) -> Result<(), TransferError> {
        stub.del_state(&Self::slot(key))?;
        Ok(())
    }

    /// Reject `from -> to` unless the state diagram allows it
    pub fn check_transition(
        key: &TransferKey,
        from: Option<CrossChainStatus>,
        to: CrossChainStatus,
    ) -> Result<(), TransferError> {
        if CrossChainStatus::can_transition(from, to) {
            Ok(())
        } else {
            Err(TransferError::InvalidStateTransition {
                key: key.to_string(),
                from: CrossChainStatus::label(from).to_string(),
                to,
            })
        }
    }

    /// Validated status change. Returns the previous status.
    pub fn transition<S: StateStore + ?Sized>(
        stub: &mut S,
        key: &TransferKey,
        to: CrossChainStatus,
    ) -> Result<Option<CrossChainStatus>, TransferError> {
        let from = Self::get(stub, key)?;
        Self::check_transition(key, from, to)?;
        if from != Some(to) {
            Self::put(stub, key, to)?;
            debug!(key = %key, from = CrossChainStatus::label(from), to = %to, "Status changed");
        }
        Ok(from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MemoryLedger;
    use serde_json::json;

    fn key(s: &str) -> TransferKey {
        TransferKey::new(s).unwrap()
    }

    #[test]
    fn test_asset_roundtrip_per_slot() {
        let ledger = MemoryLedger::new();
        let mut tx = ledger.begin();
        let record = AssetRecord::new("LB1", "ORG-A", "BANK-B", json!({"n": 1}));
        AssetStore::put(&mut tx, &record).unwrap();
        tx.commit().unwrap();

        assert!(ledger.get("asset/LB1").is_some());
        let mut tx = ledger.begin();
        assert_eq!(AssetStore::get(&mut tx, &key("LB1")).unwrap(), Some(record));
        assert_eq!(AssetStore::get(&mut tx, &key("LB2")).unwrap(), None);
    }

    #[test]
    fn test_status_get_put_delete() {
        let ledger = MemoryLedger::new();
        let mut tx = ledger.begin();
        let k = key("LB1");
        assert_eq!(StatusTracker::get(&mut tx, &k).unwrap(), None);

        StatusTracker::put(&mut tx, &k, CrossChainStatus::OnChain).unwrap();
        assert_eq!(
            StatusTracker::get(&mut tx, &k).unwrap(),
            Some(CrossChainStatus::OnChain)
        );

        StatusTracker::delete(&mut tx, &k).unwrap();
        assert_eq!(StatusTracker::get(&mut tx, &k).unwrap(), None);
    }

    #[test]
    fn test_transition_validates() {
        let ledger = MemoryLedger::new();
        let mut tx = ledger.begin();
        let k = key("LB1");

        assert_eq!(
            StatusTracker::transition(&mut tx, &k, CrossChainStatus::OnChain).unwrap(),
            None
        );
        assert_eq!(
            StatusTracker::transition(&mut tx, &k, CrossChainStatus::Forwarded).unwrap(),
            Some(CrossChainStatus::OnChain)
        );

        let err = StatusTracker::transition(&mut tx, &k, CrossChainStatus::OnChain).unwrap_err();
        assert_eq!(
            err,
            TransferError::InvalidStateTransition {
                key: "LB1".to_string(),
                from: "forward".to_string(),
                to: CrossChainStatus::OnChain,
            }
        );
        assert_eq!(
            StatusTracker::get(&mut tx, &k).unwrap(),
            Some(CrossChainStatus::Forwarded)
        );
    }

    #[test]
    fn test_distinct_keys_use_distinct_slots() {
        assert_eq!(AssetStore::slot(&key("LB1")), "asset/LB1");
        assert_eq!(StatusTracker::slot(&key("LB1")), "status/LB1");
        assert_ne!(AssetStore::slot(&key("LB1")), AssetStore::slot(&key("LB2")));
    }
}
