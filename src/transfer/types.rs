//! Transfer Core Types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;

use super::error::TransferError;

/// Business identifier correlating an asset across both chains.
///
/// Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransferKey(String);

impl TransferKey {
    pub fn new(key: impl Into<String>) -> Result<Self, TransferError> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(TransferError::EmptyTransferKey);
        }
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransferKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TransferKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identifies one forward attempt of a transfer key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferEpoch {
    /// ULID string, monotonic per coordinator
    pub id: String,
    pub timestamp: DateTime<Utc>,
}

impl TransferEpoch {
    /// Whether a callback-supplied epoch id refers to this attempt
    pub fn matches(&self, epoch_id: &str) -> bool {
        self.id == epoch_id
    }
}

impl fmt::Display for TransferEpoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Monotonic epoch source
///
/// Two epochs minted in the same millisecond still sort in mint order.
pub struct EpochGenerator {
    inner: Mutex<ulid::Generator>,
}

impl EpochGenerator {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(ulid::Generator::new()),
        }
    }

    pub fn next_epoch(&self) -> Result<TransferEpoch, TransferError> {
        let id = {
            let mut generator = self
                .inner
                .lock()
                .map_err(|_| TransferError::SystemError("epoch generator poisoned".to_string()))?;
            generator
                .generate()
                .map_err(|e| TransferError::SystemError(e.to_string()))?
        };

        Ok(TransferEpoch {
            id: id.to_string(),
            timestamp: Utc::now(),
        })
    }
}

impl Default for EpochGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of applying a relay-invoked callback or delivery.
///
/// Every variant is a success for the relay; only `Applied` changed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// State changed
    Applied,
    /// Already applied earlier (redelivery)
    Duplicate,
    /// Refers to an earlier forward attempt
    Stale,
    /// Nothing to act on
    Ignored,
}

impl CallbackOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallbackOutcome::Applied => "applied",
            CallbackOutcome::Duplicate => "duplicate",
            CallbackOutcome::Stale => "stale",
            CallbackOutcome::Ignored => "ignored",
        }
    }
}

impl fmt::Display for CallbackOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Asset record, keyed by its transfer key.
///
/// The JSON field names are the ones exchanged with the counterpart chain.
/// `frozen`, `transferEpoch` and the bounce-back correlation fields are left
/// out of the JSON while unset so a freshly issued document reads back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRecord {
    #[serde(rename = "crossChainID")]
    pub transfer_key: String,

    #[serde(rename = "corpHolderOrgCode", default)]
    pub owner_org_code: String,

    #[serde(rename = "financeReceiverOrgCode", default)]
    pub counterparty_org_code: String,

    /// Domain document (e.g. bill of lading); opaque to the core
    #[serde(rename = "ladingBillCR", default)]
    pub payload: serde_json::Value,

    #[serde(default)]
    pub memo: String,

    /// Set while a forward attempt is outstanding
    #[serde(default, skip_serializing_if = "is_false")]
    pub frozen: bool,

    #[serde(
        rename = "transferEpoch",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub epoch: Option<TransferEpoch>,

    /// Set on a bounce-back record: the key of the transfer it returns
    #[serde(
        rename = "originalTransferKey",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub original_transfer_key: Option<String>,

    /// Epoch id of the returned forward attempt; a bounce-back naming an
    /// earlier attempt does not release the original
    #[serde(
        rename = "originalTransferEpoch",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub original_transfer_epoch: Option<String>,
}

impl AssetRecord {
    pub fn new(
        transfer_key: impl Into<String>,
        owner_org_code: impl Into<String>,
        counterparty_org_code: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            transfer_key: transfer_key.into(),
            owner_org_code: owner_org_code.into(),
            counterparty_org_code: counterparty_org_code.into(),
            payload,
            memo: String::new(),
            frozen: false,
            epoch: None,
            original_transfer_key: None,
            original_transfer_epoch: None,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, TransferError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, TransferError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Validated transfer key of this record
    pub fn key(&self) -> Result<TransferKey, TransferError> {
        TransferKey::new(self.transfer_key.as_str())
    }

    /// Mark a new forward attempt in flight
    pub fn freeze(&mut self, epoch: TransferEpoch) {
        self.frozen = true;
        self.epoch = Some(epoch);
    }

    pub fn unfreeze(&mut self) {
        self.frozen = false;
    }

    /// Whether a callback carrying `epoch_id` belongs to an earlier attempt.
    ///
    /// Callbacks without an epoch id are never considered stale.
    pub fn is_stale_epoch(&self, epoch_id: Option<&str>) -> bool {
        match (epoch_id, &self.epoch) {
            (Some(id), Some(current)) => !current.matches(id),
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    /// Same attempt as `other` (both carry the same epoch)
    pub fn same_epoch(&self, other: &AssetRecord) -> bool {
        matches!((&self.epoch, &other.epoch), (Some(a), Some(b)) if a == b)
    }
}
