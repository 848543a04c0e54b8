//! Cross-Chain Status Definitions
//!
//! Labels are the exact strings reported by `queryStatus`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Label reported for a key that has no status
pub const NOT_FOUND_LABEL: &str = "not found";

/// Cross-chain status of a transfer key
///
/// Sending side:
///
/// ```text
/// OnChain --issue--> OnChain
/// OnChain --forward--> Forwarded --ack--> ReceiptReceived
///                          |
///                          +--rollback--> Rollback --forward--> Forwarded
///                                             |
///                                             +--issue--> OnChain
/// ```
///
/// Receiving side: (none) --receive--> ReceiptSent --receive--> ReceiptSent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CrossChainStatus {
    /// Issued or edited locally, not in flight
    #[serde(rename = "on chain")]
    OnChain = 1,

    /// Handed to the relay, waiting for ack or rollback
    #[serde(rename = "forward")]
    Forwarded = 2,

    /// Remote side rejected or never received the transfer
    #[serde(rename = "rollback")]
    Rollback = 3,

    /// Remote side confirmed; the local record is spent
    #[serde(rename = "receipt received")]
    ReceiptReceived = 4,

    /// Record was pushed to us by the counterpart
    #[serde(rename = "receipt sent")]
    ReceiptSent = 5,
}

impl CrossChainStatus {
    pub fn id(&self) -> u8 {
        *self as u8
    }

    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(CrossChainStatus::OnChain),
            2 => Some(CrossChainStatus::Forwarded),
            3 => Some(CrossChainStatus::Rollback),
            4 => Some(CrossChainStatus::ReceiptReceived),
            5 => Some(CrossChainStatus::ReceiptSent),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CrossChainStatus::OnChain => "on chain",
            CrossChainStatus::Forwarded => "forward",
            CrossChainStatus::Rollback => "rollback",
            CrossChainStatus::ReceiptReceived => "receipt received",
            CrossChainStatus::ReceiptSent => "receipt sent",
        }
    }

    /// Label for an optional status, `not found` when absent
    pub fn label(status: Option<Self>) -> &'static str {
        status.map_or(NOT_FOUND_LABEL, |s| s.as_str())
    }

    /// The asset content may not be edited by a local issue
    #[inline]
    pub fn is_locked_for_issue(&self) -> bool {
        matches!(
            self,
            CrossChainStatus::ReceiptReceived | CrossChainStatus::ReceiptSent
        )
    }

    /// Whether `from -> to` is an allowed transition.
    ///
    /// `from == None` means the key has no status yet. Self-transitions are
    /// allowed only where a redelivery or re-issue is legitimate.
    pub fn can_transition(from: Option<Self>, to: Self) -> bool {
        use CrossChainStatus::*;

        match (from, to) {
            (None, OnChain) | (None, ReceiptSent) => true,
            (Some(OnChain), OnChain) | (Some(OnChain), Forwarded) => true,
            (Some(Rollback), OnChain) | (Some(Rollback), Forwarded) => true,
            (Some(Forwarded), Rollback) | (Some(Forwarded), ReceiptReceived) => true,
            (Some(Rollback), Rollback) => true,
            (Some(ReceiptReceived), ReceiptReceived) => true,
            (Some(ReceiptSent), ReceiptSent) => true,
            _ => false,
        }
    }
}

impl fmt::Display for CrossChainStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<u8> for CrossChainStatus {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        CrossChainStatus::from_id(value).ok_or(())
    }
}
