//! Transfer Error Types
//!
//! Every error is surfaced synchronously to the caller of the invocation.
//! Nothing is retried internally.

use thiserror::Error;

use crate::ledger::LedgerError;

use super::status::CrossChainStatus;

/// Coarse error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    InsufficientFunds,
    DownstreamFailure,
    Internal,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    // === Validation Errors ===
    #[error("Incorrect number of arguments for {function}: expected {expected}, got {got}")]
    ArgumentCount {
        function: String,
        expected: String,
        got: usize,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("crossChainID can not be empty")]
    EmptyTransferKey,

    #[error("Amount must be a positive integer, got {0}")]
    InvalidAmount(String),

    #[error("Amount would cause overflow")]
    Overflow,

    #[error("Invalid function: {0}")]
    UnknownFunction(String),

    // === Lookup Errors ===
    #[error("crossChainID:{0} not found")]
    AssetNotFound(String),

    // === Conflict Errors ===
    #[error("crossChainID {0} is frozen by an outstanding transfer")]
    AssetFrozen(String),

    #[error("crossChainID {0} has been forwarded and update is not allowed")]
    AlreadyForwarded(String),

    #[error("crossChainID {0} was received from partner and update is not allowed")]
    ReceivedFromPartner(String),

    #[error("crossChainID {0} already exist")]
    KeyAlreadyExists(String),

    #[error("Invalid status transition for {key}: {from} -> {to}")]
    InvalidStateTransition {
        key: String,
        from: String,
        to: CrossChainStatus,
    },

    #[error("Ledger conflict on key {0}")]
    LedgerConflict(String),

    // === Balance Errors ===
    #[error("Insufficient balance in {account}: balance {balance}, required {required}")]
    InsufficientFunds {
        account: String,
        balance: u64,
        required: u64,
    },

    // === Downstream Errors ===
    #[error("Relay rejected request: {0}")]
    Relay(String),

    // === System Errors ===
    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Internal system error: {0}")]
    SystemError(String),
}

impl TransferError {
    /// Error code for invocation responses
    pub fn code(&self) -> &'static str {
        match self {
            TransferError::ArgumentCount { .. } => "ARGUMENT_COUNT",
            TransferError::InvalidArgument(_) => "INVALID_ARGUMENT",
            TransferError::EmptyTransferKey => "EMPTY_TRANSFER_KEY",
            TransferError::InvalidAmount(_) => "INVALID_AMOUNT",
            TransferError::Overflow => "OVERFLOW",
            TransferError::UnknownFunction(_) => "UNKNOWN_FUNCTION",
            TransferError::AssetNotFound(_) => "ASSET_NOT_FOUND",
            TransferError::AssetFrozen(_) => "ASSET_FROZEN",
            TransferError::AlreadyForwarded(_) => "ALREADY_FORWARDED",
            TransferError::ReceivedFromPartner(_) => "RECEIVED_FROM_PARTNER",
            TransferError::KeyAlreadyExists(_) => "KEY_ALREADY_EXISTS",
            TransferError::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            TransferError::LedgerConflict(_) => "LEDGER_CONFLICT",
            TransferError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            TransferError::Relay(_) => "RELAY_REJECTED",
            TransferError::Ledger(_) => "LEDGER_ERROR",
            TransferError::Codec(_) => "CODEC_ERROR",
            TransferError::SystemError(_) => "SYSTEM_ERROR",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            TransferError::ArgumentCount { .. }
            | TransferError::InvalidArgument(_)
            | TransferError::EmptyTransferKey
            | TransferError::InvalidAmount(_)
            | TransferError::Overflow
            | TransferError::UnknownFunction(_)
            | TransferError::Codec(_) => ErrorKind::Validation,
            TransferError::AssetNotFound(_) => ErrorKind::NotFound,
            TransferError::AssetFrozen(_)
            | TransferError::AlreadyForwarded(_)
            | TransferError::ReceivedFromPartner(_)
            | TransferError::KeyAlreadyExists(_)
            | TransferError::InvalidStateTransition { .. }
            | TransferError::LedgerConflict(_) => ErrorKind::Conflict,
            TransferError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            TransferError::Relay(_) => ErrorKind::DownstreamFailure,
            TransferError::Ledger(_) | TransferError::SystemError(_) => ErrorKind::Internal,
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }
}

impl From<LedgerError> for TransferError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::Conflict(key) => TransferError::LedgerConflict(key),
            LedgerError::Unavailable(msg) => TransferError::Ledger(msg),
        }
    }
}

impl From<serde_json::Error> for TransferError {
    fn from(e: serde_json::Error) -> Self {
        TransferError::Codec(e.to_string())
    }
}
