//! Interchain Transfer - cross-chain asset transfer coordination
//!
//! Records an asset on a local ledger, hands its transfer to a remote chain
//! through a relay, and reconciles the outcome (receipt or rollback) so the
//! asset is never forwarded twice, edited mid-flight, or lost on failure.
//!
//! # Modules
//!
//! - [`ledger`] - Key/value state access with optimistic per-invocation commit
//! - [`transfer`] - Transfer state machine, relay seam and balance variant
//! - [`contract`] - Function-name dispatch and invocation responses
//! - [`config`] - YAML configuration
//! - [`logging`] - tracing subscriber setup

pub mod config;
pub mod contract;
pub mod ledger;
pub mod logging;
pub mod transfer;

// Convenient re-exports at crate root
pub use config::{AppConfig, ContractConfig, RelayConfig};
pub use contract::{Contract, Function, Response};
pub use ledger::{LedgerError, LedgerTx, MemoryLedger, StateStore};
pub use transfer::{
    AssetRecord, BalanceLedger, CallbackOutcome, CrossChainStatus, InterchainEvent, LoggingRelay,
    Relay, RelayError, TransferCoordinator, TransferError, TransferKey,
};
