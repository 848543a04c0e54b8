//! Cross-Chain Transfer FSM
//!
//! Moves an asset (a document, or an account balance) from this ledger to a
//! remote chain through a relay, and converges the outcome back onto this
//! ledger once the relay reports success or failure.
//!
//! # Architecture
//!
//! Every operation runs inside one ledger invocation ([`crate::ledger::LedgerTx`]).
//! Nothing here locks: two invocations touching the same key are serialised
//! by the ledger's optimistic commit, and `frozen` only guards against a
//! sequential double-forward.
//!
//! - [`TransferCoordinator`]: issue, forward, success callback
//! - [`RollbackCoordinator`]: failure callback and bounce-back release
//! - [`ReceiptHandler`]: assets pushed from the counterpart
//! - [`BalanceLedger`]: account-balance variant of the same protocol
//!
//! # State Machine
//!
//! ```text
//! sending side
//!
//!   ∅ ──issue──▶ ON_CHAIN ──forward──▶ FORWARD ──ack──▶ RECEIPT_RECEIVED
//!                  ▲   │                 │
//!                  │  issue              └──rollback──▶ ROLLBACK
//!                  │                                      │  │
//!                  └─────────────issue────────────────────┘  │
//!                                 FORWARD ◀──forward─────────┘
//!
//! receiving side
//!
//!   ∅ ──receive──▶ RECEIPT_SENT ──receive──▶ RECEIPT_SENT
//! ```
//!
//! # Safety Invariants
//!
//! 1. **Emit-Before-Persist**: `forward` and `cross_transfer` write nothing
//!    unless the relay accepted the event
//! 2. **One Attempt In Flight**: a frozen asset is never forwarded or edited
//! 3. **Idempotent Callbacks**: every relay-invoked entry point tolerates
//!    redelivery; callbacks for an earlier epoch are ignored
//! 4. **No Clobbering**: an inbound record never overwrites a local asset

pub mod balance;
pub mod coordinator;
pub mod error;
pub mod receipt;
pub mod relay;
pub mod rollback;
pub mod status;
pub mod store;
pub mod types;

#[cfg(test)]
mod integration_tests;

// Re-exports for convenience
pub use balance::{BalanceLedger, ChargeRequest, RefundRequest};
pub use coordinator::TransferCoordinator;
pub use error::{ErrorKind, TransferError};
pub use receipt::ReceiptHandler;
pub use relay::{InterchainEvent, LoggingRelay, Relay, RelayError};
pub use rollback::RollbackCoordinator;
pub use status::CrossChainStatus;
pub use store::{AssetStore, StatusTracker};
pub use types::{AssetRecord, CallbackOutcome, EpochGenerator, TransferEpoch, TransferKey};
