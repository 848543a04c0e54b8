//! Balance Ledger
//!
//! Account-balance instantiation of the transfer protocol.
//!
//! - `local_transfer`: debit + credit in one invocation
//! - `cross_transfer`: debit here, ask the relay to credit the receiver on the
//!   destination, with `rollback_charge` as the compensating call
//! - `charge` / `rollback_charge`: relay-invoked sides of a cross transfer
//!
//! Cross transfers carry a transfer id (ULID) as the last argument. The
//! receiving functions apply each id at most once. Deliveries without an id
//! come from senders that predate it and are applied as they arrive.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::ContractConfig;
use crate::ledger::StateStore;

use super::error::TransferError;
use super::relay::{InterchainEvent, Relay, encode_typed_args};
use super::types::CallbackOutcome;

pub const BALANCE_PREFIX: &str = "balance/";
pub const CHARGE_PREFIX: &str = "charge/";
pub const CHARGE_REVERTED_PREFIX: &str = "charge-reverted/";
pub const REFUND_PREFIX: &str = "refund/";

/// Parse an unsigned base-10 amount
pub fn parse_amount(arg: &str) -> Result<u64, TransferError> {
    arg.trim()
        .parse::<u64>()
        .map_err(|_| TransferError::InvalidAmount(arg.to_string()))
}

fn require_account(account: &str) -> Result<(), TransferError> {
    if account.trim().is_empty() {
        return Err(TransferError::InvalidArgument(
            "account can not be empty".to_string(),
        ));
    }
    Ok(())
}

fn require_positive(amount: u64) -> Result<(), TransferError> {
    if amount == 0 {
        return Err(TransferError::InvalidAmount(amount.to_string()));
    }
    Ok(())
}

/// Credit delivered to the destination: `[sender, receiver, amount, transferId?]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeRequest {
    pub sender: String,
    pub receiver: String,
    pub amount: u64,
    pub transfer_id: Option<String>,
}

impl ChargeRequest {
    pub fn from_args(args: &[String]) -> Result<Self, TransferError> {
        match args {
            [sender, receiver, amount] | [sender, receiver, amount, _] => Ok(Self {
                sender: sender.clone(),
                receiver: receiver.clone(),
                amount: parse_amount(amount)?,
                transfer_id: args.get(3).cloned(),
            }),
            _ => Err(TransferError::InvalidArgument(format!(
                "charge expects 3 or 4 call args, got {}",
                args.len()
            ))),
        }
    }
}

/// Refund delivered back to the sender's ledger: `[account, amount, transferId?]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundRequest {
    pub account: String,
    pub amount: u64,
    pub transfer_id: Option<String>,
}

impl RefundRequest {
    pub fn from_args(args: &[String]) -> Result<Self, TransferError> {
        match args {
            [account, amount] | [account, amount, _] => Ok(Self {
                account: account.clone(),
                amount: parse_amount(amount)?,
                transfer_id: args.get(2).cloned(),
            }),
            _ => Err(TransferError::InvalidArgument(format!(
                "rollback expects 2 or 3 call args, got {}",
                args.len()
            ))),
        }
    }
}

pub struct BalanceLedger {
    relay: Arc<dyn Relay>,
    config: ContractConfig,
}

impl BalanceLedger {
    pub fn new(relay: Arc<dyn Relay>, config: ContractConfig) -> Self {
        Self { relay, config }
    }

    fn slot(account: &str) -> String {
        format!("{BALANCE_PREFIX}{account}")
    }

    /// Balance of `account`; an unknown account holds 0
    pub fn get_balance<S: StateStore + ?Sized>(
        &self,
        stub: &mut S,
        account: &str,
    ) -> Result<u64, TransferError> {
        require_account(account)?;
        match stub.get_state(&Self::slot(account))? {
            Some(bytes) => {
                let text = String::from_utf8(bytes)
                    .map_err(|e| TransferError::Codec(e.to_string()))?;
                text.parse::<u64>().map_err(|e| {
                    TransferError::Codec(format!("balance of {account} is corrupt: {e}"))
                })
            }
            None => Ok(0),
        }
    }

    pub fn set_balance<S: StateStore + ?Sized>(
        &self,
        stub: &mut S,
        account: &str,
        amount: u64,
    ) -> Result<(), TransferError> {
        require_account(account)?;
        stub.put_state(&Self::slot(account), amount.to_string().into_bytes())?;
        Ok(())
    }

    fn credit<S: StateStore + ?Sized>(
        &self,
        stub: &mut S,
        account: &str,
        amount: u64,
    ) -> Result<u64, TransferError> {
        let balance = self.get_balance(stub, account)?;
        let updated = balance.checked_add(amount).ok_or(TransferError::Overflow)?;
        self.set_balance(stub, account, updated)?;
        Ok(updated)
    }

    fn debit<S: StateStore + ?Sized>(
        &self,
        stub: &mut S,
        account: &str,
        amount: u64,
    ) -> Result<u64, TransferError> {
        let balance = self.get_balance(stub, account)?;
        if balance < amount {
            return Err(TransferError::InsufficientFunds {
                account: account.to_string(),
                balance,
                required: amount,
            });
        }
        let updated = balance - amount;
        self.set_balance(stub, account, updated)?;
        Ok(updated)
    }

    fn marker_exists<S: StateStore + ?Sized>(
        stub: &mut S,
        slot: &str,
    ) -> Result<bool, TransferError> {
        Ok(stub.get_state(slot)?.is_some())
    }

    /// Move `amount` from `sender` to `receiver` on this ledger
    pub fn local_transfer<S: StateStore + ?Sized>(
        &self,
        stub: &mut S,
        sender: &str,
        receiver: &str,
        amount: u64,
    ) -> Result<(), TransferError> {
        require_account(receiver)?;
        require_positive(amount)?;

        self.debit(stub, sender, amount)?;
        self.credit(stub, receiver, amount)?;

        info!(sender = %sender, receiver = %receiver, amount = amount, "Local transfer");
        Ok(())
    }

    /// Debit `sender` here and emit a charge for `receiver` on `dest_service`.
    ///
    /// The debit is written only after the relay accepted the event. Returns
    /// the transfer id carried by the charge and its rollback.
    pub async fn cross_transfer<S: StateStore + Send + ?Sized>(
        &self,
        stub: &mut S,
        dest_service: &str,
        sender: &str,
        receiver: &str,
        amount: u64,
    ) -> Result<String, TransferError> {
        if dest_service.trim().is_empty() {
            return Err(TransferError::InvalidArgument(
                "destination service can not be empty".to_string(),
            ));
        }
        require_account(receiver)?;
        require_positive(amount)?;

        let balance = self.get_balance(stub, sender)?;
        if balance < amount {
            return Err(TransferError::InsufficientFunds {
                account: sender.to_string(),
                balance,
                required: amount,
            });
        }

        let transfer_id = ulid::Ulid::new().to_string();
        let amount_arg = amount.to_string();
        let tag = &self.config.remote_type_tag;
        let event = InterchainEvent {
            dest_service: dest_service.to_string(),
            func: self.config.charge_func.clone(),
            args: encode_typed_args(
                tag,
                &[
                    sender.to_string(),
                    receiver.to_string(),
                    amount_arg.clone(),
                    transfer_id.clone(),
                ],
            )?,
            callback_func: String::new(),
            callback_args: String::new(),
            rollback_func: self.config.charge_rollback_func.clone(),
            rollback_args: encode_typed_args(
                tag,
                &[sender.to_string(), amount_arg, transfer_id.clone()],
            )?,
            is_sync: false,
        };

        if let Err(e) = self.relay.emit_interchain_event(&event).await {
            error!(
                sender = %sender,
                dest = %dest_service,
                relay = self.relay.name(),
                error = %e,
                "Relay rejected cross transfer, balance untouched"
            );
            return Err(e.into());
        }

        self.set_balance(stub, sender, balance - amount)?;

        info!(
            transfer_id = %transfer_id,
            sender = %sender,
            receiver = %receiver,
            dest = %dest_service,
            amount = amount,
            "Cross transfer emitted"
        );
        Ok(transfer_id)
    }

    /// Destination side of a cross transfer.
    ///
    /// Credits the receiver, or with `is_rollback` reverses an earlier credit.
    pub fn charge<S: StateStore + ?Sized>(
        &self,
        stub: &mut S,
        request: &ChargeRequest,
        is_rollback: bool,
    ) -> Result<CallbackOutcome, TransferError> {
        require_account(&request.receiver)?;

        let Some(id) = request.transfer_id.as_deref() else {
            warn!(
                receiver = %request.receiver,
                is_rollback = is_rollback,
                "Charge without transfer id, applied without dedupe"
            );
            if is_rollback {
                self.debit(stub, &request.receiver, request.amount)?;
            } else {
                self.credit(stub, &request.receiver, request.amount)?;
            }
            return Ok(CallbackOutcome::Applied);
        };

        let applied_slot = format!("{CHARGE_PREFIX}{id}");
        let reverted_slot = format!("{CHARGE_REVERTED_PREFIX}{id}");

        if !is_rollback {
            if Self::marker_exists(stub, &applied_slot)? {
                debug!(transfer_id = %id, "Charge redelivered");
                return Ok(CallbackOutcome::Duplicate);
            }
            if Self::marker_exists(stub, &reverted_slot)? {
                warn!(transfer_id = %id, receiver = %request.receiver, "Charge arrived after its reversal, dropped");
                return Ok(CallbackOutcome::Stale);
            }
            self.credit(stub, &request.receiver, request.amount)?;
            stub.put_state(&applied_slot, request.amount.to_string().into_bytes())?;
            info!(
                transfer_id = %id,
                sender = %request.sender,
                receiver = %request.receiver,
                amount = request.amount,
                "Charge applied"
            );
            return Ok(CallbackOutcome::Applied);
        }

        if Self::marker_exists(stub, &reverted_slot)? {
            debug!(transfer_id = %id, "Charge reversal redelivered");
            return Ok(CallbackOutcome::Duplicate);
        }
        if !Self::marker_exists(stub, &applied_slot)? {
            // Tombstone: the charge itself may still be in flight
            stub.put_state(&reverted_slot, b"0".to_vec())?;
            info!(transfer_id = %id, "Charge reversal ahead of its charge recorded");
            return Ok(CallbackOutcome::Ignored);
        }
        self.debit(stub, &request.receiver, request.amount)?;
        stub.put_state(&reverted_slot, request.amount.to_string().into_bytes())?;
        info!(transfer_id = %id, receiver = %request.receiver, amount = request.amount, "Charge reverted");
        Ok(CallbackOutcome::Applied)
    }

    /// Compensating call on the sender's ledger: re-credit the sender
    pub fn rollback_charge<S: StateStore + ?Sized>(
        &self,
        stub: &mut S,
        request: &RefundRequest,
    ) -> Result<CallbackOutcome, TransferError> {
        require_account(&request.account)?;

        match request.transfer_id.as_deref() {
            Some(id) => {
                let refund_slot = format!("{REFUND_PREFIX}{id}");
                if Self::marker_exists(stub, &refund_slot)? {
                    debug!(transfer_id = %id, "Refund redelivered");
                    return Ok(CallbackOutcome::Duplicate);
                }
                self.credit(stub, &request.account, request.amount)?;
                stub.put_state(&refund_slot, request.amount.to_string().into_bytes())?;
            }
            None => {
                warn!(account = %request.account, "Refund without transfer id, applied without dedupe");
                self.credit(stub, &request.account, request.amount)?;
            }
        }

        info!(
            account = %request.account,
            amount = request.amount,
            transfer_id = ?request.transfer_id,
            "Cross transfer refunded"
        );
        Ok(CallbackOutcome::Applied)
    }
}
