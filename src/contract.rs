//! Contract Invocation Surface
//!
//! Function-name dispatch over the transfer core. One call to
//! [`Contract::invoke`] is one ledger invocation: every write it stages is
//! committed on success and discarded on error.
//!
//! Arguments and results are plain strings, as exchanged with clients and
//! the relay.

use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::ContractConfig;
use crate::ledger::{MemoryLedger, StateStore};
use crate::transfer::balance::{BalanceLedger, ChargeRequest, RefundRequest, parse_amount};
use crate::transfer::coordinator::TransferCoordinator;
use crate::transfer::error::{ErrorKind, TransferError};
use crate::transfer::receipt::ReceiptHandler;
use crate::transfer::relay::{Relay, parse_call_args};
use crate::transfer::rollback::RollbackCoordinator;
use crate::transfer::status::CrossChainStatus;
use crate::transfer::types::{AssetRecord, TransferKey};

// ============================================================================
// Functions
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    Register,
    Issue,
    Query,
    QueryStatus,
    Forward,
    Rollback,
    Ack,
    Receive,
    GetBalance,
    SetBalance,
    LocalTransfer,
    CrossTransfer,
    Charge,
    RollbackCharge,
}

impl Function {
    /// Resolve an invoked function name.
    ///
    /// The relay-facing names from `config` win, then the logical names,
    /// then the names used by earlier deployments of this contract.
    pub fn resolve(name: &str, config: &ContractConfig) -> Option<Self> {
        if name == config.forward_func {
            return Some(Function::Receive);
        }
        if name == config.callback_func {
            return Some(Function::Ack);
        }
        if name == config.rollback_func {
            return Some(Function::Rollback);
        }
        if name == config.charge_func {
            return Some(Function::Charge);
        }
        if name == config.charge_rollback_func {
            return Some(Function::RollbackCharge);
        }

        match name {
            "register" => Some(Function::Register),
            "issue" | "issueLadingBillCrossParams" => Some(Function::Issue),
            "query" | "queryLadingBillCrossParams" => Some(Function::Query),
            "queryStatus" | "queryCrossChainStatus" => Some(Function::QueryStatus),
            "forward" | "transferLadingBillCrossParams" => Some(Function::Forward),
            "rollback" | "transferLadingBillCrossParamsRollback" => Some(Function::Rollback),
            "ack" | "transferLadingBillCrossParamsCallBack" => Some(Function::Ack),
            "receive" | "ladingBillCrossChainCall" => Some(Function::Receive),
            "getBalance" => Some(Function::GetBalance),
            "setBalance" => Some(Function::SetBalance),
            "localTransfer" | "transfer" => Some(Function::LocalTransfer),
            "crossTransfer" => Some(Function::CrossTransfer),
            "charge" | "interchainCharge" => Some(Function::Charge),
            "rollbackCharge" | "interchainRollback" => Some(Function::RollbackCharge),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Function::Register => "register",
            Function::Issue => "issue",
            Function::Query => "query",
            Function::QueryStatus => "queryStatus",
            Function::Forward => "forward",
            Function::Rollback => "rollback",
            Function::Ack => "ack",
            Function::Receive => "receive",
            Function::GetBalance => "getBalance",
            Function::SetBalance => "setBalance",
            Function::LocalTransfer => "localTransfer",
            Function::CrossTransfer => "crossTransfer",
            Function::Charge => "charge",
            Function::RollbackCharge => "rollbackCharge",
        }
    }

    /// Accepted argument counts
    fn arity(&self) -> RangeInclusive<usize> {
        match self {
            Function::Register
            | Function::Issue
            | Function::Query
            | Function::QueryStatus
            | Function::GetBalance => 1..=1,
            // [key] or [key, epochId]
            Function::Rollback | Function::Ack => 1..=2,
            Function::Forward
            | Function::Receive
            | Function::SetBalance
            | Function::RollbackCharge => 2..=2,
            Function::LocalTransfer | Function::Charge => 3..=3,
            Function::CrossTransfer => 4..=4,
        }
    }

    fn check_args(&self, args: &[String]) -> Result<(), TransferError> {
        let arity = self.arity();
        if arity.contains(&args.len()) {
            return Ok(());
        }
        let expected = if arity.start() == arity.end() {
            arity.start().to_string()
        } else {
            format!("{} or {}", arity.start(), arity.end())
        };
        Err(TransferError::ArgumentCount {
            function: self.as_str().to_string(),
            expected,
            got: args.len(),
        })
    }
}

// ============================================================================
// Response
// ============================================================================

/// Outcome of one invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub status: i32,
    #[serde(default)]
    pub payload: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl Response {
    pub const OK: i32 = 200;
    pub const ERROR: i32 = 500;

    pub fn success(payload: impl Into<String>) -> Self {
        Self {
            status: Self::OK,
            payload: payload.into(),
            message: String::new(),
            code: None,
        }
    }

    pub fn error(err: &TransferError) -> Self {
        Self {
            status: Self::ERROR,
            payload: String::new(),
            message: format!("[{}] {}", err.code(), err),
            code: Some(err.code().to_string()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == Self::OK
    }
}

// ============================================================================
// Contract
// ============================================================================

pub struct Contract {
    config: ContractConfig,
    coordinator: TransferCoordinator,
    rollbacks: RollbackCoordinator,
    receipts: ReceiptHandler,
    balances: BalanceLedger,
}

impl Contract {
    pub fn new(config: ContractConfig, relay: Arc<dyn Relay>) -> Self {
        Self {
            coordinator: TransferCoordinator::new(relay.clone(), config.clone()),
            rollbacks: RollbackCoordinator::new(),
            receipts: ReceiptHandler::new(),
            balances: BalanceLedger::new(relay, config.clone()),
            config,
        }
    }

    /// Run one invocation against `ledger`.
    ///
    /// Errors never leave partial writes behind. A commit that loses an
    /// optimistic-concurrency race is reported as `LEDGER_CONFLICT`.
    pub async fn invoke(&self, ledger: &MemoryLedger, function: &str, args: &[String]) -> Response {
        debug!(function = %function, args = args.len(), "Invoke");

        let mut tx = ledger.begin();
        let result = self.dispatch(&mut tx, function, args).await;

        match result {
            Ok(payload) => match tx.commit() {
                Ok(written) => {
                    debug!(function = %function, written = written, "Committed");
                    Response::success(payload)
                }
                Err(e) => {
                    let err = TransferError::from(e);
                    warn!(function = %function, error = %err, "Commit rejected");
                    Response::error(&err)
                }
            },
            Err(err) => {
                // tx dropped here: staged writes discarded
                match err.kind() {
                    ErrorKind::Internal | ErrorKind::DownstreamFailure => {
                        error!(function = %function, code = err.code(), error = %err, "Invocation failed")
                    }
                    _ => {
                        warn!(function = %function, code = err.code(), error = %err, "Invocation rejected")
                    }
                }
                Response::error(&err)
            }
        }
    }

    async fn dispatch<S: StateStore + Send + ?Sized>(
        &self,
        stub: &mut S,
        name: &str,
        args: &[String],
    ) -> Result<String, TransferError> {
        let function = Function::resolve(name, &self.config).ok_or_else(|| {
            TransferError::UnknownFunction(format!("{}, args: {}", name, args.join(",")))
        })?;
        function.check_args(args)?;

        match function {
            Function::Register => {
                let response = self.coordinator.register(&args[0]).await?;
                Ok(String::from_utf8_lossy(&response).into_owned())
            }
            Function::Issue => {
                let record = AssetRecord::from_json(&args[0])
                    .map_err(|e| TransferError::InvalidArgument(format!("asset record: {e}")))?;
                let key = self.coordinator.issue(stub, record)?;
                Ok(key.to_string())
            }
            Function::Query => {
                let key = TransferKey::new(args[0].as_str())?;
                match self.coordinator.query(stub, &key)? {
                    Some(record) => record.to_json(),
                    None => Ok(TransferError::AssetNotFound(key.to_string()).to_string()),
                }
            }
            Function::QueryStatus => {
                let key = TransferKey::new(args[0].as_str())?;
                let status = self.coordinator.query_status(stub, &key)?;
                Ok(CrossChainStatus::label(status).to_string())
            }
            Function::Forward => {
                let key = TransferKey::new(args[1].as_str())?;
                self.coordinator.forward(stub, &args[0], &key).await?;
                Ok(String::new())
            }
            Function::Rollback => {
                let key = TransferKey::new(args[0].as_str())?;
                let outcome = self.rollbacks.rollback(stub, &key, epoch_arg(args))?;
                debug!(key = %key, outcome = %outcome, "Rollback callback handled");
                Ok(String::new())
            }
            Function::Ack => {
                let key = TransferKey::new(args[0].as_str())?;
                let outcome = self.coordinator.ack(stub, &key, epoch_arg(args))?;
                debug!(key = %key, outcome = %outcome, "Ack callback handled");
                Ok(String::new())
            }
            Function::Receive => {
                let call_args = typed_call_args(&args[0], &args[1])?;
                let record_json = call_args.first().ok_or_else(|| {
                    TransferError::InvalidArgument("receive expects a record argument".to_string())
                })?;
                let record = AssetRecord::from_json(record_json)
                    .map_err(|e| TransferError::InvalidArgument(format!("asset record: {e}")))?;
                let outcome = self.receipts.receive(stub, record)?;
                debug!(outcome = %outcome, "Receive handled");
                Ok(String::new())
            }
            Function::GetBalance => {
                let balance = self.balances.get_balance(stub, &args[0])?;
                Ok(balance.to_string())
            }
            Function::SetBalance => {
                let amount = parse_amount(&args[1])?;
                self.balances.set_balance(stub, &args[0], amount)?;
                info!(account = %args[0], amount = amount, "Balance set");
                Ok(String::new())
            }
            Function::LocalTransfer => {
                let amount = parse_amount(&args[2])?;
                self.balances
                    .local_transfer(stub, &args[0], &args[1], amount)?;
                Ok(String::new())
            }
            Function::CrossTransfer => {
                let amount = parse_amount(&args[3])?;
                self.balances
                    .cross_transfer(stub, &args[0], &args[1], &args[2], amount)
                    .await?;
                Ok(String::new())
            }
            Function::Charge => {
                let call_args = typed_call_args(&args[0], &args[1])?;
                let request = ChargeRequest::from_args(&call_args)?;
                let is_rollback = parse_flag(&args[2])?;
                let outcome = self.balances.charge(stub, &request, is_rollback)?;
                debug!(outcome = %outcome, is_rollback = is_rollback, "Charge handled");
                Ok(String::new())
            }
            Function::RollbackCharge => {
                let call_args = typed_call_args(&args[0], &args[1])?;
                let request = RefundRequest::from_args(&call_args)?;
                let outcome = self.balances.rollback_charge(stub, &request)?;
                debug!(outcome = %outcome, "Refund handled");
                Ok(String::new())
            }
        }
    }
}

// ============================================================================
// Argument Helpers
// ============================================================================

/// Optional epoch id of a relay callback; empty means absent
fn epoch_arg(args: &[String]) -> Option<&str> {
    args.get(1).map(String::as_str).filter(|epoch| !epoch.is_empty())
}

/// `[typeTag, argsJson]` as delivered by the relay. The tag only describes
/// the argument list for the remote runtime.
fn typed_call_args(type_tag: &str, args_json: &str) -> Result<Vec<String>, TransferError> {
    debug!(type_tag = %type_tag, "Typed call args");
    parse_call_args(args_json)
}

fn parse_flag(arg: &str) -> Result<bool, TransferError> {
    match arg.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(TransferError::InvalidArgument(format!(
            "expected true or false, got {other}"
        ))),
    }
}
