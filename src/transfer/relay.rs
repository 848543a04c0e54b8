//! Relay (broker) seam
//!
//! The relay delivers a forward call to the destination service and later
//! invokes exactly one of the two callbacks on this ledger. From the
//! coordinator's point of view an emission is synchronous: it is either
//! accepted or rejected, nothing more.
//!
//! # Argument encoding
//!
//! The broker and the remote runtime expect Go-style `[][]byte` JSON, i.e.
//! a JSON array of standard base64 strings:
//!
//! - forward args: `[b64(typeTag), b64(json([arg, ...]))]`
//! - callback/rollback args: `[b64(arg), ...]`

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;
use tracing::info;

use crate::config::RelayConfig;

use super::error::TransferError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    #[error("invoke broker chaincode: {status} - {message}")]
    Rejected { status: i32, message: String },

    #[error("broker unavailable: {0}")]
    Unavailable(String),
}

impl From<RelayError> for TransferError {
    fn from(e: RelayError) -> Self {
        TransferError::Relay(e.to_string())
    }
}

/// One interchain event handed to the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterchainEvent {
    pub dest_service: String,
    pub func: String,
    pub args: String,
    pub callback_func: String,
    pub callback_args: String,
    pub rollback_func: String,
    pub rollback_args: String,
    /// Always false: completion is reported through the callbacks
    pub is_sync: bool,
}

impl InterchainEvent {
    /// Positional arguments of the broker's emission entry point
    pub fn broker_args(&self, emit_func: &str) -> Vec<String> {
        vec![
            emit_func.to_string(),
            self.dest_service.clone(),
            self.func.clone(),
            self.args.clone(),
            self.callback_func.clone(),
            self.callback_args.clone(),
            self.rollback_func.clone(),
            self.rollback_args.clone(),
            self.is_sync.to_string(),
        ]
    }
}

/// `[b64(typeTag), b64(json(args))]`
pub fn encode_typed_args(type_tag: &str, args: &[String]) -> Result<String, TransferError> {
    let call_args = serde_json::to_string(args)?;
    let parts = [STANDARD.encode(type_tag), STANDARD.encode(call_args)];
    Ok(serde_json::to_string(&parts)?)
}

/// `[b64(arg), ...]`
pub fn encode_callback_args(args: &[&str]) -> Result<String, TransferError> {
    let parts: Vec<String> = args.iter().map(|a| STANDARD.encode(a)).collect();
    Ok(serde_json::to_string(&parts)?)
}

fn decode_parts(encoded: &str) -> Result<Vec<String>, TransferError> {
    let parts: Vec<String> = serde_json::from_str(encoded)?;
    parts
        .iter()
        .map(|part| {
            let bytes = STANDARD
                .decode(part)
                .map_err(|e| TransferError::Codec(e.to_string()))?;
            String::from_utf8(bytes).map_err(|e| TransferError::Codec(e.to_string()))
        })
        .collect()
}

/// Inverse of [`encode_typed_args`]: `(typeTag, argsJson)` as the broker
/// passes them to the destination function.
pub fn decode_typed_args(encoded: &str) -> Result<(String, String), TransferError> {
    let mut parts = decode_parts(encoded)?;
    if parts.len() != 2 {
        return Err(TransferError::Codec(format!(
            "expected type tag and args, got {} parts",
            parts.len()
        )));
    }
    let args_json = parts.pop().unwrap_or_default();
    let type_tag = parts.pop().unwrap_or_default();
    Ok((type_tag, args_json))
}

/// Inverse of [`encode_callback_args`]
pub fn decode_callback_args(encoded: &str) -> Result<Vec<String>, TransferError> {
    decode_parts(encoded)
}

/// Parse the JSON string array the broker delivers to a destination function
pub fn parse_call_args(args_json: &str) -> Result<Vec<String>, TransferError> {
    serde_json::from_str(args_json)
        .map_err(|e| TransferError::InvalidArgument(format!("call args: {e}")))
}

/// Relay seam used by the coordinators
#[async_trait]
pub trait Relay: Send + Sync {
    /// Relay name for logging
    fn name(&self) -> &'static str;

    /// Hand an event to the broker. `Ok` means accepted for delivery only.
    async fn emit_interchain_event(&self, event: &InterchainEvent) -> Result<(), RelayError>;

    /// Register this contract with the broker under `service_id`
    async fn register(&self, service_id: &str) -> Result<Vec<u8>, RelayError>;
}

/// Relay that accepts every emission and logs the broker invocation.
///
/// Used by the standalone binary where no broker is attached.
pub struct LoggingRelay {
    config: RelayConfig,
}

impl LoggingRelay {
    pub fn new(config: RelayConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Relay for LoggingRelay {
    fn name(&self) -> &'static str {
        "logging"
    }

    async fn emit_interchain_event(&self, event: &InterchainEvent) -> Result<(), RelayError> {
        let args = event.broker_args(&self.config.emit_func);
        info!(
            broker = %self.config.broker_contract,
            channel = %self.config.channel_id,
            dest = %event.dest_service,
            func = %event.func,
            args = ?args,
            "Interchain event emitted"
        );
        Ok(())
    }

    async fn register(&self, service_id: &str) -> Result<Vec<u8>, RelayError> {
        info!(
            broker = %self.config.broker_contract,
            channel = %self.config.channel_id,
            func = %self.config.register_func,
            service_id = %service_id,
            "Register requested"
        );
        Ok(Vec::new())
    }
}


#[cfg(test)]
pub use mock::MockRelay;
