use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    /// Mirror log lines to stderr; stdout carries invocation responses
    #[serde(default = "default_log_console")]
    pub log_console: bool,
    /// Broker the contract emits interchain events through
    #[serde(default)]
    pub relay: RelayConfig,
    /// Function names and encoding used on the wire
    #[serde(default)]
    pub contract: ContractConfig,
}

fn default_log_console() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct RelayConfig {
    pub broker_contract: String,
    pub channel_id: String,
    pub emit_func: String,
    pub register_func: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            broker_contract: "broker".to_string(),
            channel_id: "mychannel".to_string(),
            emit_func: "EmitInterchainEvent".to_string(),
            register_func: "register".to_string(),
        }
    }
}

/// Names of the functions exchanged with the relay.
///
/// The callback and rollback names must match what this contract dispatches,
/// since the relay calls them back on this ledger.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ContractConfig {
    /// Destination function receiving a forwarded asset
    pub forward_func: String,
    /// Success callback invoked on this ledger
    pub callback_func: String,
    /// Failure callback invoked on this ledger
    pub rollback_func: String,
    /// Destination function crediting a cross-chain balance transfer
    pub charge_func: String,
    /// Rollback function re-crediting the sender here
    pub charge_rollback_func: String,
    /// Type tag required by the remote runtime ahead of the argument list
    pub remote_type_tag: String,
}

impl Default for ContractConfig {
    fn default() -> Self {
        Self {
            forward_func: "ladingBillCrossChainCall".to_string(),
            callback_func: "transferLadingBillCrossParamsCallBack".to_string(),
            rollback_func: "transferLadingBillCrossParamsRollback".to_string(),
            charge_func: "interchainCharge".to_string(),
            charge_rollback_func: "interchainRollback".to_string(),
            remote_type_tag: "java.util.List<java.lang.String>".to_string(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_dir: "./logs".to_string(),
            log_file: "interchain_transfer.log".to_string(),
            use_json: false,
            rotation: "daily".to_string(),
            log_console: true,
            relay: RelayConfig::default(),
            contract: ContractConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn load(env: &str) -> anyhow::Result<Self> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path))?;
        Self::from_yaml(&content).with_context(|| format!("Failed to parse {}", config_path))
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }
}
