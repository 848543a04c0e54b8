//! Interchain Transfer - standalone contract host
//!
//! Runs the contract against an in-memory ledger. Each stdin line is one
//! invocation; each stdout line is its response.
//!
//! ```text
//! ┌──────────┐    ┌──────────┐    ┌──────────┐    ┌──────────┐
//! │  stdin   │───▶│ Contract │───▶│  Ledger  │    │  stdout  │
//! │ (JSONL)  │    │(dispatch)│───▶│  Relay   │───▶│ (JSONL)  │
//! └──────────┘    └──────────┘    └──────────┘    └──────────┘
//! ```
//!
//! Request line: `{"function": "issue", "args": ["{...}"]}`

use anyhow::Context;
use serde::Deserialize;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use interchain_transfer::config::AppConfig;
use interchain_transfer::contract::{Contract, Response};
use interchain_transfer::ledger::MemoryLedger;
use interchain_transfer::transfer::{LoggingRelay, TransferError};

#[derive(Debug, Deserialize)]
struct InvocationRequest {
    function: String,
    #[serde(default)]
    args: Vec<String>,
}

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let app_config = AppConfig::load(&env)?;
    let _log_guard = interchain_transfer::logging::init_logging(&app_config);

    tracing::info!(
        env = %env,
        broker = %app_config.relay.broker_contract,
        channel = %app_config.relay.channel_id,
        "Starting interchain transfer contract"
    );

    let relay = Arc::new(LoggingRelay::new(app_config.relay.clone()));
    let contract = Contract::new(app_config.contract.clone(), relay);
    let ledger = MemoryLedger::new();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut invocations = 0u64;

    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<InvocationRequest>(line) {
            Ok(request) => {
                invocations += 1;
                contract
                    .invoke(&ledger, &request.function, &request.args)
                    .await
            }
            Err(e) => Response::error(&TransferError::InvalidArgument(format!(
                "invocation request: {e}"
            ))),
        };

        let mut out = serde_json::to_vec(&response)?;
        out.push(b'\n');
        stdout.write_all(&out).await?;
        stdout.flush().await?;
    }

    tracing::info!(
        invocations = invocations,
        keys = ledger.len(),
        "stdin closed, shutting down"
    );
    Ok(())
}
