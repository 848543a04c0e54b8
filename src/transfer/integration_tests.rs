//! Integration Tests for the Cross-Chain Transfer FSM
//!
//! Two in-memory ledgers are linked by replaying the events captured by each
//! side's MockRelay, the way a broker would: deliver the forward call to the
//! destination, then invoke the success or failure callback on the source.

#[cfg(test)]
mod integration_tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use futures::future::join_all;
    use serde_json::json;

    use crate::config::ContractConfig;
    use crate::contract::{Contract, Response};
    use crate::ledger::MemoryLedger;
    use crate::transfer::relay::{
        InterchainEvent, MockRelay, Relay, RelayError, decode_callback_args,
    };

    struct Chain {
        contract: Contract,
        relay: Arc<MockRelay>,
        ledger: MemoryLedger,
    }

    impl Chain {
        fn new() -> Self {
            let relay = Arc::new(MockRelay::new());
            Self {
                contract: Contract::new(ContractConfig::default(), relay.clone()),
                relay,
                ledger: MemoryLedger::new(),
            }
        }

        async fn call(&self, function: &str, args: &[&str]) -> Response {
            let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
            self.contract.invoke(&self.ledger, function, &args).await
        }

        async fn status(&self, key: &str) -> String {
            self.call("queryStatus", &[key]).await.payload
        }

        async fn record(&self, key: &str) -> serde_json::Value {
            let resp = self.call("query", &[key]).await;
            serde_json::from_str(&resp.payload).unwrap()
        }

        async fn balance(&self, account: &str) -> u64 {
            self.call("getBalance", &[account]).await.payload.parse().unwrap()
        }

        fn last_event(&self) -> InterchainEvent {
            self.relay.last_event().unwrap()
        }
    }

    fn bill(key: &str) -> String {
        json!({
            "crossChainID": key,
            "corpHolderOrgCode": "ORG-A",
            "financeReceiverOrgCode": "BANK-B",
            "ladingBillCR": {"ladingBillNumber": key, "goodsDesc": "steel coils"},
            "memo": ""
        })
        .to_string()
    }

    /// Broker side of the destination: invoke the forward function on `to`
    async fn deliver(event: &InterchainEvent, to: &Chain) -> Response {
        let mut args = decode_callback_args(&event.args).unwrap();
        if event.func == ContractConfig::default().charge_func {
            args.push("false".to_string());
        }
        to.contract.invoke(&to.ledger, &event.func, &args).await
    }

    /// Broker side of the source: success callback or failure callback
    async fn settle(event: &InterchainEvent, from: &Chain, delivered: bool) -> Option<Response> {
        let (func, args) = if delivered {
            (&event.callback_func, &event.callback_args)
        } else {
            (&event.rollback_func, &event.rollback_args)
        };
        if func.is_empty() {
            return None;
        }
        let args = decode_callback_args(args).unwrap();
        Some(from.contract.invoke(&from.ledger, func, &args).await)
    }

    /// Deliver and settle in one go, as an uneventful broker would
    async fn relay(event: &InterchainEvent, from: &Chain, to: &Chain) -> Response {
        let delivered = deliver(event, to).await;
        if let Some(callback) = settle(event, from, delivered.is_ok()).await {
            assert!(callback.is_ok(), "callback failed: {callback:?}");
        }
        delivered
    }

    // ========================================================================
    // Document Transfer
    // ========================================================================

    /// issue → forward → ack, and the receiving side's view
    #[tokio::test]
    async fn test_lading_bill_happy_path() {
        let a = Chain::new();
        let b = Chain::new();

        assert_eq!(a.call("issue", &[bill("LB1").as_str()]).await.payload, "LB1");
        assert_eq!(a.status("LB1").await, "on chain");

        assert!(a.call("forward", &["chainB", "LB1"]).await.is_ok());
        assert_eq!(a.status("LB1").await, "forward");

        let delivered = relay(&a.last_event(), &a, &b).await;
        assert!(delivered.is_ok(), "{delivered:?}");

        assert_eq!(a.status("LB1").await, "receipt received");
        assert_eq!(b.status("LB1").await, "receipt sent");
        assert_eq!(
            b.record("LB1").await["ladingBillCR"]["goodsDesc"],
            "steel coils"
        );
        // Received copy is not frozen on the receiving side
        assert!(b.record("LB1").await.get("frozen").is_none());

        let resp = a.call("issue", &[bill("LB1").as_str()]).await;
        assert_eq!(resp.code.as_deref(), Some("ALREADY_FORWARDED"));
        let resp = b.call("issue", &[bill("LB1").as_str()]).await;
        assert_eq!(resp.code.as_deref(), Some("RECEIVED_FROM_PARTNER"));
    }

    #[tokio::test]
    async fn test_double_forward_is_rejected() {
        let a = Chain::new();
        a.call("issue", &[bill("LB1").as_str()]).await;
        assert!(a.call("forward", &["chainB", "LB1"]).await.is_ok());

        for dest in ["chainB", "chainC"] {
            let resp = a.call("forward", &[dest, "LB1"]).await;
            assert_eq!(resp.code.as_deref(), Some("ASSET_FROZEN"));
        }
        assert_eq!(a.relay.emit_count(), 1);

        let resp = a.call("issue", &[bill("LB1").as_str()]).await;
        assert_eq!(resp.code.as_deref(), Some("ASSET_FROZEN"));
    }

    /// Destination refuses to clobber its own LB1; the source rolls back and
    /// may forward again.
    #[tokio::test]
    async fn test_rejected_delivery_rolls_back() {
        let a = Chain::new();
        let b = Chain::new();
        a.call("issue", &[bill("LB1").as_str()]).await;
        b.call("issue", &[bill("LB1").as_str()]).await;

        a.call("forward", &["chainB", "LB1"]).await;
        let delivered = relay(&a.last_event(), &a, &b).await;
        assert_eq!(delivered.code.as_deref(), Some("KEY_ALREADY_EXISTS"));

        assert_eq!(a.status("LB1").await, "rollback");
        assert!(a.record("LB1").await.get("frozen").is_none());
        assert_eq!(b.status("LB1").await, "on chain");

        // rollback redelivered
        let event = a.last_event();
        for _ in 0..2 {
            assert!(settle(&event, &a, false).await.unwrap().is_ok());
            assert_eq!(a.status("LB1").await, "rollback");
        }

        // edit after rollback, then re-attempt
        assert!(a.call("issue", &[bill("LB1").as_str()]).await.is_ok());
        assert!(a.call("forward", &["chainC", "LB1"]).await.is_ok());
        assert_eq!(a.status("LB1").await, "forward");
    }

    /// Callbacks of an earlier attempt must not touch the current one
    #[tokio::test]
    async fn test_stale_callbacks_are_ignored() {
        let a = Chain::new();
        let b = Chain::new();
        a.call("issue", &[bill("LB1").as_str()]).await;
        b.call("issue", &[bill("LB1").as_str()]).await;

        a.call("forward", &["chainB", "LB1"]).await;
        let first = a.last_event();
        relay(&first, &a, &b).await;
        assert_eq!(a.status("LB1").await, "rollback");

        a.call("forward", &["chainC", "LB1"]).await;
        let second = a.last_event();
        assert_ne!(first.callback_args, second.callback_args);

        assert!(settle(&first, &a, false).await.unwrap().is_ok());
        assert!(settle(&first, &a, true).await.unwrap().is_ok());
        assert_eq!(a.status("LB1").await, "forward");
        assert_eq!(a.record("LB1").await["frozen"], true);

        assert!(settle(&second, &a, true).await.unwrap().is_ok());
        assert_eq!(a.status("LB1").await, "receipt received");
    }

    #[tokio::test]
    async fn test_receive_redelivery_is_idempotent() {
        let a = Chain::new();
        let b = Chain::new();
        a.call("issue", &[bill("LB1").as_str()]).await;
        a.call("forward", &["chainB", "LB1"]).await;
        let event = a.last_event();

        assert!(deliver(&event, &b).await.is_ok());
        let version = b.ledger.version("asset/LB1");
        assert!(deliver(&event, &b).await.is_ok());
        assert_eq!(b.ledger.version("asset/LB1"), version);
        assert_eq!(b.status("LB1").await, "receipt sent");
    }

    /// A failed forward whose asset also comes back on the data path
    /// (`originalTransferKey`) converges whichever arrives first.
    #[tokio::test]
    async fn test_bounce_back_converges_in_either_order() {
        for callback_first in [true, false] {
            let a = Chain::new();
            let b = Chain::new();
            a.call("issue", &[bill("LB1").as_str()]).await;
            b.call("issue", &[bill("LB1").as_str()]).await;

            a.call("forward", &["chainB", "LB1"]).await;
            let outbound = a.last_event();
            assert!(!deliver(&outbound, &b).await.is_ok());

            // B hands the bill back under its own key
            let mut returned: serde_json::Value = serde_json::from_str(&bill("LB1-back")).unwrap();
            returned["originalTransferKey"] = json!("LB1");
            assert!(b.call("issue", &[returned.to_string().as_str()]).await.is_ok());
            assert!(b.call("forward", &["chainA", "LB1-back"]).await.is_ok());
            let inbound = b.last_event();

            if callback_first {
                assert!(settle(&outbound, &a, false).await.unwrap().is_ok());
                assert!(relay(&inbound, &b, &a).await.is_ok());
            } else {
                assert!(relay(&inbound, &b, &a).await.is_ok());
                assert!(settle(&outbound, &a, false).await.unwrap().is_ok());
            }

            assert_eq!(a.status("LB1").await, "rollback", "callback_first={callback_first}");
            assert!(a.record("LB1").await.get("frozen").is_none());
            assert_eq!(a.status("LB1-back").await, "receipt sent");
            assert_eq!(b.status("LB1-back").await, "receipt received");

            // and once more, both paths redelivered
            assert!(deliver(&inbound, &a).await.is_ok());
            assert!(settle(&outbound, &a, false).await.unwrap().is_ok());
            assert_eq!(a.status("LB1").await, "rollback");
        }
    }

    /// A bounce-back delivered again after the original went out once more
    /// must leave the new attempt in flight.
    #[tokio::test]
    async fn test_redelivered_bounce_back_keeps_new_attempt_frozen() {
        let a = Chain::new();
        let b = Chain::new();
        a.call("issue", &[bill("LB1").as_str()]).await;
        assert!(a.call("forward", &["chainB", "LB1"]).await.is_ok());
        let first_attempt = a.last_event();
        let first_epoch = a.record("LB1").await["transferEpoch"]["id"].clone();

        let mut returned: serde_json::Value = serde_json::from_str(&bill("LB1-back")).unwrap();
        returned["originalTransferKey"] = json!("LB1");
        returned["originalTransferEpoch"] = first_epoch.clone();
        assert!(b.call("issue", &[returned.to_string().as_str()]).await.is_ok());
        assert!(b.call("forward", &["chainA", "LB1-back"]).await.is_ok());
        let bounce_back = b.last_event();
        assert!(relay(&bounce_back, &b, &a).await.is_ok());
        assert_eq!(a.status("LB1").await, "rollback");

        assert!(a.call("forward", &["chainB", "LB1"]).await.is_ok());
        assert_ne!(a.record("LB1").await["transferEpoch"]["id"], first_epoch);

        // at-least-once delivery of the old bounce-back and the old callback
        assert!(deliver(&bounce_back, &a).await.is_ok());
        assert!(settle(&first_attempt, &a, false).await.unwrap().is_ok());
        assert_eq!(a.status("LB1").await, "forward");
        assert_eq!(a.record("LB1").await["frozen"], json!(true));

        // a different record returning the first attempt is stale as well
        returned["crossChainID"] = json!("LB1-back-2");
        assert!(b.call("issue", &[returned.to_string().as_str()]).await.is_ok());
        assert!(b.call("forward", &["chainA", "LB1-back-2"]).await.is_ok());
        assert!(deliver(&b.last_event(), &a).await.is_ok());
        assert_eq!(a.status("LB1").await, "forward");

        let resp = a.call("forward", &["chainB", "LB1"]).await;
        assert_eq!(resp.code.as_deref(), Some("ASSET_FROZEN"));
        assert_eq!(a.relay.emit_count(), 2);
    }

    // ========================================================================
    // Balance Transfer
    // ========================================================================

    #[tokio::test]
    async fn test_local_transfer_conservation() {
        let a = Chain::new();
        a.call("setBalance", &["alice", "100"]).await;
        a.call("setBalance", &["bob", "20"]).await;

        assert!(a.call("transfer", &["alice", "bob", "30"]).await.is_ok());
        assert_eq!(a.balance("alice").await + a.balance("bob").await, 120);
        assert_eq!(a.balance("bob").await, 50);

        let resp = a.call("localTransfer", &["alice", "bob", "71"]).await;
        assert_eq!(resp.code.as_deref(), Some("INSUFFICIENT_FUNDS"));
        assert_eq!(a.balance("alice").await, 70);
    }

    /// crossTransfer of 10 from alice (100) → 90; charge lands once on the
    /// destination; a refund restores exactly 100.
    #[tokio::test]
    async fn test_cross_transfer_and_refund() {
        let a = Chain::new();
        let b = Chain::new();
        a.call("setBalance", &["alice", "100"]).await;

        let resp = a.call("crossTransfer", &["chainB", "alice", "bob", "10"]).await;
        assert!(resp.is_ok(), "{resp:?}");
        assert!(resp.payload.is_empty());
        assert_eq!(a.balance("alice").await, 90);

        let event = a.last_event();
        assert!(relay(&event, &a, &b).await.is_ok());
        assert!(deliver(&event, &b).await.is_ok());
        assert_eq!(b.balance("bob").await, 10);

        // destination reports failure afterwards; refund is applied once
        for _ in 0..2 {
            assert!(settle(&event, &a, false).await.unwrap().is_ok());
            assert_eq!(a.balance("alice").await, 100);
        }
    }

    #[tokio::test]
    async fn test_cross_transfer_rejected_by_relay() {
        let a = Chain::new();
        a.call("setBalance", &["alice", "100"]).await;
        a.relay.set_fail_emit(true);

        let resp = a.call("crossTransfer", &["chainB", "alice", "bob", "10"]).await;
        assert_eq!(resp.code.as_deref(), Some("RELAY_REJECTED"));
        assert_eq!(a.balance("alice").await, 100);
    }

    #[tokio::test]
    async fn test_legacy_refund_without_transfer_id() {
        let a = Chain::new();
        a.call("setBalance", &["alice", "90"]).await;

        let resp = a
            .call("interchainRollback", &["java.util.List<java.lang.String>", "[\"alice\",\"10\"]"])
            .await;
        assert!(resp.is_ok(), "{resp:?}");
        assert_eq!(a.balance("alice").await, 100);
    }

    // ========================================================================
    // Concurrent Invocations
    // ========================================================================

    /// Yields once before emitting so concurrent invocations interleave
    struct YieldingRelay {
        inner: MockRelay,
    }

    #[async_trait]
    impl Relay for YieldingRelay {
        fn name(&self) -> &'static str {
            "yielding"
        }

        async fn emit_interchain_event(&self, event: &InterchainEvent) -> Result<(), RelayError> {
            tokio::task::yield_now().await;
            self.inner.emit_interchain_event(event).await
        }

        async fn register(&self, service_id: &str) -> Result<Vec<u8>, RelayError> {
            self.inner.register(service_id).await
        }
    }

    fn interleaved_chain() -> (Contract, Arc<YieldingRelay>, MemoryLedger) {
        let relay = Arc::new(YieldingRelay {
            inner: MockRelay::new(),
        });
        let contract = Contract::new(ContractConfig::default(), relay.clone());
        (contract, relay, MemoryLedger::new())
    }

    #[tokio::test]
    async fn test_concurrent_forwards_same_key_one_commits() {
        let (contract, relay, ledger) = interleaved_chain();
        let issue = vec![bill("LB1")];
        assert!(contract.invoke(&ledger, "issue", &issue).await.is_ok());

        let to_b = vec!["chainB".to_string(), "LB1".to_string()];
        let to_c = vec!["chainC".to_string(), "LB1".to_string()];
        let responses = join_all([
            contract.invoke(&ledger, "forward", &to_b),
            contract.invoke(&ledger, "forward", &to_c),
        ])
        .await;

        let committed = responses.iter().filter(|r| r.is_ok()).count();
        assert_eq!(committed, 1, "{responses:?}");
        assert!(
            responses
                .iter()
                .any(|r| r.code.as_deref() == Some("LEDGER_CONFLICT"))
        );

        // Both emissions reached the relay; only one epoch was persisted, so
        // the orphan's callbacks are stale.
        let events = relay.inner.events();
        assert_eq!(events.len(), 2);
        let orphan = if responses[0].is_ok() { &events[1] } else { &events[0] };
        let args = decode_callback_args(&orphan.rollback_args).unwrap();
        assert!(contract.invoke(&ledger, &orphan.rollback_func, &args).await.is_ok());

        let status = contract
            .invoke(&ledger, "queryStatus", &["LB1".to_string()])
            .await;
        assert_eq!(status.payload, "forward");
    }

    #[tokio::test]
    async fn test_concurrent_forwards_distinct_keys_both_commit() {
        let (contract, _, ledger) = interleaved_chain();
        for key in ["LB1", "LB2"] {
            assert!(contract.invoke(&ledger, "issue", &[bill(key)]).await.is_ok());
        }

        let first = vec!["chainB".to_string(), "LB1".to_string()];
        let second = vec!["chainB".to_string(), "LB2".to_string()];
        let responses = join_all([
            contract.invoke(&ledger, "forward", &first),
            contract.invoke(&ledger, "forward", &second),
        ])
        .await;
        assert!(responses.iter().all(Response::is_ok), "{responses:?}");
    }

    #[tokio::test]
    async fn test_concurrent_cross_transfers_debit_once() {
        let (contract, _, ledger) = interleaved_chain();
        let seed = vec!["alice".to_string(), "100".to_string()];
        contract.invoke(&ledger, "setBalance", &seed).await;

        let to_bob = vec![
            "chainB".to_string(),
            "alice".to_string(),
            "bob".to_string(),
            "60".to_string(),
        ];
        let to_carol = vec![
            "chainB".to_string(),
            "alice".to_string(),
            "carol".to_string(),
            "60".to_string(),
        ];
        let responses = join_all([
            contract.invoke(&ledger, "crossTransfer", &to_bob),
            contract.invoke(&ledger, "crossTransfer", &to_carol),
        ])
        .await;
        assert_eq!(responses.iter().filter(|r| r.is_ok()).count(), 1);

        let balance = contract
            .invoke(&ledger, "getBalance", &["alice".to_string()])
            .await;
        assert_eq!(balance.payload, "40");
    }
}
