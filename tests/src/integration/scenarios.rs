//! End-to-end scenarios across the store, reducers, sync engine, and
//! publish pipeline.

#[cfg(test)]
mod tests {
    use crate::support::{head, open_node, wait_until, wired_nodes, Actor};
    use serde_json::json;
    use souk_store::keys::encode_rank;
    use souk_sync::PeerEnvelope;
    use souk_types::{content_type, ResourceKind, TokenAmount};
    use std::time::Duration;

    /// Deterministic wallet transfer: mint 1000 to A, transfer 400 with
    /// fee 1 to B. A ends at 599, B at 400, the fee pool at 1 - and a
    /// fresh node fed the same events lands on the same balances.
    #[tokio::test]
    async fn test_deterministic_wallet_transfer() {
        let mut minter = Actor::new(1);
        let mut alice = Actor::new(2);
        let bob = Actor::new(3);

        let mint = minter.event(
            "wallet.mint",
            json!({"to": alice.address, "amount": 1000}),
            1,
            None,
        );
        let transfer = alice.event(
            "wallet.transfer",
            json!({"from": alice.address, "to": bob.address, "amount": 400, "fee": 1}),
            2,
            None,
        );

        let node1 = open_node(&minter);
        let node2 = open_node(&minter);
        for node in [&node1, &node2] {
            node.publish_local(mint.clone(), None).unwrap();
            node.publish_local(transfer.clone(), None).unwrap();
        }

        for node in [&node1, &node2] {
            assert_eq!(node.balance(&alice.address), TokenAmount::from_u64(599));
            assert_eq!(node.balance(&bob.address), TokenAmount::from_u64(400));
            assert_eq!(node.balance("fees"), TokenAmount::from_u64(1));
        }
        assert_eq!(
            node1.with_state(Clone::clone),
            node2.with_state(Clone::clone)
        );
    }

    /// Escrow partial release then refund on expiry: status traverses
    /// pending -> funded -> releasing -> refunded; A nets -100, B +100.
    #[tokio::test]
    async fn test_escrow_partial_release_then_refund_on_expiry() {
        let mut minter = Actor::new(1);
        let mut alice = Actor::new(2);
        let bob = Actor::new(3);
        let node = open_node(&minter);
        let expiry = 1_000_000u64;

        let mint = minter.event(
            "wallet.mint",
            json!({"to": alice.address, "amount": 1000}),
            1,
            None,
        );
        node.publish_local(mint, None).unwrap();
        let balance_before = node.balance(&alice.address);

        let create = alice.event(
            "escrow.create",
            json!({
                "id": "E", "beneficiary": bob.did, "amount": 300,
                "releaseRules": [{"id": "r1"}], "expiresAt": expiry
            }),
            2,
            None,
        );
        node.publish_local(create, None).unwrap();

        let fund = alice.event(
            "escrow.fund",
            json!({"id": "E", "amount": 300}),
            3,
            head(&node, ResourceKind::Escrow, "E"),
        );
        node.publish_local(fund, None).unwrap();

        let release = alice.event(
            "escrow.release",
            json!({"id": "E", "amount": 100, "ruleId": "r1"}),
            4,
            head(&node, ResourceKind::Escrow, "E"),
        );
        node.publish_local(release, None).unwrap();
        assert_eq!(node.escrow("E").unwrap().status.as_str(), "releasing");

        let refund = alice.event(
            "escrow.refund",
            json!({"id": "E", "amount": 200, "reason": "expired"}),
            expiry + 1,
            head(&node, ResourceKind::Escrow, "E"),
        );
        node.publish_local(refund, None).unwrap();

        let escrow = node.escrow("E").unwrap();
        assert_eq!(escrow.status.as_str(), "refunded");
        assert!(escrow.remaining().is_zero());

        // A nets -100, B +100
        assert_eq!(
            balance_before
                .checked_sub(&node.balance(&alice.address))
                .unwrap(),
            TokenAmount::from_u64(100)
        );
        assert_eq!(node.balance(&bob.address), TokenAmount::from_u64(100));
    }

    /// resourcePrev conflict: two signatures race on the same contract
    /// head; the second loses and must chain on the winner.
    #[tokio::test]
    async fn test_resource_prev_conflict_on_publish() {
        let mut client = Actor::new(2);
        let mut provider = Actor::new(3);
        let minter = Actor::new(1);
        let node = open_node(&minter);

        let create = client.event(
            "contract.create",
            json!({"id": "C", "provider": provider.did, "terms": "v1"}),
            1,
            None,
        );
        node.publish_local(create, None).unwrap();
        let h0 = head(&node, ResourceKind::Contract, "C");

        let finalize = client.event(
            "contract.finalize_terms",
            json!({"id": "C", "terms": "v1"}),
            2,
            h0.clone(),
        );
        node.publish_local(finalize, None).unwrap();
        let h1 = head(&node, ResourceKind::Contract, "C");

        // First sign against h1 wins
        let sign1 = client.event("contract.sign", json!({"id": "C"}), 3, h1.clone());
        node.publish_local(sign1, None).unwrap();
        let h2 = head(&node, ResourceKind::Contract, "C");

        // Second signer raced: still cites h1
        let stale = provider.event("contract.sign", json!({"id": "C"}), 3, h1);
        let error = node.publish_local(stale, None).unwrap_err();
        assert_eq!(error.code.as_str(), "RESOURCE_PREV_CONFLICT");

        // Retried against the new head: accepted, contract fully signed
        let retry = provider.event("contract.sign", json!({"id": "C"}), 4, h2);
        node.publish_local(retry, None).unwrap();
        assert_eq!(
            node.contract("C").unwrap().status.as_str(),
            "pending_funding"
        );
    }

    /// Gossip catch-up: N2 pulls N1's log in two range batches and lands
    /// on the same state.
    #[tokio::test]
    async fn test_gossip_catch_up_in_batches() {
        let mut minter = Actor::new(1);
        let alice = Actor::new(2);
        let (nodes, _hub) = wired_nodes(&minter, &["n1", "n2"]).await;

        // N1 builds a 10-event log locally
        for i in 0..10u64 {
            let mint = minter.event(
                "wallet.mint",
                json!({"to": alice.address, "amount": 10}),
                i + 1,
                head(&nodes[0].service, ResourceKind::Wallet, &minter.address),
            );
            nodes[0].service.publish_local(mint, None).unwrap();
        }
        let n1_state = nodes[0].service.with_state(Clone::clone);

        // N2 asks for the first five...
        nodes[1].engine.request_range(None, 5).await.unwrap();
        assert!(
            wait_until(
                || nodes[1].service.serve_range(None, 100, usize::MAX).unwrap().events.len() == 5,
                Duration::from_secs(2)
            )
            .await
        );

        // ...then the rest from the cursor
        nodes[1]
            .engine
            .request_range(Some(encode_rank(5)), 5)
            .await
            .unwrap();
        assert!(
            wait_until(
                || nodes[1].service.with_state(Clone::clone) == n1_state,
                Duration::from_secs(2)
            )
            .await
        );

        for node in &nodes {
            node.engine.stop().await;
        }
    }

    /// A tampered event is dropped on ingest without state change, and the
    /// sending peer's rejection counter increments.
    #[tokio::test]
    async fn test_tampered_event_rejected_on_ingest() {
        let mut minter = Actor::new(1);
        let alice = Actor::new(2);
        let (nodes, hub) = wired_nodes(&minter, &["n1", "n2"]).await;

        let mut event = minter.event(
            "wallet.mint",
            json!({"to": alice.address, "amount": 1000}),
            1,
            None,
        );
        // One byte of payload flipped after signing
        event.payload["amount"] = json!(999_000);

        // n1 gossips the tampered event inside a validly signed peer
        // envelope, straight onto the wire
        let peer_envelope = PeerEnvelope::seal(
            "souk/events/1",
            nodes[0].peer_id.clone(),
            1,
            content_type::EVENT,
            event.to_wire_bytes().unwrap(),
            &souk_crypto::Keypair::from_seed([nodes[0].peer_keypair_seed; 32]),
        )
        .unwrap();
        let wire = souk_sync::InMemoryPeerNetwork::new(hub, "wire-tap");
        use souk_sync::PeerNetwork as _;
        wire.publish("souk/events/1", peer_envelope.encode().unwrap())
            .await
            .unwrap();

        // n2 drops it: counter increments, no state change
        assert!(
            wait_until(
                || nodes[1].engine.scores().score("n1").events_rejected == 1,
                Duration::from_secs(2)
            )
            .await
        );
        assert_eq!(
            nodes[1].service.balance(&alice.address),
            TokenAmount::zero()
        );
        assert!(nodes[1]
            .service
            .serve_range(None, 10, usize::MAX)
            .unwrap()
            .events
            .is_empty());

        for node in &nodes {
            node.engine.stop().await;
        }
    }

    /// Snapshot hand-off: a light node restores a snapshot and replays
    /// only the tail, matching the full-replay node.
    #[tokio::test]
    async fn test_snapshot_hand_off() {
        let mut minter = Actor::new(1);
        let alice = Actor::new(2);
        let full = open_node(&minter);

        for i in 0..20u64 {
            let mint = minter.event(
                "wallet.mint",
                json!({"to": alice.address, "amount": 5}),
                i + 1,
                head(&full, ResourceKind::Wallet, &minter.address),
            );
            full.publish_local(mint, None).unwrap();
        }
        let snapshot = full.snapshot().unwrap();

        for i in 20..25u64 {
            let mint = minter.event(
                "wallet.mint",
                json!({"to": alice.address, "amount": 5}),
                i + 1,
                head(&full, ResourceKind::Wallet, &minter.address),
            );
            full.publish_local(mint, None).unwrap();
        }

        let light = open_node(&minter);
        light
            .restore_snapshot(&snapshot.hash, &snapshot.snapshot)
            .unwrap();

        // Pull the tail from the snapshot's last event hash
        let payload: souk_node::SnapshotPayload =
            serde_json::from_slice(&snapshot.snapshot).unwrap();
        let tail = full
            .serve_range(payload.last_applied.as_deref(), 100, usize::MAX)
            .unwrap();
        assert_eq!(tail.events.len(), 5);
        for bytes in &tail.events {
            light.apply_remote(bytes).unwrap();
        }

        assert_eq!(
            light.with_state(Clone::clone),
            full.with_state(Clone::clone)
        );
        assert_eq!(
            light.balance(&alice.address),
            TokenAmount::from_u64(125)
        );
    }
}
