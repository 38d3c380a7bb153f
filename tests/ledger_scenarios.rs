//! Ledger scenarios driven through the node façade
//!
//! These tests exercise submission, mining, report resolution and snapshot
//! recovery the way an API caller would, without going over HTTP.

use async_trait::async_trait;
use ragechain::blockchain::LedgerState;
use ragechain::error::ChainError;
use ragechain::network::{ChainFetcher, ChainResponse, Peer};
use ragechain::node::Node;
use ragechain::persistence::{InMemoryPersistence, JsonFilePersistence, Persistence};
use ragechain::transaction::{TransactionKind, TransactionRequest, REWARD_ADDRESS};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

struct Offline;

#[async_trait]
impl ChainFetcher for Offline {
    async fn fetch_chain(&self, peer: &Peer) -> Result<ChainResponse, ChainError> {
        Err(ChainError::NetworkError(format!("{} offline", peer)))
    }
}

fn node_with(id: &str, persistence: Box<dyn Persistence>) -> Node {
    Node::open(id, persistence, Arc::new(Offline)).expect("node opens")
}

fn request(value: serde_json::Value) -> TransactionRequest {
    serde_json::from_value(value).expect("well-formed request")
}

async fn submit_report(node: &Node, reporter: &str, stake: u64) -> String {
    let receipt = node
        .submit(request(json!({
            "sender": reporter,
            "type": "rage_report",
            "data": {"content": "X", "reason_code": "Y", "stake_amount": stake}
        })))
        .await
        .expect("report accepted");
    receipt.report_id.expect("report id")
}

async fn vote(node: &Node, voter: &str, report_id: &str, vote_type: &str) {
    node.submit(request(json!({
        "sender": voter,
        "type": "vote_rage_report",
        "data": {"report_id": report_id, "vote_type": vote_type}
    })))
    .await
    .expect("vote accepted");
}

#[tokio::test]
async fn test_end_to_end_report_lifecycle() -> Result<(), Box<dyn std::error::Error>> {
    let node = node_with("miner", Box::new(InMemoryPersistence::new()));

    node.submit(request(json!({
        "sender": "0", "recipient": "N1", "amount": 1, "type": "transfer"
    })))
    .await?;
    let block = node.mine().await?;
    assert_eq!(block.index, 2);
    assert_eq!(block.transactions[0].recipient, "N1");
    assert_eq!(node.balance("N1").await, 1);

    let report_id = submit_report(&node, "N1", 5).await;
    node.mine().await?;
    assert_eq!(node.staked_balance("N1").await, 5);
    let pending = node.pending_reports().await;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].0, report_id);

    vote(&node, "V1", &report_id, "approve").await;
    vote(&node, "V2", &report_id, "approve").await;
    node.mine().await?;
    assert!(node.pending_reports().await.is_empty());

    // The reward rides in the next block.
    let before_reward = node.balance("N1").await;
    let reward_block = node.mine().await?;
    let reward = &reward_block.transactions[0];
    assert_eq!(reward.sender, REWARD_ADDRESS);
    assert_eq!(reward.recipient, "N1");
    assert_eq!(node.balance("N1").await, before_reward + 15);
    Ok(())
}

#[tokio::test]
async fn test_rejected_report_pays_nothing() -> Result<(), Box<dyn std::error::Error>> {
    let node = node_with("miner", Box::new(InMemoryPersistence::new()));
    let report_id = submit_report(&node, "alice", 0).await;
    node.mine().await?;

    vote(&node, "bob", &report_id, "reject").await;
    vote(&node, "carol", &report_id, "reject").await;
    node.mine().await?;
    assert!(node.pending_reports().await.is_empty());

    let next = node.mine().await?;
    assert!(next
        .transactions
        .iter()
        .all(|tx| tx.sender != REWARD_ADDRESS));
    assert_eq!(node.balance("alice").await, 0);
    Ok(())
}

#[tokio::test]
async fn test_vote_in_same_block_as_report_counts() -> Result<(), Box<dyn std::error::Error>> {
    let node = node_with("miner", Box::new(InMemoryPersistence::new()));
    let report_id = submit_report(&node, "alice", 0).await;
    vote(&node, "bob", &report_id, "approve").await;
    vote(&node, "bob", &report_id, "reject").await;
    node.mine().await?;

    let pending = node.pending_reports().await;
    assert_eq!(pending[0].1.tally(), (1, 0));
    Ok(())
}

#[tokio::test]
async fn test_rage_index_tracks_committed_reports() -> Result<(), Box<dyn std::error::Error>> {
    let node = node_with("miner", Box::new(InMemoryPersistence::new()));
    submit_report(&node, "alice", 0).await;
    submit_report(&node, "bob", 2).await;
    assert_eq!(node.rage_index_for_content("X").await?.1, 0);

    node.mine().await?;
    assert_eq!(node.rage_index_for_content("X").await?.1, 2);
    assert_eq!(node.rage_index_for_content("other").await?.1, 0);
    Ok(())
}

#[tokio::test]
async fn test_incremental_state_matches_replay() -> Result<(), Box<dyn std::error::Error>> {
    let node = node_with("miner", Box::new(InMemoryPersistence::new()));
    node.submit(request(json!({
        "sender": "0", "recipient": "alice", "amount": 10, "type": "transfer"
    })))
    .await?;
    node.submit(request(json!({
        "sender": "alice", "recipient": "RAGE_Staking_Pool", "amount": 4, "type": "stake"
    })))
    .await?;
    let report_id = submit_report(&node, "alice", 3).await;
    node.mine().await?;
    vote(&node, "bob", &report_id, "approve").await;
    vote(&node, "carol", &report_id, "approve").await;
    node.submit(request(json!({
        "sender": "alice", "recipient": "RAGE_Staking_Pool", "amount": 100, "type": "unstake"
    })))
    .await?;
    node.mine().await?;
    node.mine().await?;

    let replayed = LedgerState::replay(&node.chain().await);
    assert_eq!(replayed.get_balance("alice"), node.balance("alice").await);
    assert_eq!(replayed.get_staked_balance("alice"), 7);
    assert_eq!(node.staked_balance("alice").await, 7);
    assert!(replayed.pending_rage_reports.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_snapshot_survives_restart() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;

    let (chain, pending_len) = {
        let node = node_with("n1", Box::new(JsonFilePersistence::new(dir.path(), "n1")));
        let report_id = submit_report(&node, "alice", 2).await;
        node.mine().await?;
        vote(&node, "bob", &report_id, "approve").await;
        (node.chain().await, node.pending_transactions().await.len())
    };
    assert_eq!(pending_len, 1);

    let reopened = node_with("n1", Box::new(JsonFilePersistence::new(dir.path(), "n1")));
    assert_eq!(reopened.chain().await, chain);
    let pending = reopened.pending_transactions().await;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].kind, TransactionKind::VoteRageReport);
    assert_eq!(reopened.staked_balance("alice").await, 2);
    assert_eq!(reopened.pending_reports().await.len(), 1);
    Ok(())
}

fn report_shaped_data(timestamp: serde_json::Value) -> serde_json::Value {
    json!({
        "report_id": "r-look-alike",
        "content_hash": "h",
        "reason_code": "SPAM",
        "timestamp": timestamp,
        "reporter_address": "alice",
        "stake_amount": 0
    })
}

#[tokio::test]
async fn test_transfer_data_survives_restart() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;

    let chain = {
        let node = node_with("n1", Box::new(JsonFilePersistence::new(dir.path(), "n1")));
        for timestamp in [json!(1700000000), json!(1700000000.5)] {
            node.submit(request(json!({
                "sender": "alice", "recipient": "bob", "amount": 1, "type": "transfer",
                "data": report_shaped_data(timestamp)
            })))
            .await?;
            node.mine().await?;
        }
        node.submit(request(json!({
            "sender": "alice", "recipient": "carol", "amount": 1, "type": "transfer",
            "data": {"memo": "lunch", "n": 3}
        })))
        .await?;
        assert_eq!(node.rage_index("h").await, 0);
        node.chain().await
    };
    assert_eq!(chain.len(), 3);

    let reopened = node_with("n1", Box::new(JsonFilePersistence::new(dir.path(), "n1")));
    assert_eq!(reopened.height().await, 3);
    assert_eq!(reopened.chain().await, chain);
    assert_eq!(reopened.balance("bob").await, 2);
    assert_eq!(reopened.rage_index("h").await, 0);
    assert!(reopened.pending_reports().await.is_empty());

    let pending = reopened.pending_transactions().await;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].data, Some(json!({"memo": "lunch", "n": 3})));

    reopened.mine().await?;
    assert_eq!(reopened.balance("carol").await, 1);
    Ok(())
}

#[tokio::test]
async fn test_tampered_snapshot_starts_fresh()-> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let store = JsonFilePersistence::new(dir.path(), "n1");
    {
        let node = node_with("n1", Box::new(JsonFilePersistence::new(dir.path(), "n1")));
        node.mine().await?;
        node.mine().await?;
    }

    let mut snapshot = store.load_snapshot()?.expect("snapshot written");
    snapshot.chain[1].transactions[0].amount = 1_000_000;
    store.save_snapshot(&snapshot)?;

    let reopened = node_with("n1", Box::new(JsonFilePersistence::new(dir.path(), "n1")));
    assert_eq!(reopened.height().await, 1);
    assert_eq!(reopened.balance("n1").await, 0);
    Ok(())
}

#[tokio::test]
async fn test_malformed_submissions_rejected() {
    let node = node_with("miner", Box::new(InMemoryPersistence::new()));
    let cases = [
        json!({"sender": "a", "type": "transfer", "amount": 5}),
        json!({"sender": "a", "type": "stake", "recipient": "RAGE_Staking_Pool", "amount": 0}),
        json!({"sender": "a", "type": "rage_report", "data": {"content": "X"}}),
        json!({"sender": "a", "type": "vote_rage_report", "data": {"report_id": "r", "vote_type": "maybe"}}),
        json!({"sender": "a", "type": "airdrop", "recipient": "b", "amount": 1}),
    ];
    for case in cases {
        let err = node.submit(request(case.clone())).await.unwrap_err();
        assert!(err.is_malformed_input(), "{} should be malformed: {}", case, err);
    }
    assert!(node.pending_transactions().await.is_empty());
}
