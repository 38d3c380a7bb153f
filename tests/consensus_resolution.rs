//! Conflict resolution between nodes
//!
//! Peers are served over real HTTP on ephemeral ports where the wire format
//! matters, and through a scripted fetcher where only the selection rule does.

use async_trait::async_trait;
use ragechain::api::build_api_router;
use ragechain::blockchain::{Block, LedgerState};
use ragechain::error::ChainError;
use ragechain::network::{ChainFetcher, ChainResponse, HttpChainFetcher, Peer};
use ragechain::node::Node;
use ragechain::persistence::{InMemoryPersistence, Persistence};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

fn http_node(id: &str) -> Arc<Node> {
    let fetcher = HttpChainFetcher::new(Duration::from_secs(2)).expect("client builds");
    Arc::new(
        Node::open(id, Box::new(InMemoryPersistence::new()), Arc::new(fetcher)).expect("node opens"),
    )
}

async fn serve(node: Arc<Node>) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, build_api_router(node))
            .await
            .expect("server runs");
    });
    addr.to_string()
}

async fn mine_until(node: &Node, height: usize) {
    while node.height().await < height {
        node.mine().await.expect("mined");
    }
}

/// Serves canned responses keyed by peer location.
struct Scripted {
    responses: HashMap<String, ChainResponse>,
}

#[async_trait]
impl ChainFetcher for Scripted {
    async fn fetch_chain(&self, peer: &Peer) -> Result<ChainResponse, ChainError> {
        self.responses
            .get(peer.as_str())
            .cloned()
            .ok_or_else(|| ChainError::NetworkError(format!("{} unreachable", peer)))
    }
}

fn scripted_node(id: &str, responses: Vec<(&str, Vec<Block>)>) -> Node {
    let responses = responses
        .into_iter()
        .map(|(peer, chain)| {
            let response = ChainResponse {
                length: chain.len(),
                chain,
                node_id: None,
            };
            (peer.to_string(), response)
        })
        .collect();
    Node::open(
        id,
        Box::new(InMemoryPersistence::new()),
        Arc::new(Scripted { responses }),
    )
    .expect("node opens")
}

#[tokio::test(flavor = "multi_thread")]
async fn test_adopts_longer_valid_chain_over_http() -> Result<(), Box<dyn std::error::Error>> {
    let node_a = http_node("node-a");
    let node_b = http_node("node-b");
    mine_until(&node_a, 3).await;
    mine_until(&node_b, 5).await;

    let b_addr = serve(node_b.clone()).await;
    node_a.register_peers(&[format!("http://{}", b_addr)]).await?;

    assert!(node_a.resolve_conflicts().await?);
    let adopted = node_a.chain().await;
    assert_eq!(adopted, node_b.chain().await);

    let replayed = LedgerState::replay(&adopted);
    assert_eq!(node_a.balance("node-b").await, replayed.get_balance("node-b"));
    assert_eq!(node_a.balance("node-b").await, 4);
    assert_eq!(node_a.balance("node-a").await, 0);

    // A second pass finds nothing longer.
    assert!(!node_a.resolve_conflicts().await?);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_adopts_chain_carrying_transaction_data_over_http() -> Result<(), Box<dyn std::error::Error>> {
    let node_a = http_node("node-a");
    let node_b = http_node("node-b");

    node_b
        .submit(serde_json::from_value(serde_json::json!({
            "sender": "alice", "recipient": "bob", "amount": 1, "type": "transfer",
            "data": {
                "report_id": "r-look-alike",
                "content_hash": "h",
                "reason_code": "SPAM",
                "timestamp": 1700000000,
                "reporter_address": "alice",
                "stake_amount": 0
            }
        }))?)
        .await?;
    node_b
        .submit(serde_json::from_value(serde_json::json!({
            "sender": "alice", "type": "rage_report",
            "data": {"content": "X", "reason_code": "Y", "stake_amount": 1}
        }))?)
        .await?;
    mine_until(&node_b, 3).await;

    let b_addr = serve(node_b.clone()).await;
    node_a.register_peers(&[b_addr]).await?;

    assert!(node_a.resolve_conflicts().await?);
    assert_eq!(node_a.chain().await, node_b.chain().await);
    assert_eq!(node_a.balance("bob").await, 1);
    assert_eq!(node_a.rage_index("h").await, 0);
    assert_eq!(node_a.staked_balance("alice").await, 1);
    assert_eq!(node_a.pending_reports().await.len(), 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_equal_length_keeps_local_chain() -> Result<(), Box<dyn std::error::Error>> {
    let node_a = http_node("node-a");
    let node_b = http_node("node-b");
    mine_until(&node_a, 3).await;
    mine_until(&node_b, 3).await;
    let before = node_a.chain().await;

    let b_addr = serve(node_b).await;
    node_a.register_peers(&[b_addr]).await?;

    assert!(!node_a.resolve_conflicts().await?);
    assert_eq!(node_a.chain().await, before);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unreachable_peer_is_skipped() -> Result<(), Box<dyn std::error::Error>> {
    let node_a = http_node("node-a");
    let node_b = http_node("node-b");
    mine_until(&node_b, 3).await;
    let b_addr = serve(node_b).await;

    let closed = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        listener.local_addr()?.to_string()
    };
    node_a.register_peers(&[closed, b_addr]).await?;

    assert!(node_a.resolve_conflicts().await?);
    assert_eq!(node_a.height().await, 3);
    Ok(())
}

#[tokio::test]
async fn test_tampered_longer_chain_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let honest = http_node("honest");
    mine_until(&honest, 4).await;
    let mut forged = honest.chain().await;
    forged[2].transactions[0].recipient = "thief".to_string();

    let node = scripted_node("local", vec![("forger:1", forged)]);
    node.mine().await?;
    node.register_peers(&["forger:1"]).await?;

    assert!(!node.resolve_conflicts().await?);
    assert_eq!(node.height().await, 2);
    assert_eq!(node.balance("thief").await, 0);
    Ok(())
}

#[tokio::test]
async fn test_longest_of_several_peers_wins() -> Result<(), Box<dyn std::error::Error>> {
    let short = http_node("short");
    let long = http_node("long");
    mine_until(&short, 3).await;
    mine_until(&long, 4).await;

    let node = scripted_node(
        "local",
        vec![("short:1", short.chain().await), ("long:1", long.chain().await)],
    );
    node.register_peers(&["short:1", "long:1", "missing:1"]).await?;

    assert!(node.resolve_conflicts().await?);
    assert_eq!(node.chain().await, long.chain().await);
    Ok(())
}

#[tokio::test]
async fn test_adoption_keeps_pending_and_persists() -> Result<(), Box<dyn std::error::Error>> {
    let long = http_node("long");
    mine_until(&long, 3).await;

    let store = InMemoryPersistence::new();
    let responses = HashMap::from([(
        "long:1".to_string(),
        ChainResponse {
            length: 3,
            chain: long.chain().await,
            node_id: Some("long".to_string()),
        },
    )]);
    let node = Node::open(
        "local",
        Box::new(store.clone()),
        Arc::new(Scripted { responses }),
    )?;
    node.submit(serde_json::from_value(serde_json::json!({
        "sender": "alice", "recipient": "bob", "amount": 2, "type": "transfer"
    }))?)
    .await?;
    node.register_peers(&["long:1"]).await?;

    assert!(node.resolve_conflicts().await?);
    assert_eq!(node.pending_transactions().await.len(), 1);

    let saved = store.load_snapshot()?.expect("snapshot saved");
    assert_eq!(saved.chain, long.chain().await);
    assert_eq!(saved.pending_transactions.len(), 1);
    Ok(())
}
