//! Node façade
//!
//! A [`Node`] owns one ledger and its peer set behind a single
//! `tokio::sync::RwLock`. Every mutating operation takes the write lock, so
//! submissions, mining, peer registration and chain replacement are applied
//! one at a time. Queries take the read lock.

use crate::blockchain::{now_timestamp, Block, Blockchain, PendingReport};
use crate::config::Config;
use crate::consensus::{collect_candidates, select_longest_chain};
use crate::crypto::content_hash;
use crate::error::ChainError;
use crate::miner::proof_of_work;
use crate::network::{ChainFetcher, HttpChainFetcher, Peer, PeerSet};
use crate::persistence::Persistence;
use crate::transaction::{Transaction, TransactionRequest};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

struct NodeState {
    chain: Blockchain,
    peers: PeerSet,
}

/// Where an accepted submission will land.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitReceipt {
    pub block_index: u64,
    /// Set for rage reports so the caller can vote on them.
    pub report_id: Option<String>,
}

pub struct Node {
    id: String,
    state: RwLock<NodeState>,
    fetcher: Arc<dyn ChainFetcher>,
}

impl Node {
    /// Opens the ledger stored in `persistence` (or starts a fresh genesis).
    pub fn open(
        id: impl Into<String>,
        persistence: Box<dyn Persistence>,
        fetcher: Arc<dyn ChainFetcher>,
    ) -> Result<Self, ChainError> {
        let id = id.into();
        let chain = Blockchain::open(persistence)?;
        info!(node = %id, height = chain.len(), "Node ready");
        Ok(Self {
            id,
            state: RwLock::new(NodeState {
                chain,
                peers: PeerSet::new(),
            }),
            fetcher,
        })
    }

    /// Builds a node from configuration: backend, node id and peer timeout.
    /// Bootstrap peers are registered but not contacted.
    pub async fn from_config(config: &Config) -> Result<Self, ChainError> {
        let id = config.node_id();
        let persistence = config.open_persistence(&id)?;
        let fetcher = Arc::new(HttpChainFetcher::new(config.peer_timeout()?)?);
        let node = Self::open(id, persistence, fetcher)?;
        if !config.network.bootstrap_peers.is_empty() {
            node.register_peers(&config.network.bootstrap_peers).await?;
        }
        Ok(node)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Validates a request, appends its expanded transactions to the pending
    /// buffer and persists it. Nothing is queued if validation fails.
    pub async fn submit(&self, request: TransactionRequest) -> Result<SubmitReceipt, ChainError> {
        let submission = request.validate()?;
        let transactions = submission.into_transactions(now_timestamp());
        let report_id = transactions
            .iter()
            .find_map(Transaction::report)
            .map(|report| report.report_id);

        let block_index = self.state.write().await.chain.queue_transactions(transactions)?;
        Ok(SubmitReceipt {
            block_index,
            report_id,
        })
    }

    /// Solves the proof-of-work, rewards this node and commits the pending
    /// buffer as a new block. The write lock is held throughout.
    pub async fn mine(&self) -> Result<Block, ChainError> {
        let mut state = self.state.write().await;
        let last_block = state
            .chain
            .last_block()
            .ok_or_else(|| ChainError::InvalidChain("Chain has no blocks".to_string()))?;
        let last_proof = last_block.proof;
        let previous_hash = last_block.hash()?;

        let proof = tokio::task::spawn_blocking(move || proof_of_work(last_proof))
            .await
            .map_err(|e| ChainError::InvalidBlock(format!("Proof-of-work task failed: {}", e)))?;

        state.chain.new_transaction(Transaction::issuance(self.id.clone()));
        let block = state.chain.create_block(proof, Some(previous_hash))?;
        info!(node = %self.id, index = block.index, proof, "Mined block");
        Ok(block)
    }

    pub async fn chain(&self) -> Vec<Block> {
        self.state.read().await.chain.blocks().to_vec()
    }

    pub async fn height(&self) -> usize {
        self.state.read().await.chain.len()
    }

    pub async fn pending_transactions(&self) -> Vec<Transaction> {
        self.state.read().await.chain.pending_transactions().to_vec()
    }

    /// Registers every address or none: one malformed address rejects the
    /// whole batch. Returns the full peer list afterwards.
    pub async fn register_peers<S: AsRef<str>>(
        &self,
        addresses: &[S],
    ) -> Result<Vec<Peer>, ChainError> {
        let parsed = addresses
            .iter()
            .map(|address| Peer::parse(address.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        let mut state = self.state.write().await;
        for peer in parsed {
            let location = peer.to_string();
            if state.peers.insert(peer) {
                info!(node = %self.id, peer = %location, "Registered peer");
            }
        }
        Ok(state.peers.to_vec())
    }

    pub async fn peers(&self) -> Vec<Peer> {
        self.state.read().await.peers.to_vec()
    }

    /// Pulls every peer's chain and adopts the longest valid one if it is
    /// strictly longer than ours. Returns whether the chain was replaced.
    ///
    /// Fetching happens without holding the lock; the comparison against the
    /// local length and the swap happen together under the write lock.
    pub async fn resolve_conflicts(&self) -> Result<bool, ChainError> {
        let peers = self.peers().await;
        if peers.is_empty() {
            return Ok(false);
        }

        let candidates = collect_candidates(self.fetcher.as_ref(), &peers).await;

        let mut state = self.state.write().await;
        let Some(winner) = select_longest_chain(state.chain.len(), candidates) else {
            info!(node = %self.id, "Our chain is authoritative");
            return Ok(false);
        };

        let (from, length) = (winner.peer.to_string(), winner.chain.len());
        state.chain.replace_chain(winner.chain).map_err(|e| {
            warn!(node = %self.id, peer = %from, "Failed to adopt chain: {}", e);
            e
        })?;
        info!(node = %self.id, peer = %from, length, "Adopted longer chain");
        Ok(true)
    }

    pub async fn balance(&self, address: &str) -> i128 {
        self.state.read().await.chain.get_balance(address)
    }

    pub async fn staked_balance(&self, address: &str) -> u64 {
        self.state.read().await.chain.get_staked_balance(address)
    }

    pub async fn pending_reports(&self) -> Vec<(String, PendingReport)> {
        self.state.read().await.chain.pending_reports()
    }

    pub async fn rage_index(&self, content_hash: &str) -> usize {
        self.state.read().await.chain.get_rage_index(content_hash)
    }

    /// Hashes `content` and returns `(content_hash, rage_index)`.
    pub async fn rage_index_for_content(&self, content: &str) -> Result<(String, usize), ChainError> {
        if content.is_empty() {
            return Err(ChainError::InvalidTransaction(
                "content must not be empty".to_string(),
            ));
        }
        let hash = content_hash(content);
        let index = self.rage_index(&hash).await;
        Ok((hash, index))
    }
}
