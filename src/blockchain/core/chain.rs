use crate::crypto::hash_canonical;
use crate::error::ChainError;
use crate::persistence::{InMemoryPersistence, Persistence, Snapshot};
use crate::transaction::{Transaction, TransactionKind};
use tracing::{info, warn};

use super::state::{LedgerState, PendingReport};
use super::validation::valid_chain;

/// `previous_hash` of the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str = "1";
/// Proof of the genesis block.
pub const GENESIS_PROOF: u64 = 1;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Block {
    pub index: u64,
    pub timestamp: f64,
    pub transactions: Vec<Transaction>,
    pub proof: u64,
    pub previous_hash: String,
}

impl Block {
    /// Hex SHA-256 over the canonical JSON form of the block.
    pub fn hash(&self) -> Result<String, ChainError> {
        hash_canonical(self)
    }
}

/// Seconds since the Unix epoch with microsecond precision.
pub fn now_timestamp() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// The ledger store: committed blocks, the pending buffer and the state
/// derived from them. Every mutation is persisted before it returns.
pub struct Blockchain {
    blocks: Vec<Block>,
    pending: Vec<Transaction>,
    state: LedgerState,
    persistence: Box<dyn Persistence>,
}

impl Blockchain {
    /// Create a new `Blockchain` using an in-memory persistence backend.
    pub fn new() -> Result<Self, ChainError> {
        Self::new_with_persistence(Box::new(InMemoryPersistence::new()))
    }

    /// Create a fresh chain holding only the genesis block.
    pub fn new_with_persistence(persistence: Box<dyn Persistence>) -> Result<Self, ChainError> {
        let mut blockchain = Blockchain {
            blocks: Vec::new(),
            pending: Vec::new(),
            state: LedgerState::new(),
            persistence,
        };
        blockchain.create_block(GENESIS_PROOF, Some(GENESIS_PREVIOUS_HASH.to_string()))?;
        Ok(blockchain)
    }

    /// Load the chain stored in `persistence`, or start a fresh one when the
    /// stored snapshot is missing, unreadable or invalid.
    pub fn open(persistence: Box<dyn Persistence>) -> Result<Self, ChainError> {
        let snapshot = match persistence.load_snapshot() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Failed to load snapshot: {}. Creating new chain.", e);
                None
            }
        };

        match snapshot {
            Some(snapshot) if !snapshot.chain.is_empty() && valid_chain(&snapshot.chain) => {
                let state = LedgerState::replay(&snapshot.chain);
                info!(
                    "Loaded chain of length {} with {} pending transactions",
                    snapshot.chain.len(),
                    snapshot.pending_transactions.len()
                );
                Ok(Blockchain {
                    blocks: snapshot.chain,
                    pending: snapshot.pending_transactions,
                    state,
                    persistence,
                })
            }
            Some(_) => {
                warn!("Stored chain is empty or invalid. Creating new chain.");
                Self::new_with_persistence(persistence)
            }
            None => {
                info!("No stored chain found. Creating genesis block.");
                Self::new_with_persistence(persistence)
            }
        }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn pending_transactions(&self) -> &[Transaction] {
        &self.pending
    }

    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn last_block(&self) -> Option<&Block> {
        self.blocks.last()
    }

    /// Appends a transaction to the pending buffer and returns the index of
    /// the block it will be committed in.
    pub fn new_transaction(&mut self, tx: Transaction) -> u64 {
        info!("New {} transaction from {} pending", tx.kind, tx.sender);
        self.pending.push(tx);
        self.blocks.len() as u64 + 1
    }

    /// Queues a batch of transactions in order and persists the buffer once.
    pub fn queue_transactions(&mut self, txs: Vec<Transaction>) -> Result<u64, ChainError> {
        let mut index = self.blocks.len() as u64 + 1;
        for tx in txs {
            index = self.new_transaction(tx);
        }
        self.persist()?;
        Ok(index)
    }

    /// Commits the pending buffer as a new block.
    ///
    /// `previous_hash` defaults to the hash of the current last block. The
    /// block's transactions are applied to derived state, and any follow-up
    /// transactions they produce are queued for the next block.
    pub fn create_block(
        &mut self,
        proof: u64,
        previous_hash: Option<String>,
    ) -> Result<Block, ChainError> {
        let previous_hash = match previous_hash {
            Some(hash) => hash,
            None => self
                .last_block()
                .ok_or_else(|| {
                    ChainError::InvalidBlock(
                        "Cannot derive previous hash; the chain is empty.".to_string(),
                    )
                })?
                .hash()?,
        };

        let block = Block {
            index: self.blocks.len() as u64 + 1,
            timestamp: now_timestamp(),
            transactions: std::mem::take(&mut self.pending),
            proof,
            previous_hash,
        };

        let follow_ups = self.state.apply_block(&block);
        self.blocks.push(block.clone());
        self.pending.extend(follow_ups);

        info!(
            "Committed block {} with {} transactions",
            block.index,
            block.transactions.len()
        );

        self.persist()?;
        Ok(block)
    }

    /// Swaps in `chain` and the state replayed from it as one step. The
    /// pending buffer is kept.
    pub fn replace_chain(&mut self, chain: Vec<Block>) -> Result<(), ChainError> {
        if chain.is_empty() || !valid_chain(&chain) {
            return Err(ChainError::InvalidChain(
                "Refusing to adopt an invalid chain".to_string(),
            ));
        }

        let state = LedgerState::replay(&chain);
        self.blocks = chain;
        self.state = state;
        info!("Chain replaced, new length {}", self.blocks.len());

        self.persist()
    }

    pub fn get_balance(&self, address: &str) -> i128 {
        self.state.get_balance(address)
    }

    pub fn get_staked_balance(&self, address: &str) -> u64 {
        self.state.get_staked_balance(address)
    }

    /// Pending reports, ordered by report id.
    pub fn pending_reports(&self) -> Vec<(String, PendingReport)> {
        let mut reports: Vec<_> = self
            .state
            .pending_rage_reports
            .iter()
            .map(|(id, report)| (id.clone(), report.clone()))
            .collect();
        reports.sort_by(|a, b| a.0.cmp(&b.0));
        reports
    }

    /// Number of committed rage reports against `content_hash`.
    pub fn get_rage_index(&self, content_hash: &str) -> usize {
        self.blocks
            .iter()
            .flat_map(|block| &block.transactions)
            .filter(|tx| tx.kind == TransactionKind::RageReport)
            .filter_map(Transaction::report)
            .filter(|report| report.content_hash == content_hash)
            .count()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            chain: self.blocks.clone(),
            pending_transactions: self.pending.clone(),
            staked_balances: self.state.staked_balances.clone(),
            pending_rage_reports: self.state.pending_rage_reports.clone(),
        }
    }

    fn persist(&self) -> Result<(), ChainError> {
        self.persistence.save_snapshot(&self.snapshot()).map_err(|e| {
            warn!("Failed to persist snapshot: {}", e);
            e
        })
    }
}
