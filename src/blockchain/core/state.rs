use crate::transaction::{Address, RageReport, Transaction, TransactionKind, VoteType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, warn};

use super::chain::Block;

/// Approvals needed, with no rejections, to verify a report.
pub const APPROVALS_TO_VERIFY: usize = 2;
/// Rejections needed to dismiss a report.
pub const REJECTIONS_TO_DISMISS: usize = 2;

/// A rage report awaiting community resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingReport {
    pub report_data: RageReport,
    pub votes: HashMap<Address, VoteType>,
}

impl PendingReport {
    pub fn new(report_data: RageReport) -> Self {
        Self {
            report_data,
            votes: HashMap::new(),
        }
    }

    pub fn tally(&self) -> (usize, usize) {
        let approvals = self.votes.values().filter(|v| **v == VoteType::Approve).count();
        let rejections = self.votes.len() - approvals;
        (approvals, rejections)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Resolution {
    Verified,
    Dismissed,
}

/// State derived from the chain by applying transactions in commit order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerState {
    pub balances: HashMap<Address, i128>,
    pub staked_balances: HashMap<Address, u64>,
    pub pending_rage_reports: HashMap<String, PendingReport>,
}

impl LedgerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds state from scratch over an entire chain.
    ///
    /// Follow-up transactions are dropped: on a committed chain they already
    /// appear in later blocks.
    pub fn replay(blocks: &[Block]) -> Self {
        let mut state = Self::new();
        for block in blocks {
            state.apply_block(block);
        }
        state
    }

    /// Applies one committed block and returns the follow-up transactions it
    /// produced, in order. They belong in the pending buffer.
    pub fn apply_block(&mut self, block: &Block) -> Vec<Transaction> {
        block
            .transactions
            .iter()
            .filter_map(|tx| self.apply_transaction(tx))
            .collect()
    }

    /// Applies a single transaction. Transactions that are invalid against the
    /// current state are absorbed as no-ops.
    pub fn apply_transaction(&mut self, tx: &Transaction) -> Option<Transaction> {
        let amount = i128::from(tx.amount);
        match tx.kind {
            TransactionKind::Transfer => {
                *self.balances.entry(tx.recipient.clone()).or_insert(0) += amount;
                *self.balances.entry(tx.sender.clone()).or_insert(0) -= amount;
                None
            }
            TransactionKind::Stake => {
                let staked = self.staked_balances.entry(tx.sender.clone()).or_insert(0);
                *staked = staked.saturating_add(tx.amount);
                *self.balances.entry(tx.sender.clone()).or_insert(0) -= amount;
                info!("{} staked {}, total staked {}", tx.sender, tx.amount, staked);
                None
            }
            // The staker is credited, and only when the stake covers the amount.
            // The recipient is the staking pool and is not credited.
            TransactionKind::Unstake => {
                let available = self.get_staked_balance(&tx.sender);
                if available >= tx.amount {
                    self.staked_balances
                        .insert(tx.sender.clone(), available - tx.amount);
                    *self.balances.entry(tx.sender.clone()).or_insert(0) += amount;
                    info!("{} unstaked {}, remaining {}", tx.sender, tx.amount, available - tx.amount);
                } else {
                    warn!(
                        "{} tried to unstake {} with only {} staked, ignored",
                        tx.sender, tx.amount, available
                    );
                }
                None
            }
            TransactionKind::RageReport => {
                match tx.report() {
                    Some(report) => {
                        info!("rage report {} awaiting votes", report.report_id);
                        self.pending_rage_reports
                            .insert(report.report_id.clone(), PendingReport::new(report));
                    }
                    None => warn!("rage_report from {} carries no report payload, ignored", tx.sender),
                }
                None
            }
            TransactionKind::VoteRageReport => self.apply_vote(tx),
        }
    }

    fn apply_vote(&mut self, tx: &Transaction) -> Option<Transaction> {
        let Some(vote) = tx.vote() else {
            warn!("vote_rage_report from {} carries no vote payload, ignored", tx.sender);
            return None;
        };

        let Some(pending) = self.pending_rage_reports.get_mut(&vote.report_id) else {
            warn!(
                "vote on unknown or already resolved report {}, ignored",
                vote.report_id
            );
            return None;
        };

        if pending.votes.contains_key(&vote.voter_address) {
            warn!(
                "{} already voted on report {}, ignored",
                vote.voter_address, vote.report_id
            );
            return None;
        }

        pending
            .votes
            .insert(vote.voter_address.clone(), vote.vote_type);
        info!(
            "{} voted {} on report {}",
            vote.voter_address, vote.vote_type, vote.report_id
        );

        self.resolve_report(&vote.report_id)
    }

    fn resolve_report(&mut self, report_id: &str) -> Option<Transaction> {
        let pending = self.pending_rage_reports.get(report_id)?;
        let (approvals, rejections) = pending.tally();

        let resolution = if approvals >= APPROVALS_TO_VERIFY && rejections == 0 {
            Resolution::Verified
        } else if rejections >= REJECTIONS_TO_DISMISS {
            Resolution::Dismissed
        } else {
            return None;
        };

        let report = self.pending_rage_reports.remove(report_id)?.report_data;
        match resolution {
            Resolution::Verified => {
                info!(
                    "rage report {} verified, rewarding {}",
                    report_id, report.reporter_address
                );
                Some(Transaction::report_reward(report.reporter_address))
            }
            Resolution::Dismissed => {
                info!("rage report {} dismissed", report_id);
                None
            }
        }
    }

    pub fn get_balance(&self, address: &str) -> i128 {
        self.balances.get(address).copied().unwrap_or(0)
    }

    pub fn get_staked_balance(&self, address: &str) -> u64 {
        self.staked_balances.get(address).copied().unwrap_or(0)
    }
}
