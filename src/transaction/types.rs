/// Transaction types for RageChain
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Addresses are opaque strings; nothing proves possession of an address.
pub type Address = String;

/// Sender of mining issuance.
pub const ISSUANCE_ADDRESS: &str = "0";
/// Recipient of stakes and of unstake requests.
pub const STAKING_POOL_ADDRESS: &str = "RAGE_Staking_Pool";
/// Recipient of rage reports.
pub const RAGE_PROTOCOL_ADDRESS: &str = "Rage_Protocol";
/// Recipient of votes on rage reports.
pub const RAGE_DAO_ADDRESS: &str = "Rage_DAO";
/// Sender of rewards for verified rage reports.
pub const REWARD_ADDRESS: &str = "Rage_Protocol_Reward";

/// Units issued to the miner of every block.
pub const MINING_REWARD: u64 = 1;
/// Units paid to the reporter of a verified rage report.
pub const RAGE_REPORT_REWARD: u64 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Transfer,
    Stake,
    Unstake,
    RageReport,
    VoteRageReport,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Transfer => "transfer",
            TransactionKind::Stake => "stake",
            TransactionKind::Unstake => "unstake",
            TransactionKind::RageReport => "rage_report",
            TransactionKind::VoteRageReport => "vote_rage_report",
        }
    }

    pub fn parse(kind: &str) -> Option<Self> {
        match kind {
            "transfer" => Some(TransactionKind::Transfer),
            "stake" => Some(TransactionKind::Stake),
            "unstake" => Some(TransactionKind::Unstake),
            "rage_report" => Some(TransactionKind::RageReport),
            "vote_rage_report" => Some(TransactionKind::VoteRageReport),
            _ => None,
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteType {
    Approve,
    Reject,
}

impl VoteType {
    pub fn parse(vote: &str) -> Option<Self> {
        match vote {
            "approve" => Some(VoteType::Approve),
            "reject" => Some(VoteType::Reject),
            _ => None,
        }
    }
}

impl fmt::Display for VoteType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            VoteType::Approve => f.write_str("approve"),
            VoteType::Reject => f.write_str("reject"),
        }
    }
}

/// Payload of a `rage_report` transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RageReport {
    pub report_id: String,
    pub content_hash: String,
    pub reason_code: String,
    pub timestamp: f64,
    pub reporter_address: Address,
    pub stake_amount: u64,
}

/// Payload of a `vote_rage_report` transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RageVote {
    pub report_id: String,
    pub voter_address: Address,
    pub vote_type: VoteType,
    pub timestamp: f64,
}

/// Payload of the stake a rage report is backed by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StakeLink {
    pub report_id: String,
}

/// A transaction that can occur in a block
///
/// `data` is kept exactly as it was received so a block hashes the same after
/// a reload or a peer fetch. Typed views are decoded on demand and only for the
/// transaction kind that owns them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: Address,
    pub recipient: Address,
    pub amount: u64,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub data: Option<Value>,
}

impl Transaction {
    pub fn new(
        sender: impl Into<Address>,
        recipient: impl Into<Address>,
        amount: u64,
        kind: TransactionKind,
        data: Option<Value>,
    ) -> Self {
        Transaction {
            sender: sender.into(),
            recipient: recipient.into(),
            amount,
            kind,
            data,
        }
    }

    /// Builds a transaction whose `data` is the JSON form of `payload`.
    pub fn with_payload<P: Serialize>(
        sender: impl Into<Address>,
        recipient: impl Into<Address>,
        amount: u64,
        kind: TransactionKind,
        payload: &P,
    ) -> Self {
        Self::new(sender, recipient, amount, kind, serde_json::to_value(payload).ok())
    }

    pub fn transfer(sender: impl Into<Address>, recipient: impl Into<Address>, amount: u64) -> Self {
        Self::new(sender, recipient, amount, TransactionKind::Transfer, None)
    }

    /// Issuance of the mining reward to `miner`.
    pub fn issuance(miner: impl Into<Address>) -> Self {
        Self::transfer(ISSUANCE_ADDRESS, miner, MINING_REWARD)
    }

    /// Reward paid to the reporter of a verified rage report.
    pub fn report_reward(reporter: impl Into<Address>) -> Self {
        Self::transfer(REWARD_ADDRESS, reporter, RAGE_REPORT_REWARD)
    }

    /// The report carried by a `rage_report` transaction.
    pub fn report(&self) -> Option<RageReport> {
        if self.kind != TransactionKind::RageReport {
            return None;
        }
        self.data.as_ref().and_then(|data| RageReport::deserialize(data).ok())
    }

    /// The vote carried by a `vote_rage_report` transaction.
    pub fn vote(&self) -> Option<RageVote> {
        if self.kind != TransactionKind::VoteRageReport {
            return None;
        }
        self.data.as_ref().and_then(|data| RageVote::deserialize(data).ok())
    }
}
