/// Submission-boundary validation and transaction expansion.
///
/// Raw requests are checked here before anything reaches the ledger. A valid
/// request becomes a [`Submission`], which expands into the transactions that
/// actually enter the pending buffer.
use crate::crypto::content_hash;
use crate::error::ChainError;
use crate::transaction::types::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Transaction as submitted by an external caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub sender: String,
    #[serde(default)]
    pub recipient: Option<String>,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Option<Value>,
}

/// A request that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// `transfer`, `stake` or `unstake`.
    Value {
        kind: TransactionKind,
        sender: Address,
        recipient: Address,
        amount: u64,
        data: Option<Value>,
    },
    RageReport {
        reporter: Address,
        content: String,
        reason_code: String,
        stake_amount: u64,
    },
    Vote {
        voter: Address,
        report_id: String,
        vote_type: VoteType,
    },
}

impl TransactionRequest {
    pub fn validate(self) -> Result<Submission, ChainError> {
        if self.sender.is_empty() {
            return Err(ChainError::InvalidTransaction(
                "Missing required field: sender".to_string(),
            ));
        }

        let kind = TransactionKind::parse(&self.kind)
            .ok_or_else(|| ChainError::UnknownTransactionType(self.kind.clone()))?;

        match kind {
            TransactionKind::RageReport => {
                let data = self.data.as_ref().ok_or_else(|| {
                    ChainError::InvalidTransaction(
                        "Rage report requires data.content and data.reason_code".to_string(),
                    )
                })?;
                let content = required_str(data, "content")?;
                let reason_code = required_str(data, "reason_code")?;
                let stake_amount = match data.get("stake_amount") {
                    None | Some(Value::Null) => 0,
                    Some(value) => value.as_u64().ok_or_else(|| {
                        ChainError::InvalidTransaction(
                            "data.stake_amount must be a non-negative integer".to_string(),
                        )
                    })?,
                };
                Ok(Submission::RageReport {
                    reporter: self.sender,
                    content,
                    reason_code,
                    stake_amount,
                })
            }
            TransactionKind::VoteRageReport => {
                let data = self.data.as_ref().ok_or_else(|| {
                    ChainError::InvalidTransaction(
                        "Vote requires data.report_id and data.vote_type".to_string(),
                    )
                })?;
                let report_id = required_str(data, "report_id")?;
                let vote = required_str(data, "vote_type")?;
                let vote_type = VoteType::parse(&vote).ok_or_else(|| {
                    ChainError::InvalidTransaction(format!(
                        "data.vote_type must be 'approve' or 'reject', got '{}'",
                        vote
                    ))
                })?;
                Ok(Submission::Vote {
                    voter: self.sender,
                    report_id,
                    vote_type,
                })
            }
            TransactionKind::Transfer | TransactionKind::Stake | TransactionKind::Unstake => {
                let recipient = self.recipient.filter(|r| !r.is_empty());
                let amount = self.amount.filter(|a| *a > 0);
                match (recipient, amount) {
                    (Some(recipient), Some(amount)) => Ok(Submission::Value {
                        kind,
                        sender: self.sender,
                        recipient,
                        amount: amount as u64,
                        data: self.data,
                    }),
                    _ => Err(ChainError::InvalidTransaction(format!(
                        "{} requires a recipient and amount > 0",
                        kind
                    ))),
                }
            }
        }
    }
}

fn required_str(data: &Value, field: &str) -> Result<String, ChainError> {
    data.get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            ChainError::InvalidTransaction(format!("Missing required field: data.{}", field))
        })
}

impl Submission {
    /// Expands the submission into ledger transactions, in commit order.
    ///
    /// A staked rage report becomes a `stake` into the staking pool followed
    /// by the `rage_report` itself; the stake carries the report id.
    pub fn into_transactions(self, timestamp: f64) -> Vec<Transaction> {
        match self {
            Submission::Value {
                kind,
                sender,
                recipient,
                amount,
                data,
            } => vec![Transaction::new(sender, recipient, amount, kind, data)],
            Submission::RageReport {
                reporter,
                content,
                reason_code,
                stake_amount,
            } => {
                let report = RageReport {
                    report_id: uuid::Uuid::new_v4().to_string(),
                    content_hash: content_hash(&content),
                    reason_code,
                    timestamp,
                    reporter_address: reporter.clone(),
                    stake_amount,
                };

                let mut expanded = Vec::with_capacity(2);
                if stake_amount > 0 {
                    expanded.push(Transaction::with_payload(
                        reporter.clone(),
                        STAKING_POOL_ADDRESS,
                        stake_amount,
                        TransactionKind::Stake,
                        &StakeLink {
                            report_id: report.report_id.clone(),
                        },
                    ));
                }
                expanded.push(Transaction::with_payload(
                    reporter,
                    RAGE_PROTOCOL_ADDRESS,
                    0,
                    TransactionKind::RageReport,
                    &report,
                ));
                expanded
            }
            Submission::Vote {
                voter,
                report_id,
                vote_type,
            } => vec![Transaction::with_payload(
                voter.clone(),
                RAGE_DAO_ADDRESS,
                0,
                TransactionKind::VoteRageReport,
                &RageVote {
                    report_id,
                    voter_address: voter,
                    vote_type,
                    timestamp,
                },
            )],
        }
    }
}
