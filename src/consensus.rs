//! Longest-valid-chain selection
//!
//! A candidate wins only if it is strictly longer than the local chain and
//! every other accepted candidate, and passes [`valid_chain`]. Ties keep the
//! incumbent.

use crate::blockchain::{valid_chain, Block};
use crate::error::ChainError;
use crate::network::{ChainFetcher, ChainResponse, Peer};
use tracing::{debug, info, warn};

/// Chain fetched from a peer, checked for self-consistency.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub peer: Peer,
    pub chain: Vec<Block>,
}

impl Candidate {
    /// Rejects responses whose advertised length disagrees with the chain.
    pub fn from_response(peer: Peer, response: ChainResponse) -> Result<Self, ChainError> {
        if response.length != response.chain.len() {
            return Err(ChainError::InvalidChain(format!(
                "{} advertised length {} but sent {} blocks",
                peer,
                response.length,
                response.chain.len()
            )));
        }
        Ok(Candidate {
            peer,
            chain: response.chain,
        })
    }
}

/// Fetches every peer's chain in turn. Failures are logged and skipped.
pub async fn collect_candidates<F>(fetcher: &F, peers: &[Peer]) -> Vec<Candidate>
where
    F: ChainFetcher + ?Sized,
{
    let mut candidates = Vec::with_capacity(peers.len());
    for peer in peers {
        debug!("Requesting chain from {}", peer);
        let result = fetcher
            .fetch_chain(peer)
            .await
            .and_then(|response| Candidate::from_response(peer.clone(), response));
        match result {
            Ok(candidate) => {
                info!("Received chain of length {} from {}", candidate.chain.len(), peer);
                candidates.push(candidate);
            }
            Err(e) => warn!("Skipping peer {}: {}", peer, e),
        }
    }
    candidates
}

/// Picks the longest valid candidate strictly longer than `local_len`.
pub fn select_longest_chain(local_len: usize, candidates: Vec<Candidate>) -> Option<Candidate> {
    let mut best: Option<Candidate> = None;
    let mut max_len = local_len;

    for candidate in candidates {
        let len = candidate.chain.len();
        if len <= max_len {
            continue;
        }
        if !valid_chain(&candidate.chain) {
            warn!("Peer {} offered an invalid chain of length {}", candidate.peer, len);
            continue;
        }
        info!("Peer {} offers a longer valid chain ({} blocks)", candidate.peer, len);
        max_len = len;
        best = Some(candidate);
    }
    best
}
