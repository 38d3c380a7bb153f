use crate::miner::valid_proof;
use tracing::debug;

use super::chain::Block;

/// Checks linkage and proof-of-work of every block after the first.
///
/// The first block is trusted as genesis. Field presence is guaranteed by the
/// typed decoder: a chain with missing block fields never deserializes.
pub fn valid_chain(chain: &[Block]) -> bool {
    if chain.is_empty() {
        debug!("Rejecting empty chain");
        return false;
    }

    for pair in chain.windows(2) {
        let (previous, block) = (&pair[0], &pair[1]);

        let expected = match previous.hash() {
            Ok(hash) => hash,
            Err(e) => {
                debug!("Invalid block {}: cannot hash predecessor: {}", block.index, e);
                return false;
            }
        };
        if block.previous_hash != expected {
            debug!("Invalid block {}: wrong previous_hash", block.index);
            return false;
        }
        if !valid_proof(previous.proof, block.proof) {
            debug!("Invalid block {}: wrong proof", block.index);
            return false;
        }
    }
    true
}
