//! Proof-of-work mining
//!
//! A proof is valid when `sha256(format!("{last_proof}{proof}"))` starts with
//! [`POW_TARGET`]. Difficulty is fixed; there is no retargeting.

use crate::crypto::sha256_hex;

/// Leading hex digest pattern a valid proof must produce.
pub const POW_TARGET: &str = "0000";

pub fn valid_proof(last_proof: u64, proof: u64) -> bool {
    valid_proof_with_target(last_proof, proof, POW_TARGET)
}

/// Same check against an arbitrary hex prefix. Used by tests to search
/// reduced targets quickly.
pub fn valid_proof_with_target(last_proof: u64, proof: u64, target: &str) -> bool {
    let guess = format!("{}{}", last_proof, proof);
    sha256_hex(guess.as_bytes()).starts_with(target)
}

/// Linear search for the first proof satisfying [`POW_TARGET`]. Unbounded.
pub fn proof_of_work(last_proof: u64) -> u64 {
    proof_of_work_with_target(last_proof, POW_TARGET)
}

pub fn proof_of_work_with_target(last_proof: u64, target: &str) -> u64 {
    let mut proof = 0u64;
    while !valid_proof_with_target(last_proof, proof, target) {
        proof += 1;
    }
    proof
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_genesis_successor_proof() {
        let proof = proof_of_work(1);
        assert!(valid_proof(1, proof));
        // the search returns the smallest valid proof
        assert!((0..proof).all(|p| !valid_proof(1, p)));
    }

    #[test]
    fn test_proof_is_bound_to_last_proof() {
        let proof = proof_of_work(100);
        assert!(valid_proof(100, proof));
        assert!(!valid_proof_with_target(100, proof, "ffff"));
    }

    proptest! {
        #[test]
        fn prop_search_result_is_valid(last_proof in any::<u64>()) {
            let proof = proof_of_work_with_target(last_proof, "0");
            prop_assert!(valid_proof_with_target(last_proof, proof, "0"));
        }
    }
}
