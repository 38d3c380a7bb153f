//! RageChain - a proof-of-work ledger for transfers, staking and
//! community-voted rage reports
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Core Ledger
//! - [`blockchain`] - Blocks, the ledger store, state projection and chain validation
//! - [`transaction`] - Transaction types, submission validation and expansion
//!
//! ## Consensus
//! - [`miner`] - Proof-of-work puzzle
//! - [`consensus`] - Longest-valid-chain selection
//!
//! ## Hashing
//! - [`crypto`] - SHA-256 and canonical JSON fingerprints
//!
//! ## Storage
//! - [`persistence`] - Snapshot backends (JSON file, SQLite, in-memory)
//!
//! ## Networking & Integration
//! - [`network`] - Peer registry and chain fetching
//! - [`node`] - Node façade serializing all mutations
//! - [`api`] - HTTP API (feature `api`)
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Core Ledger
// ============================================================================
pub mod blockchain;
pub mod transaction;

// ============================================================================
// Consensus & Mining
// ============================================================================
pub mod consensus;
pub mod miner;

// ============================================================================
// Hashing
// ============================================================================
pub mod crypto;

// ============================================================================
// Storage
// ============================================================================
pub mod persistence;

// ============================================================================
// Networking
// ============================================================================
pub mod network;
pub mod node;

// ============================================================================
// Integration
// ============================================================================
#[cfg(feature = "api")]
pub mod api;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;
