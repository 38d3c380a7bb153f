// Thin re-export module: implementation is in `blockchain/core.rs`, split into
// the ledger store, the state projector and chain validation.

pub mod core;
pub use core::*;
