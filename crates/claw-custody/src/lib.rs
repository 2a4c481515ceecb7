//! Claw Custody - the pooled balance backing every outstanding voucher
//!
//! Custody is a minimal escrow:
//! - `CustodialBalance` tracks the total under custody and is only ever
//!   mutated by the voucher ledger
//! - `FundsTransfer` is the external asset mover that pulls funds into custody
//!   and pushes them back out
//! - `AssetBank` is an in-memory, exact-accounting `FundsTransfer`
//!
//! # Invariants
//!
//! 1. The tracked total never goes negative
//! 2. A failed transfer leaves the tracked total unchanged
//! 3. Transfers are exact and fee-free

pub mod bank;
pub mod custody;
pub mod transfer;

pub use bank::AssetBank;
pub use custody::CustodialBalance;
pub use transfer::FundsTransfer;
