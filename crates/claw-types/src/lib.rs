//! Claw Types - Canonical types for bounded spending-authority vouchers
//!
//! This crate holds the foundational types shared by every claw crate, with
//! zero dependencies on the others:
//!
//! - Identity types (`AccountId`, `VoucherId`)
//! - `Amount`, an exact unsigned unit count
//! - The `Voucher` record, its computed `VoucherState` and the `VoucherStatus`
//!   metadata view
//! - `VoucherEvent`, the structured record emitted for every committed operation
//! - The `ClawError` taxonomy
//!
//! # Invariants
//!
//! 1. `spent <= max_spend` for every voucher
//! 2. Custody total equals the sum of `remaining` over non-burned vouchers
//! 3. Burned is terminal
//! 4. Voucher ids are never reused
//! 5. Only the current holder may spend or burn

pub mod identity;
pub mod amount;
pub mod voucher;
pub mod event;
pub mod error;

pub use identity::*;
pub use amount::*;
pub use voucher::*;
pub use event::*;
pub use error::*;

/// Version of the claw types schema
pub const TYPES_VERSION: &str = "0.1.0";
