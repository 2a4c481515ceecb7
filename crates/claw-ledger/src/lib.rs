//! Claw Ledger - bounded spending authority for untrusted holders
//!
//! A funder deposits a balance and wraps it in a voucher; the voucher's holder
//! may draw it down up to a fixed ceiling, optionally before an expiry, and
//! may burn it at any time to reclaim what is left.
//!
//! The ledger is:
//! - The only writer of voucher records
//! - The only caller of the custody mutators
//! - Serialized (mutators take `&mut self`; `SharedLedger` adds a lock)
//! - Fail closed (a failed operation changes nothing)
//!
//! # Invariants
//!
//! 1. `spent <= max_spend` for every voucher
//! 2. Custody total == sum of `max_spend - spent` over non-burned vouchers
//! 3. Burned vouchers cannot be spent, burned or transferred again
//! 4. Voucher ids are sequential from 1 and never reused
//! 5. Only the current holder may spend or burn

pub mod audit;
pub mod clock;
pub mod ledger;
pub mod registry;
pub mod shared;
pub mod sink;

pub use audit::{AuditEntry, AuditJournal};
pub use clock::{Clock, ManualClock, SystemClock};
pub use ledger::VoucherLedger;
pub use registry::HolderRegistry;
pub use shared::SharedLedger;
pub use sink::{EventSink, FanoutSink, MemorySink, TracingSink};

pub use claw_custody::{AssetBank, CustodialBalance, FundsTransfer};
pub use claw_types::*;
