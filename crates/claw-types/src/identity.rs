//! Identity types for Claw
//!
//! Accounts are opaque string identities handed to us by the surrounding
//! system. Vouchers are numbered sequentially by the ledger.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a principal: a funder, a holder, a payee, or the custodian itself
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub String);

impl AccountId {
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The default identity of the custodial pool
    pub fn custody() -> Self {
        Self("claw_custody".to_string())
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Sequential voucher identifier. The first voucher is `1`; `0` is never issued.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct VoucherId(pub u64);

impl VoucherId {
    pub const FIRST: VoucherId = VoucherId(1);

    pub fn value(&self) -> u64 {
        self.0
    }

    /// The id issued after this one
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for VoucherId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "claw#{}", self.0)
    }
}

impl From<u64> for VoucherId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}
