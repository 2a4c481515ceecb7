//! Voucher record and its computed state
//!
//! A voucher is a bounded, expiring authority to draw down custodied funds.
//! Its lifecycle state is never stored: `Expired` is derived from the expiry
//! and the current time at every access, so the stored record cannot drift
//! from the wall clock.

use crate::{AccountId, Amount, VoucherId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle label of a voucher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoucherState {
    /// Spendable by its holder (possibly exhausted)
    Active,
    /// Past expiry: spend is refused, burn-to-reclaim is still allowed
    Expired,
    /// Terminal
    Burned,
}

impl VoucherState {
    /// Compute the state from the stored flags and the current time.
    ///
    /// Burned wins over expiry. A voucher is expired strictly after its expiry
    /// instant; spending exactly at the expiry instant is still allowed.
    pub fn compute(burned: bool, expiry: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        if burned {
            return Self::Burned;
        }
        match expiry {
            Some(at) if now > at => Self::Expired,
            _ => Self::Active,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Expired => "Expired",
            Self::Burned => "Burned",
        }
    }
}

impl fmt::Display for VoucherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Snapshot of a voucher record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voucher {
    pub id: VoucherId,
    /// Immutable ceiling
    pub max_spend: Amount,
    /// Cumulative amount drawn down
    pub spent: Amount,
    /// `None` means the voucher never expires
    pub expiry: Option<DateTime<Utc>>,
    pub burned: bool,
    /// Current authorized spender
    pub holder: AccountId,
    /// Supplier of the backing funds
    pub funder: AccountId,
    pub created_at: DateTime<Utc>,
}

impl Voucher {
    /// `max_spend - spent`, regardless of burn or expiry
    pub fn remaining(&self) -> Amount {
        self.max_spend.saturating_sub(self.spent)
    }

    pub fn state_at(&self, now: DateTime<Utc>) -> VoucherState {
        VoucherState::compute(self.burned, self.expiry, now)
    }

    /// Spendable right now: not burned, not expired, not exhausted
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.state_at(now) == VoucherState::Active && self.spent < self.max_spend
    }

    /// Amount the holder could still draw at `now`
    pub fn spendable_at(&self, now: DateTime<Utc>) -> Amount {
        match self.state_at(now) {
            VoucherState::Active => self.remaining(),
            VoucherState::Expired | VoucherState::Burned => Amount::zero(),
        }
    }

    /// Read-only metadata view at `now`
    pub fn status_at(&self, now: DateTime<Utc>) -> VoucherStatus {
        VoucherStatus {
            id: self.id,
            max_spend: self.max_spend,
            spent: self.spent,
            remaining: self.remaining(),
            expiry: self.expiry,
            state: self.state_at(now),
        }
    }
}

/// Human- and agent-readable rendering of a voucher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoucherStatus {
    pub id: VoucherId,
    pub max_spend: Amount,
    pub spent: Amount,
    pub remaining: Amount,
    pub expiry: Option<DateTime<Utc>>,
    pub state: VoucherState,
}

impl VoucherStatus {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl fmt::Display for VoucherStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] max={} spent={} remaining={} expiry=",
            self.id, self.state, self.max_spend, self.spent, self.remaining
        )?;
        match self.expiry {
            Some(at) => write!(f, "{}", at.to_rfc3339()),
            None => f.write_str("never"),
        }
    }
}
