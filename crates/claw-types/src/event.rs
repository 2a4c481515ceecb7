//! Structured records emitted for every committed voucher operation

use crate::{AccountId, Amount, VoucherId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Observability record of a committed operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VoucherEvent {
    Created {
        id: VoucherId,
        recipient: AccountId,
        max_spend: Amount,
        expiry: Option<DateTime<Utc>>,
    },
    Spent {
        id: VoucherId,
        to: AccountId,
        amount: Amount,
        new_spent: Amount,
        new_remaining: Amount,
    },
    Burned {
        id: VoucherId,
        return_to: AccountId,
        remaining: Amount,
    },
    HolderTransferred {
        id: VoucherId,
        from: AccountId,
        to: AccountId,
    },
}

impl VoucherEvent {
    pub fn voucher_id(&self) -> VoucherId {
        match self {
            Self::Created { id, .. }
            | Self::Spent { id, .. }
            | Self::Burned { id, .. }
            | Self::HolderTransferred { id, .. } => *id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Created { .. } => "created",
            Self::Spent { .. } => "spent",
            Self::Burned { .. } => "burned",
            Self::HolderTransferred { .. } => "holder_transferred",
        }
    }
}
