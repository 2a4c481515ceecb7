//! Error types for Claw
//!
//! Every failure is explicit and aborts the whole operation. Each variant
//! names the voucher and the amounts involved so a calling agent can decide
//! whether to adjust the amount, wait for another holder, or give up.

use crate::{AccountId, Amount, VoucherId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for Claw operations
pub type Result<T> = std::result::Result<T, ClawError>;

/// Coarse classification of a [`ClawError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    Unauthorized,
    AlreadyTerminal,
    Expired,
    LimitExceeded,
    InsufficientFunds,
    /// Internal accounting fault; unreachable while the conservation invariant holds
    InsufficientCustody,
}

/// Claw error types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClawError {
    // ========================================================================
    // Input Errors
    // ========================================================================

    /// Zero amount passed to spend or deposit
    #[error("Amount must be greater than zero")]
    ZeroAmount,

    /// Voucher created with a zero ceiling
    #[error("Voucher max spend must be greater than zero")]
    ZeroMaxSpend,

    // ========================================================================
    // Voucher Errors
    // ========================================================================

    /// Voucher id was never issued
    #[error("Voucher {id} does not exist")]
    InvalidTokenId { id: VoucherId },

    /// Caller is not the current holder
    #[error("{caller} is not the holder of voucher {id}")]
    NotVoucherOwner { id: VoucherId, caller: AccountId },

    /// Voucher is burned
    #[error("Voucher {id} has already been burned")]
    VoucherAlreadyBurned { id: VoucherId },

    /// Voucher is past its expiry
    #[error("Voucher {id} expired at {expired_at}")]
    VoucherExpired { id: VoucherId, expired_at: String },

    /// Cumulative spend would exceed the ceiling
    #[error("Voucher {id} limit exceeded: requested {requested}, remaining {remaining}")]
    SpendLimitExceeded {
        id: VoucherId,
        requested: Amount,
        remaining: Amount,
    },

    /// A voucher may never be held by the custodial identity
    #[error("Voucher {id} cannot be held by the custodial account {target}")]
    SelfTransferNotAllowed { id: VoucherId, target: AccountId },

    /// Ledger entered again from inside one of its own operations
    #[error("Reentrant ledger call rejected")]
    ReentrantCall,

    // ========================================================================
    // Funds Errors
    // ========================================================================

    /// Funding or transfer source cannot supply the amount
    #[error("Insufficient funds in {account}: requested {requested}, available {available}")]
    InsufficientFunds {
        account: AccountId,
        requested: Amount,
        available: Amount,
    },

    /// External transfer interface refused to move funds
    #[error("Transfer of {amount} to {recipient} rejected: {reason}")]
    TransferRejected {
        recipient: AccountId,
        amount: Amount,
        reason: String,
    },

    /// Balance arithmetic overflowed
    #[error("Amount overflow: {held} + {amount}")]
    AmountOverflow { held: Amount, amount: Amount },

    // ========================================================================
    // Internal Consistency Errors
    // ========================================================================

    /// Withdrawal larger than the tracked custody total
    #[error("Insufficient custody: requested {requested}, held {held}")]
    InsufficientCustody { requested: Amount, held: Amount },

    /// Custody total differs from the sum of outstanding voucher balances
    #[error("Conservation violation: custody holds {held}, vouchers owe {outstanding}")]
    ConservationViolation { held: Amount, outstanding: Amount },
}

impl ClawError {
    /// Create a not-owner error
    pub fn not_owner(id: VoucherId, caller: &AccountId) -> Self {
        Self::NotVoucherOwner {
            id,
            caller: caller.clone(),
        }
    }

    /// Create a transfer rejection
    pub fn transfer_rejected(
        recipient: &AccountId,
        amount: Amount,
        reason: impl Into<String>,
    ) -> Self {
        Self::TransferRejected {
            recipient: recipient.clone(),
            amount,
            reason: reason.into(),
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ZeroAmount | Self::ZeroMaxSpend => ErrorKind::InvalidInput,
            Self::InvalidTokenId { .. } => ErrorKind::NotFound,
            Self::NotVoucherOwner { .. }
            | Self::SelfTransferNotAllowed { .. }
            | Self::ReentrantCall => ErrorKind::Unauthorized,
            Self::VoucherAlreadyBurned { .. } => ErrorKind::AlreadyTerminal,
            Self::VoucherExpired { .. } => ErrorKind::Expired,
            Self::SpendLimitExceeded { .. } => ErrorKind::LimitExceeded,
            Self::InsufficientFunds { .. }
            | Self::TransferRejected { .. }
            | Self::AmountOverflow { .. } => ErrorKind::InsufficientFunds,
            Self::InsufficientCustody { .. } | Self::ConservationViolation { .. } => {
                ErrorKind::InsufficientCustody
            }
        }
    }

    /// Internal consistency fault rather than a caller mistake
    pub fn is_internal(&self) -> bool {
        self.kind() == ErrorKind::InsufficientCustody
    }

    /// Voucher the error refers to, if any
    pub fn voucher_id(&self) -> Option<VoucherId> {
        match self {
            Self::InvalidTokenId { id }
            | Self::NotVoucherOwner { id, .. }
            | Self::VoucherAlreadyBurned { id }
            | Self::VoucherExpired { id, .. }
            | Self::SpendLimitExceeded { id, .. }
            | Self::SelfTransferNotAllowed { id, .. } => Some(*id),
            _ => None,
        }
    }

    /// Get a stable error code for callers
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ZeroAmount => "ZERO_AMOUNT",
            Self::ZeroMaxSpend => "ZERO_MAX_SPEND",
            Self::InvalidTokenId { .. } => "INVALID_TOKEN_ID",
            Self::NotVoucherOwner { .. } => "NOT_VOUCHER_OWNER",
            Self::VoucherAlreadyBurned { .. } => "VOUCHER_ALREADY_BURNED",
            Self::VoucherExpired { .. } => "VOUCHER_EXPIRED",
            Self::SpendLimitExceeded { .. } => "SPEND_LIMIT_EXCEEDED",
            Self::SelfTransferNotAllowed { .. } => "SELF_TRANSFER_NOT_ALLOWED",
            Self::ReentrantCall => "REENTRANT_CALL",
            Self::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            Self::TransferRejected { .. } => "TRANSFER_REJECTED",
            Self::AmountOverflow { .. } => "AMOUNT_OVERFLOW",
            Self::InsufficientCustody { .. } => "INSUFFICIENT_CUSTODY",
            Self::ConservationViolation { .. } => "CONSERVATION_VIOLATION",
        }
    }
}
