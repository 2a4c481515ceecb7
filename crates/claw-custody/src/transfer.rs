//! External funds-transfer interface

use claw_types::{AccountId, Amount, Result};

/// Moves the custodied asset between principals and the custodial pool.
///
/// Implementations must be exact: pulling `n` units credits custody with
/// exactly `n`, pushing `n` units debits custody by exactly `n`. Fee-on-transfer
/// or rebasing assets break conservation and are not supported.
#[async_trait::async_trait]
pub trait FundsTransfer: Send + Sync {
    /// Identity that holds custodied funds
    fn custody_account(&self) -> &AccountId;

    /// Pull `amount` from `from` into custody
    async fn pull_from(&self, from: &AccountId, amount: Amount) -> Result<()>;

    /// Push `amount` out of custody to `to`
    async fn push_to(&self, to: &AccountId, amount: Amount) -> Result<()>;
}
