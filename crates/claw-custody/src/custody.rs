//! Custodial balance
//!
//! Tracks the total under custody. Mutators take `&mut self`, so a deposit and
//! a withdrawal can never interleave their read-check-write sequence; whoever
//! owns the balance (the voucher ledger) is the single point of
//! synchronization for the custody total.

use std::sync::Arc;

use claw_types::{AccountId, Amount, ClawError, Result};
use tracing::{debug, warn};

use crate::transfer::FundsTransfer;

/// Pooled balance backing all outstanding vouchers
pub struct CustodialBalance {
    total: Amount,
    transfer: Arc<dyn FundsTransfer>,
}

impl CustodialBalance {
    /// Create an empty custodial balance moving funds through `transfer`
    pub fn new(transfer: Arc<dyn FundsTransfer>) -> Self {
        Self {
            total: Amount::zero(),
            transfer,
        }
    }

    /// Identity holding the custodied funds
    pub fn account(&self) -> &AccountId {
        self.transfer.custody_account()
    }

    /// Current custody total
    pub fn total_held(&self) -> Amount {
        self.total
    }

    /// Record `amount` as received into custody.
    ///
    /// The funds must already have been moved into custody by the caller.
    /// Returns the new total.
    pub fn deposit(&mut self, amount: Amount) -> Result<Amount> {
        if amount.is_zero() {
            return Err(ClawError::ZeroAmount);
        }
        self.total = self.total.checked_add(amount).ok_or(ClawError::AmountOverflow {
            held: self.total,
            amount,
        })?;
        Ok(self.total)
    }

    /// Pull `amount` from `funder` and record it as deposited.
    ///
    /// Nothing is tracked unless the pull succeeds.
    pub async fn fund_from(&mut self, funder: &AccountId, amount: Amount) -> Result<Amount> {
        if amount.is_zero() {
            return Err(ClawError::ZeroAmount);
        }
        if self.total.checked_add(amount).is_none() {
            return Err(ClawError::AmountOverflow {
                held: self.total,
                amount,
            });
        }

        self.transfer.pull_from(funder, amount).await?;
        let total = self.deposit(amount)?;
        debug!(funder = %funder, amount = %amount, total = %total, "custody funded");
        Ok(total)
    }

    /// Move `amount` out of custody to `to`. Returns the new total.
    ///
    /// The total is decremented before the transfer is issued and restored if
    /// the transfer fails.
    pub async fn withdraw(&mut self, to: &AccountId, amount: Amount) -> Result<Amount> {
        let before = self.total;
        let after = before
            .checked_sub(amount)
            .ok_or(ClawError::InsufficientCustody {
                requested: amount,
                held: before,
            })?;

        self.total = after;
        if let Err(err) = self.transfer.push_to(to, amount).await {
            self.total = before;
            warn!(to = %to, amount = %amount, error = %err, "custody withdrawal rolled back");
            return Err(err);
        }

        debug!(to = %to, amount = %amount, total = %after, "custody withdrawn");
        Ok(after)
    }
}

impl std::fmt::Debug for CustodialBalance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustodialBalance")
            .field("account", self.account())
            .field("total", &self.total)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AssetBank;

    async fn funded_bank(account: &AccountId, amount: u64) -> AssetBank {
        let bank = AssetBank::new(AccountId::custody());
        bank.mint(account, Amount::new(amount)).await.unwrap();
        bank
    }

    #[tokio::test]
    async fn test_deposit_rejects_zero() {
        let bank = AssetBank::new(AccountId::custody());
        let mut custody = CustodialBalance::new(Arc::new(bank));

        assert!(matches!(custody.deposit(Amount::zero()), Err(ClawError::ZeroAmount)));
        assert_eq!(custody.deposit(Amount::new(5)).unwrap(), Amount::new(5));
        assert_eq!(custody.total_held(), Amount::new(5));
    }

    #[tokio::test]
    async fn test_fund_and_withdraw() {
        let funder = AccountId::from("funder");
        let payee = AccountId::from("payee");
        let bank = funded_bank(&funder, 1000).await;
        let mut custody = CustodialBalance::new(Arc::new(bank.clone()));

        custody.fund_from(&funder, Amount::new(300)).await.unwrap();
        assert_eq!(custody.total_held(), Amount::new(300));
        assert_eq!(bank.custody_balance().await, Amount::new(300));

        let total = custody.withdraw(&payee, Amount::new(120)).await.unwrap();
        assert_eq!(total, Amount::new(180));
        assert_eq!(bank.balance(&payee).await, Amount::new(120));
        assert_eq!(bank.custody_balance().await, custody.total_held());
    }

    #[tokio::test]
    async fn test_failed_pull_tracks_nothing() {
        let funder = AccountId::from("funder");
        let bank = funded_bank(&funder, 50).await;
        let mut custody = CustodialBalance::new(Arc::new(bank));

        let result = custody.fund_from(&funder, Amount::new(51)).await;
        assert!(matches!(result, Err(ClawError::InsufficientFunds { .. })));
        assert_eq!(custody.total_held(), Amount::zero());
    }

    #[tokio::test]
    async fn test_withdraw_more_than_held() {
        let funder = AccountId::from("funder");
        let bank = funded_bank(&funder, 100).await;
        let mut custody = CustodialBalance::new(Arc::new(bank));
        custody.fund_from(&funder, Amount::new(100)).await.unwrap();

        let result = custody.withdraw(&funder, Amount::new(101)).await;
        assert!(matches!(result, Err(ClawError::InsufficientCustody { .. })));
        assert_eq!(custody.total_held(), Amount::new(100));
    }

    #[tokio::test]
    async fn test_rejected_push_restores_total() {
        let funder = AccountId::from("funder");
        let payee = AccountId::from("payee");
        let bank = funded_bank(&funder, 100).await;
        let mut custody = CustodialBalance::new(Arc::new(bank.clone()));
        custody.fund_from(&funder, Amount::new(100)).await.unwrap();

        bank.freeze(&payee).await;
        let result = custody.withdraw(&payee, Amount::new(40)).await;
        assert!(matches!(result, Err(ClawError::TransferRejected { .. })));
        assert_eq!(custody.total_held(), Amount::new(100));
        assert_eq!(bank.custody_balance().await, Amount::new(100));
    }
}
