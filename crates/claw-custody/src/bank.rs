//! In-memory asset bank
//!
//! Keeps one balance per account, including the custodial pool itself, and
//! implements [`FundsTransfer`] over them. Used by the CLI and by tests; a
//! deployment backed by a real asset rail plugs in its own `FundsTransfer`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use claw_types::{AccountId, Amount, ClawError, Result};
use tokio::sync::RwLock;
use tracing::debug;

use crate::transfer::FundsTransfer;

#[derive(Debug, Default)]
struct BankState {
    balances: HashMap<AccountId, Amount>,
    /// Accounts that can neither send nor receive
    frozen: HashSet<AccountId>,
}

impl BankState {
    fn balance(&self, account: &AccountId) -> Amount {
        self.balances.get(account).copied().unwrap_or_default()
    }

    fn ensure_not_frozen(&self, account: &AccountId, amount: Amount) -> Result<()> {
        if self.frozen.contains(account) {
            return Err(ClawError::transfer_rejected(account, amount, "account is frozen"));
        }
        Ok(())
    }

    /// Debit `from` and credit `to` as one step
    fn move_funds(&mut self, from: &AccountId, to: &AccountId, amount: Amount) -> Result<()> {
        if from == to {
            return Err(ClawError::transfer_rejected(to, amount, "source and destination match"));
        }
        let available = self.balance(from);
        let debited = available
            .checked_sub(amount)
            .ok_or_else(|| ClawError::InsufficientFunds {
                account: from.clone(),
                requested: amount,
                available,
            })?;

        let held = self.balance(to);
        let credited = held
            .checked_add(amount)
            .ok_or(ClawError::AmountOverflow { held, amount })?;

        self.balances.insert(from.clone(), debited);
        self.balances.insert(to.clone(), credited);
        Ok(())
    }
}

/// Thread-safe in-memory asset bank
#[derive(Clone)]
pub struct AssetBank {
    custody: AccountId,
    state: Arc<RwLock<BankState>>,
}

impl AssetBank {
    /// Create a bank whose custodial pool is held by `custody`
    pub fn new(custody: AccountId) -> Self {
        Self {
            custody,
            state: Arc::new(RwLock::new(BankState::default())),
        }
    }

    /// Credit `account` with freshly issued units. Returns the new balance.
    pub async fn mint(&self, account: &AccountId, amount: Amount) -> Result<Amount> {
        if amount.is_zero() {
            return Err(ClawError::ZeroAmount);
        }
        let mut state = self.state.write().await;
        let held = state.balance(account);
        let new_balance = held
            .checked_add(amount)
            .ok_or(ClawError::AmountOverflow { held, amount })?;
        state.balances.insert(account.clone(), new_balance);
        debug!(account = %account, amount = %amount, "minted");
        Ok(new_balance)
    }

    pub async fn balance(&self, account: &AccountId) -> Amount {
        self.state.read().await.balance(account)
    }

    /// Balance of the custodial pool
    pub async fn custody_balance(&self) -> Amount {
        self.balance(&self.custody).await
    }

    /// Sum of all balances, custody included
    pub async fn total_supply(&self) -> Amount {
        self.state.read().await.balances.values().copied().sum()
    }

    /// Reject every transfer to or from `account` until unfrozen
    pub async fn freeze(&self, account: &AccountId) {
        self.state.write().await.frozen.insert(account.clone());
    }

    pub async fn unfreeze(&self, account: &AccountId) {
        self.state.write().await.frozen.remove(account);
    }
}

#[async_trait::async_trait]
impl FundsTransfer for AssetBank {
    fn custody_account(&self) -> &AccountId {
        &self.custody
    }

    async fn pull_from(&self, from: &AccountId, amount: Amount) -> Result<()> {
        let mut state = self.state.write().await;
        state.ensure_not_frozen(from, amount)?;
        state.move_funds(from, &self.custody, amount)?;
        debug!(from = %from, amount = %amount, "pulled into custody");
        Ok(())
    }

    async fn push_to(&self, to: &AccountId, amount: Amount) -> Result<()> {
        let mut state = self.state.write().await;
        state.ensure_not_frozen(to, amount)?;
        state.move_funds(&self.custody, to, amount)?;
        debug!(to = %to, amount = %amount, "pushed out of custody");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mint_and_balance() {
        let bank = AssetBank::new(AccountId::custody());
        let alice = AccountId::from("alice");

        assert_eq!(bank.balance(&alice).await, Amount::zero());
        let balance = bank.mint(&alice, Amount::new(500)).await.unwrap();
        assert_eq!(balance, Amount::new(500));
        assert!(matches!(
            bank.mint(&alice, Amount::zero()).await,
            Err(ClawError::ZeroAmount)
        ));
    }

    #[tokio::test]
    async fn test_pull_and_push_conserve_supply() {
        let bank = AssetBank::new(AccountId::custody());
        let alice = AccountId::from("alice");
        let bob = AccountId::from("bob");
        bank.mint(&alice, Amount::new(1000)).await.unwrap();

        bank.pull_from(&alice, Amount::new(400)).await.unwrap();
        assert_eq!(bank.custody_balance().await, Amount::new(400));

        bank.push_to(&bob, Amount::new(150)).await.unwrap();
        assert_eq!(bank.balance(&alice).await, Amount::new(600));
        assert_eq!(bank.balance(&bob).await, Amount::new(150));
        assert_eq!(bank.custody_balance().await, Amount::new(250));
        assert_eq!(bank.total_supply().await, Amount::new(1000));
    }

    #[tokio::test]
    async fn test_pull_without_funds_fails_cleanly() {
        let bank = AssetBank::new(AccountId::custody());
        let alice = AccountId::from("alice");
        bank.mint(&alice, Amount::new(10)).await.unwrap();

        let result = bank.pull_from(&alice, Amount::new(11)).await;
        assert!(matches!(
            result,
            Err(ClawError::InsufficientFunds { available, .. }) if available == Amount::new(10)
        ));
        assert_eq!(bank.balance(&alice).await, Amount::new(10));
        assert_eq!(bank.custody_balance().await, Amount::zero());
    }

    #[tokio::test]
    async fn test_frozen_account_rejects_push() {
        let bank = AssetBank::new(AccountId::custody());
        let alice = AccountId::from("alice");
        let bob = AccountId::from("bob");
        bank.mint(&alice, Amount::new(100)).await.unwrap();
        bank.pull_from(&alice, Amount::new(100)).await.unwrap();

        bank.freeze(&bob).await;
        let result = bank.push_to(&bob, Amount::new(10)).await;
        assert!(matches!(result, Err(ClawError::TransferRejected { .. })));
        assert_eq!(bank.custody_balance().await, Amount::new(100));

        bank.unfreeze(&bob).await;
        bank.push_to(&bob, Amount::new(10)).await.unwrap();
        assert_eq!(bank.balance(&bob).await, Amount::new(10));
    }

    #[tokio::test]
    async fn test_custody_cannot_fund_itself() {
        let custody = AccountId::custody();
        let bank = AssetBank::new(custody.clone());
        let alice = AccountId::from("alice");
        bank.mint(&alice, Amount::new(50)).await.unwrap();
        bank.pull_from(&alice, Amount::new(50)).await.unwrap();

        let result = bank.pull_from(&custody, Amount::new(20)).await;
        assert!(matches!(result, Err(ClawError::TransferRejected { .. })));
        assert_eq!(bank.custody_balance().await, Amount::new(50));
        assert_eq!(bank.total_supply().await, Amount::new(50));
    }
}
