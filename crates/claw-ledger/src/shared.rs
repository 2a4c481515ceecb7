//! Shared, serialized ledger handle
//!
//! `SharedLedger` lets many tasks submit operations against one ledger. Each
//! operation takes the ledger lock, runs to completion, and releases it, so
//! the read-check-write sequences of two operations never interleave.
//!
//! A call made through the handle while the same task is already inside a
//! ledger operation (for example from a `FundsTransfer` callback) fails with
//! `ReentrantCall` instead of waiting on a lock its own caller holds.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use claw_types::{AccountId, Amount, ClawError, Result, Voucher, VoucherId, VoucherStatus};
use tokio::sync::Mutex;
use tracing::warn;

use crate::ledger::VoucherLedger;

tokio::task_local! {
    static IN_LEDGER_OPERATION: ();
}

/// Cloneable handle serializing access to a [`VoucherLedger`]
#[derive(Clone)]
pub struct SharedLedger {
    inner: Arc<Mutex<VoucherLedger>>,
}

impl SharedLedger {
    pub fn new(ledger: VoucherLedger) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ledger)),
        }
    }

    async fn guarded<T>(&self, operation: impl Future<Output = Result<T>>) -> Result<T> {
        if IN_LEDGER_OPERATION.try_with(|_| ()).is_ok() {
            warn!("reentrant ledger call rejected");
            return Err(ClawError::ReentrantCall);
        }
        IN_LEDGER_OPERATION.scope((), operation).await
    }

    pub async fn create(
        &self,
        recipient: &AccountId,
        max_spend: Amount,
        expiry: Option<DateTime<Utc>>,
        funder: &AccountId,
    ) -> Result<VoucherId> {
        self.guarded(async {
            let mut ledger = self.inner.lock().await;
            ledger.create(recipient, max_spend, expiry, funder).await
        })
        .await
    }

    pub async fn spend(
        &self,
        id: VoucherId,
        to: &AccountId,
        amount: Amount,
        caller: &AccountId,
    ) -> Result<()> {
        self.guarded(async {
            let mut ledger = self.inner.lock().await;
            ledger.spend(id, to, amount, caller).await
        })
        .await
    }

    pub async fn burn(
        &self,
        id: VoucherId,
        return_to: &AccountId,
        caller: &AccountId,
    ) -> Result<Amount> {
        self.guarded(async {
            let mut ledger = self.inner.lock().await;
            ledger.burn(id, return_to, caller).await
        })
        .await
    }

    pub async fn transfer_holder(
        &self,
        id: VoucherId,
        caller: &AccountId,
        to: &AccountId,
    ) -> Result<()> {
        self.guarded(async {
            let mut ledger = self.inner.lock().await;
            ledger.transfer_holder(id, caller, to)
        })
        .await
    }

    /// Run a read-only query under the ledger lock
    pub async fn read<T>(&self, query: impl FnOnce(&VoucherLedger) -> T) -> Result<T> {
        self.guarded(async {
            let ledger = self.inner.lock().await;
            Ok(query(&ledger))
        })
        .await
    }

    pub async fn remaining(&self, id: VoucherId) -> Result<Amount> {
        self.read(|ledger| ledger.remaining(id)).await
    }

    pub async fn is_valid(&self, id: VoucherId) -> Result<bool> {
        self.read(|ledger| ledger.is_valid(id)).await
    }

    pub async fn voucher(&self, id: VoucherId) -> Result<Option<Voucher>> {
        self.read(|ledger| ledger.voucher(id)).await
    }

    pub async fn status(&self, id: VoucherId) -> Result<Option<VoucherStatus>> {
        self.read(|ledger| ledger.status(id)).await
    }

    pub async fn check_conservation(&self) -> Result<()> {
        self.guarded(async {
            let ledger = self.inner.lock().await;
            ledger.check_conservation()
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claw_custody::{AssetBank, FundsTransfer};
    use parking_lot::Mutex as SyncMutex;

    /// Transfer that calls back into the ledger before paying out
    struct ReentrantTransfer {
        bank: AssetBank,
        ledger: SyncMutex<Option<SharedLedger>>,
        observed: SyncMutex<Vec<Result<Amount>>>,
    }

    #[async_trait::async_trait]
    impl FundsTransfer for ReentrantTransfer {
        fn custody_account(&self) -> &AccountId {
            self.bank.custody_account()
        }

        async fn pull_from(&self, from: &AccountId, amount: Amount) -> Result<()> {
            self.bank.pull_from(from, amount).await
        }

        async fn push_to(&self, to: &AccountId, amount: Amount) -> Result<()> {
            let ledger = self.ledger.lock().clone();
            if let Some(ledger) = ledger {
                let attempt = ledger.remaining(VoucherId(1)).await;
                self.observed.lock().push(attempt);
            }
            self.bank.push_to(to, amount).await
        }
    }

    #[tokio::test]
    async fn test_reentrant_call_is_rejected() {
        let bank = AssetBank::new(AccountId::custody());
        let funder = AccountId::from("funder");
        let holder = AccountId::from("holder");
        bank.mint(&funder, Amount::new(100)).await.unwrap();

        let transfer = Arc::new(ReentrantTransfer {
            bank: bank.clone(),
            ledger: SyncMutex::new(None),
            observed: SyncMutex::new(Vec::new()),
        });
        let shared = SharedLedger::new(VoucherLedger::new(transfer.clone()));
        *transfer.ledger.lock() = Some(shared.clone());

        let id = shared
            .create(&holder, Amount::new(100), None, &funder)
            .await
            .unwrap();
        shared
            .spend(id, &AccountId::from("merchant"), Amount::new(25), &holder)
            .await
            .unwrap();

        assert_eq!(*transfer.observed.lock(), vec![Err(ClawError::ReentrantCall)]);
        assert_eq!(shared.remaining(id).await.unwrap(), Amount::new(75));
        shared.check_conservation().await.unwrap();
    }

    #[tokio::test]
    async fn test_read_outside_operation() {
        let bank = AssetBank::new(AccountId::custody());
        let shared = SharedLedger::new(VoucherLedger::new(Arc::new(bank)));
        assert_eq!(shared.remaining(VoucherId(1)).await.unwrap(), Amount::zero());
        assert!(!shared.is_valid(VoucherId(1)).await.unwrap());
        assert!(shared.voucher(VoucherId(1)).await.unwrap().is_none());
    }
}
