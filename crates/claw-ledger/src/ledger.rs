//! The voucher ledger
//!
//! The ledger owns the voucher table, the id counter, the holder registry and
//! the custodial balance as one unit of state. It is the only writer of
//! voucher records and the only caller of the custody mutators.
//!
//! # Operation ordering
//!
//! Every mutator validates first, then commits its bookkeeping (`spent`,
//! `burned`), then asks custody to move funds. If the transfer fails the
//! bookkeeping is rolled back before returning, so a failed operation leaves
//! every stored value as it was. Mutators take `&mut self`: nothing can read
//! the ledger while an external transfer is in flight.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use claw_custody::{CustodialBalance, FundsTransfer};
use claw_types::{
    AccountId, Amount, ClawError, Result, Voucher, VoucherEvent, VoucherId, VoucherState,
    VoucherStatus,
};
use tracing::{debug, error, info};

use crate::clock::{Clock, SystemClock};
use crate::registry::HolderRegistry;
use crate::sink::{EventSink, TracingSink};

/// Stored part of a voucher; the holder lives in the registry
#[derive(Debug, Clone)]
struct VoucherRecord {
    max_spend: Amount,
    spent: Amount,
    expiry: Option<DateTime<Utc>>,
    burned: bool,
    funder: AccountId,
    created_at: DateTime<Utc>,
}

impl VoucherRecord {
    fn remaining(&self) -> Amount {
        self.max_spend.saturating_sub(self.spent)
    }

    fn state_at(&self, now: DateTime<Utc>) -> VoucherState {
        VoucherState::compute(self.burned, self.expiry, now)
    }
}

/// Log a rejected operation and hand the error back
fn rejected(operation: &'static str, err: ClawError) -> ClawError {
    if err.is_internal() {
        error!(operation, error = %err, code = err.error_code(), "custody accounting fault");
    } else {
        debug!(operation, error = %err, code = err.error_code(), "operation rejected");
    }
    debug_assert!(
        !err.is_internal(),
        "custody accounting fault during {operation}: {err}"
    );
    err
}

/// Authorization and lifecycle state machine for vouchers
pub struct VoucherLedger {
    vouchers: BTreeMap<VoucherId, VoucherRecord>,
    next_id: VoucherId,
    registry: HolderRegistry,
    custody: CustodialBalance,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn EventSink>,
}

impl VoucherLedger {
    /// Create an empty ledger moving funds through `transfer`
    pub fn new(transfer: Arc<dyn FundsTransfer>) -> Self {
        let custody = CustodialBalance::new(transfer);
        let registry = HolderRegistry::new(custody.account().clone());
        Self {
            vouchers: BTreeMap::new(),
            next_id: VoucherId::FIRST,
            registry,
            custody,
            clock: Arc::new(SystemClock),
            sink: Arc::new(TracingSink),
        }
    }

    /// Use a different time source for expiry checks
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Send events to `sink` instead of the tracing sink
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn custody_account(&self) -> &AccountId {
        self.custody.account()
    }

    /// Current custody total
    pub fn total_held(&self) -> Amount {
        self.custody.total_held()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Fund and issue a new voucher held by `recipient`.
    ///
    /// `funder` must be able to supply exactly `max_spend`; if funding fails
    /// no id is consumed and nothing is stored.
    pub async fn create(
        &mut self,
        recipient: &AccountId,
        max_spend: Amount,
        expiry: Option<DateTime<Utc>>,
        funder: &AccountId,
    ) -> Result<VoucherId> {
        let id = self.next_id;
        if max_spend.is_zero() {
            return Err(rejected("create", ClawError::ZeroMaxSpend));
        }
        if let Err(err) = self.registry.ensure_allowed_holder(id, recipient) {
            return Err(rejected("create", err));
        }
        if let Err(err) = self.custody.fund_from(funder, max_spend).await {
            return Err(rejected("create", err));
        }

        self.vouchers.insert(
            id,
            VoucherRecord {
                max_spend,
                spent: Amount::zero(),
                expiry,
                burned: false,
                funder: funder.clone(),
                created_at: self.clock.now(),
            },
        );
        self.registry.register(id, recipient.clone());
        self.next_id = id.next();

        info!(
            id = id.value(),
            recipient = %recipient,
            funder = %funder,
            max_spend = max_spend.value(),
            custody = self.custody.total_held().value(),
            "voucher created"
        );
        self.sink.record(&VoucherEvent::Created {
            id,
            recipient: recipient.clone(),
            max_spend,
            expiry,
        });
        Ok(id)
    }

    /// Draw `amount` from voucher `id` and pay it to `to`.
    ///
    /// Preconditions are checked in a fixed order and the first failure wins:
    /// zero amount, unknown id, caller not holder, burned, expired, limit.
    pub async fn spend(
        &mut self,
        id: VoucherId,
        to: &AccountId,
        amount: Amount,
        caller: &AccountId,
    ) -> Result<()> {
        let now = self.clock.now();
        let new_spent = match self.check_spend(id, to, amount, caller, now) {
            Ok(new_spent) => new_spent,
            Err(err) => return Err(rejected("spend", err)),
        };

        let (previous, new_remaining) = {
            let record = self
                .vouchers
                .get_mut(&id)
                .ok_or(ClawError::InvalidTokenId { id })?;
            let previous = std::mem::replace(&mut record.spent, new_spent);
            (previous, record.remaining())
        };

        if let Err(err) = self.custody.withdraw(to, amount).await {
            if let Some(record) = self.vouchers.get_mut(&id) {
                record.spent = previous;
            }
            return Err(rejected("spend", err));
        }

        info!(
            id = id.value(),
            to = %to,
            amount = amount.value(),
            spent = new_spent.value(),
            remaining = new_remaining.value(),
            "voucher spent"
        );
        self.sink.record(&VoucherEvent::Spent {
            id,
            to: to.clone(),
            amount,
            new_spent,
            new_remaining,
        });
        Ok(())
    }

    /// Burn voucher `id`, returning whatever is left to `return_to`.
    ///
    /// Expiry never blocks a burn. Returns the amount reclaimed.
    pub async fn burn(
        &mut self,
        id: VoucherId,
        return_to: &AccountId,
        caller: &AccountId,
    ) -> Result<Amount> {
        let remaining = match self.check_burn(id, return_to, caller) {
            Ok(remaining) => remaining,
            Err(err) => return Err(rejected("burn", err)),
        };

        self.set_burned(id, true);
        if !remaining.is_zero() {
            if let Err(err) = self.custody.withdraw(return_to, remaining).await {
                self.set_burned(id, false);
                return Err(rejected("burn", err));
            }
        }

        info!(
            id = id.value(),
            return_to = %return_to,
            remaining = remaining.value(),
            custody = self.custody.total_held().value(),
            "voucher burned"
        );
        self.sink.record(&VoucherEvent::Burned {
            id,
            return_to: return_to.clone(),
            remaining,
        });
        Ok(remaining)
    }

    /// Hand voucher `id` from its current holder `caller` to `to`
    pub fn transfer_holder(
        &mut self,
        id: VoucherId,
        caller: &AccountId,
        to: &AccountId,
    ) -> Result<()> {
        let from = self
            .registry
            .transfer(id, caller, to)
            .map_err(|err| rejected("transfer", err))?;

        info!(id = id.value(), from = %from, to = %to, "voucher holder transferred");
        self.sink.record(&VoucherEvent::HolderTransferred {
            id,
            from,
            to: to.clone(),
        });
        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Spendable balance: zero for unknown, burned or expired vouchers
    pub fn remaining(&self, id: VoucherId) -> Amount {
        self.voucher(id)
            .map(|v| v.spendable_at(self.clock.now()))
            .unwrap_or_default()
    }

    /// Exists, not burned, not expired and not exhausted
    pub fn is_valid(&self, id: VoucherId) -> bool {
        self.voucher(id).is_some_and(|v| v.is_valid_at(self.clock.now()))
    }

    /// Full record snapshot; `None` if `id` was never issued
    pub fn voucher(&self, id: VoucherId) -> Option<Voucher> {
        let record = self.vouchers.get(&id)?;
        let holder = self.registry.holder_of(id)?;
        Some(Voucher {
            id,
            max_spend: record.max_spend,
            spent: record.spent,
            expiry: record.expiry,
            burned: record.burned,
            holder: holder.clone(),
            funder: record.funder.clone(),
            created_at: record.created_at,
        })
    }

    /// Metadata view of a voucher at the current time
    pub fn status(&self, id: VoucherId) -> Option<VoucherStatus> {
        let now = self.clock.now();
        self.voucher(id).map(|v| v.status_at(now))
    }

    /// Every voucher ever issued, in id order
    pub fn vouchers(&self) -> Vec<Voucher> {
        self.vouchers
            .keys()
            .filter_map(|id| self.voucher(*id))
            .collect()
    }

    /// Non-burned vouchers currently held by `account`
    pub fn vouchers_held_by(&self, account: &AccountId) -> Vec<VoucherId> {
        self.registry.held_by(account)
    }

    pub fn voucher_count(&self) -> usize {
        self.vouchers.len()
    }

    /// Sum of `max_spend - spent` over non-burned vouchers, expired included
    pub fn total_outstanding(&self) -> Amount {
        self.vouchers
            .values()
            .filter(|r| !r.burned)
            .map(VoucherRecord::remaining)
            .sum()
    }

    /// Verify custody holds exactly what the outstanding vouchers owe
    pub fn check_conservation(&self) -> Result<()> {
        let held = self.custody.total_held();
        let outstanding = self.total_outstanding();
        if held != outstanding {
            error!(held = held.value(), outstanding = outstanding.value(), "conservation violated");
            return Err(ClawError::ConservationViolation { held, outstanding });
        }
        Ok(())
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn ensure_holder(&self, id: VoucherId, caller: &AccountId) -> Result<()> {
        match self.registry.holder_of(id) {
            Some(holder) if holder == caller => Ok(()),
            Some(_) => Err(ClawError::not_owner(id, caller)),
            None => Err(ClawError::InvalidTokenId { id }),
        }
    }

    /// Funds may never be paid out to the custodial account itself
    fn ensure_payout_target(&self, id: VoucherId, to: &AccountId) -> Result<()> {
        if to == self.custody.account() {
            return Err(ClawError::SelfTransferNotAllowed {
                id,
                target: to.clone(),
            });
        }
        Ok(())
    }

    /// Returns the new cumulative spend
    fn check_spend(
        &self,
        id: VoucherId,
        to: &AccountId,
        amount: Amount,
        caller: &AccountId,
        now: DateTime<Utc>,
    ) -> Result<Amount> {
        if amount.is_zero() {
            return Err(ClawError::ZeroAmount);
        }
        let record = self
            .vouchers
            .get(&id)
            .ok_or(ClawError::InvalidTokenId { id })?;
        self.ensure_holder(id, caller)?;
        if record.burned {
            return Err(ClawError::VoucherAlreadyBurned { id });
        }
        if record.state_at(now) == VoucherState::Expired {
            return Err(ClawError::VoucherExpired {
                id,
                expired_at: record.expiry.map(|at| at.to_rfc3339()).unwrap_or_default(),
            });
        }
        let new_spent = record
            .spent
            .checked_add(amount)
            .filter(|spent| *spent <= record.max_spend)
            .ok_or(ClawError::SpendLimitExceeded {
                id,
                requested: amount,
                remaining: record.remaining(),
            })?;
        self.ensure_payout_target(id, to)?;
        Ok(new_spent)
    }

    /// Returns the amount the burn will reclaim
    fn check_burn(&self, id: VoucherId, return_to: &AccountId, caller: &AccountId) -> Result<Amount> {
        let record = self
            .vouchers
            .get(&id)
            .ok_or(ClawError::InvalidTokenId { id })?;
        self.ensure_holder(id, caller)?;
        if record.burned {
            return Err(ClawError::VoucherAlreadyBurned { id });
        }
        let remaining = record.remaining();
        if !remaining.is_zero() {
            self.ensure_payout_target(id, return_to)?;
        }
        Ok(remaining)
    }

    /// Burned flag and holder freeze always move together
    fn set_burned(&mut self, id: VoucherId, burned: bool) {
        if let Some(record) = self.vouchers.get_mut(&id) {
            record.burned = burned;
        }
        self.registry.set_frozen(id, burned);
    }
}

impl std::fmt::Debug for VoucherLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoucherLedger")
            .field("vouchers", &self.vouchers.len())
            .field("next_id", &self.next_id)
            .field("custody", &self.custody)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::sink::MemorySink;
    use chrono::Duration;
    use claw_custody::AssetBank;

    struct Fixture {
        ledger: VoucherLedger,
        bank: AssetBank,
        clock: ManualClock,
        events: MemorySink,
        funder: AccountId,
        holder: AccountId,
        merchant: AccountId,
    }

    async fn fixture() -> Fixture {
        let bank = AssetBank::new(AccountId::custody());
        let funder = AccountId::from("funder");
        bank.mint(&funder, Amount::new(10_000)).await.unwrap();
        let clock = ManualClock::starting_now();
        let events = MemorySink::new();
        let ledger = VoucherLedger::new(Arc::new(bank.clone()))
            .with_clock(Arc::new(clock.clone()))
            .with_sink(Arc::new(events.clone()));
        Fixture {
            ledger,
            bank,
            clock,
            events,
            funder,
            holder: AccountId::from("agent"),
            merchant: AccountId::from("merchant"),
        }
    }

    #[tokio::test]
    async fn test_ids_start_at_one_and_increase() {
        let mut f = fixture().await;
        let first = f
            .ledger
            .create(&f.holder, Amount::new(10), None, &f.funder)
            .await
            .unwrap();
        let second = f
            .ledger
            .create(&f.holder, Amount::new(10), None, &f.funder)
            .await
            .unwrap();
        assert_eq!(first, VoucherId(1));
        assert_eq!(second, VoucherId(2));
        assert_eq!(f.ledger.voucher_count(), 2);
    }

    #[tokio::test]
    async fn test_failed_funding_consumes_no_id() {
        let mut f = fixture().await;
        let broke = AccountId::from("broke");
        let result = f
            .ledger
            .create(&f.holder, Amount::new(10), None, &broke)
            .await;
        assert!(matches!(result, Err(ClawError::InsufficientFunds { .. })));
        assert_eq!(f.ledger.voucher_count(), 0);
        assert_eq!(f.ledger.total_held(), Amount::zero());
        assert!(f.events.is_empty());

        let id = f
            .ledger
            .create(&f.holder, Amount::new(10), None, &f.funder)
            .await
            .unwrap();
        assert_eq!(id, VoucherId::FIRST);
    }

    #[tokio::test]
    async fn test_custody_cannot_hold_a_voucher() {
        let mut f = fixture().await;
        let custody = f.ledger.custody_account().clone();
        let result = f
            .ledger
            .create(&custody, Amount::new(10), None, &f.funder)
            .await;
        assert!(matches!(result, Err(ClawError::SelfTransferNotAllowed { .. })));
        assert_eq!(f.bank.balance(&f.funder).await, Amount::new(10_000));
    }

    #[tokio::test]
    async fn test_spend_check_order() {
        let mut f = fixture().await;
        let expiry = f.clock.now() + Duration::seconds(10);
        let id = f
            .ledger
            .create(&f.holder, Amount::new(100), Some(expiry), &f.funder)
            .await
            .unwrap();
        let stranger = AccountId::from("stranger");

        // Zero amount beats unknown id
        let err = f
            .ledger
            .spend(VoucherId(99), &f.merchant, Amount::zero(), &stranger)
            .await
            .unwrap_err();
        assert_eq!(err, ClawError::ZeroAmount);

        // Unknown id beats ownership
        let err = f
            .ledger
            .spend(VoucherId(99), &f.merchant, Amount::new(1), &stranger)
            .await
            .unwrap_err();
        assert_eq!(err, ClawError::InvalidTokenId { id: VoucherId(99) });

        // Ownership beats expiry and limit
        f.clock.advance(Duration::seconds(11));
        let err = f
            .ledger
            .spend(id, &f.merchant, Amount::new(500), &stranger)
            .await
            .unwrap_err();
        assert!(matches!(err, ClawError::NotVoucherOwner { .. }));

        // Expiry beats limit
        let err = f
            .ledger
            .spend(id, &f.merchant, Amount::new(500), &f.holder)
            .await
            .unwrap_err();
        assert!(matches!(err, ClawError::VoucherExpired { .. }));
    }

    #[tokio::test]
    async fn test_burned_beats_expired() {
        let mut f = fixture().await;
        let expiry = f.clock.now() + Duration::seconds(10);
        let id = f
            .ledger
            .create(&f.holder, Amount::new(100), Some(expiry), &f.funder)
            .await
            .unwrap();
        f.ledger.burn(id, &f.funder, &f.holder).await.unwrap();
        f.clock.advance(Duration::seconds(11));

        let err = f
            .ledger
            .spend(id, &f.merchant, Amount::new(1), &f.holder)
            .await
            .unwrap_err();
        assert_eq!(err, ClawError::VoucherAlreadyBurned { id });
    }

    #[tokio::test]
    async fn test_spend_at_expiry_instant_is_allowed() {
        let mut f = fixture().await;
        let expiry = f.clock.now() + Duration::seconds(60);
        let id = f
            .ledger
            .create(&f.holder, Amount::new(100), Some(expiry), &f.funder)
            .await
            .unwrap();

        f.clock.set(expiry);
        f.ledger
            .spend(id, &f.merchant, Amount::new(10), &f.holder)
            .await
            .unwrap();
        assert_eq!(f.ledger.remaining(id), Amount::new(90));
    }

    #[tokio::test]
    async fn test_spend_to_custody_rejected() {
        let mut f = fixture().await;
        let id = f
            .ledger
            .create(&f.holder, Amount::new(100), None, &f.funder)
            .await
            .unwrap();
        let custody = f.ledger.custody_account().clone();

        let err = f
            .ledger
            .spend(id, &custody, Amount::new(10), &f.holder)
            .await
            .unwrap_err();
        assert!(matches!(err, ClawError::SelfTransferNotAllowed { .. }));
        assert_eq!(f.ledger.remaining(id), Amount::new(100));
    }

    #[tokio::test]
    async fn test_rejected_payout_rolls_back_spend() {
        let mut f = fixture().await;
        let id = f
            .ledger
            .create(&f.holder, Amount::new(100), None, &f.funder)
            .await
            .unwrap();
        let before = f.ledger.voucher(id).unwrap();

        f.bank.freeze(&f.merchant).await;
        let err = f
            .ledger
            .spend(id, &f.merchant, Amount::new(40), &f.holder)
            .await
            .unwrap_err();
        assert!(matches!(err, ClawError::TransferRejected { .. }));
        assert_eq!(f.ledger.voucher(id).unwrap(), before);
        assert_eq!(f.ledger.total_held(), Amount::new(100));
        f.ledger.check_conservation().unwrap();
        assert_eq!(f.events.len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_refund_rolls_back_burn() {
        let mut f = fixture().await;
        let id = f
            .ledger
            .create(&f.holder, Amount::new(100), None, &f.funder)
            .await
            .unwrap();

        f.bank.freeze(&f.funder).await;
        let err = f.ledger.burn(id, &f.funder, &f.holder).await.unwrap_err();
        assert!(matches!(err, ClawError::TransferRejected { .. }));

        let voucher = f.ledger.voucher(id).unwrap();
        assert!(!voucher.burned);
        assert_eq!(f.ledger.vouchers_held_by(&f.holder), vec![id]);
        f.ledger.check_conservation().unwrap();

        f.bank.unfreeze(&f.funder).await;
        assert_eq!(
            f.ledger.burn(id, &f.funder, &f.holder).await.unwrap(),
            Amount::new(100)
        );
    }

    #[tokio::test]
    async fn test_burn_of_exhausted_voucher_moves_nothing() {
        let mut f = fixture().await;
        let id = f
            .ledger
            .create(&f.holder, Amount::new(50), None, &f.funder)
            .await
            .unwrap();
        f.ledger
            .spend(id, &f.merchant, Amount::new(50), &f.holder)
            .await
            .unwrap();
        assert!(!f.ledger.is_valid(id));

        let custody = f.ledger.custody_account().clone();
        let reclaimed = f.ledger.burn(id, &custody, &f.holder).await.unwrap();
        assert_eq!(reclaimed, Amount::zero());
        assert_eq!(
            f.events.last(),
            Some(VoucherEvent::Burned {
                id,
                return_to: custody,
                remaining: Amount::zero(),
            })
        );
    }

    #[tokio::test]
    async fn test_transfer_holder_emits_event() {
        let mut f = fixture().await;
        let id = f
            .ledger
            .create(&f.holder, Amount::new(50), None, &f.funder)
            .await
            .unwrap();
        let next = AccountId::from("next");

        f.ledger.transfer_holder(id, &f.holder, &next).unwrap();
        assert_eq!(f.ledger.voucher(id).unwrap().holder, next);
        assert_eq!(
            f.events.last(),
            Some(VoucherEvent::HolderTransferred {
                id,
                from: f.holder.clone(),
                to: next,
            })
        );
    }

    #[tokio::test]
    async fn test_status_labels() {
        let mut f = fixture().await;
        let expiry = f.clock.now() + Duration::seconds(5);
        let expiring = f
            .ledger
            .create(&f.holder, Amount::new(10), Some(expiry), &f.funder)
            .await
            .unwrap();
        let burned = f
            .ledger
            .create(&f.holder, Amount::new(10), None, &f.funder)
            .await
            .unwrap();
        f.ledger.burn(burned, &f.funder, &f.holder).await.unwrap();

        assert_eq!(f.ledger.status(expiring).unwrap().state, VoucherState::Active);
        f.clock.advance(Duration::seconds(6));
        let status = f.ledger.status(expiring).unwrap();
        assert_eq!(status.state, VoucherState::Expired);
        assert_eq!(status.remaining, Amount::new(10));
        assert_eq!(f.ledger.remaining(expiring), Amount::zero());
        assert_eq!(f.ledger.status(burned).unwrap().state, VoucherState::Burned);
        assert!(f.ledger.status(VoucherId(42)).is_none());

        // Expired vouchers still back their custody until burned
        assert_eq!(f.ledger.total_outstanding(), Amount::new(10));
        f.ledger.check_conservation().unwrap();
    }
}
