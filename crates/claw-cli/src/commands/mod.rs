//! CLI commands and the in-memory session they run against

pub mod demo;
pub mod run;

use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use claw_ledger::{
    AccountId, Amount, AssetBank, AuditEntry, AuditJournal, ClawError, Clock, FanoutSink,
    ManualClock, SharedLedger, TracingSink, VoucherLedger, VoucherStatus,
};
use serde::Serialize;

use crate::config::LedgerConfig;

/// A fresh bank, clock and ledger wired together from configuration
pub struct Session {
    pub ledger: SharedLedger,
    pub bank: AssetBank,
    pub clock: ManualClock,
    pub journal: Option<AuditJournal>,
}

/// End-of-run summary
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub vouchers: Vec<VoucherStatus>,
    pub custody_account: AccountId,
    pub custody_total: Amount,
    pub custody_balance: Amount,
    pub conserved: bool,
    pub audit_entries: Option<usize>,
    pub audit_chain_valid: Option<bool>,
}

impl Session {
    pub fn new(config: &LedgerConfig) -> Self {
        let bank = AssetBank::new(config.custody.account_id());
        let clock = ManualClock::starting_now();

        let journal = config
            .audit
            .enabled
            .then(|| AuditJournal::new().with_clock(Arc::new(clock.clone())));
        let mut sink = FanoutSink::new().with(Arc::new(TracingSink));
        if let Some(journal) = &journal {
            sink = sink.with(Arc::new(journal.clone()));
        }

        let ledger = VoucherLedger::new(Arc::new(bank.clone()))
            .with_clock(Arc::new(clock.clone()))
            .with_sink(Arc::new(sink));

        Self {
            ledger: SharedLedger::new(ledger),
            bank,
            clock,
            journal,
        }
    }

    /// Give `account` an opening balance
    pub async fn fund(&self, account: &AccountId, amount: Amount) -> Result<Amount, ClawError> {
        self.bank.mint(account, amount).await
    }

    /// Session time `secs` from now
    pub fn time_after(&self, secs: i64) -> anyhow::Result<DateTime<Utc>> {
        Duration::try_seconds(secs)
            .and_then(|offset| self.clock.now().checked_add_signed(offset))
            .with_context(|| format!("{secs}s from now is outside the supported time range"))
    }

    /// Move the session clock forward by `secs`
    pub fn advance(&self, secs: i64) -> anyhow::Result<DateTime<Utc>> {
        Duration::try_seconds(secs)
            .and_then(|offset| self.clock.advance(offset))
            .with_context(|| format!("cannot advance the clock by {secs}s"))
    }

    pub async fn summary(&self) -> Result<Summary, ClawError> {
        let (vouchers, custody_account, custody_total, conserved) = self
            .ledger
            .read(|ledger| {
                let now = ledger.now();
                let vouchers = ledger
                    .vouchers()
                    .iter()
                    .map(|voucher| voucher.status_at(now))
                    .collect::<Vec<_>>();
                (
                    vouchers,
                    ledger.custody_account().clone(),
                    ledger.total_held(),
                    ledger.check_conservation().is_ok(),
                )
            })
            .await?;
        let custody_balance = self.bank.custody_balance().await;

        Ok(Summary {
            vouchers,
            custody_account,
            custody_total,
            custody_balance,
            conserved: conserved && custody_total == custody_balance,
            audit_entries: self.journal.as_ref().map(AuditJournal::len),
            audit_chain_valid: self.journal.as_ref().map(AuditJournal::verify_chain),
        })
    }

    /// Every audit entry, oldest first; empty when auditing is disabled
    pub fn audit_export(&self) -> Vec<AuditEntry> {
        self.journal
            .as_ref()
            .map(AuditJournal::export)
            .unwrap_or_default()
    }
}
