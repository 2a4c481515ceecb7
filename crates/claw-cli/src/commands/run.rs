//! Run commands - execute a JSON operation script against a fresh ledger
//!
//! A script funds some accounts and then applies its steps in order:
//!
//! ```json
//! {
//!   "accounts": { "funder": 1000 },
//!   "steps": [
//!     { "op": "create", "recipient": "agent", "max_spend": 100, "funder": "funder" },
//!     { "op": "spend", "id": 1, "to": "shop", "amount": 30, "caller": "agent" },
//!     { "op": "spend", "id": 1, "to": "shop", "amount": 80, "caller": "agent",
//!       "expect": "LimitExceeded" },
//!     { "op": "advance", "secs": 3600 },
//!     { "op": "burn", "id": 1, "return_to": "funder", "caller": "agent" }
//!   ]
//! }
//! ```
//!
//! A step with `expect` must fail with that error kind; every other step must
//! succeed. The run fails if any step does not match. A step whose time offset
//! falls outside the representable range aborts the run.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use claw_ledger::{AccountId, Amount, ClawError, ErrorKind, VoucherId};
use colored::*;
use serde::{Deserialize, Serialize};

use super::{Session, Summary};
use crate::config::LedgerConfig;
use crate::display;

/// A parsed operation script
#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    /// Opening balances
    #[serde(default)]
    pub accounts: BTreeMap<String, u64>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Step {
    #[serde(flatten)]
    pub action: Action,
    /// Error kind this step must fail with
    #[serde(default)]
    pub expect: Option<ErrorKind>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Action {
    Create {
        recipient: String,
        max_spend: u64,
        funder: String,
        /// Seconds from the current script time; absent means no expiry
        #[serde(default)]
        expiry_secs: Option<i64>,
    },
    Spend {
        id: u64,
        to: String,
        amount: u64,
        caller: String,
    },
    Burn {
        id: u64,
        return_to: String,
        caller: String,
    },
    Transfer {
        id: u64,
        caller: String,
        to: String,
    },
    /// Move the script clock forward
    Advance { secs: i64 },
    /// Print one voucher's status
    Status { id: u64 },
}

/// Result of one script step
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub index: usize,
    pub op: String,
    pub outcome: String,
    pub error_kind: Option<ErrorKind>,
    pub matched: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub steps: Vec<StepReport>,
    pub summary: Summary,
}

impl RunReport {
    pub fn mismatches(&self) -> usize {
        self.steps.iter().filter(|step| !step.matched).count()
    }
}

impl Script {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("script is not valid JSON for the claw script format")
    }
}

/// Entry point for `claw run`
pub async fn run_script(
    config: &LedgerConfig,
    path: &Path,
    audit_out: Option<&Path>,
    json: bool,
) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read script {}", path.display()))?;
    let script = Script::from_json(&raw)?;

    let session = Session::new(config);
    let report = execute(&session, &script).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if let Some(out) = audit_out {
        let entries = session.audit_export();
        std::fs::write(out, serde_json::to_string_pretty(&entries)?)
            .with_context(|| format!("failed to write audit log {}", out.display()))?;
        if !json {
            display::info(&format!("{} audit entries written to {}", entries.len(), out.display()));
        }
    }

    let mismatches = report.mismatches();
    if mismatches > 0 {
        anyhow::bail!("{mismatches} step(s) did not match their expected outcome");
    }
    if !report.summary.conserved {
        anyhow::bail!("custody total does not match outstanding vouchers");
    }
    Ok(())
}

/// Fund the script's accounts and apply every step
pub async fn execute(session: &Session, script: &Script) -> anyhow::Result<RunReport> {
    for (account, balance) in &script.accounts {
        if *balance > 0 {
            session
                .fund(&AccountId::from(account.as_str()), Amount::new(*balance))
                .await
                .with_context(|| format!("failed to fund {account}"))?;
        }
    }

    let mut steps = Vec::with_capacity(script.steps.len());
    for (index, step) in script.steps.iter().enumerate() {
        let outcome = apply(session, &step.action)
            .await
            .with_context(|| format!("step #{index} ({}) is malformed", step.action.name()))?;
        let error_kind = outcome.as_ref().err().map(ClawError::kind);
        tracing::debug!(index, op = step.action.name(), ?error_kind, "script step applied");

        steps.push(StepReport {
            index,
            op: step.action.name().to_string(),
            outcome: match &outcome {
                Ok(message) => message.clone(),
                Err(err) => err.to_string(),
            },
            error_kind,
            matched: error_kind == step.expect,
        });
    }

    let summary = session.summary().await?;
    Ok(RunReport { steps, summary })
}

/// Apply one action. The outer error is a malformed step; the inner one is
/// the ledger's verdict, which the report compares against `expect`.
async fn apply(session: &Session, action: &Action) -> anyhow::Result<Result<String, ClawError>> {
    let ledger = &session.ledger;
    let outcome = match action {
        Action::Create {
            recipient,
            max_spend,
            funder,
            expiry_secs,
        } => {
            let expiry = expiry_secs
                .map(|secs| session.time_after(secs))
                .transpose()?;
            ledger
                .create(
                    &AccountId::from(recipient.as_str()),
                    Amount::new(*max_spend),
                    expiry,
                    &AccountId::from(funder.as_str()),
                )
                .await
                .map(|id| format!("created {id} for {recipient} (max {max_spend})"))
        }
        Action::Spend {
            id,
            to,
            amount,
            caller,
        } => {
            let id = VoucherId(*id);
            let spent = ledger
                .spend(
                    id,
                    &AccountId::from(to.as_str()),
                    Amount::new(*amount),
                    &AccountId::from(caller.as_str()),
                )
                .await;
            match spent {
                Ok(()) => ledger
                    .remaining(id)
                    .await
                    .map(|left| format!("{caller} spent {amount} from {id} to {to}, {left} left")),
                Err(err) => Err(err),
            }
        }
        Action::Burn {
            id,
            return_to,
            caller,
        } => {
            let id = VoucherId(*id);
            ledger
                .burn(
                    id,
                    &AccountId::from(return_to.as_str()),
                    &AccountId::from(caller.as_str()),
                )
                .await
                .map(|reclaimed| format!("burned {id}, {reclaimed} returned to {return_to}"))
        }
        Action::Transfer { id, caller, to } => {
            let id = VoucherId(*id);
            ledger
                .transfer_holder(
                    id,
                    &AccountId::from(caller.as_str()),
                    &AccountId::from(to.as_str()),
                )
                .await
                .map(|()| format!("{id} handed from {caller} to {to}"))
        }
        Action::Advance { secs } => {
            session.advance(*secs)?;
            Ok(format!("clock advanced {secs}s"))
        }
        Action::Status { id } => {
            let id = VoucherId(*id);
            match ledger.status(id).await {
                Ok(Some(status)) => Ok(status.to_string()),
                Ok(None) => Err(ClawError::InvalidTokenId { id }),
                Err(err) => Err(err),
            }
        }
    };
    Ok(outcome)
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Create { .. } => "create",
            Action::Spend { .. } => "spend",
            Action::Burn { .. } => "burn",
            Action::Transfer { .. } => "transfer",
            Action::Advance { .. } => "advance",
            Action::Status { .. } => "status",
        }
    }
}

fn print_report(report: &RunReport) {
    display::section("Script Steps");
    for step in &report.steps {
        let line = format!("#{:<3} {:<8} {}", step.index, step.op, step.outcome);
        match (step.matched, step.error_kind) {
            (true, None) => display::success(&line),
            (true, Some(_)) => display::info(&format!("{line} {}", "(expected)".bright_black())),
            (false, _) => display::error(&format!("{line} (unexpected)")),
        }
    }
    display::summary(&report.summary);
}
