//! Display utilities for the CLI

use claw_ledger::{VoucherState, VoucherStatus};
use colored::*;

use crate::commands::Summary;

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", "━".repeat(60).bright_black());
    println!(" {}", title.bright_white().bold());
    println!("{}", "━".repeat(60).bright_black());
}

/// Print a success message
pub fn success(message: &str) {
    println!("  {} {}", "✓".bright_green(), message);
}

/// Print an error message
pub fn error(message: &str) {
    println!("  {} {}", "✗".bright_red(), message.bright_red());
}

/// Print an info message
pub fn info(message: &str) {
    println!("  {} {}", "→".bright_blue(), message);
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("      {}: {}", key, value.bright_cyan());
}

/// One line per voucher, coloured by lifecycle state
pub fn voucher(status: &VoucherStatus) {
    let state = match status.state {
        VoucherState::Active if status.remaining.is_zero() => "exhausted".yellow(),
        VoucherState::Active => "active".bright_green(),
        VoucherState::Expired => "expired".yellow(),
        VoucherState::Burned => "burned".bright_black(),
    };
    let expiry = status
        .expiry
        .map(|at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "never".to_string());
    println!(
        "  {:<8} {:<10} spent {:>6} / {:<6} remaining {:<6} expiry {}",
        status.id.to_string().bright_white(),
        state,
        status.spent.to_string(),
        status.max_spend.to_string(),
        status.remaining.to_string().bright_cyan(),
        expiry.bright_black()
    );
}

/// Vouchers, custody totals and audit state at the end of a run
pub fn summary(summary: &Summary) {
    section("Vouchers");
    if summary.vouchers.is_empty() {
        info("no vouchers issued");
    }
    for status in &summary.vouchers {
        voucher(status);
    }

    section("Custody");
    kv("account", summary.custody_account.as_str());
    kv("tracked total", &summary.custody_total.to_string());
    kv("bank balance", &summary.custody_balance.to_string());
    if summary.conserved {
        success("custody matches outstanding vouchers");
    } else {
        error("custody does not match outstanding vouchers");
    }

    match (summary.audit_entries, summary.audit_chain_valid) {
        (Some(entries), Some(true)) => success(&format!("audit chain intact ({entries} entries)")),
        (Some(entries), _) => error(&format!("audit chain broken ({entries} entries)")),
        (None, _) => info("audit journal disabled"),
    }
}
