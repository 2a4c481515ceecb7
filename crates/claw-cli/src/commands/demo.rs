//! Demo commands - walk through the reference voucher scenarios
//!
//! Each scenario runs against its own fresh session and checks its own
//! outcome, so the demo doubles as a smoke test of a configured build.

use claw_ledger::{AccountId, Amount, ClawError, ErrorKind, VoucherId};

use super::Session;
use crate::config::LedgerConfig;
use crate::display;

const SCENARIOS: [&str; 6] = [
    "Cumulative spend limit",
    "Expiry",
    "Burn and reclaim",
    "Holder transfer",
    "Zero ceiling",
    "Competing spends",
];

struct Actors {
    funder: AccountId,
    agent: AccountId,
    shop: AccountId,
}

impl Actors {
    fn new() -> Self {
        Self {
            funder: AccountId::from("funder"),
            agent: AccountId::from("agent-a"),
            shop: AccountId::from("shop"),
        }
    }
}

/// Entry point for `claw demo`
pub async fn run_demo(config: &LedgerConfig, only: Option<usize>) -> anyhow::Result<()> {
    if let Some(number) = only {
        if number == 0 || number > SCENARIOS.len() {
            anyhow::bail!("scenario must be between 1 and {}", SCENARIOS.len());
        }
    }

    for (index, title) in SCENARIOS.iter().enumerate() {
        let number = index + 1;
        if only.is_some_and(|n| n != number) {
            continue;
        }

        display::section(&format!("Scenario {number}: {title}"));
        let session = Session::new(config);
        let actors = Actors::new();
        session.fund(&actors.funder, Amount::new(1_000)).await?;

        match number {
            1 => spend_limit(&session, &actors).await?,
            2 => expiry(&session, &actors).await?,
            3 => burn(&session, &actors).await?,
            4 => holder_transfer(&session, &actors).await?,
            5 => zero_ceiling(&session, &actors).await?,
            _ => competing_spends(&session, &actors).await?,
        }

        let summary = session.summary().await?;
        for status in &summary.vouchers {
            display::voucher(status);
        }
        anyhow::ensure!(summary.conserved, "custody diverged in scenario {number}");
        display::success("custody matches outstanding vouchers");
    }
    Ok(())
}

/// Report an operation that must fail with `kind`
fn expect_failure(result: Result<(), ClawError>, kind: ErrorKind) -> anyhow::Result<()> {
    match result {
        Err(err) if err.kind() == kind => {
            display::info(&format!("rejected as expected: {err}"));
            Ok(())
        }
        Err(err) => anyhow::bail!("expected {kind:?}, got {err}"),
        Ok(()) => anyhow::bail!("expected {kind:?}, but the operation succeeded"),
    }
}

async fn create(
    session: &Session,
    actors: &Actors,
    max_spend: u64,
    expiry_secs: Option<i64>,
) -> anyhow::Result<VoucherId> {
    let expiry = expiry_secs
        .map(|secs| session.time_after(secs))
        .transpose()?;
    let id = session
        .ledger
        .create(&actors.agent, Amount::new(max_spend), expiry, &actors.funder)
        .await?;
    display::success(&format!("{} issued {id} to {} (max {max_spend})", actors.funder, actors.agent));
    Ok(id)
}

async fn spend(
    session: &Session,
    id: VoucherId,
    to: &AccountId,
    amount: u64,
    caller: &AccountId,
) -> Result<(), ClawError> {
    session
        .ledger
        .spend(id, to, Amount::new(amount), caller)
        .await?;
    let remaining = session.ledger.remaining(id).await?;
    display::success(&format!("{caller} spent {amount} from {id}, {remaining} left"));
    Ok(())
}

async fn spend_limit(session: &Session, actors: &Actors) -> anyhow::Result<()> {
    let id = create(session, actors, 100, None).await?;
    for _ in 0..3 {
        spend(session, id, &actors.shop, 30, &actors.agent).await?;
    }
    expect_failure(
        spend(session, id, &actors.shop, 11, &actors.agent).await,
        ErrorKind::LimitExceeded,
    )?;
    spend(session, id, &actors.shop, 10, &actors.agent).await?;

    let remaining = session.ledger.remaining(id).await?;
    anyhow::ensure!(remaining.is_zero(), "voucher should be exhausted, {remaining} left");
    Ok(())
}

async fn expiry(session: &Session, actors: &Actors) -> anyhow::Result<()> {
    let id = create(session, actors, 100, Some(3600)).await?;
    spend(session, id, &actors.shop, 10, &actors.agent).await?;

    session.advance(3601)?;
    display::info("clock advanced past expiry");
    expect_failure(
        spend(session, id, &actors.shop, 10, &actors.agent).await,
        ErrorKind::Expired,
    )
}

async fn burn(session: &Session, actors: &Actors) -> anyhow::Result<()> {
    let id = create(session, actors, 100, None).await?;
    spend(session, id, &actors.shop, 30, &actors.agent).await?;

    let before = session.bank.balance(&actors.funder).await;
    let reclaimed = session
        .ledger
        .burn(id, &actors.funder, &actors.agent)
        .await?;
    let after = session.bank.balance(&actors.funder).await;
    display::success(&format!("burned {id}, {reclaimed} returned to {}", actors.funder));
    anyhow::ensure!(
        reclaimed == Amount::new(70) && after.checked_sub(before) == Some(reclaimed),
        "burn returned {reclaimed}, funder balance moved {before} -> {after}"
    );

    expect_failure(
        spend(session, id, &actors.shop, 1, &actors.agent).await,
        ErrorKind::AlreadyTerminal,
    )?;
    expect_failure(
        session
            .ledger
            .burn(id, &actors.funder, &actors.agent)
            .await
            .map(|_| ()),
        ErrorKind::AlreadyTerminal,
    )
}

async fn holder_transfer(session: &Session, actors: &Actors) -> anyhow::Result<()> {
    let agent_b = AccountId::from("agent-b");
    let id = create(session, actors, 100, None).await?;
    spend(session, id, &actors.shop, 10, &actors.agent).await?;

    session
        .ledger
        .transfer_holder(id, &actors.agent, &agent_b)
        .await?;
    display::success(&format!("{id} handed from {} to {agent_b}", actors.agent));

    spend(session, id, &actors.shop, 20, &agent_b).await?;
    expect_failure(
        spend(session, id, &actors.shop, 5, &actors.agent).await,
        ErrorKind::Unauthorized,
    )
}

async fn zero_ceiling(session: &Session, actors: &Actors) -> anyhow::Result<()> {
    let held_before = session.bank.custody_balance().await;
    expect_failure(
        session
            .ledger
            .create(&actors.agent, Amount::zero(), None, &actors.funder)
            .await
            .map(|_| ()),
        ErrorKind::InvalidInput,
    )?;

    let count = session.ledger.read(|ledger| ledger.voucher_count()).await?;
    let held_after = session.bank.custody_balance().await;
    anyhow::ensure!(
        count == 0 && held_before == held_after,
        "zero-ceiling create left {count} voucher(s) and custody {held_after}"
    );
    display::info("no id consumed, custody unchanged");
    Ok(())
}

async fn competing_spends(session: &Session, actors: &Actors) -> anyhow::Result<()> {
    let id = create(session, actors, 100, None).await?;

    let attempts: Vec<_> = ["shop-1", "shop-2"]
        .into_iter()
        .map(|shop| {
            let ledger = session.ledger.clone();
            let agent = actors.agent.clone();
            tokio::spawn(async move {
                ledger
                    .spend(id, &AccountId::from(shop), Amount::new(60), &agent)
                    .await
            })
        })
        .collect();

    let mut succeeded = 0;
    for attempt in attempts {
        match attempt.await? {
            Ok(()) => {
                succeeded += 1;
                display::success("spend of 60 accepted");
            }
            Err(err) => expect_failure(Err(err), ErrorKind::LimitExceeded)?,
        }
    }

    let voucher = session
        .ledger
        .voucher(id)
        .await?
        .ok_or(ClawError::InvalidTokenId { id })?;
    anyhow::ensure!(
        succeeded == 1 && voucher.spent == Amount::new(60),
        "{succeeded} spends succeeded, {} spent",
        voucher.spent
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_every_scenario_passes() {
        run_demo(&LedgerConfig::default(), None).await.unwrap();
    }

    #[tokio::test]
    async fn test_out_of_range_scenario() {
        assert!(run_demo(&LedgerConfig::default(), Some(0)).await.is_err());
        assert!(run_demo(&LedgerConfig::default(), Some(7)).await.is_err());
    }
}
