use super::ui;
use crate::core::aggregate::{self, PortfolioSnapshot, format_amount};
use crate::core::alert::{self, NotificationLedger, Notifier};
use crate::core::holding::{Holding, Market};
use crate::core::resolver::{PriceResolver, PriceSource, is_cash_code};
use crate::store::HoldingsRepository;
use anyhow::Result;
use comfy_table::Cell;
use futures::future::join_all;
use std::collections::BTreeSet;
use tracing::debug;

/// Warms the resolver cache for every code that needs the oracle.
pub async fn prefetch_prices(holdings: &[Holding], resolver: &PriceResolver) {
    let codes: BTreeSet<&str> = holdings
        .iter()
        .filter(|h| !h.manual_price.is_some_and(|m| m > 0.0))
        .map(|h| h.code.trim())
        .filter(|code| !code.is_empty() && !is_cash_code(code))
        .collect();
    if codes.is_empty() {
        return;
    }
    debug!("Prefetching {} prices", codes.len());

    let pb = ui::new_progress_bar(codes.len() as u64, true);
    pb.set_message("Fetching prices...");
    let lookups = codes.iter().map(|code| {
        let pb = pb.clone();
        async move {
            resolver.oracle_price(code).await;
            pb.inc(1);
        }
    });
    join_all(lookups).await;
    pb.finish_and_clear();
}

pub async fn snapshot(repository: &HoldingsRepository, resolver: &PriceResolver) -> PortfolioSnapshot {
    let market = repository.market();
    if let Some(warning) = repository.load_warning() {
        ui::print_warning(&format!(
            "Could not load saved {market} holdings, showing defaults: {warning}"
        ));
    }
    prefetch_prices(repository.holdings(), resolver).await;
    aggregate::evaluate(repository.holdings(), resolver, market.currency_symbol()).await
}

pub async fn run(
    repositories: &[HoldingsRepository],
    resolver: &PriceResolver,
    notifier: Option<&dyn Notifier>,
) -> Result<()> {
    let mut ledger = NotificationLedger::new();
    let today = chrono::Local::now().date_naive();

    for repository in repositories {
        let market = repository.market();
        let snapshot = snapshot(repository, resolver).await;
        display_allocation_table(market, &snapshot);

        if let Some(notifier) = notifier {
            let sent = alert::dispatch(&snapshot.alerts, market, today, &mut ledger, notifier);
            debug!("Sent {} notifications for {}", sent, market);
        }
        ui::print_separator();
    }
    Ok(())
}

fn display_allocation_table(market: Market, snapshot: &PortfolioSnapshot) {
    let symbol = market.currency_symbol();
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Category"),
        ui::header_cell("Holdings"),
        ui::header_cell("Value"),
        ui::header_cell("Current"),
        ui::header_cell("Target"),
        ui::header_cell("Min"),
        ui::header_cell("Max"),
        ui::header_cell("Status"),
    ]);

    for alert in &snapshot.alerts {
        table.add_row(vec![
            Cell::new(alert.category.label()),
            Cell::new(ui::style_text(
                &alert.composition_line(),
                ui::StyleType::Subtle,
            )),
            ui::right_cell(format!("{symbol}{}", format_amount(alert.total_value))),
            ui::percentage_cell(alert.percentage),
            ui::percentage_cell(alert.target),
            ui::percentage_cell(alert.min),
            ui::percentage_cell(alert.max),
            ui::status_cell(alert.status),
        ]);
    }

    println!(
        "\n{}\n",
        ui::style_text(&format!("{market} strategic balance"), ui::StyleType::Title)
    );
    println!("{table}");
    println!(
        "\n{} {}",
        ui::style_text("Total assets:", ui::StyleType::TotalLabel),
        ui::style_text(
            &format!("{symbol}{}", format_amount(snapshot.invested_total)),
            ui::StyleType::TotalValue
        )
    );

    for row in &snapshot.rows {
        match &row.source {
            PriceSource::Failed(e) => ui::print_warning(&format!(
                "No price for {} ({}), counted as zero: {e}",
                row.name, row.code
            )),
            PriceSource::Stale(e) => ui::print_warning(&format!(
                "Using last known price for {} ({}): {e}",
                row.name, row.code
            )),
            _ => {}
        }
        if row.category.is_none() {
            ui::print_warning(&format!(
                "{} ({}) has no recognised category and is left out of the balance table",
                row.name, row.code
            ));
        }
    }
}
