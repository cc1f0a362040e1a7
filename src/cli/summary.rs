use super::{alloc, ui};
use crate::core::aggregate::{PortfolioSnapshot, format_amount};
use crate::core::holding::Market;
use crate::core::resolver::{PriceResolver, PriceSource};
use crate::store::HoldingsRepository;
use anyhow::Result;
use comfy_table::Cell;

/// Combined value of both markets in CNY.
pub fn global_total_cny(us: &PortfolioSnapshot, cn: &PortfolioSnapshot, usd_cny: f64) -> f64 {
    us.invested_total * usd_cny + cn.invested_total
}

pub async fn run(
    us: &HoldingsRepository,
    cn: &HoldingsRepository,
    resolver: &PriceResolver,
) -> Result<()> {
    let rate = resolver.usd_cny_detailed().await;
    let us_snapshot = alloc::snapshot(us, resolver).await;
    let cn_snapshot = alloc::snapshot(cn, resolver).await;

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Market"),
        ui::header_cell("Total"),
        ui::header_cell("Out of band"),
    ]);
    for (market, snapshot) in [(Market::Us, &us_snapshot), (Market::Cn, &cn_snapshot)] {
        let flagged: Vec<&str> = snapshot
            .alerts
            .iter()
            .filter(|a| a.status.needs_attention())
            .map(|a| a.category.label())
            .collect();
        table.add_row(vec![
            Cell::new(market.display_name()),
            ui::right_cell(format!(
                "{}{}",
                market.currency_symbol(),
                format_amount(snapshot.invested_total)
            )),
            Cell::new(flagged.join(", ")),
        ]);
    }

    println!(
        "\n{}\n",
        ui::style_text("Portfolio summary", ui::StyleType::Title)
    );
    println!("{table}");

    let rate_note = match &rate.source {
        PriceSource::Failed(_) => " (default)",
        PriceSource::Stale(_) => " (last known)",
        _ => "",
    };
    println!("\nExchange rate: 1 USD = {:.2} CNY{}", rate.price, rate_note);
    println!(
        "{} {}",
        ui::style_text("Global total:", ui::StyleType::TotalLabel),
        ui::style_text(
            &format!(
                "¥{}",
                format_amount(global_total_cny(&us_snapshot, &cn_snapshot, rate.price))
            ),
            ui::StyleType::TotalValue
        )
    );
    Ok(())
}
