use super::ui;
use crate::core::holding::{Category, Holding, Market};
use crate::store::{HoldingsRepository, LoadSource};
use anyhow::{Result, anyhow};
use comfy_table::Cell;

/// An edit to one market's holdings table.
#[derive(Debug, Clone, PartialEq)]
pub enum HoldingsEdit {
    List,
    Add(Holding),
    Remove(usize),
    SetShares { code: String, shares: f64 },
    SetPrice { code: String, price: Option<f64> },
}

pub fn parse_category(label: &str) -> Result<Category> {
    Category::from_label(label).ok_or_else(|| {
        anyhow!(
            "Unknown category '{}', expected one of: stock, bond, gold, cash, satellite",
            label
        )
    })
}

/// Applies an edit and writes the table back if it changed.
///
/// Returns whether the table was written. A failed write is reported as a
/// warning; the edit itself still counts.
pub fn apply(repository: &mut HoldingsRepository, edit: HoldingsEdit) -> Result<bool> {
    match edit {
        HoldingsEdit::List => {}
        HoldingsEdit::Add(holding) => repository.add(holding),
        HoldingsEdit::Remove(index) => {
            let removed = repository.remove(index)?;
            println!("Removed {} ({})", removed.name, removed.code);
        }
        HoldingsEdit::SetShares { code, shares } => repository.set_shares(&code, shares)?,
        HoldingsEdit::SetPrice { code, price } => repository.set_manual_price(&code, price)?,
    }

    match repository.persist_if_changed() {
        Ok(saved) => Ok(saved),
        Err(e) => {
            ui::print_warning(&format!(
                "Failed to save {} holdings, changes kept for this session only: {e:#}",
                repository.market()
            ));
            Ok(false)
        }
    }
}

pub fn run(repository: &mut HoldingsRepository, edit: HoldingsEdit) -> Result<()> {
    let saved = apply(repository, edit)?;
    display_holdings(repository.market(), repository);
    if saved {
        println!(
            "{}",
            ui::style_text("💾 Holdings saved", ui::StyleType::Subtle)
        );
    }
    Ok(())
}

fn display_holdings(market: Market, repository: &HoldingsRepository) {
    let symbol = market.currency_symbol();
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("#"),
        ui::header_cell("Category"),
        ui::header_cell("Name"),
        ui::header_cell("Code"),
        ui::header_cell("Shares"),
        ui::header_cell("Manual price"),
    ]);
    for (i, holding) in repository.holdings().iter().enumerate() {
        let category = match holding.category() {
            Some(c) => Cell::new(c.label()),
            None => Cell::new(ui::style_text(&holding.category, ui::StyleType::Error)),
        };
        table.add_row(vec![
            Cell::new(i),
            category,
            Cell::new(&holding.name),
            Cell::new(&holding.code),
            ui::right_cell(holding.shares.to_string()),
            ui::right_cell(
                holding
                    .manual_price
                    .map(|p| format!("{symbol}{p:.2}"))
                    .unwrap_or_default(),
            ),
        ]);
    }

    println!(
        "\n{}\n",
        ui::style_text(&format!("{market} holdings"), ui::StyleType::Title)
    );
    if repository.source() == LoadSource::Seeded {
        println!(
            "{}",
            ui::style_text(
                "No saved holdings yet; showing the starter table. Edits are saved automatically.",
                ui::StyleType::Subtle
            )
        );
    }
    println!("{table}");
}
