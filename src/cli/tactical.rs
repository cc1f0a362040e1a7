use super::ui;
use crate::core::resolver::PriceResolver;
use crate::core::tactical::{self, Signal};
use crate::store::HoldingsRepository;
use anyhow::Result;
use comfy_table::{Cell, Color};

pub async fn run(cn: &HoldingsRepository, resolver: &PriceResolver) -> Result<()> {
    let readings = tactical::check(cn.holdings(), resolver).await;

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Instrument"),
        ui::header_cell("Price"),
        ui::header_cell("Levels"),
        ui::header_cell("Signal"),
    ]);

    for reading in &readings {
        let rule = reading.rule;
        let levels = match rule.buy_below {
            Some(buy) => format!("stop {:.2} / buy {:.2}", rule.stop_loss, buy),
            None => format!("stop {:.2}", rule.stop_loss),
        };
        let signal_cell = match reading.signal {
            Some(signal @ (Signal::StopLoss | Signal::Buy)) => {
                Cell::new(signal.to_string()).fg(Color::Red)
            }
            Some(Signal::Hold) => Cell::new(Signal::Hold.to_string()).fg(Color::Green),
            None => Cell::new("N/A").fg(Color::DarkGrey),
        };
        table.add_row(vec![
            Cell::new(format!("{} ({})", rule.name, rule.code)),
            ui::right_cell(format!("¥{:.2}", reading.price)),
            Cell::new(levels),
            signal_cell,
        ]);
    }

    println!(
        "\n{}\n",
        ui::style_text("Satellite tactical signals", ui::StyleType::Title)
    );
    println!("{table}");
    Ok(())
}
