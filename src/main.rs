use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use tierfolio::AppCommand;
use tierfolio::cli::holdings::{HoldingsEdit, parse_category};
use tierfolio::core::holding::{Holding, Market};
use tierfolio::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Show category allocation against target bands
    Alloc {
        /// Only this market (us or cn)
        #[arg(short, long)]
        market: Option<Market>,
    },
    /// Show both markets and the combined total in CNY
    Summary,
    /// Show stop-loss and buy levels for watched satellite positions
    Tactical,
    /// List or edit holdings
    Holdings {
        /// Market to edit (us or cn)
        #[arg(short, long, default_value = "us")]
        market: Market,

        #[command(subcommand)]
        action: Option<HoldingsAction>,
    },
}

#[derive(Subcommand)]
enum HoldingsAction {
    /// List holdings
    List,
    /// Add a holding
    Add {
        /// stock, bond, gold, cash or satellite
        category: String,
        name: String,
        code: String,
        #[arg(default_value_t = 0.0)]
        shares: f64,
        /// Unit price override; for cash rows a value above 10 is the total balance
        #[arg(long)]
        price: Option<f64>,
    },
    /// Remove the holding at a row number
    Remove { index: usize },
    /// Set shares held for a code
    SetShares { code: String, shares: f64 },
    /// Set or clear the manual price for a code
    SetPrice {
        code: String,
        /// Omit to clear the override
        price: Option<f64>,
    },
}

impl TryFrom<HoldingsAction> for HoldingsEdit {
    type Error = anyhow::Error;

    fn try_from(action: HoldingsAction) -> Result<Self> {
        Ok(match action {
            HoldingsAction::List => HoldingsEdit::List,
            HoldingsAction::Add {
                category,
                name,
                code,
                shares,
                price,
            } => HoldingsEdit::Add(
                Holding::new(parse_category(&category)?, &name, &code).with_position(shares, price),
            ),
            HoldingsAction::Remove { index } => HoldingsEdit::Remove(index),
            HoldingsAction::SetShares { code, shares } => HoldingsEdit::SetShares { code, shares },
            HoldingsAction::SetPrice { code, price } => HoldingsEdit::SetPrice { code, price },
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let command = match cli.command {
        Some(Commands::Setup) => return tierfolio::cli::setup::setup(),
        Some(Commands::Alloc { market }) => AppCommand::Alloc(market),
        Some(Commands::Summary) => AppCommand::Summary,
        Some(Commands::Tactical) => AppCommand::Tactical,
        Some(Commands::Holdings { market, action }) => AppCommand::Holdings(
            market,
            action.map_or(Ok(HoldingsEdit::List), HoldingsEdit::try_from)?,
        ),
        None => {
            Cli::command().print_help()?;
            return Ok(());
        }
    };

    let result = tierfolio::run_command(command, cli.config_path.as_deref()).await;
    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
