pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

use crate::cli::holdings::HoldingsEdit;
use crate::cli::notify::ConsoleNotifier;
use crate::core::alert::Notifier;
use crate::core::config::AppConfig;
use crate::core::holding::Market;
use crate::core::resolver::PriceResolver;
use crate::providers::yahoo_finance::{YahooCurrencyProvider, YahooFinanceProvider};
use crate::store::file::CsvHoldingsStore;
use crate::store::{HoldingsRepository, HoldingsStore};
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    /// Balance table for one market, or both when `None`
    Alloc(Option<Market>),
    Summary,
    Tactical,
    Holdings(Market, HoldingsEdit),
}

fn build_resolver(config: &AppConfig) -> PriceResolver {
    let base_url = config.yahoo_base_url();
    PriceResolver::new(
        Arc::new(YahooFinanceProvider::new(base_url, config.retries)),
        Arc::new(YahooCurrencyProvider::new(base_url, config.retries)),
    )
    .with_ttls(config.price_ttl(), config.rate_ttl())
    .with_failure_ttl(config.failure_ttl())
    .with_timeout(config.request_timeout())
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("tierfolio starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let store: Arc<dyn HoldingsStore> = Arc::new(CsvHoldingsStore::new(config.data_dir()?));
    let resolver = build_resolver(&config);
    let notifier = ConsoleNotifier;

    match command {
        AppCommand::Alloc(market) => {
            let markets = market.map_or(Market::ALL.to_vec(), |m| vec![m]);
            let repositories: Vec<HoldingsRepository> = markets
                .into_iter()
                .map(|m| HoldingsRepository::open(Arc::clone(&store), m))
                .collect();
            let notifier = config
                .notifications
                .then_some(&notifier as &dyn Notifier);
            cli::alloc::run(&repositories, &resolver, notifier).await
        }
        AppCommand::Summary => {
            let us = HoldingsRepository::open(Arc::clone(&store), Market::Us);
            let cn = HoldingsRepository::open(Arc::clone(&store), Market::Cn);
            cli::summary::run(&us, &cn, &resolver).await
        }
        AppCommand::Tactical => {
            let cn = HoldingsRepository::open(Arc::clone(&store), Market::Cn);
            cli::tactical::run(&cn, &resolver).await
        }
        AppCommand::Holdings(market, edit) => {
            let mut repository = HoldingsRepository::open(Arc::clone(&store), market);
            cli::holdings::run(&mut repository, edit)
        }
    }
}
