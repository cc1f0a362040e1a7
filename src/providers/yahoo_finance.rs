use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::core::currency::CurrencyRateProvider;
use crate::core::price::{PriceProvider, PriceResult};
use crate::providers::util::with_retry;

const USER_AGENT: &str = "tierfolio/0.1";

fn http_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder().user_agent(USER_AGENT).build()?)
}

#[derive(Deserialize, Debug)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Deserialize, Debug)]
struct ChartResult {
    result: Option<Vec<ChartItem>>,
}

#[derive(Deserialize, Debug)]
struct Indicators {
    quote: Vec<Quote>,
}

#[derive(Deserialize, Debug)]
struct Quote {
    close: Option<Vec<Option<f64>>>,
}

#[derive(Deserialize, Debug)]
struct ChartItem {
    meta: ChartMeta,
    indicators: Option<Indicators>,
}

#[derive(Deserialize, Debug)]
struct ChartMeta {
    #[serde(alias = "regularMarketPrice")]
    regular_market_price: Option<f64>,
    currency: Option<String>,
    #[serde(alias = "shortName")]
    short_name: Option<String>,
}

impl ChartItem {
    /// Most recent non-empty daily close, else the live market price.
    fn latest_close(&self) -> Option<f64> {
        self.indicators
            .as_ref()
            .and_then(|inds| inds.quote.first())
            .and_then(|q| q.close.as_ref())
            .and_then(|closes| closes.iter().rev().find_map(|c| *c))
            .or(self.meta.regular_market_price)
    }
}

async fn fetch_chart(base_url: &str, symbol: &str, retries: usize) -> Result<ChartItem> {
    let url = format!("{base_url}/v8/finance/chart/{symbol}?interval=1d&range=5d");
    debug!("Requesting chart data from {}", url);

    let client = http_client()?;
    let response = with_retry(|| async { client.get(&url).send().await }, retries, 300)
        .await
        .map_err(|e| anyhow!("Request error: {} for symbol: {}", e, symbol))?;

    if !response.status().is_success() {
        return Err(anyhow!(
            "HTTP error: {} for symbol: {}",
            response.status(),
            symbol
        ));
    }

    let text = response.text().await?;
    let data: ChartResponse = serde_json::from_str(&text)
        .map_err(|e| anyhow!("Failed to parse JSON response for {}: {}", symbol, e))?;

    data.chart
        .result
        .and_then(|items| items.into_iter().next())
        .ok_or_else(|| anyhow!("No price data found for symbol: {}", symbol))
}

/// Latest close prices from the Yahoo Finance chart API.
pub struct YahooFinanceProvider {
    base_url: String,
    retries: usize,
}

impl YahooFinanceProvider {
    pub fn new(base_url: &str, retries: usize) -> Self {
        YahooFinanceProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            retries,
        }
    }
}

#[async_trait]
impl PriceProvider for YahooFinanceProvider {
    #[instrument(
        name = "YahooPriceFetch",
        skip(self),
        fields(symbol = %symbol)
    )]
    async fn fetch_price(&self, symbol: &str) -> Result<PriceResult> {
        let item = fetch_chart(&self.base_url, symbol, self.retries).await?;
        let price = item
            .latest_close()
            .ok_or_else(|| anyhow!("No close price in response for symbol: {}", symbol))?;

        Ok(PriceResult {
            price,
            currency: item.meta.currency.unwrap_or_default(),
            short_name: item.meta.short_name,
        })
    }
}

/// Exchange rates from Yahoo Finance currency pairs such as `USDCNY=X`.
pub struct YahooCurrencyProvider {
    base_url: String,
    retries: usize,
}

impl YahooCurrencyProvider {
    pub fn new(base_url: &str, retries: usize) -> Self {
        YahooCurrencyProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            retries,
        }
    }
}

#[async_trait]
impl CurrencyRateProvider for YahooCurrencyProvider {
    async fn get_rate(&self, from: &str, to: &str) -> Result<f64> {
        let symbol = format!("{from}{to}=X");
        let item = fetch_chart(&self.base_url, &symbol, self.retries)
            .await
            .map_err(|e| anyhow!("Currency pair {}: {}", symbol, e))?;
        item.latest_close()
            .ok_or_else(|| anyhow!("No rate data found for currency pair: {}", symbol))
    }
}
