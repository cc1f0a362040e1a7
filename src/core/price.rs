//! Pricing abstractions and core types

use anyhow::Result;
use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq)]
pub struct PriceResult {
    pub price: f64,
    pub currency: String,
    pub short_name: Option<String>,
}

/// Latest close price lookup for an instrument code.
#[async_trait]
pub trait PriceProvider: Send + Sync {
    async fn fetch_price(&self, symbol: &str) -> Result<PriceResult>;
}
