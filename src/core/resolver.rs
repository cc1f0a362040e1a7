//! Unit price resolution for holdings.
//!
//! A holding's price comes from, in order: its manual override, the cash
//! convention (anything whose code contains `CASH` is worth 1.0 per unit), or
//! the market data oracle. Oracle answers are cached with a TTL. A failed
//! refresh falls back to the last good value, and otherwise to zero (prices)
//! or [`DEFAULT_USD_CNY`] (exchange rate). Failures are remembered for a
//! short window so a down oracle is asked once per window, not once per row.
//! Resolution never fails outright; the [`PriceSource`] tells callers how the
//! number was obtained.

use crate::core::cache::Cache;
use crate::core::currency::CurrencyRateProvider;
use crate::core::price::PriceProvider;
use crate::store::memory::MemoryCache;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// Substring marking a cash-like instrument that needs no market lookup.
pub const CASH_MARKER: &str = "CASH";

/// USD/CNY rate used when the oracle has never answered.
pub const DEFAULT_USD_CNY: f64 = 7.25;

const USD_CNY_KEY: &str = "USD/CNY";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    #[error("No instrument code to look up")]
    EmptyCode,
    #[error("Price lookup timed out after {0:?}")]
    Timeout(Duration),
    #[error("Price provider failed: {0}")]
    Provider(String),
    #[error("Price provider returned an unusable value: {0}")]
    InvalidPrice(f64),
}

/// Where a resolved price came from.
#[derive(Debug, Clone, PartialEq)]
pub enum PriceSource {
    Manual,
    Cash,
    Oracle,
    Cached,
    /// The oracle failed; the last good value was used.
    Stale(ResolveError),
    /// The oracle failed and no previous value exists; the price is a default.
    Failed(ResolveError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub price: f64,
    pub source: PriceSource,
}

impl Resolution {
    fn new(price: f64, source: PriceSource) -> Self {
        Resolution { price, source }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.source, PriceSource::Failed(_))
    }
}

pub fn is_cash_code(code: &str) -> bool {
    code.contains(CASH_MARKER)
}

pub struct PriceResolver {
    prices: Arc<dyn PriceProvider>,
    rates: Arc<dyn CurrencyRateProvider>,
    price_cache: Arc<dyn Cache<String, f64>>,
    rate_cache: Arc<dyn Cache<String, f64>>,
    price_failures: Arc<dyn Cache<String, ResolveError>>,
    rate_failures: Arc<dyn Cache<String, ResolveError>>,
    price_ttl: Duration,
    rate_ttl: Duration,
    failure_ttl: Duration,
    timeout: Duration,
}

/// Value and failure caches for one kind of lookup.
struct LookupCaches<'a> {
    values: &'a dyn Cache<String, f64>,
    failures: &'a dyn Cache<String, ResolveError>,
    ttl: Duration,
}

impl PriceResolver {
    pub fn new(prices: Arc<dyn PriceProvider>, rates: Arc<dyn CurrencyRateProvider>) -> Self {
        PriceResolver {
            prices,
            rates,
            price_cache: Arc::new(MemoryCache::<String, f64>::new()),
            rate_cache: Arc::new(MemoryCache::<String, f64>::new()),
            price_failures: Arc::new(MemoryCache::<String, ResolveError>::new()),
            rate_failures: Arc::new(MemoryCache::<String, ResolveError>::new()),
            price_ttl: Duration::from_secs(15 * 60),
            rate_ttl: Duration::from_secs(60 * 60),
            failure_ttl: Duration::from_secs(60),
            timeout: Duration::from_secs(4),
        }
    }

    pub fn with_ttls(mut self, price_ttl: Duration, rate_ttl: Duration) -> Self {
        self.price_ttl = price_ttl;
        self.rate_ttl = rate_ttl;
        self
    }

    /// How long a failed lookup is answered from memory before the oracle is
    /// asked again.
    pub fn with_failure_ttl(mut self, failure_ttl: Duration) -> Self {
        self.failure_ttl = failure_ttl;
        self
    }

    fn price_caches(&self) -> LookupCaches<'_> {
        LookupCaches {
            values: self.price_cache.as_ref(),
            failures: self.price_failures.as_ref(),
            ttl: self.price_ttl,
        }
    }

    fn rate_caches(&self) -> LookupCaches<'_> {
        LookupCaches {
            values: self.rate_cache.as_ref(),
            failures: self.rate_failures.as_ref(),
            ttl: self.rate_ttl,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn resolve(&self, code: &str, manual: Option<f64>) -> f64 {
        self.resolve_detailed(code, manual).await.price
    }

    pub async fn resolve_detailed(&self, code: &str, manual: Option<f64>) -> Resolution {
        if let Some(price) = manual.filter(|m| *m > 0.0) {
            return Resolution::new(price, PriceSource::Manual);
        }
        if is_cash_code(code) {
            return Resolution::new(1.0, PriceSource::Cash);
        }
        self.oracle_price(code).await
    }

    /// Price straight from the oracle (through the cache), ignoring overrides.
    #[instrument(name = "ResolvePrice", skip(self), fields(code = %code))]
    pub async fn oracle_price(&self, code: &str) -> Resolution {
        let code = code.trim();
        if code.is_empty() {
            return Resolution::new(0.0, PriceSource::Failed(ResolveError::EmptyCode));
        }

        let prices = Arc::clone(&self.prices);
        let fetch = async move {
            let quote = prices.fetch_price(code).await?;
            debug!(
                currency = %quote.currency,
                name = quote.short_name.as_deref().unwrap_or(""),
                "Quote {} for {}",
                quote.price,
                code
            );
            Ok::<_, anyhow::Error>(quote.price)
        };
        match self.lookup(self.price_caches(), code, fetch).await
        {
            Ok(resolution) => resolution,
            Err(e) => {
                warn!("No price for {}: {}", code, e);
                Resolution::new(0.0, PriceSource::Failed(e))
            }
        }
    }

    pub async fn usd_cny(&self) -> f64 {
        self.usd_cny_detailed().await.price
    }

    pub async fn usd_cny_detailed(&self) -> Resolution {
        let rates = Arc::clone(&self.rates);
        let fetch = async move { rates.get_rate("USD", "CNY").await };
        match self.lookup(self.rate_caches(), USD_CNY_KEY, fetch).await
        {
            Ok(resolution) => resolution,
            Err(e) => {
                warn!("No USD/CNY rate, using {}: {}", DEFAULT_USD_CNY, e);
                Resolution::new(DEFAULT_USD_CNY, PriceSource::Failed(e))
            }
        }
    }

    /// Fresh cache entry, else the oracle, else the stale entry.
    ///
    /// A failure is kept for `failure_ttl`; within that window the oracle is
    /// not called again and the stale entry (if any) is served directly.
    async fn lookup<F>(
        &self,
        caches: LookupCaches<'_>,
        key: &str,
        fetch: F,
    ) -> Result<Resolution, ResolveError>
    where
        F: Future<Output = anyhow::Result<f64>> + Send,
    {
        let key = key.to_string();
        if let Some(value) = caches.values.get(&key).await {
            return Ok(Resolution::new(value, PriceSource::Cached));
        }

        let error = match caches.failures.get(&key).await {
            Some(error) => {
                debug!("Recent failure for {}, not asking the oracle", key);
                error
            }
            None => {
                let error = match tokio::time::timeout(self.timeout, fetch).await {
                    Ok(Ok(value)) if value.is_finite() && value > 0.0 => {
                        debug!("Oracle returned {} for {}", value, key);
                        caches.values.put(key, value, Some(caches.ttl)).await;
                        return Ok(Resolution::new(value, PriceSource::Oracle));
                    }
                    Ok(Ok(value)) => ResolveError::InvalidPrice(value),
                    Ok(Err(e)) => ResolveError::Provider(e.to_string()),
                    Err(_) => ResolveError::Timeout(self.timeout),
                };
                caches
                    .failures
                    .put(key.clone(), error.clone(), Some(self.failure_ttl))
                    .await;
                error
            }
        };

        match caches.values.get_stale(&key).await {
            Some(value) => {
                warn!("Refresh failed for {}, using last good value: {}", key, error);
                Ok(Resolution::new(value, PriceSource::Stale(error)))
            }
            None => Err(error),
        }
    }
}
