pub mod file;
pub mod memory;

use crate::core::holding::{Holding, Market};
use anyhow::{Result, anyhow};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Persistence for one holdings table per market.
pub trait HoldingsStore: Send + Sync {
    /// `Ok(None)` means there is nothing usable saved and defaults apply.
    fn load(&self, market: Market) -> Result<Option<Vec<Holding>>>;

    fn save(&self, market: Market, holdings: &[Holding]) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Loaded,
    Seeded,
}

pub fn content_hash(holdings: &[Holding]) -> u64 {
    let mut hasher = DefaultHasher::new();
    for holding in holdings {
        holding.category.hash(&mut hasher);
        holding.name.hash(&mut hasher);
        holding.code.hash(&mut hasher);
        holding.shares.to_bits().hash(&mut hasher);
        holding.manual_price.map(f64::to_bits).hash(&mut hasher);
    }
    hasher.finish()
}

/// In-memory holdings table for one market, written back only when it changes.
pub struct HoldingsRepository {
    store: Arc<dyn HoldingsStore>,
    market: Market,
    holdings: Vec<Holding>,
    saved_hash: u64,
    source: LoadSource,
    load_warning: Option<String>,
}

impl HoldingsRepository {
    /// Loads the saved table, falling back to the market's seed table when
    /// nothing usable is stored or the read fails.
    pub fn open(store: Arc<dyn HoldingsStore>, market: Market) -> Self {
        let (holdings, source, load_warning) = match store.load(market) {
            Ok(Some(holdings)) => (holdings, LoadSource::Loaded, None),
            Ok(None) => {
                debug!("Seeding default holdings for {}", market);
                (market.seed_holdings(), LoadSource::Seeded, None)
            }
            Err(e) => {
                warn!("Failed to load holdings for {}: {:#}", market, e);
                (
                    market.seed_holdings(),
                    LoadSource::Seeded,
                    Some(format!("{e:#}")),
                )
            }
        };
        let saved_hash = content_hash(&holdings);
        Self {
            store,
            market,
            holdings,
            saved_hash,
            source,
            load_warning,
        }
    }

    pub fn market(&self) -> Market {
        self.market
    }

    pub fn holdings(&self) -> &[Holding] {
        &self.holdings
    }

    pub fn source(&self) -> LoadSource {
        self.source
    }

    pub fn load_warning(&self) -> Option<&str> {
        self.load_warning.as_deref()
    }

    pub fn add(&mut self, holding: Holding) {
        self.holdings.push(holding);
    }

    pub fn remove(&mut self, index: usize) -> Result<Holding> {
        if index >= self.holdings.len() {
            return Err(anyhow!("No holding at row {} in {}", index, self.market));
        }
        Ok(self.holdings.remove(index))
    }

    pub fn update(&mut self, index: usize, holding: Holding) -> Result<()> {
        let slot = self
            .holdings
            .get_mut(index)
            .ok_or_else(|| anyhow!("No holding at row {} in {}", index, self.market))?;
        *slot = holding;
        Ok(())
    }

    pub fn set_shares(&mut self, code: &str, shares: f64) -> Result<()> {
        self.find_mut(code)?.shares = shares;
        Ok(())
    }

    pub fn set_manual_price(&mut self, code: &str, manual_price: Option<f64>) -> Result<()> {
        self.find_mut(code)?.manual_price = manual_price;
        Ok(())
    }

    fn find_mut(&mut self, code: &str) -> Result<&mut Holding> {
        let market = self.market;
        self.holdings
            .iter_mut()
            .find(|h| h.code == code)
            .ok_or_else(|| anyhow!("No holding with code {} in {}", code, market))
    }

    pub fn is_dirty(&self) -> bool {
        content_hash(&self.holdings) != self.saved_hash
    }

    /// Writes the table if its content differs from the last successful write.
    ///
    /// Returns whether a write happened. An empty table is never written; on
    /// error the in-memory table is kept and the next call tries again.
    pub fn persist_if_changed(&mut self) -> Result<bool> {
        if self.holdings.is_empty() {
            debug!("Not persisting empty table for {}", self.market);
            return Ok(false);
        }
        let current = content_hash(&self.holdings);
        if current == self.saved_hash {
            return Ok(false);
        }
        self.store.save(self.market, &self.holdings)?;
        self.saved_hash = current;
        info!("Saved {} holdings for {}", self.holdings.len(), self.market);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::holding::Category;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct MemoryHoldingsStore {
        tables: Mutex<Vec<(Market, Vec<Holding>)>>,
        saves: AtomicUsize,
        fail_writes: AtomicBool,
        fail_reads: bool,
    }

    impl HoldingsStore for MemoryHoldingsStore {
        fn load(&self, market: Market) -> Result<Option<Vec<Holding>>> {
            if self.fail_reads {
                return Err(anyhow!("disk on fire"));
            }
            let tables = self.tables.lock().unwrap();
            Ok(tables
                .iter()
                .find(|(m, _)| *m == market)
                .map(|(_, h)| h.clone()))
        }

        fn save(&self, market: Market, holdings: &[Holding]) -> Result<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(anyhow!("read-only filesystem"));
            }
            self.saves.fetch_add(1, Ordering::SeqCst);
            let mut tables = self.tables.lock().unwrap();
            tables.retain(|(m, _)| *m != market);
            tables.push((market, holdings.to_vec()));
            Ok(())
        }
    }

    #[test]
    fn test_open_seeds_when_nothing_saved() {
        let store = Arc::new(MemoryHoldingsStore::default());
        let repo = HoldingsRepository::open(store.clone(), Market::Us);

        assert_eq!(repo.source(), LoadSource::Seeded);
        assert_eq!(repo.holdings(), Market::Us.seed_holdings().as_slice());
        assert!(!repo.is_dirty());
        assert!(repo.load_warning().is_none());
    }

    #[test]
    fn test_open_falls_back_on_read_error() {
        let store = Arc::new(MemoryHoldingsStore {
            fail_reads: true,
            ..Default::default()
        });
        let repo = HoldingsRepository::open(store, Market::Cn);

        assert_eq!(repo.source(), LoadSource::Seeded);
        assert_eq!(repo.holdings().len(), 11);
        assert!(repo.load_warning().unwrap().contains("disk on fire"));
    }

    #[test]
    fn test_persist_only_when_changed() -> Result<()> {
        let store = Arc::new(MemoryHoldingsStore::default());
        let mut repo = HoldingsRepository::open(store.clone(), Market::Us);

        assert!(!repo.persist_if_changed()?);
        assert_eq!(store.saves.load(Ordering::SeqCst), 0);

        repo.set_shares("SPY", 10.0)?;
        assert!(repo.is_dirty());
        assert!(repo.persist_if_changed()?);
        assert!(!repo.persist_if_changed()?);
        assert_eq!(store.saves.load(Ordering::SeqCst), 1);

        // Changing a value and back again is not a change
        repo.set_manual_price("SPY", Some(1.0))?;
        repo.set_manual_price("SPY", None)?;
        assert!(!repo.persist_if_changed()?);

        let reopened = HoldingsRepository::open(store, Market::Us);
        assert_eq!(reopened.source(), LoadSource::Loaded);
        assert_eq!(reopened.holdings()[0].shares, 10.0);
        Ok(())
    }

    #[test]
    fn test_failed_write_keeps_memory_and_retries() -> Result<()> {
        let store = Arc::new(MemoryHoldingsStore::default());
        let mut repo = HoldingsRepository::open(store.clone(), Market::Us);

        store.fail_writes.store(true, Ordering::SeqCst);
        repo.add(Holding::new(Category::Gold, "IAU", "IAU").with_position(5.0, None));
        assert!(repo.persist_if_changed().is_err());
        assert!(repo.is_dirty());
        assert_eq!(repo.holdings().len(), 9);

        store.fail_writes.store(false, Ordering::SeqCst);
        assert!(repo.persist_if_changed()?);
        assert!(!repo.is_dirty());
        Ok(())
    }

    #[test]
    fn test_edit_operations() -> Result<()> {
        let store = Arc::new(MemoryHoldingsStore::default());
        let mut repo = HoldingsRepository::open(store, Market::Cn);

        let removed = repo.remove(0)?;
        assert_eq!(removed.code, "110020");
        assert!(repo.remove(99).is_err());

        let replacement = Holding::new(Category::Satellite, "Moutai", "600519.SS");
        repo.update(0, replacement.clone())?;
        assert_eq!(repo.holdings()[0], replacement);
        assert!(repo.update(42, replacement).is_err());

        repo.set_manual_price("CASH_CNY", Some(80000.0))?;
        assert!(repo.set_shares("NOPE", 1.0).is_err());
        Ok(())
    }

    #[test]
    fn test_empty_table_is_not_written() -> Result<()> {
        let store = Arc::new(MemoryHoldingsStore::default());
        let mut repo = HoldingsRepository::open(store.clone(), Market::Us);
        while !repo.holdings().is_empty() {
            repo.remove(0)?;
        }
        assert!(!repo.persist_if_changed()?);
        assert_eq!(store.saves.load(Ordering::SeqCst), 0);
        Ok(())
    }

    #[test]
    fn test_content_hash_tracks_every_column() {
        let base = vec![Holding::new(Category::Stock, "SPY", "SPY").with_position(1.0, None)];
        let mut changed = base.clone();
        changed[0].manual_price = Some(1.0);
        assert_ne!(content_hash(&base), content_hash(&changed));
        let mut changed = base.clone();
        changed[0].category = "Bond (长债)".to_string();
        assert_ne!(content_hash(&base), content_hash(&changed));
        assert_eq!(content_hash(&base), content_hash(&base.clone()));
    }
}
