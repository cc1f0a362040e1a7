use crate::core::holding::{Holding, Market};
use crate::store::HoldingsStore;
use anyhow::{Context, Result};
use csv::StringRecord;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const HEADER: [&str; 5] = ["category", "name", "code", "shares", "manual_price"];

/// One CSV file per market inside a data directory.
pub struct CsvHoldingsStore {
    dir: PathBuf,
}

impl CsvHoldingsStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, market: Market) -> PathBuf {
        self.dir.join(market.file_name())
    }
}

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

impl HoldingsStore for CsvHoldingsStore {
    fn load(&self, market: Market) -> Result<Option<Vec<Holding>>> {
        let path = self.path_for(market);
        let is_empty = match fs::metadata(&path) {
            Ok(meta) => meta.len() == 0,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No holdings file at {}", path.display());
                return Ok(None);
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to stat {}", path.display()));
            }
        };
        if is_empty {
            debug!("Holdings file {} is empty", path.display());
            return Ok(None);
        }

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&path)
            .with_context(|| format!("Failed to open holdings file: {}", path.display()))?;

        let headers = reader
            .headers()
            .with_context(|| format!("Failed to read header of {}", path.display()))?;
        let columns: Vec<&str> = headers
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim())
            .collect();
        if columns != HEADER {
            debug!("Unexpected columns in {}: {:?}", path.display(), columns);
            return Ok(None);
        }
        // Field names must match the struct exactly for deserialization.
        reader.set_headers(StringRecord::from(HEADER.to_vec()));

        let holdings = reader
            .deserialize::<Holding>()
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("Failed to read rows in {}", path.display()))?;

        if holdings.is_empty() {
            return Ok(None);
        }
        debug!("Loaded {} holdings from {}", holdings.len(), path.display());
        Ok(Some(holdings))
    }

    fn save(&self, market: Market, holdings: &[Holding]) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create directory: {}", self.dir.display()))?;
        let path = self.path_for(market);
        let tmp_path = path.with_extension("csv.tmp");

        // BOM first so spreadsheet tools read the CJK names as UTF-8.
        let mut file = fs::File::create(&tmp_path)
            .with_context(|| format!("Failed to create {}", tmp_path.display()))?;
        file.write_all(UTF8_BOM)
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer.write_record(HEADER)?;
        for holding in holdings {
            writer.serialize(holding)?;
        }
        writer
            .flush()
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        drop(writer);

        fs::rename(&tmp_path, &path)
            .with_context(|| format!("Failed to replace {}", path.display()))?;
        debug!("Saved {} holdings to {}", holdings.len(), path.display());
        Ok(())
    }
}
