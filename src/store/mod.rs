pub mod disk;
pub mod memory;
pub mod supabase;

use crate::core::config::{AppConfig, StoreConfig};
use crate::core::error::StoreError;
use crate::core::row::IndexRow;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use disk::FjallRowStore;
use memory::MemoryRowStore;
use supabase::SupabaseRowStore;
use tracing::{debug, error, info, warn};

/// Persistent home of canonical rows, keyed on `(date, symbol)`.
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Returns every stored row, unfiltered.
    async fn load_all(&self) -> Result<Vec<IndexRow>, StoreError>;

    /// Inserts or replaces `rows`; a row with an existing key overwrites it.
    async fn upsert_batch(&self, rows: &[IndexRow]) -> Result<(), StoreError>;
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PersistReport {
    pub saved: usize,
    /// Keys of rows that could not be written even individually.
    pub failed: Vec<(String, NaiveDate)>,
}

/// Upserts `rows` in batches of `batch_size`.
///
/// A failed batch is retried row by row so one bad record does not block the
/// rest; rows that still fail are reported and dropped.
pub async fn persist_rows(
    store: &dyn RowStore,
    rows: &[IndexRow],
    batch_size: usize,
) -> PersistReport {
    let mut report = PersistReport::default();
    if rows.is_empty() {
        debug!("No rows to persist");
        return report;
    }

    for (n, batch) in rows.chunks(batch_size.max(1)).enumerate() {
        match store.upsert_batch(batch).await {
            Ok(()) => {
                report.saved += batch.len();
                debug!("Saved batch {}: {} rows", n + 1, batch.len());
            }
            Err(e) => {
                warn!("Error saving batch {}: {}. Retrying rows individually", n + 1, e);
                for row in batch {
                    match store.upsert_batch(std::slice::from_ref(row)).await {
                        Ok(()) => report.saved += 1,
                        Err(e) => {
                            error!(
                                "Failed to save row ({}, {}): {}",
                                row.symbol, row.date, e
                            );
                            report.failed.push((row.symbol.clone(), row.date));
                        }
                    }
                }
            }
        }
    }

    info!("Saved {} rows ({} failed)", report.saved, report.failed.len());
    report
}

/// Opens the store selected by configuration.
pub fn open_store(config: &AppConfig) -> Result<Box<dyn RowStore>> {
    let store: Box<dyn RowStore> = match &config.store {
        StoreConfig::Local { path } => {
            let path = match path {
                Some(path) => path.into(),
                None => AppConfig::default_data_path()?.join("rows"),
            };
            Box::new(
                FjallRowStore::open(&path)
                    .with_context(|| format!("Failed to open local store at {}", path.display()))?,
            )
        }
        StoreConfig::Supabase(supabase) => {
            let settings = supabase.resolve()?;
            Box::new(SupabaseRowStore::new(
                &settings.url,
                &settings.key,
                &settings.table,
            )?)
        }
        StoreConfig::Memory => Box::new(MemoryRowStore::new()),
    };
    Ok(store)
}
