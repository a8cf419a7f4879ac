use crate::core::error::StoreError;
use crate::core::row::{ISO_FORMAT, IndexRow};
use crate::store::RowStore;
use anyhow::Result;
use async_trait::async_trait;
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use std::path::Path;
use tracing::debug;

const PARTITION: &str = "index_rows";

/// Local row store backed by a fjall keyspace.
///
/// Keys are `symbol\0YYYY-MM-DD`, so a write for an existing `(date, symbol)`
/// pair replaces the previous value.
pub struct FjallRowStore {
    keyspace: Keyspace,
    rows: PartitionHandle,
}

impl FjallRowStore {
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)?;
        let keyspace = Config::new(path).open()?;
        let rows = keyspace.open_partition(PARTITION, PartitionCreateOptions::default())?;
        debug!("Opened local store at {}", path.display());
        Ok(Self { keyspace, rows })
    }

    fn key(row: &IndexRow) -> Vec<u8> {
        format!("{}\0{}", row.symbol, row.date.format(ISO_FORMAT)).into_bytes()
    }
}

#[async_trait]
impl RowStore for FjallRowStore {
    async fn load_all(&self) -> Result<Vec<IndexRow>, StoreError> {
        let read = || -> Result<Vec<IndexRow>> {
            let mut rows = Vec::new();
            for item in self.rows.iter() {
                let (_key, value) = item?;
                rows.push(serde_json::from_slice(&value)?);
            }
            Ok(rows)
        };
        let rows = read().map_err(StoreError::Read)?;
        debug!("Loaded {} rows from local store", rows.len());
        Ok(rows)
    }

    async fn upsert_batch(&self, rows: &[IndexRow]) -> Result<(), StoreError> {
        let write = || -> Result<()> {
            let mut batch = self.keyspace.batch();
            for row in rows {
                batch.insert(&self.rows, Self::key(row), serde_json::to_vec(row)?);
            }
            batch.commit()?;
            self.keyspace.persist(PersistMode::SyncAll)?;
            Ok(())
        };
        write().map_err(StoreError::Write)?;
        debug!("Upserted {} rows into local store", rows.len());
        Ok(())
    }
}
