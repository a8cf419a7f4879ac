use crate::core::error::StoreError;
use crate::core::row::IndexRow;
use crate::store::RowStore;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// In-memory row store, used for dry runs and tests
#[derive(Clone, Default)]
pub struct MemoryRowStore {
    inner: Arc<Mutex<BTreeMap<(String, NaiveDate), IndexRow>>>,
}

impl MemoryRowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: Vec<IndexRow>) -> Self {
        let map = rows
            .into_iter()
            .map(|row| ((row.symbol.clone(), row.date), row))
            .collect();
        Self {
            inner: Arc::new(Mutex::new(map)),
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}

#[async_trait]
impl RowStore for MemoryRowStore {
    async fn load_all(&self) -> Result<Vec<IndexRow>, StoreError> {
        let rows = self.inner.lock().await;
        debug!("Loaded {} rows from memory", rows.len());
        Ok(rows.values().cloned().collect())
    }

    async fn upsert_batch(&self, rows: &[IndexRow]) -> Result<(), StoreError> {
        let mut store = self.inner.lock().await;
        for row in rows {
            store.insert((row.symbol.clone(), row.date), row.clone());
        }
        debug!("Upserted {} rows in memory", rows.len());
        Ok(())
    }
}
