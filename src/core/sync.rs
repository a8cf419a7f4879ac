//! Incremental sync of index history into a row store.
//!
//! A run loads every stored row once, plans and fetches each index in order,
//! retries the failures through [`RetryStrategy::CASCADE`], then deduplicates
//! the accumulated rows and upserts them.

use crate::core::fetch::fetch_rows;
use crate::core::history::HistoryProvider;
use crate::core::planner::{Plan, plan};
use crate::core::retry::{RetryStrategy, run_cascade};
use crate::core::row::{DateWindow, IndexRow};
use crate::store::{PersistReport, RowStore, persist_rows};
use chrono::NaiveDate;
use std::collections::HashSet;
use tracing::{Instrument, info, info_span, warn};

/// Settings for one sync run, with defaults already applied by the caller.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub indices: Vec<String>,
    pub window: DateWindow,
    pub batch_size: usize,
    pub strategies: Vec<RetryStrategy>,
}

impl SyncConfig {
    pub fn new(indices: Vec<String>, window: DateWindow, batch_size: usize) -> Self {
        Self {
            indices,
            window,
            batch_size,
            strategies: RetryStrategy::CASCADE.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Successful,
    Skipped,
    Failed,
}

#[derive(Debug, Default, Clone)]
pub struct SyncSummary {
    pub total: usize,
    pub successful: Vec<String>,
    pub skipped: Vec<String>,
    /// Indices that failed the planned fetch, before any retry.
    pub failed: Vec<String>,
    pub recovered: Vec<String>,
    pub still_failed: Vec<String>,
    pub rows_added: usize,
    pub duplicates_removed: usize,
    pub persist: PersistReport,
}

pub struct SyncEngine<'a> {
    provider: &'a dyn HistoryProvider,
    store: &'a dyn RowStore,
    config: SyncConfig,
}

impl<'a> SyncEngine<'a> {
    pub fn new(
        provider: &'a dyn HistoryProvider,
        store: &'a dyn RowStore,
        config: SyncConfig,
    ) -> Self {
        Self {
            provider,
            store,
            config,
        }
    }

    /// Runs the sync. `update_callback` is invoked with each index name once
    /// its planned fetch has been classified.
    pub async fn run(&self, update_callback: &(dyn Fn(&str) + Send + Sync)) -> SyncSummary {
        let mut summary = SyncSummary {
            total: self.config.indices.len(),
            ..Default::default()
        };

        let mut rows = match self.store.load_all().await {
            Ok(rows) => {
                info!("Loaded {} existing rows", rows.len());
                rows
            }
            Err(e) => {
                warn!("{}. Continuing as if the store were empty", e);
                Vec::new()
            }
        };

        for (i, symbol) in self.config.indices.iter().enumerate() {
            let span = info_span!("index", symbol = %symbol, n = i + 1, of = summary.total);
            let (outcome, fetched) = self.process(symbol, &rows).instrument(span).await;
            match outcome {
                Outcome::Successful => {
                    summary.rows_added += fetched.len();
                    rows.extend(fetched);
                    summary.successful.push(symbol.clone());
                }
                Outcome::Skipped => summary.skipped.push(symbol.clone()),
                Outcome::Failed => summary.failed.push(symbol.clone()),
            }
            update_callback(symbol);
        }

        if !summary.failed.is_empty() {
            info!("Retrying {} failed indices", summary.failed.len());
            let cascade = run_cascade(
                self.provider,
                summary.failed.clone(),
                &self.config.window,
                &self.config.strategies,
            )
            .await;
            for (symbol, fetched) in cascade.recovered {
                summary.rows_added += fetched.len();
                rows.extend(fetched);
                summary.recovered.push(symbol);
            }
            summary.still_failed = cascade.still_failed;
            if !summary.still_failed.is_empty() {
                warn!(
                    "Still failed after all retry attempts: {}",
                    summary.still_failed.join(", ")
                );
            }
        }

        let (rows, removed) = dedup_rows(rows);
        summary.duplicates_removed = removed;
        if removed > 0 {
            info!("Removed {} duplicate rows", removed);
        }

        summary.persist = persist_rows(self.store, &rows, self.config.batch_size).await;
        summary
    }

    async fn process(&self, symbol: &str, existing: &[IndexRow]) -> (Outcome, Vec<IndexRow>) {
        let window = match plan(symbol, existing, &self.config.window) {
            Plan::Skip { last_date } => {
                info!("{} already up to date (last date: {})", symbol, last_date);
                return (Outcome::Skipped, Vec::new());
            }
            Plan::Fetch(window) => window,
        };

        info!("Fetching {} for {}", window, symbol);
        match fetch_rows(self.provider, symbol, &window).await {
            Ok(fetched) => {
                info!("Added {} rows for {}", fetched.len(), symbol);
                (Outcome::Successful, fetched)
            }
            Err(e) => {
                warn!("No usable data for {}: {}", symbol, e);
                (Outcome::Failed, Vec::new())
            }
        }
    }
}

/// Keeps the first row for every `(symbol, date)` and sorts by that key.
///
/// Returns the surviving rows and how many were dropped.
pub fn dedup_rows(rows: Vec<IndexRow>) -> (Vec<IndexRow>, usize) {
    let before = rows.len();
    let mut seen: HashSet<(String, NaiveDate)> = HashSet::with_capacity(before);
    let mut unique: Vec<IndexRow> = rows
        .into_iter()
        .filter(|row| seen.insert((row.symbol.clone(), row.date)))
        .collect();
    unique.sort_by(|a, b| a.key().cmp(&b.key()));
    let removed = before - unique.len();
    (unique, removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::history::{RawPriceRecord, RawValuationRecord};
    use crate::store::memory::MemoryRowStore;
    use anyhow::{Result, anyhow};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn row(symbol: &str, date: NaiveDate, close: f64) -> IndexRow {
        IndexRow {
            date,
            symbol: symbol.to_string(),
            open: None,
            high: None,
            low: None,
            close,
            pe: None,
            pb: None,
            div_yield: None,
        }
    }

    fn price_records(window: &DateWindow) -> Vec<RawPriceRecord> {
        window
            .start
            .iter_days()
            .take_while(|day| *day <= window.end)
            .map(|day| RawPriceRecord {
                date: day.format("%d %b %Y").to_string(),
                close: Some(json!("1,000.00")),
                ..Default::default()
            })
            .collect()
    }

    #[derive(Clone, Copy)]
    enum Behavior {
        /// One price record per day of the requested window.
        Daily,
        Raise,
        Empty,
    }

    /// Scripted provider: each index has a queue of behaviors consumed per
    /// price request; the last one repeats.
    struct ScriptedProvider {
        script: HashMap<String, Vec<Behavior>>,
        calls: Mutex<Vec<(String, DateWindow)>>,
        valuation_calls: AtomicUsize,
    }

    impl ScriptedProvider {
        fn new(script: &[(&str, Vec<Behavior>)]) -> Self {
            Self {
                script: script
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect(),
                calls: Mutex::new(Vec::new()),
                valuation_calls: AtomicUsize::new(0),
            }
        }

        fn calls_for(&self, index: &str) -> Vec<DateWindow> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(name, _)| name == index)
                .map(|(_, w)| *w)
                .collect()
        }
    }

    #[async_trait]
    impl HistoryProvider for ScriptedProvider {
        async fn fetch_price_history(
            &self,
            index: &str,
            window: &DateWindow,
        ) -> Result<Vec<RawPriceRecord>> {
            let attempt = {
                let mut calls = self.calls.lock().unwrap();
                calls.push((index.to_string(), *window));
                calls.iter().filter(|(name, _)| name == index).count() - 1
            };
            let behaviors = self
                .script
                .get(index)
                .ok_or_else(|| anyhow!("unknown index {index}"))?;
            let behavior = behaviors[attempt.min(behaviors.len() - 1)];
            match behavior {
                Behavior::Daily => Ok(price_records(window)),
                Behavior::Raise => Err(anyhow!("connection reset")),
                Behavior::Empty => Ok(Vec::new()),
            }
        }

        async fn fetch_valuation_history(
            &self,
            _index: &str,
            _window: &DateWindow,
        ) -> Result<Vec<RawValuationRecord>> {
            self.valuation_calls.fetch_add(1, Ordering::SeqCst);
            Err(anyhow!("valuations unavailable"))
        }
    }

    fn config(indices: &[&str], window: DateWindow) -> SyncConfig {
        SyncConfig::new(indices.iter().map(|s| s.to_string()).collect(), window, 100)
    }

    #[tokio::test]
    async fn test_end_to_end_success_and_unrecoverable_failure() {
        let window = DateWindow::new(d(2024, 1, 1), d(2024, 1, 5));
        let provider = ScriptedProvider::new(&[
            ("IDX_A", vec![Behavior::Daily]),
            ("IDX_B", vec![Behavior::Raise, Behavior::Empty]),
        ]);
        let store = MemoryRowStore::new();
        let engine = SyncEngine::new(&provider, &store, config(&["IDX_A", "IDX_B"], window));

        let progressed = Mutex::new(Vec::new());
        let summary = engine
            .run(&|name| progressed.lock().unwrap().push(name.to_string()))
            .await;

        assert_eq!(summary.successful, vec!["IDX_A"]);
        assert_eq!(summary.failed, vec!["IDX_B"]);
        assert!(summary.skipped.is_empty());
        assert!(summary.recovered.is_empty());
        assert_eq!(summary.still_failed, vec!["IDX_B"]);
        assert_eq!(summary.rows_added, 5);
        assert_eq!(summary.persist.saved, 5);
        assert_eq!(store.len().await, 5);
        assert_eq!(*progressed.lock().unwrap(), vec!["IDX_A", "IDX_B"]);

        // Planned attempt plus one per retry strategy
        assert_eq!(provider.calls_for("IDX_B").len(), 5);
        // Missing valuations still produce price-only rows
        assert!(provider.valuation_calls.load(Ordering::SeqCst) >= 1);
        let stored = store.load_all().await.unwrap();
        assert!(stored.iter().all(|r| r.pe.is_none() && r.close == 1000.0));
    }

    #[tokio::test]
    async fn test_recovered_on_last_year_strategy() {
        let window = DateWindow::new(d(2000, 1, 1), d(2024, 6, 30));
        let provider = ScriptedProvider::new(&[(
            "E",
            vec![Behavior::Raise, Behavior::Raise, Behavior::Daily],
        )]);
        let store = MemoryRowStore::new();
        let engine = SyncEngine::new(&provider, &store, config(&["E"], window));

        let summary = engine.run(&|_| {}).await;

        assert_eq!(summary.failed, vec!["E"]);
        assert_eq!(summary.recovered, vec!["E"]);
        assert!(summary.still_failed.is_empty());

        let calls = provider.calls_for("E");
        assert_eq!(
            calls,
            vec![
                window,
                window,
                DateWindow::new(d(2023, 7, 1), d(2024, 6, 30)),
            ]
        );
        assert_eq!(summary.rows_added, 366);
        assert_eq!(store.len().await, 366);
    }

    #[tokio::test]
    async fn test_cascade_stops_once_everything_recovered() {
        let window = DateWindow::new(d(2024, 1, 1), d(2024, 1, 3));
        let provider = ScriptedProvider::new(&[
            ("A", vec![Behavior::Empty, Behavior::Daily]),
            ("B", vec![Behavior::Raise, Behavior::Daily]),
        ]);
        let store = MemoryRowStore::new();
        let engine = SyncEngine::new(&provider, &store, config(&["A", "B"], window));

        let summary = engine.run(&|_| {}).await;

        assert_eq!(summary.recovered, vec!["A", "B"]);
        assert_eq!(provider.calls_for("A").len(), 2);
        assert_eq!(provider.calls_for("B").len(), 2);
    }

    #[tokio::test]
    async fn test_second_run_skips_everything_and_keeps_row_count() {
        let window = DateWindow::new(d(2024, 1, 1), d(2024, 1, 5));
        let provider = ScriptedProvider::new(&[
            ("IDX_A", vec![Behavior::Daily]),
            ("IDX_C", vec![Behavior::Daily]),
        ]);
        let store = MemoryRowStore::new();

        let first = SyncEngine::new(&provider, &store, config(&["IDX_A", "IDX_C"], window))
            .run(&|_| {})
            .await;
        assert_eq!(first.successful.len(), 2);
        assert_eq!(store.len().await, 10);

        let second = SyncEngine::new(&provider, &store, config(&["IDX_A", "IDX_C"], window))
            .run(&|_| {})
            .await;
        assert_eq!(second.skipped, vec!["IDX_A", "IDX_C"]);
        assert!(second.successful.is_empty());
        assert_eq!(second.rows_added, 0);
        assert_eq!(store.len().await, 10);
        assert_eq!(provider.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_incremental_fetch_starts_after_stored_data() {
        let window = DateWindow::new(d(1990, 1, 1), d(2024, 1, 20));
        let provider = ScriptedProvider::new(&[("E", vec![Behavior::Daily])]);
        let store = MemoryRowStore::with_rows(vec![
            row("E", d(2024, 1, 9), 1.0),
            row("E", d(2024, 1, 10), 1.0),
        ]);
        let engine = SyncEngine::new(&provider, &store, config(&["E"], window));

        let summary = engine.run(&|_| {}).await;

        assert_eq!(
            provider.calls_for("E"),
            vec![DateWindow::new(d(2024, 1, 11), d(2024, 1, 20))]
        );
        assert_eq!(summary.rows_added, 10);
        assert_eq!(store.len().await, 12);
    }

    struct BrokenReads(MemoryRowStore);

    #[async_trait]
    impl RowStore for BrokenReads {
        async fn load_all(&self) -> Result<Vec<IndexRow>, crate::core::error::StoreError> {
            Err(crate::core::error::StoreError::Read(anyhow!("timeout")))
        }

        async fn upsert_batch(
            &self,
            rows: &[IndexRow],
        ) -> Result<(), crate::core::error::StoreError> {
            self.0.upsert_batch(rows).await
        }
    }

    #[tokio::test]
    async fn test_store_read_failure_fetches_full_window() {
        let window = DateWindow::new(d(2024, 1, 1), d(2024, 1, 3));
        let provider = ScriptedProvider::new(&[("E", vec![Behavior::Daily])]);
        let store = BrokenReads(MemoryRowStore::with_rows(vec![row("E", d(2024, 1, 3), 1.0)]));
        let engine = SyncEngine::new(&provider, &store, config(&["E"], window));

        let summary = engine.run(&|_| {}).await;

        assert_eq!(summary.successful, vec!["E"]);
        assert_eq!(provider.calls_for("E"), vec![window]);
        assert_eq!(store.0.len().await, 3);
    }

    #[test]
    fn test_dedup_keeps_first_and_sorts() {
        let rows = vec![
            row("B", d(2024, 1, 2), 1.0),
            row("A", d(2024, 1, 3), 2.0),
            row("B", d(2024, 1, 2), 99.0),
            row("A", d(2024, 1, 1), 3.0),
        ];

        let (unique, removed) = dedup_rows(rows);

        assert_eq!(removed, 1);
        assert_eq!(
            unique,
            vec![
                row("A", d(2024, 1, 1), 3.0),
                row("A", d(2024, 1, 3), 2.0),
                row("B", d(2024, 1, 2), 1.0),
            ]
        );
    }
}
