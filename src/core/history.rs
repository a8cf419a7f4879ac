//! Raw history abstractions implemented by data providers

use crate::core::row::DateWindow;
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

/// One day of index prices exactly as the provider reports it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPriceRecord {
    #[serde(rename = "HistoricalDate")]
    pub date: String,
    #[serde(rename = "OPEN", default)]
    pub open: Option<Value>,
    #[serde(rename = "HIGH", default)]
    pub high: Option<Value>,
    #[serde(rename = "LOW", default)]
    pub low: Option<Value>,
    #[serde(rename = "CLOSE", default)]
    pub close: Option<Value>,
}

/// One day of valuation metrics exactly as the provider reports it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawValuationRecord {
    #[serde(rename = "DATE")]
    pub date: String,
    #[serde(default)]
    pub pe: Option<Value>,
    #[serde(default)]
    pub pb: Option<Value>,
    #[serde(rename = "divYield", default)]
    pub div_yield: Option<Value>,
}

#[async_trait]
pub trait HistoryProvider: Send + Sync {
    async fn fetch_price_history(
        &self,
        index: &str,
        window: &DateWindow,
    ) -> Result<Vec<RawPriceRecord>>;

    async fn fetch_valuation_history(
        &self,
        index: &str,
        window: &DateWindow,
    ) -> Result<Vec<RawValuationRecord>>;
}

/// Source of index names to process when none are configured.
#[async_trait]
pub trait IndexCatalog: Send + Sync {
    async fn fetch_equity_indices(&self) -> Result<Vec<String>>;
}
