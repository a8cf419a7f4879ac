use crate::core::error::StoreError;
use crate::core::row::IndexRow;
use crate::store::RowStore;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use tracing::{debug, instrument};

const PAGE_SIZE: usize = 1000;

/// Row store backed by a hosted Postgres table exposed over PostgREST.
pub struct SupabaseRowStore {
    base_url: String,
    table: String,
    client: reqwest::Client,
}

impl SupabaseRowStore {
    pub fn new(base_url: &str, key: &str, table: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert("apikey", HeaderValue::from_str(key).context("Invalid API key")?);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {key}")).context("Invalid API key")?,
        );
        let client = reqwest::Client::builder()
            .user_agent("idxsync/0.1")
            .default_headers(headers)
            .build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            table: table.to_string(),
            client,
        })
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }

    async fn fetch_page(&self, offset: usize) -> Result<Vec<IndexRow>> {
        let url = format!(
            "{}?select=*&order=symbol.asc,date.asc&limit={PAGE_SIZE}&offset={offset}",
            self.table_url()
        );
        debug!("Requesting stored rows from {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Request error for URL: {url}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Select failed with status {status}: {body}"));
        }

        response
            .json::<Vec<IndexRow>>()
            .await
            .context("Failed to parse stored rows")
    }

    async fn post_rows(&self, rows: &[IndexRow]) -> Result<()> {
        let url = format!("{}?on_conflict=date,symbol", self.table_url());
        let response = self
            .client
            .post(&url)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(rows)
            .send()
            .await
            .with_context(|| format!("Request error for URL: {url}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Upsert failed with status {status}: {body}"));
        }
        Ok(())
    }
}

#[async_trait]
impl RowStore for SupabaseRowStore {
    /// Pages until an empty page, since the server may cap pages below `PAGE_SIZE`.
    #[instrument(name = "SupabaseLoadAll", skip(self), fields(table = %self.table))]
    async fn load_all(&self) -> Result<Vec<IndexRow>, StoreError> {
        let mut rows = Vec::new();
        loop {
            let page = self.fetch_page(rows.len()).await.map_err(StoreError::Read)?;
            if page.is_empty() {
                break;
            }
            rows.extend(page);
        }
        debug!("Loaded {} rows from {}", rows.len(), self.table);
        Ok(rows)
    }

    async fn upsert_batch(&self, rows: &[IndexRow]) -> Result<(), StoreError> {
        self.post_rows(rows).await.map_err(StoreError::Write)?;
        debug!("Upserted {} rows into {}", rows.len(), self.table);
        Ok(())
    }
}
