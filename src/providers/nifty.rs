use crate::core::history::{HistoryProvider, IndexCatalog, RawPriceRecord, RawValuationRecord};
use crate::core::row::DateWindow;
use crate::providers::util::{RetryPolicy, with_retry};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

const PRICE_METHOD: &str = "getHistoricaldatatabletoString";
const VALUATION_METHOD: &str = "getpepbHistoricaldataDBtoString";

/// Historical prices and valuations from the niftyindices.com backpage API,
/// plus the live equity index list.
pub struct NiftyIndicesProvider {
    history_base_url: String,
    live_base_url: String,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl NiftyIndicesProvider {
    pub fn new(history_base_url: &str, live_base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("Mozilla/5.0 (X11; Linux x86_64) idxsync/0.1")
            .build()?;
        Ok(Self {
            history_base_url: history_base_url.trim_end_matches('/').to_string(),
            live_base_url: live_base_url.trim_end_matches('/').to_string(),
            client,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Calls a backpage method whose payload is a JSON array encoded as a string.
    async fn backpage<T: DeserializeOwned>(
        &self,
        method: &str,
        index: &str,
        window: &DateWindow,
    ) -> Result<Vec<T>> {
        let url = format!("{}/Backpage.aspx/{}", self.history_base_url, method);
        let body = serde_json::json!({ "cinfo": cinfo(index, window) });
        debug!("Requesting {} for {} ({})", method, index, window);

        let response = with_retry(
            || async {
                self.client
                    .post(&url)
                    .json(&body)
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())
            },
            self.retry,
        )
        .await
        .with_context(|| format!("Failed to send {method} request for index: {index}"))?;

        let envelope: BackpageResponse = response
            .json()
            .await
            .with_context(|| format!("Failed to parse {method} response for index: {index}"))?;

        let payload = envelope.d.trim();
        if payload.is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(payload)
            .with_context(|| format!("Failed to parse {method} records for index: {index}"))
    }
}

fn cinfo(index: &str, window: &DateWindow) -> String {
    format!(
        "{{'name':'{index}','startDate':'{}','endDate':'{}','indexName':'{index}'}}",
        window.start_dmy(),
        window.end_dmy()
    )
}

#[derive(Debug, Deserialize)]
struct BackpageResponse {
    #[serde(default)]
    d: String,
}

#[derive(Debug, Deserialize)]
struct LiveIndicesResponse {
    #[serde(default)]
    data: Vec<LiveIndex>,
}

#[derive(Debug, Deserialize)]
struct LiveIndex {
    #[serde(rename = "indexName")]
    index_name: String,
    #[serde(rename = "indexType", default)]
    index_type: String,
}

#[async_trait]
impl HistoryProvider for NiftyIndicesProvider {
    #[instrument(name = "NiftyPriceFetch", skip_all, fields(index = %index))]
    async fn fetch_price_history(
        &self,
        index: &str,
        window: &DateWindow,
    ) -> Result<Vec<RawPriceRecord>> {
        self.backpage(PRICE_METHOD, index, window).await
    }

    #[instrument(name = "NiftyValuationFetch", skip_all, fields(index = %index))]
    async fn fetch_valuation_history(
        &self,
        index: &str,
        window: &DateWindow,
    ) -> Result<Vec<RawValuationRecord>> {
        self.backpage(VALUATION_METHOD, index, window).await
    }
}

#[async_trait]
impl IndexCatalog for NiftyIndicesProvider {
    async fn fetch_equity_indices(&self) -> Result<Vec<String>> {
        let url = format!("{}/jsonfiles/LiveIndicesWatch.json", self.live_base_url);
        debug!("Requesting index list from {}", url);

        let response = with_retry(
            || async {
                self.client
                    .get(&url)
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())
            },
            self.retry,
        )
        .await
        .context("Failed to fetch index list")?;

        let live: LiveIndicesResponse = response
            .json()
            .await
            .context("Failed to parse index list")?;

        Ok(live
            .data
            .into_iter()
            .filter(|item| item.index_type.eq_ignore_ascii_case("eq"))
            .map(|item| item.index_name)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::time::Duration;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn window() -> DateWindow {
        DateWindow::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
        )
    }

    fn provider(server: &MockServer) -> NiftyIndicesProvider {
        NiftyIndicesProvider::new(&server.uri(), &server.uri())
            .unwrap()
            .with_retry_policy(RetryPolicy {
                retries: 1,
                delay: Duration::from_millis(1),
            })
    }

    // Helper to mount a backpage method returning `records` wrapped in `d`
    async fn mount_backpage(server: &MockServer, method_name: &str, records: &str) {
        let envelope = serde_json::json!({ "d": records });
        Mock::given(method("POST"))
            .and(path(format!("/Backpage.aspx/{method_name}")))
            .and(body_json(serde_json::json!({
                "cinfo": "{'name':'NIFTY 50','startDate':'01-Jan-2024','endDate':'05-Jan-2024','indexName':'NIFTY 50'}"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(envelope))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_price_history_fetch() {
        let mock_server = MockServer::start().await;
        mount_backpage(
            &mock_server,
            PRICE_METHOD,
            r#"[{"Index Name":"Nifty 50","HistoricalDate":"02 Jan 2024","OPEN":"21,751.35","HIGH":"21,755.60","LOW":"21,555.65","CLOSE":"21,665.80"},
                {"Index Name":"Nifty 50","HistoricalDate":"01 Jan 2024","OPEN":"21,727.75","HIGH":"21,834.35","LOW":"21,680.85","CLOSE":"-"}]"#,
        )
        .await;

        let records = provider(&mock_server)
            .fetch_price_history("NIFTY 50", &window())
            .await
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].date, "02 Jan 2024");
        assert_eq!(records[0].close, Some(serde_json::json!("21,665.80")));
        assert_eq!(records[1].close, Some(serde_json::json!("-")));
    }

    #[tokio::test]
    async fn test_valuation_history_fetch() {
        let mock_server = MockServer::start().await;
        mount_backpage(
            &mock_server,
            VALUATION_METHOD,
            r#"[{"DATE":"02 Jan 2024","pe":"22.83","pb":"4.06","divYield":"1.24"}]"#,
        )
        .await;

        let records = provider(&mock_server)
            .fetch_valuation_history("NIFTY 50", &window())
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].div_yield, Some(serde_json::json!("1.24")));
    }

    #[tokio::test]
    async fn test_empty_payload_is_empty_series() {
        let mock_server = MockServer::start().await;
        mount_backpage(&mock_server, PRICE_METHOD, "").await;

        let records = provider(&mock_server)
            .fetch_price_history("NIFTY 50", &window())
            .await
            .unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_server_error_is_retried_then_reported() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&mock_server)
            .await;

        let result = provider(&mock_server)
            .fetch_price_history("NIFTY 50", &window())
            .await;

        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .starts_with("Failed to send getHistoricaldatatabletoString request")
        );
    }

    #[tokio::test]
    async fn test_equity_index_list_filters_by_type() {
        let mock_server = MockServer::start().await;
        let body = r#"{"data":[
            {"indexName":"NIFTY 50","indexType":"eq"},
            {"indexName":"NIFTY 10 YR BENCHMARK G-SEC","indexType":"debt"},
            {"indexName":"NIFTY BANK","indexType":"EQ"}
        ]}"#;
        Mock::given(method("GET"))
            .and(path("/jsonfiles/LiveIndicesWatch.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&mock_server)
            .await;

        let indices = provider(&mock_server).fetch_equity_indices().await.unwrap();
        assert_eq!(indices, vec!["NIFTY 50", "NIFTY BANK"]);
    }
}
