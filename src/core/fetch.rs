//! Fetches one index over a single window and normalizes the result

use crate::core::error::FetchError;
use crate::core::history::HistoryProvider;
use crate::core::normalize::normalize;
use crate::core::row::{DateWindow, IndexRow};
use tracing::{debug, warn};

/// Fetches and normalizes one index over `window`.
///
/// A missing valuation series is not fatal; rows are then price-only. An empty
/// result is reported as [`FetchError::NoData`].
pub async fn fetch_rows(
    provider: &dyn HistoryProvider,
    symbol: &str,
    window: &DateWindow,
) -> Result<Vec<IndexRow>, FetchError> {
    let prices = provider
        .fetch_price_history(symbol, window)
        .await
        .map_err(FetchError::Provider)?;

    if prices.is_empty() {
        return Err(FetchError::NoData);
    }

    let valuations = match provider.fetch_valuation_history(symbol, window).await {
        Ok(valuations) => valuations,
        Err(e) => {
            warn!("Error fetching valuation data for {}: {}", symbol, e);
            Vec::new()
        }
    };

    let rows = normalize(&prices, &valuations, symbol);
    debug!(
        "Normalized {} of {} price records for {}",
        rows.len(),
        prices.len(),
        symbol
    );

    if rows.is_empty() {
        return Err(FetchError::NoData);
    }
    Ok(rows)
}
