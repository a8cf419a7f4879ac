//! Fallback windows for indices whose planned fetch failed

use crate::core::fetch::fetch_rows;
use crate::core::history::HistoryProvider;
use crate::core::row::{DateWindow, IndexRow};
use std::fmt::Display;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryStrategy {
    /// The full window the user asked for.
    RequestedWindow,
    LastYear,
    LastSixMonths,
    LastQuarter,
}

impl RetryStrategy {
    /// Strategies in the order they are attempted.
    pub const CASCADE: [RetryStrategy; 4] = [
        RetryStrategy::RequestedWindow,
        RetryStrategy::LastYear,
        RetryStrategy::LastSixMonths,
        RetryStrategy::LastQuarter,
    ];

    pub fn window(&self, requested: &DateWindow) -> DateWindow {
        match self {
            RetryStrategy::RequestedWindow => *requested,
            RetryStrategy::LastYear => DateWindow::trailing(requested.end, 365),
            RetryStrategy::LastSixMonths => DateWindow::trailing(requested.end, 180),
            RetryStrategy::LastQuarter => DateWindow::trailing(requested.end, 90),
        }
    }
}

impl Display for RetryStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                RetryStrategy::RequestedWindow => "with original start date",
                RetryStrategy::LastYear => "with recent 1-year data",
                RetryStrategy::LastSixMonths => "with recent 6-month data",
                RetryStrategy::LastQuarter => "with recent 3-month data",
            }
        )
    }
}

#[derive(Debug, Default)]
pub struct CascadeOutcome {
    /// Recovered indices with their rows, in recovery order.
    pub recovered: Vec<(String, Vec<IndexRow>)>,
    pub still_failed: Vec<String>,
}

/// Retries `failed` indices through `strategies` in order.
///
/// An index leaves the failed set as soon as one strategy yields rows and is
/// not tried again. Stops early once nothing is left to retry.
pub async fn run_cascade(
    provider: &dyn HistoryProvider,
    failed: Vec<String>,
    requested: &DateWindow,
    strategies: &[RetryStrategy],
) -> CascadeOutcome {
    let mut outcome = CascadeOutcome {
        recovered: Vec::new(),
        still_failed: failed,
    };

    for strategy in strategies {
        if outcome.still_failed.is_empty() {
            break;
        }

        let window = strategy.window(requested);
        info!("Retrying {} indices {} ({})", outcome.still_failed.len(), strategy, window);

        let mut remaining = Vec::with_capacity(outcome.still_failed.len());
        for symbol in std::mem::take(&mut outcome.still_failed) {
            match fetch_rows(provider, &symbol, &window).await {
                Ok(rows) => {
                    info!(symbol = %symbol, rows = rows.len(), "Recovered {}", strategy);
                    outcome.recovered.push((symbol, rows));
                }
                Err(e) => {
                    warn!(symbol = %symbol, "Retry {} failed: {}", strategy, e);
                    remaining.push(symbol);
                }
            }
        }
        outcome.still_failed = remaining;
    }

    outcome
}
