//! Decides which date range still needs fetching for an index.

use crate::core::row::{DateWindow, IndexRow};
use chrono::NaiveDate;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plan {
    Fetch(DateWindow),
    /// Existing data already reaches the requested end.
    Skip { last_date: NaiveDate },
}

/// Latest stored date for `symbol`, if any row exists.
pub fn last_recorded_date(existing: &[IndexRow], symbol: &str) -> Option<NaiveDate> {
    existing
        .iter()
        .filter(|row| row.symbol == symbol)
        .map(|row| row.date)
        .max()
}

/// Computes the minimal fetch window for `symbol` given what is already stored.
pub fn plan(symbol: &str, existing: &[IndexRow], requested: &DateWindow) -> Plan {
    let Some(last_date) = last_recorded_date(existing, symbol) else {
        debug!("No existing rows for {}, fetching {}", symbol, requested);
        return resolve(requested.start, requested, None);
    };

    match last_date.succ_opt() {
        Some(next) => resolve(next, requested, Some(last_date)),
        None => {
            // Cannot step past the last date; fall back to the full window.
            warn!(
                "Could not compute next date after {} for {}, using requested window",
                last_date, symbol
            );
            Plan::Fetch(*requested)
        }
    }
}

fn resolve(start: NaiveDate, requested: &DateWindow, last_date: Option<NaiveDate>) -> Plan {
    if start > requested.end {
        return Plan::Skip {
            last_date: last_date.unwrap_or(start),
        };
    }
    Plan::Fetch(DateWindow::new(start, requested.end))
}
