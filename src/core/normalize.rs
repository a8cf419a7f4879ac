//! Converts raw provider records into canonical rows.

use crate::core::history::{RawPriceRecord, RawValuationRecord};
use crate::core::row::{IndexRow, parse_provider_date};
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

/// Coerces a provider value into a number.
///
/// Strings may carry thousands separators; a dash, an empty string or any
/// unparsable text means "no value".
pub fn coerce_number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
            if cleaned.is_empty() || cleaned == "-" {
                return None;
            }
            cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
        }
        _ => None,
    }
}

type Valuation = (Option<f64>, Option<f64>, Option<f64>);

fn valuation_by_date(valuations: &[RawValuationRecord]) -> HashMap<NaiveDate, Valuation> {
    let mut by_date = HashMap::new();
    for record in valuations {
        let Some(date) = parse_provider_date(&record.date) else {
            debug!("Skipping valuation record with bad date '{}'", record.date);
            continue;
        };
        // First record for a date wins, like a left merge on a unique key.
        by_date.entry(date).or_insert((
            coerce_number(record.pe.as_ref()),
            coerce_number(record.pb.as_ref()),
            coerce_number(record.div_yield.as_ref()),
        ));
    }
    by_date
}

/// Builds canonical rows for `symbol` from a price series and a valuation
/// series, merging valuations onto prices by date.
///
/// Rows without a parsable date or a valid close are dropped. The result is
/// sorted by date ascending.
pub fn normalize(
    prices: &[RawPriceRecord],
    valuations: &[RawValuationRecord],
    symbol: &str,
) -> Vec<IndexRow> {
    let valuations = valuation_by_date(valuations);

    let mut rows: Vec<IndexRow> = prices
        .iter()
        .filter_map(|record| {
            let date = parse_provider_date(&record.date)?;
            let close = coerce_number(record.close.as_ref())?;
            let (pe, pb, div_yield) = valuations.get(&date).copied().unwrap_or_default();
            Some(IndexRow {
                date,
                symbol: symbol.to_string(),
                open: coerce_number(record.open.as_ref()),
                high: coerce_number(record.high.as_ref()),
                low: coerce_number(record.low.as_ref()),
                close,
                pe,
                pb,
                div_yield,
            })
        })
        .collect();

    rows.sort_by_key(|row| row.date);
    rows
}
