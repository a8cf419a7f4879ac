use super::ui;
use crate::core::config::AppConfig;
use crate::core::row::{DateWindow, parse_user_date};
use crate::core::{IndexCatalog, SyncConfig, SyncEngine, SyncSummary};
use crate::providers::nifty::NiftyIndicesProvider;
use crate::store;
use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use comfy_table::Cell;
use tracing::{debug, warn};

/// Command line selection for a sync run; unset values fall back to config.
#[derive(Debug, Clone, Default)]
pub struct SyncArgs {
    pub date: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub indices: Option<String>,
    pub all: bool,
}

/// Resolves the requested window from `--date`, `--start` and `--end`.
pub fn resolve_window(
    args: &SyncArgs,
    default_start: NaiveDate,
    today: NaiveDate,
) -> Result<DateWindow> {
    let window = if let Some(date) = &args.date {
        if args.start.is_some() || args.end.is_some() {
            anyhow::bail!("Use --date alone or with neither --start nor --end");
        }
        let date = parse_user_date(date)?;
        DateWindow::new(date, date)
    } else {
        let start = match &args.start {
            Some(start) => parse_user_date(start)?,
            None => default_start,
        };
        let end = match &args.end {
            Some(end) => parse_user_date(end)?,
            None => today,
        };
        DateWindow::new(start, end)
    };

    if window.end > today {
        anyhow::bail!("End date {} cannot be in the future", window.end);
    }
    if window.start > window.end {
        anyhow::bail!("Start date {} is after end date {}", window.start, window.end);
    }
    Ok(window)
}

/// Splits a comma separated index list, dropping blanks.
pub fn parse_indices(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

async fn resolve_indices(
    args: &SyncArgs,
    config: &AppConfig,
    catalog: &dyn IndexCatalog,
) -> Vec<String> {
    if let Some(list) = &args.indices {
        return parse_indices(list);
    }
    if args.all {
        return match catalog.fetch_equity_indices().await {
            Ok(indices) => indices,
            Err(e) => {
                warn!("Failed to fetch index list: {:#}", e);
                Vec::new()
            }
        };
    }
    config.indices.clone()
}

pub async fn run(config: &AppConfig, args: &SyncArgs) -> Result<()> {
    let today = Local::now().date_naive();
    let window = resolve_window(args, config.start_date, today)?;

    let nifty = config.nifty();
    let provider = NiftyIndicesProvider::new(&nifty.history_base_url, &nifty.live_base_url)?;

    let indices = resolve_indices(args, config, &provider).await;
    if indices.is_empty() {
        println!("No indices to process. Nothing to update.");
        return Ok(());
    }

    let store = store::open_store(config).context("Failed to open row store")?;
    debug!("Syncing {} indices over {}", indices.len(), window);

    println!(
        "{}",
        ui::style_text("Index history sync", ui::StyleType::Title)
    );
    println!("  Date range: {window}");
    println!("  Indices:    {}", indices.join(", "));

    let sync_config = SyncConfig::new(indices, window, config.batch_size);
    let total = sync_config.indices.len() as u64;
    let engine = SyncEngine::new(&provider, store.as_ref(), sync_config);

    let pb = ui::new_progress_bar(total);
    let summary = engine
        .run(&|name| {
            pb.set_message(name.to_string());
            pb.inc(1);
        })
        .await;
    pb.finish_and_clear();

    println!("{}", display_summary(&summary));
    Ok(())
}

/// Renders the run summary as a table followed by per-outcome index lists.
pub fn display_summary(summary: &SyncSummary) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Outcome"), ui::header_cell("Count")]);

    let counts = [
        ("Indices processed", summary.total, false),
        ("Successful", summary.successful.len(), false),
        ("Skipped (up to date)", summary.skipped.len(), false),
        ("Failed", summary.failed.len(), true),
        ("Recovered by retry", summary.recovered.len(), false),
        ("Still failed", summary.still_failed.len(), true),
        ("Rows added", summary.rows_added, false),
        ("Duplicates removed", summary.duplicates_removed, false),
        ("Rows saved", summary.persist.saved, false),
        ("Rows not saved", summary.persist.failed.len(), true),
    ];
    for (label, count, is_problem) in counts {
        table.add_row(vec![Cell::new(label), ui::count_cell(count, is_problem)]);
    }

    let mut out = table.to_string();

    if !summary.recovered.is_empty() {
        out.push_str(&format!(
            "\n\n{}",
            ui::style_text("Recovered automatically:", ui::StyleType::Success)
        ));
        for name in &summary.recovered {
            out.push_str(&format!("\n  - {name}"));
        }
    }

    if summary.still_failed.is_empty() {
        if !summary.failed.is_empty() {
            out.push_str(&format!(
                "\n\n{}",
                ui::style_text("All failed indices recovered.", ui::StyleType::Success)
            ));
        }
    } else {
        out.push_str(&format!(
            "\n\n{}",
            ui::style_text("Still failed after all retry attempts:", ui::StyleType::Error)
        ));
        for name in &summary.still_failed {
            out.push_str(&format!("\n  - {name}"));
        }
        out.push_str(&format!(
            "\n{}",
            ui::style_text(
                "These indices may have data availability issues.",
                ui::StyleType::Subtle
            )
        ));
    }

    for (symbol, date) in &summary.persist.failed {
        out.push_str(&format!(
            "\n{}",
            ui::style_text(&format!("Not saved: {symbol} {date}"), ui::StyleType::Error)
        ));
    }

    out
}
