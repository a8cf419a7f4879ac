use super::ui;
use crate::core::IndexCatalog;
use anyhow::{Context, Result};

/// Prints the live equity index names, one per line.
pub async fn run(catalog: &dyn IndexCatalog) -> Result<()> {
    let indices = catalog
        .fetch_equity_indices()
        .await
        .context("Failed to fetch equity index list")?;

    if indices.is_empty() {
        println!("No equity indices found.");
        return Ok(());
    }

    println!(
        "{}",
        ui::style_text(
            &format!("{} equity indices", indices.len()),
            ui::StyleType::Title
        )
    );
    for name in indices {
        println!("  {name}");
    }
    Ok(())
}
