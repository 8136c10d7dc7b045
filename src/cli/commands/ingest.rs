//! Listing ingestion commands.

use std::fs;
use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use sumika::config::Settings;
use sumika::models::ListingObservation;
use sumika::services::{IngestService, IngestStats};

/// Ingest a JSON file of listing observations.
pub async fn cmd_ingest(settings: &Settings, file: &Path) -> anyhow::Result<()> {
    let content = fs::read_to_string(file)?;
    let observations: Vec<ListingObservation> = serde_json::from_str(&content)?;

    if observations.is_empty() {
        println!("{} No observations in {}", style("!").yellow(), file.display());
        return Ok(());
    }

    println!(
        "{} Ingesting {} observations",
        style("→").cyan(),
        observations.len()
    );

    let service = IngestService::new(settings.pool());
    let mut stats = IngestStats::default();

    let pb = ProgressBar::new(observations.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  {bar:40.cyan/dim} {pos}/{len} observations ({per_sec}) {msg}")
            .unwrap()
            .progress_chars("=>-"),
    );
    pb.enable_steady_tick(Duration::from_millis(100));

    for observation in &observations {
        service.ingest_observation(observation, &mut stats).await?;
        pb.inc(1);
    }
    pb.finish_and_clear();

    println!(
        "{} Ingested {} observations: {} new buildings, {} new units, {} new listings, {} refreshed.",
        style("✓").green(),
        stats.observations,
        stats.new_buildings,
        stats.new_units,
        stats.new_listings,
        stats.updated_listings,
    );

    Ok(())
}

/// Delist listings a scrape run no longer observed.
pub async fn cmd_delist(
    settings: &Settings,
    site: &str,
    seen_file: Option<&Path>,
) -> anyhow::Result<()> {
    let seen: Vec<String> = match seen_file {
        Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
        None => Vec::new(),
    };

    let service = IngestService::new(settings.pool());
    let delisted = service.mark_delisted(site, &seen, Utc::now()).await?;

    println!(
        "{} Delisted {} listings on {} ({} still observed).",
        style("✓").green(),
        delisted,
        site,
        seen.len(),
    );

    Ok(())
}
