//! Resale detection command.

use console::style;

use sumika::config::Settings;
use sumika::services::{LockRegistry, ResaleService};

/// Regenerate resale flags from current listing state.
pub async fn cmd_resale(settings: &Settings, building_id: Option<i32>) -> anyhow::Result<()> {
    let service = ResaleService::new(settings.pool(), LockRegistry::new());

    let stats = match building_id {
        Some(id) => service.detect_building(id).await?,
        None => service.detect_all().await?,
    };

    println!(
        "{} Scanned {} buildings: {} units marked sold, {} resales flagged, {} stale flags cleared{}.",
        style("✓").green(),
        stats.buildings_processed,
        stats.units_sold,
        stats.resales_flagged,
        stats.flags_cleared,
        if stats.buildings_skipped > 0 {
            format!(" ({} skipped due to concurrent merges)", stats.buildings_skipped)
        } else {
            String::new()
        },
    );

    Ok(())
}
