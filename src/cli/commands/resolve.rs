//! Display attribute recompute command.

use console::style;

use sumika::config::Settings;
use sumika::services::{DisplayResolutionService, LockRegistry};

/// Recompute majority-voted display attributes.
pub async fn cmd_resolve(settings: &Settings, building_id: Option<i32>) -> anyhow::Result<()> {
    let service = DisplayResolutionService::new(settings.pool(), LockRegistry::new());

    let stats = match building_id {
        Some(id) => service.recompute_building(id).await?,
        None => service.recompute_all().await?,
    };

    println!(
        "{} Recomputed {} buildings: {} unit names updated, {} station blocks updated{}.",
        style("✓").green(),
        stats.buildings_processed,
        stats.unit_names_updated,
        stats.station_infos_updated,
        if stats.buildings_skipped > 0 {
            format!(" ({} skipped due to concurrent merges)", stats.buildings_skipped)
        } else {
            String::new()
        },
    );

    Ok(())
}
