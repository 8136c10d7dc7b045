//! Unit management commands.

use console::style;

use sumika::config::Settings;
use sumika::models::MergeScope;
use sumika::services::{LockRegistry, MergeService};

/// Merge one unit into another.
pub async fn cmd_unit_merge(
    settings: &Settings,
    secondary_id: i32,
    primary_id: i32,
    actor: &str,
) -> anyhow::Result<()> {
    let service = MergeService::new(settings.pool(), LockRegistry::new());
    let history_id = service.merge_units(secondary_id, primary_id, actor).await?;

    println!(
        "{} Merged unit {} into {} (history {}).",
        style("✓").green(),
        secondary_id,
        primary_id,
        history_id,
    );
    println!("  Revert with: sumika unit revert {}", history_id);
    Ok(())
}

/// Revert a unit merge.
pub async fn cmd_unit_revert(
    settings: &Settings,
    history_id: i32,
    actor: &str,
    exclude: bool,
) -> anyhow::Result<()> {
    let repos = settings.repositories();
    let record = repos
        .merge_history
        .get_unit(history_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("unit merge history {} not found", history_id))?;

    let service = MergeService::new(settings.pool(), LockRegistry::new());
    let outcome = service.revert_unit_merge(history_id, actor).await?;

    println!(
        "{} Reverted unit merge {}: {} listings restored to unit {}.",
        style("✓").green(),
        history_id,
        outcome.restored_ids.len(),
        record.secondary_unit_id,
    );
    if outcome.legacy_best_effort {
        println!(
            "  {} legacy history row: restored set was inferred, not recorded",
            style("!").yellow()
        );
    }
    for warning in &outcome.warnings {
        println!("  {} {}", style("!").yellow(), warning);
    }

    if exclude {
        let exclusion_id = service
            .add_exclusion(
                MergeScope::Unit,
                record.secondary_unit_id,
                record.primary_unit_id,
                Some("reverted merge"),
                actor,
            )
            .await?;
        println!(
            "  Excluded pair ({}, {}) from future suggestions (exclusion {}).",
            record.secondary_unit_id, record.primary_unit_id, exclusion_id,
        );
    }

    Ok(())
}
