//! Building management commands.

use chrono::Utc;
use console::style;

use sumika::config::Settings;
use sumika::models::{AliasSource, MergeScope};
use sumika::normalize::normalize;
use sumika::services::{LockRegistry, MergeService};

use crate::cli::helpers::{format_price, truncate};

/// List buildings.
pub async fn cmd_building_list(settings: &Settings, limit: usize) -> anyhow::Result<()> {
    let repos = settings.repositories();
    let ids = repos.buildings.list_ids().await?;

    if ids.is_empty() {
        println!(
            "{} No buildings yet. Run 'sumika ingest' first.",
            style("!").yellow()
        );
        return Ok(());
    }

    println!("\n{}", style("Buildings").bold());
    println!("{}", "-".repeat(72));
    println!("{:<7} {:<30} {:<24} Units", "ID", "Name", "Canonical");
    println!("{}", "-".repeat(72));

    for id in ids.iter().take(limit) {
        let Some(building) = repos.buildings.get(*id).await? else {
            continue;
        };
        let units = repos.units.list_by_building(*id).await?;
        println!(
            "{:<7} {:<30} {:<24} {}",
            building.id,
            truncate(&building.normalized_name, 29),
            truncate(&building.canonical_name, 23),
            units.len(),
        );
    }

    if ids.len() > limit {
        println!("  … and {} more", ids.len() - limit);
    }

    Ok(())
}

/// Show one building with aliases and units.
pub async fn cmd_building_show(settings: &Settings, id: i32) -> anyhow::Result<()> {
    let repos = settings.repositories();
    let Some(building) = repos.buildings.get(id).await? else {
        anyhow::bail!("building {} not found", id);
    };

    println!("\n{} {}", style("Building").bold(), building.id);
    println!("  Name:      {}", building.normalized_name);
    println!("  Canonical: {}", building.canonical_name);
    if let Some(reading) = &building.reading {
        println!("  Reading:   {}", reading);
    }
    if let Some(address) = &building.normalized_address {
        println!("  Address:   {}", address);
    }
    if let Some(station) = &building.station_info {
        println!("  Stations:  {}", station.replace('\n', " / "));
    }

    let aliases = repos.buildings.aliases(id).await?;
    if !aliases.is_empty() {
        println!("\n  Aliases:");
        for alias in aliases {
            println!("    {} ({})", alias.alias_name, alias.source.as_str());
        }
    }

    let name_variants = repos.buildings.listing_names(id).await?;
    if !name_variants.is_empty() {
        println!("\n  Listing name variants:");
        for variant in name_variants {
            println!(
                "    {:<30} ×{}",
                truncate(&variant.normalized_name, 29),
                variant.listing_count
            );
        }
    }

    let units = repos.units.list_by_building(id).await?;
    println!("\n  Units: {}", units.len());
    for unit in units {
        let floor = unit
            .floor_number
            .map(|f| format!("{}F", f))
            .unwrap_or_else(|| "-".to_string());
        let area = unit
            .area
            .map(|a| format!("{:.1}㎡", a))
            .unwrap_or_else(|| "-".to_string());
        let resale = if unit.is_resale { " [resale]" } else { "" };
        println!(
            "    #{:<6} {:<4} {:<8} {:<6} {}{}",
            unit.id,
            floor,
            area,
            unit.layout.as_deref().unwrap_or("-"),
            format_price(unit.final_price),
            resale,
        );
    }

    Ok(())
}

/// List duplicate-candidate groups.
pub async fn cmd_building_candidates(settings: &Settings) -> anyhow::Result<()> {
    let service = MergeService::new(settings.pool(), LockRegistry::new());
    let groups = service.building_merge_candidates().await?;

    if groups.is_empty() {
        println!("{} No duplicate candidates found.", style("✓").green());
        return Ok(());
    }

    println!(
        "\n{} ({} groups)",
        style("Duplicate candidates").bold(),
        groups.len()
    );
    for (canonical, members) in groups {
        println!("\n  {} ({})", style(&canonical).cyan(), members.len());
        for building in members {
            println!("    #{:<6} {}", building.id, building.normalized_name);
        }
    }

    println!(
        "\nMerge with: sumika building merge <secondary-id> <primary-id>"
    );
    Ok(())
}

/// Add a manual alias to a building.
pub async fn cmd_building_alias(settings: &Settings, id: i32, name: &str) -> anyhow::Result<()> {
    let repos = settings.repositories();
    if repos.buildings.get(id).await?.is_none() {
        anyhow::bail!("building {} not found", id);
    }

    let normalized = normalize(name);
    match repos
        .buildings
        .insert_alias(id, &normalized, AliasSource::Manual, Utc::now())
        .await?
    {
        Some(alias_id) => println!(
            "{} Added alias \"{}\" to building {} (alias {}).",
            style("✓").green(),
            normalized,
            id,
            alias_id,
        ),
        None => println!(
            "{} Building {} already has alias \"{}\".",
            style("!").yellow(),
            id,
            normalized,
        ),
    }

    Ok(())
}

/// Merge one building into another.
pub async fn cmd_building_merge(
    settings: &Settings,
    secondary_id: i32,
    primary_id: i32,
    actor: &str,
) -> anyhow::Result<()> {
    let service = MergeService::new(settings.pool(), LockRegistry::new());
    let history_id = service
        .merge_buildings(secondary_id, primary_id, actor)
        .await?;

    println!(
        "{} Merged building {} into {} (history {}).",
        style("✓").green(),
        secondary_id,
        primary_id,
        history_id,
    );
    println!("  Revert with: sumika building revert {}", history_id);
    Ok(())
}

/// Revert a building merge.
pub async fn cmd_building_revert(
    settings: &Settings,
    history_id: i32,
    actor: &str,
    exclude: bool,
) -> anyhow::Result<()> {
    let repos = settings.repositories();
    let record = repos
        .merge_history
        .get_building(history_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("building merge history {} not found", history_id))?;

    let service = MergeService::new(settings.pool(), LockRegistry::new());
    let outcome = service.revert_building_merge(history_id, actor).await?;

    println!(
        "{} Reverted building merge {}: {} units restored to building {}.",
        style("✓").green(),
        history_id,
        outcome.restored_ids.len(),
        record.merged_building_id,
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
                MergeScope::Building,
                record.merged_building_id,
                record.direct_primary_building_id,
                Some("reverted merge"),
                actor,
            )
            .await?;
        println!(
            "  Excluded pair ({}, {}) from future suggestions (exclusion {}).",
            record.merged_building_id, record.direct_primary_building_id, exclusion_id,
        );
    }

    Ok(())
}

/// List merge exclusions for both scopes.
pub async fn cmd_building_exclusions(settings: &Settings) -> anyhow::Result<()> {
    let repos = settings.repositories();

    for scope in [MergeScope::Building, MergeScope::Unit] {
        let exclusions = repos.merge_history.exclusions(scope).await?;
        if exclusions.is_empty() {
            continue;
        }
        println!("\n{} exclusions:", scope.as_str());
        for exclusion in exclusions {
            println!(
                "  #{:<5} ({}, {}) by {} {}",
                exclusion.id,
                exclusion.entity_id_a,
                exclusion.entity_id_b,
                exclusion.created_by,
                exclusion.reason.as_deref().unwrap_or(""),
            );
        }
    }

    Ok(())
}
