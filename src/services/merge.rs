//! Building and unit merge/revert engine.
//!
//! Consolidation is a row-rewrite inside one transaction: reassign owned
//! children, copy aliases, write an audit row recording exactly which ids
//! moved, delete the consumed entity. Reverts replay that record backwards
//! and report (never silently drop) whatever an intervening merge already
//! destroyed.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use diesel::prelude::*;
use diesel_async::{AsyncConnection, RunQueryDsl};
use tracing::{info, warn};

use crate::models::{
    AliasSource, Building, BuildingMergeDetails, BuildingSnapshot, MergeScope, RevertOutcome,
    UnitMergeDetails, UnitSnapshot,
};
use crate::repository::models::{
    BuildingAliasRecord, BuildingListingNameRecord, BuildingMergeHistoryRecord, BuildingRecord,
    LastInsertRowId, UnitMergeHistoryRecord, UnitRecord,
};
use crate::repository::{BuildingRepository, DbPool, MergeHistoryRepository};
use crate::schema::{
    building_aliases, building_listing_names, building_merge_history, buildings, listings,
    unit_merge_history, units,
};
use crate::with_conn;

use super::error::MergeError;
use super::locks::LockRegistry;

/// Cap on merge-chain walks; a longer chain means corrupt history.
const MAX_MERGE_DEPTH: i32 = 64;

/// Transactional merge/revert operations with audit history.
#[derive(Clone)]
pub struct MergeService {
    pool: DbPool,
    locks: Arc<LockRegistry>,
    history: MergeHistoryRepository,
    buildings: BuildingRepository,
}

impl MergeService {
    pub fn new(pool: DbPool, locks: Arc<LockRegistry>) -> Self {
        Self {
            history: MergeHistoryRepository::new(pool.clone()),
            buildings: BuildingRepository::new(pool.clone()),
            pool,
            locks,
        }
    }

    /// Merge building `secondary_id` into `primary_id`.
    ///
    /// Moves every unit, copies aliases (including the consumed building's
    /// own name), records the exact moved-id set, and deletes the consumed
    /// building. Returns the merge history row id.
    pub async fn merge_buildings(
        &self,
        secondary_id: i32,
        primary_id: i32,
        actor: &str,
    ) -> Result<i32, MergeError> {
        if secondary_id == primary_id {
            return Err(MergeError::Validation(format!(
                "cannot merge building {} into itself",
                secondary_id
            )));
        }

        let _guard = self
            .locks
            .try_acquire(MergeScope::Building, &[secondary_id, primary_id])?;

        let actor = actor.to_string();
        let now = Utc::now().to_rfc3339();

        let history_id = with_conn!(self.pool, conn, {
            conn.transaction(|conn| {
                Box::pin(async move {
                    let secondary = load_building(conn, secondary_id).await?;
                    let _primary = load_building(conn, primary_id).await?;

                    // Move every unit owned by secondary; capture the exact set.
                    let moved_unit_ids: Vec<i32> = units::table
                        .filter(units::building_id.eq(secondary_id))
                        .select(units::id)
                        .order(units::id.asc())
                        .load(conn)
                        .await?;

                    if !moved_unit_ids.is_empty() {
                        diesel::update(units::table.filter(units::id.eq_any(&moved_unit_ids)))
                            .set((
                                units::building_id.eq(primary_id),
                                units::updated_at.eq(&now),
                            ))
                            .execute(conn)
                            .await?;
                    }

                    // Copy aliases, plus the consumed building's own name.
                    let secondary_aliases: Vec<BuildingAliasRecord> = building_aliases::table
                        .filter(building_aliases::building_id.eq(secondary_id))
                        .order(building_aliases::id.asc())
                        .load(conn)
                        .await?;

                    let mut alias_names: Vec<String> = secondary_aliases
                        .iter()
                        .map(|a| a.alias_name.clone())
                        .collect();
                    if !alias_names.contains(&secondary.normalized_name) {
                        alias_names.push(secondary.normalized_name.clone());
                    }

                    let mut copied_alias_ids = Vec::new();
                    for name in &alias_names {
                        let exists: i64 = building_aliases::table
                            .filter(building_aliases::building_id.eq(primary_id))
                            .filter(building_aliases::alias_name.eq(name))
                            .count()
                            .get_result(conn)
                            .await?;
                        if exists > 0 {
                            continue;
                        }

                        diesel::insert_into(building_aliases::table)
                            .values((
                                building_aliases::building_id.eq(primary_id),
                                building_aliases::alias_name.eq(name),
                                building_aliases::source.eq(AliasSource::DuplicateMerge.as_str()),
                                building_aliases::created_at.eq(&now),
                            ))
                            .execute(conn)
                            .await?;
                        let row: LastInsertRowId =
                            diesel::sql_query("SELECT last_insert_rowid()")
                                .get_result(conn)
                                .await?;
                        copied_alias_ids.push(row.id as i32);
                    }

                    diesel::delete(
                        building_aliases::table
                            .filter(building_aliases::building_id.eq(secondary_id)),
                    )
                    .execute(conn)
                    .await?;

                    // Fold the listing-name pool into primary.
                    let pool_rows: Vec<BuildingListingNameRecord> = building_listing_names::table
                        .filter(building_listing_names::building_id.eq(secondary_id))
                        .order(building_listing_names::id.asc())
                        .load(conn)
                        .await?;
                    for row in pool_rows {
                        let merged = diesel::update(
                            building_listing_names::table
                                .filter(building_listing_names::building_id.eq(primary_id))
                                .filter(
                                    building_listing_names::canonical_name
                                        .eq(&row.canonical_name),
                                ),
                        )
                        .set((
                            building_listing_names::listing_count
                                .eq(building_listing_names::listing_count + row.listing_count),
                            building_listing_names::updated_at.eq(&now),
                        ))
                        .execute(conn)
                        .await?;

                        if merged > 0 {
                            diesel::delete(building_listing_names::table.find(row.id))
                                .execute(conn)
                                .await?;
                        } else {
                            diesel::update(building_listing_names::table.find(row.id))
                                .set((
                                    building_listing_names::building_id.eq(primary_id),
                                    building_listing_names::updated_at.eq(&now),
                                ))
                                .execute(conn)
                                .await?;
                        }
                    }

                    // Follow primary's merge chain so the audit row records
                    // the true root. With validation above this is normally
                    // depth 1; legacy data may chain deeper.
                    let (final_primary, depth) = follow_building_chain(conn, primary_id).await?;

                    let details = BuildingMergeDetails {
                        moved_unit_ids: Some(moved_unit_ids.clone()),
                        copied_alias_ids,
                        building: Some(snapshot_building(&secondary)),
                    };
                    let details_json = serde_json::to_string(&details)?;

                    diesel::insert_into(building_merge_history::table)
                        .values((
                            building_merge_history::merged_building_id.eq(secondary_id),
                            building_merge_history::direct_primary_building_id.eq(primary_id),
                            building_merge_history::final_primary_building_id.eq(final_primary),
                            building_merge_history::merge_depth.eq(depth),
                            building_merge_history::merge_details.eq(&details_json),
                            building_merge_history::merged_at.eq(&now),
                            building_merge_history::merged_by.eq(&actor),
                        ))
                        .execute(conn)
                        .await?;
                    let row: LastInsertRowId = diesel::sql_query("SELECT last_insert_rowid()")
                        .get_result(conn)
                        .await?;

                    diesel::delete(buildings::table.find(secondary_id))
                        .execute(conn)
                        .await?;

                    info!(
                        secondary = secondary_id,
                        primary = primary_id,
                        moved_units = moved_unit_ids.len(),
                        "merged building"
                    );

                    Ok::<_, MergeError>(row.id as i32)
                })
            })
            .await
        })?;

        Ok(history_id)
    }

    /// Undo a building merge.
    ///
    /// Recreates the consumed building from its snapshot and reattaches the
    /// recorded units. Units destroyed by an intervening unit-level merge
    /// are reported in `warnings`; the revert itself still succeeds.
    pub async fn revert_building_merge(
        &self,
        history_id: i32,
        actor: &str,
    ) -> Result<RevertOutcome, MergeError> {
        let record = self
            .history
            .get_building(history_id)
            .await?
            .ok_or_else(|| {
                MergeError::Validation(format!("building merge history {} not found", history_id))
            })?;
        if record.reverted_at.is_some() {
            return Err(MergeError::Validation(format!(
                "building merge {} was already reverted",
                history_id
            )));
        }

        let _guard = self.locks.try_acquire(
            MergeScope::Building,
            &[record.merged_building_id, record.direct_primary_building_id],
        )?;

        let actor = actor.to_string();
        let now = Utc::now().to_rfc3339();

        let outcome = with_conn!(self.pool, conn, {
            conn.transaction(|conn| {
                Box::pin(async move {
                    let record: BuildingMergeHistoryRecord = building_merge_history::table
                        .find(history_id)
                        .first(conn)
                        .await?;
                    // The pre-lock check can race another revert; recheck
                    // under the lock.
                    if record.reverted_at.is_some() {
                        return Err(MergeError::Validation(format!(
                            "building merge {} was already reverted",
                            history_id
                        )));
                    }
                    let details: BuildingMergeDetails =
                        serde_json::from_str(&record.merge_details)?;

                    let snapshot = details.building.ok_or_else(|| {
                        MergeError::Validation(format!(
                            "history {} has no building snapshot; cannot reconstruct building {}",
                            history_id, record.merged_building_id
                        ))
                    })?;

                    let taken: Option<i32> = buildings::table
                        .find(snapshot.id)
                        .select(buildings::id)
                        .first(conn)
                        .await
                        .optional()?;
                    if taken.is_some() {
                        return Err(MergeError::Validation(format!(
                            "building id {} already exists; merge {} cannot be reverted",
                            snapshot.id, history_id
                        )));
                    }

                    insert_building_snapshot(conn, &snapshot, &now).await?;

                    let mut outcome = RevertOutcome::default();

                    match details.moved_unit_ids {
                        Some(unit_ids) => {
                            for unit_id in unit_ids {
                                let exists: Option<i32> = units::table
                                    .find(unit_id)
                                    .select(units::id)
                                    .first(conn)
                                    .await
                                    .optional()?;
                                if exists.is_none() {
                                    outcome.warnings.push(format!(
                                        "unit {} no longer exists (consumed by a later merge); not restored",
                                        unit_id
                                    ));
                                    continue;
                                }
                                diesel::update(units::table.find(unit_id))
                                    .set((
                                        units::building_id.eq(snapshot.id),
                                        units::updated_at.eq(&now),
                                    ))
                                    .execute(conn)
                                    .await?;
                                outcome.restored_ids.push(unit_id);
                            }
                        }
                        None => {
                            // Legacy row: no recorded unit set. Move every
                            // unit on primary not explained by another merge.
                            outcome.legacy_best_effort = true;
                            let explained =
                                explained_unit_ids(conn, record.direct_primary_building_id, history_id)
                                    .await?;
                            let current: Vec<i32> = units::table
                                .filter(
                                    units::building_id.eq(record.direct_primary_building_id),
                                )
                                .select(units::id)
                                .order(units::id.asc())
                                .load(conn)
                                .await?;
                            for unit_id in current {
                                if explained.contains(&unit_id) {
                                    continue;
                                }
                                diesel::update(units::table.find(unit_id))
                                    .set((
                                        units::building_id.eq(snapshot.id),
                                        units::updated_at.eq(&now),
                                    ))
                                    .execute(conn)
                                    .await?;
                                outcome.restored_ids.push(unit_id);
                            }
                            outcome.warnings.push(format!(
                                "history {} predates moved-unit records; restored units were inferred",
                                history_id
                            ));
                        }
                    }

                    if !details.copied_alias_ids.is_empty() {
                        diesel::delete(
                            building_aliases::table
                                .filter(building_aliases::id.eq_any(&details.copied_alias_ids)),
                        )
                        .execute(conn)
                        .await?;
                    }

                    diesel::update(building_merge_history::table.find(history_id))
                        .set((
                            building_merge_history::reverted_at.eq(&now),
                            building_merge_history::reverted_by.eq(&actor),
                        ))
                        .execute(conn)
                        .await?;

                    if !outcome.warnings.is_empty() {
                        warn!(
                            history = history_id,
                            warnings = outcome.warnings.len(),
                            "building merge reverted with partial loss"
                        );
                    }

                    Ok::<_, MergeError>(outcome)
                })
            })
            .await
        })?;

        Ok(outcome)
    }

    /// Merge unit `secondary_id` into `primary_id`.
    ///
    /// Moves listings one level down from the building case, records the
    /// exact moved-listing set, and deletes the consumed unit.
    pub async fn merge_units(
        &self,
        secondary_id: i32,
        primary_id: i32,
        actor: &str,
    ) -> Result<i32, MergeError> {
        if secondary_id == primary_id {
            return Err(MergeError::Validation(format!(
                "cannot merge unit {} into itself",
                secondary_id
            )));
        }

        let _guard = self
            .locks
            .try_acquire(MergeScope::Unit, &[secondary_id, primary_id])?;

        let actor = actor.to_string();
        let now = Utc::now().to_rfc3339();

        let history_id = with_conn!(self.pool, conn, {
            conn.transaction(|conn| {
                Box::pin(async move {
                    let secondary = load_unit(conn, secondary_id).await?;
                    let _primary = load_unit(conn, primary_id).await?;

                    let moved_listing_ids: Vec<i32> = listings::table
                        .filter(listings::unit_id.eq(secondary_id))
                        .select(listings::id)
                        .order(listings::id.asc())
                        .load(conn)
                        .await?;

                    if !moved_listing_ids.is_empty() {
                        diesel::update(
                            listings::table.filter(listings::id.eq_any(&moved_listing_ids)),
                        )
                        .set((listings::unit_id.eq(primary_id), listings::updated_at.eq(&now)))
                        .execute(conn)
                        .await?;
                    }

                    let details = UnitMergeDetails {
                        moved_listing_ids: Some(moved_listing_ids.clone()),
                        unit: Some(snapshot_unit(&secondary)),
                    };
                    let details_json = serde_json::to_string(&details)?;

                    diesel::insert_into(unit_merge_history::table)
                        .values((
                            unit_merge_history::primary_unit_id.eq(primary_id),
                            unit_merge_history::secondary_unit_id.eq(secondary_id),
                            unit_merge_history::moved_listings
                                .eq(moved_listing_ids.len() as i32),
                            unit_merge_history::merge_details.eq(&details_json),
                            unit_merge_history::merged_at.eq(&now),
                            unit_merge_history::merged_by.eq(&actor),
                        ))
                        .execute(conn)
                        .await?;
                    let row: LastInsertRowId = diesel::sql_query("SELECT last_insert_rowid()")
                        .get_result(conn)
                        .await?;

                    diesel::delete(units::table.find(secondary_id))
                        .execute(conn)
                        .await?;

                    info!(
                        secondary = secondary_id,
                        primary = primary_id,
                        moved_listings = moved_listing_ids.len(),
                        "merged unit"
                    );

                    Ok::<_, MergeError>(row.id as i32)
                })
            })
            .await
        })?;

        Ok(history_id)
    }

    /// Undo a unit merge.
    ///
    /// Recreates the consumed unit by its original id only if nothing else
    /// has since taken its place (or its identity hash).
    pub async fn revert_unit_merge(
        &self,
        history_id: i32,
        actor: &str,
    ) -> Result<RevertOutcome, MergeError> {
        let record = self.history.get_unit(history_id).await?.ok_or_else(|| {
            MergeError::Validation(format!("unit merge history {} not found", history_id))
        })?;
        if record.reverted_at.is_some() {
            return Err(MergeError::Validation(format!(
                "unit merge {} was already reverted",
                history_id
            )));
        }

        let _guard = self.locks.try_acquire(
            MergeScope::Unit,
            &[record.secondary_unit_id, record.primary_unit_id],
        )?;

        let actor = actor.to_string();
        let now = Utc::now().to_rfc3339();

        let outcome = with_conn!(self.pool, conn, {
            conn.transaction(|conn| {
                Box::pin(async move {
                    let record: UnitMergeHistoryRecord =
                        unit_merge_history::table.find(history_id).first(conn).await?;
                    if record.reverted_at.is_some() {
                        return Err(MergeError::Validation(format!(
                            "unit merge {} was already reverted",
                            history_id
                        )));
                    }
                    let details: UnitMergeDetails = serde_json::from_str(&record.merge_details)?;

                    let snapshot = details.unit.ok_or_else(|| {
                        MergeError::Validation(format!(
                            "history {} has no unit snapshot; cannot reconstruct unit {}",
                            history_id, record.secondary_unit_id
                        ))
                    })?;

                    let taken: Option<i32> = units::table
                        .find(snapshot.id)
                        .select(units::id)
                        .first(conn)
                        .await
                        .optional()?;
                    if taken.is_some() {
                        return Err(MergeError::Validation(format!(
                            "unit id {} already exists; merge {} cannot be reverted",
                            snapshot.id, history_id
                        )));
                    }

                    // The owning building may itself have been consumed since;
                    // follow its merge chain to the current root.
                    let owner = resolve_building_owner(conn, snapshot.building_id).await?;

                    // A live unit with the same hash is conclusively the same
                    // physical unit; recreating a twin would corrupt identity.
                    if let (Some(hash), Some(version)) =
                        (&snapshot.property_hash, snapshot.hash_version)
                    {
                        let conflict: Option<i32> = units::table
                            .filter(units::building_id.eq(owner))
                            .filter(units::property_hash.eq(hash))
                            .filter(units::hash_version.eq(version))
                            .select(units::id)
                            .first(conn)
                            .await
                            .optional()?;
                        if let Some(other) = conflict {
                            return Err(MergeError::Validation(format!(
                                "unit {} shares its identity hash with unit {}; merge {} cannot be reverted",
                                snapshot.id, other, history_id
                            )));
                        }
                    }

                    insert_unit_snapshot(conn, &snapshot, owner, &now).await?;

                    let mut outcome = RevertOutcome::default();

                    match details.moved_listing_ids {
                        Some(listing_ids) => {
                            for listing_id in listing_ids {
                                let exists: Option<i32> = listings::table
                                    .find(listing_id)
                                    .select(listings::id)
                                    .first(conn)
                                    .await
                                    .optional()?;
                                if exists.is_none() {
                                    outcome.warnings.push(format!(
                                        "listing {} no longer exists; not restored",
                                        listing_id
                                    ));
                                    continue;
                                }
                                diesel::update(listings::table.find(listing_id))
                                    .set((
                                        listings::unit_id.eq(snapshot.id),
                                        listings::updated_at.eq(&now),
                                    ))
                                    .execute(conn)
                                    .await?;
                                outcome.restored_ids.push(listing_id);
                            }
                        }
                        None => {
                            outcome.legacy_best_effort = true;
                            let explained =
                                explained_listing_ids(conn, record.primary_unit_id, history_id)
                                    .await?;
                            let current: Vec<i32> = listings::table
                                .filter(listings::unit_id.eq(record.primary_unit_id))
                                .select(listings::id)
                                .order(listings::id.asc())
                                .load(conn)
                                .await?;
                            for listing_id in current {
                                if explained.contains(&listing_id) {
                                    continue;
                                }
                                diesel::update(listings::table.find(listing_id))
                                    .set((
                                        listings::unit_id.eq(snapshot.id),
                                        listings::updated_at.eq(&now),
                                    ))
                                    .execute(conn)
                                    .await?;
                                outcome.restored_ids.push(listing_id);
                            }
                            outcome.warnings.push(format!(
                                "history {} predates moved-listing records; restored listings were inferred",
                                history_id
                            ));
                        }
                    }

                    diesel::update(unit_merge_history::table.find(history_id))
                        .set((
                            unit_merge_history::reverted_at.eq(&now),
                            unit_merge_history::reverted_by.eq(&actor),
                        ))
                        .execute(conn)
                        .await?;

                    Ok::<_, MergeError>(outcome)
                })
            })
            .await
        })?;

        Ok(outcome)
    }

    /// Record that a reverted pair is genuinely distinct.
    pub async fn add_exclusion(
        &self,
        scope: MergeScope,
        id_a: i32,
        id_b: i32,
        reason: Option<&str>,
        actor: &str,
    ) -> Result<i32, MergeError> {
        if id_a == id_b {
            return Err(MergeError::Validation(
                "cannot exclude an entity from merging with itself".to_string(),
            ));
        }
        Ok(self
            .history
            .add_exclusion(scope, id_a, id_b, reason, actor, Utc::now())
            .await?)
    }

    /// Buildings sharing a canonical name, grouped for operator review.
    ///
    /// Groups in which every pair has been excluded are dropped.
    pub async fn building_merge_candidates(
        &self,
    ) -> Result<Vec<(String, Vec<Building>)>, MergeError> {
        let groups = self.buildings.canonical_duplicate_groups().await?;
        let mut result = Vec::new();

        for group in groups {
            let members = self
                .buildings
                .find_by_canonical_name(&group.canonical_name)
                .await?;
            if members.len() < 2 {
                continue;
            }

            let mut any_open_pair = false;
            'outer: for (i, a) in members.iter().enumerate() {
                for b in members.iter().skip(i + 1) {
                    if !self
                        .history
                        .is_excluded(MergeScope::Building, a.id, b.id)
                        .await?
                    {
                        any_open_pair = true;
                        break 'outer;
                    }
                }
            }

            if any_open_pair {
                result.push((group.canonical_name, members));
            }
        }

        Ok(result)
    }
}

// -- transaction helpers --

type Conn = crate::repository::pool::SqliteConn;

async fn load_building(conn: &mut Conn, id: i32) -> Result<BuildingRecord, MergeError> {
    let record: Option<BuildingRecord> = buildings::table
        .find(id)
        .first(conn)
        .await
        .optional()?;
    match record {
        Some(record) => Ok(record),
        None => {
            let consumed_by: Option<i32> = building_merge_history::table
                .filter(building_merge_history::merged_building_id.eq(id))
                .filter(building_merge_history::reverted_at.is_null())
                .select(building_merge_history::id)
                .order(building_merge_history::id.desc())
                .first(conn)
                .await
                .optional()?;
            Err(match consumed_by {
                Some(history_id) => MergeError::Validation(format!(
                    "building {} was already consumed by merge {}",
                    id, history_id
                )),
                None => MergeError::Validation(format!("building {} not found", id)),
            })
        }
    }
}

async fn load_unit(conn: &mut Conn, id: i32) -> Result<UnitRecord, MergeError> {
    let record: Option<UnitRecord> = units::table.find(id).first(conn).await.optional()?;
    match record {
        Some(record) => Ok(record),
        None => {
            let consumed_by: Option<i32> = unit_merge_history::table
                .filter(unit_merge_history::secondary_unit_id.eq(id))
                .filter(unit_merge_history::reverted_at.is_null())
                .select(unit_merge_history::id)
                .order(unit_merge_history::id.desc())
                .first(conn)
                .await
                .optional()?;
            Err(match consumed_by {
                Some(history_id) => MergeError::Validation(format!(
                    "unit {} was already consumed by merge {}",
                    id, history_id
                )),
                None => MergeError::Validation(format!("unit {} not found", id)),
            })
        }
    }
}

/// Follow the consumed-by chain from a merge target to its current root.
///
/// Path-following only; no compression, so the stored audit rows stay
/// literal.
async fn follow_building_chain(
    conn: &mut Conn,
    start_id: i32,
) -> Result<(i32, i32), MergeError> {
    let mut current = start_id;
    let mut depth = 1;

    loop {
        let next: Option<i32> = building_merge_history::table
            .filter(building_merge_history::merged_building_id.eq(current))
            .filter(building_merge_history::reverted_at.is_null())
            .select(building_merge_history::direct_primary_building_id)
            .order(building_merge_history::id.desc())
            .first(conn)
            .await
            .optional()?;

        match next {
            Some(parent) if parent != current => {
                current = parent;
                depth += 1;
                if depth > MAX_MERGE_DEPTH {
                    return Err(MergeError::Validation(format!(
                        "merge chain from building {} exceeds depth {}",
                        start_id, MAX_MERGE_DEPTH
                    )));
                }
            }
            _ => return Ok((current, depth)),
        }
    }
}

/// Resolve where a (possibly since-consumed) building's contents live now.
async fn resolve_building_owner(conn: &mut Conn, building_id: i32) -> Result<i32, MergeError> {
    let mut current = building_id;
    for _ in 0..MAX_MERGE_DEPTH {
        let exists: Option<i32> = buildings::table
            .find(current)
            .select(buildings::id)
            .first(conn)
            .await
            .optional()?;
        if exists.is_some() {
            return Ok(current);
        }

        let next: Option<i32> = building_merge_history::table
            .filter(building_merge_history::merged_building_id.eq(current))
            .filter(building_merge_history::reverted_at.is_null())
            .select(building_merge_history::direct_primary_building_id)
            .order(building_merge_history::id.desc())
            .first(conn)
            .await
            .optional()?;
        match next {
            Some(parent) => current = parent,
            None => break,
        }
    }

    Err(MergeError::Validation(format!(
        "building {} no longer exists and its merge chain has no live root",
        building_id
    )))
}

/// Unit ids accounted for by other non-reverted merges into a primary.
async fn explained_unit_ids(
    conn: &mut Conn,
    primary_id: i32,
    except_history_id: i32,
) -> Result<HashSet<i32>, MergeError> {
    let rows: Vec<BuildingMergeHistoryRecord> = building_merge_history::table
        .filter(building_merge_history::direct_primary_building_id.eq(primary_id))
        .filter(building_merge_history::reverted_at.is_null())
        .filter(building_merge_history::id.ne(except_history_id))
        .load(conn)
        .await?;

    let mut explained = HashSet::new();
    for row in rows {
        if let Ok(details) = serde_json::from_str::<BuildingMergeDetails>(&row.merge_details) {
            if let Some(ids) = details.moved_unit_ids {
                explained.extend(ids);
            }
        }
    }
    Ok(explained)
}

/// Listing ids accounted for by other non-reverted merges into a primary.
async fn explained_listing_ids(
    conn: &mut Conn,
    primary_unit_id: i32,
    except_history_id: i32,
) -> Result<HashSet<i32>, MergeError> {
    let rows: Vec<UnitMergeHistoryRecord> = unit_merge_history::table
        .filter(unit_merge_history::primary_unit_id.eq(primary_unit_id))
        .filter(unit_merge_history::reverted_at.is_null())
        .filter(unit_merge_history::id.ne(except_history_id))
        .load(conn)
        .await?;

    let mut explained = HashSet::new();
    for row in rows {
        if let Ok(details) = serde_json::from_str::<UnitMergeDetails>(&row.merge_details) {
            if let Some(ids) = details.moved_listing_ids {
                explained.extend(ids);
            }
        }
    }
    Ok(explained)
}

fn snapshot_building(record: &BuildingRecord) -> BuildingSnapshot {
    BuildingSnapshot {
        id: record.id,
        normalized_name: record.normalized_name.clone(),
        canonical_name: record.canonical_name.clone(),
        reading: record.reading.clone(),
        address: record.address.clone(),
        normalized_address: record.normalized_address.clone(),
        station_info: record.station_info.clone(),
        built_year: record.built_year,
        built_month: record.built_month,
    }
}

fn snapshot_unit(record: &UnitRecord) -> UnitSnapshot {
    UnitSnapshot {
        id: record.id,
        building_id: record.building_id,
        room_number: record.room_number.clone(),
        floor_number: record.floor_number,
        area: record.area,
        layout: record.layout.clone(),
        direction: record.direction.clone(),
        property_hash: record.property_hash.clone(),
        hash_version: record.hash_version,
        display_building_name: record.display_building_name.clone(),
    }
}

async fn insert_building_snapshot(
    conn: &mut Conn,
    snapshot: &BuildingSnapshot,
    now: &str,
) -> Result<(), MergeError> {
    diesel::insert_into(buildings::table)
        .values((
            buildings::id.eq(snapshot.id),
            buildings::normalized_name.eq(&snapshot.normalized_name),
            buildings::canonical_name.eq(&snapshot.canonical_name),
            buildings::reading.eq(snapshot.reading.as_deref()),
            buildings::address.eq(snapshot.address.as_deref()),
            buildings::normalized_address.eq(snapshot.normalized_address.as_deref()),
            buildings::station_info.eq(snapshot.station_info.as_deref()),
            buildings::built_year.eq(snapshot.built_year),
            buildings::built_month.eq(snapshot.built_month),
            buildings::created_at.eq(now),
            buildings::updated_at.eq(now),
        ))
        .execute(conn)
        .await?;
    Ok(())
}

async fn insert_unit_snapshot(
    conn: &mut Conn,
    snapshot: &UnitSnapshot,
    building_id: i32,
    now: &str,
) -> Result<(), MergeError> {
    diesel::insert_into(units::table)
        .values((
            units::id.eq(snapshot.id),
            units::building_id.eq(building_id),
            units::room_number.eq(snapshot.room_number.as_deref()),
            units::floor_number.eq(snapshot.floor_number),
            units::area.eq(snapshot.area),
            units::layout.eq(snapshot.layout.as_deref()),
            units::direction.eq(snapshot.direction.as_deref()),
            units::property_hash.eq(snapshot.property_hash.as_deref()),
            units::hash_version.eq(snapshot.hash_version),
            units::display_building_name.eq(snapshot.display_building_name.as_deref()),
            units::is_resale.eq(0),
            units::created_at.eq(now),
            units::updated_at.eq(now),
        ))
        .execute(conn)
        .await?;
    Ok(())
}
