//! Merge history and exclusion repository.
//!
//! The transactional merge/revert bodies live in the service layer; this
//! repository covers reads, revert stamping, and exclusion bookkeeping.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::models::{
    BuildingMergeHistoryRecord, LastInsertRowId, MergeExclusionRecord, NewMergeExclusion,
    UnitMergeHistoryRecord,
};
use super::pool::{DbPool, DieselError};
use super::{parse_datetime, parse_datetime_opt};
use crate::models::{
    BuildingMergeHistory, MergeExclusion, MergeScope, UnitMergeHistory,
};
use crate::schema::{building_merge_history, merge_exclusions, unit_merge_history};
use crate::with_conn;

impl TryFrom<BuildingMergeHistoryRecord> for BuildingMergeHistory {
    type Error = diesel::result::Error;

    fn try_from(record: BuildingMergeHistoryRecord) -> Result<Self, Self::Error> {
        let merge_details = serde_json::from_str(&record.merge_details)
            .map_err(|e| diesel::result::Error::DeserializationError(Box::new(e)))?;

        Ok(BuildingMergeHistory {
            id: record.id,
            merged_building_id: record.merged_building_id,
            direct_primary_building_id: record.direct_primary_building_id,
            final_primary_building_id: record.final_primary_building_id,
            merge_depth: record.merge_depth,
            merge_details,
            merged_at: parse_datetime(&record.merged_at),
            merged_by: record.merged_by,
            reverted_at: parse_datetime_opt(record.reverted_at),
            reverted_by: record.reverted_by,
        })
    }
}

impl TryFrom<UnitMergeHistoryRecord> for UnitMergeHistory {
    type Error = diesel::result::Error;

    fn try_from(record: UnitMergeHistoryRecord) -> Result<Self, Self::Error> {
        let merge_details = serde_json::from_str(&record.merge_details)
            .map_err(|e| diesel::result::Error::DeserializationError(Box::new(e)))?;

        Ok(UnitMergeHistory {
            id: record.id,
            primary_unit_id: record.primary_unit_id,
            secondary_unit_id: record.secondary_unit_id,
            moved_listings: record.moved_listings,
            merge_details,
            merged_at: parse_datetime(&record.merged_at),
            merged_by: record.merged_by,
            reverted_at: parse_datetime_opt(record.reverted_at),
            reverted_by: record.reverted_by,
        })
    }
}

impl From<MergeExclusionRecord> for MergeExclusion {
    fn from(record: MergeExclusionRecord) -> Self {
        MergeExclusion {
            id: record.id,
            scope: MergeScope::from_str(&record.scope).unwrap_or(MergeScope::Building),
            entity_id_a: record.entity_id_a,
            entity_id_b: record.entity_id_b,
            reason: record.reason,
            created_at: parse_datetime(&record.created_at),
            created_by: record.created_by,
        }
    }
}

/// Merge history repository with compile-time query checking.
#[derive(Clone)]
pub struct MergeHistoryRepository {
    pool: DbPool,
}

impl MergeHistoryRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get a building merge history row by ID.
    pub async fn get_building(
        &self,
        id: i32,
    ) -> Result<Option<BuildingMergeHistory>, DieselError> {
        with_conn!(self.pool, conn, {
            building_merge_history::table
                .find(id)
                .first::<BuildingMergeHistoryRecord>(&mut conn)
                .await
                .optional()
                .and_then(|opt| opt.map(BuildingMergeHistory::try_from).transpose())
        })
    }

    /// Get a unit merge history row by ID.
    pub async fn get_unit(&self, id: i32) -> Result<Option<UnitMergeHistory>, DieselError> {
        with_conn!(self.pool, conn, {
            unit_merge_history::table
                .find(id)
                .first::<UnitMergeHistoryRecord>(&mut conn)
                .await
                .optional()
                .and_then(|opt| opt.map(UnitMergeHistory::try_from).transpose())
        })
    }

    /// Record that a pair of entities must never be auto-suggested again.
    ///
    /// The pair is stored lower-id-first; re-adding an existing pair is a
    /// no-op returning the existing row's ID.
    pub async fn add_exclusion(
        &self,
        scope: MergeScope,
        id_a: i32,
        id_b: i32,
        reason: Option<&str>,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<i32, DieselError> {
        let (lo, hi) = if id_a <= id_b { (id_a, id_b) } else { (id_b, id_a) };
        let created_at = now.to_rfc3339();

        with_conn!(self.pool, conn, {
            let existing: Option<i32> = merge_exclusions::table
                .filter(merge_exclusions::scope.eq(scope.as_str()))
                .filter(merge_exclusions::entity_id_a.eq(lo))
                .filter(merge_exclusions::entity_id_b.eq(hi))
                .select(merge_exclusions::id)
                .first(&mut conn)
                .await
                .optional()?;
            if let Some(id) = existing {
                return Ok(id);
            }

            diesel::insert_into(merge_exclusions::table)
                .values(NewMergeExclusion {
                    scope: scope.as_str(),
                    entity_id_a: lo,
                    entity_id_b: hi,
                    reason,
                    created_at: &created_at,
                    created_by: actor,
                })
                .execute(&mut conn)
                .await?;

            let row: LastInsertRowId = diesel::sql_query("SELECT last_insert_rowid()")
                .get_result(&mut conn)
                .await?;
            Ok(row.id as i32)
        })
    }

    /// Whether a pair of entities is excluded from merge suggestion.
    pub async fn is_excluded(
        &self,
        scope: MergeScope,
        id_a: i32,
        id_b: i32,
    ) -> Result<bool, DieselError> {
        let (lo, hi) = if id_a <= id_b { (id_a, id_b) } else { (id_b, id_a) };
        with_conn!(self.pool, conn, {
            let count: i64 = merge_exclusions::table
                .filter(merge_exclusions::scope.eq(scope.as_str()))
                .filter(merge_exclusions::entity_id_a.eq(lo))
                .filter(merge_exclusions::entity_id_b.eq(hi))
                .count()
                .get_result(&mut conn)
                .await?;
            Ok(count > 0)
        })
    }

    /// All exclusions in a scope.
    pub async fn exclusions(&self, scope: MergeScope) -> Result<Vec<MergeExclusion>, DieselError> {
        with_conn!(self.pool, conn, {
            merge_exclusions::table
                .filter(merge_exclusions::scope.eq(scope.as_str()))
                .order(merge_exclusions::id.asc())
                .load::<MergeExclusionRecord>(&mut conn)
                .await
                .map(|records| records.into_iter().map(MergeExclusion::from).collect())
        })
    }
}
