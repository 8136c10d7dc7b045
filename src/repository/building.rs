//! Building repository.
//!
//! Uses diesel-async to provide an async interface while maintaining
//! Diesel's compile-time query checking.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::models::{
    BuildingAliasRecord, BuildingListingNameRecord, BuildingRecord, LastInsertRowId, NewBuilding,
    NewBuildingAlias, NewBuildingListingName,
};
use super::pool::{DbPool, DieselError};
use super::parse_datetime;
use crate::models::{AliasSource, Building, BuildingAlias, BuildingListingName};
use crate::schema::{building_aliases, building_listing_names, buildings};
use crate::with_conn;

impl From<BuildingRecord> for Building {
    fn from(record: BuildingRecord) -> Self {
        Building {
            id: record.id,
            normalized_name: record.normalized_name,
            canonical_name: record.canonical_name,
            reading: record.reading,
            address: record.address,
            normalized_address: record.normalized_address,
            station_info: record.station_info,
            built_year: record.built_year,
            built_month: record.built_month,
            created_at: parse_datetime(&record.created_at),
            updated_at: parse_datetime(&record.updated_at),
        }
    }
}

impl From<BuildingAliasRecord> for BuildingAlias {
    fn from(record: BuildingAliasRecord) -> Self {
        BuildingAlias {
            id: record.id,
            building_id: record.building_id,
            alias_name: record.alias_name,
            source: AliasSource::from_str(&record.source).unwrap_or(AliasSource::Manual),
            created_at: parse_datetime(&record.created_at),
        }
    }
}

impl From<BuildingListingNameRecord> for BuildingListingName {
    fn from(record: BuildingListingNameRecord) -> Self {
        BuildingListingName {
            id: record.id,
            building_id: record.building_id,
            normalized_name: record.normalized_name,
            canonical_name: record.canonical_name,
            listing_count: record.listing_count,
            created_at: parse_datetime(&record.created_at),
            updated_at: parse_datetime(&record.updated_at),
        }
    }
}

/// A group of buildings sharing one canonical name.
#[derive(QueryableByName, Debug)]
pub struct CanonicalGroup {
    #[diesel(sql_type = diesel::sql_types::Text)]
    pub canonical_name: String,
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    pub building_count: i64,
}

/// Building repository with compile-time query checking.
#[derive(Clone)]
pub struct BuildingRepository {
    pool: DbPool,
}

impl BuildingRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get a building by ID.
    pub async fn get(&self, id: i32) -> Result<Option<Building>, DieselError> {
        with_conn!(self.pool, conn, {
            buildings::table
                .find(id)
                .first::<BuildingRecord>(&mut conn)
                .await
                .optional()
                .map(|opt| opt.map(Building::from))
        })
    }

    /// Find a building by exact normalized name.
    pub async fn find_by_normalized_name(
        &self,
        normalized_name: &str,
    ) -> Result<Option<Building>, DieselError> {
        with_conn!(self.pool, conn, {
            buildings::table
                .filter(buildings::normalized_name.eq(normalized_name))
                .order(buildings::id.asc())
                .first::<BuildingRecord>(&mut conn)
                .await
                .optional()
                .map(|opt| opt.map(Building::from))
        })
    }

    /// Find all buildings sharing a canonical name.
    pub async fn find_by_canonical_name(
        &self,
        canonical_name: &str,
    ) -> Result<Vec<Building>, DieselError> {
        with_conn!(self.pool, conn, {
            buildings::table
                .filter(buildings::canonical_name.eq(canonical_name))
                .order(buildings::id.asc())
                .load::<BuildingRecord>(&mut conn)
                .await
                .map(|records| records.into_iter().map(Building::from).collect())
        })
    }

    /// Find the building owning an alias, if any.
    pub async fn find_by_alias(&self, alias_name: &str) -> Result<Option<Building>, DieselError> {
        with_conn!(self.pool, conn, {
            building_aliases::table
                .inner_join(buildings::table)
                .filter(building_aliases::alias_name.eq(alias_name))
                .order(building_aliases::id.asc())
                .select(BuildingRecord::as_select())
                .first::<BuildingRecord>(&mut conn)
                .await
                .optional()
                .map(|opt| opt.map(Building::from))
        })
    }

    /// Insert a building and return its new ID.
    pub async fn insert(&self, building: &Building) -> Result<i32, DieselError> {
        let created_at = building.created_at.to_rfc3339();
        let updated_at = building.updated_at.to_rfc3339();

        with_conn!(self.pool, conn, {
            diesel::insert_into(buildings::table)
                .values(NewBuilding {
                    normalized_name: &building.normalized_name,
                    canonical_name: &building.canonical_name,
                    reading: building.reading.as_deref(),
                    address: building.address.as_deref(),
                    normalized_address: building.normalized_address.as_deref(),
                    station_info: building.station_info.as_deref(),
                    built_year: building.built_year,
                    built_month: building.built_month,
                    created_at: &created_at,
                    updated_at: &updated_at,
                })
                .execute(&mut conn)
                .await?;

            let row: LastInsertRowId = diesel::sql_query("SELECT last_insert_rowid()")
                .get_result(&mut conn)
                .await?;
            Ok(row.id as i32)
        })
    }

    /// Update a building's station info.
    pub async fn set_station_info(
        &self,
        id: i32,
        station_info: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), DieselError> {
        let updated_at = now.to_rfc3339();
        with_conn!(self.pool, conn, {
            diesel::update(buildings::table.find(id))
                .set((
                    buildings::station_info.eq(station_info),
                    buildings::updated_at.eq(&updated_at),
                ))
                .execute(&mut conn)
                .await?;
            Ok(())
        })
    }

    /// All building IDs, ascending. Batch passes iterate over this.
    pub async fn list_ids(&self) -> Result<Vec<i32>, DieselError> {
        with_conn!(self.pool, conn, {
            buildings::table
                .select(buildings::id)
                .order(buildings::id.asc())
                .load(&mut conn)
                .await
        })
    }

    /// Canonical names shared by more than one building.
    ///
    /// The raw material for duplicate-candidate review; exclusion filtering
    /// happens in the service layer.
    pub async fn canonical_duplicate_groups(&self) -> Result<Vec<CanonicalGroup>, DieselError> {
        with_conn!(self.pool, conn, {
            diesel::sql_query(
                r#"
                SELECT canonical_name, COUNT(*) as building_count
                FROM buildings
                WHERE canonical_name != ''
                GROUP BY canonical_name
                HAVING COUNT(*) > 1
                ORDER BY building_count DESC, canonical_name ASC
                "#,
            )
            .load(&mut conn)
            .await
        })
    }

    /// All aliases of a building.
    pub async fn aliases(&self, building_id: i32) -> Result<Vec<BuildingAlias>, DieselError> {
        with_conn!(self.pool, conn, {
            building_aliases::table
                .filter(building_aliases::building_id.eq(building_id))
                .order(building_aliases::id.asc())
                .load::<BuildingAliasRecord>(&mut conn)
                .await
                .map(|records| records.into_iter().map(BuildingAlias::from).collect())
        })
    }

    /// Insert an alias unless an identical one already exists.
    ///
    /// Returns the new alias ID, or None when skipped as a duplicate.
    pub async fn insert_alias(
        &self,
        building_id: i32,
        alias_name: &str,
        source: AliasSource,
        now: DateTime<Utc>,
    ) -> Result<Option<i32>, DieselError> {
        let created_at = now.to_rfc3339();
        with_conn!(self.pool, conn, {
            let existing: i64 = building_aliases::table
                .filter(building_aliases::building_id.eq(building_id))
                .filter(building_aliases::alias_name.eq(alias_name))
                .count()
                .get_result(&mut conn)
                .await?;
            if existing > 0 {
                return Ok(None);
            }

            diesel::insert_into(building_aliases::table)
                .values(NewBuildingAlias {
                    building_id,
                    alias_name,
                    source: source.as_str(),
                    created_at: &created_at,
                })
                .execute(&mut conn)
                .await?;

            let row: LastInsertRowId = diesel::sql_query("SELECT last_insert_rowid()")
                .get_result(&mut conn)
                .await?;
            Ok(Some(row.id as i32))
        })
    }

    /// Record a listing-supplied name variant, bumping its support count.
    pub async fn record_listing_name(
        &self,
        building_id: i32,
        normalized_name: &str,
        canonical_name: &str,
        now: DateTime<Utc>,
    ) -> Result<(), DieselError> {
        let stamp = now.to_rfc3339();
        with_conn!(self.pool, conn, {
            let updated = diesel::update(
                building_listing_names::table
                    .filter(building_listing_names::building_id.eq(building_id))
                    .filter(building_listing_names::canonical_name.eq(canonical_name)),
            )
            .set((
                building_listing_names::listing_count
                    .eq(building_listing_names::listing_count + 1),
                building_listing_names::updated_at.eq(&stamp),
            ))
            .execute(&mut conn)
            .await?;

            if updated == 0 {
                diesel::insert_into(building_listing_names::table)
                    .values(NewBuildingListingName {
                        building_id,
                        normalized_name,
                        canonical_name,
                        listing_count: 1,
                        created_at: &stamp,
                        updated_at: &stamp,
                    })
                    .execute(&mut conn)
                    .await?;
            }
            Ok(())
        })
    }

    /// Listing-name variants recorded for a building.
    pub async fn listing_names(
        &self,
        building_id: i32,
    ) -> Result<Vec<BuildingListingName>, DieselError> {
        with_conn!(self.pool, conn, {
            building_listing_names::table
                .filter(building_listing_names::building_id.eq(building_id))
                .order(building_listing_names::listing_count.desc())
                .load::<BuildingListingNameRecord>(&mut conn)
                .await
                .map(|records| records.into_iter().map(BuildingListingName::from).collect())
        })
    }
}
