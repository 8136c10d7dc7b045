//! Unit repository.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::models::{LastInsertRowId, NewUnit, UnitRecord};
use super::pool::{DbPool, DieselError};
use super::{parse_datetime, parse_datetime_opt};
use crate::models::Unit;
use crate::schema::units;
use crate::with_conn;

impl From<UnitRecord> for Unit {
    fn from(record: UnitRecord) -> Self {
        Unit {
            id: record.id,
            building_id: record.building_id,
            room_number: record.room_number,
            floor_number: record.floor_number,
            area: record.area,
            layout: record.layout,
            direction: record.direction,
            property_hash: record.property_hash,
            hash_version: record.hash_version,
            display_building_name: record.display_building_name,
            sold_at: parse_datetime_opt(record.sold_at),
            final_price: record.final_price,
            is_resale: record.is_resale != 0,
            resale_unit_id: record.resale_unit_id,
            created_at: parse_datetime(&record.created_at),
            updated_at: parse_datetime(&record.updated_at),
        }
    }
}

/// Unit repository with compile-time query checking.
#[derive(Clone)]
pub struct UnitRepository {
    pool: DbPool,
}

impl UnitRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get a unit by ID.
    pub async fn get(&self, id: i32) -> Result<Option<Unit>, DieselError> {
        with_conn!(self.pool, conn, {
            units::table
                .find(id)
                .first::<UnitRecord>(&mut conn)
                .await
                .optional()
                .map(|opt| opt.map(Unit::from))
        })
    }

    /// All units of a building, ascending by ID.
    pub async fn list_by_building(&self, building_id: i32) -> Result<Vec<Unit>, DieselError> {
        with_conn!(self.pool, conn, {
            units::table
                .filter(units::building_id.eq(building_id))
                .order(units::id.asc())
                .load::<UnitRecord>(&mut conn)
                .await
                .map(|records| records.into_iter().map(Unit::from).collect())
        })
    }

    /// Find a unit by identity hash within a building.
    ///
    /// Hashes computed under a different template version never match.
    pub async fn find_by_hash(
        &self,
        building_id: i32,
        property_hash: &str,
        hash_version: i32,
    ) -> Result<Option<Unit>, DieselError> {
        with_conn!(self.pool, conn, {
            units::table
                .filter(units::building_id.eq(building_id))
                .filter(units::property_hash.eq(property_hash))
                .filter(units::hash_version.eq(hash_version))
                .first::<UnitRecord>(&mut conn)
                .await
                .optional()
                .map(|opt| opt.map(Unit::from))
        })
    }

    /// Find a unit by explicit room number within a building.
    ///
    /// Fallback identity for units whose hash inputs are incomplete.
    pub async fn find_by_room(
        &self,
        building_id: i32,
        floor_number: Option<i32>,
        room_number: &str,
    ) -> Result<Option<Unit>, DieselError> {
        with_conn!(self.pool, conn, {
            let mut query = units::table
                .filter(units::building_id.eq(building_id))
                .filter(units::room_number.eq(room_number))
                .into_boxed();
            if let Some(floor) = floor_number {
                query = query.filter(units::floor_number.eq(floor));
            }
            query
                .order(units::id.asc())
                .first::<UnitRecord>(&mut conn)
                .await
                .optional()
                .map(|opt| opt.map(Unit::from))
        })
    }

    /// Insert a unit and return its new ID.
    pub async fn insert(&self, unit: &Unit) -> Result<i32, DieselError> {
        let created_at = unit.created_at.to_rfc3339();
        let updated_at = unit.updated_at.to_rfc3339();

        with_conn!(self.pool, conn, {
            diesel::insert_into(units::table)
                .values(NewUnit {
                    building_id: unit.building_id,
                    room_number: unit.room_number.as_deref(),
                    floor_number: unit.floor_number,
                    area: unit.area,
                    layout: unit.layout.as_deref(),
                    direction: unit.direction.as_deref(),
                    property_hash: unit.property_hash.as_deref(),
                    hash_version: unit.hash_version,
                    display_building_name: unit.display_building_name.as_deref(),
                    is_resale: unit.is_resale as i32,
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

    /// Update a unit's resolved display name.
    pub async fn set_display_name(
        &self,
        id: i32,
        display_building_name: &str,
        now: DateTime<Utc>,
    ) -> Result<(), DieselError> {
        let updated_at = now.to_rfc3339();
        with_conn!(self.pool, conn, {
            diesel::update(units::table.find(id))
                .set((
                    units::display_building_name.eq(display_building_name),
                    units::updated_at.eq(&updated_at),
                ))
                .execute(&mut conn)
                .await?;
            Ok(())
        })
    }

    /// Stamp a unit as sold.
    pub async fn set_sold(
        &self,
        id: i32,
        sold_at: DateTime<Utc>,
        final_price: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<(), DieselError> {
        let sold = sold_at.to_rfc3339();
        let updated_at = now.to_rfc3339();
        with_conn!(self.pool, conn, {
            diesel::update(units::table.find(id))
                .set((
                    units::sold_at.eq(&sold),
                    units::final_price.eq(final_price),
                    units::updated_at.eq(&updated_at),
                ))
                .execute(&mut conn)
                .await?;
            Ok(())
        })
    }

    /// Set or clear a unit's resale flag.
    pub async fn set_resale(
        &self,
        id: i32,
        resale_unit_id: Option<i32>,
        now: DateTime<Utc>,
    ) -> Result<(), DieselError> {
        let updated_at = now.to_rfc3339();
        let is_resale = resale_unit_id.is_some() as i32;
        with_conn!(self.pool, conn, {
            diesel::update(units::table.find(id))
                .set((
                    units::is_resale.eq(is_resale),
                    units::resale_unit_id.eq(resale_unit_id),
                    units::updated_at.eq(&updated_at),
                ))
                .execute(&mut conn)
                .await?;
            Ok(())
        })
    }

    /// Distinct building IDs that own at least one unit.
    pub async fn building_ids_with_units(&self) -> Result<Vec<i32>, DieselError> {
        with_conn!(self.pool, conn, {
            units::table
                .select(units::building_id)
                .distinct()
                .order(units::building_id.asc())
                .load(&mut conn)
                .await
        })
    }
}
