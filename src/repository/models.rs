//! Diesel ORM records for database tables.
//!
//! Records mirror table rows exactly (TEXT timestamps, JSON TEXT
//! payloads); conversion into domain models lives next to each repository.

use diesel::prelude::*;

use crate::schema;

/// Building record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::buildings)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct BuildingRecord {
    pub id: i32,
    pub normalized_name: String,
    pub canonical_name: String,
    pub reading: Option<String>,
    pub address: Option<String>,
    pub normalized_address: Option<String>,
    pub station_info: Option<String>,
    pub built_year: Option<i32>,
    pub built_month: Option<i32>,
    pub created_at: String,
    pub updated_at: String,
}

/// New building for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::buildings)]
pub struct NewBuilding<'a> {
    pub normalized_name: &'a str,
    pub canonical_name: &'a str,
    pub reading: Option<&'a str>,
    pub address: Option<&'a str>,
    pub normalized_address: Option<&'a str>,
    pub station_info: Option<&'a str>,
    pub built_year: Option<i32>,
    pub built_month: Option<i32>,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

/// Building alias record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::building_aliases)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct BuildingAliasRecord {
    pub id: i32,
    pub building_id: i32,
    pub alias_name: String,
    pub source: String,
    pub created_at: String,
}

/// New building alias for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::building_aliases)]
pub struct NewBuildingAlias<'a> {
    pub building_id: i32,
    pub alias_name: &'a str,
    pub source: &'a str,
    pub created_at: &'a str,
}

/// Building listing-name pool record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::building_listing_names)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct BuildingListingNameRecord {
    pub id: i32,
    pub building_id: i32,
    pub normalized_name: String,
    pub canonical_name: String,
    pub listing_count: i32,
    pub created_at: String,
    pub updated_at: String,
}

/// New listing-name pool row for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::building_listing_names)]
pub struct NewBuildingListingName<'a> {
    pub building_id: i32,
    pub normalized_name: &'a str,
    pub canonical_name: &'a str,
    pub listing_count: i32,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

/// Unit record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::units)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct UnitRecord {
    pub id: i32,
    pub building_id: i32,
    pub room_number: Option<String>,
    pub floor_number: Option<i32>,
    pub area: Option<f64>,
    pub layout: Option<String>,
    pub direction: Option<String>,
    pub property_hash: Option<String>,
    pub hash_version: Option<i32>,
    pub display_building_name: Option<String>,
    pub sold_at: Option<String>,
    pub final_price: Option<i64>,
    pub is_resale: i32,
    pub resale_unit_id: Option<i32>,
    pub created_at: String,
    pub updated_at: String,
}

/// New unit for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::units)]
pub struct NewUnit<'a> {
    pub building_id: i32,
    pub room_number: Option<&'a str>,
    pub floor_number: Option<i32>,
    pub area: Option<f64>,
    pub layout: Option<&'a str>,
    pub direction: Option<&'a str>,
    pub property_hash: Option<&'a str>,
    pub hash_version: Option<i32>,
    pub display_building_name: Option<&'a str>,
    pub is_resale: i32,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

/// Listing record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::listings)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ListingRecord {
    pub id: i32,
    pub unit_id: i32,
    pub source_site: String,
    pub source_id: String,
    pub url: Option<String>,
    pub is_active: i32,
    pub first_seen_at: String,
    pub last_seen_at: String,
    pub delisted_at: Option<String>,
    pub current_price: Option<i64>,
    pub listing_building_name: Option<String>,
    pub detail_info: String,
    pub created_at: String,
    pub updated_at: String,
}

/// New listing for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::listings)]
pub struct NewListing<'a> {
    pub unit_id: i32,
    pub source_site: &'a str,
    pub source_id: &'a str,
    pub url: Option<&'a str>,
    pub is_active: i32,
    pub first_seen_at: &'a str,
    pub last_seen_at: &'a str,
    pub current_price: Option<i64>,
    pub listing_building_name: Option<&'a str>,
    pub detail_info: &'a str,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

/// Building merge history record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::building_merge_history)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct BuildingMergeHistoryRecord {
    pub id: i32,
    pub merged_building_id: i32,
    pub direct_primary_building_id: i32,
    pub final_primary_building_id: i32,
    pub merge_depth: i32,
    pub merge_details: String,
    pub merged_at: String,
    pub merged_by: String,
    pub reverted_at: Option<String>,
    pub reverted_by: Option<String>,
}

/// Unit merge history record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::unit_merge_history)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct UnitMergeHistoryRecord {
    pub id: i32,
    pub primary_unit_id: i32,
    pub secondary_unit_id: i32,
    pub moved_listings: i32,
    pub merge_details: String,
    pub merged_at: String,
    pub merged_by: String,
    pub reverted_at: Option<String>,
    pub reverted_by: Option<String>,
}

/// Merge exclusion record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::merge_exclusions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct MergeExclusionRecord {
    pub id: i32,
    pub scope: String,
    pub entity_id_a: i32,
    pub entity_id_b: i32,
    pub reason: Option<String>,
    pub created_at: String,
    pub created_by: String,
}

/// New merge exclusion for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::merge_exclusions)]
pub struct NewMergeExclusion<'a> {
    pub scope: &'a str,
    pub entity_id_a: i32,
    pub entity_id_b: i32,
    pub reason: Option<&'a str>,
    pub created_at: &'a str,
    pub created_by: &'a str,
}

/// Row id helper for `SELECT last_insert_rowid()`.
#[derive(QueryableByName)]
pub struct LastInsertRowId {
    #[diesel(sql_type = diesel::sql_types::BigInt, column_name = "last_insert_rowid()")]
    pub id: i64,
}
