//! Repository layer for database persistence.
//!
//! All database access uses Diesel ORM with compile-time query checking
//! over SQLite.

pub mod building;
pub mod listing;
pub mod merge_history;
pub mod migrations;
pub mod models;
pub mod pool;
pub mod unit;
pub mod util;

pub use building::{BuildingRepository, CanonicalGroup};
pub use listing::ListingRepository;
pub use merge_history::MergeHistoryRepository;
pub use pool::{DbPool, DieselError};
pub use unit::UnitRepository;

#[allow(unused_imports)]
pub use models::{
    BuildingAliasRecord, BuildingListingNameRecord, BuildingMergeHistoryRecord, BuildingRecord,
    ListingRecord, MergeExclusionRecord, NewBuilding, NewBuildingAlias, NewBuildingListingName,
    NewListing, NewMergeExclusion, NewUnit, UnitMergeHistoryRecord, UnitRecord,
};

use chrono::{DateTime, Utc};

/// Bundled repository access for all database operations.
///
/// Constructed via [`crate::config::Settings::repositories()`] to eliminate
/// repetitive pool plumbing in CLI commands.
pub struct Repositories {
    pub buildings: BuildingRepository,
    pub units: UnitRepository,
    pub listings: ListingRepository,
    pub merge_history: MergeHistoryRepository,
    pool: DbPool,
}

impl Repositories {
    pub fn new(pool: DbPool) -> Self {
        Self {
            buildings: BuildingRepository::new(pool.clone()),
            units: UnitRepository::new(pool.clone()),
            listings: ListingRepository::new(pool.clone()),
            merge_history: MergeHistoryRepository::new(pool.clone()),
            pool,
        }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

/// Parse a datetime string from the database, defaulting to Unix epoch on error.
pub fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Parse an optional datetime string from the database.
pub fn parse_datetime_opt(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    })
}
