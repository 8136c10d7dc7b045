//! Listing repository.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::models::{LastInsertRowId, ListingRecord, NewListing};
use super::pool::{DbPool, DieselError};
use super::{parse_datetime, parse_datetime_opt};
use crate::models::Listing;
use crate::schema::{listings, units};
use crate::with_conn;

impl TryFrom<ListingRecord> for Listing {
    type Error = diesel::result::Error;

    fn try_from(record: ListingRecord) -> Result<Self, Self::Error> {
        let detail_info = serde_json::from_str(&record.detail_info)
            .map_err(|e| diesel::result::Error::DeserializationError(Box::new(e)))?;

        Ok(Listing {
            id: record.id,
            unit_id: record.unit_id,
            source_site: record.source_site,
            source_id: record.source_id,
            url: record.url,
            is_active: record.is_active != 0,
            first_seen_at: parse_datetime(&record.first_seen_at),
            last_seen_at: parse_datetime(&record.last_seen_at),
            delisted_at: parse_datetime_opt(record.delisted_at),
            current_price: record.current_price,
            listing_building_name: record.listing_building_name,
            detail_info,
            created_at: parse_datetime(&record.created_at),
            updated_at: parse_datetime(&record.updated_at),
        })
    }
}

/// Listing repository with compile-time query checking.
#[derive(Clone)]
pub struct ListingRepository {
    pool: DbPool,
}

impl ListingRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get a listing by ID.
    pub async fn get(&self, id: i32) -> Result<Option<Listing>, DieselError> {
        with_conn!(self.pool, conn, {
            listings::table
                .find(id)
                .first::<ListingRecord>(&mut conn)
                .await
                .optional()
                .and_then(|opt| opt.map(Listing::try_from).transpose())
        })
    }

    /// Find the listing for a `(source_site, source_id)` pair.
    pub async fn find_by_source(
        &self,
        source_site: &str,
        source_id: &str,
    ) -> Result<Option<Listing>, DieselError> {
        with_conn!(self.pool, conn, {
            listings::table
                .filter(listings::source_site.eq(source_site))
                .filter(listings::source_id.eq(source_id))
                .first::<ListingRecord>(&mut conn)
                .await
                .optional()
                .and_then(|opt| opt.map(Listing::try_from).transpose())
        })
    }

    /// All listings of a unit, ascending by ID.
    pub async fn list_by_unit(&self, unit_id: i32) -> Result<Vec<Listing>, DieselError> {
        with_conn!(self.pool, conn, {
            listings::table
                .filter(listings::unit_id.eq(unit_id))
                .order(listings::id.asc())
                .load::<ListingRecord>(&mut conn)
                .await
                .and_then(|records| records.into_iter().map(Listing::try_from).collect())
        })
    }

    /// All listings attached to any unit of a building.
    pub async fn list_by_building(&self, building_id: i32) -> Result<Vec<Listing>, DieselError> {
        with_conn!(self.pool, conn, {
            listings::table
                .inner_join(units::table)
                .filter(units::building_id.eq(building_id))
                .order(listings::id.asc())
                .select(ListingRecord::as_select())
                .load::<ListingRecord>(&mut conn)
                .await
                .and_then(|records| records.into_iter().map(Listing::try_from).collect())
        })
    }

    /// Insert a listing and return its new ID.
    pub async fn insert(&self, listing: &Listing) -> Result<i32, DieselError> {
        let detail_info = serde_json::to_string(&listing.detail_info)
            .unwrap_or_else(|_| "null".to_string());
        let first_seen_at = listing.first_seen_at.to_rfc3339();
        let last_seen_at = listing.last_seen_at.to_rfc3339();
        let created_at = listing.created_at.to_rfc3339();
        let updated_at = listing.updated_at.to_rfc3339();

        with_conn!(self.pool, conn, {
            diesel::insert_into(listings::table)
                .values(NewListing {
                    unit_id: listing.unit_id,
                    source_site: &listing.source_site,
                    source_id: &listing.source_id,
                    url: listing.url.as_deref(),
                    is_active: listing.is_active as i32,
                    first_seen_at: &first_seen_at,
                    last_seen_at: &last_seen_at,
                    current_price: listing.current_price,
                    listing_building_name: listing.listing_building_name.as_deref(),
                    detail_info: &detail_info,
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

    /// Refresh an existing listing from a new observation.
    ///
    /// Reactivates delisted listings that reappear.
    #[allow(clippy::too_many_arguments)]
    pub async fn update_observation(
        &self,
        id: i32,
        current_price: Option<i64>,
        url: Option<&str>,
        listing_building_name: Option<&str>,
        detail_info: &serde_json::Value,
        observed_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), DieselError> {
        let detail =
            serde_json::to_string(detail_info).unwrap_or_else(|_| "null".to_string());
        let last_seen = observed_at.to_rfc3339();
        let updated_at = now.to_rfc3339();

        with_conn!(self.pool, conn, {
            diesel::update(listings::table.find(id))
                .set((
                    listings::current_price.eq(current_price),
                    listings::url.eq(url),
                    listings::listing_building_name.eq(listing_building_name),
                    listings::detail_info.eq(&detail),
                    listings::last_seen_at.eq(&last_seen),
                    listings::is_active.eq(1),
                    listings::delisted_at.eq(None::<String>),
                    listings::updated_at.eq(&updated_at),
                ))
                .execute(&mut conn)
                .await?;
            Ok(())
        })
    }

    /// Delist every active listing of a site that a scrape run no longer
    /// observed. Returns the number of listings delisted.
    pub async fn mark_delisted_except(
        &self,
        source_site: &str,
        seen_source_ids: &[String],
        observed_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<usize, DieselError> {
        let delisted_at = observed_at.to_rfc3339();
        let updated_at = now.to_rfc3339();

        with_conn!(self.pool, conn, {
            diesel::update(
                listings::table
                    .filter(listings::source_site.eq(source_site))
                    .filter(listings::is_active.eq(1))
                    .filter(listings::source_id.ne_all(seen_source_ids)),
            )
            .set((
                listings::is_active.eq(0),
                listings::delisted_at.eq(&delisted_at),
                listings::updated_at.eq(&updated_at),
            ))
            .execute(&mut conn)
            .await
        })
    }
}
