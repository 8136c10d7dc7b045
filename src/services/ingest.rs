//! Listing ingestion: entity resolution on write.
//!
//! Each observation from a scraping adapter resolves to a building (by
//! normalized name, then alias), then to a unit (by identity hash, with
//! room-number fallback), then attaches or refreshes the listing row.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use url::Url;

use crate::identity;
use crate::models::{Building, Listing, ListingObservation, Unit};
use crate::normalize::{canonicalize, normalize};
use crate::repository::{
    BuildingRepository, DbPool, DieselError, ListingRepository, UnitRepository,
};

/// Counters for one ingest run.
#[derive(Debug, Clone, Copy, Default)]
pub struct IngestStats {
    pub observations: usize,
    pub new_buildings: usize,
    pub new_units: usize,
    pub new_listings: usize,
    pub updated_listings: usize,
}

/// Resolution result of one observation.
#[derive(Debug, Clone, Copy)]
pub struct IngestOutcome {
    pub building_id: i32,
    pub unit_id: i32,
    pub listing_id: i32,
}

/// Entity resolution and listing attachment on ingest.
#[derive(Clone)]
pub struct IngestService {
    buildings: BuildingRepository,
    units: UnitRepository,
    listings: ListingRepository,
}

impl IngestService {
    pub fn new(pool: DbPool) -> Self {
        Self {
            buildings: BuildingRepository::new(pool.clone()),
            units: UnitRepository::new(pool.clone()),
            listings: ListingRepository::new(pool),
        }
    }

    /// Process one observation end to end.
    pub async fn ingest_observation(
        &self,
        observation: &ListingObservation,
        stats: &mut IngestStats,
    ) -> Result<IngestOutcome, DieselError> {
        stats.observations += 1;

        let (building_id, building_created) = self
            .find_or_create_building(
                &observation.listing_building_name,
                observation.address.as_deref(),
            )
            .await?;
        if building_created {
            stats.new_buildings += 1;
        }

        let (unit_id, unit_created) = self.find_or_create_unit(building_id, observation).await?;
        if unit_created {
            stats.new_units += 1;
        }

        let (listing_id, listing_created) =
            self.attach_listing(unit_id, building_id, observation).await?;
        if listing_created {
            stats.new_listings += 1;
        } else {
            stats.updated_listings += 1;
        }

        Ok(IngestOutcome {
            building_id,
            unit_id,
            listing_id,
        })
    }

    /// Resolve a raw building name to an existing building or create one.
    ///
    /// Lookup order: exact normalized name, then alias (names carried over
    /// from merged-away buildings keep resolving to the surviving row).
    pub async fn find_or_create_building(
        &self,
        raw_name: &str,
        address: Option<&str>,
    ) -> Result<(i32, bool), DieselError> {
        let normalized = normalize(raw_name);

        if let Some(existing) = self.buildings.find_by_normalized_name(&normalized).await? {
            return Ok((existing.id, false));
        }
        if let Some(existing) = self.buildings.find_by_alias(&normalized).await? {
            debug!(
                alias = %normalized,
                building = existing.id,
                "resolved building through alias"
            );
            return Ok((existing.id, false));
        }

        let building = Building::from_raw(raw_name, address);
        let id = self.buildings.insert(&building).await?;
        debug!(building = id, name = %building.normalized_name, "created building");
        Ok((id, true))
    }

    /// Resolve an observation to an existing unit or create one.
    ///
    /// Hash-based identity when floor and area are present; explicit
    /// room-number equality otherwise. Observations with neither always
    /// create a fresh unit.
    pub async fn find_or_create_unit(
        &self,
        building_id: i32,
        observation: &ListingObservation,
    ) -> Result<(i32, bool), DieselError> {
        let hash = identity::property_hash(
            building_id,
            observation.floor_number,
            observation.area,
            observation.layout.as_deref(),
            observation.direction.as_deref(),
        );

        match hash {
            Ok(hash) => {
                if let Some(existing) = self
                    .units
                    .find_by_hash(building_id, &hash.hash, hash.version)
                    .await?
                {
                    return Ok((existing.id, false));
                }
                let unit = new_unit(building_id, observation, Some(hash));
                let id = self.units.insert(&unit).await?;
                Ok((id, true))
            }
            Err(undefined) => {
                debug!(
                    building = building_id,
                    source = %observation.source_site,
                    "{}; falling back to room-number identity",
                    undefined
                );
                if let Some(room) = observation.room_number.as_deref() {
                    if let Some(existing) = self
                        .units
                        .find_by_room(building_id, observation.floor_number, room)
                        .await?
                    {
                        return Ok((existing.id, false));
                    }
                }
                let unit = new_unit(building_id, observation, None);
                let id = self.units.insert(&unit).await?;
                Ok((id, true))
            }
        }
    }

    /// Attach an observation to a unit, creating or refreshing its listing.
    ///
    /// Also records the observed name variant in the building's
    /// listing-name pool for display-name voting.
    pub async fn attach_listing(
        &self,
        unit_id: i32,
        building_id: i32,
        observation: &ListingObservation,
    ) -> Result<(i32, bool), DieselError> {
        let now = Utc::now();
        let url = validated_url(observation);

        if let Some(existing) = self
            .listings
            .find_by_source(&observation.source_site, &observation.source_id)
            .await?
        {
            self.listings
                .update_observation(
                    existing.id,
                    observation.price,
                    url.as_deref(),
                    Some(observation.listing_building_name.as_str()),
                    &observation.detail_info,
                    observation.observed_at,
                    now,
                )
                .await?;
            return Ok((existing.id, false));
        }

        // The support count tracks listings, not observations, so the name
        // pool only grows when a listing is first seen.
        let normalized_name = normalize(&observation.listing_building_name);
        if !normalized_name.is_empty() {
            self.buildings
                .record_listing_name(
                    building_id,
                    &normalized_name,
                    &canonicalize(&normalized_name),
                    now,
                )
                .await?;
        }

        let listing = new_listing(unit_id, observation, url, now);
        let id = self.listings.insert(&listing).await?;
        Ok((id, true))
    }

    /// Delist every active listing of a site not observed by the latest
    /// scrape run. Returns the number delisted.
    pub async fn mark_delisted(
        &self,
        source_site: &str,
        seen_source_ids: &[String],
        observed_at: DateTime<Utc>,
    ) -> Result<usize, DieselError> {
        self.listings
            .mark_delisted_except(source_site, seen_source_ids, observed_at, Utc::now())
            .await
    }
}

fn validated_url(observation: &ListingObservation) -> Option<String> {
    match observation.url.as_deref() {
        Some(raw) => match Url::parse(raw) {
            Ok(url) => Some(url.to_string()),
            Err(e) => {
                warn!(
                    source = %observation.source_site,
                    source_id = %observation.source_id,
                    "discarding unparseable listing URL: {}",
                    e
                );
                None
            }
        },
        None => None,
    }
}

fn new_unit(
    building_id: i32,
    observation: &ListingObservation,
    hash: Option<identity::PropertyHash>,
) -> Unit {
    let now = Utc::now();
    Unit {
        id: 0, // Set by database
        building_id,
        room_number: observation.room_number.clone(),
        floor_number: observation.floor_number,
        area: observation.area,
        layout: observation.layout.clone(),
        direction: observation.direction.clone(),
        property_hash: hash.as_ref().map(|h| h.hash.clone()),
        hash_version: hash.as_ref().map(|h| h.version),
        display_building_name: None,
        sold_at: None,
        final_price: None,
        is_resale: false,
        resale_unit_id: None,
        created_at: now,
        updated_at: now,
    }
}

fn new_listing(
    unit_id: i32,
    observation: &ListingObservation,
    url: Option<String>,
    now: chrono::DateTime<Utc>,
) -> Listing {
    Listing {
        id: 0, // Set by database
        unit_id,
        source_site: observation.source_site.clone(),
        source_id: observation.source_id.clone(),
        url,
        is_active: true,
        first_seen_at: observation.observed_at,
        last_seen_at: observation.observed_at,
        delisted_at: None,
        current_price: observation.price,
        listing_building_name: Some(observation.listing_building_name.clone()),
        detail_info: observation.detail_info.clone(),
        created_at: now,
        updated_at: now,
    }
}
