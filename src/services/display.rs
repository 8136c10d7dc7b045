//! Majority-vote recomputation of display attributes.
//!
//! Batch, read-mostly pass: per building it re-resolves every unit's
//! display name and the building's station info from the current listing
//! population. Idempotent and interruptible; each entity commits on its
//! own, so re-running from scratch is always safe.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use crate::models::{Listing, MergeScope};
use crate::repository::{
    BuildingRepository, DbPool, DieselError, ListingRepository, UnitRepository,
};
use crate::resolver::{resolve, resolve_blocks, VoteCandidate};

use super::locks::LockRegistry;

/// Key inside a listing's `detail_info` payload carrying the station blurb.
const STATION_INFO_KEY: &str = "station_info";

/// Counters for one recompute pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisplayStats {
    pub buildings_processed: usize,
    pub buildings_skipped: usize,
    pub unit_names_updated: usize,
    pub station_infos_updated: usize,
}

/// Recomputes denormalized display attributes from listings.
#[derive(Clone)]
pub struct DisplayResolutionService {
    buildings: BuildingRepository,
    units: UnitRepository,
    listings: ListingRepository,
    locks: Arc<LockRegistry>,
}

impl DisplayResolutionService {
    pub fn new(pool: DbPool, locks: Arc<LockRegistry>) -> Self {
        Self {
            buildings: BuildingRepository::new(pool.clone()),
            units: UnitRepository::new(pool.clone()),
            listings: ListingRepository::new(pool),
            locks,
        }
    }

    /// Recompute display attributes for every building.
    pub async fn recompute_all(&self) -> Result<DisplayStats, DieselError> {
        let mut stats = DisplayStats::default();
        for building_id in self.buildings.list_ids().await? {
            self.recompute_building_into(building_id, &mut stats).await?;
        }
        Ok(stats)
    }

    /// Recompute display attributes for one building.
    pub async fn recompute_building(&self, building_id: i32) -> Result<DisplayStats, DieselError> {
        let mut stats = DisplayStats::default();
        self.recompute_building_into(building_id, &mut stats).await?;
        Ok(stats)
    }

    async fn recompute_building_into(
        &self,
        building_id: i32,
        stats: &mut DisplayStats,
    ) -> Result<(), DieselError> {
        // Never overlap a merge on the same building; contended buildings
        // are skipped and picked up by the next run.
        let guard = self.locks.try_acquire(MergeScope::Building, &[building_id]);
        let _guard = match guard {
            Ok(guard) => guard,
            Err(e) => {
                warn!(building = building_id, "skipping recompute: {}", e);
                stats.buildings_skipped += 1;
                return Ok(());
            }
        };

        let Some(building) = self.buildings.get(building_id).await? else {
            return Ok(());
        };
        stats.buildings_processed += 1;

        let now = Utc::now();

        // Per-unit display names from each unit's own listings. Sub-wings
        // of one building keep their individually observed names.
        for unit in self.units.list_by_building(building_id).await? {
            let unit_listings = self.listings.list_by_unit(unit.id).await?;
            let candidates: Vec<VoteCandidate> = unit_listings
                .iter()
                .filter_map(|listing| {
                    listing.listing_building_name.as_ref().map(|name| {
                        VoteCandidate::new(name.clone(), listing.last_seen_at, listing.is_active)
                    })
                })
                .collect();

            if let Some(resolved) = resolve(&candidates) {
                // Only an actual change writes; idempotent re-runs are free.
                if unit.display_building_name.as_deref() != Some(resolved.as_str()) {
                    self.units.set_display_name(unit.id, &resolved, now).await?;
                    stats.unit_names_updated += 1;
                }
            }
        }

        // Station info votes as whole blocks across the building's listings.
        let building_listings = self.listings.list_by_building(building_id).await?;
        let station_candidates: Vec<VoteCandidate> = building_listings
            .iter()
            .filter_map(|listing| {
                station_block(listing).map(|block| {
                    VoteCandidate::new(block, listing.last_seen_at, listing.is_active)
                })
            })
            .collect();

        if let Some(resolved) = resolve_blocks(&station_candidates) {
            if building.station_info.as_deref() != Some(resolved.as_str()) {
                self.buildings
                    .set_station_info(building_id, Some(&resolved), now)
                    .await?;
                stats.station_infos_updated += 1;
            }
        }

        debug!(building = building_id, "recomputed display attributes");
        Ok(())
    }
}

/// Extract the station text block from a listing's scraper payload.
fn station_block(listing: &Listing) -> Option<String> {
    listing
        .detail_info
        .get(STATION_INFO_KEY)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .filter(|s| !s.trim().is_empty())
}
