//! Resale detection.
//!
//! A unit whose listings have all gone inactive is considered sold at its
//! latest delisting. When a structurally identical unit in the same
//! building appears on the market shortly after, at a higher price, it is
//! flagged as a resale of the sold unit. Flags are derived data: every
//! pass regenerates them from current listing state.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::models::{Listing, MergeScope, Unit};
use crate::repository::{DbPool, DieselError, ListingRepository, UnitRepository};

use super::locks::LockRegistry;

/// A relisting counts as a resale only within this window after the sale.
const RESALE_WINDOW_DAYS: i64 = 60;

/// Counters for one detection pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResaleStats {
    pub buildings_processed: usize,
    pub buildings_skipped: usize,
    pub units_sold: usize,
    pub resales_flagged: usize,
    pub flags_cleared: usize,
}

/// Detects price-increasing relistings of sold units.
#[derive(Clone)]
pub struct ResaleService {
    units: UnitRepository,
    listings: ListingRepository,
    locks: Arc<LockRegistry>,
}

/// A sold unit's market exit, derived from its listing history.
#[derive(Debug, Clone, Copy)]
struct SaleRecord {
    unit_id: i32,
    sold_at: DateTime<Utc>,
    final_price: Option<i64>,
}

impl ResaleService {
    pub fn new(pool: DbPool, locks: Arc<LockRegistry>) -> Self {
        Self {
            units: UnitRepository::new(pool.clone()),
            listings: ListingRepository::new(pool),
            locks,
        }
    }

    /// Run detection over every building that owns units.
    pub async fn detect_all(&self) -> Result<ResaleStats, DieselError> {
        let mut stats = ResaleStats::default();
        for building_id in self.units.building_ids_with_units().await? {
            self.detect_building_into(building_id, &mut stats).await?;
        }
        info!(
            buildings = stats.buildings_processed,
            resales = stats.resales_flagged,
            "resale detection pass complete"
        );
        Ok(stats)
    }

    /// Run detection over one building.
    pub async fn detect_building(&self, building_id: i32) -> Result<ResaleStats, DieselError> {
        let mut stats = ResaleStats::default();
        self.detect_building_into(building_id, &mut stats).await?;
        Ok(stats)
    }

    async fn detect_building_into(
        &self,
        building_id: i32,
        stats: &mut ResaleStats,
    ) -> Result<(), DieselError> {
        let guard = self.locks.try_acquire(MergeScope::Building, &[building_id]);
        let _guard = match guard {
            Ok(guard) => guard,
            Err(e) => {
                warn!(building = building_id, "skipping resale detection: {}", e);
                stats.buildings_skipped += 1;
                return Ok(());
            }
        };

        let units = self.units.list_by_building(building_id).await?;
        if units.is_empty() {
            return Ok(());
        }
        stats.buildings_processed += 1;

        let mut listings_by_unit: HashMap<i32, Vec<Listing>> = HashMap::new();
        for unit in &units {
            listings_by_unit.insert(unit.id, self.listings.list_by_unit(unit.id).await?);
        }

        let now = Utc::now();

        // Pass 1: determine sold units and persist their exit state.
        let mut sales: Vec<SaleRecord> = Vec::new();
        for unit in &units {
            let listings = &listings_by_unit[&unit.id];
            let Some(sale) = sale_record(unit, listings) else {
                continue;
            };

            if unit.sold_at != Some(sale.sold_at) || unit.final_price != sale.final_price {
                self.units
                    .set_sold(unit.id, sale.sold_at, sale.final_price, now)
                    .await?;
                stats.units_sold += 1;
            }
            sales.push(sale);
        }

        // Pass 2: regenerate resale flags from scratch.
        for unit in &units {
            let listings = &listings_by_unit[&unit.id];
            let desired = resale_origin(unit, listings, &sales, &units);

            if desired != unit.resale_unit_id
                || desired.is_some() != unit.is_resale
            {
                self.units.set_resale(unit.id, desired, now).await?;
                if desired.is_some() {
                    stats.resales_flagged += 1;
                    debug!(
                        unit = unit.id,
                        origin = desired,
                        "flagged resale"
                    );
                } else {
                    stats.flags_cleared += 1;
                }
            } else if desired.is_some() {
                stats.resales_flagged += 1;
            }
        }

        Ok(())
    }
}

/// Derive a unit's sale from its listings: every listing inactive, sold at
/// the latest delisting, at that listing's last known price.
fn sale_record(unit: &Unit, listings: &[Listing]) -> Option<SaleRecord> {
    if listings.is_empty() || listings.iter().any(|l| l.is_active) {
        return None;
    }

    let last = listings
        .iter()
        .filter(|l| l.delisted_at.is_some())
        .max_by_key(|l| l.delisted_at)?;

    Some(SaleRecord {
        unit_id: unit.id,
        sold_at: last.delisted_at?,
        final_price: last.current_price,
    })
}

/// The sold unit this unit is a resale of, if any.
///
/// Requires a structural match (floor, one-decimal area, layout), an
/// earliest active listing first seen within the window after the sale,
/// and a price above the sold unit's final price. When several sales
/// qualify, the most recent one wins.
fn resale_origin(
    unit: &Unit,
    listings: &[Listing],
    sales: &[SaleRecord],
    units: &[Unit],
) -> Option<i32> {
    let first_active = listings
        .iter()
        .filter(|l| l.is_active)
        .min_by_key(|l| l.first_seen_at)?;
    let price = first_active.current_price?;

    sales
        .iter()
        .filter(|sale| sale.unit_id != unit.id)
        .filter(|sale| {
            let original = units.iter().find(|u| u.id == sale.unit_id);
            original.is_some_and(|original| structural_match(unit, original))
        })
        .filter(|sale| {
            let window_end = sale.sold_at + Duration::days(RESALE_WINDOW_DAYS);
            first_active.first_seen_at >= sale.sold_at && first_active.first_seen_at <= window_end
        })
        .filter(|sale| sale.final_price.is_some_and(|final_price| price > final_price))
        .max_by_key(|sale| sale.sold_at)
        .map(|sale| sale.unit_id)
}

/// Same floor, same one-decimal area, same layout.
fn structural_match(a: &Unit, b: &Unit) -> bool {
    let floor_match = matches!((a.floor_number, b.floor_number), (Some(x), Some(y)) if x == y);
    let area_match = matches!(
        (a.area, b.area),
        (Some(x), Some(y)) if (x * 10.0).round() as i64 == (y * 10.0).round() as i64
    );
    let layout_match = matches!(
        (a.layout.as_deref(), b.layout.as_deref()),
        (Some(x), Some(y)) if x.eq_ignore_ascii_case(y)
    );
    floor_match && area_match && layout_match
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn unit(id: i32, floor: i32, area: f64, layout: &str) -> Unit {
        let now = Utc::now();
        Unit {
            id,
            building_id: 1,
            room_number: None,
            floor_number: Some(floor),
            area: Some(area),
            layout: Some(layout.to_string()),
            direction: None,
            property_hash: None,
            hash_version: None,
            display_building_name: None,
            sold_at: None,
            final_price: None,
            is_resale: false,
            resale_unit_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn listing(
        id: i32,
        unit_id: i32,
        active: bool,
        first_seen: DateTime<Utc>,
        delisted: Option<DateTime<Utc>>,
        price: Option<i64>,
    ) -> Listing {
        let now = Utc::now();
        Listing {
            id,
            unit_id,
            source_site: "site".to_string(),
            source_id: id.to_string(),
            url: None,
            is_active: active,
            first_seen_at: first_seen,
            last_seen_at: delisted.unwrap_or(first_seen),
            delisted_at: delisted,
            current_price: price,
            listing_building_name: None,
            detail_info: serde_json::Value::Null,
            created_at: now,
            updated_at: now,
        }
    }

    fn day(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_sale_requires_all_inactive() {
        let x = unit(1, 10, 70.5, "3LDK");
        let active = vec![listing(1, 1, true, day(2024, 1, 1), None, Some(8000))];
        assert!(sale_record(&x, &active).is_none());

        let sold = vec![
            listing(1, 1, false, day(2023, 11, 1), Some(day(2023, 12, 20)), Some(7900)),
            listing(2, 1, false, day(2023, 11, 5), Some(day(2024, 1, 10)), Some(8000)),
        ];
        let sale = sale_record(&x, &sold).unwrap();
        assert_eq!(sale.sold_at, day(2024, 1, 10));
        assert_eq!(sale.final_price, Some(8000));
    }

    #[test]
    fn test_resale_within_window_and_above_price() {
        let x = unit(1, 10, 70.5, "3LDK");
        let y = unit(2, 10, 70.5, "3LDK");
        let z = unit(3, 10, 70.5, "3LDK");
        let units = vec![x.clone(), y.clone(), z.clone()];

        let sales = vec![SaleRecord {
            unit_id: 1,
            sold_at: day(2024, 1, 10),
            final_price: Some(8000),
        }];

        // Y relists 2024-02-01 at 8500: inside 60 days, higher price.
        let y_listings = vec![listing(10, 2, true, day(2024, 2, 1), None, Some(8500))];
        assert_eq!(resale_origin(&y, &y_listings, &sales, &units), Some(1));

        // Z relists 2024-04-01: outside the window.
        let z_listings = vec![listing(11, 3, true, day(2024, 4, 1), None, Some(8500))];
        assert_eq!(resale_origin(&z, &z_listings, &sales, &units), None);
    }

    #[test]
    fn test_no_resale_at_equal_or_lower_price() {
        let y = unit(2, 10, 70.5, "3LDK");
        let units = vec![unit(1, 10, 70.5, "3LDK"), y.clone()];
        let sales = vec![SaleRecord {
            unit_id: 1,
            sold_at: day(2024, 1, 10),
            final_price: Some(8000),
        }];

        let equal = vec![listing(10, 2, true, day(2024, 2, 1), None, Some(8000))];
        assert_eq!(resale_origin(&y, &equal, &sales, &units), None);
    }

    #[test]
    fn test_structural_mismatch_blocks_resale() {
        let y = unit(2, 11, 70.5, "3LDK");
        let units = vec![unit(1, 10, 70.5, "3LDK"), y.clone()];
        let sales = vec![SaleRecord {
            unit_id: 1,
            sold_at: day(2024, 1, 10),
            final_price: Some(8000),
        }];

        let listings = vec![listing(10, 2, true, day(2024, 2, 1), None, Some(8500))];
        assert_eq!(resale_origin(&y, &listings, &sales, &units), None);
    }

    #[test]
    fn test_area_matches_at_one_decimal() {
        let a = unit(1, 10, 70.04, "3LDK");
        let b = unit(2, 10, 70.0, "3LDK");
        let c = unit(3, 10, 70.06, "3LDK");
        assert!(structural_match(&a, &b));
        assert!(!structural_match(&a, &c));
    }
}
