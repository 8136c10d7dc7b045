//! Listing models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One source-site observation of a unit over time.
///
/// Created on the first scrape of a `(source_site, source_id)` pair;
/// flipped inactive (with `delisted_at` stamped) when a scrape run no
/// longer observes it. Never hard-deleted except by merge consolidation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    /// Database row ID.
    pub id: i32,
    /// Owning unit. Reassignable only through a merge.
    pub unit_id: i32,
    pub source_site: String,
    /// Site-local identifier for the listing page.
    pub source_id: String,
    pub url: Option<String>,
    pub is_active: bool,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub delisted_at: Option<DateTime<Utc>>,
    pub current_price: Option<i64>,
    /// Building name exactly as the site printed it.
    pub listing_building_name: Option<String>,
    /// Opaque structured payload from the scraper (raw address, station
    /// text, anything site-specific).
    pub detail_info: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One listing observation handed over by a scraping adapter.
///
/// This is the core's entire input surface: already-extracted structured
/// fields, no HTML, no HTTP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingObservation {
    pub source_site: String,
    pub source_id: String,
    pub listing_building_name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub floor_number: Option<i32>,
    #[serde(default)]
    pub area: Option<f64>,
    #[serde(default)]
    pub layout: Option<String>,
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub room_number: Option<String>,
    #[serde(default)]
    pub price: Option<i64>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub detail_info: serde_json::Value,
    pub observed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observation_deserializes_with_defaults() {
        let obs: ListingObservation = serde_json::from_str(
            r#"{
                "source_site": "suumo",
                "source_id": "12345",
                "listing_building_name": "白金ザ・スカイ",
                "observed_at": "2024-01-10T00:00:00Z"
            }"#,
        )
        .unwrap();
        assert_eq!(obs.source_site, "suumo");
        assert!(obs.detail_info.is_null());
        assert_eq!(obs.floor_number, None);
    }
}
