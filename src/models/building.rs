//! Building models.
//!
//! One Building row per physical building. Names exist in three
//! granularities: the raw scraped text (kept on listings), the normalized
//! form used for comparison, and the canonical form used to group likely
//! duplicates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::normalize::{canonicalize, generate_reading, normalize, normalize_address};

/// A physical building owning zero or more units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Building {
    /// Database row ID.
    pub id: i32,
    /// Width/numeral/punctuation-normalized name.
    pub normalized_name: String,
    /// Coarse grouping key. Always regenerated from `normalized_name`,
    /// never hand-edited.
    pub canonical_name: String,
    /// Phonetic sort key, when one could be derived confidently.
    pub reading: Option<String>,
    /// Raw address as scraped.
    pub address: Option<String>,
    /// Normalized address with trailing UI garbage stripped.
    pub normalized_address: Option<String>,
    /// Station access blurb, resolved by whole-block majority vote.
    pub station_info: Option<String>,
    pub built_year: Option<i32>,
    pub built_month: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Building {
    /// Create a new building from a raw scraped name and address.
    ///
    /// Normalization happens here so `canonical_name` can never drift from
    /// `normalized_name`.
    pub fn from_raw(raw_name: &str, address: Option<&str>) -> Self {
        let normalized_name = normalize(raw_name);
        let canonical_name = canonicalize(&normalized_name);
        let reading = generate_reading(&normalized_name);
        let now = Utc::now();

        Self {
            id: 0, // Set by database
            canonical_name,
            reading,
            normalized_address: address.map(normalize_address),
            address: address.map(str::to_string),
            normalized_name,
            station_info: None,
            built_year: None,
            built_month: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Why an alias row exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AliasSource {
    /// Copied from a building consumed by a duplicate merge.
    DuplicateMerge,
    /// Name variant observed on a listing.
    Listing,
    /// Entered by an operator.
    Manual,
}

impl AliasSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DuplicateMerge => "duplicate_merge",
            Self::Listing => "listing",
            Self::Manual => "manual",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "duplicate_merge" => Some(Self::DuplicateMerge),
            "listing" => Some(Self::Listing),
            "manual" => Some(Self::Manual),
            _ => None,
        }
    }
}

/// A historical name mapping for a building.
///
/// Aliases accumulate; they never imply ownership of units or listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildingAlias {
    pub id: i32,
    pub building_id: i32,
    pub alias_name: String,
    pub source: AliasSource,
    pub created_at: DateTime<Utc>,
}

/// One distinct listing-supplied name variant for a building, with the
/// number of listings supporting it. Raw material for display-name voting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildingListingName {
    pub id: i32,
    pub building_id: i32,
    pub normalized_name: String,
    pub canonical_name: String,
    pub listing_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw_derives_all_name_forms() {
        let b = Building::from_raw("白金ザ・スカイ第一棟", Some("港区白金1-1-1地図を見る"));
        assert_eq!(b.normalized_name, "白金ザスカイ第1棟");
        assert_eq!(b.canonical_name, "白金ザスカイ");
        assert_eq!(b.reading, None);
        assert_eq!(b.address.as_deref(), Some("港区白金1-1-1地図を見る"));
        assert_eq!(b.normalized_address.as_deref(), Some("港区白金1-1-1"));
    }

    #[test]
    fn test_alias_source_round_trip() {
        for source in [
            AliasSource::DuplicateMerge,
            AliasSource::Listing,
            AliasSource::Manual,
        ] {
            assert_eq!(AliasSource::from_str(source.as_str()), Some(source));
        }
        assert_eq!(AliasSource::from_str("unknown"), None);
    }
}
