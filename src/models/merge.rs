//! Merge history and exclusion models.
//!
//! Every consolidation writes a history row whose `merge_details` payload
//! records exactly what moved (entity ids) and a snapshot of the consumed
//! entity. Reverts target those exact ids: "move back whatever is attached
//! now" is unsound once building- and unit-level merges interleave.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which entity level a merge or exclusion applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeScope {
    Building,
    Unit,
}

impl MergeScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Building => "building",
            Self::Unit => "unit",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "building" => Some(Self::Building),
            "unit" => Some(Self::Unit),
            _ => None,
        }
    }
}

/// Audit row for one building merge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildingMergeHistory {
    pub id: i32,
    /// The building consumed by the merge (deleted).
    pub merged_building_id: i32,
    /// Immediate target at merge time.
    pub direct_primary_building_id: i32,
    /// Chain root at merge time (the target's own merge chain followed).
    pub final_primary_building_id: i32,
    /// Length of the chain from this merge to its root.
    pub merge_depth: i32,
    pub merge_details: BuildingMergeDetails,
    pub merged_at: DateTime<Utc>,
    pub merged_by: String,
    pub reverted_at: Option<DateTime<Utc>>,
    pub reverted_by: Option<String>,
}

/// Structured payload persisted with a building merge.
///
/// Legacy rows predate the moved-id lists; deserializing them yields
/// `None`, which reverts must treat as the best-effort case.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildingMergeDetails {
    /// Exact ids of the units reassigned from secondary to primary.
    #[serde(default)]
    pub moved_unit_ids: Option<Vec<i32>>,
    /// Ids of the alias rows created on primary during the merge.
    #[serde(default)]
    pub copied_alias_ids: Vec<i32>,
    /// Snapshot of the consumed building, for recreation on revert.
    #[serde(default)]
    pub building: Option<BuildingSnapshot>,
}

/// Minimal reconstruction state for a consumed building.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildingSnapshot {
    pub id: i32,
    pub normalized_name: String,
    pub canonical_name: String,
    pub reading: Option<String>,
    pub address: Option<String>,
    pub normalized_address: Option<String>,
    pub station_info: Option<String>,
    pub built_year: Option<i32>,
    pub built_month: Option<i32>,
}

/// Audit row for one unit merge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitMergeHistory {
    pub id: i32,
    pub primary_unit_id: i32,
    /// The unit consumed by the merge (deleted).
    pub secondary_unit_id: i32,
    /// Count of listings moved, denormalized for display.
    pub moved_listings: i32,
    pub merge_details: UnitMergeDetails,
    pub merged_at: DateTime<Utc>,
    pub merged_by: String,
    pub reverted_at: Option<DateTime<Utc>>,
    pub reverted_by: Option<String>,
}

/// Structured payload persisted with a unit merge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnitMergeDetails {
    /// Exact ids of the listings reassigned from secondary to primary.
    #[serde(default)]
    pub moved_listing_ids: Option<Vec<i32>>,
    /// Snapshot of the consumed unit, for recreation on revert.
    #[serde(default)]
    pub unit: Option<UnitSnapshot>,
}

/// Minimal reconstruction state for a consumed unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitSnapshot {
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
}

/// Result of a revert operation.
///
/// A revert that cannot recover every recorded entity still succeeds; the
/// unrecoverable ids are reported, never silently dropped. Callers must
/// distinguish "failed" (error) from "succeeded with partial loss"
/// (non-empty warnings).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RevertOutcome {
    /// Ids restored to the recreated entity.
    pub restored_ids: Vec<i32>,
    /// Human-readable notes about entities that no longer exist.
    pub warnings: Vec<String>,
    /// Set when the history row had no moved-id list and the revert fell
    /// back to moving whatever is currently unexplained.
    pub legacy_best_effort: bool,
}

/// An operator decision that two entities are genuinely distinct.
///
/// Stored with the lower id first; consulted by the duplicate-candidate
/// suggestion query so a reverted merge is never proposed again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeExclusion {
    pub id: i32,
    pub scope: MergeScope,
    pub entity_id_a: i32,
    pub entity_id_b: i32,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_details_deserialize_without_id_list() {
        let details: BuildingMergeDetails = serde_json::from_str("{}").unwrap();
        assert!(details.moved_unit_ids.is_none());
        assert!(details.building.is_none());
        assert!(details.copied_alias_ids.is_empty());
    }

    #[test]
    fn test_details_round_trip() {
        let details = BuildingMergeDetails {
            moved_unit_ids: Some(vec![3, 1, 2]),
            copied_alias_ids: vec![9],
            building: None,
        };
        let json = serde_json::to_string(&details).unwrap();
        let back: BuildingMergeDetails = serde_json::from_str(&json).unwrap();
        assert_eq!(back.moved_unit_ids.as_deref(), Some(&[3, 1, 2][..]));
        assert_eq!(back.copied_alias_ids, vec![9]);
    }

    #[test]
    fn test_scope_round_trip() {
        for scope in [MergeScope::Building, MergeScope::Unit] {
            assert_eq!(MergeScope::from_str(scope.as_str()), Some(scope));
        }
    }
}
