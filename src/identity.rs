//! Unit identity hashing.
//!
//! A unit's structural attributes are folded through a fixed canonical
//! template and digested with SHA-256. Two listings from unrelated sites
//! that land on the same hash within one building denote the same physical
//! unit.
//!
//! The template (field order, delimiters, rounding) is part of the hash's
//! versioned contract: any change bumps [`HASH_VERSION`] and requires a
//! one-time backfill over stored hashes. Hashes computed under different
//! versions must never be compared as equal, which is why the version rides
//! along in [`PropertyHash`] and in the units table.

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::normalize::normalize;

/// Current version of the canonical hash template.
///
/// v1 rounded area to whole square meters; v2 keeps one decimal.
pub const HASH_VERSION: i32 = 2;

/// Identity hashing is undefined when a required field is missing.
///
/// Not a fatal condition: units without a hash fall back to room-number
/// matching and are simply excluded from hash-based identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("property hash undefined: missing {missing}")]
pub struct HashUndefined {
    pub missing: &'static str,
}

/// A computed identity hash plus the template version that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyHash {
    pub hash: String,
    pub version: i32,
}

/// Compute the identity hash for a unit's structural attributes.
///
/// Floor and area are required; layout and direction are optional because
/// many source sites omit them (absent values encode as `-` so the same
/// unit hashes identically regardless of which site reported it). Room
/// number is deliberately not part of the template.
pub fn property_hash(
    building_id: i32,
    floor_number: Option<i32>,
    area: Option<f64>,
    layout: Option<&str>,
    direction: Option<&str>,
) -> Result<PropertyHash, HashUndefined> {
    let floor = floor_number.ok_or(HashUndefined {
        missing: "floor_number",
    })?;
    let area = area.ok_or(HashUndefined { missing: "area" })?;

    let template = format!(
        "v{}|B{}|F{}|A{:.1}|L{}|D{}",
        HASH_VERSION,
        building_id,
        floor,
        area,
        component(layout),
        component(direction),
    );

    let mut hasher = Sha256::new();
    hasher.update(template.as_bytes());

    Ok(PropertyHash {
        hash: hex::encode(hasher.finalize()),
        version: HASH_VERSION,
    })
}

/// Canonical form of an optional textual template field.
fn component(value: Option<&str>) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => normalize(v).to_uppercase(),
        _ => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_hex_sha256() {
        let h = property_hash(1, Some(10), Some(70.5), Some("3LDK"), Some("南")).unwrap();
        assert_eq!(h.hash.len(), 64);
        assert_eq!(h.version, HASH_VERSION);
        assert!(h.hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_deterministic_across_sites() {
        // Same unit reported with width/case variants of the same fields.
        let a = property_hash(7, Some(10), Some(70.5), Some("３ＬＤＫ"), Some("南")).unwrap();
        let b = property_hash(7, Some(10), Some(70.5), Some("3ldk"), Some("南")).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_missing_direction_is_stable() {
        let a = property_hash(7, Some(10), Some(70.5), Some("3LDK"), None).unwrap();
        let b = property_hash(7, Some(10), Some(70.5), Some("3LDK"), Some("  ")).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_area_rounding_boundary() {
        // One-decimal rounding: 70.04 rounds down, 70.06 rounds up.
        let low = property_hash(7, Some(10), Some(70.04), None, None).unwrap();
        let exact = property_hash(7, Some(10), Some(70.0), None, None).unwrap();
        let high = property_hash(7, Some(10), Some(70.06), None, None).unwrap();
        assert_eq!(low, exact);
        assert_ne!(low, high);
    }

    #[test]
    fn test_building_scopes_hash() {
        let a = property_hash(1, Some(10), Some(70.5), Some("3LDK"), None).unwrap();
        let b = property_hash(2, Some(10), Some(70.5), Some("3LDK"), None).unwrap();
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn test_missing_required_fields_undefined() {
        assert_eq!(
            property_hash(1, None, Some(70.5), None, None),
            Err(HashUndefined {
                missing: "floor_number"
            })
        );
        assert_eq!(
            property_hash(1, Some(10), None, None, None),
            Err(HashUndefined { missing: "area" })
        );
    }
}
