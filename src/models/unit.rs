//! Unit (master property) model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One physical apartment unit, exclusively owned by one building.
///
/// `property_hash` is unique within the owning building; a collision
/// between two units of the same building is conclusive evidence they are
/// the same physical unit. Units missing floor or area carry no hash and
/// rely on room-number matching instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    /// Database row ID.
    pub id: i32,
    /// Owning building. Reassignable only through a merge.
    pub building_id: i32,
    /// Room number as text; many sites never expose it.
    pub room_number: Option<String>,
    pub floor_number: Option<i32>,
    /// Floor area in m², one-decimal precision.
    pub area: Option<f64>,
    pub layout: Option<String>,
    pub direction: Option<String>,
    /// Identity fingerprint (see `identity`), absent when undefined.
    pub property_hash: Option<String>,
    /// Hash template version the fingerprint was computed under.
    pub hash_version: Option<i32>,
    /// Majority-voted display name; may differ from the owning building's
    /// name where sub-buildings are named individually.
    pub display_building_name: Option<String>,
    /// Stamped when every listing of the unit has been delisted.
    pub sold_at: Option<DateTime<Utc>>,
    /// Last known price at the time the unit went off-market.
    pub final_price: Option<i64>,
    /// Derived resale flag, regenerated by the resale detector.
    pub is_resale: bool,
    /// The previously sold unit this one is a relisting of.
    pub resale_unit_id: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
