//! Data models for the listing consolidation core.

mod building;
mod listing;
mod merge;
mod unit;

pub use building::{AliasSource, Building, BuildingAlias, BuildingListingName};
pub use listing::{Listing, ListingObservation};
pub use merge::{
    BuildingMergeDetails, BuildingMergeHistory, BuildingSnapshot, MergeExclusion, MergeScope,
    RevertOutcome, UnitMergeDetails, UnitMergeHistory, UnitSnapshot,
};
pub use unit::Unit;
