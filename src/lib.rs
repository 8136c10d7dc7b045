//! sumika - real-estate listing consolidation and entity resolution.
//!
//! Core library collapsing scraped listings from independent source sites
//! into one canonical building/unit view, with reversible, audited merges.

// Model types use `from_str` methods that return Self (infallible parse),
// not Result<Self, Error> as std::str::FromStr requires.
#![allow(clippy::should_implement_trait)]

pub mod config;
pub mod identity;
pub mod migrations;
pub mod models;
pub mod normalize;
pub mod repository;
pub mod resolver;
pub mod schema;
pub mod services;
