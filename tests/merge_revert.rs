//! End-to-end consolidation tests.
//!
//! Each test runs against a fresh tempdir SQLite database with the real
//! migrations applied, driving the public service layer the way the CLI
//! does.

use chrono::{DateTime, TimeZone, Utc};

use sumika::models::{ListingObservation, MergeScope};
use sumika::repository::{DbPool, Repositories};
use sumika::services::{
    DisplayResolutionService, IngestService, IngestStats, LockRegistry, MergeError, MergeService,
    ResaleService,
};

async fn setup() -> (DbPool, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("test.db");
    let url = format!("sqlite:{}", db_path.display());

    sumika::repository::migrations::run_migrations(&url)
        .await
        .unwrap();

    (DbPool::from_url(&url), dir)
}

fn day(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

#[allow(clippy::too_many_arguments)]
fn observation(
    site: &str,
    source_id: &str,
    name: &str,
    floor: i32,
    area: f64,
    layout: &str,
    direction: Option<&str>,
    price: i64,
    observed_at: DateTime<Utc>,
) -> ListingObservation {
    ListingObservation {
        source_site: site.to_string(),
        source_id: source_id.to_string(),
        listing_building_name: name.to_string(),
        address: None,
        floor_number: Some(floor),
        area: Some(area),
        layout: Some(layout.to_string()),
        direction: direction.map(str::to_string),
        room_number: None,
        price: Some(price),
        url: None,
        detail_info: serde_json::Value::Null,
        observed_at,
    }
}

async fn ingest(service: &IngestService, obs: &ListingObservation) -> (i32, i32, i32) {
    let mut stats = IngestStats::default();
    let outcome = service.ingest_observation(obs, &mut stats).await.unwrap();
    (outcome.building_id, outcome.unit_id, outcome.listing_id)
}

/// Building B with three floors plus building A with one unit.
async fn two_buildings(service: &IngestService) -> (i32, i32, Vec<i32>, i32) {
    let mut b_units = Vec::new();
    let mut b_id = 0;
    for (i, floor) in [1, 2, 3].iter().enumerate() {
        let obs = observation(
            "suumo",
            &format!("b-{}", i),
            "グランメゾンB",
            *floor,
            55.0,
            "2LDK",
            Some("南"),
            6000,
            day(2024, 1, 1),
        );
        let (building, unit, _) = ingest(service, &obs).await;
        b_id = building;
        b_units.push(unit);
    }

    let obs = observation(
        "suumo",
        "a-0",
        "グランメゾンA",
        4,
        60.0,
        "2LDK",
        Some("南"),
        7000,
        day(2024, 1, 1),
    );
    let (a_id, a_unit, _) = ingest(service, &obs).await;

    (b_id, a_id, b_units, a_unit)
}

#[tokio::test]
async fn test_merge_revert_round_trip() {
    let (pool, _dir) = setup().await;
    let service = IngestService::new(pool.clone());
    let repos = Repositories::new(pool.clone());
    let merges = MergeService::new(pool.clone(), LockRegistry::new());

    let (b_id, a_id, b_units, _a_unit) = two_buildings(&service).await;

    let history_id = merges.merge_buildings(b_id, a_id, "tester").await.unwrap();

    // Secondary is gone, primary owns everything, alias carried over.
    assert!(repos.buildings.get(b_id).await.unwrap().is_none());
    assert_eq!(repos.units.list_by_building(a_id).await.unwrap().len(), 4);
    let aliases = repos.buildings.aliases(a_id).await.unwrap();
    assert!(aliases.iter().any(|a| a.alias_name == "グランメゾンB"));

    let outcome = merges
        .revert_building_merge(history_id, "tester")
        .await
        .unwrap();

    assert_eq!(outcome.restored_ids.len(), 3);
    assert!(outcome.warnings.is_empty());
    assert!(!outcome.legacy_best_effort);

    // The recreated building owns exactly its original units again.
    let restored = repos.buildings.get(b_id).await.unwrap().unwrap();
    assert_eq!(restored.normalized_name, "グランメゾンB");
    let unit_ids: Vec<i32> = repos
        .units
        .list_by_building(b_id)
        .await
        .unwrap()
        .iter()
        .map(|u| u.id)
        .collect();
    assert_eq!(unit_ids, b_units);
    assert_eq!(repos.units.list_by_building(a_id).await.unwrap().len(), 1);

    // The copied alias is withdrawn and the audit row is stamped.
    let aliases = repos.buildings.aliases(a_id).await.unwrap();
    assert!(aliases.is_empty());
    let record = repos
        .merge_history
        .get_building(history_id)
        .await
        .unwrap()
        .unwrap();
    assert!(record.reverted_at.is_some());
}

#[tokio::test]
async fn test_revert_with_interleaved_unit_merge_warns() {
    let (pool, _dir) = setup().await;
    let service = IngestService::new(pool.clone());
    let repos = Repositories::new(pool.clone());
    let merges = MergeService::new(pool.clone(), LockRegistry::new());

    let (b_id, a_id, b_units, a_unit) = two_buildings(&service).await;
    let u1 = b_units[0];

    let history_id = merges.merge_buildings(b_id, a_id, "tester").await.unwrap();

    // An intervening unit-level merge consumes u1.
    merges.merge_units(u1, a_unit, "tester").await.unwrap();
    assert!(repos.units.get(u1).await.unwrap().is_none());

    let outcome = merges
        .revert_building_merge(history_id, "tester")
        .await
        .unwrap();

    // u2/u3 restored, u1 reported - never silently dropped, never fatal.
    assert_eq!(outcome.restored_ids, vec![b_units[1], b_units[2]]);
    assert_eq!(outcome.warnings.len(), 1);
    assert!(outcome.warnings[0].contains(&u1.to_string()));

    let restored: Vec<i32> = repos
        .units
        .list_by_building(b_id)
        .await
        .unwrap()
        .iter()
        .map(|u| u.id)
        .collect();
    assert_eq!(restored, vec![b_units[1], b_units[2]]);
}

#[tokio::test]
async fn test_merge_validation_rules() {
    let (pool, _dir) = setup().await;
    let service = IngestService::new(pool.clone());
    let merges = MergeService::new(pool.clone(), LockRegistry::new());

    let (b_id, a_id, _b_units, _a_unit) = two_buildings(&service).await;

    // Self-merge is rejected before any mutation.
    let err = merges.merge_buildings(a_id, a_id, "tester").await.unwrap_err();
    assert!(matches!(err, MergeError::Validation(_)));

    let history_id = merges.merge_buildings(b_id, a_id, "tester").await.unwrap();

    // A consumed building cannot be merged again, and the error names
    // the merge that consumed it.
    let err = merges.merge_buildings(b_id, a_id, "tester").await.unwrap_err();
    match err {
        MergeError::Validation(msg) => assert!(msg.contains("consumed")),
        other => panic!("expected validation error, got {:?}", other),
    }

    // Double revert is rejected.
    merges
        .revert_building_merge(history_id, "tester")
        .await
        .unwrap();
    let err = merges
        .revert_building_merge(history_id, "tester")
        .await
        .unwrap_err();
    assert!(matches!(err, MergeError::Validation(_)));
}

#[tokio::test]
async fn test_alias_resolves_after_merge() {
    let (pool, _dir) = setup().await;
    let service = IngestService::new(pool.clone());
    let merges = MergeService::new(pool.clone(), LockRegistry::new());

    let (b_id, a_id, _b_units, _a_unit) = two_buildings(&service).await;
    merges.merge_buildings(b_id, a_id, "tester").await.unwrap();

    // A new observation under the consumed building's name lands on the
    // surviving building through the alias.
    let obs = observation(
        "homes",
        "late-1",
        "グランメゾンB",
        9,
        80.0,
        "3LDK",
        Some("東"),
        9000,
        day(2024, 3, 1),
    );
    let (building_id, _, _) = ingest(&service, &obs).await;
    assert_eq!(building_id, a_id);
}

#[tokio::test]
async fn test_cross_site_identity_collapse() {
    let (pool, _dir) = setup().await;
    let service = IngestService::new(pool.clone());
    let repos = Repositories::new(pool.clone());

    let base = observation(
        "suumo",
        "s-1",
        "白金ザ・スカイ",
        10,
        70.5,
        "3LDK",
        Some("南"),
        8000,
        day(2024, 1, 1),
    );
    let (building_id, unit_id, _) = ingest(&service, &base).await;

    // Same unit reported by another site, with name/width variants.
    let mut other = observation(
        "homes",
        "h-1",
        "白金ザスカイ",
        10,
        70.5,
        "３ＬＤＫ",
        Some("南"),
        8100,
        day(2024, 1, 2),
    );
    other.detail_info = serde_json::json!({"raw": "ignored"});
    let (building_2, unit_2, _) = ingest(&service, &other).await;

    assert_eq!(building_2, building_id);
    assert_eq!(unit_2, unit_id);
    assert_eq!(repos.listings.list_by_unit(unit_id).await.unwrap().len(), 2);

    // A different direction is a different hash, hence a different unit.
    let north = observation(
        "suumo",
        "s-2",
        "白金ザ・スカイ",
        10,
        70.5,
        "3LDK",
        Some("北"),
        8000,
        day(2024, 1, 3),
    );
    let (_, unit_3, _) = ingest(&service, &north).await;
    assert_ne!(unit_3, unit_id);
}

#[tokio::test]
async fn test_room_number_fallback_when_hash_undefined() {
    let (pool, _dir) = setup().await;
    let service = IngestService::new(pool.clone());

    // No area: hashing is undefined, identity comes from the room number.
    let mut first = observation("suumo", "r-1", "月島リバーハウス", 3, 0.0, "2LDK", None, 5000, day(2024, 1, 1));
    first.area = None;
    first.room_number = Some("302".to_string());
    let (_, unit_a, _) = ingest(&service, &first).await;

    let mut second = observation("homes", "r-2", "月島リバーハウス", 3, 0.0, "2LDK", None, 5100, day(2024, 1, 2));
    second.area = None;
    second.room_number = Some("302".to_string());
    let (_, unit_b, _) = ingest(&service, &second).await;

    assert_eq!(unit_a, unit_b);

    // Without even a room number, a fresh unit is created.
    let mut third = observation("athome", "r-3", "月島リバーハウス", 3, 0.0, "2LDK", None, 5200, day(2024, 1, 3));
    third.area = None;
    let (_, unit_c, _) = ingest(&service, &third).await;
    assert_ne!(unit_c, unit_a);
}

#[tokio::test]
async fn test_delist_lifecycle() {
    let (pool, _dir) = setup().await;
    let service = IngestService::new(pool.clone());
    let repos = Repositories::new(pool.clone());

    let first = observation("suumo", "d-1", "青葉コーポ", 1, 40.0, "1LDK", None, 3000, day(2024, 1, 1));
    let second = observation("suumo", "d-2", "青葉コーポ", 2, 40.0, "1LDK", None, 3100, day(2024, 1, 1));
    let (_, _, listing_1) = ingest(&service, &first).await;
    let (_, _, listing_2) = ingest(&service, &second).await;

    let delist_at = day(2024, 2, 1);
    let delisted = service
        .mark_delisted("suumo", &["d-1".to_string()], delist_at)
        .await
        .unwrap();
    assert_eq!(delisted, 1);

    let kept = repos.listings.get(listing_1).await.unwrap().unwrap();
    assert!(kept.is_active);

    let dropped = repos.listings.get(listing_2).await.unwrap().unwrap();
    assert!(!dropped.is_active);
    assert_eq!(dropped.delisted_at, Some(delist_at));

    // A reappearing listing is reactivated.
    let again = observation("suumo", "d-2", "青葉コーポ", 2, 40.0, "1LDK", None, 3200, day(2024, 3, 1));
    let (_, _, listing_again) = ingest(&service, &again).await;
    assert_eq!(listing_again, listing_2);
    let revived = repos.listings.get(listing_2).await.unwrap().unwrap();
    assert!(revived.is_active);
    assert_eq!(revived.delisted_at, None);
    assert_eq!(revived.current_price, Some(3200));
}

#[tokio::test]
async fn test_display_name_resolution_is_idempotent() {
    let (pool, _dir) = setup().await;
    let service = IngestService::new(pool.clone());
    let repos = Repositories::new(pool.clone());
    let resolver = DisplayResolutionService::new(pool.clone(), LockRegistry::new());

    let mut obs_a = observation("suumo", "n-1", "パークタワー晴海", 12, 82.0, "3LDK", Some("西"), 9800, day(2024, 1, 1));
    obs_a.detail_info = serde_json::json!({"station_info": "大江戸線 勝どき駅 徒歩9分"});
    let (building_id, unit_id, _) = ingest(&service, &obs_a).await;

    let mut obs_b = observation("homes", "n-2", "パークタワー晴海", 12, 82.0, "3LDK", Some("西"), 9800, day(2024, 1, 5));
    obs_b.detail_info = serde_json::json!({"station_info": "大江戸線 勝どき駅 徒歩9分"});
    ingest(&service, &obs_b).await;

    // A sub-wing scraped under its own name, later merged into the same
    // building: its unit keeps voting with its own listings.
    let mut obs_c = observation("athome", "n-3", "パークタワー晴海ウエスト", 13, 85.0, "3LDK", Some("西"), 9750, day(2024, 1, 7));
    obs_c.detail_info = serde_json::json!({"station_info": "勝どき駅 9分"});
    let (wing_building, wing_unit, _) = ingest(&service, &obs_c).await;
    assert_ne!(wing_building, building_id);

    let merges = MergeService::new(pool.clone(), LockRegistry::new());
    merges
        .merge_buildings(wing_building, building_id, "tester")
        .await
        .unwrap();

    let stats = resolver.recompute_building(building_id).await.unwrap();
    assert_eq!(stats.unit_names_updated, 2);
    assert_eq!(stats.station_infos_updated, 1);

    let unit = repos.units.get(unit_id).await.unwrap().unwrap();
    assert_eq!(unit.display_building_name.as_deref(), Some("パークタワー晴海"));

    // Sub-building naming survives the consolidation.
    let wing = repos.units.get(wing_unit).await.unwrap().unwrap();
    assert_eq!(
        wing.display_building_name.as_deref(),
        Some("パークタワー晴海ウエスト")
    );
    let building = repos.buildings.get(building_id).await.unwrap().unwrap();
    assert_eq!(
        building.station_info.as_deref(),
        Some("大江戸線 勝どき駅 徒歩9分")
    );

    // Re-running resolves to the same values and writes nothing.
    let updated_at_before = unit.updated_at;
    let stats = resolver.recompute_building(building_id).await.unwrap();
    assert_eq!(stats.unit_names_updated, 0);
    assert_eq!(stats.station_infos_updated, 0);
    let unit = repos.units.get(unit_id).await.unwrap().unwrap();
    assert_eq!(unit.updated_at, updated_at_before);
}

#[tokio::test]
async fn test_resale_detection_window() {
    let (pool, _dir) = setup().await;
    let service = IngestService::new(pool.clone());
    let repos = Repositories::new(pool.clone());
    let resales = ResaleService::new(pool.clone(), LockRegistry::new());

    // Unit X sells: its only listing is delisted on 2024-01-10 at 8000.
    let x = observation("s1", "x-1", "レジデンス月島", 10, 70.5, "3LDK", Some("南"), 8000, day(2023, 11, 1));
    let (building_id, x_unit, _) = ingest(&service, &x).await;
    service
        .mark_delisted("s1", &[], day(2024, 1, 10))
        .await
        .unwrap();

    // Unit Y: structurally identical, listed 2024-02-01 at 8500.
    let y = observation("s2", "y-1", "レジデンス月島", 10, 70.5, "3LDK", None, 8500, day(2024, 2, 1));
    let (_, y_unit, _) = ingest(&service, &y).await;

    // Unit Z: identical but listed past the 60-day window.
    let z = observation("s3", "z-1", "レジデンス月島", 10, 70.5, "3LDK", Some("北"), 8500, day(2024, 4, 1));
    let (_, z_unit, _) = ingest(&service, &z).await;

    resales.detect_building(building_id).await.unwrap();

    let x = repos.units.get(x_unit).await.unwrap().unwrap();
    assert_eq!(x.sold_at, Some(day(2024, 1, 10)));
    assert_eq!(x.final_price, Some(8000));

    let y = repos.units.get(y_unit).await.unwrap().unwrap();
    assert!(y.is_resale);
    assert_eq!(y.resale_unit_id, Some(x_unit));

    let z = repos.units.get(z_unit).await.unwrap().unwrap();
    assert!(!z.is_resale);
    assert_eq!(z.resale_unit_id, None);

    // The flag is derived: a second pass changes nothing.
    let stats = resales.detect_building(building_id).await.unwrap();
    assert_eq!(stats.flags_cleared, 0);
    let y_again = repos.units.get(y_unit).await.unwrap().unwrap();
    assert_eq!(y_again.updated_at, y.updated_at);
}

#[tokio::test]
async fn test_legacy_history_without_moved_ids() {
    let (pool, dir) = setup().await;
    let service = IngestService::new(pool.clone());
    let repos = Repositories::new(pool.clone());
    let merges = MergeService::new(pool.clone(), LockRegistry::new());

    let (_, a_id, _, _) = two_buildings(&service).await;
    let a_units_before = repos.units.list_by_building(a_id).await.unwrap().len();
    assert!(a_units_before > 0);

    // A history row from before moved-unit recording: snapshot only.
    let conn = rusqlite::Connection::open(dir.path().join("test.db")).unwrap();
    conn.execute(
        "INSERT INTO building_merge_history
         (merged_building_id, direct_primary_building_id, final_primary_building_id,
          merge_depth, merge_details, merged_at, merged_by)
         VALUES (?1, ?2, ?2, 1, ?3, '2023-06-01T00:00:00Z', 'importer')",
        rusqlite::params![
            500,
            a_id,
            r#"{"building":{"id":500,"normalized_name":"レガシービル","canonical_name":"レガシービル"}}"#,
        ],
    )
    .unwrap();
    let history_id = conn.last_insert_rowid() as i32;
    drop(conn);

    let outcome = merges
        .revert_building_merge(history_id, "tester")
        .await
        .unwrap();

    // Best-effort: everything unexplained on the primary moves, and the
    // result is explicitly marked as inferred.
    assert!(outcome.legacy_best_effort);
    assert!(!outcome.warnings.is_empty());
    assert_eq!(outcome.restored_ids.len(), a_units_before);
    assert!(repos.buildings.get(500).await.unwrap().is_some());
    assert!(repos.units.list_by_building(a_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unit_merge_revert_round_trip() {
    let (pool, _dir) = setup().await;
    let service = IngestService::new(pool.clone());
    let repos = Repositories::new(pool.clone());
    let merges = MergeService::new(pool.clone(), LockRegistry::new());

    let first = observation("suumo", "u-1", "晴海テラス", 5, 60.0, "2LDK", Some("南"), 7000, day(2024, 1, 1));
    let (_, unit_x, listing_x) = ingest(&service, &first).await;
    let second = observation("homes", "u-2", "晴海テラス", 5, 60.0, "2LDK", Some("北"), 7100, day(2024, 1, 2));
    let (_, unit_y, _) = ingest(&service, &second).await;

    let history_id = merges.merge_units(unit_x, unit_y, "tester").await.unwrap();
    assert!(repos.units.get(unit_x).await.unwrap().is_none());
    assert_eq!(repos.listings.list_by_unit(unit_y).await.unwrap().len(), 2);

    let outcome = merges.revert_unit_merge(history_id, "tester").await.unwrap();
    assert_eq!(outcome.restored_ids, vec![listing_x]);
    assert!(outcome.warnings.is_empty());

    let restored = repos.units.get(unit_x).await.unwrap().unwrap();
    assert_eq!(restored.floor_number, Some(5));
    assert_eq!(
        repos.listings.list_by_unit(unit_x).await.unwrap().len(),
        1
    );
}

#[tokio::test]
async fn test_unit_revert_refused_on_hash_conflict() {
    let (pool, _dir) = setup().await;
    let service = IngestService::new(pool.clone());
    let merges = MergeService::new(pool.clone(), LockRegistry::new());

    let first = observation("suumo", "h-1", "勝どきコート", 5, 60.0, "2LDK", Some("南"), 7000, day(2024, 1, 1));
    let (_, unit_x, _) = ingest(&service, &first).await;
    let second = observation("homes", "h-2", "勝どきコート", 5, 60.0, "2LDK", Some("北"), 7100, day(2024, 1, 2));
    let (_, unit_y, _) = ingest(&service, &second).await;

    let history_id = merges.merge_units(unit_x, unit_y, "tester").await.unwrap();

    // A new observation with unit X's exact attributes recreates its
    // identity hash as a brand-new unit.
    let replay = observation("athome", "h-3", "勝どきコート", 5, 60.0, "2LDK", Some("南"), 7200, day(2024, 2, 1));
    let (_, unit_z, _) = ingest(&service, &replay).await;
    assert_ne!(unit_z, unit_x);

    // Reverting would recreate X next to its hash twin - refused.
    let err = merges.revert_unit_merge(history_id, "tester").await.unwrap_err();
    match err {
        MergeError::Validation(msg) => assert!(msg.contains("hash")),
        other => panic!("expected validation error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_exclusions_suppress_candidates() {
    let (pool, _dir) = setup().await;
    let service = IngestService::new(pool.clone());
    let repos = Repositories::new(pool.clone());
    let merges = MergeService::new(pool.clone(), LockRegistry::new());

    // Two wings share a canonical name and show up as candidates.
    let wing_1 = observation("suumo", "w-1", "白金ザスカイ第1棟", 3, 55.0, "2LDK", None, 6000, day(2024, 1, 1));
    let (building_1, _, _) = ingest(&service, &wing_1).await;
    let wing_2 = observation("suumo", "w-2", "白金ザスカイ第2棟", 3, 55.0, "2LDK", None, 6100, day(2024, 1, 1));
    let (building_2, _, _) = ingest(&service, &wing_2).await;
    assert_ne!(building_1, building_2);

    let candidates = merges.building_merge_candidates().await.unwrap();
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].0, "白金ザスカイ");

    // An operator marks them distinct; the pair is stored normalized and
    // checked symmetrically.
    merges
        .add_exclusion(MergeScope::Building, building_2, building_1, None, "tester")
        .await
        .unwrap();
    assert!(repos
        .merge_history
        .is_excluded(MergeScope::Building, building_1, building_2)
        .await
        .unwrap());
    assert!(repos
        .merge_history
        .is_excluded(MergeScope::Building, building_2, building_1)
        .await
        .unwrap());

    let candidates = merges.building_merge_candidates().await.unwrap();
    assert!(candidates.is_empty());
}

#[tokio::test]
async fn test_concurrent_merge_conflict_surfaces() {
    let (pool, _dir) = setup().await;
    let service = IngestService::new(pool.clone());
    let locks = LockRegistry::new();
    let merges = MergeService::new(pool.clone(), locks.clone());

    let (b_id, a_id, _, _) = two_buildings(&service).await;

    // Another operation holds one of the buildings.
    let _guard = locks.try_acquire(MergeScope::Building, &[a_id]).unwrap();

    let err = merges.merge_buildings(b_id, a_id, "tester").await.unwrap_err();
    assert!(matches!(err, MergeError::ConcurrentMergeConflict { .. }));
}
