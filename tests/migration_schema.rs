//! Migration Schema Tests
//!
//! Verifies that the cetane migrations produce the schema the Diesel
//! `table!` definitions expect.

use std::collections::BTreeSet;

use rusqlite::{Connection, Result as SqliteResult};

async fn migrated_connection() -> (Connection, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("schema.db");
    let url = format!("sqlite:{}", db_path.display());

    sumika::repository::migrations::run_migrations(&url)
        .await
        .unwrap();

    (Connection::open(&db_path).unwrap(), dir)
}

fn table_names(conn: &Connection) -> SqliteResult<BTreeSet<String>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )?;
    let result = stmt.query_map([], |row| row.get(0))?.collect();
    result
}

fn column_names(conn: &Connection, table: &str) -> SqliteResult<BTreeSet<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info(\"{}\")", table))?;
    let result = stmt.query_map([], |row| row.get::<_, String>(1))?.collect();
    result
}

#[tokio::test]
async fn test_migrations_create_all_tables() {
    let (conn, _dir) = migrated_connection().await;
    let tables = table_names(&conn).unwrap();

    for expected in [
        "buildings",
        "building_aliases",
        "building_listing_names",
        "units",
        "listings",
        "building_merge_history",
        "unit_merge_history",
        "merge_exclusions",
        "storage_meta",
    ] {
        assert!(tables.contains(expected), "missing table {}", expected);
    }
}

#[tokio::test]
async fn test_units_table_matches_diesel_schema() {
    let (conn, _dir) = migrated_connection().await;
    let columns = column_names(&conn, "units").unwrap();

    for expected in [
        "id",
        "building_id",
        "room_number",
        "floor_number",
        "area",
        "layout",
        "direction",
        "property_hash",
        "hash_version",
        "display_building_name",
        "sold_at",
        "final_price",
        "is_resale",
        "resale_unit_id",
        "created_at",
        "updated_at",
    ] {
        assert!(columns.contains(expected), "missing column units.{}", expected);
    }
}

#[tokio::test]
async fn test_property_hash_unique_within_building() {
    let (conn, _dir) = migrated_connection().await;

    conn.execute_batch(
        r#"
        INSERT INTO buildings (id, normalized_name, canonical_name, created_at, updated_at)
        VALUES (1, 'テスト', 'テスト', '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z');
        INSERT INTO units (building_id, property_hash, hash_version, is_resale, created_at, updated_at)
        VALUES (1, 'abc', 2, 0, '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z');
        "#,
    )
    .unwrap();

    let duplicate = conn.execute(
        "INSERT INTO units (building_id, property_hash, hash_version, is_resale, created_at, updated_at)
         VALUES (1, 'abc', 2, 0, '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z')",
        [],
    );
    assert!(duplicate.is_err(), "same hash in same building must be rejected");

    // The same hash in a different building is fine.
    conn.execute_batch(
        r#"
        INSERT INTO buildings (id, normalized_name, canonical_name, created_at, updated_at)
        VALUES (2, 'テスト2', 'テスト2', '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z');
        "#,
    )
    .unwrap();
    conn.execute(
        "INSERT INTO units (building_id, property_hash, hash_version, is_resale, created_at, updated_at)
         VALUES (2, 'abc', 2, 0, '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z')",
        [],
    )
    .unwrap();

    // Hashless units never collide with each other.
    for _ in 0..2 {
        conn.execute(
            "INSERT INTO units (building_id, is_resale, created_at, updated_at)
             VALUES (1, 0, '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z')",
            [],
        )
        .unwrap();
    }
}

#[tokio::test]
async fn test_migrations_are_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("twice.db");
    let url = format!("sqlite:{}", db_path.display());

    sumika::repository::migrations::run_migrations(&url)
        .await
        .unwrap();
    // A second run must be a no-op, not an error.
    sumika::repository::migrations::run_migrations(&url)
        .await
        .unwrap();
}
