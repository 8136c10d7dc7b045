use cetane::prelude::*;

pub fn migration() -> Migration {
    Migration::new("0001_initial_schema")
        // buildings
        .operation(RunSql::portable().for_backend(
            "sqlite",
            r#"CREATE TABLE IF NOT EXISTS buildings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    normalized_name TEXT NOT NULL,
    canonical_name TEXT NOT NULL,
    reading TEXT,
    address TEXT,
    normalized_address TEXT,
    station_info TEXT,
    built_year INTEGER,
    built_month INTEGER,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)"#,
        ))
        .operation(RunSql::portable().for_backend(
            "sqlite",
            "CREATE INDEX IF NOT EXISTS idx_buildings_normalized_name ON buildings(normalized_name)",
        ))
        .operation(RunSql::portable().for_backend(
            "sqlite",
            "CREATE INDEX IF NOT EXISTS idx_buildings_canonical_name ON buildings(canonical_name)",
        ))
        // building_aliases
        .operation(RunSql::portable().for_backend(
            "sqlite",
            r#"CREATE TABLE IF NOT EXISTS building_aliases (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    building_id INTEGER NOT NULL,
    alias_name TEXT NOT NULL,
    source TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE (building_id, alias_name),
    FOREIGN KEY (building_id) REFERENCES buildings(id)
)"#,
        ))
        .operation(RunSql::portable().for_backend(
            "sqlite",
            "CREATE INDEX IF NOT EXISTS idx_building_aliases_name ON building_aliases(alias_name)",
        ))
        // building_listing_names
        .operation(RunSql::portable().for_backend(
            "sqlite",
            r#"CREATE TABLE IF NOT EXISTS building_listing_names (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    building_id INTEGER NOT NULL,
    normalized_name TEXT NOT NULL,
    canonical_name TEXT NOT NULL,
    listing_count INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (building_id, canonical_name),
    FOREIGN KEY (building_id) REFERENCES buildings(id)
)"#,
        ))
        // units
        .operation(RunSql::portable().for_backend(
            "sqlite",
            r#"CREATE TABLE IF NOT EXISTS units (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    building_id INTEGER NOT NULL,
    room_number TEXT,
    floor_number INTEGER,
    area REAL,
    layout TEXT,
    direction TEXT,
    property_hash TEXT,
    hash_version INTEGER,
    display_building_name TEXT,
    sold_at TEXT,
    final_price INTEGER,
    is_resale INTEGER NOT NULL DEFAULT 0,
    resale_unit_id INTEGER,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (building_id, property_hash),
    FOREIGN KEY (building_id) REFERENCES buildings(id)
)"#,
        ))
        .operation(RunSql::portable().for_backend(
            "sqlite",
            "CREATE INDEX IF NOT EXISTS idx_units_building_id ON units(building_id)",
        ))
        // listings
        .operation(RunSql::portable().for_backend(
            "sqlite",
            r#"CREATE TABLE IF NOT EXISTS listings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    unit_id INTEGER NOT NULL,
    source_site TEXT NOT NULL,
    source_id TEXT NOT NULL,
    url TEXT,
    is_active INTEGER NOT NULL DEFAULT 1,
    first_seen_at TEXT NOT NULL,
    last_seen_at TEXT NOT NULL,
    delisted_at TEXT,
    current_price INTEGER,
    listing_building_name TEXT,
    detail_info TEXT NOT NULL DEFAULT 'null',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (source_site, source_id),
    FOREIGN KEY (unit_id) REFERENCES units(id)
)"#,
        ))
        .operation(RunSql::portable().for_backend(
            "sqlite",
            "CREATE INDEX IF NOT EXISTS idx_listings_unit_id ON listings(unit_id)",
        ))
        // building_merge_history
        .operation(RunSql::portable().for_backend(
            "sqlite",
            r#"CREATE TABLE IF NOT EXISTS building_merge_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    merged_building_id INTEGER NOT NULL,
    direct_primary_building_id INTEGER NOT NULL,
    final_primary_building_id INTEGER NOT NULL,
    merge_depth INTEGER NOT NULL DEFAULT 1,
    merge_details TEXT NOT NULL DEFAULT '{}',
    merged_at TEXT NOT NULL,
    merged_by TEXT NOT NULL,
    reverted_at TEXT,
    reverted_by TEXT
)"#,
        ))
        .operation(RunSql::portable().for_backend(
            "sqlite",
            "CREATE INDEX IF NOT EXISTS idx_bmh_merged_building ON building_merge_history(merged_building_id)",
        ))
        // unit_merge_history
        .operation(RunSql::portable().for_backend(
            "sqlite",
            r#"CREATE TABLE IF NOT EXISTS unit_merge_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    primary_unit_id INTEGER NOT NULL,
    secondary_unit_id INTEGER NOT NULL,
    moved_listings INTEGER NOT NULL DEFAULT 0,
    merge_details TEXT NOT NULL DEFAULT '{}',
    merged_at TEXT NOT NULL,
    merged_by TEXT NOT NULL,
    reverted_at TEXT,
    reverted_by TEXT
)"#,
        ))
        .operation(RunSql::portable().for_backend(
            "sqlite",
            "CREATE INDEX IF NOT EXISTS idx_umh_secondary_unit ON unit_merge_history(secondary_unit_id)",
        ))
        // storage_meta
        .operation(
            CreateTable::new("storage_meta")
                .add_field(Field::new("key", FieldType::Text).primary_key())
                .add_field(Field::new("value", FieldType::Text).not_null()),
        )
}
