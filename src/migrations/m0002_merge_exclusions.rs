use cetane::prelude::*;

pub fn migration() -> Migration {
    Migration::new("0002_merge_exclusions")
        .depends_on(&["0001_initial_schema"])
        .operation(RunSql::portable().for_backend(
            "sqlite",
            r#"CREATE TABLE IF NOT EXISTS merge_exclusions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    scope TEXT NOT NULL,
    entity_id_a INTEGER NOT NULL,
    entity_id_b INTEGER NOT NULL,
    reason TEXT,
    created_at TEXT NOT NULL,
    created_by TEXT NOT NULL,
    UNIQUE (scope, entity_id_a, entity_id_b)
)"#,
        ))
}
