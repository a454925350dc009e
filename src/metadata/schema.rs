//! SQL schema for the metadata tier. Applied idempotently on open.

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS containers (
    id TEXT PRIMARY KEY,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS container_locations (
    container_id TEXT NOT NULL,
    world TEXT NOT NULL,
    x INTEGER NOT NULL,
    y INTEGER NOT NULL,
    z INTEGER NOT NULL,
    is_primary INTEGER NOT NULL,
    PRIMARY KEY (world, x, y, z)
);

CREATE INDEX IF NOT EXISTS idx_container_locations_container_id
    ON container_locations(container_id);

CREATE TABLE IF NOT EXISTS container_chunks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    container_id TEXT NOT NULL,
    ordinal INTEGER NOT NULL UNIQUE,
    chunk_index INTEGER NOT NULL,
    content_text TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    container_path TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_container_chunks_container_id
    ON container_chunks(container_id);

CREATE VIRTUAL TABLE IF NOT EXISTS container_locations_rtree USING rtree(
    rtree_id,
    min_x, max_x,
    min_y, max_y,
    min_z, max_z
);

CREATE TABLE IF NOT EXISTS container_rtree_map (
    rtree_id INTEGER PRIMARY KEY,
    container_id TEXT NOT NULL,
    world TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS threshold_config (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    threshold REAL NOT NULL
);

CREATE TABLE IF NOT EXISTS search_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    query TEXT NOT NULL,
    result_count INTEGER NOT NULL,
    timestamp INTEGER NOT NULL
);
"#;
