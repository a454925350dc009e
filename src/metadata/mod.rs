//! C1 — MetadataStore: the relational tier.
//!
//! Tables: `containers`, `container_locations`, `container_chunks`, a
//! `container_locations_rtree` R*Tree virtual table, `container_rtree_map`,
//! and a singleton `threshold_config` row. One writer connection guarded by
//! a mutex, matching the SQLite-class locking model called for in the
//! concurrency section of the design.

mod schema;

use crate::constants::DEFAULT_SIMILARITY_THRESHOLD;
use crate::errors::{EngineError, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;

/// A world-qualified block position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    pub world: String,
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

impl Location {
    pub fn new(world: impl Into<String>, x: i64, y: i64, z: i64) -> Self {
        Self {
            world: world.into(),
            x,
            y,
            z,
        }
    }

    /// Lexicographic `(x, z, y)` ordering used to pick the primary position
    /// of a double chest (§4.8).
    fn primary_key(&self) -> (i64, i64, i64) {
        (self.x, self.z, self.y)
    }
}

#[derive(Debug, Clone)]
pub struct LocationRow {
    pub location: Location,
    pub is_primary: bool,
}

/// A row returned by `chunks_by_ordinals`.
#[derive(Debug, Clone)]
pub struct ChunkRow {
    pub container_id: String,
    pub primary_location: Location,
    pub content_text: String,
    pub container_path: String,
    pub ordinal: i64,
}

/// One past query, recorded for the CLI's `history` command.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub query: String,
    pub result_count: i64,
    pub timestamp: i64,
}

/// A chunk awaiting insertion; ordinals are assigned by the caller (C3),
/// never by the store itself, so C1 and C2 always agree on numbering.
#[derive(Debug, Clone)]
pub struct NewChunk {
    pub ordinal: i64,
    pub chunk_index: i64,
    pub content_text: String,
    pub container_path: String,
    pub timestamp: i64,
}

pub struct MetadataStore {
    conn: Mutex<Connection>,
}

impl MetadataStore {
    /// Opens (creating if absent) the SQLite file at `db_path`. On a fresh
    /// database `initial_threshold` seeds `threshold_config`'s singleton
    /// row; on an existing one the `INSERT OR IGNORE` is a no-op and the
    /// persisted value (possibly since changed via `admin threshold`) wins.
    pub fn open(db_path: &Path, initial_threshold: f32) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)
            .map_err(|e| EngineError::StorageCorrupt(format!("opening {}: {e}", db_path.display())))?;
        conn.execute_batch(schema::SCHEMA)?;
        conn.execute(
            "INSERT OR IGNORE INTO threshold_config (id, threshold) VALUES (1, ?1)",
            params![initial_threshold],
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store, for tests and for the read-only doctor fallback.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(schema::SCHEMA)?;
        conn.execute(
            "INSERT OR IGNORE INTO threshold_config (id, threshold) VALUES (1, ?1)",
            params![DEFAULT_SIMILARITY_THRESHOLD],
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Look up a container by any of its locations; if found, update its
    /// location set (handles the single -> double chest transition). If
    /// none found, create a fresh id and insert the locations.
    pub fn get_or_create_container(&self, locations: &[Location]) -> Result<String> {
        if locations.is_empty() {
            return Err(EngineError::ClientInput(
                "container must have at least one location".to_string(),
            ));
        }

        let mut conn = self.conn.lock().expect("metadata connection poisoned");
        let tx = conn.transaction()?;

        let mut existing: Option<String> = None;
        for loc in locations {
            let found: Option<String> = tx
                .query_row(
                    "SELECT container_id FROM container_locations WHERE world = ?1 AND x = ?2 AND y = ?3 AND z = ?4",
                    params![loc.world, loc.x, loc.y, loc.z],
                    |row| row.get(0),
                )
                .optional()?;
            if found.is_some() {
                existing = found;
                break;
            }
        }

        let container_id = match existing {
            Some(id) => id,
            None => {
                let id = uuid::Uuid::new_v4().to_string();
                let now = chrono::Utc::now().timestamp();
                tx.execute(
                    "INSERT INTO containers (id, created_at) VALUES (?1, ?2)",
                    params![id, now],
                )?;
                id
            }
        };

        Self::register_locations_tx(&tx, &container_id, locations)?;
        tx.commit()?;
        Ok(container_id)
    }

    /// Delete existing location rows for `container_id`, re-insert the new
    /// set, and recompute the R-tree bounding box.
    pub fn register_or_update_locations(&self, container_id: &str, locations: &[Location]) -> Result<()> {
        let mut conn = self.conn.lock().expect("metadata connection poisoned");
        let tx = conn.transaction()?;
        Self::register_locations_tx(&tx, container_id, locations)?;
        tx.commit()?;
        Ok(())
    }

    fn register_locations_tx(tx: &rusqlite::Transaction<'_>, container_id: &str, locations: &[Location]) -> Result<()> {
        if locations.is_empty() {
            return Err(EngineError::ClientInput(
                "container must have at least one location".to_string(),
            ));
        }

        tx.execute(
            "DELETE FROM container_locations WHERE container_id = ?1",
            params![container_id],
        )?;

        let primary = locations
            .iter()
            .min_by_key(|l| l.primary_key())
            .expect("non-empty locations");

        for loc in locations {
            tx.execute(
                "INSERT INTO container_locations (container_id, world, x, y, z, is_primary) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    container_id,
                    loc.world,
                    loc.x,
                    loc.y,
                    loc.z,
                    (loc == primary) as i64
                ],
            )?;
        }

        let world = &primary.world;
        let min_x = locations.iter().map(|l| l.x).min().unwrap();
        let max_x = locations.iter().map(|l| l.x).max().unwrap();
        let min_y = locations.iter().map(|l| l.y).min().unwrap();
        let max_y = locations.iter().map(|l| l.y).max().unwrap();
        let min_z = locations.iter().map(|l| l.z).min().unwrap();
        let max_z = locations.iter().map(|l| l.z).max().unwrap();

        let existing_rtree_id: Option<i64> = tx
            .query_row(
                "SELECT rtree_id FROM container_rtree_map WHERE container_id = ?1",
                params![container_id],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(rtree_id) = existing_rtree_id {
            tx.execute(
                "UPDATE container_locations_rtree SET min_x = ?2, max_x = ?3, min_y = ?4, max_y = ?5, min_z = ?6, max_z = ?7 WHERE rtree_id = ?1",
                params![rtree_id, min_x, max_x, min_y, max_y, min_z, max_z],
            )?;
            tx.execute(
                "UPDATE container_rtree_map SET world = ?2 WHERE rtree_id = ?1",
                params![rtree_id, world],
            )?;
        } else {
            tx.execute(
                "INSERT INTO container_locations_rtree (min_x, max_x, min_y, max_y, min_z, max_z) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![min_x, max_x, min_y, max_y, min_z, max_z],
            )?;
            let rtree_id = tx.last_insert_rowid();
            tx.execute(
                "INSERT INTO container_rtree_map (rtree_id, container_id, world) VALUES (?1, ?2, ?3)",
                params![rtree_id, container_id, world],
            )?;
        }

        Ok(())
    }

    /// Replace a container's chunks atomically: delete existing rows, insert
    /// the new set with caller-supplied ordinals.
    pub fn replace_chunks(&self, container_id: &str, chunks: &[NewChunk]) -> Result<()> {
        let mut conn = self.conn.lock().expect("metadata connection poisoned");
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM container_chunks WHERE container_id = ?1",
            params![container_id],
        )?;
        for chunk in chunks {
            tx.execute(
                "INSERT INTO container_chunks (container_id, ordinal, chunk_index, content_text, timestamp, container_path) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    container_id,
                    chunk.ordinal,
                    chunk.chunk_index,
                    chunk.content_text,
                    chunk.timestamp,
                    chunk.container_path,
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Ordinals whose container bounding box intersects the axis-aligned
    /// cube, joined via the R-tree then exact-bound checked.
    pub fn ordinals_in_box(
        &self,
        world: &str,
        min: (i64, i64, i64),
        max: (i64, i64, i64),
    ) -> Result<HashSet<i64>> {
        let conn = self.conn.lock().expect("metadata connection poisoned");
        let mut stmt = conn.prepare(
            "SELECT cc.ordinal
             FROM container_locations_rtree rt
             JOIN container_rtree_map m ON m.rtree_id = rt.rtree_id
             JOIN container_chunks cc ON cc.container_id = m.container_id
             WHERE m.world = ?1
               AND rt.min_x <= ?2 AND rt.max_x >= ?3
               AND rt.min_y <= ?4 AND rt.max_y >= ?5
               AND rt.min_z <= ?6 AND rt.max_z >= ?7",
        )?;
        let rows = stmt.query_map(
            params![world, max.0, min.0, max.1, min.1, max.2, min.2],
            |row| row.get::<_, i64>(0),
        )?;
        let mut ordinals = HashSet::new();
        for row in rows {
            ordinals.insert(row?);
        }
        Ok(ordinals)
    }

    /// `(container_id, primary_location, content_text, container_path, ordinal)`
    /// rows for a set of ordinals.
    pub fn chunks_by_ordinals(&self, ordinals: &HashSet<i64>) -> Result<Vec<ChunkRow>> {
        if ordinals.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn.lock().expect("metadata connection poisoned");
        let placeholders = ordinals.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!(
            "SELECT cc.container_id, cc.content_text, cc.container_path, cc.ordinal,
                    cl.world, cl.x, cl.y, cl.z
             FROM container_chunks cc
             JOIN container_locations cl ON cl.container_id = cc.container_id AND cl.is_primary = 1
             WHERE cc.ordinal IN ({placeholders})"
        );
        let mut stmt = conn.prepare(&sql)?;
        let params: Vec<&dyn rusqlite::ToSql> =
            ordinals.iter().map(|o| o as &dyn rusqlite::ToSql).collect();
        let rows = stmt.query_map(params.as_slice(), |row| {
            Ok(ChunkRow {
                container_id: row.get(0)?,
                content_text: row.get(1)?,
                container_path: row.get(2)?,
                ordinal: row.get(3)?,
                primary_location: Location {
                    world: row.get(4)?,
                    x: row.get(5)?,
                    y: row.get(6)?,
                    z: row.get(7)?,
                },
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Cascade-delete a container's chunks, locations, and R-tree entry.
    pub fn delete_container(&self, container_id: &str) -> Result<()> {
        let mut conn = self.conn.lock().expect("metadata connection poisoned");
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM container_chunks WHERE container_id = ?1",
            params![container_id],
        )?;
        tx.execute(
            "DELETE FROM container_locations WHERE container_id = ?1",
            params![container_id],
        )?;
        let rtree_id: Option<i64> = tx
            .query_row(
                "SELECT rtree_id FROM container_rtree_map WHERE container_id = ?1",
                params![container_id],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(rtree_id) = rtree_id {
            tx.execute(
                "DELETE FROM container_locations_rtree WHERE rtree_id = ?1",
                params![rtree_id],
            )?;
            tx.execute(
                "DELETE FROM container_rtree_map WHERE rtree_id = ?1",
                params![rtree_id],
            )?;
        }
        tx.execute("DELETE FROM containers WHERE id = ?1", params![container_id])?;
        tx.commit()?;
        Ok(())
    }

    /// Resolve a container id by any one of its locations.
    pub fn container_by_location(&self, location: &Location) -> Result<Option<String>> {
        let conn = self.conn.lock().expect("metadata connection poisoned");
        Ok(conn
            .query_row(
                "SELECT container_id FROM container_locations WHERE world = ?1 AND x = ?2 AND y = ?3 AND z = ?4",
                params![location.world, location.x, location.y, location.z],
                |row| row.get(0),
            )
            .optional()?)
    }

    /// `(container_id, primary_location)` pairs for every container whose
    /// bounding box intersects the axis-aligned cube; used by C6's
    /// `reindexRadius` to enumerate targets without going through C2.
    pub fn containers_in_box(
        &self,
        world: &str,
        min: (i64, i64, i64),
        max: (i64, i64, i64),
    ) -> Result<Vec<(String, Location)>> {
        let conn = self.conn.lock().expect("metadata connection poisoned");
        let mut stmt = conn.prepare(
            "SELECT m.container_id, cl.x, cl.y, cl.z
             FROM container_locations_rtree rt
             JOIN container_rtree_map m ON m.rtree_id = rt.rtree_id
             JOIN container_locations cl ON cl.container_id = m.container_id AND cl.is_primary = 1
             WHERE m.world = ?1
               AND rt.min_x <= ?2 AND rt.max_x >= ?3
               AND rt.min_y <= ?4 AND rt.max_y >= ?5
               AND rt.min_z <= ?6 AND rt.max_z >= ?7",
        )?;
        let rows = stmt.query_map(
            params![world, max.0, min.0, max.1, min.1, max.2, min.2],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    Location {
                        world: world.to_string(),
                        x: row.get(1)?,
                        y: row.get(2)?,
                        z: row.get(3)?,
                    },
                ))
            },
        )?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// All positions for a container, in no particular order.
    pub fn all_positions(&self, container_id: &str) -> Result<Vec<LocationRow>> {
        let conn = self.conn.lock().expect("metadata connection poisoned");
        let mut stmt = conn.prepare(
            "SELECT world, x, y, z, is_primary FROM container_locations WHERE container_id = ?1",
        )?;
        let rows = stmt.query_map(params![container_id], |row| {
            Ok(LocationRow {
                location: Location {
                    world: row.get(0)?,
                    x: row.get(1)?,
                    y: row.get(2)?,
                    z: row.get(3)?,
                },
                is_primary: row.get::<_, i64>(4)? != 0,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn get_threshold(&self) -> Result<f32> {
        let conn = self.conn.lock().expect("metadata connection poisoned");
        Ok(conn.query_row(
            "SELECT threshold FROM threshold_config WHERE id = 1",
            [],
            |row| row.get(0),
        )?)
    }

    pub fn set_threshold(&self, threshold: f32) -> Result<()> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(EngineError::ClientInput(
                "threshold must be in [0, 1]".to_string(),
            ));
        }
        let conn = self.conn.lock().expect("metadata connection poisoned");
        conn.execute(
            "UPDATE threshold_config SET threshold = ?1 WHERE id = 1",
            params![threshold],
        )?;
        Ok(())
    }

    /// Truncate all content tables except `threshold_config`.
    pub fn purge_all(&self) -> Result<()> {
        let mut conn = self.conn.lock().expect("metadata connection poisoned");
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM container_chunks", [])?;
        tx.execute("DELETE FROM container_locations", [])?;
        tx.execute("DELETE FROM container_locations_rtree", [])?;
        tx.execute("DELETE FROM container_rtree_map", [])?;
        tx.execute("DELETE FROM containers", [])?;
        tx.commit()?;
        Ok(())
    }

    pub fn chunk_count(&self) -> Result<i64> {
        let conn = self.conn.lock().expect("metadata connection poisoned");
        Ok(conn.query_row("SELECT COUNT(*) FROM container_chunks", [], |row| row.get(0))?)
    }

    /// Appends one entry to the local query history (CLI's `history`
    /// command; not the per-player history the spec treats as an external
    /// collaborator's responsibility).
    pub fn record_query(&self, query: &str, result_count: i64, timestamp: i64) -> Result<()> {
        let conn = self.conn.lock().expect("metadata connection poisoned");
        conn.execute(
            "INSERT INTO search_history (query, result_count, timestamp) VALUES (?1, ?2, ?3)",
            params![query, result_count, timestamp],
        )?;
        Ok(())
    }

    pub fn recent_queries(&self, limit: usize) -> Result<Vec<HistoryEntry>> {
        let conn = self.conn.lock().expect("metadata connection poisoned");
        let mut stmt = conn.prepare(
            "SELECT query, result_count, timestamp FROM search_history ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(HistoryEntry {
                query: row.get(0)?,
                result_count: row.get(1)?,
                timestamp: row.get(2)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn clear_history(&self) -> Result<()> {
        let conn = self.conn.lock().expect("metadata connection poisoned");
        conn.execute("DELETE FROM search_history", [])?;
        Ok(())
    }

    /// Two-phase ordinal renumber, per the compaction invariant: phase 1
    /// negates-minus-one (guaranteed non-colliding with any live ordinal),
    /// phase 2 assigns the final positive values. Runs in one transaction.
    pub fn renumber_ordinals(&self, mapping: &[(i64, i64)]) -> Result<()> {
        if mapping.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.lock().expect("metadata connection poisoned");
        let tx = conn.transaction()?;
        for (old, _new) in mapping {
            tx.execute(
                "UPDATE container_chunks SET ordinal = ?1 WHERE ordinal = ?2",
                params![-old - 1, old],
            )?;
        }
        for (old, new) in mapping {
            tx.execute(
                "UPDATE container_chunks SET ordinal = ?1 WHERE ordinal = ?2",
                params![new, -old - 1],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Defensive prune: delete any chunk row whose ordinal is not present
    /// in the given set of live ordinals. Called after a rebuild to keep
    /// C1 and C2 in sync when a C2 write fails after a C1 commit.
    pub fn prune_ordinals_not_in(&self, live_ordinals: &HashSet<i64>) -> Result<usize> {
        let conn = self.conn.lock().expect("metadata connection poisoned");
        let mut stmt = conn.prepare("SELECT ordinal FROM container_chunks")?;
        let all: Vec<i64> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<_>>()?;
        drop(stmt);

        let stale: Vec<i64> = all.into_iter().filter(|o| !live_ordinals.contains(o)).collect();
        for ordinal in &stale {
            conn.execute(
                "DELETE FROM container_chunks WHERE ordinal = ?1",
                params![ordinal],
            )?;
        }
        Ok(stale.len())
    }

    /// Ordinals currently owned by one container, used when deleting it.
    pub fn all_ordinals_for(&self, container_id: &str) -> Result<Vec<i64>> {
        let conn = self.conn.lock().expect("metadata connection poisoned");
        let mut stmt =
            conn.prepare("SELECT ordinal FROM container_chunks WHERE container_id = ?1")?;
        let rows = stmt.query_map(params![container_id], |row| row.get::<_, i64>(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Existing chunk rows for one container, used to re-embed in place
    /// (`reindexRadius`) without requiring the caller to resend item data.
    pub fn chunks_for_container(&self, container_id: &str) -> Result<Vec<ChunkRow>> {
        let conn = self.conn.lock().expect("metadata connection poisoned");
        let mut stmt = conn.prepare(
            "SELECT cc.container_id, cc.content_text, cc.container_path, cc.ordinal,
                    cl.world, cl.x, cl.y, cl.z
             FROM container_chunks cc
             JOIN container_locations cl ON cl.container_id = cc.container_id AND cl.is_primary = 1
             WHERE cc.container_id = ?1
             ORDER BY cc.chunk_index",
        )?;
        let rows = stmt.query_map(params![container_id], |row| {
            Ok(ChunkRow {
                container_id: row.get(0)?,
                content_text: row.get(1)?,
                container_path: row.get(2)?,
                ordinal: row.get(3)?,
                primary_location: Location {
                    world: row.get(4)?,
                    x: row.get(5)?,
                    y: row.get(6)?,
                    z: row.get(7)?,
                },
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// All live ordinals, for the vector index rebuild and consistency checks.
    pub fn all_ordinals(&self) -> Result<HashSet<i64>> {
        let conn = self.conn.lock().expect("metadata connection poisoned");
        let mut stmt = conn.prepare("SELECT ordinal FROM container_chunks")?;
        let rows = stmt.query_map([], |row| row.get::<_, i64>(0))?;
        let mut out = HashSet::new();
        for row in rows {
            out.insert(row?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(world: &str, x: i64, y: i64, z: i64) -> Location {
        Location::new(world, x, y, z)
    }

    #[test]
    fn get_or_create_is_idempotent_per_location() {
        let store = MetadataStore::open_in_memory().unwrap();
        let locations = vec![loc("overworld", 10, 64, 20)];
        let id1 = store.get_or_create_container(&locations).unwrap();
        let id2 = store.get_or_create_container(&locations).unwrap();
        assert_eq!(id1, id2);
    }

    #[test]
    fn double_chest_primary_is_lexicographically_smaller() {
        let store = MetadataStore::open_in_memory().unwrap();
        let locations = vec![loc("overworld", 2, 64, 1), loc("overworld", 1, 64, 1)];
        let id = store.get_or_create_container(&locations).unwrap();
        let positions = store.all_positions(&id).unwrap();
        let primary = positions.iter().find(|p| p.is_primary).unwrap();
        assert_eq!(primary.location, loc("overworld", 1, 64, 1));
    }

    #[test]
    fn both_locations_resolve_to_same_container() {
        let store = MetadataStore::open_in_memory().unwrap();
        let a = loc("overworld", 1, 64, 1);
        let b = loc("overworld", 2, 64, 1);
        let id = store.get_or_create_container(&[a, b]).unwrap();
        assert_eq!(store.container_by_location(&a).unwrap(), Some(id.clone()));
        assert_eq!(store.container_by_location(&b).unwrap(), Some(id));
    }

    #[test]
    fn ordinals_in_box_respects_exact_bounds() {
        let store = MetadataStore::open_in_memory().unwrap();
        let id = store
            .get_or_create_container(&[loc("overworld", 0, 64, 0)])
            .unwrap();
        store
            .replace_chunks(
                &id,
                &[NewChunk {
                    ordinal: 0,
                    chunk_index: 0,
                    content_text: "stone".to_string(),
                    container_path: "[]".to_string(),
                    timestamp: 0,
                }],
            )
            .unwrap();

        let hits = store
            .ordinals_in_box("overworld", (-5, 60, -5), (5, 70, 5))
            .unwrap();
        assert!(hits.contains(&0));

        let misses = store
            .ordinals_in_box("overworld", (10, 60, 10), (20, 70, 20))
            .unwrap();
        assert!(misses.is_empty());
    }

    #[test]
    fn renumber_ordinals_two_phase_no_collision() {
        let store = MetadataStore::open_in_memory().unwrap();
        let id = store
            .get_or_create_container(&[loc("overworld", 0, 64, 0)])
            .unwrap();
        store
            .replace_chunks(
                &id,
                &[
                    NewChunk {
                        ordinal: 5,
                        chunk_index: 0,
                        content_text: "a".to_string(),
                        container_path: "[]".to_string(),
                        timestamp: 0,
                    },
                    NewChunk {
                        ordinal: 7,
                        chunk_index: 1,
                        content_text: "b".to_string(),
                        container_path: "[]".to_string(),
                        timestamp: 0,
                    },
                ],
            )
            .unwrap();

        // Swap the two ordinals, which a naive single-phase UPDATE would collide on.
        store.renumber_ordinals(&[(5, 7), (7, 5)]).unwrap();
        let ordinals = store.all_ordinals().unwrap();
        assert_eq!(ordinals, [5i64, 7].into_iter().collect());
    }

    #[test]
    fn purge_all_keeps_threshold() {
        let store = MetadataStore::open_in_memory().unwrap();
        store.set_threshold(0.42).unwrap();
        store
            .get_or_create_container(&[loc("overworld", 0, 0, 0)])
            .unwrap();
        store.purge_all().unwrap();
        assert_eq!(store.chunk_count().unwrap(), 0);
        assert!((store.get_threshold().unwrap() - 0.42).abs() < f32::EPSILON);
    }
}
