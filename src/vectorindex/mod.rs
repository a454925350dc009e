//! C2 — VectorIndex: vectors keyed by ordinal plus an on-disk ANN graph.
//!
//! Adapted from an `arroy` + `heed` vector store: the single-file,
//! memory-mapped LMDB pairing of an ANN forest (`arroy`) with a metadata
//! database survives unchanged; what changes is the key space (dense
//! `ordinal`s with explicit holes rather than an ever-growing append-only
//! id) and the deferred-rebuild discipline called for by the ordinal
//! invariant.

use crate::constants::MAX_LMDB_MAP_SIZE_MB;
use crate::errors::{EngineError, Result};
use arroy::distances::Cosine;
use arroy::{Database as ArroyDatabase, ItemId, Reader, Writer};
use heed::byteorder::BigEndian;
use heed::types::*;
use heed::{Database, EnvOpenOptions};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;
use std::fs;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::RwLock;
use tracing::warn;

/// `(ordinal, cosine_score)` pair returned by search, score in `[-1, 1]`.
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub ordinal: u32,
    pub score: f32,
}

struct Inner {
    env: heed::Env,
    vectors: ArroyDatabase<Cosine>,
    /// `ordinal -> vector`, absent entries and explicit `None` rows are holes.
    slots: Database<U32<BigEndian>, SerdeBincode<Option<Vec<f32>>>>,
    next_ordinal: u32,
    dimensions: usize,
    indexed: bool,
    dirty: bool,
    map_size_mb: usize,
}

/// Single reader/writer lock guards all structural mutation: reads share,
/// writes exclude. `add`/`delete` take the write lock but only flip the
/// dirty flag; `rebuild` is the only path that touches the graph itself.
pub struct VectorIndex {
    inner: RwLock<Inner>,
}

impl VectorIndex {
    pub fn open(db_path: &Path, dimensions: usize) -> Result<Self> {
        std::fs::create_dir_all(db_path)?;
        cleanup_stale_del_files(db_path)?;

        let map_size_mb = crate::constants::DEFAULT_LMDB_MAP_SIZE_MB;
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size_mb * 1024 * 1024)
                .max_dbs(10)
                .open(db_path)?
        };

        let mut wtxn = env.write_txn()?;
        let vectors: ArroyDatabase<Cosine> = env.create_database(&mut wtxn, Some("vectors"))?;
        let slots: Database<U32<BigEndian>, SerdeBincode<Option<Vec<f32>>>> =
            env.create_database(&mut wtxn, Some("slots"))?;
        let next_ordinal = match slots.last(&wtxn)? {
            Some((max_key, _)) => max_key + 1,
            None => 0,
        };
        wtxn.commit()?;

        let indexed = if next_ordinal > 0 {
            let rtxn = env.read_txn()?;
            Reader::open(&rtxn, 0, vectors).is_ok()
        } else {
            false
        };

        Ok(Self {
            inner: RwLock::new(Inner {
                env,
                vectors,
                slots,
                next_ordinal,
                dimensions,
                indexed,
                dirty: !indexed && next_ordinal > 0,
                map_size_mb,
            }),
        })
    }

    pub fn dimensions(&self) -> usize {
        self.inner.read().expect("vector index lock poisoned").dimensions
    }

    /// Append a vector at `ordinal`; if `ordinal` is past the current
    /// length, grow with holes. Marks dirty. Does not touch the graph.
    pub fn add_vector(&self, ordinal: u32, vector: Vec<f32>) -> Result<()> {
        let mut inner = self.inner.write().expect("vector index lock poisoned");
        if vector.len() != inner.dimensions {
            return Err(EngineError::ClientInput(format!(
                "embedding dimension mismatch: expected {}, got {}",
                inner.dimensions,
                vector.len()
            )));
        }

        let mut wtxn = inner.env.write_txn()?;
        if ordinal >= inner.next_ordinal {
            for hole in inner.next_ordinal..ordinal {
                inner.slots.put(&mut wtxn, &hole, &None)?;
            }
            inner.next_ordinal = ordinal + 1;
        }
        inner.slots.put(&mut wtxn, &ordinal, &Some(vector))?;
        wtxn.commit()?;
        inner.dirty = true;
        Ok(())
    }

    /// Allocate the next `count` ordinals without writing vectors yet.
    pub fn reserve_ordinals(&self, count: usize) -> Result<Vec<u32>> {
        let mut inner = self.inner.write().expect("vector index lock poisoned");
        let start = inner.next_ordinal;
        inner.next_ordinal += count as u32;
        Ok((start..inner.next_ordinal).collect())
    }

    /// Set a slot to a hole. Marks dirty.
    pub fn delete_vector(&self, ordinal: u32) -> Result<()> {
        let mut inner = self.inner.write().expect("vector index lock poisoned");
        let mut wtxn = inner.env.write_txn()?;
        inner.slots.put(&mut wtxn, &ordinal, &None)?;
        wtxn.commit()?;
        inner.dirty = true;
        Ok(())
    }

    /// If dirty or the graph is missing, rebuild before searching;
    /// otherwise search directly. `allow_set`, if given, restricts results
    /// to that ordinal set. arroy 0.5 has no per-query node predicate, so
    /// the allow-set is applied as a post-filter over an oversampled
    /// candidate list rather than pruning graph traversal itself (noted in
    /// DESIGN.md as a deliberate adaptation).
    ///
    /// `renumber_sql` is invoked if a rebuild is needed, exactly as in
    /// `rebuild_with`/`shutdown`, so a search-triggered compaction keeps C1's
    /// `container_chunks.ordinal` column in step with C2's renumbering.
    pub fn search<F>(
        &self,
        query: &[f32],
        k: usize,
        allow_set: Option<&HashSet<u32>>,
        renumber_sql: F,
    ) -> Result<Vec<VectorHit>>
    where
        F: FnOnce(&[(u32, u32)]) -> Result<()>,
    {
        if let Some(set) = allow_set {
            if set.is_empty() {
                return Ok(Vec::new());
            }
        }

        {
            let needs_rebuild = {
                let inner = self.inner.read().expect("vector index lock poisoned");
                inner.dirty || !inner.indexed
            };
            if needs_rebuild {
                self.rebuild_locked(renumber_sql)?;
            }
        }

        let inner = self.inner.read().expect("vector index lock poisoned");
        if query.len() != inner.dimensions {
            return Err(EngineError::ClientInput(format!(
                "query embedding dimension mismatch: expected {}, got {}",
                inner.dimensions,
                query.len()
            )));
        }
        if !inner.indexed {
            // Rebuild above failed to produce an index (e.g. empty store).
            return Ok(Vec::new());
        }

        let rtxn = inner.env.read_txn()?;
        let reader = Reader::open(&rtxn, 0, inner.vectors)
            .map_err(|e| EngineError::StorageCorrupt(e.to_string()))?;

        let fetch_k = if allow_set.is_some() { (k * 10).max(k) } else { k };
        let mut nns = reader.nns(fetch_k);
        if let Some(n_trees) = NonZeroUsize::new(reader.n_trees()) {
            if let Some(search_k) = NonZeroUsize::new(fetch_k * n_trees.get() * 15) {
                nns.search_k(search_k);
            }
        }

        let results = nns
            .by_vector(&rtxn, query)
            .map_err(|e| EngineError::StorageCorrupt(e.to_string()))?;

        let mut hits: Vec<VectorHit> = results
            .into_iter()
            .filter(|(id, _)| allow_set.map(|set| set.contains(id)).unwrap_or(true))
            .map(|(id, distance)| VectorHit {
                ordinal: id,
                score: (1.0 - distance).clamp(-1.0, 1.0),
            })
            .collect();

        hits.truncate(k);
        Ok(hits)
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.read().expect("vector index lock poisoned").dirty
    }

    pub fn live_count(&self) -> Result<usize> {
        let inner = self.inner.read().expect("vector index lock poisoned");
        let rtxn = inner.env.read_txn()?;
        let mut count = 0;
        for entry in inner.slots.iter(&rtxn)? {
            let (_, slot) = entry?;
            if slot.is_some() {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Compact out holes, renumber in ascending ordinal order, rebuild the
    /// graph from the compacted vectors, and clear the dirty flag. The SQL
    /// renumber (two-phase, per the ordinal invariant) runs first via
    /// `renumber_sql`, keeping the fixed order SQL-then-graph so a crash in
    /// between leaves the dirty flag set and is self-healing on next start.
    pub fn rebuild_with<F>(&self, renumber_sql: F) -> Result<()>
    where
        F: FnOnce(&[(u32, u32)]) -> Result<()>,
    {
        let mut inner = self.inner.write().expect("vector index lock poisoned");

        let rtxn = inner.env.read_txn()?;
        let mut compacted: Vec<(u32, Vec<f32>)> = Vec::new();
        for entry in inner.slots.iter(&rtxn)? {
            let (ordinal, slot) = entry?;
            if let Some(vector) = slot {
                compacted.push((ordinal, vector));
            }
        }
        drop(rtxn);

        let mapping: Vec<(u32, u32)> = compacted
            .iter()
            .enumerate()
            .map(|(new_ordinal, (old_ordinal, _))| (*old_ordinal, new_ordinal as u32))
            .collect();

        renumber_sql(&mapping)?;

        Self::rebuild_inner(&mut inner, compacted)
    }

    fn rebuild_locked<F>(&self, renumber_sql: F) -> Result<()>
    where
        F: FnOnce(&[(u32, u32)]) -> Result<()>,
    {
        let mut inner = self.inner.write().expect("vector index lock poisoned");
        // Re-check under the write lock: another thread may have rebuilt
        // while we waited for it.
        if !inner.dirty && inner.indexed {
            return Ok(());
        }
        let rtxn = inner.env.read_txn()?;
        let mut compacted: Vec<(u32, Vec<f32>)> = Vec::new();
        for entry in inner.slots.iter(&rtxn)? {
            let (ordinal, slot) = entry?;
            if let Some(vector) = slot {
                compacted.push((ordinal, vector));
            }
        }
        drop(rtxn);

        let mapping: Vec<(u32, u32)> = compacted
            .iter()
            .enumerate()
            .map(|(new_ordinal, (old_ordinal, _))| (*old_ordinal, new_ordinal as u32))
            .collect();
        renumber_sql(&mapping)?;

        Self::rebuild_inner(&mut inner, compacted)
    }

    fn rebuild_inner(inner: &mut Inner, compacted: Vec<(u32, Vec<f32>)>) -> Result<()> {
        let mut attempts = 0;
        let max_attempts = 3;
        loop {
            attempts += 1;
            let result = Self::rebuild_attempt(inner, &compacted);
            match &result {
                Ok(()) => return result,
                Err(e) => {
                    if attempts >= max_attempts || !is_map_full_error(e) {
                        return result;
                    }
                    let new_size = inner.map_size_mb * 2;
                    if new_size > MAX_LMDB_MAP_SIZE_MB {
                        warn!(
                            "MDB_MAP_FULL during rebuild, already at max size {}MB",
                            inner.map_size_mb
                        );
                        return result;
                    }
                    warn!(
                        "MDB_MAP_FULL during rebuild, resizing to {}MB (attempt {}/{})",
                        new_size, attempts, max_attempts
                    );
                    resize_environment(inner, new_size)?;
                }
            }
        }
    }

    fn rebuild_attempt(inner: &mut Inner, compacted: &[(u32, Vec<f32>)]) -> Result<()> {
        let mut wtxn = inner.env.write_txn()?;

        inner.slots.clear(&mut wtxn)?;
        let writer = Writer::new(inner.vectors, 0, inner.dimensions);
        writer.clear(&mut wtxn)?;

        for (new_ordinal, vector) in compacted.iter() {
            inner.slots.put(&mut wtxn, new_ordinal, &Some(vector.clone()))?;
            writer.add_item(&mut wtxn, *new_ordinal, vector)?;
        }

        if !compacted.is_empty() {
            let mut rng = StdRng::seed_from_u64(rand::random());
            writer.builder(&mut rng).build(&mut wtxn)?;
            inner.indexed = true;
        } else {
            inner.indexed = false;
        }

        inner.next_ordinal = compacted.len() as u32;
        wtxn.commit()?;
        inner.dirty = false;
        Ok(())
    }

    /// Final rebuild before shutdown if dirty, then flush.
    pub fn shutdown<F>(&self, renumber_sql: F) -> Result<()>
    where
        F: FnOnce(&[(u32, u32)]) -> Result<()>,
    {
        if self.is_dirty() {
            self.rebuild_with(renumber_sql)?;
        }
        Ok(())
    }

    pub fn purge_all(&self) -> Result<()> {
        let mut inner = self.inner.write().expect("vector index lock poisoned");
        let mut wtxn = inner.env.write_txn()?;
        inner.slots.clear(&mut wtxn)?;
        let writer = Writer::new(inner.vectors, 0, inner.dimensions);
        writer.clear(&mut wtxn)?;
        wtxn.commit()?;
        inner.next_ordinal = 0;
        inner.indexed = false;
        inner.dirty = false;
        Ok(())
    }
}

fn is_map_full_error(error: &EngineError) -> bool {
    error.to_string().contains("MDB_MAP_FULL") || error.to_string().contains("map full")
}

fn resize_environment(inner: &mut Inner, new_size_mb: usize) -> Result<()> {
    let db_path = inner.env.path().to_path_buf();
    let env = unsafe {
        EnvOpenOptions::new()
            .map_size(new_size_mb * 1024 * 1024)
            .max_dbs(10)
            .open(&db_path)?
    };
    let mut wtxn = env.write_txn()?;
    let vectors: ArroyDatabase<Cosine> = env.create_database(&mut wtxn, Some("vectors"))?;
    let slots: Database<U32<BigEndian>, SerdeBincode<Option<Vec<f32>>>> =
        env.create_database(&mut wtxn, Some("slots"))?;
    wtxn.commit()?;

    inner.env = env;
    inner.vectors = vectors;
    inner.slots = slots;
    inner.map_size_mb = new_size_mb;
    Ok(())
}

/// Clean up stale `.del` files LMDB can leave behind after a crash.
fn cleanup_stale_del_files(db_path: &Path) -> Result<()> {
    if !db_path.exists() {
        return Ok(());
    }
    for entry in fs::read_dir(db_path)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("del") {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

pub type Ordinal = ItemId;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn add_then_rebuild_makes_it_searchable() {
        let dir = tempdir().unwrap();
        let index = VectorIndex::open(&dir.path().join("vectors.idx"), 4).unwrap();

        index.add_vector(0, vec![1.0, 0.0, 0.0, 0.0]).unwrap();
        index.add_vector(1, vec![0.0, 1.0, 0.0, 0.0]).unwrap();

        let hits = index
            .search(&[0.9, 0.1, 0.0, 0.0], 2, None, |_mapping| Ok(()))
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].ordinal, 0);
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn delete_then_rebuild_compacts_holes() {
        let dir = tempdir().unwrap();
        let index = VectorIndex::open(&dir.path().join("vectors.idx"), 4).unwrap();

        index.add_vector(0, vec![1.0, 0.0, 0.0, 0.0]).unwrap();
        index.add_vector(1, vec![0.0, 1.0, 0.0, 0.0]).unwrap();
        index.delete_vector(0).unwrap();

        index.rebuild_with(|_mapping| Ok(())).unwrap();
        assert_eq!(index.live_count().unwrap(), 1);
    }

    #[test]
    fn allow_set_prunes_results() {
        let dir = tempdir().unwrap();
        let index = VectorIndex::open(&dir.path().join("vectors.idx"), 4).unwrap();

        index.add_vector(0, vec![1.0, 0.0, 0.0, 0.0]).unwrap();
        index.add_vector(1, vec![0.9, 0.1, 0.0, 0.0]).unwrap();
        index.add_vector(2, vec![0.0, 1.0, 0.0, 0.0]).unwrap();

        let allow: HashSet<u32> = [1u32].into_iter().collect();
        let hits = index
            .search(&[1.0, 0.0, 0.0, 0.0], 5, Some(&allow), |_mapping| Ok(()))
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].ordinal, 1);
    }

    #[test]
    fn empty_allow_set_short_circuits() {
        let dir = tempdir().unwrap();
        let index = VectorIndex::open(&dir.path().join("vectors.idx"), 4).unwrap();
        index.add_vector(0, vec![1.0, 0.0, 0.0, 0.0]).unwrap();

        let allow: HashSet<u32> = HashSet::new();
        let hits = index
            .search(&[1.0, 0.0, 0.0, 0.0], 5, Some(&allow), |_mapping| Ok(()))
            .unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn search_triggered_rebuild_renumbers_through_callback() {
        let dir = tempdir().unwrap();
        let index = VectorIndex::open(&dir.path().join("vectors.idx"), 4).unwrap();

        index.add_vector(0, vec![1.0, 0.0, 0.0, 0.0]).unwrap();
        index.add_vector(1, vec![0.0, 1.0, 0.0, 0.0]).unwrap();
        index.delete_vector(0).unwrap();
        assert!(index.is_dirty());

        let mut observed_mapping = Vec::new();
        let hits = index
            .search(&[0.0, 1.0, 0.0, 0.0], 5, None, |mapping| {
                observed_mapping = mapping.to_vec();
                Ok(())
            })
            .unwrap();

        assert_eq!(observed_mapping, vec![(1, 0)]);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].ordinal, 0);
    }
}
