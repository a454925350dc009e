//! C3 — HybridStore: thin coordinator enforcing the ordinal invariant
//! between the metadata tier (C1) and the vector index (C2).

use crate::errors::Result;
use crate::metadata::{ChunkRow, Location, MetadataStore, NewChunk};
use crate::vectorindex::{VectorHit, VectorIndex};
use std::collections::HashSet;
use std::sync::Arc;

/// A chunk ready to be indexed: text plus its embedding, produced by C6.
#[derive(Debug, Clone)]
pub struct IndexableChunk {
    pub chunk_index: i64,
    pub content_text: String,
    pub container_path: String,
    pub timestamp: i64,
    pub embedding: Vec<f32>,
}

pub struct Stats {
    pub chunk_count: i64,
    pub backend_name: &'static str,
}

pub struct HybridStore {
    metadata: Arc<MetadataStore>,
    vectors: Arc<VectorIndex>,
}

impl HybridStore {
    pub fn new(metadata: Arc<MetadataStore>, vectors: Arc<VectorIndex>) -> Self {
        Self { metadata, vectors }
    }

    /// Allocate fresh ordinals, write C1 rows in one transaction, then add
    /// each vector to C2 under its write lock. If C2 fails after the C1
    /// commit, the ordinals become dangling and are cleared defensively at
    /// the next rebuild.
    pub fn index_chunks(&self, container_id: &str, chunks: Vec<IndexableChunk>) -> Result<()> {
        if chunks.is_empty() {
            return self.metadata.replace_chunks(container_id, &[]).map_err(Into::into);
        }

        let ordinals = self.vectors.reserve_ordinals(chunks.len())?;

        let new_chunks: Vec<NewChunk> = chunks
            .iter()
            .zip(ordinals.iter())
            .map(|(chunk, ordinal)| NewChunk {
                ordinal: *ordinal as i64,
                chunk_index: chunk.chunk_index,
                content_text: chunk.content_text.clone(),
                container_path: chunk.container_path.clone(),
                timestamp: chunk.timestamp,
            })
            .collect();

        self.metadata.replace_chunks(container_id, &new_chunks)?;

        for (chunk, ordinal) in chunks.into_iter().zip(ordinals.into_iter()) {
            self.vectors.add_vector(ordinal, chunk.embedding)?;
        }

        Ok(())
    }

    /// Resolve a container by location and delete it.
    pub fn delete_by_location(&self, location: &Location) -> Result<()> {
        if let Some(container_id) = self.metadata.container_by_location(location)? {
            self.delete_container(&container_id)?;
        }
        Ok(())
    }

    /// Delete a container's rows in C1 and null the corresponding C2 slots.
    pub fn delete_container(&self, container_id: &str) -> Result<()> {
        let ordinals = self
            .metadata
            .all_ordinals_for(container_id)
            .unwrap_or_default();
        self.metadata.delete_container(container_id)?;
        for ordinal in ordinals {
            self.vectors.delete_vector(ordinal as u32)?;
        }
        Ok(())
    }

    /// Raw ANN search restricted to an optional allow-set, joined against
    /// C1 for the enriched chunk rows. Callers (C5) apply expansion,
    /// rerank and the threshold gate on top of this.
    pub fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
        allow_set: Option<&HashSet<u32>>,
    ) -> Result<Vec<(VectorHit, ChunkRow)>> {
        let hits = self.vectors.search(query_embedding, limit, allow_set, self.renumber_callback())?;
        if hits.is_empty() {
            return Ok(Vec::new());
        }

        let ordinal_set: HashSet<i64> = hits.iter().map(|h| h.ordinal as i64).collect();
        let rows = self.metadata.chunks_by_ordinals(&ordinal_set)?;
        let rows_by_ordinal: std::collections::HashMap<i64, ChunkRow> =
            rows.into_iter().map(|row| (row.ordinal, row)).collect();

        let mut out = Vec::new();
        for hit in hits {
            if let Some(row) = rows_by_ordinal.get(&(hit.ordinal as i64)) {
                out.push((hit.clone(), row.clone()));
            }
        }
        Ok(out)
    }

    pub fn get_threshold(&self) -> Result<f32> {
        self.metadata.get_threshold().map_err(Into::into)
    }

    pub fn set_threshold(&self, threshold: f32) -> Result<()> {
        self.metadata.set_threshold(threshold).map_err(Into::into)
    }

    pub fn stats(&self) -> Result<Stats> {
        Ok(Stats {
            chunk_count: self.metadata.chunk_count()?,
            backend_name: "hybrid-local",
        })
    }

    pub fn purge_all(&self) -> Result<()> {
        self.metadata.purge_all()?;
        self.vectors.purge_all()?;
        Ok(())
    }

    /// Builds the renumber-on-rebuild callback shared by `search`'s
    /// search-triggered compaction and `shutdown`'s final flush: applies
    /// C2's old-to-new ordinal mapping to C1 via the two-phase renumber,
    /// then prunes any C1 row left pointing at an ordinal C2 no longer has.
    fn renumber_callback(&self) -> impl FnOnce(&[(u32, u32)]) -> Result<()> {
        let metadata = self.metadata.clone();
        move |mapping: &[(u32, u32)]| {
            metadata.renumber_ordinals(
                &mapping
                    .iter()
                    .map(|(old, new)| (*old as i64, *new as i64))
                    .collect::<Vec<_>>(),
            )?;
            let live: HashSet<i64> = mapping.iter().map(|(_, new)| *new as i64).collect();
            metadata.prune_ordinals_not_in(&live)?;
            Ok(())
        }
    }

    pub fn shutdown(&self) -> Result<()> {
        self.vectors.shutdown(self.renumber_callback())
    }

    pub fn metadata(&self) -> &Arc<MetadataStore> {
        &self.metadata
    }

    pub fn vectors(&self) -> &Arc<VectorIndex> {
        &self.vectors
    }
}
