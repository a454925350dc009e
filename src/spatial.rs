//! C4 — SpatialFilter: bounding-box query via the R-tree, producing an
//! allow-set of ordinals, plus the post-hoc exact-radius check.

use crate::errors::Result;
use crate::hybridstore::HybridStore;
use crate::metadata::{ChunkRow, Location};
use std::collections::HashSet;

pub struct SpatialFilter;

impl SpatialFilter {
    /// Ordinals of containers whose bounding box intersects the
    /// axis-aligned cube `[cx±r, cy±r, cz±r]` in `center.world`.
    pub fn allow_set(
        store: &HybridStore,
        center: &Location,
        radius: f64,
    ) -> Result<HashSet<u32>> {
        let r = radius.ceil() as i64;
        let min = (center.x - r, center.y - r, center.z - r);
        let max = (center.x + r, center.y + r, center.z + r);
        let ordinals = store.metadata().ordinals_in_box(&center.world, min, max)?;
        Ok(ordinals.into_iter().map(|o| o as u32).collect())
    }

    /// Exact Euclidean distance from `center` to a chunk's primary
    /// position; used to reject candidates the bounding-box pass let
    /// through but that fall outside the true radius.
    pub fn distance(center: &Location, row: &ChunkRow) -> f64 {
        if row.primary_location.world != center.world {
            return f64::INFINITY;
        }
        let dx = (row.primary_location.x - center.x) as f64;
        let dy = (row.primary_location.y - center.y) as f64;
        let dz = (row.primary_location.z - center.z) as f64;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    pub fn within_radius(center: &Location, row: &ChunkRow, radius: f64) -> bool {
        Self::distance(center, row) <= radius
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{MetadataStore, NewChunk};
    use crate::vectorindex::VectorIndex;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn make_store() -> (HybridStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let metadata = Arc::new(MetadataStore::open_in_memory().unwrap());
        let vectors = Arc::new(VectorIndex::open(&dir.path().join("vectors.idx"), 4).unwrap());
        (HybridStore::new(metadata, vectors), dir)
    }

    #[test]
    fn allow_set_matches_only_nearby_container() {
        let (store, _dir) = make_store();
        let near = Location::new("overworld", 1, 64, 1);
        let far = Location::new("overworld", 100, 64, 100);

        let near_id = store.metadata().get_or_create_container(&[near]).unwrap();
        let far_id = store.metadata().get_or_create_container(&[far]).unwrap();
        store
            .metadata()
            .replace_chunks(
                &near_id,
                &[NewChunk {
                    ordinal: 0,
                    chunk_index: 0,
                    content_text: "x".into(),
                    container_path: "[]".into(),
                    timestamp: 0,
                }],
            )
            .unwrap();
        store
            .metadata()
            .replace_chunks(
                &far_id,
                &[NewChunk {
                    ordinal: 1,
                    chunk_index: 0,
                    content_text: "y".into(),
                    container_path: "[]".into(),
                    timestamp: 0,
                }],
            )
            .unwrap();

        let center = Location::new("overworld", 0, 64, 0);
        let allow = SpatialFilter::allow_set(&store, &center, 5.0).unwrap();
        assert!(allow.contains(&0));
        assert!(!allow.contains(&1));
    }

    #[test]
    fn distance_excludes_other_worlds() {
        let center = Location::new("overworld", 0, 0, 0);
        let row = ChunkRow {
            container_id: "x".into(),
            primary_location: Location::new("nether", 0, 0, 0),
            content_text: String::new(),
            container_path: "[]".into(),
            ordinal: 0,
        };
        assert!(SpatialFilter::distance(&center, &row).is_infinite());
    }
}
