//! C8 — ContainerResolver: reconciles physical block layout into logical
//! container identity. The primary-position selection and the R-tree
//! bounding box maintenance live in `MetadataStore` (§4.8 is a property of
//! how locations are registered, not a separate storage concern); this
//! module is the narrow seam C6 calls through so that identity resolution
//! reads as one step in the indexing job rather than a direct metadata
//! call.

use crate::errors::Result;
use crate::metadata::{Location, MetadataStore};
use std::sync::Arc;

pub struct ContainerResolver {
    metadata: Arc<MetadataStore>,
}

impl ContainerResolver {
    pub fn new(metadata: Arc<MetadataStore>) -> Self {
        Self { metadata }
    }

    /// Resolve the logical container id for a set of physical locations,
    /// creating it if none of the locations are known yet. A single-block
    /// inventory passes one location; a double chest passes both adjacent
    /// blocks, and whichever already has a container id wins.
    pub fn resolve_or_create(&self, locations: &[Location]) -> Result<String> {
        self.metadata.get_or_create_container(locations).map_err(Into::into)
    }

    /// Update the location set for an already-resolved container — called
    /// when a neighbour block is placed or removed, growing or shrinking
    /// the location set without changing the container's identity.
    pub fn update_locations(&self, container_id: &str, locations: &[Location]) -> Result<()> {
        self.metadata
            .register_or_update_locations(container_id, locations)
            .map_err(Into::into)
    }

    pub fn container_at(&self, location: &Location) -> Result<Option<String>> {
        self.metadata.container_by_location(location).map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_chest_becoming_double_keeps_same_container_id() {
        let metadata = Arc::new(MetadataStore::open_in_memory().unwrap());
        let resolver = ContainerResolver::new(metadata);

        let single = Location::new("overworld", 0, 64, 0);
        let id = resolver.resolve_or_create(&[single.clone()]).unwrap();

        let neighbour = Location::new("overworld", 1, 64, 0);
        resolver
            .update_locations(&id, &[single.clone(), neighbour.clone()])
            .unwrap();

        let resolved_from_neighbour = resolver.resolve_or_create(&[neighbour]).unwrap();
        assert_eq!(resolved_from_neighbour, id);
    }

    #[test]
    fn double_chest_losing_neighbour_shrinks_location_set() {
        let metadata = Arc::new(MetadataStore::open_in_memory().unwrap());
        let resolver = ContainerResolver::new(metadata.clone());

        let a = Location::new("overworld", 0, 64, 0);
        let b = Location::new("overworld", 1, 64, 0);
        let id = resolver.resolve_or_create(&[a.clone(), b.clone()]).unwrap();

        resolver.update_locations(&id, &[a.clone()]).unwrap();

        let positions = metadata.all_positions(&id).unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].location, a);
    }
}
