//! C6 — ContainerIndexer: debounces inventory modifications so rapid
//! interactions coalesce into a single embed+store cycle per container
//! (§4.6).

mod serialize;

pub use serialize::{ContainerPathNode, ItemStack, TagProvider};

use crate::embed::PendingChunk;
use crate::errors::Result;
use crate::hybridstore::{HybridStore, IndexableChunk};
use crate::metadata::Location;
use crate::resolver::ContainerResolver;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub struct ContainerIndexer {
    resolver: Arc<ContainerResolver>,
    store: Arc<HybridStore>,
    embeddings: Arc<crate::embed::EmbeddingService>,
    debounce: Duration,
    pending: DashMap<String, CancellationToken>,
    tag_providers: Vec<TagProvider>,
}

impl ContainerIndexer {
    pub fn new(
        resolver: Arc<ContainerResolver>,
        store: Arc<HybridStore>,
        embeddings: Arc<crate::embed::EmbeddingService>,
        debounce: Duration,
    ) -> Self {
        Self {
            resolver,
            store,
            embeddings,
            debounce,
            pending: DashMap::new(),
            tag_providers: Vec::new(),
        }
    }

    /// Registers an extension-hook tag provider. Providers are pure,
    /// host-agnostic, and must be idempotent — they're called once per
    /// item, per serialization.
    pub fn register_tag_provider(&mut self, provider: TagProvider) {
        self.tag_providers.push(provider);
    }

    /// Resolves the locations to a stable container id up front and uses
    /// that id as the debounce key, cancelling any pending timer for the
    /// same container and arming a new one. Keying on the resolved id
    /// (rather than the call's raw location list) is what makes a
    /// single-chest-becomes-double-chest transition still coalesce into
    /// one job: the location set changes between calls, the container id
    /// doesn't. The job that fires updates the location set, serializes
    /// `items` into chunks, batch-embeds them, and writes through `C3`.
    pub fn schedule_index(self: &Arc<Self>, locations: Vec<Location>, items: Vec<ItemStack>) -> Result<()> {
        let container_id = self.resolver.resolve_or_create(&locations)?;
        let key = container_id.clone();

        if let Some(existing) = self.pending.get(&key) {
            existing.cancel();
        }

        let token = CancellationToken::new();
        self.pending.insert(key.clone(), token.clone());

        let this = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(this.debounce) => {
                    this.pending.remove(&key);
                    if crate::constants::is_shutdown_requested() {
                        tracing::debug!("shutdown requested, dropping debounced job for {key}");
                        return;
                    }
                    if let Err(e) = this.run_index_job(container_id, locations, items).await {
                        tracing::warn!("indexing job for {key} failed: {e}");
                    }
                }
                _ = token.cancelled() => {}
            }
        });
        Ok(())
    }

    async fn run_index_job(&self, container_id: String, locations: Vec<Location>, items: Vec<ItemStack>) -> Result<()> {
        self.resolver.update_locations(&container_id, &locations)?;

        let groups = serialize::group_into_chunks(&items, &self.tag_providers);
        let now = chrono::Utc::now().timestamp();

        let pending_chunks: Vec<PendingChunk> = groups
            .iter()
            .enumerate()
            .map(|(chunk_index, group)| PendingChunk {
                chunk_index: chunk_index as i64,
                content_text: group.content_text.clone(),
                container_path: group.container_path.clone(),
                timestamp: now,
            })
            .collect();

        let embedded = self.embeddings.embed_chunks(pending_chunks).await?;

        let chunks: Vec<IndexableChunk> = embedded
            .into_iter()
            .map(|chunk| IndexableChunk {
                chunk_index: chunk.chunk_index,
                content_text: chunk.content_text,
                container_path: chunk.container_path,
                timestamp: chunk.timestamp,
                embedding: chunk.embedding,
            })
            .collect();

        self.store.index_chunks(&container_id, chunks)
    }

    /// Enumerates containers whose bounding box intersects the radius cube
    /// and re-embeds their existing chunk content in place, without
    /// requiring fresh item data from the caller.
    pub async fn reindex_radius(&self, center: &Location, radius: f64) -> Result<usize> {
        let r = radius.ceil() as i64;
        let min = (center.x - r, center.y - r, center.z - r);
        let max = (center.x + r, center.y + r, center.z + r);
        let targets = self.store.metadata().containers_in_box(&center.world, min, max)?;

        let mut reindexed = 0;
        for (container_id, _primary) in targets {
            let existing = self.store.metadata().chunks_for_container(&container_id)?;
            if existing.is_empty() {
                continue;
            }
            let pending_chunks: Vec<PendingChunk> = existing
                .iter()
                .enumerate()
                .map(|(i, row)| PendingChunk {
                    chunk_index: i as i64,
                    content_text: row.content_text.clone(),
                    container_path: row.container_path.clone(),
                    timestamp: chrono::Utc::now().timestamp(),
                })
                .collect();
            let embedded = self.embeddings.embed_chunks(pending_chunks).await?;
            let chunks: Vec<IndexableChunk> = embedded
                .into_iter()
                .map(|chunk| IndexableChunk {
                    chunk_index: chunk.chunk_index,
                    content_text: chunk.content_text,
                    container_path: chunk.container_path,
                    timestamp: chunk.timestamp,
                    embedding: chunk.embedding,
                })
                .collect();
            self.store.index_chunks(&container_id, chunks)?;
            reindexed += 1;
        }
        Ok(reindexed)
    }

    /// Cancels every pending debounce timer. Jobs already running are left
    /// to finish; this only stops ones that hadn't fired yet.
    pub fn shutdown(&self) {
        for entry in self.pending.iter() {
            entry.value().cancel();
        }
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::{EmbeddingClient, EmbeddingRole};
    use crate::vectorindex::VectorIndex;
    use async_trait::async_trait;
    use tempfile::tempdir;

    struct StubClient;

    #[async_trait]
    impl EmbeddingClient for StubClient {
        async fn embed(&self, text: &str, _role: EmbeddingRole) -> Result<Vec<f32>> {
            Ok(vec![text.len() as f32 % 7.0; 4])
        }

        fn dimensions(&self) -> usize {
            4
        }

        fn provider_name(&self) -> &str {
            "stub"
        }

        fn model_name(&self) -> &str {
            "stub-test-model"
        }
    }

    fn make_indexer() -> (Arc<ContainerIndexer>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let metadata = Arc::new(crate::metadata::MetadataStore::open_in_memory().unwrap());
        let vectors = Arc::new(VectorIndex::open(&dir.path().join("vectors.idx"), 4).unwrap());
        let store = Arc::new(HybridStore::new(metadata.clone(), vectors));
        let resolver = Arc::new(ContainerResolver::new(metadata));
        let embeddings = Arc::new(crate::embed::EmbeddingService::new(Arc::new(StubClient), 4));
        let indexer = Arc::new(ContainerIndexer::new(
            resolver,
            store,
            embeddings,
            Duration::from_millis(20),
        ));
        (indexer, dir)
    }

    #[tokio::test]
    async fn scheduled_job_indexes_after_debounce() {
        let (indexer, _dir) = make_indexer();
        let location = Location::new("overworld", 0, 64, 0);
        let items = vec![ItemStack {
            slot: 0,
            material_id: "minecraft:diamond".to_string(),
            display_name: None,
            count: 5,
            container_path: Vec::new(),
        }];

        indexer.schedule_index(vec![location.clone()], items).unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;

        let stats = indexer.store.stats().unwrap();
        assert_eq!(stats.chunk_count, 1);
    }

    #[tokio::test]
    async fn rescheduling_before_fire_coalesces_into_one_job() {
        let (indexer, _dir) = make_indexer();
        let location = Location::new("overworld", 0, 64, 0);

        for count in 1..=3 {
            let items = vec![ItemStack {
                slot: 0,
                material_id: "minecraft:diamond".to_string(),
                display_name: None,
                count,
                container_path: Vec::new(),
            }];
            indexer.schedule_index(vec![location.clone()], items).unwrap();
        }
        tokio::time::sleep(Duration::from_millis(60)).await;

        let stats = indexer.store.stats().unwrap();
        assert_eq!(stats.chunk_count, 1);
    }

    #[tokio::test]
    async fn single_to_double_chest_transition_still_coalesces() {
        let (indexer, _dir) = make_indexer();
        let a = Location::new("overworld", 0, 64, 0);
        let b = Location::new("overworld", 1, 64, 0);
        let item = |count| ItemStack {
            slot: 0,
            material_id: "minecraft:diamond".to_string(),
            display_name: None,
            count,
            container_path: Vec::new(),
        };

        indexer.schedule_index(vec![a.clone()], vec![item(1)]).unwrap();
        // A neighbour appears before the first timer fires: the reported
        // location set grows, but it's still the same logical container.
        indexer.schedule_index(vec![a.clone(), b.clone()], vec![item(2)]).unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;

        let stats = indexer.store.stats().unwrap();
        assert_eq!(stats.chunk_count, 1, "rapid single->double transition must still coalesce into one job");
    }
}
