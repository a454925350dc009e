//! The engine: wires C1-C8 together behind one handle. Holds the
//! provider-guard mismatch flag and the resolved configuration as explicit
//! fields rather than ambient singletons, per the concurrency model's
//! "monotonic boolean set once per process until purge" — here that
//! process scope is this struct's lifetime, not a global static.

use crate::config::Config;
use crate::constants::{METADATA_DB_NAME, VECTOR_INDEX_DIR_NAME, WRITER_LOCK_FILE};
use crate::embed::{EmbeddingClient, EmbeddingService, LocalHashEmbedder};
use crate::errors::{EngineError, Result};
use crate::hybridstore::HybridStore;
use crate::indexer::{ContainerIndexer, ItemStack, TagProvider};
use crate::metadata::{ChunkRow, Location, MetadataStore};
use crate::providerguard::ProviderGuard;
use crate::query::{QueryPipeline, SearchResult};
use crate::resolver::ContainerResolver;
use crate::vectorindex::VectorIndex;
use fs2::FileExt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub struct AdminStats {
    pub chunk_count: i64,
    pub backend_name: &'static str,
    pub cache_entries: u64,
    pub query_cache_entries: u64,
}

pub struct Engine {
    data_dir: PathBuf,
    config: Config,
    store: Arc<HybridStore>,
    embeddings: Arc<EmbeddingService>,
    provider_guard: Arc<ProviderGuard>,
    indexer: Arc<ContainerIndexer>,
    query_pipeline: QueryPipeline,
    // Held for the engine's lifetime; dropping it releases the exclusive
    // lock. Never read after acquisition, its presence is the invariant.
    _writer_lock: File,
}

impl Engine {
    pub fn open(config: Config) -> Result<Self> {
        Self::open_with(config, None, Vec::new())
    }

    /// Opens the engine, optionally overriding the embedding backend (used
    /// by tests and by CLI wiring once a real remote client is configured)
    /// and registering tag providers up front — providers must be known
    /// before the indexer is built since `ContainerIndexer` has no
    /// interior mutability for its provider list.
    pub fn open_with(
        config: Config,
        client: Option<Arc<dyn EmbeddingClient>>,
        tag_providers: Vec<TagProvider>,
    ) -> Result<Self> {
        let data_dir = resolve_data_dir(&config)?;
        std::fs::create_dir_all(&data_dir)?;

        let writer_lock = acquire_writer_lock(&data_dir)?;

        let metadata = Arc::new(MetadataStore::open(
            &data_dir.join(METADATA_DB_NAME),
            config.search.threshold,
        )?);
        let vectors = Arc::new(VectorIndex::open(
            &data_dir.join(VECTOR_INDEX_DIR_NAME),
            config.embedding.dimension,
        )?);
        let store = Arc::new(HybridStore::new(metadata.clone(), vectors));
        let resolver = Arc::new(ContainerResolver::new(metadata));

        let client = client.unwrap_or_else(|| {
            Arc::new(LocalHashEmbedder::new(
                config.embedding.dimension,
                config.embedding.model.clone(),
            ))
        });
        let embeddings = Arc::new(EmbeddingService::new(
            client,
            config.storage.cache_max_memory_mb,
        ));

        let provider_guard = Arc::new(ProviderGuard::load(
            &data_dir,
            &config.embedding.provider,
            &config.embedding.model,
        )?);

        let mut indexer = ContainerIndexer::new(
            resolver,
            store.clone(),
            embeddings.clone(),
            Duration::from_millis(config.indexing.debounce_delay_ms),
        );
        for provider in tag_providers {
            indexer.register_tag_provider(provider);
        }
        let indexer = Arc::new(indexer);

        let query_pipeline = QueryPipeline::new(
            store.clone(),
            embeddings.clone(),
            config.search.rerank_alpha,
        );

        Ok(Self {
            data_dir,
            config,
            store,
            embeddings,
            provider_guard,
            indexer,
            query_pipeline,
            _writer_lock: writer_lock,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn schedule_index(&self, locations: Vec<Location>, items: Vec<ItemStack>) -> Result<()> {
        self.provider_guard.check()?;
        self.indexer.schedule_index(locations, items)
    }

    pub async fn find(
        &self,
        query: &str,
        limit: usize,
        near: Option<(Location, f64)>,
    ) -> Result<Vec<SearchResult>> {
        self.provider_guard.check()?;
        let results = self.query_pipeline.search(query, limit, near).await?;
        let now = chrono::Utc::now().timestamp();
        if let Err(e) = self.store.metadata().record_query(query, results.len() as i64, now) {
            tracing::warn!("failed to record query history: {e}");
        }
        Ok(results)
    }

    pub fn recent_queries(&self, limit: usize) -> Result<Vec<crate::metadata::HistoryEntry>> {
        self.store.metadata().recent_queries(limit)
    }

    pub fn clear_history(&self) -> Result<()> {
        self.store.metadata().clear_history()
    }

    pub async fn reindex_radius(&self, center: &Location, radius: f64) -> Result<usize> {
        self.provider_guard.check()?;
        self.indexer.reindex_radius(center, radius).await
    }

    pub fn container_at(&self, location: &Location) -> Result<Vec<ChunkRow>> {
        if let Some(container_id) = self.store.metadata().container_by_location(location)? {
            self.store.metadata().chunks_for_container(&container_id)
        } else {
            Ok(Vec::new())
        }
    }

    pub fn delete_at(&self, location: &Location) -> Result<()> {
        self.store.delete_by_location(location)
    }

    pub fn stats(&self) -> Result<AdminStats> {
        let store_stats = self.store.stats()?;
        let cache_stats = self.embeddings.cache_stats();
        let query_cache_stats = self.embeddings.query_cache_stats();
        Ok(AdminStats {
            chunk_count: store_stats.chunk_count,
            backend_name: store_stats.backend_name,
            cache_entries: cache_stats.entry_count,
            query_cache_entries: query_cache_stats.entry_count,
        })
    }

    pub fn get_threshold(&self) -> Result<f32> {
        self.store.get_threshold()
    }

    pub fn set_threshold(&self, threshold: f32) -> Result<()> {
        self.store.set_threshold(threshold)
    }

    pub fn is_provider_mismatched(&self) -> bool {
        self.provider_guard.is_mismatched()
    }

    /// Truncates C1/C2, rewrites the provider fingerprint, and clears the
    /// mismatch flag. Required before any further indexing or search once
    /// the guard has tripped.
    pub fn purge(&self) -> Result<()> {
        self.store.purge_all()?;
        self.provider_guard
            .purge(&self.config.embedding.provider, &self.config.embedding.model)
    }

    /// Cancels pending debounce timers and flushes the ordinal compaction
    /// before process exit.
    pub fn shutdown(&self) -> Result<()> {
        self.indexer.shutdown();
        self.store.shutdown()
    }

    pub fn store(&self) -> &Arc<HybridStore> {
        &self.store
    }
}

/// Takes an exclusive, non-blocking lock on `data_dir/.writer.lock`,
/// enforcing the single-writer invariant over `metadata.db` and
/// `vectors.idx`. A second process opening the same data directory gets a
/// `StorageTransient` error rather than silently corrupting the R-tree or
/// the ANN graph underneath the first.
fn acquire_writer_lock(data_dir: &Path) -> Result<File> {
    let path = data_dir.join(WRITER_LOCK_FILE);
    let file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .open(&path)?;
    file.try_lock_exclusive().map_err(|_| {
        EngineError::StorageTransient(format!(
            "another process already holds the write lock at {}",
            path.display()
        ))
    })?;
    Ok(file)
}

fn resolve_data_dir(config: &Config) -> Result<PathBuf> {
    if config.storage.data_dir.is_absolute() {
        return Ok(config.storage.data_dir.clone());
    }
    let home = dirs::home_dir().unwrap_or_else(std::env::temp_dir);
    Ok(home.join(&config.storage.data_dir))
}
