//! Test helpers for end-to-end container-search scenarios: a temp data
//! directory plus a pre-wired `Engine` using the deterministic hash
//! embedder, so tests exercise the real indexing/search pipeline without
//! a network dependency.

use container_search::config::Config;
use container_search::embed::{EmbeddingClient, LocalHashEmbedder};
use container_search::engine::Engine;
use container_search::indexer::{ContainerPathNode, ItemStack};
use container_search::metadata::Location;
use std::sync::Arc;
use tempfile::TempDir;

pub const TEST_DIMENSIONS: usize = 32;

/// A temp-backed engine using the local hash embedder, torn down with the
/// `TempDir` it owns.
pub struct TestEngine {
    pub engine: Engine,
    _dir: TempDir,
}

impl TestEngine {
    pub fn new() -> anyhow::Result<Self> {
        Self::with_provider("local", "test-hash-model")
    }

    pub fn with_provider(provider: &str, model: &str) -> anyhow::Result<Self> {
        let dir = tempfile::tempdir()?;
        let mut config = Config::default();
        config.embedding.provider = provider.to_string();
        config.embedding.model = model.to_string();
        config.embedding.dimension = TEST_DIMENSIONS;
        config.storage.data_dir = dir.path().to_path_buf();
        config.indexing.debounce_delay_ms = 20;

        let client: Arc<dyn EmbeddingClient> = Arc::new(LocalHashEmbedder::new(TEST_DIMENSIONS, model));
        let engine = Engine::open_with(config, Some(client), Vec::new())?;
        Ok(Self { engine, _dir: dir })
    }
}

/// A single-item stack at the container's root (empty `container_path`).
pub fn root_item(slot: i64, material_id: &str, display_name: Option<&str>) -> ItemStack {
    ItemStack {
        slot,
        material_id: material_id.to_string(),
        display_name: display_name.map(str::to_string),
        count: 1,
        container_path: Vec::new(),
    }
}

pub fn shulker_item(slot: i64, material_id: &str, display_name: Option<&str>, shulker_slot: i64) -> ItemStack {
    ItemStack {
        slot,
        material_id: material_id.to_string(),
        display_name: display_name.map(str::to_string),
        count: 1,
        container_path: vec![ContainerPathNode {
            kind: "shulker_box".to_string(),
            slot: shulker_slot,
            color: None,
            name: None,
        }],
    }
}

pub fn location(x: i64, y: i64, z: i64) -> Location {
    Location::new("overworld", x, y, z)
}

/// Schedules indexing and waits past the debounce window for the job to
/// complete, since `schedule_index` only arms a timer.
pub async fn index_and_wait(
    engine: &Engine,
    locations: Vec<Location>,
    items: Vec<ItemStack>,
) -> anyhow::Result<()> {
    engine.schedule_index(locations, items)?;
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    Ok(())
}
