//! Caching layers behind [`super::EmbeddingService`]: an in-memory
//! content-hash cache for chunk embeddings, a small in-memory cache for
//! query strings, and an LMDB-backed persistent cache keyed by content
//! hash so a restart (or a purge-free redeploy under the same provider)
//! doesn't re-pay for embeddings it already computed.

use crate::constants::DEFAULT_CACHE_MAX_MEMORY_MB;
use crate::errors::Result;
use heed::types::{SerdeBincode, Str};
use heed::{Database, Env, EnvOpenOptions};
use moka::sync::Cache;
use std::path::PathBuf;

const QUERY_CACHE_MAX_ENTRIES: u64 = 512;
const PERSISTENT_MAP_SIZE_MB: usize = 512;

/// Rough per-entry cost estimate used to translate a memory budget into a
/// moka entry-weight.
fn estimate_weight(embedding: &[f32]) -> u32 {
    (embedding.len() * std::mem::size_of::<f32>()) as u32
}

pub struct CacheStats {
    pub entry_count: u64,
    pub weighted_size: u64,
}

pub struct QueryCacheStats {
    pub entry_count: u64,
}

pub struct ChunkEmbeddingCache {
    cache: Cache<String, Vec<f32>>,
}

impl ChunkEmbeddingCache {
    pub fn with_memory_limit_mb(mb: usize) -> Self {
        let mb = if mb == 0 { DEFAULT_CACHE_MAX_MEMORY_MB } else { mb };
        let cache = Cache::builder()
            .max_capacity((mb as u64) * 1024 * 1024)
            .weigher(|_key: &String, value: &Vec<f32>| estimate_weight(value))
            .build();
        Self { cache }
    }

    pub fn get(&self, hash: &str) -> Option<Vec<f32>> {
        self.cache.get(hash)
    }

    pub fn put(&self, hash: String, embedding: Vec<f32>) {
        self.cache.insert(hash, embedding);
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.run_pending_tasks();
        CacheStats {
            entry_count: self.cache.entry_count(),
            weighted_size: self.cache.weighted_size(),
        }
    }
}

pub struct QueryCache {
    cache: Cache<String, Vec<f32>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self {
            cache: Cache::builder().max_capacity(QUERY_CACHE_MAX_ENTRIES).build(),
        }
    }

    pub fn get(&self, query: &str) -> Option<Vec<f32>> {
        self.cache.get(query)
    }

    pub fn put(&self, query: &str, embedding: Vec<f32>) {
        self.cache.insert(query.to_string(), embedding);
    }

    pub fn stats(&self) -> QueryCacheStats {
        self.cache.run_pending_tasks();
        QueryCacheStats {
            entry_count: self.cache.entry_count(),
        }
    }
}

pub struct PersistentCacheStats {
    pub entry_count: u64,
}

/// Disk-backed cache, one LMDB environment per embedding model so a
/// provider change never reads stale vectors from a different model's
/// cache.
pub struct PersistentEmbeddingCache {
    env: Env,
    db: Database<Str, SerdeBincode<Vec<f32>>>,
}

impl PersistentEmbeddingCache {
    pub fn open(model_name: &str) -> Result<Self> {
        let dir = cache_dir_for(model_name)?;
        std::fs::create_dir_all(&dir)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(PERSISTENT_MAP_SIZE_MB * 1024 * 1024)
                .max_dbs(1)
                .open(&dir)?
        };
        let mut wtxn = env.write_txn()?;
        let db = env.create_database(&mut wtxn, Some("embeddings"))?;
        wtxn.commit()?;

        Ok(Self { env, db })
    }

    pub fn get(&self, hash: &str) -> Result<Option<Vec<f32>>> {
        let rtxn = self.env.read_txn()?;
        Ok(self.db.get(&rtxn, hash)?)
    }

    pub fn put_batch(&self, entries: &[(&str, &[f32])]) -> Result<()> {
        let mut wtxn = self.env.write_txn()?;
        for (hash, embedding) in entries {
            self.db.put(&mut wtxn, hash, &embedding.to_vec())?;
        }
        wtxn.commit()?;
        Ok(())
    }

    pub fn stats(&self) -> Result<PersistentCacheStats> {
        let rtxn = self.env.read_txn()?;
        let entry_count = self.db.len(&rtxn)?;
        Ok(PersistentCacheStats { entry_count })
    }
}

fn cache_dir_for(model_name: &str) -> Result<PathBuf> {
    let base = dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("container-search")
        .join("embeddings");
    let safe_name: String = model_name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    Ok(base.join(safe_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn chunk_cache_roundtrip() {
        let cache = ChunkEmbeddingCache::with_memory_limit_mb(4);
        cache.put("abc".to_string(), vec![1.0, 2.0, 3.0]);
        assert_eq!(cache.get("abc"), Some(vec![1.0, 2.0, 3.0]));
        assert_eq!(cache.get("missing"), None);
    }

    #[test]
    fn query_cache_roundtrip() {
        let cache = QueryCache::new();
        cache.put("diamond pickaxe", vec![0.1, 0.2]);
        assert_eq!(cache.get("diamond pickaxe"), Some(vec![0.1, 0.2]));
    }

    #[test]
    fn persistent_cache_survives_reopen() {
        let dir = tempdir().unwrap();
        std::env::set_var("XDG_CACHE_HOME", dir.path());

        let cache = PersistentEmbeddingCache::open("test-model-1").unwrap();
        cache.put_batch(&[("hash-a", &[1.0, 2.0, 3.0])]).unwrap();
        drop(cache);

        let reopened = PersistentEmbeddingCache::open("test-model-1").unwrap();
        assert_eq!(reopened.get("hash-a").unwrap(), Some(vec![1.0, 2.0, 3.0]));
    }
}
