//! Central constants for container-search configuration
//!
//! All string literals for paths, filenames, and configuration should be defined here
//! to avoid duplication and ensure consistency across the codebase.

use std::sync::atomic::{AtomicBool, Ordering};

/// Global shutdown flag, set by the CTRL-C handler.
///
/// Indexing jobs run on a bounded worker pool and this flag must be visible
/// from any thread without async polling, so a plain `AtomicBool` sits
/// alongside the `CancellationToken` passed through the engine.
pub static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Check whether a graceful shutdown has been requested (CTRL-C).
#[inline]
pub fn is_shutdown_requested() -> bool {
    SHUTDOWN_REQUESTED.load(Ordering::SeqCst)
}

/// Check whether a graceful shutdown has been requested via either
/// the global AtomicBool (OS signal) or a CancellationToken.
#[inline]
pub fn check_shutdown(cancel_token: &tokio_util::sync::CancellationToken) -> bool {
    is_shutdown_requested() || cancel_token.is_cancelled()
}

/// Name of the SQLite metadata database file within a data directory.
pub const METADATA_DB_NAME: &str = "metadata.db";

/// Name of the on-disk ANN graph directory (LMDB environment) within a data directory.
pub const VECTOR_INDEX_DIR_NAME: &str = "vectors.idx";

/// Name of the provider fingerprint properties file within a data directory.
pub const PROVIDER_FINGERPRINT_FILE: &str = "provider_metadata.properties";

/// Lock file name indicating an active writer instance.
/// Prevents two processes from opening the same data directory read-write.
pub const WRITER_LOCK_FILE: &str = ".writer.lock";

/// Log directory name within the data directory.
pub const LOG_DIR_NAME: &str = "logs";

/// Default log file name.
pub const LOG_FILE_NAME: &str = "container-search.log";

/// Default number of log files to retain.
pub const DEFAULT_LOG_MAX_FILES: usize = 5;

/// Default LMDB map size in megabytes for the vector index.
///
/// This is the maximum virtual address space reserved for the memory-mapped
/// database; on Linux/macOS this is just an address space reservation (no
/// physical RAM until data is written).
pub const DEFAULT_LMDB_MAP_SIZE_MB: usize = 256;

/// Maximum LMDB map size in megabytes (4096MB), the hard upper limit for
/// auto-resizing when MDB_MAP_FULL errors occur.
pub const MAX_LMDB_MAP_SIZE_MB: usize = 4096;

/// Default embedding cache memory limit in MB (in-memory Moka cache).
pub const DEFAULT_CACHE_MAX_MEMORY_MB: usize = 64;

/// Default debounce window for container indexing jobs, in milliseconds.
pub const DEFAULT_DEBOUNCE_MS: u64 = 1500;

/// Default number of search results returned by `find` when the caller
/// does not specify a limit.
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

/// Default similarity threshold (persisted on first run, then mutable).
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.75;

/// Default hybrid rerank weight for the semantic term (`alpha` in
/// `final = alpha * semantic + (1 - alpha) * keyword`).
pub const DEFAULT_RERANK_ALPHA: f32 = 0.75;

/// Oversampling factor applied to `limit` before rerank/threshold gating.
pub const ANN_OVERSAMPLE_FACTOR: usize = 3;

/// ANN graph out-degree (arroy tree forest; the teacher's flat/forest index
/// is reused rather than a true hierarchical HNSW, so this tunes tree count
/// indirectly through `search_k` rather than a literal `M` parameter).
pub const ANN_GRAPH_M: usize = 16;

/// Construction beam width, kept for documentation of the intended ANN
/// quality/latency trade-off even though arroy's forest builder does not
/// expose this knob directly.
pub const ANN_EF_CONSTRUCTION: usize = 100;

/// Preview length (characters) before truncation with an ellipsis.
pub const PREVIEW_LENGTH: usize = 100;
