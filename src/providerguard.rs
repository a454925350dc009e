//! C7 — ProviderGuard: the fingerprint check that keeps a provider/model
//! switch from silently corrupting search results. The mismatch flag lives
//! on this struct, not behind a process-wide static — callers hold an
//! explicit engine handle, and the flag is part of it.

use crate::constants::PROVIDER_FINGERPRINT_FILE;
use crate::errors::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Fingerprint {
    provider: String,
    model: String,
}

pub struct ProviderGuard {
    fingerprint_path: PathBuf,
    mismatch: AtomicBool,
}

impl ProviderGuard {
    /// Loads the persisted fingerprint, comparing it against the
    /// currently configured `(provider, model)`. If none is persisted yet,
    /// the current one is saved and no mismatch is raised.
    pub fn load(data_dir: &Path, provider: &str, model: &str) -> Result<Self> {
        let fingerprint_path = data_dir.join(PROVIDER_FINGERPRINT_FILE);
        let current = Fingerprint {
            provider: provider.to_string(),
            model: model.to_string(),
        };

        let mismatch = match read_fingerprint(&fingerprint_path)? {
            Some(persisted) if persisted != current => true,
            Some(_) => false,
            None => {
                write_fingerprint(&fingerprint_path, &current)?;
                false
            }
        };

        Ok(Self {
            fingerprint_path,
            mismatch: AtomicBool::new(mismatch),
        })
    }

    pub fn is_mismatched(&self) -> bool {
        self.mismatch.load(Ordering::SeqCst)
    }

    /// Returns `Err(EngineError::ProviderMismatch)` if the guard has
    /// tripped; callers place this at the top of every indexing and
    /// search entry point.
    pub fn check(&self) -> Result<()> {
        if self.is_mismatched() {
            return Err(EngineError::ProviderMismatch);
        }
        Ok(())
    }

    /// Deletes the fingerprint file, saves the newly configured one, and
    /// clears the mismatch flag. Truncating C1/C2 is the caller's (the
    /// engine's) responsibility since this guard doesn't hold store handles.
    pub fn purge(&self, provider: &str, model: &str) -> Result<()> {
        if self.fingerprint_path.exists() {
            std::fs::remove_file(&self.fingerprint_path)?;
        }
        write_fingerprint(
            &self.fingerprint_path,
            &Fingerprint {
                provider: provider.to_string(),
                model: model.to_string(),
            },
        )?;
        self.mismatch.store(false, Ordering::SeqCst);
        Ok(())
    }
}

fn read_fingerprint(path: &Path) -> Result<Option<Fingerprint>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path)?;
    let mut provider = None;
    let mut model = None;
    for line in contents.lines() {
        if let Some((key, value)) = line.split_once('=') {
            match key.trim() {
                "provider" => provider = Some(value.trim().to_string()),
                "model" => model = Some(value.trim().to_string()),
                _ => {}
            }
        }
    }
    match (provider, model) {
        (Some(provider), Some(model)) => Ok(Some(Fingerprint { provider, model })),
        _ => Ok(None),
    }
}

fn write_fingerprint(path: &Path, fingerprint: &Fingerprint) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let contents = format!(
        "provider={}\nmodel={}\n",
        fingerprint.provider, fingerprint.model
    );
    std::fs::write(path, contents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn first_run_saves_fingerprint_without_mismatch() {
        let dir = tempdir().unwrap();
        let guard = ProviderGuard::load(dir.path(), "local", "all-MiniLM-L6-v2").unwrap();
        assert!(!guard.is_mismatched());
        assert!(dir.path().join(PROVIDER_FINGERPRINT_FILE).exists());
    }

    #[test]
    fn changed_provider_trips_mismatch() {
        let dir = tempdir().unwrap();
        ProviderGuard::load(dir.path(), "openai", "text-embedding-3-small").unwrap();

        let guard = ProviderGuard::load(dir.path(), "local", "all-MiniLM-L6-v2").unwrap();
        assert!(guard.is_mismatched());
        assert!(matches!(guard.check(), Err(EngineError::ProviderMismatch)));
    }

    #[test]
    fn purge_clears_mismatch_and_rewrites_fingerprint() {
        let dir = tempdir().unwrap();
        ProviderGuard::load(dir.path(), "openai", "text-embedding-3-small").unwrap();
        let guard = ProviderGuard::load(dir.path(), "local", "all-MiniLM-L6-v2").unwrap();
        assert!(guard.is_mismatched());

        guard.purge("local", "all-MiniLM-L6-v2").unwrap();
        assert!(!guard.is_mismatched());
        assert!(guard.check().is_ok());
    }
}
