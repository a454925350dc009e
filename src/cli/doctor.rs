//! Doctor command - diagnose data directory health

use crate::config::Config;
use crate::constants::{METADATA_DB_NAME, PROVIDER_FINGERPRINT_FILE, VECTOR_INDEX_DIR_NAME};
use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl CheckResult {
    pub fn pass(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Pass,
            message: message.into(),
            details: None,
            hint: None,
        }
    }

    pub fn warn(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Warn,
            message: message.into(),
            details: None,
            hint: None,
        }
    }

    pub fn fail(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Fail,
            message: message.into(),
            details: None,
            hint: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

fn check_data_dir_exists(data_dir: &Path) -> CheckResult {
    if data_dir.exists() {
        CheckResult::pass(
            "Data directory",
            format!("Found at {}", data_dir.display()),
        )
    } else {
        CheckResult::fail(
            "Data directory",
            format!("Not found at {}", data_dir.display()),
        )
        .with_hint("Index a container to create the data directory")
    }
}

fn check_metadata_db(data_dir: &Path) -> CheckResult {
    let path = data_dir.join(METADATA_DB_NAME);
    if !path.exists() {
        return CheckResult::fail("Metadata store", "metadata.db is missing")
            .with_hint("Index a container to create it");
    }
    match crate::metadata::MetadataStore::open(&path, crate::constants::DEFAULT_SIMILARITY_THRESHOLD) {
        Ok(store) => match store.chunk_count() {
            Ok(count) => CheckResult::pass("Metadata store", format!("{count} chunks on record")),
            Err(e) => CheckResult::fail("Metadata store", format!("query failed: {e}")),
        },
        Err(e) => CheckResult::fail("Metadata store", format!("failed to open: {e}")),
    }
}

fn check_vector_index(data_dir: &Path, dimensions: usize) -> CheckResult {
    let path = data_dir.join(VECTOR_INDEX_DIR_NAME);
    if !path.exists() {
        return CheckResult::fail("Vector index", "vectors.idx is missing")
            .with_hint("Index a container to create it");
    }
    match crate::vectorindex::VectorIndex::open(&path, dimensions) {
        Ok(index) => match index.live_count() {
            Ok(live) => {
                if index.is_dirty() {
                    CheckResult::warn("Vector index", "index has pending deletes")
                        .with_hint("A rebuild runs automatically on the next search")
                } else {
                    CheckResult::pass("Vector index", format!("{live} live vectors"))
                }
            }
            Err(e) => CheckResult::fail("Vector index", format!("failed to count vectors: {e}")),
        },
        Err(e) => CheckResult::fail("Vector index", format!("failed to open: {e}")),
    }
}

fn check_ordinal_consistency(data_dir: &Path, dimensions: usize) -> CheckResult {
    let metadata = match crate::metadata::MetadataStore::open(
        &data_dir.join(METADATA_DB_NAME),
        crate::constants::DEFAULT_SIMILARITY_THRESHOLD,
    ) {
        Ok(m) => m,
        Err(_) => return CheckResult::warn("Ordinal integrity", "metadata store unavailable"),
    };
    let vectors =
        match crate::vectorindex::VectorIndex::open(&data_dir.join(VECTOR_INDEX_DIR_NAME), dimensions) {
            Ok(v) => v,
            Err(_) => return CheckResult::warn("Ordinal integrity", "vector index unavailable"),
        };

    let live_metadata_ordinals = metadata.all_ordinals().unwrap_or_default();
    let live_vector_count = match vectors.live_count() {
        Ok(count) => count,
        Err(e) => return CheckResult::warn("Ordinal integrity", format!("vector count failed: {e}")),
    };

    if live_metadata_ordinals.len() == live_vector_count {
        CheckResult::pass(
            "Ordinal integrity",
            format!("{} ordinals agree between stores", live_vector_count),
        )
    } else {
        CheckResult::warn(
            "Ordinal integrity",
            format!(
                "metadata has {} live ordinals, vector index reports {}",
                live_metadata_ordinals.len(),
                live_vector_count
            ),
        )
        .with_hint("Self-heals on the next rebuild if caused by an interrupted shutdown")
    }
}

fn check_provider_fingerprint(data_dir: &Path, config: &Config) -> CheckResult {
    let path = data_dir.join(PROVIDER_FINGERPRINT_FILE);
    if !path.exists() {
        return CheckResult::warn(
            "Provider fingerprint",
            "no fingerprint saved yet (first run will create one)",
        );
    }
    match crate::providerguard::ProviderGuard::load(
        data_dir,
        &config.embedding.provider,
        &config.embedding.model,
    ) {
        Ok(guard) if guard.is_mismatched() => CheckResult::fail(
            "Provider fingerprint",
            "configured provider/model differs from the one indexed data was built with",
        )
        .with_hint("Run 'admin purge' before indexing or searching again"),
        Ok(_) => CheckResult::pass("Provider fingerprint", "matches configured provider/model"),
        Err(e) => CheckResult::fail("Provider fingerprint", format!("failed to read: {e}")),
    }
}

fn check_threshold_sane(data_dir: &Path) -> CheckResult {
    match crate::metadata::MetadataStore::open(
        &data_dir.join(METADATA_DB_NAME),
        crate::constants::DEFAULT_SIMILARITY_THRESHOLD,
    ) {
        Ok(store) => match store.get_threshold() {
            Ok(t) if (0.0..=1.0).contains(&t) => {
                CheckResult::pass("Similarity threshold", format!("{t:.2}"))
            }
            Ok(t) => CheckResult::fail("Similarity threshold", format!("out of range: {t}")),
            Err(e) => CheckResult::fail("Similarity threshold", format!("query failed: {e}")),
        },
        Err(_) => CheckResult::warn("Similarity threshold", "metadata store unavailable"),
    }
}

pub async fn run(config: &Config, json: bool) -> Result<()> {
    let data_dir = if config.storage.data_dir.is_absolute() {
        config.storage.data_dir.clone()
    } else {
        dirs::home_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(&config.storage.data_dir)
    };

    let mut results = vec![check_data_dir_exists(&data_dir)];

    if data_dir.exists() {
        results.push(check_metadata_db(&data_dir));
        results.push(check_vector_index(&data_dir, config.embedding.dimension));
        results.push(check_ordinal_consistency(&data_dir, config.embedding.dimension));
        results.push(check_provider_fingerprint(&data_dir, config));
        results.push(check_threshold_sane(&data_dir));
    }

    print_results(&results, json);

    let warnings = results.iter().filter(|r| r.status == CheckStatus::Warn).count();
    let errors = results.iter().filter(|r| r.status == CheckStatus::Fail).count();

    if json {
        let output = serde_json::json!({
            "checks": results,
            "summary": { "warnings": warnings, "errors": errors },
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!();
        println!("{}", "Summary".bold());
        println!("{}", "=".repeat(60));
        println!("  {} warnings, {} errors", warnings, errors);
    }

    if errors > 0 {
        anyhow::bail!("doctor found {} error(s)", errors);
    }

    Ok(())
}

fn print_results(results: &[CheckResult], json: bool) {
    if json {
        return;
    }

    println!("{}", "Container Search Doctor".bold());
    println!("{}", "=".repeat(60));

    for result in results {
        let icon = match result.status {
            CheckStatus::Pass => "ok".green(),
            CheckStatus::Warn => "warn".yellow(),
            CheckStatus::Fail => "fail".red(),
        };

        println!("  [{}] {}: {}", icon, result.name, result.message);

        if let Some(details) = &result.details {
            println!("    {}", details.dimmed());
        }

        if let Some(hint) = &result.hint {
            println!("    {}", hint.bright_cyan());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_data_dir_fails() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        let result = check_data_dir_exists(&missing);
        assert_eq!(result.status, CheckStatus::Fail);
    }

    #[test]
    fn present_data_dir_passes() {
        let dir = tempdir().unwrap();
        let result = check_data_dir_exists(dir.path());
        assert_eq!(result.status, CheckStatus::Pass);
    }

    #[test]
    fn missing_metadata_db_fails() {
        let dir = tempdir().unwrap();
        let result = check_metadata_db(dir.path());
        assert_eq!(result.status, CheckStatus::Fail);
    }
}
