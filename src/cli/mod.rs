//! CLI surface: `find`, `admin`, `history`, `doctor` — the external
//! interfaces §6 describes beyond the game-host event hooks.

pub mod doctor;

use crate::config::Config;
use crate::engine::Engine;
use crate::errors::EngineError;
use crate::indexer::ContainerPathNode;
use crate::metadata::Location;
use crate::output::set_quiet;
use crate::warn_print;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "container-search", version, about = "Semantic search over nearby storage containers")]
pub struct Cli {
    /// Path to a TOML config file; defaults are used if omitted.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Suppress informational output on stderr.
    #[arg(long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Search nearby (or all) containers for a natural-language query.
    Find {
        query: String,
        /// Restrict to containers within this radius of x,y,z (requires --world/--x/--y/--z).
        #[arg(long)]
        radius: Option<f64>,
        #[arg(long)]
        world: Option<String>,
        #[arg(long, allow_hyphen_values = true)]
        x: Option<i64>,
        #[arg(long, allow_hyphen_values = true)]
        y: Option<i64>,
        #[arg(long, allow_hyphen_values = true)]
        z: Option<i64>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Administrative operations over the index.
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Inspect or clear the local query history.
    History {
        #[command(subcommand)]
        action: Option<HistoryAction>,
        /// Shorthand for `history show --limit N`.
        limit: Option<usize>,
    },
    /// Diagnose data directory health.
    Doctor {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum AdminAction {
    /// Re-read the configuration file (does not touch persistent data).
    Reload,
    /// Print index statistics.
    Stats,
    /// Re-embed all containers within radius of a point.
    Reindex {
        radius: f64,
        #[arg(long)]
        world: String,
        #[arg(long, allow_hyphen_values = true)]
        x: i64,
        #[arg(long, allow_hyphen_values = true)]
        y: i64,
        #[arg(long, allow_hyphen_values = true)]
        z: i64,
    },
    /// Truncate all index data and clear the provider-mismatch flag.
    Purge,
    /// Get or set the similarity threshold used by the threshold gate.
    Threshold { value: Option<f32> },
}

#[derive(Subcommand)]
pub enum HistoryAction {
    Show {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    Clear,
    /// Alias for `show` with no limit narrowing — this crate doesn't
    /// scope history per player, so "global" is the only view.
    Global,
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    set_quiet(cli.quiet);

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    match cli.command {
        Command::Find { query, radius, world, x, y, z, limit } => {
            run_find(config, query, radius, world, x, y, z, limit).await
        }
        Command::Admin { action } => run_admin(config, action).await,
        Command::History { action, limit } => run_history(config, action, limit),
        Command::Doctor { json } => doctor::run(&config, json).await,
    }
}

/// Builds the optional spatial window from CLI args. `--radius` is
/// optional once `--world`/`--x`/`--y`/`--z` are given: it falls back to
/// `config.search.radius`, the configured default/max radius.
fn near_from_args(
    radius: Option<f64>,
    world: Option<String>,
    x: Option<i64>,
    y: Option<i64>,
    z: Option<i64>,
    default_radius: f64,
) -> anyhow::Result<Option<(Location, f64)>> {
    match (world, x, y, z) {
        (Some(world), Some(x), Some(y), Some(z)) => {
            let radius = radius.unwrap_or(default_radius);
            if radius <= 0.0 {
                anyhow::bail!("radius must be positive");
            }
            Ok(Some((Location::new(world, x, y, z), radius)))
        }
        (None, None, None, None) => {
            if radius.is_some() {
                anyhow::bail!("--radius requires --world, --x, --y and --z together");
            }
            Ok(None)
        }
        _ => anyhow::bail!("--radius requires --world, --x, --y and --z together"),
    }
}

async fn run_find(
    config: Config,
    query: String,
    radius: Option<f64>,
    world: Option<String>,
    x: Option<i64>,
    y: Option<i64>,
    z: Option<i64>,
    limit: Option<usize>,
) -> anyhow::Result<()> {
    if query.trim().is_empty() {
        anyhow::bail!("query must not be empty");
    }
    let near = near_from_args(radius, world, x, y, z, config.search.radius)?;
    let limit = limit.unwrap_or(config.search.default_limit);

    let center = near.as_ref().map(|(center, _)| center.clone());

    let engine = Engine::open(config)?;
    match engine.find(&query, limit, near).await {
        Ok(results) => {
            println!("{} result(s) for \"{}\":", results.len(), query);
            for result in results {
                let similarity = (result.semantic_score * 100.0).clamp(0.0, 100.0);
                let distance = center.as_ref().map(|c| distance_between(c, &result.primary_location));

                print!(
                    "[{}, {}, {}] {}  {:.1}%",
                    result.primary_location.x,
                    result.primary_location.y,
                    result.primary_location.z,
                    result.primary_location.world,
                    similarity,
                );
                if let Some(distance) = distance {
                    print!("  {distance:.1}m away");
                }
                println!("  {}", render_path_tree(&result.container_path));
                println!("    {}", result.preview);
            }
            Ok(())
        }
        Err(EngineError::ProviderMismatch) => {
            warn_print!("provider changed; run 'admin purge' first");
            std::process::exit(EngineError::ProviderMismatch.exit_code());
        }
        Err(e) => {
            warn_print!("search failed: {e}");
            std::process::exit(e.exit_code());
        }
    }
}

fn distance_between(center: &Location, location: &Location) -> f64 {
    if location.world != center.world {
        return f64::INFINITY;
    }
    let dx = (location.x - center.x) as f64;
    let dy = (location.y - center.y) as f64;
    let dz = (location.z - center.z) as f64;
    (dx * dx + dy * dy + dz * dz).sqrt()
}

/// Renders a container's nested item path (the chunk's `container_path`
/// JSON, e.g. `[{"type":"shulker_box","slot":4,"color":"purple"}]`) as a
/// breadcrumb tree from the container's root down to the deepest nesting.
fn render_path_tree(container_path: &str) -> String {
    let nodes: Vec<ContainerPathNode> = serde_json::from_str(container_path).unwrap_or_default();
    if nodes.is_empty() {
        return "root".to_string();
    }
    let mut crumbs = vec!["root".to_string()];
    for node in &nodes {
        let mut label = format!("{} (slot {}", node.kind, node.slot);
        if let Some(color) = &node.color {
            label.push_str(&format!(", {color}"));
        }
        if let Some(name) = &node.name {
            label.push_str(&format!(", \"{name}\""));
        }
        label.push(')');
        crumbs.push(label);
    }
    crumbs.join(" \u{2514}\u{2500} ")
}

async fn run_admin(config: Config, action: AdminAction) -> anyhow::Result<()> {
    match action {
        AdminAction::Reload => {
            println!("configuration reloaded (persistent data untouched)");
            Ok(())
        }
        AdminAction::Stats => {
            let engine = Engine::open(config)?;
            let stats = engine.stats()?;
            println!("backend: {}", stats.backend_name);
            println!("chunks: {}", stats.chunk_count);
            println!("chunk embedding cache entries: {}", stats.cache_entries);
            println!("query cache entries: {}", stats.query_cache_entries);
            println!(
                "provider mismatch: {}",
                if engine.is_provider_mismatched() { "yes".red().to_string() } else { "no".green().to_string() }
            );
            Ok(())
        }
        AdminAction::Reindex { radius, world, x, y, z } => {
            let engine = Engine::open(config)?;
            let center = Location::new(world, x, y, z);
            let count = engine.reindex_radius(&center, radius).await?;
            println!("reindexed {count} container(s)");
            Ok(())
        }
        AdminAction::Purge => {
            let engine = Engine::open(config)?;
            engine.purge()?;
            println!("index purged; provider fingerprint reset");
            Ok(())
        }
        AdminAction::Threshold { value } => {
            let engine = Engine::open(config)?;
            match value {
                Some(v) => {
                    engine.set_threshold(v)?;
                    println!("threshold set to {v:.2}");
                }
                None => println!("threshold: {:.2}", engine.get_threshold()?),
            }
            Ok(())
        }
    }
}

fn run_history(config: Config, action: Option<HistoryAction>, limit: Option<usize>) -> anyhow::Result<()> {
    let engine = Engine::open(config)?;
    match action.unwrap_or(HistoryAction::Show { limit: limit.unwrap_or(20) }) {
        HistoryAction::Show { limit } => {
            for entry in engine.recent_queries(limit)? {
                println!("[{}] \"{}\" -> {} result(s)", entry.timestamp, entry.query, entry.result_count);
            }
            Ok(())
        }
        HistoryAction::Clear => {
            engine.clear_history()?;
            println!("history cleared");
            Ok(())
        }
        HistoryAction::Global => {
            for entry in engine.recent_queries(usize::MAX)? {
                println!("[{}] \"{}\" -> {} result(s)", entry.timestamp, entry.query, entry.result_count);
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_between_same_world_is_euclidean() {
        let center = Location::new("overworld", 0, 64, 0);
        let other = Location::new("overworld", 3, 64, 4);
        assert!((distance_between(&center, &other) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn distance_between_different_worlds_is_infinite() {
        let center = Location::new("overworld", 0, 64, 0);
        let other = Location::new("nether", 0, 64, 0);
        assert!(distance_between(&center, &other).is_infinite());
    }

    #[test]
    fn render_path_tree_empty_is_root() {
        assert_eq!(render_path_tree("[]"), "root");
    }

    #[test]
    fn render_path_tree_nests_through_shulker() {
        let path = r#"[{"type":"shulker_box","slot":4,"color":"purple"}]"#;
        let rendered = render_path_tree(path);
        assert!(rendered.starts_with("root"));
        assert!(rendered.contains("shulker_box"));
        assert!(rendered.contains("purple"));
        assert!(rendered.contains("slot 4"));
    }
}
