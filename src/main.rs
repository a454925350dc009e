use clap::Parser;
use container_search::cli::{run, Cli};
use container_search::constants::SHUTDOWN_REQUESTED;
use std::sync::atomic::Ordering;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    ctrlc::set_handler(|| {
        tracing::info!("shutdown requested");
        SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
    })
    .expect("failed to install CTRL-C handler");

    if let Err(e) = run(cli).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
