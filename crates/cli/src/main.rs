use anyhow::{Context, Result};
use buildgraph::Cli;
use buildgraph_core::CancellationToken;
use clap::Parser;

fn main() -> Result<()> {
    // Initialize tracing based on RUST_LOG env var
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let cancellation = CancellationToken::new();
    let handler_token = cancellation.clone();
    ctrlc::set_handler(move || handler_token.cancel())
        .context("Failed to install Ctrl+C handler")?;

    cli.execute(cancellation)
}
