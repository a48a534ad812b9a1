//! `vars serve`: host a fixture registry over local IPC.

use crate::args::ServeArgs;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;
use varquery::{MemoryRegistry, RegistryServer};

pub fn run(args: ServeArgs) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    runtime.block_on(serve(args))
}

async fn serve(args: ServeArgs) -> Result<()> {
    let registry = MemoryRegistry::load(&args.fixture)?;
    info!(
        "Loaded {} variables from {}",
        registry.len(),
        args.fixture.display()
    );

    let mut handle = RegistryServer::bind(Arc::new(registry), &args.host, args.port).await?;

    // Print port for the parent process to read (intentional stdout for IPC)
    println!("VARQUERY_PORT={}", handle.port);

    info!("Registry server running on {}", handle.addr());

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, exiting");
    handle.shutdown();

    Ok(())
}
