use std::path::Path;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use groundwork::config::load_config;
use groundwork::server::run_server;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "groundwork.toml".to_string());
    let config = load_config(Path::new(&config_path))?;

    run_server(&config).await
}
