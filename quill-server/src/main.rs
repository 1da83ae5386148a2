use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use quill::prelude::*;

mod handlers;
mod routes;

/// quill-server - server-rendered demo site
#[derive(Parser)]
#[command(name = "quill-server")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (skips the default search path)
    #[arg(short, long, env = "QUILL_CONFIG")]
    config: Option<PathBuf>,

    /// Directory served under /static
    #[arg(long, default_value = "./static")]
    static_dir: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => Config::load_for_service("quill-server").context("loading configuration")?,
    };

    init_tracing(&config)?;

    let state = AppState::builder()
        .config(config.clone())
        .build()
        .context("building template cache")?;

    let app = routes::build(state, &cli.static_dir);

    Server::new(config).serve(app).await?;

    Ok(())
}
