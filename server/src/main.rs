use anyhow::Result;
use axum::Router;
use clap::Parser;
use rank_server::{build_app, ServerOptions};
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// Index directory path
    #[arg(long, default_value = "./index")]
    index: String,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
    /// Thesaurus JSON for `expand=true` requests
    #[arg(long)]
    thesaurus: Option<PathBuf>,
    #[arg(long, default_value_t = rank_core::query::DEFAULT_MAX_SYNONYMS)]
    max_synonyms: usize,
    /// Worker threads for batch requests (0 = one per CPU)
    #[arg(long, default_value_t = 0)]
    workers: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();
    let options = ServerOptions { thesaurus: args.thesaurus, max_synonyms: args.max_synonyms, workers: args.workers };
    let app: Router = build_app(&args.index, options)?;

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
