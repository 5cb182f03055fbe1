use anyhow::Result;
use clawdash::{collector, config, server, store::Store};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Parser, Debug)]
#[command(name = "clawdash")]
#[command(about = "Monitoring dashboard backend for a personal OpenClaw agent")]
#[command(version)]
struct Args {
    /// Initialize configuration
    #[arg(long)]
    init: bool,

    /// Path to config file
    #[arg(long, short)]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a single collection pass and exit
    Collect,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("clawdash=info".parse()?),
        )
        .init();

    if args.init {
        let path = config::write_default()?;
        println!("Wrote starter config to {}", path.display());
        return Ok(());
    }

    let config = config::load(args.config.as_deref())?;
    let store = Store::new(&config.paths.data_dir)?;

    if let Some(Command::Collect) = args.command {
        collector::collect_once(&config, &store).await?;
        return Ok(());
    }

    let (collect_tx, collect_rx) = mpsc::channel(4);

    // First snapshot before the server comes up, so /api/data has real data
    if let Err(e) = collector::collect_once(&config, &store).await {
        tracing::warn!("Initial collection failed: {:#}", e);
    }

    tokio::spawn(collector::run_loop(
        config.clone(),
        store.clone(),
        collect_rx,
    ));

    let state = Arc::new(server::AppState {
        config,
        store,
        collect_tx,
    });
    server::serve(state).await
}
