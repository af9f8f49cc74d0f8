use anyhow::Result;
use clap::Parser;
use friendgraph::directory::steam::{check_seed, SteamDirectory};
use friendgraph::store::SnapshotStore;
use friendgraph::{crawl, Config, CrawlSettings, CrawlState};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "crawl")]
#[command(about = "Collect profiles breadth-first from a seed SteamID")]
struct Args {
    /// Seed SteamID (17 digits); defaults to crawler.seed_id / INITIAL_STEAM_ID
    #[arg(short, long)]
    seed: Option<String>,

    /// Stop after this many profiles have been collected
    #[arg(short, long)]
    target: Option<usize>,

    /// Override the collection output path
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default()
            .filter_or("RUST_LOG", "info")
    ).init();

    let args = Args::parse();
    let config = Config::load()?;

    let seed = args
        .seed
        .or_else(|| config.crawler.seed_id())
        .ok_or_else(|| anyhow::anyhow!(
            "No seed given. Pass --seed <steamid> or set INITIAL_STEAM_ID in your .env file."
        ))?;
    check_seed(&seed)?;

    let mut settings = CrawlSettings::from(&config.crawler);
    if let Some(target) = args.target {
        if target == 0 {
            anyhow::bail!("--target must be greater than 0");
        }
        settings.target_users = target;
    }

    let output = args.output.unwrap_or_else(|| config.data_path().to_path_buf());
    let store = SnapshotStore::new(&output, config.checkpoint_dir());

    let directory = SteamDirectory::new(
        config.steam.api_key()?,
        config.steam.base_url.clone(),
        Duration::from_secs(config.steam.timeout_secs),
    )?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupt received, stopping after the current node");
            on_signal.cancel();
        }
    });

    let report = crawl(&directory, &seed, &settings, &store, &cancel).await?;

    println!("\n=== Crawl Summary ===");
    println!("State:        {:?}", report.state);
    println!("Collected:    {}", report.processed());
    println!("Skipped:      {}", report.failed);
    println!("Visited:      {}", report.visited);
    println!("Pending:      {}", report.pending.len());
    println!("Checkpoints:  {}", report.checkpoints.len());
    println!("Output:       {}", report.output.display());

    if report.state == CrawlState::Partial {
        println!("\nCrawl was interrupted; the collection above is partial.");
    }

    Ok(())
}
