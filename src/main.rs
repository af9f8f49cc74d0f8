use anyhow::{Context, Result};
use friendgraph::analysis::{analyze_file, AnalysisSettings};
use friendgraph::directory::steam::{check_seed, SteamDirectory};
use friendgraph::store::SnapshotStore;
use friendgraph::{crawl, export, Config, CrawlSettings};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default()
            .filter_or("RUST_LOG", "info")
    ).init();

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("verify");

    match command {
        "crawl" => run_crawl().await?,
        "analyze" => run_analysis().await?,
        _ => run_verification()?,
    }

    Ok(())
}

/// Crawl from the configured seed with configured settings.
async fn run_crawl() -> Result<()> {
    let config = Config::load()?;
    let seed = config
        .crawler
        .seed_id()
        .context("No seed configured: set crawler.seed_id or INITIAL_STEAM_ID")?;
    check_seed(&seed)?;

    let directory = SteamDirectory::new(
        config.steam.api_key()?,
        config.steam.base_url.clone(),
        Duration::from_secs(config.steam.timeout_secs),
    )?;
    let store = SnapshotStore::new(config.data_path(), config.checkpoint_dir());
    let settings = CrawlSettings::from(&config.crawler);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupt received, stopping after the current node");
            on_signal.cancel();
        }
    });

    let report = crawl(&directory, &seed, &settings, &store, &cancel).await?;
    log::info!(
        "{:?}: {} records written to {}",
        report.state,
        report.processed(),
        report.output.display()
    );
    Ok(())
}

/// Analyze the configured collection and write the export document.
async fn run_analysis() -> Result<()> {
    let config = Config::load()?;
    let settings = AnalysisSettings::from(&config.analysis);
    let input = config.data_path().to_path_buf();
    let output = config.export_path().to_path_buf();

    // CPU-bound; keep it off the async workers.
    tokio::task::spawn_blocking(move || -> Result<()> {
        let (records, report) = analyze_file(&input, &settings)
            .with_context(|| format!("Analysis of {} failed", input.display()))?;
        export::write_export(&output, &records, &report)?;
        Ok(())
    })
    .await??;

    Ok(())
}

/// Load and validate configuration and report what is on disk.
fn run_verification() -> Result<()> {
    log::info!("Starting friendgraph v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    log::info!("Configuration loaded successfully");
    log::info!("Collection path: {}", config.data_path().display());
    log::info!("Checkpoint dir: {}", config.checkpoint_dir().display());
    log::info!("Export path: {}", config.export_path().display());

    match config.crawler.seed_id() {
        Some(seed) => log::info!("✓ Seed: {}", seed),
        None => log::warn!("No seed configured (crawler.seed_id / INITIAL_STEAM_ID)"),
    }
    match config.steam.api_key() {
        Ok(_) => log::info!("✓ API key present in {}", config.steam.api_key_env),
        Err(e) => log::warn!("{}", e),
    }

    if config.data_path().exists() {
        log::info!("✓ Collection exists");
    } else {
        log::info!("No collection yet; run `crawl` first");
    }

    let store = SnapshotStore::new(config.data_path(), config.checkpoint_dir());
    let checkpoints = store.list_checkpoints()?;
    log::info!("{} checkpoint(s) on disk", checkpoints.len());

    Ok(())
}
