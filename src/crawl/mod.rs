//! Breadth-first crawler over the remote friend graph.
//!
//! The crawl is strictly sequential: one remote call in flight, fixed pauses
//! between calls and between nodes, and a checkpoint of the whole collection
//! every `checkpoint_every` successfully processed nodes. Cancellation is only
//! observed between nodes; whatever was gathered is flushed before returning.

mod frontier;
mod retry;

pub use frontier::Frontier;
pub use retry::{with_retry, RetryPolicy};

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::config::CrawlerConfig;
use crate::directory::RemoteDirectory;
use crate::error::Result;
use crate::model::UserRecord;
use crate::store::SnapshotStore;

/// Timing and size knobs for one crawl run.
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    pub target_users: usize,
    pub retry: RetryPolicy,
    /// Pause after each of the first two calls for a node.
    pub request_delay: Duration,
    /// Pause after every node, processed or skipped.
    pub node_delay: Duration,
    pub checkpoint_every: usize,
}

impl From<&CrawlerConfig> for CrawlSettings {
    fn from(config: &CrawlerConfig) -> Self {
        Self {
            target_users: config.target_users,
            retry: RetryPolicy {
                max_attempts: config.max_retries,
                delay: Duration::from_millis(config.retry_delay_ms),
            },
            request_delay: Duration::from_millis(config.request_delay_ms),
            node_delay: Duration::from_millis(config.node_delay_ms),
            checkpoint_every: config.checkpoint_every,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlState {
    Running,
    /// Target reached or frontier exhausted.
    Done,
    /// Stopped by cancellation.
    Partial,
}

/// Everything a crawl run mutates, threaded explicitly through each step.
#[derive(Debug)]
pub struct TraversalContext {
    frontier: Frontier,
    records: Vec<UserRecord>,
    failed: usize,
    checkpoints: Vec<PathBuf>,
    state: CrawlState,
}

impl TraversalContext {
    pub fn new(seed: &str) -> Self {
        Self {
            frontier: Frontier::with_seed(seed),
            records: Vec::new(),
            failed: 0,
            checkpoints: Vec::new(),
            state: CrawlState::Running,
        }
    }

    pub fn processed(&self) -> usize {
        self.records.len()
    }

    /// Recompute the state before the next iteration.
    fn advance(&mut self, target_users: usize, cancelled: bool) -> CrawlState {
        if self.state != CrawlState::Running {
            return self.state;
        }
        self.state = if self.processed() >= target_users || self.frontier.is_empty() {
            CrawlState::Done
        } else if cancelled {
            CrawlState::Partial
        } else {
            CrawlState::Running
        };
        self.state
    }

    /// Append a processed record and expand the frontier with its friends.
    /// Returns how many identifiers were newly queued.
    fn accept(&mut self, record: UserRecord) -> usize {
        let added = record
            .friend_ids()
            .iter()
            .filter(|friend| self.frontier.enqueue(friend))
            .count();
        self.records.push(record);
        added
    }
}

/// Outcome of a crawl run.
#[derive(Debug)]
pub struct CrawlReport {
    pub state: CrawlState,
    pub records: Vec<UserRecord>,
    pub failed: usize,
    pub visited: usize,
    /// Identifiers queued but never processed, in queue order.
    pub pending: Vec<String>,
    pub checkpoints: Vec<PathBuf>,
    /// File the collection was flushed to.
    pub output: PathBuf,
}

impl CrawlReport {
    pub fn processed(&self) -> usize {
        self.records.len()
    }
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

/// Fetch profile, items and friends for one identifier.
///
/// Returns `None` when the profile or item call fails for good. A failed
/// friend-list call degrades to an empty list.
pub async fn process_node<D>(directory: &D, id: &str, settings: &CrawlSettings) -> Option<UserRecord>
where
    D: RemoteDirectory + ?Sized,
{
    let profile = match with_retry("profile", id, settings.retry, || directory.fetch_profile(id)).await {
        Ok(profile) => profile,
        Err(e) => {
            log::warn!("Skipping {}: profile unavailable ({})", id, e);
            return None;
        }
    };
    pause(settings.request_delay).await;

    let items = match with_retry("owned items", id, settings.retry, || directory.fetch_owned_items(id)).await {
        Ok(items) => items,
        Err(e) => {
            log::warn!("Skipping {}: owned items unavailable ({})", id, e);
            return None;
        }
    };
    pause(settings.request_delay).await;

    let friends = with_retry("friends", id, settings.retry, || directory.fetch_friends(id))
        .await
        .unwrap_or_else(|e| {
            log::warn!("{}: friend list unavailable, continuing without friends ({})", id, e);
            Vec::new()
        });

    Some(UserRecord::new(id, profile, items, friends))
}

/// Process one identifier and fold the result into the context.
///
/// A failed checkpoint write is logged and the crawl carries on; the
/// records stay in memory for the next checkpoint and the final flush.
async fn step<D>(
    ctx: &mut TraversalContext,
    directory: &D,
    id: &str,
    settings: &CrawlSettings,
    store: &SnapshotStore,
) where
    D: RemoteDirectory + ?Sized,
{
    log::info!("Processing {}...", id);

    let Some(record) = process_node(directory, id, settings).await else {
        ctx.failed += 1;
        return;
    };

    let added = ctx.accept(record);
    log::info!(
        "✓ {} ({}/{}; +{} queued, {} pending)",
        id,
        ctx.processed(),
        settings.target_users,
        added,
        ctx.frontier.pending_len()
    );

    if settings.checkpoint_every > 0 && ctx.processed() % settings.checkpoint_every == 0 {
        match store.write_checkpoint(&ctx.records, ctx.processed()) {
            Ok(path) => {
                log::info!("Checkpoint: {} records -> {}", ctx.processed(), path.display());
                ctx.checkpoints.push(path);
            }
            Err(e) => log::error!("Checkpoint at {} records failed: {}", ctx.processed(), e),
        }
    }
}

/// Crawl from `seed` until the target is met, the frontier empties, or
/// `cancel` fires. The collection is flushed to the store's final path on
/// `Done` and to its partial path on `Partial`.
pub async fn crawl<D>(
    directory: &D,
    seed: &str,
    settings: &CrawlSettings,
    store: &SnapshotStore,
    cancel: &CancellationToken,
) -> Result<CrawlReport>
where
    D: RemoteDirectory + ?Sized,
{
    let start = Instant::now();
    log::info!("Starting crawl from {} (target {} users)", seed, settings.target_users);

    let mut ctx = TraversalContext::new(seed);

    while ctx.advance(settings.target_users, cancel.is_cancelled()) == CrawlState::Running {
        let Some(id) = ctx.frontier.next_unvisited() else {
            ctx.state = CrawlState::Done;
            break;
        };

        step(&mut ctx, directory, &id, settings, store).await;

        if !settings.node_delay.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(settings.node_delay) => {}
                _ = cancel.cancelled() => {}
            }
        }
    }

    let output = match ctx.state {
        CrawlState::Partial => {
            log::warn!("Crawl cancelled; flushing {} records", ctx.processed());
            store.write_partial(&ctx.records)?
        }
        _ => store.write_final(&ctx.records)?,
    };

    log::info!("=== Crawl {:?} ===", ctx.state);
    log::info!("Processed: {} (skipped: {})", ctx.processed(), ctx.failed);
    log::info!("Visited: {}", ctx.frontier.visited_len());
    log::info!("Pending in frontier: {}", ctx.frontier.pending_len());
    log::info!("Saved to {} in {:?}", output.display(), start.elapsed());

    let pending = ctx.frontier.pending().map(str::to_string).collect();
    Ok(CrawlReport {
        state: ctx.state,
        visited: ctx.frontier.visited_len(),
        records: ctx.records,
        failed: ctx.failed,
        pending,
        checkpoints: ctx.checkpoints,
        output,
    })
}
