pub mod config;
pub mod error;
pub mod model;
pub mod store;
pub mod directory;
pub mod crawl;
pub mod analysis;
pub mod export;

pub use config::Config;
pub use error::{FriendgraphError, Result};
pub use model::UserRecord;
pub use crawl::{crawl, CrawlReport, CrawlSettings, CrawlState};
pub use analysis::{analyze, AnalysisReport, AnalysisSettings};
