//! Remote profile directory: the three read operations the crawler depends on.

pub mod steam;

pub use steam::SteamDirectory;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{OwnedItem, Profile};

/// Failure of a single remote call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DirectoryError {
    /// The identifier does not resolve to a profile. Not retried.
    #[error("not found: {0}")]
    NotFound(String),

    /// Network failure, rate limiting or a server-side error.
    #[error("transient failure: {0}")]
    Transient(String),

    /// The response could not be decoded.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl DirectoryError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, DirectoryError::NotFound(_))
    }
}

/// Read-only capability over the remote social graph.
///
/// Calls are issued one at a time by the crawler; implementations need not
/// handle concurrent use efficiently, only safely.
#[async_trait]
pub trait RemoteDirectory: Send + Sync {
    /// Profile summary for `id`.
    async fn fetch_profile(&self, id: &str) -> Result<Profile, DirectoryError>;

    /// Owned items with usage. A private or empty inventory is `Ok(vec![])`.
    async fn fetch_owned_items(&self, id: &str) -> Result<Vec<OwnedItem>, DirectoryError>;

    /// Friend identifiers of `id`.
    async fn fetch_friends(&self, id: &str) -> Result<Vec<String>, DirectoryError>;
}
