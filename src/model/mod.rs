//! Collected profile data: one `UserRecord` per crawled identifier.
//!
//! The serialized shape of these types is the interchange format between the
//! crawler and the analytic pass (final collection and checkpoints alike).

pub mod catalog;

pub use catalog::{CatalogEntry, GameCatalog};

use serde::{Deserialize, Serialize};

/// Profile attributes returned by the remote directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub display_name: String,
    /// ISO country code; absent for profiles that don't publish a location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// A single owned item with its cumulative usage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnedItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub playtime_minutes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OwnedItems {
    pub count: usize,
    #[serde(default)]
    pub items: Vec<OwnedItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FriendList {
    pub count: usize,
    #[serde(default)]
    pub ids: Vec<String>,
}

/// Materialized result of successfully processing one identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub identifier: String,
    pub profile: Profile,
    pub owned_items: OwnedItems,
    pub friends: FriendList,
}

impl UserRecord {
    /// Build a record, deriving the `count` fields from the lists.
    pub fn new(
        identifier: impl Into<String>,
        profile: Profile,
        items: Vec<OwnedItem>,
        friends: Vec<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            profile,
            owned_items: OwnedItems {
                count: items.len(),
                items,
            },
            friends: FriendList {
                count: friends.len(),
                ids: friends,
            },
        }
    }

    /// Country code, treating an empty string the same as a missing one.
    pub fn country(&self) -> Option<&str> {
        self.profile
            .country_code
            .as_deref()
            .filter(|c| !c.is_empty())
    }

    pub fn items(&self) -> &[OwnedItem] {
        &self.owned_items.items
    }

    pub fn friend_ids(&self) -> &[String] {
        &self.friends.ids
    }

    /// Sum of usage over every owned item, in minutes.
    pub fn total_playtime(&self) -> u64 {
        self.owned_items
            .items
            .iter()
            .map(|i| i.playtime_minutes)
            .sum()
    }
}
