use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

use super::{DirectoryError, RemoteDirectory};
use crate::error::{FriendgraphError, Result};
use crate::model::{OwnedItem, Profile};

pub const DEFAULT_BASE_URL: &str = "https://api.steampowered.com";

/// Response envelope of ISteamUser/GetPlayerSummaries
#[derive(Deserialize)]
struct PlayerSummariesResponse {
    response: PlayerSummariesBody,
}

#[derive(Deserialize)]
struct PlayerSummariesBody {
    #[serde(default)]
    players: Vec<PlayerSummary>,
}

#[derive(Deserialize)]
struct PlayerSummary {
    #[serde(default)]
    personaname: String,
    #[serde(default)]
    loccountrycode: Option<String>,
    #[serde(default)]
    profileurl: Option<String>,
    #[serde(default)]
    avatarfull: Option<String>,
}

/// Response envelope of IPlayerService/GetOwnedGames
#[derive(Deserialize)]
struct OwnedGamesResponse {
    #[serde(default)]
    response: OwnedGamesBody,
}

#[derive(Deserialize, Default)]
struct OwnedGamesBody {
    /// Absent for private profiles.
    #[serde(default)]
    games: Option<Vec<OwnedGame>>,
}

#[derive(Deserialize)]
struct OwnedGame {
    appid: u64,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    playtime_forever: u64,
}

/// Response envelope of ISteamUser/GetFriendList
#[derive(Deserialize)]
struct FriendListResponse {
    #[serde(default)]
    friendslist: FriendListBody,
}

#[derive(Deserialize, Default)]
struct FriendListBody {
    #[serde(default)]
    friends: Vec<Friend>,
}

#[derive(Deserialize)]
struct Friend {
    steamid: String,
}

/// Steam Web API client
///
/// Issues one GET per call with a fixed timeout. Retry and pacing are the
/// crawler's job, not this client's.
pub struct SteamDirectory {
    client: Client,
    api_key: String,
    base_url: String,
}

impl SteamDirectory {
    /// Create a new Steam client
    ///
    /// # Arguments
    ///
    /// * `api_key` - Steam Web API key
    /// * `base_url` - API root, normally [`DEFAULT_BASE_URL`]
    /// * `timeout` - Per-request timeout
    pub fn new(api_key: String, base_url: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FriendgraphError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str, params: &[(&str, &str)]) -> std::result::Result<Url, DirectoryError> {
        let mut all: Vec<(&str, &str)> = vec![("key", self.api_key.as_str())];
        all.extend_from_slice(params);
        Url::parse_with_params(&format!("{}/{}", self.base_url, path), &all)
            .map_err(|e| DirectoryError::Malformed(format!("bad endpoint url: {}", e)))
    }

    /// Perform a GET and return the body text, classifying HTTP failures.
    async fn get_text(&self, url: Url) -> std::result::Result<String, DirectoryError> {
        let start = std::time::Instant::now();
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DirectoryError::Transient(format!("Network error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(classify_status(status, body));
        }

        let text = response
            .text()
            .await
            .map_err(|e| DirectoryError::Transient(format!("Failed to read response: {}", e)))?;
        log::debug!("Steam API call took {:?}", start.elapsed());
        Ok(text)
    }
}

fn classify_status(status: StatusCode, body: String) -> DirectoryError {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        DirectoryError::Transient(format!("Steam API error {}: {}", status, body))
    } else {
        DirectoryError::NotFound(format!("Steam API error {}: {}", status, body))
    }
}

/// Decode a GetPlayerSummaries body. An empty `players` list means the
/// identifier does not resolve to a profile.
pub fn parse_player_summary(id: &str, body: &str) -> std::result::Result<Profile, DirectoryError> {
    let parsed: PlayerSummariesResponse = serde_json::from_str(body)
        .map_err(|e| DirectoryError::Malformed(format!("player summary for {}: {}", id, e)))?;

    let player = parsed
        .response
        .players
        .into_iter()
        .next()
        .ok_or_else(|| DirectoryError::NotFound(format!("no player for {}", id)))?;

    Ok(Profile {
        display_name: player.personaname,
        country_code: player.loccountrycode.filter(|c| !c.is_empty()),
        profile_url: player.profileurl,
        avatar_url: player.avatarfull,
    })
}

/// Decode a GetOwnedGames body. A body without `games` is a private or
/// empty inventory and decodes to an empty list.
pub fn parse_owned_games(id: &str, body: &str) -> std::result::Result<Vec<OwnedItem>, DirectoryError> {
    let parsed: OwnedGamesResponse = serde_json::from_str(body)
        .map_err(|e| DirectoryError::Malformed(format!("owned games for {}: {}", id, e)))?;

    let games = parsed.response.games.unwrap_or_default();
    Ok(games
        .into_iter()
        .map(|g| {
            let id = g.appid.to_string();
            OwnedItem {
                name: g.name.unwrap_or_else(|| format!("Game {}", id)),
                id,
                playtime_minutes: g.playtime_forever,
            }
        })
        .collect())
}

pub fn parse_friend_list(id: &str, body: &str) -> std::result::Result<Vec<String>, DirectoryError> {
    let parsed: FriendListResponse = serde_json::from_str(body)
        .map_err(|e| DirectoryError::Malformed(format!("friend list for {}: {}", id, e)))?;
    Ok(parsed
        .friendslist
        .friends
        .into_iter()
        .map(|f| f.steamid)
        .collect())
}

/// SteamIDs handed to the crawler are 64-bit account ids: 17 decimal digits.
pub fn is_valid_steam_id(id: &str) -> bool {
    id.len() == 17 && id.bytes().all(|b| b.is_ascii_digit())
}

/// Reject a crawl seed that is not a SteamID.
pub fn check_seed(id: &str) -> Result<()> {
    if is_valid_steam_id(id) {
        Ok(())
    } else {
        Err(FriendgraphError::InvalidInput(format!(
            "invalid SteamID {:?}: expected 17 digits",
            id
        )))
    }
}

#[async_trait]
impl RemoteDirectory for SteamDirectory {
    async fn fetch_profile(&self, id: &str) -> std::result::Result<Profile, DirectoryError> {
        let url = self.endpoint("ISteamUser/GetPlayerSummaries/v0002/", &[("steamids", id)])?;
        let body = self.get_text(url).await?;
        parse_player_summary(id, &body)
    }

    async fn fetch_owned_items(&self, id: &str) -> std::result::Result<Vec<OwnedItem>, DirectoryError> {
        let url = self.endpoint(
            "IPlayerService/GetOwnedGames/v0001/",
            &[
                ("steamid", id),
                ("format", "json"),
                ("include_appinfo", "true"),
                ("include_played_free_games", "true"),
            ],
        )?;
        let body = self.get_text(url).await?;
        parse_owned_games(id, &body)
    }

    async fn fetch_friends(&self, id: &str) -> std::result::Result<Vec<String>, DirectoryError> {
        let url = self.endpoint(
            "ISteamUser/GetFriendList/v0001/",
            &[("steamid", id), ("relationship", "friend")],
        )?;
        let body = self.get_text(url).await?;
        parse_friend_list(id, &body)
    }
}
