use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub friendgraph: FriendgraphConfig,
    #[serde(default)]
    pub steam: SteamConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

/// Where collections, checkpoints and exports live
#[derive(Debug, Clone, Deserialize)]
pub struct FriendgraphConfig {
    /// Final crawl output and default analysis input.
    pub data_path: PathBuf,
    pub checkpoint_dir: PathBuf,
    pub export_path: PathBuf,
}

/// Steam Web API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SteamConfig {
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SteamConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl SteamConfig {
    /// Resolve the API key from the configured environment variable.
    pub fn api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env).with_context(|| {
            format!(
                "Environment variable {} not set. Set it in your .env file or as an environment variable with your Steam Web API key.",
                self.api_key_env
            )
        })
    }
}

/// Crawl size, pacing and checkpoint cadence
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Seed identifier; falls back to the INITIAL_STEAM_ID environment variable.
    #[serde(default)]
    pub seed_id: Option<String>,
    #[serde(default = "default_target_users")]
    pub target_users: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
    #[serde(default = "default_request_delay_ms")]
    pub node_delay_ms: u64,
    #[serde(default = "default_checkpoint_every")]
    pub checkpoint_every: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            seed_id: None,
            target_users: default_target_users(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            request_delay_ms: default_request_delay_ms(),
            node_delay_ms: default_request_delay_ms(),
            checkpoint_every: default_checkpoint_every(),
        }
    }
}

impl CrawlerConfig {
    pub fn seed_id(&self) -> Option<String> {
        self.seed_id
            .clone()
            .filter(|s| !s.is_empty())
            .or_else(|| std::env::var("INITIAL_STEAM_ID").ok().filter(|s| !s.is_empty()))
    }
}

/// Clustering and recommendation parameters
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_num_clusters")]
    pub num_clusters: usize,
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    /// Average usage (minutes) at which the engagement score saturates.
    #[serde(default = "default_engagement_scale_minutes")]
    pub engagement_scale_minutes: f64,
    #[serde(default = "default_max_recommendations")]
    pub max_recommendations: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            num_clusters: default_num_clusters(),
            similarity_threshold: default_similarity_threshold(),
            engagement_scale_minutes: default_engagement_scale_minutes(),
            max_recommendations: default_max_recommendations(),
        }
    }
}

pub const MIN_CLUSTERS: usize = 2;
pub const MAX_CLUSTERS: usize = 20;

impl AnalysisConfig {
    /// Cluster count to use for a command-line request: out-of-range values
    /// fall back to the default.
    pub fn clusters_or_default(requested: usize) -> usize {
        if (MIN_CLUSTERS..=MAX_CLUSTERS).contains(&requested) {
            requested
        } else {
            log::warn!(
                "Cluster count {} outside [{}, {}]; using {}",
                requested,
                MIN_CLUSTERS,
                MAX_CLUSTERS,
                default_num_clusters()
            );
            default_num_clusters()
        }
    }
}

fn default_api_key_env() -> String {
    "STEAM_API_KEY".to_string()
}

fn default_base_url() -> String {
    crate::directory::steam::DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_target_users() -> usize {
    1000
}

fn default_max_retries() -> usize {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_request_delay_ms() -> u64 {
    500
}

fn default_checkpoint_every() -> usize {
    50
}

fn default_num_clusters() -> usize {
    6
}

fn default_similarity_threshold() -> f64 {
    0.3
}

fn default_engagement_scale_minutes() -> f64 {
    1000.0
}

fn default_max_recommendations() -> usize {
    10
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in FRIENDGRAPH_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        // .env is optional
        let _ = dotenv::dotenv();

        let config_path = std::env::var("FRIENDGRAPH_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        Self::from_path(&config_path)
    }

    /// Load and validate a specific config file
    pub fn from_path(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        Self::from_toml(&config_str)
            .with_context(|| format!("Invalid config file: {}", config_path.display()))
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(config_str: &str) -> Result<Self> {
        let config: Config = toml::from_str(config_str).context("Failed to parse config.toml")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.crawler.target_users == 0 {
            anyhow::bail!("crawler.target_users must be greater than 0");
        }

        if self.crawler.max_retries == 0 {
            anyhow::bail!("crawler.max_retries must be at least 1");
        }

        if self.crawler.checkpoint_every == 0 {
            anyhow::bail!("crawler.checkpoint_every must be greater than 0");
        }

        if !(MIN_CLUSTERS..=MAX_CLUSTERS).contains(&self.analysis.num_clusters) {
            anyhow::bail!(
                "analysis.num_clusters must be between {} and {}",
                MIN_CLUSTERS,
                MAX_CLUSTERS
            );
        }

        if !(0.0..=1.0).contains(&self.analysis.similarity_threshold) {
            anyhow::bail!("analysis.similarity_threshold must be between 0.0 and 1.0");
        }

        if !(self.analysis.engagement_scale_minutes > 0.0) {
            anyhow::bail!("analysis.engagement_scale_minutes must be greater than 0");
        }

        if self.analysis.max_recommendations == 0 {
            anyhow::bail!("analysis.max_recommendations must be greater than 0");
        }

        Ok(())
    }

    /// Get the collection path
    pub fn data_path(&self) -> &Path {
        &self.friendgraph.data_path
    }

    pub fn checkpoint_dir(&self) -> &Path {
        &self.friendgraph.checkpoint_dir
    }

    pub fn export_path(&self) -> &Path {
        &self.friendgraph.export_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Serialize config tests that mutate process-wide env so they don't race.
    static CONFIG_TEST_LOCK: Mutex<()> = Mutex::new(());

    const MINIMAL: &str = r#"
[friendgraph]
data_path = "data/users.json"
checkpoint_dir = "data/checkpoints"
export_path = "data/graph.json"
"#;

    fn full_config() -> String {
        format!(
            r#"{}
[steam]
api_key_env = "TEST_STEAM_KEY"

[crawler]
seed_id = "76561197960287930"
target_users = 200
max_retries = 5
retry_delay_ms = 250
request_delay_ms = 100
node_delay_ms = 300
checkpoint_every = 25

[analysis]
num_clusters = 4
similarity_threshold = 0.25
engagement_scale_minutes = 600.0
max_recommendations = 5
"#,
            MINIMAL
        )
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_toml(MINIMAL).unwrap();
        assert_eq!(config.data_path(), Path::new("data/users.json"));
        assert_eq!(config.steam.api_key_env, "STEAM_API_KEY");
        assert_eq!(config.steam.timeout_secs, 10);
        assert_eq!(config.crawler.target_users, 1000);
        assert_eq!(config.crawler.max_retries, 3);
        assert_eq!(config.crawler.request_delay_ms, 500);
        assert_eq!(config.crawler.node_delay_ms, 500);
        assert_eq!(config.crawler.checkpoint_every, 50);
        assert_eq!(config.analysis.num_clusters, 6);
        assert!((config.analysis.similarity_threshold - 0.3).abs() < 1e-12);
        assert!((config.analysis.engagement_scale_minutes - 1000.0).abs() < 1e-12);
        assert_eq!(config.analysis.max_recommendations, 10);
    }

    #[test]
    fn test_full_config() {
        let config = Config::from_toml(&full_config()).unwrap();
        assert_eq!(config.crawler.target_users, 200);
        assert_eq!(config.crawler.node_delay_ms, 300);
        assert_eq!(config.crawler.seed_id(), Some("76561197960287930".to_string()));
        assert_eq!(config.analysis.num_clusters, 4);
        assert_eq!(config.analysis.max_recommendations, 5);
    }

    #[test]
    fn test_rejects_out_of_range_clusters() {
        let text = format!("{}\n[analysis]\nnum_clusters = 1\n", MINIMAL);
        let err = Config::from_toml(&text).unwrap_err();
        assert!(err.to_string().contains("num_clusters"));

        let text = format!("{}\n[analysis]\nnum_clusters = 21\n", MINIMAL);
        assert!(Config::from_toml(&text).is_err());
    }

    #[test]
    fn test_rejects_bad_threshold_and_zero_values() {
        let text = format!("{}\n[analysis]\nsimilarity_threshold = 1.5\n", MINIMAL);
        assert!(Config::from_toml(&text).is_err());

        let text = format!("{}\n[crawler]\ncheckpoint_every = 0\n", MINIMAL);
        assert!(Config::from_toml(&text).is_err());

        let text = format!("{}\n[crawler]\ntarget_users = 0\n", MINIMAL);
        assert!(Config::from_toml(&text).is_err());
    }

    #[test]
    fn test_missing_paths_section_fails() {
        assert!(Config::from_toml("[crawler]\ntarget_users = 5\n").is_err());
    }

    #[test]
    fn test_clusters_or_default() {
        assert_eq!(AnalysisConfig::clusters_or_default(2), 2);
        assert_eq!(AnalysisConfig::clusters_or_default(20), 20);
        assert_eq!(AnalysisConfig::clusters_or_default(0), 6);
        assert_eq!(AnalysisConfig::clusters_or_default(50), 6);
    }

    #[test]
    fn test_load_from_env_path() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, full_config()).unwrap();

        let original = std::env::var("FRIENDGRAPH_CONFIG").ok();
        std::env::set_var("FRIENDGRAPH_CONFIG", &config_path);
        let config = Config::load();
        std::env::remove_var("FRIENDGRAPH_CONFIG");
        if let Some(v) = original {
            std::env::set_var("FRIENDGRAPH_CONFIG", v);
        }

        let config = config.unwrap();
        assert_eq!(config.crawler.target_users, 200);
    }

    #[test]
    fn test_config_invalid_path() {
        let err = Config::from_path(Path::new("nonexistent.toml")).unwrap_err();
        assert!(err.to_string().contains("nonexistent.toml"));
    }

    #[test]
    fn test_api_key_missing_names_variable() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let steam = SteamConfig {
            api_key_env: "FRIENDGRAPH_TEST_UNSET_KEY".to_string(),
            ..SteamConfig::default()
        };
        std::env::remove_var("FRIENDGRAPH_TEST_UNSET_KEY");
        let err = steam.api_key().unwrap_err();
        assert!(err.to_string().contains("FRIENDGRAPH_TEST_UNSET_KEY"));

        std::env::set_var("FRIENDGRAPH_TEST_UNSET_KEY", "abc");
        assert_eq!(steam.api_key().unwrap(), "abc");
        std::env::remove_var("FRIENDGRAPH_TEST_UNSET_KEY");
    }
}
