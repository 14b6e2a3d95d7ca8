//! Configuration for the curation bot.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Bot configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Hive API nodes to connect to (with failover support)
    #[serde(default = "default_hive_nodes")]
    pub hive_nodes: Vec<String>,

    /// Hive-Engine sidechain nodes (for token stake lookups)
    #[serde(default = "default_engine_nodes")]
    pub engine_nodes: Vec<String>,

    /// Community tag that qualifies a post (plus accepted legacy spellings)
    #[serde(default = "default_community_tags")]
    pub community_tags: Vec<String>,

    /// Tags that disqualify a post even when the community tag is present
    #[serde(default)]
    pub excluded_tags: Vec<String>,

    /// The community's operating account (beneficiary target, score override)
    #[serde(default = "default_community_account")]
    pub community_account: String,

    /// The community's curation voting account
    #[serde(default = "default_voter_account")]
    pub voter_account: String,

    /// Home community category (e.g. "hive-127515")
    #[serde(default = "default_home_category")]
    pub home_category: String,

    /// Sidechain token symbol counted as staked support
    #[serde(default = "default_token_symbol")]
    pub token_symbol: String,

    /// File holding the last processed block height
    #[serde(default = "default_cursor_file")]
    pub cursor_file: PathBuf,

    /// Directory holding the user list files
    #[serde(default = "default_lists_dir")]
    pub lists_dir: PathBuf,

    /// Posting key for broadcasting votes and comments.
    /// Optional: the bot can score and report without it.
    pub posting_key: Option<String>,

    /// Per-call timeout in milliseconds
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,

    /// Retries per gateway call (attempts = retries + 1)
    #[serde(default = "default_call_retries")]
    pub call_retries: u32,

    /// Delay between retry attempts in milliseconds
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Delay before reconnecting a failed block stream, in seconds
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,

    /// Consecutive reconnect attempts before giving up
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    /// Polling interval when caught up to the chain tip, in seconds
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Minimum score for an automatic vote on auto-list authors
    #[serde(default = "default_auto_vote_threshold")]
    pub auto_vote_threshold: u32,

    /// Webhook URL for score notifications (stdout when unset)
    pub webhook_url: Option<String>,
}

fn default_hive_nodes() -> Vec<String> {
    [
        "https://api.hive.blog",
        "https://api.openhive.network",
        "https://api.deathwing.me",
        "https://hive-api.arcange.eu",
        "https://anyx.io",
        "https://techcoderx.com",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_engine_nodes() -> Vec<String> {
    [
        "https://engine.deathwing.me",
        "https://herpc.dtools.dev",
        "https://api.primersion.com",
        "https://api.hive-engine.com/rpc",
        "https://api2.hive-engine.com/rpc",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_community_tags() -> Vec<String> {
    vec!["hivebr".to_string(), "hive-br".to_string()]
}

fn default_community_account() -> String {
    "hive-br".to_string()
}

fn default_voter_account() -> String {
    "hive-br.voter".to_string()
}

fn default_home_category() -> String {
    "hive-127515".to_string()
}

fn default_token_symbol() -> String {
    "HBR".to_string()
}

fn default_cursor_file() -> PathBuf {
    PathBuf::from("last_block.txt")
}

fn default_lists_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_call_timeout_ms() -> u64 {
    5000
}

fn default_call_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_reconnect_delay_secs() -> u64 {
    5
}

fn default_max_reconnect_attempts() -> u32 {
    10
}

fn default_poll_interval_secs() -> u64 {
    3
}

fn default_auto_vote_threshold() -> u32 {
    50
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            hive_nodes: default_hive_nodes(),
            engine_nodes: default_engine_nodes(),
            community_tags: default_community_tags(),
            excluded_tags: Vec::new(),
            community_account: default_community_account(),
            voter_account: default_voter_account(),
            home_category: default_home_category(),
            token_symbol: default_token_symbol(),
            cursor_file: default_cursor_file(),
            lists_dir: default_lists_dir(),
            posting_key: None,
            call_timeout_ms: default_call_timeout_ms(),
            call_retries: default_call_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            poll_interval_secs: default_poll_interval_secs(),
            auto_vote_threshold: default_auto_vote_threshold(),
            webhook_url: None,
        }
    }
}

impl BotConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &std::path::Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: BotConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.hive_nodes.is_empty() {
            anyhow::bail!("At least one Hive API node must be specified");
        }
        if self.engine_nodes.is_empty() {
            anyhow::bail!("At least one Hive-Engine node must be specified");
        }
        if self.community_tags.is_empty() {
            anyhow::bail!("At least one community tag must be specified");
        }
        if self.community_account.is_empty() {
            anyhow::bail!("community_account must not be empty");
        }
        if self.voter_account.is_empty() {
            anyhow::bail!("voter_account must not be empty");
        }
        if self.auto_vote_threshold > 100 {
            anyhow::bail!(
                "auto_vote_threshold must be 0-100, got {}",
                self.auto_vote_threshold
            );
        }
        if self.max_reconnect_attempts == 0 {
            anyhow::bail!("max_reconnect_attempts must be at least 1");
        }
        Ok(())
    }
}
