//! Candidate extraction and admission filtering.
//!
//! Extraction is a pure, single pass over a block: only the first operation
//! of each transaction is considered, because root-level post creation always
//! rides first; replies and edits of interest never do. Admission then runs
//! the asynchronous checks (blacklists, authoritative creation time) against
//! the gateway and list store.

use chrono::NaiveDateTime;

use crate::gateway::rpc::{Beneficiary, Content, HiveRpc, SignedBlock};
use crate::gateway::SignalServices;
use crate::lists::{ListName, UserListStore};

/// Accepted gap between the block timestamp and the post's authoritative
/// creation time. Asymmetric: content created before the block is an edit
/// replayed as new; more than this many seconds after it is clock skew.
const CREATION_WINDOW_SECS: i64 = 6;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// A community-tagged top-level post spotted in a block, before admission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostAnnouncement {
    pub author: String,
    pub permlink: String,
    pub tags: Vec<String>,
}

/// A post admitted for scoring, enriched with authoritative content data.
#[derive(Debug, Clone)]
pub struct PostCandidate {
    pub author: String,
    pub permlink: String,
    pub title: String,
    pub body: String,
    pub tags: Vec<String>,
    pub category: String,
    pub created: NaiveDateTime,
    pub beneficiaries: Vec<Beneficiary>,
    /// True when the post declines rewards (max accepted payout of zero)
    pub declines_payout: bool,
}

impl PostCandidate {
    /// Build a candidate from authoritative post content.
    pub fn from_content(content: &Content, tags: Vec<String>) -> anyhow::Result<Self> {
        let created = parse_timestamp(&content.created)?;
        let max_payout = crate::gateway::rpc::parse_asset(&content.max_accepted_payout);

        Ok(Self {
            author: content.author.clone(),
            permlink: content.permlink.clone(),
            title: content.title.clone(),
            body: content.body.clone(),
            tags,
            category: content.category.clone(),
            created,
            beneficiaries: content.beneficiaries.clone(),
            declines_payout: max_payout <= 0.0,
        })
    }

    /// Frontend URL of the post.
    pub fn url(&self) -> String {
        format!("https://peakd.com/@{}/{}", self.author, self.permlink)
    }
}

/// Why an announced post was not admitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Author is on the local blacklist
    Blacklisted,
    /// Author appears on the external reputation blacklist
    ReputationBlacklisted,
    /// Authoritative creation time is outside the acceptance window
    /// (an edit replayed as new, or clock skew)
    StaleOrEdited,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::Blacklisted => write!(f, "author is blacklisted"),
            Rejection::ReputationBlacklisted => {
                write!(f, "author is on the reputation blacklist")
            }
            Rejection::StaleOrEdited => write!(f, "not a freshly created post"),
        }
    }
}

/// Admission outcome for one announcement.
#[derive(Debug)]
pub enum Admission {
    Admitted(Box<PostCandidate>),
    Rejected(Rejection),
}

/// Extract community-tagged top-level posts from a block.
///
/// Pure and idempotent: the same block always yields the same announcements,
/// in transaction order. Malformed operation shapes and unparseable metadata
/// are treated as "not a candidate", never as errors.
pub fn extract_announcements(
    block: &SignedBlock,
    community_tags: &[String],
    excluded_tags: &[String],
) -> Vec<PostAnnouncement> {
    let mut announcements = Vec::new();

    for transaction in &block.transactions {
        // Root-level post creation is always the first operation.
        let Some(op) = transaction.operations.first() else {
            continue;
        };

        let Some(op_name) = op.get(0).and_then(|n| n.as_str()) else {
            continue;
        };
        if op_name != "comment" {
            continue;
        }
        let Some(payload) = op.get(1) else {
            continue;
        };

        let parent_author = payload
            .get("parent_author")
            .and_then(|p| p.as_str())
            .unwrap_or("missing");
        if !parent_author.is_empty() {
            continue; // a reply, not a top-level post
        }

        let author = payload.get("author").and_then(|a| a.as_str()).unwrap_or("");
        let permlink = payload
            .get("permlink")
            .and_then(|p| p.as_str())
            .unwrap_or("");
        if author.is_empty() || permlink.is_empty() {
            continue;
        }

        let metadata = payload
            .get("json_metadata")
            .and_then(|m| m.as_str())
            .unwrap_or("");
        let tags = parse_tags(metadata);

        if !tags.iter().any(|t| community_tags.contains(t)) {
            continue;
        }

        if let Some(excluded) = tags.iter().find(|t| excluded_tags.contains(t)) {
            tracing::info!(
                "Skipping @{}/{}: carries excluded tag '{}'",
                author,
                permlink,
                excluded
            );
            continue;
        }

        announcements.push(PostAnnouncement {
            author: author.to_string(),
            permlink: permlink.to_string(),
            tags,
        });
    }

    announcements
}

/// Parse the `tags` array out of a post's JSON metadata.
///
/// Malformed JSON or a missing/non-array `tags` field yields no tags.
pub fn parse_tags(json_metadata: &str) -> Vec<String> {
    let Ok(metadata) = serde_json::from_str::<serde_json::Value>(json_metadata) else {
        return Vec::new();
    };

    metadata
        .get("tags")
        .and_then(|t| t.as_array())
        .map(|tags| {
            tags.iter()
                .filter_map(|t| t.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

/// Parse a Hive timestamp ("2024-06-01T12:00:00", no timezone suffix).
pub fn parse_timestamp(value: &str) -> anyhow::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .map_err(|e| anyhow::anyhow!("Bad timestamp '{}': {}", value, e))
}

/// Whether `created` lies within the acceptance window after `block_ts`.
pub fn within_creation_window(created: NaiveDateTime, block_ts: NaiveDateTime) -> bool {
    let gap = created.signed_duration_since(block_ts).num_seconds();
    (0..=CREATION_WINDOW_SECS).contains(&gap)
}

/// Runs the asynchronous admission checks for announced posts.
pub struct CandidateFilter<'a> {
    rpc: &'a HiveRpc,
    services: &'a SignalServices,
    lists: &'a UserListStore,
}

impl<'a> CandidateFilter<'a> {
    pub fn new(rpc: &'a HiveRpc, services: &'a SignalServices, lists: &'a UserListStore) -> Self {
        Self {
            rpc,
            services,
            lists,
        }
    }

    /// Decide whether an announced post becomes a scoring candidate.
    ///
    /// A failed content fetch is an error (the caller skips this post);
    /// a failed reputation-blacklist fetch degrades to an empty blacklist.
    pub async fn admit(
        &self,
        announcement: &PostAnnouncement,
        block_timestamp: &str,
    ) -> anyhow::Result<Admission> {
        if self.lists.contains(ListName::Blacklist, &announcement.author) {
            return Ok(Admission::Rejected(Rejection::Blacklisted));
        }

        let reputation_blacklist = match self.services.reputation_blacklist().await {
            Ok(list) => list,
            Err(e) => {
                tracing::warn!("Reputation blacklist unavailable ({}), skipping check", e);
                Vec::new()
            }
        };
        if reputation_blacklist.iter().any(|a| a == &announcement.author) {
            return Ok(Admission::Rejected(Rejection::ReputationBlacklisted));
        }

        let content = self
            .rpc
            .get_content(&announcement.author, &announcement.permlink)
            .await?
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "No content for @{}/{}",
                    announcement.author,
                    announcement.permlink
                )
            })?;

        let block_ts = parse_timestamp(block_timestamp)?;
        let created = parse_timestamp(&content.created)?;
        if !within_creation_window(created, block_ts) {
            return Ok(Admission::Rejected(Rejection::StaleOrEdited));
        }

        let candidate = PostCandidate::from_content(&content, announcement.tags.clone())?;
        Ok(Admission::Admitted(Box::new(candidate)))
    }
}
