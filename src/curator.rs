//! The curation pipeline.
//!
//! Ties the pieces together: blocks come in from the stream reconciler,
//! announcements pass the candidate filter, admitted posts are scored against
//! a fresh account snapshot, and the result is reported and - for auto-list
//! authors scoring high enough - turned into a vote plus promotional reply.

use std::time::Duration;

use crate::broadcast::{promo_reply_ops, vote_op, Broadcaster, RpcBroadcaster};
use crate::candidate::{extract_announcements, Admission, CandidateFilter, PostAnnouncement};
use crate::config::BotConfig;
use crate::cursor::BlockCursor;
use crate::gateway::rpc::{HiveRpc, SignedBlock};
use crate::gateway::{CallPolicy, NodeGateway, SignalServices};
use crate::lists::{ListName, UserListStore};
use crate::notify::{create_notifier, Notifier, ScoreNotice, SkipNotice};
use crate::score::{ScoreBreakdown, ScoreEngine};
use crate::snapshot::AccountSnapshot;
use crate::stream::{StreamReconciler, StreamSettings};

/// One bot instance: owns the gateways, list store and notifier.
pub struct Curator {
    config: BotConfig,
    rpc: HiveRpc,
    services: SignalServices,
    lists: UserListStore,
    notifier: Box<dyn Notifier>,
}

impl Curator {
    pub fn new(config: BotConfig) -> anyhow::Result<Self> {
        let policy = CallPolicy {
            timeout: Duration::from_millis(config.call_timeout_ms),
            retries: config.call_retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        };

        let rpc = HiveRpc::new(NodeGateway::new(config.hive_nodes.clone(), policy)?);
        let services = SignalServices::new(config.engine_nodes.clone(), policy)?;
        let lists = UserListStore::new(&config.lists_dir);
        let notifier = create_notifier(config.webhook_url.as_deref())?;

        Ok(Self {
            config,
            rpc,
            services,
            lists,
            notifier,
        })
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    pub fn lists(&self) -> &UserListStore {
        &self.lists
    }

    /// Stream blocks until the reconnect budget is exhausted.
    ///
    /// `from_height` overrides the persisted cursor for this run.
    pub async fn run(&self, from_height: Option<u64>) -> anyhow::Result<()> {
        let mut cursor = BlockCursor::load(&self.config.cursor_file);
        if let Some(height) = from_height {
            tracing::info!("Starting from requested height {}", height);
            cursor.set_height(height.saturating_sub(1));
        }

        let settings = StreamSettings {
            reconnect_delay: Duration::from_secs(self.config.reconnect_delay_secs),
            max_reconnect_attempts: self.config.max_reconnect_attempts,
            poll_interval: Duration::from_secs(self.config.poll_interval_secs),
        };

        let mut reconciler = StreamReconciler::new(&self.rpc, cursor, settings);
        reconciler
            .run(|height, block| self.process_block(height, block))
            .await
    }

    /// Process every community post announced in a block.
    ///
    /// Per-post failures are logged and swallowed so one bad post never
    /// blocks the rest of the block or the cursor.
    pub async fn process_block(&self, height: u64, block: SignedBlock) {
        let announcements = extract_announcements(
            &block,
            &self.config.community_tags,
            &self.config.excluded_tags,
        );

        for announcement in &announcements {
            if let Err(e) = self.process_post(announcement, &block.timestamp).await {
                tracing::error!(
                    "Skipping @{}/{}: {}",
                    announcement.author,
                    announcement.permlink,
                    e
                );
            }
        }

        tracing::debug!("Block {} processed", height);
    }

    async fn process_post(
        &self,
        announcement: &PostAnnouncement,
        block_timestamp: &str,
    ) -> anyhow::Result<()> {
        let filter = CandidateFilter::new(&self.rpc, &self.services, &self.lists);

        let candidate = match filter.admit(announcement, block_timestamp).await? {
            Admission::Rejected(reason) => {
                tracing::info!(
                    "Rejected @{}/{}: {}",
                    announcement.author,
                    announcement.permlink,
                    reason
                );
                let notice = SkipNotice {
                    author: announcement.author.clone(),
                    permlink: announcement.permlink.clone(),
                    reason: reason.to_string(),
                };
                if let Err(e) = self.notifier.notify_skip(&notice).await {
                    tracing::warn!("Skip notification failed: {}", e);
                }
                return Ok(());
            }
            Admission::Admitted(candidate) => candidate,
        };

        let snapshot =
            AccountSnapshot::fetch(&self.rpc, &self.services, &self.config, &candidate.author)
                .await?;

        let engine = ScoreEngine::new(&self.services, &self.lists, &self.config);
        let breakdown = engine.score(&candidate, &snapshot).await;

        let mut auto_voted = false;
        if self.lists.contains(ListName::Auto, &candidate.author)
            && breakdown.total >= self.config.auto_vote_threshold
        {
            match self
                .cast_vote_and_comment(&candidate.author, &candidate.permlink, breakdown.total)
                .await
            {
                Ok(()) => auto_voted = true,
                Err(e) => {
                    tracing::error!("Auto-vote failed for @{}/{}: {}", candidate.author, candidate.permlink, e);
                }
            }
        }

        tracing::info!(
            "Scored @{}/{}: {} (auto_voted={})",
            candidate.author,
            candidate.permlink,
            breakdown.total,
            auto_voted
        );

        let notice = ScoreNotice::new(&candidate, breakdown, auto_voted);
        if let Err(e) = self.notifier.notify_score(&notice).await {
            tracing::warn!("Score notification failed: {}", e);
        }

        Ok(())
    }

    /// Score an arbitrary post on demand (manual inspection).
    pub async fn score_post(
        &self,
        author: &str,
        permlink: &str,
    ) -> anyhow::Result<ScoreBreakdown> {
        let content = self
            .rpc
            .get_content(author, permlink)
            .await?
            .ok_or_else(|| anyhow::anyhow!("No post found for @{}/{}", author, permlink))?;

        let tags = crate::candidate::parse_tags(&content.json_metadata);
        let candidate = crate::candidate::PostCandidate::from_content(&content, tags)?;

        let snapshot =
            AccountSnapshot::fetch(&self.rpc, &self.services, &self.config, author).await?;

        let engine = ScoreEngine::new(&self.services, &self.lists, &self.config);
        Ok(engine.score(&candidate, &snapshot).await)
    }

    /// Cast a curation vote and the promotional reply for a post.
    pub async fn cast_vote_and_comment(
        &self,
        author: &str,
        permlink: &str,
        weight_percent: u32,
    ) -> anyhow::Result<()> {
        let broadcaster = RpcBroadcaster::new(&self.rpc, self.config.posting_key.as_deref())?;

        broadcaster
            .broadcast(&[vote_op(
                &self.config.voter_account,
                author,
                permlink,
                weight_percent,
            )])
            .await?;

        let body = format!(
            "Your post was curated by the @{} project. Keep creating for the community!",
            self.config.voter_account
        );
        broadcaster
            .broadcast(&promo_reply_ops(
                &self.config.community_account,
                author,
                permlink,
                &body,
            ))
            .await?;

        tracing::info!(
            "Voted {}% on @{}/{} and left the promo reply",
            weight_percent,
            author,
            permlink
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_curator_construction_with_defaults() {
        let curator = Curator::new(BotConfig::default()).unwrap();
        assert_eq!(curator.config().voter_account, "hive-br.voter");
    }

    #[test]
    fn test_broadcast_requires_posting_key() {
        let curator = Curator::new(BotConfig::default()).unwrap();
        let result = RpcBroadcaster::new(&curator.rpc, curator.config.posting_key.as_deref());
        assert!(result.is_err());
    }
}
