//! Vote and comment broadcasting.
//!
//! Builds condenser-format operations and submits them through the
//! [`Broadcaster`] capability. Transaction assembly and signing live behind
//! that seam: the bundled [`RpcBroadcaster`] hands the operation list to the
//! node endpoint, which is expected to front a signing proxy holding the
//! posting authority.

use async_trait::async_trait;
use serde_json::json;

use crate::gateway::rpc::HiveRpc;

/// Basis points in a full vote weight.
const FULL_WEIGHT: u32 = 10_000;

/// Build a `vote` operation. `weight_percent` is 0-100.
pub fn vote_op(voter: &str, author: &str, permlink: &str, weight_percent: u32) -> serde_json::Value {
    json!([
        "vote",
        {
            "voter": voter,
            "author": author,
            "permlink": permlink,
            "weight": (weight_percent.min(100) * FULL_WEIGHT / 100),
        }
    ])
}

/// Deterministic permlink for the promotional reply to a post.
pub fn reply_permlink(parent_permlink: &str) -> String {
    format!("re-{}-curation", parent_permlink)
}

/// Build the promotional reply to a curated post: a `comment` plus the
/// `comment_options` that route the reply's full payout to the community
/// account.
pub fn promo_reply_ops(
    community_account: &str,
    parent_author: &str,
    parent_permlink: &str,
    body: &str,
) -> Vec<serde_json::Value> {
    let permlink = reply_permlink(parent_permlink);

    let comment = json!([
        "comment",
        {
            "parent_author": parent_author,
            "parent_permlink": parent_permlink,
            "author": community_account,
            "permlink": permlink,
            "title": "",
            "body": body,
            "json_metadata": "{}",
        }
    ]);

    let options = json!([
        "comment_options",
        {
            "author": community_account,
            "permlink": permlink,
            "max_accepted_payout": "10000.000 HBD",
            "percent_hbd": 10000,
            "allow_votes": true,
            "allow_curation_rewards": true,
            "extensions": [[
                0,
                {
                    "beneficiaries": [
                        { "account": community_account, "weight": FULL_WEIGHT }
                    ]
                }
            ]],
        }
    ]);

    vec![comment, options]
}

/// Capability to submit an operation bundle to the chain.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    async fn broadcast(&self, operations: &[serde_json::Value]) -> anyhow::Result<()>;
}

/// Broadcaster that submits operations through the node gateway.
pub struct RpcBroadcaster<'a> {
    rpc: &'a HiveRpc,
}

impl<'a> RpcBroadcaster<'a> {
    /// Create a broadcaster. Fails fast when no signing credentials are
    /// configured; broadcasting without them is unrecoverable.
    pub fn new(rpc: &'a HiveRpc, posting_key: Option<&str>) -> anyhow::Result<Self> {
        if posting_key.map(str::is_empty).unwrap_or(true) {
            anyhow::bail!("No posting key configured; cannot broadcast votes");
        }
        Ok(Self { rpc })
    }
}

#[async_trait]
impl Broadcaster for RpcBroadcaster<'_> {
    async fn broadcast(&self, operations: &[serde_json::Value]) -> anyhow::Result<()> {
        let transaction = json!({
            "operations": operations,
            "extensions": [],
        });
        self.rpc.broadcast_transaction(transaction).await?;
        tracing::info!("Broadcasted {} operation(s)", operations.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vote_op_weight_conversion() {
        let op = vote_op("hive-br.voter", "alice", "my-post", 45);
        assert_eq!(op[0], "vote");
        assert_eq!(op[1]["weight"], 4500);
        assert_eq!(op[1]["voter"], "hive-br.voter");
    }

    #[test]
    fn test_vote_op_weight_capped() {
        let op = vote_op("v", "a", "p", 250);
        assert_eq!(op[1]["weight"], 10_000);
    }

    #[test]
    fn test_promo_reply_routes_payout_to_community() {
        let ops = promo_reply_ops("hive-br", "alice", "my-post", "Nice post!");
        assert_eq!(ops.len(), 2);

        assert_eq!(ops[0][0], "comment");
        assert_eq!(ops[0][1]["parent_author"], "alice");
        assert_eq!(ops[0][1]["permlink"], "re-my-post-curation");

        assert_eq!(ops[1][0], "comment_options");
        let beneficiaries = &ops[1][1]["extensions"][0][1]["beneficiaries"];
        assert_eq!(beneficiaries[0]["account"], "hive-br");
        assert_eq!(beneficiaries[0]["weight"], 10_000);
    }
}
