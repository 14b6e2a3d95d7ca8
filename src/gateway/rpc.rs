//! Typed condenser-API calls against Hive nodes.
//!
//! Thin wrappers over [`NodeGateway::rpc`] that validate response shapes at
//! the edge, so malformed node answers surface here instead of deep inside
//! filtering or scoring.

use serde::{Deserialize, Serialize};

use super::NodeGateway;

/// Chain-wide properties needed for vests-to-HP conversion and tip lookup.
#[derive(Debug, Clone, Deserialize)]
pub struct DynamicGlobalProperties {
    pub head_block_number: u64,
    pub total_vesting_fund_hive: String,
    pub total_vesting_shares: String,
}

/// Account state as returned by `condenser_api.get_accounts`.
#[derive(Debug, Clone, Deserialize)]
pub struct Account {
    pub name: String,
    #[serde(default)]
    pub balance: String,
    #[serde(default)]
    pub hbd_balance: String,
    #[serde(default)]
    pub savings_hbd_balance: String,
    #[serde(default)]
    pub vesting_shares: String,
    #[serde(default)]
    pub delegated_vesting_shares: String,
    #[serde(default)]
    pub received_vesting_shares: String,
    #[serde(default)]
    pub vesting_withdraw_rate: String,
    #[serde(default)]
    pub curation_rewards: i64,
    #[serde(default)]
    pub posting_rewards: i64,
}

/// Post beneficiary routing (weight out of a 10000 basis).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Beneficiary {
    pub account: String,
    pub weight: u32,
}

/// Post content as returned by `condenser_api.get_content`.
///
/// `get_content` is authoritative for the creation timestamp: the operation
/// in the block carries no reliable `created` field, and edits replay the
/// same operation shape.
#[derive(Debug, Clone, Deserialize)]
pub struct Content {
    pub author: String,
    pub permlink: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub parent_author: String,
    #[serde(default)]
    pub parent_permlink: String,
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub json_metadata: String,
    #[serde(default)]
    pub beneficiaries: Vec<Beneficiary>,
    #[serde(default)]
    pub max_accepted_payout: String,
}

/// An outgoing vesting delegation.
#[derive(Debug, Clone, Deserialize)]
pub struct VestingDelegation {
    pub delegator: String,
    pub delegatee: String,
    pub vesting_shares: String,
}

/// A transaction inside a condenser-format block.
#[derive(Debug, Clone, Deserialize)]
pub struct Transaction {
    /// Operations as raw values: `["comment", {...}]` pairs.
    #[serde(default)]
    pub operations: Vec<serde_json::Value>,
}

/// A condenser-format block.
#[derive(Debug, Clone, Deserialize)]
pub struct SignedBlock {
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

/// Typed Hive RPC client.
pub struct HiveRpc {
    gateway: NodeGateway,
}

impl HiveRpc {
    pub fn new(gateway: NodeGateway) -> Self {
        Self { gateway }
    }

    /// Advance the underlying gateway to its next node.
    pub fn rotate_node(&self) {
        self.gateway.next_node();
    }

    pub async fn dynamic_global_properties(&self) -> anyhow::Result<DynamicGlobalProperties> {
        let result = self
            .gateway
            .rpc(
                "condenser_api.get_dynamic_global_properties",
                serde_json::json!([]),
            )
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Current chain tip height.
    pub async fn head_block_number(&self) -> anyhow::Result<u64> {
        Ok(self.dynamic_global_properties().await?.head_block_number)
    }

    /// Fetch a block. Returns `None` for heights the chain has not reached.
    pub async fn get_block(&self, height: u64) -> anyhow::Result<Option<SignedBlock>> {
        let result = self
            .gateway
            .rpc("condenser_api.get_block", serde_json::json!([height]))
            .await?;
        if result.is_null() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(result)?))
    }

    /// Fetch a single account. Returns `None` if the account does not exist.
    pub async fn get_account(&self, name: &str) -> anyhow::Result<Option<Account>> {
        let result = self
            .gateway
            .rpc("condenser_api.get_accounts", serde_json::json!([[name]]))
            .await?;
        first_account(result)
    }

    /// Fetch post content. Returns `None` for unknown author/permlink pairs
    /// (the node answers with an empty-author stub rather than null).
    pub async fn get_content(&self, author: &str, permlink: &str) -> anyhow::Result<Option<Content>> {
        let result = self
            .gateway
            .rpc(
                "condenser_api.get_content",
                serde_json::json!([author, permlink]),
            )
            .await?;
        let content: Content = serde_json::from_value(result)?;
        if content.author.is_empty() {
            return Ok(None);
        }
        Ok(Some(content))
    }

    /// Outgoing vesting delegations of an account.
    pub async fn get_vesting_delegations(
        &self,
        delegator: &str,
    ) -> anyhow::Result<Vec<VestingDelegation>> {
        let result = self
            .gateway
            .rpc(
                "condenser_api.get_vesting_delegations",
                serde_json::json!([delegator, "", 1000]),
            )
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Convert a VESTS amount to HP using current global properties.
    pub async fn vests_to_hp(&self, vests: f64) -> anyhow::Result<f64> {
        let props = self.dynamic_global_properties().await?;
        let fund = parse_asset(&props.total_vesting_fund_hive);
        let shares = parse_asset(&props.total_vesting_shares);
        if shares == 0.0 {
            return Ok(0.0);
        }
        Ok(fund * vests / shares)
    }

    /// Submit an operation bundle through the node's broadcast endpoint.
    pub async fn broadcast_transaction(&self, transaction: serde_json::Value) -> anyhow::Result<()> {
        self.gateway
            .rpc(
                "condenser_api.broadcast_transaction",
                serde_json::json!([transaction]),
            )
            .await?;
        Ok(())
    }
}

/// First account out of a `get_accounts` response array, or `None` when the
/// node answers with an empty array for an unknown name.
fn first_account(result: serde_json::Value) -> anyhow::Result<Option<Account>> {
    let accounts: Vec<Account> = serde_json::from_value(result)?;
    Ok(accounts.into_iter().next())
}

/// Parse the numeric part of a Hive asset string such as "123.456 HIVE" or
/// "178701.319083 VESTS". Unparseable strings yield 0.
pub fn parse_asset(value: &str) -> f64 {
    value
        .split_whitespace()
        .next()
        .and_then(|n| n.parse::<f64>().ok())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_asset() {
        assert_eq!(parse_asset("123.456 HIVE"), 123.456);
        assert_eq!(parse_asset("0.000 HBD"), 0.0);
        assert_eq!(parse_asset("178701.319083 VESTS"), 178701.319083);
        assert_eq!(parse_asset("garbage"), 0.0);
        assert_eq!(parse_asset(""), 0.0);
    }

    #[test]
    fn test_block_deserialization() {
        let raw = serde_json::json!({
            "timestamp": "2024-06-01T12:00:00",
            "transactions": [
                {
                    "operations": [
                        ["comment", {"author": "alice", "permlink": "p", "parent_author": ""}],
                        ["vote", {"voter": "bob"}]
                    ]
                }
            ],
            "extra_field_ignored": true
        });

        let block: SignedBlock = serde_json::from_value(raw).unwrap();
        assert_eq!(block.timestamp, "2024-06-01T12:00:00");
        assert_eq!(block.transactions.len(), 1);
        assert_eq!(block.transactions[0].operations.len(), 2);
    }

    #[test]
    fn test_account_deserialization_with_missing_fields() {
        let raw = serde_json::json!({
            "name": "alice",
            "balance": "10.000 HIVE",
            "vesting_shares": "1000.000000 VESTS"
        });

        let account: Account = serde_json::from_value(raw).unwrap();
        assert_eq!(account.name, "alice");
        assert_eq!(account.curation_rewards, 0);
        assert_eq!(account.vesting_withdraw_rate, "");
    }

    #[test]
    fn test_first_account_from_response() {
        let raw = serde_json::json!([
            { "name": "alice", "balance": "1.000 HIVE" },
            { "name": "bob" }
        ]);
        let account = first_account(raw).unwrap().unwrap();
        assert_eq!(account.name, "alice");

        assert!(first_account(serde_json::json!([])).unwrap().is_none());
    }

    #[test]
    fn test_content_missing_post_detection() {
        let raw = serde_json::json!({
            "author": "",
            "permlink": "does-not-exist"
        });

        let content: Content = serde_json::from_value(raw).unwrap();
        assert!(content.author.is_empty());
    }
}
