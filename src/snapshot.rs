//! Per-author account snapshots.
//!
//! A snapshot is rebuilt for every scoring pass rather than cached: scoring
//! is rare enough that freshness wins over the extra round-trips.

use crate::config::BotConfig;
use crate::gateway::rpc::{parse_asset, HiveRpc};
use crate::gateway::SignalServices;

/// Account state at scoring time, with vesting balances converted to HP.
#[derive(Debug, Clone)]
pub struct AccountSnapshot {
    pub account: String,
    /// Liquid HIVE balance
    pub balance: f64,
    /// HBD savings balance
    pub savings: f64,
    /// Own staked equity in HP
    pub hp: f64,
    /// Equity delegated away, in HP
    pub delegated_hp: f64,
    /// Equity received from others, in HP
    pub received_hp: f64,
    /// Lifetime curation rewards, in HIVE
    pub curation_rewards: f64,
    /// Lifetime author rewards, in HIVE
    pub posting_rewards: f64,
    /// Earnings-to-equity ratio; infinite for zero-HP accounts
    pub ke: f64,
    /// Whether a power-down is in progress
    pub powering_down: bool,
    /// HP delegated to the community voting account
    pub voter_delegation_hp: f64,
    /// Staked sidechain token balance (0 when the lookup degrades)
    pub token_stake: f64,
}

impl AccountSnapshot {
    /// Fetch a fresh snapshot for `author`.
    ///
    /// The account fetch itself is fatal for the scoring pass; the sidechain
    /// token lookup degrades to a zero stake on failure.
    pub async fn fetch(
        rpc: &HiveRpc,
        services: &SignalServices,
        config: &BotConfig,
        author: &str,
    ) -> anyhow::Result<Self> {
        let account = rpc
            .get_account(author)
            .await?
            .ok_or_else(|| anyhow::anyhow!("No account data found for @{}", author))?;

        let vesting_shares = parse_asset(&account.vesting_shares);
        let delegated_shares = parse_asset(&account.delegated_vesting_shares);
        let received_shares = parse_asset(&account.received_vesting_shares);

        let hp = rpc.vests_to_hp(vesting_shares).await?;
        let delegated_hp = rpc.vests_to_hp(delegated_shares).await?;
        let received_hp = rpc.vests_to_hp(received_shares).await?;

        // Rewards come back in millis of HIVE
        let curation_rewards = account.curation_rewards as f64 / 1000.0;
        let posting_rewards = account.posting_rewards as f64 / 1000.0;
        let ke = if hp > 0.0 {
            (curation_rewards + posting_rewards) / hp
        } else {
            f64::INFINITY
        };

        let powering_down = parse_asset(&account.vesting_withdraw_rate) > 0.0;

        let voter_delegation_hp = match voter_delegation_vests(rpc, author, &config.voter_account).await {
            Ok(vests) => rpc.vests_to_hp(vests).await.unwrap_or(0.0),
            Err(e) => {
                tracing::warn!("Delegation lookup failed for @{} ({}), assuming 0", author, e);
                0.0
            }
        };

        let token_stake = match services.token_stake(author, &config.token_symbol).await {
            Ok(stake) => stake.unwrap_or(0.0),
            Err(e) => {
                tracing::warn!(
                    "{} stake lookup failed for @{} ({}), assuming 0",
                    config.token_symbol,
                    author,
                    e
                );
                0.0
            }
        };

        Ok(Self {
            account: account.name,
            balance: parse_asset(&account.balance),
            savings: parse_asset(&account.savings_hbd_balance),
            hp,
            delegated_hp,
            received_hp,
            curation_rewards,
            posting_rewards,
            ke,
            powering_down,
            voter_delegation_hp,
            token_stake,
        })
    }
}

/// VESTS the author currently delegates to the community voting account.
async fn voter_delegation_vests(
    rpc: &HiveRpc,
    author: &str,
    voter_account: &str,
) -> anyhow::Result<f64> {
    let delegations = rpc.get_vesting_delegations(author).await?;
    Ok(delegations
        .iter()
        .find(|d| d.delegatee == voter_account)
        .map(|d| parse_asset(&d.vesting_shares))
        .unwrap_or(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(hp: f64, curation: f64, posting: f64) -> AccountSnapshot {
        AccountSnapshot {
            account: "alice".to_string(),
            balance: 0.0,
            savings: 0.0,
            hp,
            delegated_hp: 0.0,
            received_hp: 0.0,
            curation_rewards: curation,
            posting_rewards: posting,
            ke: if hp > 0.0 {
                (curation + posting) / hp
            } else {
                f64::INFINITY
            },
            powering_down: false,
            voter_delegation_hp: 0.0,
            token_stake: 0.0,
        }
    }

    #[test]
    fn test_ke_ratio() {
        let s = snapshot(100.0, 60.0, 60.0);
        assert!((s.ke - 1.2).abs() < 1e-9);
    }

    #[test]
    fn test_zero_hp_gives_infinite_ke() {
        let s = snapshot(0.0, 60.0, 60.0);
        assert!(s.ke.is_infinite());
    }
}
