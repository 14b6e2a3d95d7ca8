//! Third-party signal services.
//!
//! Reputation blacklist, incoming-delegation ranking, curation-trail
//! membership and Hive-Engine token balances. Each fetch goes through the
//! same timeout/retry policy as chain calls; response shapes are validated
//! here so the scoring code only sees plain data.

use serde::Deserialize;

use super::{CallPolicy, NodeGateway};

const REPUTATION_BLACKLIST_URL: &str = "https://spaminator.me/api/bl/all.json";
const RANKING_URL_BASE: &str = "https://hafsql-api.mahdiyari.info/delegations";
const TRAIL_URL_BASE: &str = "https://hive.vote/api.php?i=1&user=";

/// An incoming delegation row from the HafSQL delegation API.
#[derive(Debug, Clone, Deserialize)]
pub struct IncomingDelegation {
    pub delegator: String,
    #[serde(default)]
    pub delegatee: String,
    /// Raw VESTS amount as a decimal string, e.g. "178701.319083"
    pub vests: String,
}

/// Gateway to the third-party HTTP services.
pub struct SignalServices {
    /// Single-endpoint gateway for the plain HTTP services
    http: NodeGateway,
    /// Rotating gateway over the Hive-Engine sidechain nodes
    engine: NodeGateway,
}

impl SignalServices {
    pub fn new(engine_endpoints: Vec<String>, policy: CallPolicy) -> anyhow::Result<Self> {
        // The fixed-URL services have nothing to rotate through; a
        // single-entry gateway still supplies the timeout/retry policy.
        Ok(Self {
            http: NodeGateway::new(vec![String::new()], policy)?,
            engine: NodeGateway::new(engine_endpoints, policy)?,
        })
    }

    /// Fetch the global reputation blacklist.
    ///
    /// A non-array or otherwise unexpected response yields an empty list;
    /// callers treat an empty list as "no one blacklisted" rather than an
    /// error, so an offline service never blocks curation.
    pub async fn reputation_blacklist(&self) -> anyhow::Result<Vec<String>> {
        let response = self
            .http
            .get_json("reputation blacklist", |_| {
                REPUTATION_BLACKLIST_URL.to_string()
            })
            .await?;

        match response.get("result").and_then(|r| r.as_array()) {
            Some(entries) => Ok(entries
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()),
            None => {
                tracing::warn!("Unexpected reputation blacklist response shape, treating as empty");
                Ok(Vec::new())
            }
        }
    }

    /// Fetch all incoming delegations to `delegatee`.
    pub async fn incoming_delegations(
        &self,
        delegatee: &str,
    ) -> anyhow::Result<Vec<IncomingDelegation>> {
        let response = self
            .http
            .get_json("incoming delegations", |_| {
                format!("{}/{}/incoming", RANKING_URL_BASE, delegatee)
            })
            .await?;
        Ok(serde_json::from_value(response)?)
    }

    /// Rank of `author` among accounts delegating to `delegatee`, by
    /// delegated amount descending, 1-indexed. `None` when not a delegator.
    pub async fn delegator_rank(
        &self,
        delegatee: &str,
        author: &str,
    ) -> anyhow::Result<Option<usize>> {
        let delegations = self.incoming_delegations(delegatee).await?;
        Ok(rank_of(author, &delegations))
    }

    /// Whether `author` follows the curation trail of `trail_account`.
    pub async fn on_curation_trail(
        &self,
        trail_account: &str,
        author: &str,
    ) -> anyhow::Result<bool> {
        let response = self
            .http
            .get_json("curation trail", |_| {
                format!("{}{}", TRAIL_URL_BASE, trail_account)
            })
            .await?;

        let followers = response
            .as_array()
            .ok_or_else(|| anyhow::anyhow!("Unexpected trail response shape"))?;

        Ok(followers
            .iter()
            .filter_map(|v| v.get("follower").and_then(|f| f.as_str()))
            .any(|f| f == author))
    }

    /// Staked balance of a Hive-Engine token for an account. `None` when the
    /// account holds no balance row for that token.
    pub async fn token_stake(&self, account: &str, symbol: &str) -> anyhow::Result<Option<f64>> {
        let result = self
            .engine
            .rpc_at_path(
                "contracts",
                "findOne",
                serde_json::json!({
                    "contract": "tokens",
                    "table": "balances",
                    "query": { "account": account, "symbol": symbol },
                    "limit": 1,
                    "offset": 0,
                }),
            )
            .await?;

        if result.is_null() {
            return Ok(None);
        }

        Ok(result
            .get("stake")
            .and_then(|s| s.as_str())
            .and_then(|s| s.parse::<f64>().ok()))
    }

}

/// Page through a fetch capability with increasing offsets, concatenating
/// rows until a page comes back shorter than the page size.
pub async fn fetch_all_paged<T, F, Fut>(page_size: usize, mut fetch_page: F) -> anyhow::Result<Vec<T>>
where
    F: FnMut(usize) -> Fut,
    Fut: std::future::Future<Output = anyhow::Result<Vec<T>>>,
{
    let mut results: Vec<T> = Vec::new();

    loop {
        let page = fetch_page(results.len()).await?;
        let count = page.len();
        results.extend(page);

        if count < page_size {
            break;
        }
    }

    Ok(results)
}

/// Rank `author` within a delegation list: sort descending by VESTS amount
/// (stable, so source order breaks ties) and linear-search, 1-indexed.
pub fn rank_of(author: &str, delegations: &[IncomingDelegation]) -> Option<usize> {
    let mut ranked: Vec<(&str, f64)> = delegations
        .iter()
        .map(|d| (d.delegator.as_str(), d.vests.parse::<f64>().unwrap_or(0.0)))
        .collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    ranked
        .iter()
        .position(|(delegator, _)| *delegator == author)
        .map(|idx| idx + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delegation(delegator: &str, vests: &str) -> IncomingDelegation {
        IncomingDelegation {
            delegator: delegator.to_string(),
            delegatee: "hive-br.voter".to_string(),
            vests: vests.to_string(),
        }
    }

    #[test]
    fn test_rank_of_sorted_descending() {
        let delegations = vec![
            delegation("c", "100"),
            delegation("a", "500"),
            delegation("b", "300"),
        ];

        assert_eq!(rank_of("a", &delegations), Some(1));
        assert_eq!(rank_of("b", &delegations), Some(2));
        assert_eq!(rank_of("c", &delegations), Some(3));
    }

    #[test]
    fn test_rank_of_absent_author() {
        let delegations = vec![delegation("a", "500"), delegation("b", "300")];
        assert_eq!(rank_of("d", &delegations), None);
    }

    #[test]
    fn test_rank_of_unparseable_vests_sink_to_bottom() {
        let delegations = vec![delegation("a", "oops"), delegation("b", "1.5")];
        assert_eq!(rank_of("b", &delegations), Some(1));
        assert_eq!(rank_of("a", &delegations), Some(2));
    }

    #[test]
    fn test_rank_of_empty() {
        assert_eq!(rank_of("a", &[]), None);
    }

    #[tokio::test]
    async fn test_fetch_all_paged_stops_on_short_page() {
        let pages = vec![vec![1, 2, 3], vec![4, 5]];
        let calls = std::sync::atomic::AtomicUsize::new(0);

        let all = fetch_all_paged(3, |offset| {
            let idx = calls.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            assert_eq!(offset, idx * 3);
            let page = pages[idx].clone();
            async move { Ok(page) }
        })
        .await
        .unwrap();

        assert_eq!(all, vec![1, 2, 3, 4, 5]);
        assert_eq!(calls.load(std::sync::atomic::Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn test_fetch_all_paged_closure_reusable_across_pages() {
        // The fetcher owns its query payload and must stay callable for every
        // page, cloning the payload per request.
        let query = serde_json::json!({ "symbol": "HBR" });

        let all = fetch_all_paged(1, |offset| {
            let query = query.clone();
            async move {
                if offset < 2 {
                    Ok(vec![query])
                } else {
                    Ok(Vec::new())
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(all.len(), 2);
        assert_eq!(all[0]["symbol"], "HBR");
    }

    #[tokio::test]
    async fn test_fetch_all_paged_single_short_page() {
        let all: Vec<u32> = fetch_all_paged(1000, |_offset| async { Ok(vec![7]) })
            .await
            .unwrap();
        assert_eq!(all, vec![7]);
    }
}
