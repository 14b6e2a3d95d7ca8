//! External call gateway with timeout, retry and endpoint failover.
//!
//! Every outbound call is raced against a timeout, retried a fixed number of
//! times with a fixed delay, and rotated to the next endpoint after each
//! failed attempt. Exhausting the retry budget propagates the last error to
//! the caller, which decides whether the missing signal degrades or aborts.

pub mod rpc;
pub mod services;

pub use rpc::HiveRpc;
pub use services::SignalServices;

use rand::Rng;
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// Retry/timeout policy shared by all gateway calls.
#[derive(Debug, Clone, Copy)]
pub struct CallPolicy {
    /// Per-attempt timeout
    pub timeout: Duration,
    /// Retries after the first attempt (attempts = retries + 1)
    pub retries: u32,
    /// Fixed delay between attempts
    pub retry_delay: Duration,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(5000),
            retries: 3,
            retry_delay: Duration::from_millis(1000),
        }
    }
}

/// JSON-RPC gateway over a rotating list of endpoints.
///
/// The starting endpoint is chosen at random so a fleet of bots spreads load
/// across the public nodes.
pub struct NodeGateway {
    client: reqwest::Client,
    endpoints: Vec<String>,
    current: AtomicUsize,
    call_id: AtomicU64,
    policy: CallPolicy,
}

impl NodeGateway {
    /// Create a gateway over the given endpoints.
    pub fn new(endpoints: Vec<String>, policy: CallPolicy) -> anyhow::Result<Self> {
        if endpoints.is_empty() {
            anyhow::bail!("NodeGateway requires at least one endpoint");
        }

        // reqwest gets a generous outer timeout; the per-call race below is
        // the one that enforces the configured budget.
        let client = reqwest::Client::builder()
            .timeout(policy.timeout * 2)
            .build()?;

        let start = rand::thread_rng().gen_range(0..endpoints.len());

        Ok(Self {
            client,
            endpoints,
            current: AtomicUsize::new(start),
            call_id: AtomicU64::new(0),
            policy,
        })
    }

    /// The endpoint the next call will use.
    pub fn current_endpoint(&self) -> &str {
        &self.endpoints[self.current.load(Ordering::Relaxed) % self.endpoints.len()]
    }

    /// Advance to the next endpoint in round-robin order.
    pub fn next_node(&self) {
        let next = (self.current.load(Ordering::Relaxed) + 1) % self.endpoints.len();
        self.current.store(next, Ordering::Relaxed);
        tracing::info!("Switching to node: {}", self.endpoints[next]);
    }

    /// Run `op` with the gateway's timeout/retry/failover policy.
    ///
    /// `op` receives the endpoint to use for that attempt. Each failed
    /// attempt rotates to the next endpoint before the retry delay, so a
    /// fully exhausted call has touched `retries + 1` endpoints in order.
    pub async fn call_with_retry<T, F, Fut>(&self, what: &str, mut op: F) -> anyhow::Result<T>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.policy.retries {
            let endpoint = self.current_endpoint().to_string();

            match tokio::time::timeout(self.policy.timeout, op(endpoint.clone())).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) => {
                    tracing::warn!(
                        "{} failed against {} (attempt {}/{}): {}",
                        what,
                        endpoint,
                        attempt + 1,
                        self.policy.retries + 1,
                        e
                    );
                    last_error = Some(e);
                }
                Err(_) => {
                    tracing::warn!(
                        "{} timed out after {:?} against {} (attempt {}/{})",
                        what,
                        self.policy.timeout,
                        endpoint,
                        attempt + 1,
                        self.policy.retries + 1
                    );
                    last_error = Some(anyhow::anyhow!(
                        "{} timed out after {:?}",
                        what,
                        self.policy.timeout
                    ));
                }
            }

            if attempt < self.policy.retries {
                self.next_node();
                tokio::time::sleep(self.policy.retry_delay).await;
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("{} failed", what)))
    }

    /// Issue a JSON-RPC call against the current endpoint (with retry).
    pub async fn rpc(&self, method: &str, params: serde_json::Value) -> anyhow::Result<serde_json::Value> {
        self.rpc_at_path("", method, params).await
    }

    /// Issue a JSON-RPC call against `endpoint/path` (with retry).
    ///
    /// Hive-Engine nodes route contract queries under a `/contracts` path;
    /// condenser nodes answer at the root.
    pub async fn rpc_at_path(
        &self,
        path: &str,
        method: &str,
        params: serde_json::Value,
    ) -> anyhow::Result<serde_json::Value> {
        let id = self.call_id.fetch_add(1, Ordering::Relaxed);

        self.call_with_retry(method, |endpoint| {
            let url = if path.is_empty() {
                endpoint
            } else {
                format!("{}/{}", endpoint.trim_end_matches('/'), path)
            };
            let body = serde_json::json!({
                "jsonrpc": "2.0",
                "method": method,
                "params": params.clone(),
                "id": id,
            });
            let client = self.client.clone();

            async move {
                let response: serde_json::Value =
                    client.post(&url).json(&body).send().await?.json().await?;

                if let Some(error) = response.get("error") {
                    anyhow::bail!("RPC error: {}", error);
                }

                response
                    .get("result")
                    .cloned()
                    .ok_or_else(|| anyhow::anyhow!("No result in response"))
            }
        })
        .await
    }

    /// Issue a GET request returning JSON (with retry).
    ///
    /// `make_url` builds the request URL from the endpoint chosen for the
    /// attempt, so rotation also applies to plain HTTP services.
    pub async fn get_json<F>(&self, what: &str, make_url: F) -> anyhow::Result<serde_json::Value>
    where
        F: Fn(&str) -> String,
    {
        self.call_with_retry(what, |endpoint| {
            let url = make_url(&endpoint);
            let client = self.client.clone();
            async move {
                Ok(client
                    .get(&url)
                    .send()
                    .await?
                    .json::<serde_json::Value>()
                    .await?)
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::sync::Arc;

    fn test_gateway(endpoints: &[&str]) -> NodeGateway {
        NodeGateway::new(
            endpoints.iter().map(|s| s.to_string()).collect(),
            CallPolicy {
                timeout: Duration::from_millis(100),
                retries: 3,
                retry_delay: Duration::from_millis(1),
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_retry_exhaustion_attempt_count() {
        let gateway = test_gateway(&["a", "b", "c"]);
        let attempts = Arc::new(AtomicU32::new(0));

        let counter = attempts.clone();
        let result: anyhow::Result<()> = gateway
            .call_with_retry("test", move |_endpoint| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::Relaxed);
                    anyhow::bail!("always fails")
                }
            })
            .await;

        assert!(result.is_err());
        // retries = 3 means exactly 4 attempts
        assert_eq!(attempts.load(Ordering::Relaxed), 4);
    }

    #[tokio::test]
    async fn test_rotates_on_each_failed_attempt() {
        let gateway = test_gateway(&["a", "b", "c"]);
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));

        let log = seen.clone();
        let _: anyhow::Result<()> = gateway
            .call_with_retry("test", move |endpoint| {
                let log = log.clone();
                async move {
                    log.lock().unwrap().push(endpoint);
                    anyhow::bail!("always fails")
                }
            })
            .await;

        let seen = seen.lock().unwrap();
        // 4 attempts across 3 endpoints in round-robin order: no endpoint
        // repeats until the rotation wraps.
        assert_eq!(seen.len(), 4);
        assert_ne!(seen[0], seen[1]);
        assert_ne!(seen[1], seen[2]);
        assert_eq!(seen[0], seen[3]);
    }

    #[tokio::test]
    async fn test_success_on_second_attempt() {
        let gateway = test_gateway(&["a", "b"]);
        let attempts = Arc::new(AtomicU32::new(0));

        let counter = attempts.clone();
        let result = gateway
            .call_with_retry("test", move |_endpoint| {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::Relaxed) == 0 {
                        anyhow::bail!("first attempt fails")
                    }
                    Ok(42u32)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failure() {
        let gateway = test_gateway(&["a"]);

        let result: anyhow::Result<()> = gateway
            .call_with_retry("slow", |_endpoint| async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            })
            .await;

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("timed out"));
    }

    #[test]
    fn test_empty_endpoints_rejected() {
        assert!(NodeGateway::new(Vec::new(), CallPolicy::default()).is_err());
    }
}
