//! Score notification handlers.
//!
//! Every scored candidate and every human-relevant skip produces a notice.
//! Handlers: stdout (JSON lines, pipeable) and webhook (HTTP POST with a
//! short retry loop).

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use crate::candidate::PostCandidate;
use crate::score::ScoreBreakdown;

/// A score notice for one candidate.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreNotice {
    pub author: String,
    pub permlink: String,
    pub title: String,
    pub url: String,
    pub breakdown: ScoreBreakdown,
    /// The post declines rewards, so a vote would pay out nothing
    pub declines_payout: bool,
    /// Set when an automatic vote was cast for this post
    pub auto_voted: bool,
}

impl ScoreNotice {
    pub fn new(candidate: &PostCandidate, breakdown: ScoreBreakdown, auto_voted: bool) -> Self {
        Self {
            author: candidate.author.clone(),
            permlink: candidate.permlink.clone(),
            title: candidate.title.clone(),
            url: candidate.url(),
            breakdown,
            declines_payout: candidate.declines_payout,
            auto_voted,
        }
    }
}

/// A one-line notice about a skipped post.
#[derive(Debug, Clone, Serialize)]
pub struct SkipNotice {
    pub author: String,
    pub permlink: String,
    pub reason: String,
}

/// Trait for notification handlers.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Report a scored candidate.
    async fn notify_score(&self, notice: &ScoreNotice) -> anyhow::Result<()>;

    /// Report a skipped post.
    async fn notify_skip(&self, notice: &SkipNotice) -> anyhow::Result<()>;
}

/// Create a notifier from configuration: webhook when a URL is set,
/// stdout otherwise.
pub fn create_notifier(webhook_url: Option<&str>) -> anyhow::Result<Box<dyn Notifier>> {
    match webhook_url {
        Some(url) => Ok(Box::new(WebhookNotifier::new(url)?)),
        None => Ok(Box::new(StdoutNotifier::new())),
    }
}

/// Handler that prints notices to stdout as JSON lines.
pub struct StdoutNotifier;

impl StdoutNotifier {
    pub fn new() -> Self {
        Self
    }
}

impl Default for StdoutNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for StdoutNotifier {
    async fn notify_score(&self, notice: &ScoreNotice) -> anyhow::Result<()> {
        println!("{}", serde_json::to_string(notice)?);
        Ok(())
    }

    async fn notify_skip(&self, notice: &SkipNotice) -> anyhow::Result<()> {
        println!("{}", serde_json::to_string(notice)?);
        Ok(())
    }
}

/// Handler that POSTs notices to a webhook URL.
pub struct WebhookNotifier {
    client: Client,
    url: String,
    max_retries: u32,
    retry_delay: Duration,
}

impl WebhookNotifier {
    pub fn new(url: &str) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            client,
            url: url.to_string(),
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
        })
    }

    async fn post_with_retry<T: Serialize + Sync>(&self, payload: &T) -> anyhow::Result<()> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tracing::warn!("Webhook retry {}", attempt);
                tokio::time::sleep(self.retry_delay * attempt).await;
            }

            match self.post_once(payload).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Unknown webhook error")))
    }

    async fn post_once<T: Serialize + Sync>(&self, payload: &T) -> anyhow::Result<()> {
        let response = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .json(payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "Webhook returned status {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            );
        }

        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify_score(&self, notice: &ScoreNotice) -> anyhow::Result<()> {
        self.post_with_retry(notice).await
    }

    async fn notify_skip(&self, notice: &SkipNotice) -> anyhow::Result<()> {
        self.post_with_retry(notice).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::SignalScore;

    #[test]
    fn test_score_notice_serialization() {
        let breakdown = ScoreBreakdown {
            total: 45,
            signals: vec![SignalScore {
                name: "efficiency",
                points: 10,
            }],
            disqualified: None,
        };
        let notice = ScoreNotice {
            author: "alice".to_string(),
            permlink: "p".to_string(),
            title: "T".to_string(),
            url: "https://peakd.com/@alice/p".to_string(),
            breakdown,
            declines_payout: false,
            auto_voted: false,
        };

        let json = serde_json::to_string(&notice).unwrap();
        assert!(json.contains("\"total\":45"));
        assert!(json.contains("\"efficiency\""));
    }

    #[test]
    fn test_score_notice_carries_payout_decline() {
        use crate::candidate::PostCandidate;
        use chrono::NaiveDateTime;

        let candidate = PostCandidate {
            author: "alice".to_string(),
            permlink: "p".to_string(),
            title: "T".to_string(),
            body: String::new(),
            tags: vec!["hivebr".to_string()],
            category: "hive-127515".to_string(),
            created: NaiveDateTime::parse_from_str("2024-06-01T12:00:00", "%Y-%m-%dT%H:%M:%S")
                .unwrap(),
            beneficiaries: Vec::new(),
            declines_payout: true,
        };

        let notice = ScoreNotice::new(&candidate, ScoreBreakdown::disqualified("x"), false);
        assert!(notice.declines_payout);

        let json = serde_json::to_string(&notice).unwrap();
        assert!(json.contains("\"declines_payout\":true"));
    }
}
