//! The scoring rubric.
//!
//! A candidate's composite score is the sum of independently capped signals,
//! clamped to 0-100. `compute` is a pure function of its inputs; the async
//! [`ScoreEngine`] wrapper performs the two external lookups (delegator rank,
//! curation-trail membership) and then delegates to it, so the same external
//! answers always produce the same breakdown.

use serde::Serialize;

use crate::candidate::PostCandidate;
use crate::config::BotConfig;
use crate::gateway::SignalServices;
use crate::lists::{ListName, UserListStore};
use crate::snapshot::AccountSnapshot;

/// Upper bound of the composite score.
pub const MAX_SCORE: u32 = 100;

/// Beneficiary weight (out of 10000) required for the beneficiary bonus.
const BENEFICIARY_MIN_WEIGHT: u32 = 500;

/// Points awarded by one signal.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SignalScore {
    pub name: &'static str,
    pub points: u32,
}

/// The composite scoring result for one candidate.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreBreakdown {
    /// Composite score, clamped to 0-100
    pub total: u32,
    /// Points awarded per signal
    pub signals: Vec<SignalScore>,
    /// Set when the post was rejected before scoring
    pub disqualified: Option<String>,
}

impl ScoreBreakdown {
    /// A breakdown for a post rejected before scoring.
    pub fn disqualified(reason: impl Into<String>) -> Self {
        Self {
            total: 0,
            signals: Vec::new(),
            disqualified: Some(reason.into()),
        }
    }

    /// Points awarded by the named signal (0 when absent).
    pub fn points(&self, name: &str) -> u32 {
        self.signals
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.points)
            .unwrap_or(0)
    }

    /// Human-readable one-line-per-signal summary.
    pub fn summary(&self) -> String {
        if let Some(reason) = &self.disqualified {
            return format!("disqualified: {}", reason);
        }
        let mut lines: Vec<String> = self
            .signals
            .iter()
            .map(|s| format!("  {}: +{}", s.name, s.points))
            .collect();
        lines.push(format!("  total: {}", self.total));
        lines.join("\n")
    }
}

/// Everything `compute` needs, gathered ahead of time.
pub struct ScoreInputs<'a> {
    pub candidate: &'a PostCandidate,
    pub snapshot: &'a AccountSnapshot,
    /// 1-indexed rank among delegators to the voting account
    pub delegator_rank: Option<usize>,
    pub verified: bool,
    pub staff: bool,
    pub on_trail: bool,
    /// Home community category (full score when posted there)
    pub home_category: &'a str,
    /// The community operating account (score override, beneficiary target)
    pub community_account: &'a str,
}

/// Compute the composite score. Pure and deterministic.
pub fn compute(inputs: &ScoreInputs) -> ScoreBreakdown {
    // The community's own posts are always worth a full vote.
    if inputs.candidate.author == inputs.community_account {
        return ScoreBreakdown {
            total: MAX_SCORE,
            signals: vec![SignalScore {
                name: "community_account",
                points: MAX_SCORE,
            }],
            disqualified: None,
        };
    }

    let snapshot = inputs.snapshot;
    let mut signals = Vec::with_capacity(10);

    signals.push(SignalScore {
        name: "efficiency",
        points: efficiency_points(snapshot.ke),
    });

    // Delegation to the community's own voting account does not count
    // against the author.
    let delegation_pct = if snapshot.hp > 0.0 {
        (snapshot.delegated_hp - snapshot.voter_delegation_hp) / snapshot.hp * 100.0
    } else {
        // Zero-equity accounts score the worst band, not NaN.
        100.0
    };
    signals.push(SignalScore {
        name: "delegation",
        points: delegation_points(delegation_pct),
    });

    signals.push(SignalScore {
        name: "not_powering_down",
        points: if snapshot.powering_down { 0 } else { 20 },
    });

    signals.push(SignalScore {
        name: "delegator_rank",
        points: rank_points(inputs.delegator_rank),
    });

    signals.push(SignalScore {
        name: "token_stake",
        points: stake_points(snapshot.token_stake),
    });

    signals.push(SignalScore {
        name: "verified",
        points: if inputs.verified { 10 } else { 0 },
    });

    signals.push(SignalScore {
        name: "home_category",
        points: if inputs.candidate.category == inputs.home_category {
            5
        } else {
            0
        },
    });

    let community_beneficiary = inputs.candidate.beneficiaries.iter().any(|b| {
        b.account == inputs.community_account && b.weight >= BENEFICIARY_MIN_WEIGHT
    });
    signals.push(SignalScore {
        name: "beneficiary",
        points: if community_beneficiary { 5 } else { 0 },
    });

    signals.push(SignalScore {
        name: "trail",
        points: if inputs.on_trail { 5 } else { 0 },
    });

    signals.push(SignalScore {
        name: "staff",
        points: if inputs.staff { 10 } else { 0 },
    });

    let total: u32 = signals.iter().map(|s| s.points).sum();

    ScoreBreakdown {
        total: total.min(MAX_SCORE),
        signals,
        disqualified: None,
    }
}

/// Earnings-to-equity band: frugal curators score highest.
fn efficiency_points(ke: f64) -> u32 {
    if ke < 1.5 {
        10
    } else if ke < 3.0 {
        5
    } else {
        0
    }
}

fn delegation_points(pct: f64) -> u32 {
    if pct < 30.0 {
        10
    } else if pct < 50.0 {
        5
    } else {
        0
    }
}

fn rank_points(rank: Option<usize>) -> u32 {
    match rank {
        Some(1..=10) => 20,
        Some(11..=20) => 15,
        Some(21..=30) => 10,
        Some(31..=40) => 5,
        _ => 0,
    }
}

/// One point per 10 staked tokens, capped at 20.
fn stake_points(stake: f64) -> u32 {
    if stake <= 0.0 {
        return 0;
    }
    ((stake / 10.0).floor() as u32).min(20)
}

/// Async wrapper performing the external lookups before scoring.
pub struct ScoreEngine<'a> {
    services: &'a SignalServices,
    lists: &'a UserListStore,
    config: &'a BotConfig,
}

impl<'a> ScoreEngine<'a> {
    pub fn new(services: &'a SignalServices, lists: &'a UserListStore, config: &'a BotConfig) -> Self {
        Self {
            services,
            lists,
            config,
        }
    }

    /// Score a candidate against its author's snapshot.
    ///
    /// Both external lookups degrade to their neutral value on failure (not
    /// ranked, not on trail); list membership reads come from the store.
    pub async fn score(
        &self,
        candidate: &PostCandidate,
        snapshot: &AccountSnapshot,
    ) -> ScoreBreakdown {
        let delegator_rank = match self
            .services
            .delegator_rank(&self.config.voter_account, &candidate.author)
            .await
        {
            Ok(rank) => rank,
            Err(e) => {
                tracing::warn!("Rank lookup failed for @{} ({}), not ranked", candidate.author, e);
                None
            }
        };

        let on_trail = self.lists.contains(ListName::Trail, &candidate.author)
            || match self
                .services
                .on_curation_trail(&self.config.voter_account, &candidate.author)
                .await
            {
                Ok(on_trail) => on_trail,
                Err(e) => {
                    tracing::warn!(
                        "Trail lookup failed for @{} ({}), not on trail",
                        candidate.author,
                        e
                    );
                    false
                }
            };

        compute(&ScoreInputs {
            candidate,
            snapshot,
            delegator_rank,
            verified: self.lists.contains(ListName::Verified, &candidate.author),
            staff: self.lists.is_staff(&candidate.author),
            on_trail,
            home_category: &self.config.home_category,
            community_account: &self.config.community_account,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::rpc::Beneficiary;
    use chrono::NaiveDateTime;

    fn candidate(author: &str, category: &str, beneficiaries: Vec<Beneficiary>) -> PostCandidate {
        PostCandidate {
            author: author.to_string(),
            permlink: "test-post".to_string(),
            title: "Test".to_string(),
            body: String::new(),
            tags: vec!["hivebr".to_string()],
            category: category.to_string(),
            created: NaiveDateTime::parse_from_str("2024-06-01T12:00:00", "%Y-%m-%dT%H:%M:%S")
                .unwrap(),
            beneficiaries,
            declines_payout: false,
        }
    }

    fn snapshot() -> AccountSnapshot {
        AccountSnapshot {
            account: "alice".to_string(),
            balance: 10.0,
            savings: 0.0,
            hp: 1000.0,
            delegated_hp: 0.0,
            received_hp: 0.0,
            curation_rewards: 500.0,
            posting_rewards: 700.0,
            ke: 1.2,
            powering_down: false,
            voter_delegation_hp: 0.0,
            token_stake: 0.0,
        }
    }

    fn inputs<'a>(
        candidate: &'a PostCandidate,
        snapshot: &'a AccountSnapshot,
    ) -> ScoreInputs<'a> {
        ScoreInputs {
            candidate,
            snapshot,
            delegator_rank: None,
            verified: false,
            staff: false,
            on_trail: false,
            home_category: "hive-127515",
            community_account: "hive-br",
        }
    }

    #[test]
    fn test_score_is_clamped_to_100() {
        let candidate = candidate(
            "alice",
            "hive-127515",
            vec![Beneficiary {
                account: "hive-br".to_string(),
                weight: 600,
            }],
        );
        let mut snap = snapshot();
        snap.token_stake = 1000.0;

        let breakdown = compute(&ScoreInputs {
            delegator_rank: Some(1),
            verified: true,
            staff: true,
            on_trail: true,
            ..inputs(&candidate, &snap)
        });

        // Raw sum is 115; total must clamp.
        let raw: u32 = breakdown.signals.iter().map(|s| s.points).sum();
        assert_eq!(raw, 115);
        assert_eq!(breakdown.total, 100);
    }

    #[test]
    fn test_community_account_override() {
        let candidate = candidate("hive-br", "other", vec![]);
        let mut snap = snapshot();
        snap.ke = 100.0;
        snap.powering_down = true;

        let breakdown = compute(&inputs(&candidate, &snap));
        assert_eq!(breakdown.total, 100);
        assert!(breakdown.disqualified.is_none());
    }

    #[test]
    fn test_efficiency_bands() {
        assert_eq!(efficiency_points(1.2), 10);
        assert_eq!(efficiency_points(1.5), 5);
        assert_eq!(efficiency_points(2.0), 5);
        assert_eq!(efficiency_points(3.0), 0);
        assert_eq!(efficiency_points(4.0), 0);
        assert_eq!(efficiency_points(f64::INFINITY), 0);
    }

    #[test]
    fn test_delegation_bands() {
        assert_eq!(delegation_points(0.0), 10);
        assert_eq!(delegation_points(29.9), 10);
        assert_eq!(delegation_points(30.0), 5);
        assert_eq!(delegation_points(49.9), 5);
        assert_eq!(delegation_points(50.0), 0);
        assert_eq!(delegation_points(100.0), 0);
    }

    #[test]
    fn test_delegation_to_voter_account_does_not_count() {
        let candidate = candidate("alice", "other", vec![]);
        let mut snap = snapshot();
        snap.hp = 1000.0;
        snap.delegated_hp = 600.0; // 60% gross, would score 0
        snap.voter_delegation_hp = 400.0; // net 20%, scores 10

        let breakdown = compute(&inputs(&candidate, &snap));
        assert_eq!(breakdown.points("delegation"), 10);
    }

    #[test]
    fn test_zero_hp_scores_worst_ratio_bands() {
        let candidate = candidate("newbie", "other", vec![]);
        let mut snap = snapshot();
        snap.hp = 0.0;
        snap.ke = f64::INFINITY;
        snap.delegated_hp = 0.0;

        let breakdown = compute(&inputs(&candidate, &snap));
        assert_eq!(breakdown.points("efficiency"), 0);
        assert_eq!(breakdown.points("delegation"), 0);
        assert!(breakdown.disqualified.is_none());
    }

    #[test]
    fn test_rank_bands() {
        assert_eq!(rank_points(Some(1)), 20);
        assert_eq!(rank_points(Some(10)), 20);
        assert_eq!(rank_points(Some(11)), 15);
        assert_eq!(rank_points(Some(20)), 15);
        assert_eq!(rank_points(Some(21)), 10);
        assert_eq!(rank_points(Some(30)), 10);
        assert_eq!(rank_points(Some(31)), 5);
        assert_eq!(rank_points(Some(40)), 5);
        assert_eq!(rank_points(Some(41)), 0);
        assert_eq!(rank_points(None), 0);
    }

    #[test]
    fn test_stake_points_floor_and_cap() {
        assert_eq!(stake_points(0.0), 0);
        assert_eq!(stake_points(9.9), 0);
        assert_eq!(stake_points(10.0), 1);
        assert_eq!(stake_points(55.0), 5);
        assert_eq!(stake_points(199.9), 19);
        assert_eq!(stake_points(200.0), 20);
        assert_eq!(stake_points(10_000.0), 20);
    }

    #[test]
    fn test_beneficiary_weight_threshold() {
        let with_bonus = candidate(
            "alice",
            "other",
            vec![Beneficiary {
                account: "hive-br".to_string(),
                weight: 600,
            }],
        );
        let without_bonus = candidate(
            "alice",
            "other",
            vec![Beneficiary {
                account: "hive-br".to_string(),
                weight: 400,
            }],
        );
        let snap = snapshot();

        assert_eq!(compute(&inputs(&with_bonus, &snap)).points("beneficiary"), 5);
        assert_eq!(
            compute(&inputs(&without_bonus, &snap)).points("beneficiary"),
            0
        );
    }

    #[test]
    fn test_home_category_bonus() {
        let home = candidate("alice", "hive-127515", vec![]);
        let away = candidate("alice", "photography", vec![]);
        let snap = snapshot();

        assert_eq!(compute(&inputs(&home, &snap)).points("home_category"), 5);
        assert_eq!(compute(&inputs(&away, &snap)).points("home_category"), 0);
    }

    #[test]
    fn test_disqualified_breakdown() {
        let breakdown = ScoreBreakdown::disqualified("author is blacklisted");
        assert_eq!(breakdown.total, 0);
        assert!(breakdown.summary().contains("blacklisted"));
    }
}
