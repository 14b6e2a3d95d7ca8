//! Hive Curation Bot
//!
//! A curation assistant for a Hive community. This library provides:
//!
//! - A resumable block-stream reconciler with node failover
//! - Candidate extraction for freshly published community-tagged posts
//! - A weighted scoring rubric over account and post signals
//! - Vote + promotional-comment broadcasting through a capability seam
//!
//! # Architecture
//!
//! The bot polls a Hive API node for blocks starting after the persisted
//! cursor. Each block's transactions are scanned for top-level `comment`
//! operations carrying the community tag. Surviving candidates are scored
//! against the author's account snapshot plus external signals (delegation
//! ranking, curation trail, sidechain token stake), and the result is either
//! reported through a notifier or turned into an automatic vote.
//!
//! # Resumability
//!
//! The cursor file records the last fully processed block height. It advances
//! after every block regardless of per-post failures, so a crash loses at
//! most one in-flight block.

pub mod broadcast;
pub mod candidate;
pub mod config;
pub mod curator;
pub mod cursor;
pub mod gateway;
pub mod lists;
pub mod notify;
pub mod score;
pub mod snapshot;
pub mod stream;

pub use candidate::PostCandidate;
pub use config::BotConfig;
pub use curator::Curator;
pub use cursor::BlockCursor;
pub use gateway::NodeGateway;
pub use lists::UserListStore;
pub use score::ScoreBreakdown;
pub use snapshot::AccountSnapshot;
