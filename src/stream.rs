//! Block-stream reconciliation.
//!
//! Owns the block-stream lifecycle: resume from the persisted cursor (or the
//! chain tip on first run), hand each block to the processing callback,
//! advance the cursor unconditionally after every block, and recover from
//! stream failures by rotating nodes with a bounded retry budget. Exceeding
//! the budget is fatal and surfaces to the caller instead of looping forever.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

use crate::cursor::BlockCursor;
use crate::gateway::rpc::{HiveRpc, SignedBlock};

/// The block-fetch capability the reconciler consumes.
#[async_trait]
pub trait BlockSource: Send + Sync {
    /// Current chain tip height.
    async fn head_block_number(&self) -> anyhow::Result<u64>;

    /// Fetch a block; `None` when the chain has not reached `height` yet.
    async fn get_block(&self, height: u64) -> anyhow::Result<Option<SignedBlock>>;

    /// Move to the next node in the rotation.
    fn rotate_node(&self);
}

#[async_trait]
impl BlockSource for HiveRpc {
    async fn head_block_number(&self) -> anyhow::Result<u64> {
        HiveRpc::head_block_number(self).await
    }

    async fn get_block(&self, height: u64) -> anyhow::Result<Option<SignedBlock>> {
        HiveRpc::get_block(self, height).await
    }

    fn rotate_node(&self) {
        HiveRpc::rotate_node(self)
    }
}

/// Stream lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Determining the start height for a (re)connection
    Connecting,
    /// Fetching and processing blocks
    Streaming,
    /// Retry budget exhausted; the run has ended fatally
    Failed,
}

/// Tuning knobs for the reconciler.
#[derive(Debug, Clone, Copy)]
pub struct StreamSettings {
    /// Delay before reconnecting after a stream failure
    pub reconnect_delay: Duration,
    /// Consecutive failures tolerated before giving up
    pub max_reconnect_attempts: u32,
    /// Sleep between polls when caught up with the tip
    pub poll_interval: Duration,
}

/// Reconnecting block-stream consumer with a persisted cursor.
pub struct StreamReconciler<'a, S: BlockSource> {
    source: &'a S,
    cursor: BlockCursor,
    settings: StreamSettings,
    state: StreamState,
}

impl<'a, S: BlockSource> StreamReconciler<'a, S> {
    pub fn new(source: &'a S, cursor: BlockCursor, settings: StreamSettings) -> Self {
        Self {
            source,
            cursor,
            settings,
            state: StreamState::Connecting,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Last fully processed block height.
    pub fn cursor_height(&self) -> u64 {
        self.cursor.height()
    }

    /// Run the stream until the retry budget is exhausted.
    ///
    /// `handle_block` is responsible for swallowing per-post failures; the
    /// cursor advances after every handled block no matter what happened to
    /// the posts inside it. Cursor write failures are logged and swallowed
    /// so one bad write never stalls the stream.
    pub async fn run<F, Fut>(&mut self, mut handle_block: F) -> anyhow::Result<()>
    where
        F: FnMut(u64, SignedBlock) -> Fut,
        Fut: Future<Output = ()>,
    {
        let mut failures: u32 = 0;

        loop {
            self.state = StreamState::Connecting;

            let start_height = if self.cursor.height() > 0 {
                self.cursor.height() + 1
            } else {
                match self.source.head_block_number().await {
                    Ok(tip) => tip,
                    Err(e) => {
                        failures += 1;
                        if self.give_up(failures, &e) {
                            return Err(e.context("Could not determine chain tip"));
                        }
                        self.backoff_and_rotate(failures).await;
                        continue;
                    }
                }
            };

            tracing::info!("Streaming blocks from height {}", start_height);
            self.state = StreamState::Streaming;

            let mut next = start_height;
            loop {
                match self.source.get_block(next).await {
                    Ok(Some(block)) => {
                        handle_block(next, block).await;

                        // Advance unconditionally: a bad post must never
                        // block the cursor or cause block reprocessing.
                        if let Err(e) = self.cursor.advance(next) {
                            tracing::error!("Could not persist cursor at {}: {}", next, e);
                        }

                        failures = 0;
                        next += 1;
                    }
                    Ok(None) => {
                        // Caught up with the tip
                        tokio::time::sleep(self.settings.poll_interval).await;
                    }
                    Err(e) => {
                        failures += 1;
                        if self.give_up(failures, &e) {
                            return Err(e.context(format!(
                                "Block stream failed at height {}",
                                next
                            )));
                        }
                        self.backoff_and_rotate(failures).await;
                        break; // reconnect from the cursor
                    }
                }
            }
        }
    }

    fn give_up(&mut self, failures: u32, error: &anyhow::Error) -> bool {
        if failures >= self.settings.max_reconnect_attempts {
            tracing::error!(
                "Giving up after {} consecutive stream failures: {}",
                failures,
                error
            );
            self.state = StreamState::Failed;
            return true;
        }
        false
    }

    async fn backoff_and_rotate(&self, failures: u32) {
        tracing::warn!(
            "Stream failure {}/{}, reconnecting in {:?}",
            failures,
            self.settings.max_reconnect_attempts,
            self.settings.reconnect_delay
        );
        tokio::time::sleep(self.settings.reconnect_delay).await;
        self.source.rotate_node();
    }
}
