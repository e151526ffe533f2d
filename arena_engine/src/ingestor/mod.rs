//! The event ingestor bridges the chain's at-least-once event stream into exactly-once effects on
//! the stats ledger.
//!
//! One long-lived loop per deployment: it resumes the subscription from the durable cursor,
//! processes events sequentially, and reconnects with capped exponential backoff when the chain
//! is unavailable. The apply step is safe under concurrent callers (a failover instance, a
//! backfill run): the ledger serializes per-player updates and the processed-event markers make
//! every redelivery a no-op.

use std::time::Duration;

use log::*;
use tokio::sync::watch;

use crate::{
    chain::{ChainAdapter, ChainEvent, EventKind, EventPayload},
    db_types::NewMatch,
    traits::{ArenaDatabase, ArenaDatabaseError, EventOutcome},
};

#[derive(Debug, Clone)]
pub struct IngestorConfig {
    /// Delay before the first reconnection attempt; doubles on every failure.
    pub backoff_initial: Duration,
    /// Ceiling for the reconnection delay.
    pub backoff_max: Duration,
}

impl Default for IngestorConfig {
    fn default() -> Self {
        Self { backoff_initial: Duration::from_millis(500), backoff_max: Duration::from_secs(30) }
    }
}

/// Consumes the chain event stream and drives the stats ledger.
pub struct EventIngestor<B, C> {
    db: B,
    chain: C,
    config: IngestorConfig,
}

impl<B, C> EventIngestor<B, C>
where
    B: ArenaDatabase,
    C: ChainAdapter,
{
    pub fn new(db: B, chain: C) -> Self {
        Self { db, chain, config: IngestorConfig::default() }
    }

    pub fn with_config(mut self, config: IngestorConfig) -> Self {
        self.config = config;
        self
    }

    /// Runs the subscription loop until `shutdown` flips to `true` (or its sender is dropped).
    ///
    /// Every (re)connection resumes from the persisted cursor, not from genesis and not from the
    /// chain head, so nothing is silently skipped; anything replayed is absorbed by the
    /// idempotency markers. An event that cannot be applied halts the stream: processing anything
    /// behind it would let the cursor advance past the unapplied event and lose it on restart, so
    /// the loop backs off and resubscribes from the durable cursor until the event lands.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!("📥️ Event ingestor starting");
        let mut backoff = self.config.backoff_initial;
        'run: loop {
            if *shutdown.borrow() {
                break;
            }
            let cursor = match self.db.fetch_cursor().await {
                Ok(c) => c,
                Err(e) => {
                    error!("📥️ Could not read the ingest cursor: {e}. Retrying in {backoff:?}");
                    if wait_or_shutdown(backoff, &mut shutdown).await {
                        break;
                    }
                    backoff = (backoff * 2).min(self.config.backoff_max);
                    continue;
                },
            };
            let mut stream = match self.chain.subscribe_events(cursor).await {
                Ok(rx) => {
                    info!("📥️ Subscribed to chain events from {cursor}");
                    rx
                },
                Err(e) => {
                    warn!("📥️ Chain unavailable: {e}. Reconnecting in {backoff:?}");
                    if wait_or_shutdown(backoff, &mut shutdown).await {
                        break;
                    }
                    backoff = (backoff * 2).min(self.config.backoff_max);
                    continue;
                },
            };
            loop {
                tokio::select! {
                    maybe_event = stream.recv() => match maybe_event {
                        Some(event) => match self.process_event(&event).await {
                            Ok(()) => backoff = self.config.backoff_initial,
                            Err(e) => {
                                warn!("📥️ Event {} not applied ({e}). Resubscribing from the durable cursor in {backoff:?}", event.event_id);
                                if wait_or_shutdown(backoff, &mut shutdown).await {
                                    break 'run;
                                }
                                backoff = (backoff * 2).min(self.config.backoff_max);
                                continue 'run;
                            },
                        },
                        None => {
                            warn!("📥️ Event stream ended. Reconnecting from the durable cursor in {backoff:?}");
                            if wait_or_shutdown(backoff, &mut shutdown).await {
                                break 'run;
                            }
                            backoff = (backoff * 2).min(self.config.backoff_max);
                            continue 'run;
                        },
                    },
                    changed = shutdown.changed() => {
                        // A dropped sender means nobody is left to ask us to stop later.
                        if changed.is_err() || *shutdown.borrow() {
                            info!("📥️ Event ingestor shutting down");
                            return;
                        }
                    },
                }
            }
        }
        info!("📥️ Event ingestor has shut down");
    }

    /// Applies a single observed event. Settlements and refunds go through the marker-guarded,
    /// atomic ledger transactions; creation and staking events only replay the registry's own
    /// mirror writes (covering a registry that crashed between chain confirmation and its mirror
    /// update).
    pub async fn process_event(&self, event: &ChainEvent) -> Result<(), ArenaDatabaseError> {
        match (event.kind, &event.payload) {
            (EventKind::Settled, EventPayload::Settled { winner, payout }) => {
                let outcome = self
                    .db
                    .apply_settlement_event(&event.event_id, &event.match_id, winner, *payout, event.block)
                    .await?;
                match outcome {
                    EventOutcome::Applied => {
                        info!("📥️ Settled {}: {winner} wins {payout}", event.match_id);
                    },
                    EventOutcome::AlreadyProcessed => {
                        debug!("📥️ Settled event {} already processed. Skipping", event.event_id);
                    },
                }
            },
            (EventKind::Refunded, EventPayload::Refunded { player, amount }) => {
                let outcome = self
                    .db
                    .apply_refund_event(&event.event_id, &event.match_id, player, *amount, event.block)
                    .await?;
                match outcome {
                    EventOutcome::Applied => {
                        info!("📥️ Refunded {} to {player} for match {}", amount, event.match_id);
                    },
                    EventOutcome::AlreadyProcessed => {
                        debug!("📥️ Refund event {} already processed. Skipping", event.event_id);
                    },
                }
            },
            (EventKind::MatchCreated, EventPayload::MatchCreated { player1, player2, stake }) => {
                let new_match = NewMatch::new(event.match_id.clone(), player1.clone(), player2.clone(), *stake);
                self.db.insert_match(&new_match).await?;
                self.db.advance_cursor(event.block).await?;
                debug!("📥️ Mirror refreshed for created match {}", event.match_id);
            },
            (EventKind::Staked, EventPayload::Staked { player, .. }) => {
                match self.db.record_stake(&event.match_id, player).await {
                    Ok(_) => debug!("📥️ Mirror refreshed: {player} staked in {}", event.match_id),
                    // The registry already mirrored this stake; replay is benign.
                    Err(ArenaDatabaseError::AlreadyStaked { .. }) | Err(ArenaDatabaseError::InvalidState { .. }) => {
                        trace!("📥️ Stake event {} already mirrored", event.event_id);
                    },
                    Err(e) => return Err(e),
                }
                self.db.advance_cursor(event.block).await?;
            },
            (kind, payload) => {
                // A kind/payload mismatch cannot ever be applied; skip it rather than poison the loop.
                error!("📥️ Malformed event {}: kind {kind:?} with payload {payload:?}. Skipping", event.event_id);
                self.db.advance_cursor(event.block).await?;
            },
        }
        Ok(())
    }
}

/// Sleeps for `delay`, returning `true` if shutdown was signalled (or its sender dropped) in the
/// meantime.
async fn wait_or_shutdown(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        changed = shutdown.changed() => changed.is_err() || *shutdown.borrow(),
    }
}
