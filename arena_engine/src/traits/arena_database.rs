use gt_common::GameToken;
use thiserror::Error;

use crate::{
    db_types::{Address, BlockPosition, EventId, Match, MatchId, MatchStatus, NewMatch},
    traits::StatsManagement,
};

#[derive(Debug, Clone, Error)]
pub enum ArenaDatabaseError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Match not found: {0}")]
    MatchNotFound(MatchId),
    #[error("Operation '{op}' is illegal while match {match_id} is {status}")]
    InvalidState { match_id: MatchId, status: MatchStatus, op: &'static str },
    #[error("{player} is not a participant of match {match_id}")]
    NotAParticipant { match_id: MatchId, player: Address },
    #[error("{player} has already staked in match {match_id}")]
    AlreadyStaked { match_id: MatchId, player: Address },
    #[error("{winner} cannot win match {match_id}: not a participant")]
    InvalidWinner { match_id: MatchId, winner: Address },
}

impl From<sqlx::Error> for ArenaDatabaseError {
    fn from(e: sqlx::Error) -> Self {
        ArenaDatabaseError::DatabaseError(e.to_string())
    }
}

/// Result of an idempotent match insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertMatchResult {
    Inserted(i64),
    AlreadyExists(i64),
}

/// Result of applying a chain event to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// The event's effects were committed, along with its processed marker.
    Applied,
    /// A marker for this event identity already existed; nothing was changed.
    AlreadyProcessed,
}

/// The write seam of the engine's store.
///
/// Every method that mutates more than one row runs as a single atomic transaction: the stats
/// increments, the processed-event marker and the cursor advance commit together or not at all.
/// Player increments are expressed as atomic SQL updates, never read-then-write, so concurrent
/// callers (a failover ingestor, a backfill run) cannot lose updates.
#[allow(async_fn_in_trait)]
pub trait ArenaDatabase: Clone + StatsManagement + Send + Sync + 'static {
    /// The URL of the database.
    fn url(&self) -> &str;

    /// Inserts the local mirror row for a newly confirmed match. Idempotent: inserting a known
    /// `match_id` reports `AlreadyExists` without touching the row.
    async fn insert_match(&self, new_match: &NewMatch) -> Result<InsertMatchResult, ArenaDatabaseError>;

    /// Records that `player` staked. When both flags are set the match advances to `Staked` and
    /// its start time is recorded. Guards the state machine inside the transaction and returns
    /// the updated row.
    async fn record_stake(&self, match_id: &MatchId, player: &Address) -> Result<Match, ArenaDatabaseError>;

    /// Transitions `Staked` → `Settled` and records the winner. Terminal.
    async fn record_settlement(&self, match_id: &MatchId, winner: &Address) -> Result<Match, ArenaDatabaseError>;

    /// Transitions `Created` → `Refunded`. Terminal.
    async fn record_refund(&self, match_id: &MatchId) -> Result<Match, ArenaDatabaseError>;

    /// Applies a `Settled` chain event to the stats ledger: winner gains a win and the payout,
    /// the loser gains a loss and forfeits the stake, the match mirror is marked settled, and the
    /// processed marker plus cursor advance commit in the same transaction. A duplicate event
    /// identity is a no-op.
    async fn apply_settlement_event(
        &self,
        event_id: &EventId,
        match_id: &MatchId,
        winner: &Address,
        payout: GameToken,
        block: BlockPosition,
    ) -> Result<EventOutcome, ArenaDatabaseError>;

    /// Records a `Refunded` chain event for audit. Win/loss/earnings counters are untouched;
    /// refunds are neutral outcomes. Still marker-guarded so redelivery is a no-op.
    async fn apply_refund_event(
        &self,
        event_id: &EventId,
        match_id: &MatchId,
        player: &Address,
        amount: GameToken,
        block: BlockPosition,
    ) -> Result<EventOutcome, ArenaDatabaseError>;

    /// The last durably processed stream position.
    async fn fetch_cursor(&self) -> Result<BlockPosition, ArenaDatabaseError>;

    /// Advances the persisted cursor to `block` if it is ahead of the stored value.
    async fn advance_cursor(&self, block: BlockPosition) -> Result<(), ArenaDatabaseError>;

    /// Closes the connection pool.
    async fn close(&mut self) -> Result<(), ArenaDatabaseError>;
}
