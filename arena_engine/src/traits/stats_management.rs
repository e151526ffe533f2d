use thiserror::Error;

use crate::db_types::{Address, AggregateStats, LeaderboardEntry, Match, MatchId, PlayerStats};

#[derive(Debug, Clone, Error)]
pub enum StatsApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("User error constructing query: {0}")]
    QueryError(String),
}

impl From<sqlx::Error> for StatsApiError {
    fn from(e: sqlx::Error) -> Self {
        StatsApiError::DatabaseError(e.to_string())
    }
}

/// Read-only queries over the stats ledger and the match mirror. Safe to call concurrently with
/// the write path.
#[allow(async_fn_in_trait)]
pub trait StatsManagement {
    /// Players with at least one recorded match, ordered by total winnings descending, ties broken
    /// by wins descending. Paginated.
    async fn leaderboard(&self, limit: i64, offset: i64) -> Result<Vec<LeaderboardEntry>, StatsApiError>;

    /// The player's record, or a zero-valued default if the player has no recorded matches.
    async fn player_stats(&self, address: &Address) -> Result<PlayerStats, StatsApiError>;

    /// Platform-wide totals.
    async fn aggregate_stats(&self) -> Result<AggregateStats, StatsApiError>;

    /// The local mirror row for the given match id, if known.
    async fn fetch_match(&self, match_id: &MatchId) -> Result<Option<Match>, StatsApiError>;
}
