use std::fmt::Debug;

use crate::{
    db_types::{Address, AggregateStats, LeaderboardEntry, Match, MatchId, PlayerStats},
    traits::{StatsApiError, StatsManagement},
};

/// The `StatsApi` provides a unified, read-only view over the stats ledger. It is safe to call
/// concurrently with the ingestion write path.
pub struct StatsApi<B> {
    db: B,
}

impl<B: Debug> Debug for StatsApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StatsApi ({:?})", self.db)
    }
}

impl<B> StatsApi<B>
where B: StatsManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// Players with at least one match, ranked by total winnings descending with wins as the
    /// tie-breaker. `limit` must be positive; `offset` non-negative.
    pub async fn leaderboard(&self, limit: i64, offset: i64) -> Result<Vec<LeaderboardEntry>, StatsApiError> {
        if limit <= 0 {
            return Err(StatsApiError::QueryError(format!("limit must be positive, got {limit}")));
        }
        if offset < 0 {
            return Err(StatsApiError::QueryError(format!("offset must be non-negative, got {offset}")));
        }
        self.db.leaderboard(limit, offset).await
    }

    /// The player's record. A player with no recorded matches gets a zero-valued default rather
    /// than an error.
    pub async fn player_stats(&self, address: &Address) -> Result<PlayerStats, StatsApiError> {
        self.db.player_stats(address).await
    }

    /// Platform-wide totals: distinct players, settled matches, and the amount transferred.
    pub async fn aggregate_stats(&self) -> Result<AggregateStats, StatsApiError> {
        self.db.aggregate_stats().await
    }

    pub async fn match_by_id(&self, match_id: &MatchId) -> Result<Option<Match>, StatsApiError> {
        self.db.fetch_match(match_id).await
    }
}
