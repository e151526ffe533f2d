use std::fmt::Debug;

use chrono::Utc;
use gt_common::GameToken;
use log::{debug, trace};
use sqlx::SqlitePool;

use crate::{
    chain::EventKind,
    db_types::{Address, AggregateStats, BlockPosition, EventId, LeaderboardEntry, Match, MatchId, MatchStatus, NewMatch, PlayerStats},
    sqlite::{
        db::{events, matches, stats},
        db_url,
        new_pool,
    },
    traits::{ArenaDatabase, ArenaDatabaseError, EventOutcome, InsertMatchResult, StatsApiError, StatsManagement},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the URL from the environment.
    pub async fn new(max_connections: u32) -> Result<Self, ArenaDatabaseError> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, ArenaDatabaseError> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await.map_err(|e| ArenaDatabaseError::DatabaseError(e.to_string()))?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Brings the schema up to date using the embedded migrations.
    pub async fn run_migrations(&self) -> Result<(), ArenaDatabaseError> {
        sqlx::migrate!("./src/sqlite/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| ArenaDatabaseError::DatabaseError(e.to_string()))?;
        Ok(())
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl ArenaDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_match(&self, new_match: &NewMatch) -> Result<InsertMatchResult, ArenaDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let result = matches::idempotent_insert(new_match, &mut conn).await?;
        if let InsertMatchResult::Inserted(id) = &result {
            debug!("🗃️ Match {} has been saved in the DB with id {id}", new_match.match_id);
        }
        Ok(result)
    }

    async fn record_stake(&self, match_id: &MatchId, player: &Address) -> Result<Match, ArenaDatabaseError> {
        let mut tx = self.pool.begin().await?;
        let m = matches::fetch_match(match_id, &mut tx)
            .await?
            .ok_or_else(|| ArenaDatabaseError::MatchNotFound(match_id.clone()))?;
        if m.status != MatchStatus::Created {
            return Err(ArenaDatabaseError::InvalidState { match_id: match_id.clone(), status: m.status, op: "stake" });
        }
        if !m.is_participant(player) {
            return Err(ArenaDatabaseError::NotAParticipant { match_id: match_id.clone(), player: player.clone() });
        }
        if m.has_staked(player) {
            return Err(ArenaDatabaseError::AlreadyStaked { match_id: match_id.clone(), player: player.clone() });
        }
        let p1_staked = m.p1_staked || player == &m.player1;
        let p2_staked = m.p2_staked || player == &m.player2;
        let start_time = (p1_staked && p2_staked).then(Utc::now);
        let updated = match matches::update_stake_state(match_id, p1_staked, p2_staked, start_time, &mut tx).await? {
            Some(updated) => updated,
            None => {
                // Raced by a concurrent transition; report the status actually in the row.
                let status = matches::fetch_match(match_id, &mut tx).await?.map_or(m.status, |r| r.status);
                return Err(ArenaDatabaseError::InvalidState { match_id: match_id.clone(), status, op: "stake" });
            },
        };
        tx.commit().await?;
        debug!("🗃️ {player} staked in match {match_id}. Status is now {}", updated.status);
        Ok(updated)
    }

    async fn record_settlement(&self, match_id: &MatchId, winner: &Address) -> Result<Match, ArenaDatabaseError> {
        let mut tx = self.pool.begin().await?;
        let m = matches::fetch_match(match_id, &mut tx)
            .await?
            .ok_or_else(|| ArenaDatabaseError::MatchNotFound(match_id.clone()))?;
        if m.status != MatchStatus::Staked {
            return Err(ArenaDatabaseError::InvalidState {
                match_id: match_id.clone(),
                status: m.status,
                op: "commit_result",
            });
        }
        if !m.is_participant(winner) {
            return Err(ArenaDatabaseError::InvalidWinner { match_id: match_id.clone(), winner: winner.clone() });
        }
        let settled = matches::mark_settled(match_id, winner, &mut tx).await?.ok_or_else(|| {
            ArenaDatabaseError::InvalidState { match_id: match_id.clone(), status: m.status, op: "commit_result" }
        })?;
        tx.commit().await?;
        debug!("🗃️ Match {match_id} settled. Winner: {winner}");
        Ok(settled)
    }

    async fn record_refund(&self, match_id: &MatchId) -> Result<Match, ArenaDatabaseError> {
        let mut tx = self.pool.begin().await?;
        let m = matches::fetch_match(match_id, &mut tx)
            .await?
            .ok_or_else(|| ArenaDatabaseError::MatchNotFound(match_id.clone()))?;
        if m.status != MatchStatus::Created {
            return Err(ArenaDatabaseError::InvalidState {
                match_id: match_id.clone(),
                status: m.status,
                op: "refund",
            });
        }
        let refunded = matches::mark_refunded(match_id, &mut tx).await?.ok_or_else(|| {
            ArenaDatabaseError::InvalidState { match_id: match_id.clone(), status: m.status, op: "refund" }
        })?;
        tx.commit().await?;
        debug!("🗃️ Match {match_id} refunded");
        Ok(refunded)
    }

    /// Applies a settlement in a single atomic transaction:
    /// * Writes the processed-event marker. A pre-existing marker short-circuits to
    ///   `AlreadyProcessed` and nothing else changes.
    /// * Resolves the loser from the match mirror.
    /// * Credits the winner (win + payout) and debits the loser (loss + forfeited stake).
    /// * Marks the mirror `Settled` if the registry has not already done so.
    /// * Advances the ingest cursor.
    ///
    /// Any failure rolls the whole unit back, marker included, so the event stays eligible for
    /// reprocessing on the next delivery.
    async fn apply_settlement_event(
        &self,
        event_id: &EventId,
        match_id: &MatchId,
        winner: &Address,
        payout: GameToken,
        block: BlockPosition,
    ) -> Result<EventOutcome, ArenaDatabaseError> {
        let mut tx = self.pool.begin().await?;
        if !events::idempotent_mark(event_id, match_id, EventKind::Settled, block, &mut tx).await? {
            tx.rollback().await?;
            return Ok(EventOutcome::AlreadyProcessed);
        }
        let m = matches::fetch_match(match_id, &mut tx)
            .await?
            .ok_or_else(|| ArenaDatabaseError::MatchNotFound(match_id.clone()))?;
        if m.status == MatchStatus::Created || m.status == MatchStatus::Refunded {
            // Out of order or contradictory; leave the event unmarked for redelivery.
            return Err(ArenaDatabaseError::InvalidState {
                match_id: match_id.clone(),
                status: m.status,
                op: "settlement event",
            });
        }
        let loser = m
            .opponent_of(winner)
            .ok_or_else(|| ArenaDatabaseError::InvalidWinner { match_id: match_id.clone(), winner: winner.clone() })?
            .clone();
        stats::record_win(winner, payout, &mut tx).await?;
        stats::record_loss(&loser, m.stake, &mut tx).await?;
        if m.status == MatchStatus::Staked {
            matches::mark_settled(match_id, winner, &mut tx).await?;
        }
        events::advance_cursor(block, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Settlement {event_id} applied for match {match_id}. Winner {winner} takes {payout}");
        Ok(EventOutcome::Applied)
    }

    async fn apply_refund_event(
        &self,
        event_id: &EventId,
        match_id: &MatchId,
        player: &Address,
        amount: GameToken,
        block: BlockPosition,
    ) -> Result<EventOutcome, ArenaDatabaseError> {
        let mut tx = self.pool.begin().await?;
        if !events::idempotent_mark(event_id, match_id, EventKind::Refunded, block, &mut tx).await? {
            tx.rollback().await?;
            return Ok(EventOutcome::AlreadyProcessed);
        }
        events::record_refund_audit(event_id, match_id, player, amount, &mut tx).await?;
        // The mirror transition is best-effort here: the registry usually got there first.
        if matches::mark_refunded(match_id, &mut tx).await?.is_none() {
            trace!("🗃️ Match {match_id} was already terminal when refund {event_id} arrived");
        }
        events::advance_cursor(block, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Refund {event_id} recorded for {player} in match {match_id} ({amount})");
        Ok(EventOutcome::Applied)
    }

    async fn fetch_cursor(&self) -> Result<BlockPosition, ArenaDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        events::fetch_cursor(&mut conn).await
    }

    async fn advance_cursor(&self, block: BlockPosition) -> Result<(), ArenaDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        events::advance_cursor(block, &mut conn).await
    }

    async fn close(&mut self) -> Result<(), ArenaDatabaseError> {
        self.pool.close().await;
        Ok(())
    }
}

impl StatsManagement for SqliteDatabase {
    async fn leaderboard(&self, limit: i64, offset: i64) -> Result<Vec<LeaderboardEntry>, StatsApiError> {
        let mut conn = self.pool.acquire().await.map_err(|e| StatsApiError::DatabaseError(e.to_string()))?;
        stats::leaderboard(limit, offset, &mut conn).await.map_err(|e| StatsApiError::DatabaseError(e.to_string()))
    }

    async fn player_stats(&self, address: &Address) -> Result<PlayerStats, StatsApiError> {
        let mut conn = self.pool.acquire().await.map_err(|e| StatsApiError::DatabaseError(e.to_string()))?;
        let found = stats::fetch_player_stats(address, &mut conn)
            .await
            .map_err(|e| StatsApiError::DatabaseError(e.to_string()))?;
        Ok(found.unwrap_or_else(|| PlayerStats::empty(address.clone())))
    }

    async fn aggregate_stats(&self) -> Result<AggregateStats, StatsApiError> {
        let mut conn = self.pool.acquire().await.map_err(|e| StatsApiError::DatabaseError(e.to_string()))?;
        stats::aggregate_stats(&mut conn).await.map_err(|e| StatsApiError::DatabaseError(e.to_string()))
    }

    async fn fetch_match(&self, match_id: &MatchId) -> Result<Option<Match>, StatsApiError> {
        let mut conn = self.pool.acquire().await.map_err(|e| StatsApiError::DatabaseError(e.to_string()))?;
        matches::fetch_match(match_id, &mut conn).await.map_err(|e| StatsApiError::DatabaseError(e.to_string()))
    }
}
