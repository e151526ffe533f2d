use chrono::{DateTime, Utc};
use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Address, Match, MatchId, MatchStatus, NewMatch},
    traits::{ArenaDatabaseError, InsertMatchResult},
};

/// Inserts the mirror row for a new match. If a row for the `match_id` already exists it is left
/// untouched and its id is reported, making the insert safe to replay.
///
/// The statement is driven to completion before this returns, so the implicit commit has landed
/// and the row is visible to any other connection on the pool.
pub async fn idempotent_insert(
    new_match: &NewMatch,
    conn: &mut SqliteConnection,
) -> Result<InsertMatchResult, ArenaDatabaseError> {
    let res = sqlx::query(
        r#"
            INSERT INTO matches (match_id, player1, player2, stake) VALUES ($1, $2, $3, $4);
        "#,
    )
    .bind(&new_match.match_id)
    .bind(&new_match.player1)
    .bind(&new_match.player2)
    .bind(new_match.stake)
    .execute(&mut *conn)
    .await;
    match res {
        Ok(r) => Ok(InsertMatchResult::Inserted(r.last_insert_rowid())),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            let id = sqlx::query_scalar::<_, i64>("SELECT id FROM matches WHERE match_id = $1")
                .bind(&new_match.match_id)
                .fetch_one(&mut *conn)
                .await?;
            debug!("🗃️ Match {} already mirrored with id {id}", new_match.match_id);
            Ok(InsertMatchResult::AlreadyExists(id))
        },
        Err(e) => Err(e.into()),
    }
}

pub async fn fetch_match(
    match_id: &MatchId,
    conn: &mut SqliteConnection,
) -> Result<Option<Match>, ArenaDatabaseError> {
    let m = sqlx::query_as::<_, Match>("SELECT * FROM matches WHERE match_id = $1")
        .bind(match_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(m)
}

/// Writes the staking flags (and the `Created` → `Staked` transition with its start time, when
/// both flags are set). Guarded on the current status so a raced terminal transition cannot be
/// overwritten; returns `None` if the match is no longer `Created`.
pub async fn update_stake_state(
    match_id: &MatchId,
    p1_staked: bool,
    p2_staked: bool,
    start_time: Option<DateTime<Utc>>,
    conn: &mut SqliteConnection,
) -> Result<Option<Match>, ArenaDatabaseError> {
    let status = if p1_staked && p2_staked { MatchStatus::Staked } else { MatchStatus::Created };
    let mut rows = sqlx::query_as::<_, Match>(
        r#"
            UPDATE matches
            SET p1_staked = $1, p2_staked = $2, status = $3, start_time = $4,
                updated_at = CURRENT_TIMESTAMP
            WHERE match_id = $5 AND status = 'Created'
            RETURNING *;
        "#,
    )
    .bind(p1_staked)
    .bind(p2_staked)
    .bind(status)
    .bind(start_time)
    .bind(match_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows.pop())
}

/// `Staked` → `Settled` with the winner recorded. Returns `None` if the match is not in the
/// `Staked` state (including when it is already terminal).
pub async fn mark_settled(
    match_id: &MatchId,
    winner: &Address,
    conn: &mut SqliteConnection,
) -> Result<Option<Match>, ArenaDatabaseError> {
    let mut rows = sqlx::query_as::<_, Match>(
        r#"
            UPDATE matches
            SET status = 'Settled', winner = $1, updated_at = CURRENT_TIMESTAMP
            WHERE match_id = $2 AND status = 'Staked'
            RETURNING *;
        "#,
    )
    .bind(winner)
    .bind(match_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows.pop())
}

/// `Created` → `Refunded`. Returns `None` if the match has left the `Created` state.
pub async fn mark_refunded(
    match_id: &MatchId,
    conn: &mut SqliteConnection,
) -> Result<Option<Match>, ArenaDatabaseError> {
    let mut rows = sqlx::query_as::<_, Match>(
        r#"
            UPDATE matches
            SET status = 'Refunded', updated_at = CURRENT_TIMESTAMP
            WHERE match_id = $1 AND status = 'Created'
            RETURNING *;
        "#,
    )
    .bind(match_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows.pop())
}
