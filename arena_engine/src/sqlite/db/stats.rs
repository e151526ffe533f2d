use gt_common::GameToken;
use log::trace;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Address, AggregateStats, LeaderboardEntry, PlayerStats},
    traits::ArenaDatabaseError,
};

/// Credits a win and the payout to the player's record, creating the row lazily on first use.
/// The increments happen inside the SQL statement itself, so concurrent callers serialize at the
/// database and no update can be lost to a read-modify-write race.
pub async fn record_win(
    address: &Address,
    payout: GameToken,
    conn: &mut SqliteConnection,
) -> Result<(), ArenaDatabaseError> {
    sqlx::query(
        r#"
            INSERT INTO player_stats (address, wins, losses, matches_played, total_won, total_lost)
            VALUES ($1, 1, 0, 1, $2, 0)
            ON CONFLICT (address) DO UPDATE SET
                wins = wins + 1,
                matches_played = matches_played + 1,
                total_won = total_won + excluded.total_won,
                updated_at = CURRENT_TIMESTAMP;
        "#,
    )
    .bind(address)
    .bind(payout)
    .execute(&mut *conn)
    .await?;
    trace!("🏆️ {payout} credited to {address}");
    Ok(())
}

/// Debits a loss against the player's record; the forfeited stake accrues to `total_lost`.
pub async fn record_loss(
    address: &Address,
    stake: GameToken,
    conn: &mut SqliteConnection,
) -> Result<(), ArenaDatabaseError> {
    sqlx::query(
        r#"
            INSERT INTO player_stats (address, wins, losses, matches_played, total_won, total_lost)
            VALUES ($1, 0, 1, 1, 0, $2)
            ON CONFLICT (address) DO UPDATE SET
                losses = losses + 1,
                matches_played = matches_played + 1,
                total_lost = total_lost + excluded.total_lost,
                updated_at = CURRENT_TIMESTAMP;
        "#,
    )
    .bind(address)
    .bind(stake)
    .execute(&mut *conn)
    .await?;
    trace!("🏆️ {stake} forfeited by {address}");
    Ok(())
}

pub async fn fetch_player_stats(
    address: &Address,
    conn: &mut SqliteConnection,
) -> Result<Option<PlayerStats>, ArenaDatabaseError> {
    let stats = sqlx::query_as::<_, PlayerStats>("SELECT * FROM player_stats WHERE address = $1")
        .bind(address)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(stats)
}

pub async fn leaderboard(
    limit: i64,
    offset: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<LeaderboardEntry>, ArenaDatabaseError> {
    let rows = sqlx::query_as::<_, LeaderboardEntry>(
        r#"
            SELECT
                address,
                wins,
                losses,
                matches_played,
                total_won,
                total_lost,
                ROUND(CAST(wins AS REAL) / NULLIF(matches_played, 0) * 100, 1) AS win_rate
            FROM player_stats
            WHERE matches_played > 0
            ORDER BY total_won DESC, wins DESC
            LIMIT $1 OFFSET $2;
        "#,
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}

pub async fn aggregate_stats(conn: &mut SqliteConnection) -> Result<AggregateStats, ArenaDatabaseError> {
    let stats = sqlx::query_as::<_, AggregateStats>(
        r#"
            SELECT
                COUNT(CASE WHEN matches_played > 0 THEN 1 END) AS total_players,
                COALESCE(SUM(matches_played), 0) / 2            AS total_matches,
                COALESCE(SUM(total_won + total_lost), 0)        AS total_transferred
            FROM player_stats;
        "#,
    )
    .fetch_one(&mut *conn)
    .await?;
    Ok(stats)
}
