use gt_common::GameToken;
use log::debug;
use sqlx::SqliteConnection;

use crate::{
    chain::EventKind,
    db_types::{Address, BlockPosition, EventId, MatchId},
    traits::ArenaDatabaseError,
};

/// Writes the processed-event marker for the given event identity. Returns `false` if the marker
/// already existed, in which case the caller must treat the event as a duplicate and change
/// nothing else.
pub async fn idempotent_mark(
    event_id: &EventId,
    match_id: &MatchId,
    kind: EventKind,
    block: BlockPosition,
    conn: &mut SqliteConnection,
) -> Result<bool, ArenaDatabaseError> {
    let res = sqlx::query(
        r#"
            INSERT INTO processed_events (event_id, match_id, kind, block_position)
            VALUES ($1, $2, $3, $4);
        "#,
    )
    .bind(event_id)
    .bind(match_id)
    .bind(format!("{kind:?}"))
    .bind(block)
    .execute(&mut *conn)
    .await;
    match res {
        Ok(_) => Ok(true),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            debug!("🗃️ Event {event_id} has already been processed. Skipping");
            Ok(false)
        },
        Err(e) => Err(e.into()),
    }
}

pub async fn record_refund_audit(
    event_id: &EventId,
    match_id: &MatchId,
    player: &Address,
    amount: GameToken,
    conn: &mut SqliteConnection,
) -> Result<(), ArenaDatabaseError> {
    sqlx::query(
        r#"
            INSERT INTO refund_audit (event_id, match_id, player, amount)
            VALUES ($1, $2, $3, $4);
        "#,
    )
    .bind(event_id)
    .bind(match_id)
    .bind(player)
    .bind(amount)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn fetch_cursor(conn: &mut SqliteConnection) -> Result<BlockPosition, ArenaDatabaseError> {
    let pos = sqlx::query_scalar::<_, BlockPosition>("SELECT block_position FROM ingest_cursor WHERE id = 1")
        .fetch_one(&mut *conn)
        .await?;
    Ok(pos)
}

/// Moves the high-water mark forward. The stored position never regresses.
pub async fn advance_cursor(block: BlockPosition, conn: &mut SqliteConnection) -> Result<(), ArenaDatabaseError> {
    sqlx::query("UPDATE ingest_cursor SET block_position = MAX(block_position, $1) WHERE id = 1")
        .bind(block)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
