pub mod memory_chain;
pub mod prepare_env;

use arena_engine::{
    db_types::{Address, MatchId, NewMatch},
    ArenaDatabase,
    SqliteDatabase,
};
use gt_common::GameToken;

pub const ALICE: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
pub const BOB: &str = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
pub const CAROL: &str = "0xcccccccccccccccccccccccccccccccccccccccc";
pub const DAVE: &str = "0xdddddddddddddddddddddddddddddddddddddddd";

pub fn addr(s: &str) -> Address {
    s.parse().expect("Not a valid address")
}

pub fn match_id(label: &str) -> MatchId {
    MatchId::from_label(label).expect("Not a valid match label")
}

/// Inserts a fully staked match directly into the mirror, ready for settlement events.
pub async fn setup_staked_match(db: &SqliteDatabase, label: &str, p1: &str, p2: &str, stake_gt: i64) -> MatchId {
    let id = match_id(label);
    let new_match = NewMatch::new(id.clone(), addr(p1), addr(p2), GameToken::from_gt(stake_gt));
    db.insert_match(&new_match).await.expect("Error inserting match");
    db.record_stake(&id, &addr(p1)).await.expect("Error staking p1");
    db.record_stake(&id, &addr(p2)).await.expect("Error staking p2");
    id
}
