//! End-to-end ingestor tests: a live subscription over the in-memory chain double, redelivery,
//! cursor resumption after restart, and reconnection after an outage.

mod support;

use std::time::Duration;

use arena_engine::{
    chain::{ChainEvent, EventKind, EventPayload},
    db_types::{BlockPosition, EventId, MatchStatus, NewMatch},
    ArenaDatabase,
    EventIngestor,
    IngestorConfig,
    SqliteDatabase,
    StatsManagement,
};
use gt_common::GameToken;
use support::{
    addr,
    match_id,
    memory_chain::{created_event, settled_event, staked_event, MemoryChain},
    prepare_env::prepare_test_db,
    setup_staked_match,
    ALICE,
    BOB,
    CAROL,
    DAVE,
};
use tokio::sync::watch;

/// Polls `check` until it returns true, panicking after five seconds.
async fn wait_until<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !check().await {
        if tokio::time::Instant::now() > deadline {
            panic!("Timed out waiting for: {what}");
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

fn fast_config() -> IngestorConfig {
    IngestorConfig { backoff_initial: Duration::from_millis(10), backoff_max: Duration::from_millis(50) }
}

async fn wins_of(db: &SqliteDatabase, who: &str) -> i64 {
    db.player_stats(&addr(who)).await.expect("Error fetching stats").wins
}

#[tokio::test]
async fn live_events_flow_into_the_ledger() {
    let db = prepare_test_db().await;
    let chain = MemoryChain::new();
    let (quit, shutdown) = watch::channel(false);
    let ingestor = EventIngestor::new(db.clone(), chain.clone()).with_config(fast_config());
    let handle = tokio::spawn(ingestor.run(shutdown));

    let id = match_id("live-1");
    let stake = GameToken::from_gt(10);
    chain.emit(created_event(&id, &addr(ALICE), &addr(BOB), stake, "0xt1", 1));
    chain.emit(staked_event(&id, &addr(ALICE), stake, "0xt2", 2));
    chain.emit(staked_event(&id, &addr(BOB), stake, "0xt3", 3));
    chain.emit(settled_event(&id, &addr(ALICE), GameToken::from_gt(20), "0xt4", 4));

    wait_until("the settlement to land", || {
        let db = db.clone();
        async move { wins_of(&db, ALICE).await == 1 }
    })
    .await;
    let m = db.fetch_match(&id).await.unwrap().expect("Match not mirrored");
    assert_eq!(m.status, MatchStatus::Settled);
    assert_eq!(m.winner, Some(addr(ALICE)));
    assert!(m.p1_staked && m.p2_staked);
    assert_eq!(db.fetch_cursor().await.unwrap(), BlockPosition::new(4));

    // At-least-once delivery: replay the whole stream. Nothing may double-count.
    chain.emit(staked_event(&id, &addr(ALICE), stake, "0xt2", 2));
    chain.emit(settled_event(&id, &addr(ALICE), GameToken::from_gt(20), "0xt4", 4));
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(wins_of(&db, ALICE).await, 1);
    let alice = db.player_stats(&addr(ALICE)).await.unwrap();
    assert_eq!(alice.total_won, GameToken::from_gt(20));

    quit.send(true).expect("Error signalling shutdown");
    handle.await.expect("Ingestor task panicked");
}

#[tokio::test]
async fn restart_resumes_from_the_durable_cursor() {
    let db = prepare_test_db().await;
    let chain = MemoryChain::new();

    // A previous run left the cursor at block 7.
    let id = setup_staked_match(&db, "resume-1", ALICE, BOB, 10).await;
    db.apply_settlement_event(&EventId::new("0xold", 0), &id, &addr(ALICE), GameToken::from_gt(20), BlockPosition::new(7))
        .await
        .expect("Error applying settlement");

    let (quit, shutdown) = watch::channel(false);
    let ingestor = EventIngestor::new(db.clone(), chain.clone()).with_config(fast_config());
    let handle = tokio::spawn(ingestor.run(shutdown));
    wait_until("the subscription to open", || {
        let chain = chain.clone();
        async move { !chain.subscription_cursors().is_empty() }
    })
    .await;
    assert_eq!(chain.subscription_cursors(), vec![BlockPosition::new(7)]);

    quit.send(true).expect("Error signalling shutdown");
    handle.await.expect("Ingestor task panicked");
}

#[tokio::test]
async fn reconnects_after_an_outage() {
    let db = prepare_test_db().await;
    let chain = MemoryChain::new();
    chain.set_available(false);

    let (quit, shutdown) = watch::channel(false);
    let ingestor = EventIngestor::new(db.clone(), chain.clone()).with_config(fast_config());
    let handle = tokio::spawn(ingestor.run(shutdown));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(chain.subscription_cursors().is_empty());

    chain.set_available(true);
    let id = setup_staked_match(&db, "outage-1", ALICE, BOB, 10).await;
    wait_until("the subscription to reopen", || {
        let chain = chain.clone();
        async move { !chain.subscription_cursors().is_empty() }
    })
    .await;
    chain.emit(settled_event(&id, &addr(BOB), GameToken::from_gt(20), "0xt9", 1));
    wait_until("the settlement to land", || {
        let db = db.clone();
        async move { wins_of(&db, BOB).await == 1 }
    })
    .await;

    quit.send(true).expect("Error signalling shutdown");
    handle.await.expect("Ingestor task panicked");
}

#[tokio::test]
async fn a_failed_settlement_holds_the_cursor_back() {
    let db = prepare_test_db().await;
    let chain = MemoryChain::new();
    let known = setup_staked_match(&db, "held-known", ALICE, BOB, 10).await;
    let unknown = match_id("held-unknown");

    let (quit, shutdown) = watch::channel(false);
    let ingestor = EventIngestor::new(db.clone(), chain.clone()).with_config(fast_config());
    let handle = tokio::spawn(ingestor.run(shutdown));

    // A settlement the mirror cannot apply yet sits at block 5, with an applicable one behind it
    // at block 6. Neither the later event nor anything else may drag the cursor past block 5.
    chain.emit(settled_event(&unknown, &addr(CAROL), GameToken::from_gt(20), "0xheld", 5));
    chain.emit(settled_event(&known, &addr(BOB), GameToken::from_gt(20), "0xok", 6));
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(db.fetch_cursor().await.unwrap(), BlockPosition::new(0));
    assert_eq!(wins_of(&db, BOB).await, 0);

    // Once the mirror catches up, the redelivered events apply in order and the cursor follows.
    let new_match = NewMatch::new(unknown.clone(), addr(CAROL), addr(DAVE), GameToken::from_gt(10));
    db.insert_match(&new_match).await.expect("Error inserting match");
    db.record_stake(&unknown, &addr(CAROL)).await.expect("Error staking");
    db.record_stake(&unknown, &addr(DAVE)).await.expect("Error staking");
    wait_until("both settlements to land", || {
        let db = db.clone();
        async move { wins_of(&db, CAROL).await == 1 && wins_of(&db, BOB).await == 1 }
    })
    .await;
    assert_eq!(db.fetch_cursor().await.unwrap(), BlockPosition::new(6));

    quit.send(true).expect("Error signalling shutdown");
    handle.await.expect("Ingestor task panicked");
}

#[tokio::test]
async fn dropping_the_shutdown_sender_stops_the_ingestor() {
    let db = prepare_test_db().await;
    let chain = MemoryChain::new();
    let (quit, shutdown) = watch::channel(false);
    let ingestor = EventIngestor::new(db.clone(), chain.clone()).with_config(fast_config());
    let handle = tokio::spawn(ingestor.run(shutdown));
    wait_until("the subscription to open", || {
        let chain = chain.clone();
        async move { !chain.subscription_cursors().is_empty() }
    })
    .await;

    drop(quit);
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("Ingestor kept running after its shutdown handle was dropped")
        .expect("Ingestor task panicked");
}

#[tokio::test]
async fn an_instantly_ending_stream_reconnects_with_backoff() {
    let db = prepare_test_db().await;
    let chain = MemoryChain::new();
    chain.set_end_streams(true);

    let (quit, shutdown) = watch::channel(false);
    let ingestor = EventIngestor::new(db.clone(), chain.clone()).with_config(fast_config());
    let handle = tokio::spawn(ingestor.run(shutdown));
    tokio::time::sleep(Duration::from_millis(400)).await;

    let n = chain.subscription_cursors().len();
    assert!(n >= 2, "The ingestor never reconnected to the flapping stream");
    assert!(n <= 25, "Reconnects to a flapping stream must back off; {n} subscriptions in 400ms is a hot loop");

    quit.send(true).expect("Error signalling shutdown");
    handle.await.expect("Ingestor task panicked");
}

#[tokio::test]
async fn settlement_for_an_unknown_match_stays_eligible_for_redelivery() {
    let db = prepare_test_db().await;
    let chain = MemoryChain::new();
    let ingestor = EventIngestor::new(db.clone(), chain.clone());

    let id = match_id("out-of-order");
    let event = settled_event(&id, &addr(ALICE), GameToken::from_gt(20), "0xooo", 5);

    // The mirror has never seen this match: the apply must fail without burning the marker.
    assert!(ingestor.process_event(&event).await.is_err());
    assert_eq!(wins_of(&db, ALICE).await, 0);
    assert_eq!(db.fetch_cursor().await.unwrap(), BlockPosition::new(0));

    // Once the earlier events catch up, redelivery of the same event applies cleanly.
    let new_match = NewMatch::new(id.clone(), addr(ALICE), addr(BOB), GameToken::from_gt(10));
    db.insert_match(&new_match).await.expect("Error inserting match");
    db.record_stake(&id, &addr(ALICE)).await.expect("Error staking");
    db.record_stake(&id, &addr(BOB)).await.expect("Error staking");
    ingestor.process_event(&event).await.expect("Error applying redelivered settlement");
    assert_eq!(wins_of(&db, ALICE).await, 1);
    assert_eq!(db.fetch_cursor().await.unwrap(), BlockPosition::new(5));
}

#[tokio::test]
async fn malformed_events_are_skipped_without_poisoning_the_stream() {
    let db = prepare_test_db().await;
    let chain = MemoryChain::new();
    let ingestor = EventIngestor::new(db.clone(), chain.clone());

    let id = match_id("mismatch");
    let event = ChainEvent {
        kind: EventKind::Settled,
        match_id: id.clone(),
        event_id: EventId::new("0xbad", 0),
        block: BlockPosition::new(3),
        payload: EventPayload::Staked { player: addr(ALICE), amount: GameToken::from_gt(1) },
    };
    ingestor.process_event(&event).await.expect("A malformed event must not error the loop");
    assert_eq!(wins_of(&db, ALICE).await, 0);
    assert_eq!(db.fetch_cursor().await.unwrap(), BlockPosition::new(3));
}
