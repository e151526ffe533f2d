//! An in-memory [`ChainAdapter`] double. Calls confirm instantly, events are buffered and
//! replayed to subscribers from their requested cursor, and redelivery can be simulated by
//! emitting the same event (same event identity) again.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use gt_common::GameToken;
use tokio::sync::mpsc;

use arena_engine::{
    chain::{ChainAdapter, ChainError, ChainEvent, ContractCall, EventKind, EventPayload, TxHandle, TxReceipt},
    db_types::{Address, BlockPosition, EventId, MatchId},
};

#[derive(Default)]
struct Inner {
    head: i64,
    tx_counter: u64,
    available: bool,
    end_streams: bool,
    events: Vec<ChainEvent>,
    subscribers: Vec<(BlockPosition, mpsc::Sender<ChainEvent>)>,
    subscriptions: Vec<BlockPosition>,
}

#[derive(Clone)]
pub struct MemoryChain {
    inner: Arc<Mutex<Inner>>,
}

impl Default for MemoryChain {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryChain {
    pub fn new() -> Self {
        let inner = Inner { available: true, ..Inner::default() };
        Self { inner: Arc::new(Mutex::new(inner)) }
    }

    /// Toggles simulated connectivity. While unavailable, submissions and subscriptions fail with
    /// `ChainError::Unavailable`.
    pub fn set_available(&self, available: bool) {
        self.inner.lock().unwrap().available = available;
    }

    /// When set, subscriptions succeed but their stream ends immediately after the backlog
    /// replay, as a flapping event source would.
    pub fn set_end_streams(&self, end: bool) {
        self.inner.lock().unwrap().end_streams = end;
    }

    /// Records an event on the simulated chain and pushes it to live subscribers. Emitting the
    /// same event again models at-least-once redelivery.
    pub fn emit(&self, event: ChainEvent) {
        let mut inner = self.inner.lock().unwrap();
        inner.head = inner.head.max(event.block.value());
        inner.events.push(event.clone());
        inner.subscribers.retain(|(from, tx)| {
            if event.block >= *from {
                tx.try_send(event.clone()).is_ok()
            } else {
                true
            }
        });
    }

    /// The cursors that `subscribe_events` has been called with, in order.
    pub fn subscription_cursors(&self) -> Vec<BlockPosition> {
        self.inner.lock().unwrap().subscriptions.clone()
    }
}

impl ChainAdapter for MemoryChain {
    async fn submit(&self, _call: ContractCall) -> Result<TxHandle, ChainError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.available {
            return Err(ChainError::Unavailable("memory chain is offline".to_string()));
        }
        inner.tx_counter += 1;
        Ok(TxHandle(format!("memtx-{:04}", inner.tx_counter)))
    }

    async fn await_confirmation(&self, handle: &TxHandle, _timeout: Duration) -> Result<TxReceipt, ChainError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.available {
            return Err(ChainError::Unavailable("memory chain is offline".to_string()));
        }
        inner.head += 1;
        Ok(TxReceipt { txid: handle.0.clone(), block: BlockPosition::new(inner.head) })
    }

    async fn subscribe_events(&self, from: BlockPosition) -> Result<mpsc::Receiver<ChainEvent>, ChainError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.available {
            return Err(ChainError::Unavailable("memory chain is offline".to_string()));
        }
        inner.subscriptions.push(from);
        let (tx, rx) = mpsc::channel(64);
        // Replay the backlog from the cursor; delivery is at-least-once by design.
        for event in inner.events.iter().filter(|e| e.block >= from) {
            let _ = tx.try_send(event.clone());
        }
        if !inner.end_streams {
            inner.subscribers.push((from, tx));
        }
        Ok(rx)
    }

    async fn current_block_position(&self) -> Result<BlockPosition, ChainError> {
        let inner = self.inner.lock().unwrap();
        if !inner.available {
            return Err(ChainError::Unavailable("memory chain is offline".to_string()));
        }
        Ok(BlockPosition::new(inner.head))
    }
}

//--------------------------------------  event constructors  --------------------------------------------------------

pub fn created_event(
    match_id: &MatchId,
    player1: &Address,
    player2: &Address,
    stake: GameToken,
    txid: &str,
    block: i64,
) -> ChainEvent {
    ChainEvent {
        kind: EventKind::MatchCreated,
        match_id: match_id.clone(),
        event_id: EventId::new(txid, 0),
        block: BlockPosition::new(block),
        payload: EventPayload::MatchCreated { player1: player1.clone(), player2: player2.clone(), stake },
    }
}

pub fn staked_event(match_id: &MatchId, player: &Address, amount: GameToken, txid: &str, block: i64) -> ChainEvent {
    ChainEvent {
        kind: EventKind::Staked,
        match_id: match_id.clone(),
        event_id: EventId::new(txid, 0),
        block: BlockPosition::new(block),
        payload: EventPayload::Staked { player: player.clone(), amount },
    }
}

pub fn settled_event(match_id: &MatchId, winner: &Address, payout: GameToken, txid: &str, block: i64) -> ChainEvent {
    ChainEvent {
        kind: EventKind::Settled,
        match_id: match_id.clone(),
        event_id: EventId::new(txid, 0),
        block: BlockPosition::new(block),
        payload: EventPayload::Settled { winner: winner.clone(), payout },
    }
}

pub fn refunded_event(match_id: &MatchId, player: &Address, amount: GameToken, txid: &str, block: i64) -> ChainEvent {
    ChainEvent {
        kind: EventKind::Refunded,
        match_id: match_id.clone(),
        event_id: EventId::new(txid, 0),
        block: BlockPosition::new(block),
        payload: EventPayload::Refunded { player: player.clone(), amount },
    }
}
