//! The contract between the engine and the external chain client.
//!
//! The engine never talks to a chain directly. Deployments inject a [`ChainAdapter`] instance into
//! the registry and the ingestor, which keeps the chain client swappable and lets tests run
//! against an in-memory double. Event delivery is pull-based: a subscription is an ordered
//! channel of events starting from an explicit cursor, so replay-from-cursor and
//! backoff-on-failure are first-class behaviours.

use std::time::Duration;

use gt_common::GameToken;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::db_types::{Address, BlockPosition, EventId, MatchId};

//--------------------------------------    ContractCall     ---------------------------------------------------------
/// A state-changing call submitted to the settlement contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractCall {
    CreateMatch { match_id: MatchId, player1: Address, player2: Address, stake: GameToken },
    Stake { match_id: MatchId, player: Address },
    CommitResult { match_id: MatchId, winner: Address, payout: GameToken },
    Refund { match_id: MatchId },
}

impl ContractCall {
    pub fn match_id(&self) -> &MatchId {
        match self {
            ContractCall::CreateMatch { match_id, .. }
            | ContractCall::Stake { match_id, .. }
            | ContractCall::CommitResult { match_id, .. }
            | ContractCall::Refund { match_id } => match_id,
        }
    }
}

//--------------------------------------      TxHandle       ---------------------------------------------------------
/// An opaque handle to a submitted, not-yet-confirmed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxHandle(pub String);

/// The confirmation record for a submitted transaction.
#[derive(Debug, Clone)]
pub struct TxReceipt {
    pub txid: String,
    pub block: BlockPosition,
}

//--------------------------------------     ChainEvent      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    MatchCreated,
    Staked,
    Settled,
    Refunded,
}

/// The payload a settlement-contract event carries, by kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPayload {
    MatchCreated { player1: Address, player2: Address, stake: GameToken },
    Staked { player: Address, amount: GameToken },
    Settled { winner: Address, payout: GameToken },
    Refunded { player: Address, amount: GameToken },
}

/// One event observed on the chain. `event_id` is stable across redeliveries; `block` orders the
/// stream.
#[derive(Debug, Clone)]
pub struct ChainEvent {
    pub kind: EventKind,
    pub match_id: MatchId,
    pub event_id: EventId,
    pub block: BlockPosition,
    pub payload: EventPayload,
}

//--------------------------------------     ChainError      ---------------------------------------------------------
#[derive(Debug, Clone, Error)]
pub enum ChainError {
    /// The chain client could not be reached. Transient; retry with backoff.
    #[error("Chain unavailable: {0}")]
    Unavailable(String),
    /// The transaction was not confirmed within the deadline. The outcome is ambiguous: callers
    /// must query current state before deciding whether to resubmit.
    #[error("Transaction was not confirmed within {0:?}")]
    ConfirmationTimeout(Duration),
    /// The chain rejected the call outright. Permanent.
    #[error("Chain rejected the call: {0}")]
    Rejected(String),
}

impl ChainError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ChainError::Unavailable(_) | ChainError::ConfirmationTimeout(_))
    }
}

//--------------------------------------    ChainAdapter     ---------------------------------------------------------
/// The engine-facing contract of the external chain client. Execution semantics, gas and finality
/// are the adapter's problem; the engine only consumes this interface.
#[allow(async_fn_in_trait)]
pub trait ChainAdapter: Clone + Send + Sync + 'static {
    /// Submit a state-changing call. Returns immediately with a pending handle.
    async fn submit(&self, call: ContractCall) -> Result<TxHandle, ChainError>;

    /// Wait for the transaction behind `handle` to confirm, up to `timeout`.
    ///
    /// Dropping this future cancels only the local wait; it never rolls back effects the chain has
    /// already committed.
    async fn await_confirmation(&self, handle: &TxHandle, timeout: Duration) -> Result<TxReceipt, ChainError>;

    /// Subscribe to contract events from the given cursor (inclusive of anything after it).
    /// Delivery is at-least-once: the same event may be observed again after a reconnect.
    async fn subscribe_events(&self, from: BlockPosition) -> Result<mpsc::Receiver<ChainEvent>, ChainError>;

    /// The chain's current head position.
    async fn current_block_position(&self) -> Result<BlockPosition, ChainError>;
}
