//! Behaviour a storage backend must expose to act as the engine's store.
//!
//! [`ArenaDatabase`] is the write seam: the match mirror's state machine, the exactly-once
//! application of chain events to the stats ledger, and cursor persistence. [`StatsManagement`]
//! is the read seam serving the leaderboard and player statistics queries; it is safe to call
//! concurrently with writes.

mod arena_database;
mod stats_management;

pub use arena_database::{ArenaDatabase, ArenaDatabaseError, EventOutcome, InsertMatchResult};
pub use stats_management::{StatsApiError, StatsManagement};
