//! GT Arena Engine
//!
//! The arena engine coordinates two-party staked matches that settle on an external chain, and it
//! keeps an off-chain, crash-consistent record of player outcomes derived from that chain's events.
//! The library is chain-agnostic: everything that touches the chain goes through the
//! [`chain::ChainAdapter`] trait, so deployments inject their own client (and tests inject a
//! double).
//!
//! The library is divided into three main sections:
//! 1. Database management and control ([`mod@sqlite`]). Sqlite is the supported backend. You should
//!    never need to access the database directly. Instead, use the public API provided by the
//!    engine. The exception is the data types used in the database, defined in the public
//!    `db_types` module.
//! 2. The engine public API ([`mod@arena_api`]). [`MatchRegistryApi`] owns the match lifecycle
//!    (create, stake, settle, refund) and [`StatsApi`] serves the read-only leaderboard and player
//!    statistics queries. Backends implement the traits in [`mod@traits`] to act as a store for the
//!    engine.
//! 3. The event ingestor ([`mod@ingestor`]). A long-lived loop that consumes the chain's
//!    at-least-once event stream from a durable cursor and applies settlement and refund outcomes
//!    to the stats ledger exactly once.

pub mod arena_api;
pub mod chain;
pub mod db_types;
pub mod helpers;
pub mod ingestor;
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;

pub use arena_api::{MatchFlowError, MatchRegistryApi, StatsApi};
pub use ingestor::{EventIngestor, IngestorConfig};
pub use traits::{ArenaDatabase, ArenaDatabaseError, EventOutcome, InsertMatchResult, StatsApiError, StatsManagement};
